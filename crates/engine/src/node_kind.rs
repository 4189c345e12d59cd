// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The closed set of node kinds a graph can hold.

use framekit_core::{
    Buf, Exemplar, FrameKitError, HwKernel, KernelContext, Pad, PadDirection, PadId, PadSignature,
    ParamBinding, Result, TargetAllocator, Wait,
};
use framekit_nodes::{
    DelayConfig, DelayNode, FakeConfig, FakeNode, FakeRole, SplitConfig, SplitNode, TeeConfig,
    TeeNode,
};
use std::fmt;

use crate::executor::NodeLinks;

/// What a node does.
///
/// Kernels are opaque processing stages. Every other variant is a topology
/// node that only moves buffer references and is attached to a peer pad when
/// added to a graph.
pub enum NodeKind {
    Kernel(Box<dyn HwKernel>),
    Tee(TeeNode),
    Delay(DelayNode),
    Fakesrc(FakeNode),
    Fakesink(FakeNode),
    ObjArraySplit(SplitNode),
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kernel(kernel) => f.debug_tuple("Kernel").field(&kernel.kind()).finish(),
            Self::Tee(node) => f.debug_tuple("Tee").field(node).finish(),
            Self::Delay(node) => f.debug_tuple("Delay").field(node).finish(),
            Self::Fakesrc(node) => f.debug_tuple("Fakesrc").field(node).finish(),
            Self::Fakesink(node) => f.debug_tuple("Fakesink").field(node).finish(),
            Self::ObjArraySplit(node) => f.debug_tuple("ObjArraySplit").field(node).finish(),
        }
    }
}

impl NodeKind {
    pub fn kernel(kernel: impl HwKernel + 'static) -> Self {
        Self::Kernel(Box::new(kernel))
    }

    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] if `fanout` is zero.
    pub fn tee(peer: PadId, fanout: usize) -> Result<Self> {
        Ok(Self::Tee(TeeNode::new(TeeConfig { peer, fanout })?))
    }

    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] if `depth` is zero.
    pub fn delay(peer: PadId, depth: usize) -> Result<Self> {
        Ok(Self::Delay(DelayNode::new(DelayConfig { peer, depth })?))
    }

    pub const fn fakesrc(peer: PadId) -> Self {
        Self::Fakesrc(FakeNode::source(FakeConfig { peer }))
    }

    pub const fn fakesink(peer: PadId) -> Self {
        Self::Fakesink(FakeNode::sink(FakeConfig { peer }))
    }

    pub const fn split(peer: PadId, partitions: Vec<u32>) -> Self {
        Self::ObjArraySplit(SplitNode::new(SplitConfig { peer, partitions }))
    }

    /// Builds a topology node from its type name and JSON parameters.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] for an unknown type or bad parameters.
    pub fn from_params(kind: &str, params: Option<&serde_json::Value>) -> Result<Self> {
        match kind {
            "tee" => Ok(Self::Tee(TeeNode::from_params(params)?)),
            "delay" => Ok(Self::Delay(DelayNode::from_params(params)?)),
            "fakesrc" => Ok(Self::Fakesrc(FakeNode::from_params(FakeRole::Source, params)?)),
            "fakesink" => Ok(Self::Fakesink(FakeNode::from_params(FakeRole::Sink, params)?)),
            "objarray_split" => Ok(Self::ObjArraySplit(SplitNode::from_params(params)?)),
            other => Err(FrameKitError::Configuration(format!("unknown topology node '{other}'"))),
        }
    }

    /// Short type name for logs, metrics and DOT output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Kernel(kernel) => kernel.kind(),
            Self::Tee(_) => "tee",
            Self::Delay(_) => "delay",
            Self::Fakesrc(_) => "fakesrc",
            Self::Fakesink(_) => "fakesink",
            Self::ObjArraySplit(_) => "objarray_split",
        }
    }

    /// Pad a topology node attaches to.
    pub const fn peer(&self) -> Option<PadId> {
        match self {
            Self::Kernel(_) => None,
            Self::Tee(node) => Some(node.peer()),
            Self::Delay(node) => Some(node.peer()),
            Self::Fakesrc(node) | Self::Fakesink(node) => Some(node.peer()),
            Self::ObjArraySplit(node) => Some(node.peer()),
        }
    }

    /// Fake nodes alias a peer's queue and never run.
    pub const fn is_fake(&self) -> bool {
        matches!(self, Self::Fakesrc(_) | Self::Fakesink(_))
    }

    /// Tee, Delay and ObjArraySplit pass their input's buffers to their
    /// outputs, so all their pads share one pool.
    pub const fn forwards_buffers(&self) -> bool {
        matches!(self, Self::Tee(_) | Self::Delay(_) | Self::ObjArraySplit(_))
    }

    /// Declares the node's pads. Kernels validate their configuration first;
    /// topology nodes shape themselves after `peer`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] for a rejected configuration,
    /// a missing peer, or a fake node whose peer cannot be aliased.
    pub fn init_pads(&mut self, peer: Option<&Pad>) -> Result<PadSignature> {
        match (self, peer) {
            (Self::Kernel(kernel), _) => {
                kernel.init_cfg()?;
                kernel.init_node()
            },
            (Self::Tee(node), Some(peer)) => Ok(node.signature(peer)),
            (Self::Delay(node), Some(peer)) => Ok(node.signature(peer)),
            (Self::Fakesrc(node) | Self::Fakesink(node), Some(peer)) => {
                node.check_peer(peer)?;
                Ok(node.signature(peer))
            },
            (Self::ObjArraySplit(node), Some(peer)) => Ok(node.signature(peer)),
            (other, None) => Err(FrameKitError::Configuration(format!(
                "{} node needs a peer pad",
                other.label()
            ))),
        }
    }

    /// Resolves the output exemplars from the resolved inputs.
    ///
    /// `attached` is the direction of the pad a topology node was attached to.
    pub(crate) fn infer(
        &self,
        sinks: &[Exemplar],
        srcs: &mut [Exemplar],
        attached: Option<PadDirection>,
    ) -> Result<()> {
        match self {
            Self::Kernel(kernel) => kernel.infer_outputs(sinks, srcs),
            Self::Tee(_) | Self::Delay(_) => {
                let input = first_input(self, sinks)?;
                for src in srcs.iter_mut() {
                    *src = src.unify(input)?;
                }
                Ok(())
            },
            Self::ObjArraySplit(node) => {
                node.validate(attached.unwrap_or(PadDirection::Sink), first_input(self, sinks)?)
            },
            Self::Fakesrc(_) | Self::Fakesink(_) => Ok(()),
        }
    }

    /// Creates the runtime side of the node once its queues exist.
    ///
    /// Kernels get their hardware target and parameter bindings; Delay primes
    /// its ring from the `current` output's pool.
    pub(crate) fn create(
        &mut self,
        node_name: &str,
        params: Vec<ParamBinding>,
        links: &NodeLinks,
        targets: &mut TargetAllocator,
    ) -> Result<()> {
        match self {
            Self::Kernel(kernel) => {
                let target = kernel.target_class().map(|class| targets.allocate(class)).transpose()?;
                if let Some(target) = &target {
                    tracing::debug!(node = %node_name, %target, "Assigned hardware target");
                }
                let ctx = KernelContext { node_name: node_name.to_string(), params, target };
                kernel.create_node(&ctx)
            },
            Self::Delay(node) => {
                let current = links.outputs.first().ok_or_else(|| {
                    FrameKitError::InvalidState(format!("delay '{node_name}' has no outputs"))
                })?;
                let primed = node.prime(|| {
                    current.pool.obtain_output(current.port, Wait::Nonblocking)?.ok_or_else(|| {
                        FrameKitError::ResourceCreation(format!(
                            "pool '{}' is too small to prime the ring of delay '{node_name}'",
                            current.pool.name()
                        ))
                    })
                });
                if primed.is_err() {
                    node.clear();
                }
                primed
            },
            Self::Tee(_) | Self::Fakesrc(_) | Self::Fakesink(_) | Self::ObjArraySplit(_) => Ok(()),
        }
    }

    /// Runs one cycle over `inputs` (one per sink pad, in pad order) and
    /// routes the results. Returns the number of buffers sent.
    pub(crate) fn run(&mut self, links: &NodeLinks, inputs: Vec<Buf>, wait: Wait) -> Result<usize> {
        match self {
            Self::Kernel(kernel) => run_kernel(kernel.as_mut(), links, inputs, wait),
            Self::Tee(node) => {
                let input = single(inputs)?;
                hand_back(links, &input)?;
                route_all(links, node.fan_out(input), wait)
            },
            Self::Delay(node) => {
                let input = single(inputs)?;
                hand_back(links, &input)?;
                let out = node.rotate(input)?;
                route_all(links, vec![out.current, out.aged], wait)
            },
            Self::ObjArraySplit(node) => route_all(links, node.split(single(inputs)?), wait),
            Self::Fakesrc(_) | Self::Fakesink(_) => {
                Err(FrameKitError::InvalidState("fake nodes are never scheduled".to_string()))
            },
        }
    }

    /// Releases runtime state. Kernel errors are logged, not returned.
    pub(crate) fn delete(&mut self, node_name: &str) {
        match self {
            Self::Kernel(kernel) => {
                if let Err(e) = kernel.delete_node() {
                    tracing::warn!(node = %node_name, error = %e, "Kernel delete failed");
                }
            },
            Self::Delay(node) => node.clear(),
            Self::Tee(_) | Self::Fakesrc(_) | Self::Fakesink(_) | Self::ObjArraySplit(_) => {},
        }
    }
}

fn first_input<'a>(kind: &NodeKind, sinks: &'a [Exemplar]) -> Result<&'a Exemplar> {
    sinks.first().ok_or_else(|| {
        FrameKitError::Configuration(format!("{} node has no input pad", kind.label()))
    })
}

fn single(inputs: Vec<Buf>) -> Result<Buf> {
    let count = inputs.len();
    let mut inputs = inputs.into_iter();
    match (inputs.next(), inputs.next()) {
        (Some(buf), None) => Ok(buf),
        _ => Err(FrameKitError::Runtime(format!("expected one input buffer, got {count}"))),
    }
}

/// Returns a host-fed input to the host while the node keeps forwarding it.
fn hand_back(links: &NodeLinks, input: &Buf) -> Result<()> {
    match links.inputs.first() {
        Some(link) if link.host_fed => link.pool.publish(link.port, input.share()),
        _ => Ok(()),
    }
}

fn route_all(links: &NodeLinks, outputs: Vec<Buf>, wait: Wait) -> Result<usize> {
    let sent = outputs.len();
    for (link, buf) in links.outputs.iter().zip(outputs) {
        link.route(buf, wait)?;
    }
    Ok(sent)
}

fn run_kernel(
    kernel: &mut dyn HwKernel,
    links: &NodeLinks,
    inputs: Vec<Buf>,
    wait: Wait,
) -> Result<usize> {
    let mut outputs = Vec::with_capacity(links.outputs.len());
    for link in &links.outputs {
        match link.pool.obtain_output(link.port, wait) {
            Ok(Some(buf)) => outputs.push(buf),
            Ok(None) => {
                links.dispose_inputs(inputs)?;
                return Err(FrameKitError::Runtime(format!(
                    "no free buffer in pool '{}'",
                    link.pool.name()
                )));
            },
            Err(e) => {
                let _ = links.dispose_inputs(inputs);
                return Err(e);
            },
        }
    }

    let mut slots: Vec<Option<Buf>> =
        std::iter::repeat_with(|| None).take(links.param_count).collect();
    let bound = links
        .inputs
        .iter()
        .map(|l| l.param_index)
        .zip(inputs)
        .chain(links.outputs.iter().map(|l| l.param_index).zip(outputs));
    for (index, buf) in bound {
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(buf);
        }
    }
    let params: Vec<Buf> = slots.into_iter().collect::<Option<_>>().ok_or_else(|| {
        FrameKitError::Runtime(format!("{} parameters are not contiguous", kernel.kind()))
    })?;

    let result = kernel.process(&params);

    let mut slots: Vec<Option<Buf>> = params.into_iter().map(Some).collect();
    let mut take = |index: usize| slots.get_mut(index).and_then(Option::take);
    let consumed: Vec<Buf> = links.inputs.iter().filter_map(|l| take(l.param_index)).collect();
    // Host-fed inputs go back whether or not the kernel succeeded.
    let disposed = links.dispose_inputs(consumed);
    result?;
    disposed?;

    let produced: Vec<Buf> = links.outputs.iter().filter_map(|l| take(l.param_index)).collect();
    route_all(links, produced, wait)
}
