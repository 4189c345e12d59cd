// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The graph object: node table, linking, verification and teardown.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Instant;

use framekit_core::stats::snapshot;
use framekit_core::{
    Exemplar, FrameKitError, GraphState, NodeId, NodeState, NodeStats, Pad, PadDirection, PadId, PadQueue,
    ParamBinding, PoolStats, PortRole, Result, StatsHandle, TargetAllocator, Wait,
};

use crate::config::{GraphConfig, ScheduleMode};
use crate::executor::{
    AutoExecutor, Executor, ExplicitExecutor, GraphMetrics, NodeLinks, NodeRuntime, StartError,
};
use crate::node_kind::NodeKind;
use crate::verify::{self, in_node, Allocation, PoolLayout};

/// A node as held by its graph.
#[derive(Debug)]
pub struct NodeObj {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) label: &'static str,
    /// Moved into the executor while the graph is live.
    pub(crate) kind: Option<NodeKind>,
    pub(crate) sinks: Vec<Pad>,
    pub(crate) srcs: Vec<Pad>,
    pub(crate) state: NodeState,
    pub(crate) fake: bool,
    /// Direction of the pad a topology node was attached to.
    pub(crate) attached: Option<PadDirection>,
}

impl NodeObj {
    pub const fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type name of the node (`tee`, `delay`, or the kernel's own kind).
    pub const fn label(&self) -> &'static str {
        self.label
    }

    pub const fn state(&self) -> NodeState {
        self.state
    }

    pub fn sinks(&self) -> &[Pad] {
        &self.sinks
    }

    pub fn srcs(&self) -> &[Pad] {
        &self.srcs
    }

    pub const fn is_fake(&self) -> bool {
        self.fake
    }

    pub fn pad(&self, id: PadId) -> Option<&Pad> {
        if id.node != self.id {
            return None;
        }
        match id.direction {
            PadDirection::Sink => self.sinks.get(id.index),
            PadDirection::Src => self.srcs.get(id.index),
        }
    }

    fn pad_mut(&mut self, id: PadId) -> Option<&mut Pad> {
        if id.node != self.id {
            return None;
        }
        match id.direction {
            PadDirection::Sink => self.sinks.get_mut(id.index),
            PadDirection::Src => self.srcs.get_mut(id.index),
        }
    }

    fn advance_to(&mut self, next: NodeState) {
        if self.state.can_advance_to(next) {
            self.state = next;
        }
    }
}

/// Link changes needed to attach a topology node.
#[derive(Debug, Default)]
struct AttachPlan {
    unlink: Option<(PadId, PadId)>,
    link: Vec<(PadId, PadId)>,
}

struct LiveGraph {
    allocation: Allocation,
    executor: Option<Executor>,
}

/// A dataflow graph of kernels and topology nodes.
///
/// ```text
/// Building ──verify──▶ Verified ──schedule──▶ Running
///    │                    │                     │
///    └───────────────── clean ──────────────────┴──▶ Cleaned
/// ```
///
/// Nodes and links can only be added while `Building`. Verification allocates
/// one buffer pool per group of pads that share buffers, creates every kernel
/// instance and starts the executor; if any step fails nothing is kept.
pub struct Graph {
    config: GraphConfig,
    state: GraphState,
    nodes: Vec<NodeObj>,
    names: HashMap<String, NodeId>,
    targets: TargetAllocator,
    stats: Vec<(String, StatsHandle)>,
    live: Option<LiveGraph>,
    metrics: GraphMetrics,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new(GraphConfig::default())
    }
}

impl Graph {
    pub fn new(config: GraphConfig) -> Self {
        let targets = TargetAllocator::new(&config.targets);
        Self {
            config,
            state: GraphState::Building,
            nodes: Vec::new(),
            names: HashMap::new(),
            targets,
            stats: Vec::new(),
            live: None,
            metrics: GraphMetrics::new(),
        }
    }

    pub const fn state(&self) -> GraphState {
        self.state
    }

    pub const fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeObj> {
        self.nodes.get(id.0)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&NodeObj> {
        self.names.get(name).and_then(|id| self.node(*id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeObj> {
        self.nodes.iter()
    }

    pub fn pad(&self, id: PadId) -> Option<&Pad> {
        self.nodes.get(id.node.0)?.pad(id)
    }

    fn pad_mut(&mut self, id: PadId) -> Option<&mut Pad> {
        self.nodes.get_mut(id.node.0)?.pad_mut(id)
    }

    fn require_pad(&self, id: PadId) -> Result<&Pad> {
        self.pad(id).ok_or_else(|| FrameKitError::Configuration(format!("unknown pad {id}")))
    }

    fn ensure_building(&self, what: &str) -> Result<()> {
        if self.state.is_building() {
            Ok(())
        } else {
            Err(FrameKitError::InvalidState(format!("cannot {what} while the graph is {}", self.state)))
        }
    }

    fn advance_nodes(&mut self, next: NodeState) {
        for node in &mut self.nodes {
            node.advance_to(next);
        }
    }

    /// Adds a node and declares its pads.
    ///
    /// Topology nodes are attached to their peer pad right away. Tee and Delay
    /// splice themselves into an existing link on that pad; fake nodes alias
    /// an unlinked pad; ObjArraySplit consumes an unlinked src pad.
    ///
    /// # Errors
    ///
    /// - [`FrameKitError::InvalidState`] unless the graph is `Building`
    /// - [`FrameKitError::Configuration`] for a duplicate name, a rejected
    ///   configuration or an unusable peer pad
    pub fn add_node(&mut self, name: impl Into<String>, mut kind: NodeKind) -> Result<NodeId> {
        let name = name.into();
        self.ensure_building("add nodes")?;
        if self.names.contains_key(&name) {
            return Err(FrameKitError::Configuration(format!("duplicate node name '{name}'")));
        }

        let id = NodeId(self.nodes.len());
        let peer = kind.peer().map(|p| self.require_pad(p).cloned()).transpose()?;
        let mut state = NodeState::Uninitialized;
        let signature = kind.init_pads(peer.as_ref()).map_err(|e| in_node(&name, e))?;
        state.advance(NodeState::Initialized)?;

        let plan = peer
            .as_ref()
            .map(|peer| match &kind {
                NodeKind::Fakesrc(_) | NodeKind::Fakesink(_) => Ok(Self::plan_alias(id, peer)),
                NodeKind::ObjArraySplit(_) => Self::plan_split(id, peer),
                NodeKind::Tee(_) | NodeKind::Delay(_) | NodeKind::Kernel(_) => {
                    Ok(Self::plan_splice(id, peer))
                },
            })
            .transpose()
            .map_err(|e| in_node(&name, e))?;

        let (sinks, srcs) = signature.into_pads(id, self.config.default_bufq_depth);
        state.advance(NodeState::Added)?;
        let label = kind.label();
        let fake = kind.is_fake();
        self.nodes.push(NodeObj {
            id,
            name: name.clone(),
            label,
            kind: Some(kind),
            sinks,
            srcs,
            state,
            fake,
            attached: peer.as_ref().map(Pad::direction),
        });

        if let Some(plan) = &plan {
            if let Err(e) = self.apply_attach(plan) {
                self.nodes.pop();
                return Err(in_node(&name, e));
            }
        }

        self.names.insert(name.clone(), id);
        tracing::debug!(node = %name, kind = label, id = id.0, "Added node");
        Ok(id)
    }

    fn plan_alias(id: NodeId, peer: &Pad) -> AttachPlan {
        let link = match peer.direction() {
            PadDirection::Sink => (id.src(0), peer.id),
            PadDirection::Src => (peer.id, id.sink(0)),
        };
        AttachPlan { unlink: None, link: vec![link] }
    }

    fn plan_split(id: NodeId, peer: &Pad) -> Result<AttachPlan> {
        match (peer.direction(), peer.peer) {
            (PadDirection::Src, Some(linked)) => Err(FrameKitError::Configuration(format!(
                "objarray split peer {} is already linked to {linked}",
                peer.id
            ))),
            (PadDirection::Src, None) => {
                Ok(AttachPlan { unlink: None, link: vec![(peer.id, id.sink(0))] })
            },
            // Rejected at verification with the partition checks.
            (PadDirection::Sink, _) => Ok(AttachPlan::default()),
        }
    }

    /// Moves an existing link on `peer` behind the node's first output.
    fn plan_splice(id: NodeId, peer: &Pad) -> AttachPlan {
        let (input, first_out) = (id.sink(0), id.src(0));
        match (peer.direction(), peer.peer) {
            (PadDirection::Src, consumer) => AttachPlan {
                unlink: consumer.map(|c| (peer.id, c)),
                link: std::iter::once((peer.id, input))
                    .chain(consumer.map(|c| (first_out, c)))
                    .collect(),
            },
            (PadDirection::Sink, producer) => AttachPlan {
                unlink: producer.map(|p| (p, peer.id)),
                link: std::iter::once((first_out, peer.id))
                    .chain(producer.map(|p| (p, input)))
                    .collect(),
            },
        }
    }

    fn apply_attach(&mut self, plan: &AttachPlan) -> Result<()> {
        for &(src, sink) in &plan.link {
            let (a, b) = (self.require_pad(src)?, self.require_pad(sink)?);
            a.exemplar.unify(&b.exemplar)?;
        }
        if let Some((src, sink)) = plan.unlink {
            for pad in [src, sink] {
                if let Some(pad) = self.pad_mut(pad) {
                    pad.peer = None;
                }
            }
        }
        for &(src, sink) in &plan.link {
            self.connect(src, sink)?;
        }
        Ok(())
    }

    fn connect(&mut self, src: PadId, sink: PadId) -> Result<()> {
        let (exemplar, depth) = {
            let (a, b) = (self.require_pad(src)?, self.require_pad(sink)?);
            (a.exemplar.unify(&b.exemplar)?, a.bufq_depth.max(b.bufq_depth))
        };
        for (id, peer) in [(src, sink), (sink, src)] {
            if let Some(pad) = self.pad_mut(id) {
                pad.exemplar = exemplar.clone();
                pad.bufq_depth = depth;
                pad.peer = Some(peer);
            }
            if let Some(node) = self.nodes.get_mut(id.node.0) {
                node.advance_to(NodeState::Linked);
            }
        }
        Ok(())
    }

    /// Links a src pad to a sink pad, in either argument order.
    ///
    /// Both pads end up with the unified exemplar and the larger queue depth.
    ///
    /// # Errors
    ///
    /// - [`FrameKitError::InvalidState`] unless the graph is `Building`
    /// - [`FrameKitError::Configuration`] for unknown pads, two pads of the
    ///   same direction, an already linked pad or incompatible exemplars
    pub fn link_pads(&mut self, a: PadId, b: PadId) -> Result<()> {
        self.ensure_building("link pads")?;
        let (pa, pb) = (self.require_pad(a)?, self.require_pad(b)?);
        let (src, sink) = match (pa.direction(), pb.direction()) {
            (PadDirection::Src, PadDirection::Sink) => (a, b),
            (PadDirection::Sink, PadDirection::Src) => (b, a),
            (direction, _) => {
                return Err(FrameKitError::Configuration(format!(
                    "cannot link {a} to {b}: both are {direction:?} pads"
                )));
            },
        };
        for pad in [pa, pb] {
            if let Some(peer) = pad.peer {
                return Err(FrameKitError::Configuration(format!(
                    "pad {} is already linked to {peer}",
                    pad.id
                )));
            }
        }
        self.connect(src, sink)?;
        tracing::debug!(%src, %sink, "Linked pads");
        Ok(())
    }

    /// Verifies the graph and brings it to life.
    ///
    /// On success every pool is allocated, every kernel instance created and
    /// the executor started (in auto-queue mode the graph is `Running` right
    /// away). On failure the graph stays `Building` with nothing allocated.
    ///
    /// # Errors
    ///
    /// - [`FrameKitError::InvalidState`] unless the graph is `Building`
    /// - [`FrameKitError::Configuration`] for cycles, incompatible or
    ///   unresolved exemplars, invalid topology node settings
    /// - [`FrameKitError::ResourceCreation`] / [`FrameKitError::ExternalDevice`]
    ///   when pools or kernel instances cannot be created
    pub fn verify(&mut self) -> Result<()> {
        self.ensure_building("verify")?;
        let started = Instant::now();

        let result = self.try_verify();
        if let Err(e) = &result {
            self.targets.reset();
            tracing::warn!(error = %e, "Graph verification failed");
            return result;
        }

        let auto = self.config.schedule_mode == ScheduleMode::AutoQueue;
        self.state = if auto { GraphState::Running } else { GraphState::Verified };
        self.advance_nodes(NodeState::Verified);
        if auto {
            self.advance_nodes(NodeState::Running);
        }
        tracing::info!(
            nodes = self.nodes.len(),
            pools = self.pool_count(),
            mode = ?self.config.schedule_mode,
            duration_ms = started.elapsed().as_millis(),
            "Graph verified"
        );
        Ok(())
    }

    fn try_verify(&mut self) -> Result<()> {
        let order = verify::topological_order(&self.nodes)?;
        let exemplars = verify::infer_exemplars(&self.nodes, &order)?;
        let layout = verify::plan_pools(&self.nodes, &exemplars)?;
        let allocation = verify::allocate(&layout, self.config.max_pool_bytes)?;

        let (runtimes, stats) = self.create_runtimes(&order, &exemplars, &allocation)?;
        let executor = match self.config.schedule_mode {
            ScheduleMode::Explicit => ExplicitExecutor::start(
                runtimes,
                Wait::from_limit(self.config.cycle_timeout()),
                self.metrics.clone(),
            )
            .map(Executor::Explicit),
            ScheduleMode::AutoQueue => AutoExecutor::start(runtimes).map(Executor::Auto),
        };
        let executor = match executor {
            Ok(executor) => executor,
            Err(StartError { error, runtimes }) => {
                allocation.close();
                self.teardown(runtimes);
                return Err(error);
            },
        };

        self.apply_layout(exemplars, &layout);
        self.stats = stats;
        self.live = Some(LiveGraph { allocation, executor: Some(executor) });
        Ok(())
    }

    /// Writes the resolved exemplars and pool depths back into the pads.
    fn apply_layout(&mut self, exemplars: HashMap<PadId, Exemplar>, layout: &PoolLayout) {
        for (id, exemplar) in exemplars {
            if let Some(pad) = self.pad_mut(id) {
                pad.exemplar = exemplar;
            }
        }
        for group in &layout.groups {
            for &id in &group.pads {
                if let Some(pad) = self.pad_mut(id) {
                    if pad.bufq_depth < group.depth {
                        tracing::debug!(
                            pad = %id,
                            declared = pad.bufq_depth,
                            depth = group.depth,
                            "Raised pad queue depth to its shared pool's depth"
                        );
                    }
                    pad.bufq_depth = group.depth;
                }
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn create_runtimes(
        &mut self,
        order: &[NodeId],
        exemplars: &HashMap<PadId, Exemplar>,
        allocation: &Allocation,
    ) -> Result<(Vec<NodeRuntime>, Vec<(String, StatsHandle)>)> {
        let mut runtimes = Vec::new();
        let mut stats = Vec::new();
        for &id in order {
            if self.nodes[id.0].fake {
                continue;
            }
            match self.create_runtime(id, exemplars, allocation) {
                Ok((runtime, handle)) => {
                    stats.push((runtime.name.clone(), handle));
                    runtimes.push(runtime);
                },
                Err(e) => {
                    self.teardown(runtimes);
                    return Err(e);
                },
            }
        }
        Ok((runtimes, stats))
    }

    fn create_runtime(
        &mut self,
        id: NodeId,
        exemplars: &HashMap<PadId, Exemplar>,
        allocation: &Allocation,
    ) -> Result<(NodeRuntime, StatsHandle)> {
        let auto = self.config.schedule_mode == ScheduleMode::AutoQueue;
        let node = &self.nodes[id.0];
        let name = node.name.clone();
        let links = NodeLinks::bind(node, |pad| allocation.port_of(pad), &self.config, auto)?;
        let params = param_bindings(node, exemplars).map_err(|e| in_node(&name, e))?;

        let Some(mut kind) = self.nodes[id.0].kind.take() else {
            return Err(FrameKitError::InvalidState(format!("node '{name}' is already running")));
        };
        if let Err(e) = kind.create(&name, params, &links, &mut self.targets) {
            self.nodes[id.0].kind = Some(kind);
            return Err(in_node(&name, e));
        }
        tracing::debug!(node = %name, kind = kind.label(), "Created node");

        let handle = StatsHandle::default();
        Ok((NodeRuntime::new(id, name, kind, links, handle.clone()), handle))
    }

    /// Deletes node instances and hands their kinds back to the node table.
    fn teardown(&mut self, runtimes: Vec<NodeRuntime>) {
        for runtime in runtimes.into_iter().rev() {
            let id = runtime.id;
            let kind = runtime.into_kind();
            if let Some(node) = self.nodes.get_mut(id.0) {
                node.kind = Some(kind);
            }
        }
    }

    fn explicit_executor(&self, what: &str) -> Result<&ExplicitExecutor> {
        if !self.state.is_live() {
            return Err(FrameKitError::InvalidState(format!(
                "cannot {what} while the graph is {}",
                self.state
            )));
        }
        match self.live.as_ref().and_then(|live| live.executor.as_ref()) {
            Some(Executor::Explicit(executor)) => Ok(executor),
            Some(Executor::Auto(_)) => {
                Err(FrameKitError::InvalidState(format!("cannot {what} in auto-queue mode")))
            },
            None => Err(FrameKitError::InvalidState(format!("cannot {what}: no executor"))),
        }
    }

    /// Queues one cycle over every node, in topological order.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::InvalidState`] unless the graph is verified in
    /// explicit mode.
    pub fn schedule(&mut self) -> Result<()> {
        self.explicit_executor("schedule")?.schedule();
        if self.state == GraphState::Verified {
            self.state = GraphState::Running;
            self.advance_nodes(NodeState::Running);
        }
        Ok(())
    }

    /// Blocks until every scheduled cycle completed.
    ///
    /// # Errors
    ///
    /// Returns the first node failure since the previous `wait`, or
    /// [`FrameKitError::InvalidState`] outside explicit mode.
    pub fn wait(&self) -> Result<()> {
        self.explicit_executor("wait")?.wait()
    }

    /// Runs exactly one cycle: `schedule` then `wait`.
    ///
    /// # Errors
    ///
    /// See [`Self::schedule`] and [`Self::wait`].
    pub fn process(&mut self) -> Result<()> {
        self.schedule()?;
        self.wait()
    }

    /// Cycles completed in explicit mode.
    pub fn cycles_completed(&self) -> u64 {
        self.explicit_executor("count cycles").map_or(0, ExplicitExecutor::completed)
    }

    /// Oldest node failure recorded by an auto-queue runner.
    pub fn take_runtime_error(&self) -> Option<FrameKitError> {
        match self.live.as_ref()?.executor.as_ref()? {
            Executor::Auto(executor) => executor.take_error(),
            Executor::Explicit(_) => None,
        }
    }

    /// Host handle on an exposed pad (or a fake node's pad).
    ///
    /// # Errors
    ///
    /// - [`FrameKitError::InvalidState`] unless the graph is verified or running
    /// - [`FrameKitError::Configuration`] for unknown pads and pads linked
    ///   inside the graph
    pub fn pad_queue(&self, pad: PadId) -> Result<PadQueue> {
        let live = match (&self.live, self.state.is_live()) {
            (Some(live), true) => live,
            _ => {
                return Err(FrameKitError::InvalidState(format!(
                    "pad queues exist only on a verified graph, this one is {}",
                    self.state
                )));
            },
        };
        self.require_pad(pad)?;
        let bound = live.allocation.port_of(pad)?;
        if bound.role == PortRole::Internal {
            return Err(FrameKitError::Configuration(format!(
                "pad {pad} is linked inside the graph and has no host queue"
            )));
        }
        PadQueue::new(bound.pool, bound.port)
    }

    /// Stops execution and releases every resource. Idempotent.
    ///
    /// Blocked host calls on pad queues fail with
    /// [`FrameKitError::PoolClosed`]. Buffers the host still holds stay valid
    /// until dropped.
    pub fn clean(&mut self) {
        match self.state {
            GraphState::Cleaned => return,
            GraphState::Building => {
                self.state = GraphState::Cleaned;
                self.advance_nodes(NodeState::Cleaned);
                tracing::debug!("Cleaned unverified graph");
                return;
            },
            GraphState::Verified | GraphState::Running => {},
        }

        if let Some(live) = self.live.take() {
            live.allocation.close();
            if let Some(executor) = live.executor {
                let runtimes = executor.stop();
                self.teardown(runtimes);
            }
            for pool in &live.allocation.pools {
                let outstanding = pool.outstanding();
                if outstanding > 0 {
                    tracing::warn!(pool = pool.name(), outstanding, "Pool closed with buffers still held");
                }
            }
        }

        self.targets.reset();
        self.state = GraphState::Cleaned;
        self.advance_nodes(NodeState::Cleaned);
        tracing::info!(nodes = self.nodes.len(), "Graph cleaned");
    }

    /// Last published statistics per scheduled node.
    pub fn node_stats(&self) -> HashMap<String, NodeStats> {
        self.stats.iter().map(|(name, handle)| (name.clone(), snapshot(handle))).collect()
    }

    pub fn pool_stats(&self) -> Vec<PoolStats> {
        self.live
            .as_ref()
            .map(|live| live.allocation.pools.iter().map(|pool| pool.stats()).collect())
            .unwrap_or_default()
    }

    pub fn pool_count(&self) -> usize {
        self.live.as_ref().map_or(0, |live| live.allocation.pools.len())
    }

    /// Graphviz rendering of the nodes and links. Exposed pads are drawn as
    /// host endpoints.
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph framekit {\n    rankdir=LR;\n");
        for node in &self.nodes {
            let shape = if node.fake { "ellipse" } else { "box" };
            writeln!(
                dot,
                "    n{} [label=\"{}\\n{}\" shape={shape}];",
                node.id.0, node.name, node.label
            )
            .ok();
        }
        for node in &self.nodes {
            for pad in &node.srcs {
                match pad.peer {
                    Some(peer) => writeln!(
                        dot,
                        "    n{} -> n{} [label=\"{}\" taillabel=\"{}\" headlabel=\"{}\"];",
                        node.id.0,
                        peer.node.0,
                        pad.exemplar,
                        pad.name,
                        self.pad(peer).map_or("?", |p| p.name.as_str())
                    ),
                    None => writeln!(
                        dot,
                        "    \"{}\" [shape=plaintext];\n    n{} -> \"{}\" [label=\"{}\" taillabel=\"{}\"];",
                        pad.id, node.id.0, pad.id, pad.exemplar, pad.name
                    ),
                }
                .ok();
            }
            for pad in node.sinks.iter().filter(|p| p.is_exposed()) {
                writeln!(
                    dot,
                    "    \"{}\" [shape=plaintext];\n    \"{}\" -> n{} [label=\"{}\" headlabel=\"{}\"];",
                    pad.id, pad.id, node.id.0, pad.exemplar, pad.name
                )
                .ok();
            }
        }
        dot.push_str("}\n");
        dot
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        self.clean();
    }
}

/// Kernel parameters ordered by index; indices must be exactly `0..n`.
fn param_bindings(
    node: &NodeObj,
    exemplars: &HashMap<PadId, Exemplar>,
) -> Result<Vec<ParamBinding>> {
    let mut params: Vec<(usize, ParamBinding)> = node
        .sinks
        .iter()
        .chain(&node.srcs)
        .map(|pad| {
            let exemplar = exemplars.get(&pad.id).cloned().unwrap_or_else(|| pad.exemplar.clone());
            (pad.param_index, ParamBinding { pad: pad.id, name: pad.name.clone(), exemplar })
        })
        .collect();
    params.sort_by_key(|(index, _)| *index);
    for (expected, (index, binding)) in params.iter().enumerate() {
        if *index != expected {
            return Err(FrameKitError::Configuration(format!(
                "pad '{}' has parameter index {index}, expected {expected}",
                binding.name
            )));
        }
    }
    Ok(params.into_iter().map(|(_, binding)| binding).collect())
}
