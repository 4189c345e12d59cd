// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Graph verification.
//!
//! Verification runs in stages, each a pure function over the node table so a
//! failure leaves nothing behind:
//!
//! 1. [`topological_order`]: node execution order; cycles are rejected.
//! 2. [`infer_exemplars`]: resolves channel wildcards pad by pad, in order.
//! 3. [`plan_pools`]: groups pads that must share buffers into pools, with a
//!    depth, a channel window and a port role per pad.
//! 4. [`allocate`]: creates the pools and their ports.
//!
//! Node creation and executor start-up happen in the graph, which owns the
//! rollback.

use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use std::sync::Arc;

use framekit_core::{
    BufferPool, Exemplar, FrameKitError, NodeId, Pad, PadDirection, PadId, PortId, PortRole,
    Result,
};

use crate::graph::NodeObj;
use crate::node_kind::NodeKind;

/// Rewrites configuration errors so they name the offending node.
pub(crate) fn in_node(name: &str, err: FrameKitError) -> FrameKitError {
    match err {
        FrameKitError::Configuration(msg) => FrameKitError::Configuration(format!("node '{name}': {msg}")),
        FrameKitError::ResourceCreation(msg) => {
            FrameKitError::ResourceCreation(format!("node '{name}': {msg}"))
        },
        other => other,
    }
}

fn kind_of(node: &NodeObj) -> Result<&NodeKind> {
    node.kind.as_ref().ok_or_else(|| {
        FrameKitError::InvalidState(format!("node '{}' is owned by a running graph", node.name))
    })
}

fn pad_of(nodes: &[NodeObj], id: PadId) -> Result<&Pad> {
    nodes
        .get(id.node.0)
        .and_then(|node| node.pad(id))
        .ok_or_else(|| FrameKitError::Configuration(format!("unknown pad {id}")))
}

/// Kahn's algorithm over src→sink links. Ready nodes are taken in id order so
/// the result is deterministic.
///
/// # Errors
///
/// Returns [`FrameKitError::Configuration`] naming the nodes on a cycle.
pub(crate) fn topological_order(nodes: &[NodeObj]) -> Result<Vec<NodeId>> {
    let mut indegree = vec![0usize; nodes.len()];
    let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for node in nodes {
        for peer in node.srcs().iter().filter_map(|pad| pad.peer) {
            downstream[node.id.0].push(peer.node.0);
            indegree[peer.node.0] += 1;
        }
    }

    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(next) = ready.pop_first() {
        order.push(NodeId(next));
        for &consumer in &downstream[next] {
            indegree[consumer] -= 1;
            if indegree[consumer] == 0 {
                ready.insert(consumer);
            }
        }
    }

    if order.len() != nodes.len() {
        let stuck: Vec<&str> =
            nodes.iter().filter(|n| indegree[n.id.0] > 0).map(|n| n.name.as_str()).collect();
        return Err(FrameKitError::Configuration(format!(
            "graph contains a cycle through: {}",
            stuck.join(", ")
        )));
    }
    Ok(order)
}

/// Resolves every pad's exemplar.
///
/// Sinks unify with their upstream src; srcs come from the node's inference.
/// Nothing is written back: the caller applies the map once everything else
/// succeeded.
///
/// # Errors
///
/// Returns [`FrameKitError::Configuration`] for incompatible links, rejected
/// inputs or channel counts that stay unresolved.
pub(crate) fn infer_exemplars(
    nodes: &[NodeObj],
    order: &[NodeId],
) -> Result<HashMap<PadId, Exemplar>> {
    let mut resolved: HashMap<PadId, Exemplar> = HashMap::new();

    for &id in order {
        let node = &nodes[id.0];
        let kind = kind_of(node)?;

        let mut sinks = Vec::with_capacity(node.sinks().len());
        for pad in node.sinks() {
            let exemplar = match pad.peer {
                Some(peer) => {
                    let upstream = resolved.get(&peer).ok_or_else(|| {
                        FrameKitError::InvalidState(format!("pad {peer} visited out of order"))
                    })?;
                    pad.exemplar.unify(upstream).map_err(|e| in_node(&node.name, e))?
                },
                None => pad.exemplar.clone(),
            };
            sinks.push(exemplar);
        }
        let mut srcs: Vec<Exemplar> = node.srcs().iter().map(|p| p.exemplar.clone()).collect();
        kind.infer(&sinks, &mut srcs, node.attached).map_err(|e| in_node(&node.name, e))?;

        let pads = node.sinks().iter().zip(sinks).chain(node.srcs().iter().zip(srcs));
        for (pad, exemplar) in pads {
            if !exemplar.is_resolved() {
                return Err(FrameKitError::Configuration(format!(
                    "node '{}': pad '{}' has an unresolved channel count",
                    node.name, pad.name
                )));
            }
            resolved.insert(pad.id, exemplar);
        }
    }
    Ok(resolved)
}

/// A pad bound to its port in a pool.
#[derive(Debug, Clone)]
pub(crate) struct PadPort {
    pub pool: Arc<BufferPool>,
    pub port: PortId,
    pub role: PortRole,
    /// Depth of the pool, the pad's effective queue depth.
    pub depth: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct GroupMember {
    pub pad: PadId,
    pub role: PortRole,
    pub window: Range<usize>,
}

/// Pads that share one buffer pool.
#[derive(Debug, Clone)]
pub(crate) struct PoolGroup {
    pub name: String,
    pub exemplar: Exemplar,
    pub depth: usize,
    /// Pads that get a port.
    pub members: Vec<GroupMember>,
    /// Every pad in the group, fake pads included.
    pub pads: Vec<PadId>,
}

#[derive(Debug, Default)]
pub(crate) struct PoolLayout {
    pub groups: Vec<PoolGroup>,
    /// Fake pads and the pad whose port they share.
    pub aliases: HashMap<PadId, PadId>,
}

fn role_of(nodes: &[NodeObj], pad: &Pad) -> PortRole {
    let peer_is_fake = |peer: PadId| nodes.get(peer.node.0).is_some_and(|n| n.fake);
    match (pad.direction(), pad.peer) {
        (PadDirection::Sink, None) => PortRole::HostInput,
        (PadDirection::Src, None) => PortRole::HostOutput,
        (PadDirection::Sink, Some(peer)) if peer_is_fake(peer) => PortRole::HostInput,
        (PadDirection::Src, Some(peer)) if peer_is_fake(peer) => PortRole::HostOutput,
        (_, Some(_)) => PortRole::Internal,
    }
}

/// Pads where a pool starts: outputs of buffer producers and inputs the host feeds.
fn is_root(node: &NodeObj, kind: &NodeKind, pad: &Pad) -> bool {
    match pad.direction() {
        PadDirection::Src => matches!(kind, NodeKind::Kernel(_) | NodeKind::Fakesrc(_)),
        PadDirection::Sink => pad.peer.is_none() && !node.fake,
    }
}

/// Groups pads into pools.
///
/// A group starts at a root pad and follows links downstream and through
/// nodes that forward their input's buffers. Each pad gets the channel window
/// it sees: the full range, or a partition of it behind an ObjArraySplit.
///
/// # Errors
///
/// Returns [`FrameKitError::Configuration`] if a pad is reachable from no
/// producer or its channel count disagrees with its window.
pub(crate) fn plan_pools(
    nodes: &[NodeObj],
    exemplars: &HashMap<PadId, Exemplar>,
) -> Result<PoolLayout> {
    let mut layout = PoolLayout::default();
    let mut visited: HashMap<PadId, usize> = HashMap::new();

    for node in nodes {
        let kind = kind_of(node)?;
        let roots = node.sinks().iter().chain(node.srcs()).filter(|pad| is_root(node, kind, pad));
        for root in roots {
            let exemplar = exemplars.get(&root.id).cloned().ok_or_else(|| {
                FrameKitError::InvalidState(format!("pad {} was not inferred", root.id))
            })?;
            let group_index = layout.groups.len();
            let mut group = PoolGroup {
                name: format!("{}.{}", node.name, root.name),
                depth: 0,
                members: Vec::new(),
                pads: Vec::new(),
                exemplar: exemplar.clone(),
            };

            let mut stack = vec![(root.id, 0..exemplar.channels as usize)];
            while let Some((pad_id, window)) = stack.pop() {
                if visited.insert(pad_id, group_index).is_some() {
                    return Err(FrameKitError::Configuration(format!(
                        "pad {pad_id} is fed by more than one producer"
                    )));
                }
                let owner = &nodes[pad_id.node.0];
                let owner_kind = kind_of(owner)?;
                let pad = pad_of(nodes, pad_id)?;
                let channels = exemplars.get(&pad_id).map_or(0, |e| e.channels as usize);
                if channels != window.len() {
                    return Err(FrameKitError::Configuration(format!(
                        "node '{}': pad '{}' has {channels} channels but sees {} of pool '{}'",
                        owner.name,
                        pad.name,
                        window.len(),
                        group.name
                    )));
                }

                group.depth = group.depth.max(pad.bufq_depth);
                group.pads.push(pad_id);
                if owner.fake {
                    if let Some(peer) = pad.peer {
                        layout.aliases.insert(pad_id, peer);
                    }
                } else {
                    group.members.push(GroupMember {
                        pad: pad_id,
                        role: role_of(nodes, pad),
                        window: window.clone(),
                    });
                }

                match pad.direction() {
                    PadDirection::Src => {
                        if let Some(peer) = pad.peer {
                            stack.push((peer, window));
                        }
                    },
                    PadDirection::Sink if owner_kind.forwards_buffers() => {
                        let windows = match owner_kind {
                            NodeKind::ObjArraySplit(split) => split.windows(&window),
                            _ => vec![window; owner.srcs().len()],
                        };
                        for (src, window) in owner.srcs().iter().zip(windows) {
                            stack.push((src.id, window));
                        }
                    },
                    PadDirection::Sink => {},
                }
            }
            layout.groups.push(group);
        }
    }

    for node in nodes {
        if let Some(pad) = node.sinks().iter().chain(node.srcs()).find(|p| !visited.contains_key(&p.id)) {
            return Err(FrameKitError::Configuration(format!(
                "node '{}': pad '{}' is not fed by any producer",
                node.name, pad.name
            )));
        }
    }
    Ok(layout)
}

/// Pools and the port of every pad.
#[derive(Debug, Default)]
pub(crate) struct Allocation {
    pub pools: Vec<Arc<BufferPool>>,
    pub ports: HashMap<PadId, PadPort>,
}

impl Allocation {
    pub fn port_of(&self, pad: PadId) -> Result<PadPort> {
        self.ports
            .get(&pad)
            .cloned()
            .ok_or_else(|| FrameKitError::InvalidState(format!("pad {pad} has no pool")))
    }

    /// Closes every pool, waking anything blocked on them.
    pub fn close(&self) {
        for pool in &self.pools {
            pool.close();
        }
    }
}

/// Creates one pool per group and a port per member pad.
///
/// # Errors
///
/// Returns [`FrameKitError::ResourceCreation`] if a pool cannot be allocated.
/// Pools created before the failure are dropped.
pub(crate) fn allocate(layout: &PoolLayout, max_pool_bytes: Option<usize>) -> Result<Allocation> {
    let mut allocation = Allocation::default();
    for group in &layout.groups {
        let pool = BufferPool::allocate(&group.name, &group.exemplar, group.depth, max_pool_bytes)?;
        for member in &group.members {
            let port = pool.add_port(member.role, member.window.clone())?;
            allocation.ports.insert(
                member.pad,
                PadPort { pool: Arc::clone(&pool), port, role: member.role, depth: group.depth },
            );
        }
        allocation.pools.push(pool);
    }
    for (fake, peer) in &layout.aliases {
        let port = allocation.port_of(*peer)?;
        allocation.ports.insert(*fake, port);
    }
    Ok(allocation)
}
