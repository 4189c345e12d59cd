// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Pad system for graph validation and buffer sharing.
//!
//! A pad is a typed, directional connection point on a node. Pads are declared
//! by a node's `init_node` step through a [`PadSignature`] and turned into
//! [`Pad`]s when the node is added to a graph.
//!
//! ## Key concepts:
//! - [`PadId`]: Copyable address of a pad (`node`, `direction`, `index`)
//! - [`PadDecl`]: What a node declares for one pad (exemplar, queue depth, parameter slot)
//! - [`Pad`]: The graph-side pad, with its peer link once linked
//! - A pad with no peer is *exposed*: it becomes a host I/O boundary

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::exemplar::Exemplar;

/// Index of a node inside its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Address of this node's sink pad `index`.
    pub const fn sink(self, index: usize) -> PadId {
        PadId { node: self, direction: PadDirection::Sink, index }
    }

    /// Address of this node's src pad `index`.
    pub const fn src(self, index: usize) -> PadId {
        PadId { node: self, direction: PadDirection::Src, index }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Data direction of a pad relative to its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PadDirection {
    /// Consumes buffers (node input).
    Sink,
    /// Produces buffers (node output).
    Src,
}

impl PadDirection {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Sink => Self::Src,
            Self::Src => Self::Sink,
        }
    }
}

/// Address of a pad inside a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct PadId {
    pub node: NodeId,
    pub direction: PadDirection,
    pub index: usize,
}

impl fmt::Display for PadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            PadDirection::Sink => "sink",
            PadDirection::Src => "src",
        };
        write!(f, "{}.{dir}{}", self.node, self.index)
    }
}

/// Declaration of one pad, as produced by a node's `init_node` step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadDecl {
    pub name: String,
    pub exemplar: Exemplar,
    /// Maximum number of buffers in flight on this pad. `None` uses the graph default.
    pub bufq_depth: Option<usize>,
    /// Slot in the kernel's parameter list. `None` assigns slots in declaration
    /// order (sinks first, then srcs).
    pub param_index: Option<usize>,
}

impl PadDecl {
    pub fn new(name: impl Into<String>, exemplar: Exemplar) -> Self {
        Self { name: name.into(), exemplar, bufq_depth: None, param_index: None }
    }

    #[must_use]
    pub const fn with_bufq_depth(mut self, depth: usize) -> Self {
        self.bufq_depth = Some(depth);
        self
    }

    #[must_use]
    pub const fn with_param_index(mut self, index: usize) -> Self {
        self.param_index = Some(index);
        self
    }
}

/// All pads a node declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PadSignature {
    pub sinks: Vec<PadDecl>,
    pub srcs: Vec<PadDecl>,
}

impl PadSignature {
    pub const fn new(sinks: Vec<PadDecl>, srcs: Vec<PadDecl>) -> Self {
        Self { sinks, srcs }
    }

    /// Turns the declarations into graph pads owned by `node`.
    pub fn into_pads(self, node: NodeId, default_bufq_depth: usize) -> (Vec<Pad>, Vec<Pad>) {
        let sink_count = self.sinks.len();
        let build = |decls: Vec<PadDecl>, direction: PadDirection, offset: usize| {
            decls
                .into_iter()
                .enumerate()
                .map(|(index, decl)| Pad {
                    id: PadId { node, direction, index },
                    name: decl.name,
                    exemplar: decl.exemplar,
                    bufq_depth: decl.bufq_depth.unwrap_or(default_bufq_depth),
                    param_index: decl.param_index.unwrap_or(offset + index),
                    peer: None,
                })
                .collect::<Vec<_>>()
        };
        (build(self.sinks, PadDirection::Sink, 0), build(self.srcs, PadDirection::Src, sink_count))
    }
}

/// A pad as it lives in the graph.
#[derive(Debug, Clone)]
pub struct Pad {
    pub id: PadId,
    pub name: String,
    pub exemplar: Exemplar,
    pub bufq_depth: usize,
    /// Position of this pad's buffer in the owning kernel's parameter list.
    pub param_index: usize,
    /// Linked pad, if any. Unlinked pads are host-facing boundaries.
    pub peer: Option<PadId>,
}

impl Pad {
    pub const fn direction(&self) -> PadDirection {
        self.id.direction
    }

    /// An exposed pad is a graph boundary addressed by the host.
    pub const fn is_exposed(&self) -> bool {
        self.peer.is_none()
    }
}
