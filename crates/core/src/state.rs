// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Node and graph lifecycle states.
//!
//! ## State Machine
//!
//! Nodes move strictly forward through these states:
//!
//! ```text
//!    Uninitialized
//!          ↓  init_cfg
//!     Initialized
//!          ↓  add_node
//!        Added
//!          ↓  link_pads (optional, repeatable)
//!        Linked
//!          ↓  verify_graph
//!       Verified
//!          ↓  first schedule / auto-queue start
//!       Running
//!          ↓  clean_graph
//!       Cleaned
//! ```
//!
//! A graph is `Building` until verification succeeds. A failed verification
//! leaves it `Building`, with no pools or kernel instances alive.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{FrameKitError, Result};

/// Lifecycle position of a node object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Uninitialized,
    /// Configuration accepted.
    Initialized,
    /// Owned by a graph, pads declared.
    Added,
    /// At least one pad linked.
    Linked,
    /// Pools allocated and kernel instance created.
    Verified,
    Running,
    Cleaned,
}

impl NodeState {
    /// Whether moving from `self` to `next` is a legal lifecycle step.
    ///
    /// Re-entering `Linked` is allowed since a node may be linked many times.
    pub fn can_advance_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Linked, Self::Linked) | (Self::Added, Self::Verified) => true,
            (current, Self::Cleaned) => current != Self::Cleaned,
            (current, next) => next as u8 == current as u8 + 1,
        }
    }

    /// Advances the state, rejecting backward or skipping moves.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::InvalidState`] for an illegal transition.
    pub fn advance(&mut self, next: Self) -> Result<()> {
        if self.can_advance_to(next) {
            *self = next;
            Ok(())
        } else {
            Err(FrameKitError::InvalidState(format!("node cannot move from {self} to {next}")))
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Added => "added",
            Self::Linked => "linked",
            Self::Verified => "verified",
            Self::Running => "running",
            Self::Cleaned => "cleaned",
        };
        f.write_str(s)
    }
}

/// Lifecycle position of a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphState {
    /// Accepting nodes and links.
    Building,
    /// Pools and kernels exist; no cycle scheduled yet.
    Verified,
    /// At least one cycle scheduled, or auto-queue runners started.
    Running,
    /// Resources released. Terminal.
    Cleaned,
}

impl GraphState {
    pub const fn is_building(self) -> bool {
        matches!(self, Self::Building)
    }

    /// Verified or running.
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Verified | Self::Running)
    }
}

impl fmt::Display for GraphState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Building => "building",
            Self::Verified => "verified",
            Self::Running => "running",
            Self::Cleaned => "cleaned",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let mut state = NodeState::Uninitialized;
        for next in [
            NodeState::Initialized,
            NodeState::Added,
            NodeState::Linked,
            NodeState::Linked,
            NodeState::Verified,
            NodeState::Running,
            NodeState::Cleaned,
        ] {
            assert!(state.advance(next).is_ok(), "{state} -> {next}");
        }
    }

    #[test]
    fn test_unlinked_node_may_verify() {
        assert!(NodeState::Added.can_advance_to(NodeState::Verified));
    }

    #[test]
    fn test_backward_transition_rejected() {
        let mut state = NodeState::Verified;
        assert!(matches!(state.advance(NodeState::Added), Err(FrameKitError::InvalidState(_))));
        assert_eq!(state, NodeState::Verified);
        assert!(!NodeState::Cleaned.can_advance_to(NodeState::Cleaned));
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&GraphState::Building).unwrap();
        assert_eq!(json, "\"building\"");
        assert!(GraphState::Running.is_live());
    }
}
