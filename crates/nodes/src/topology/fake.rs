// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Fakesrc / Fakesink - host access points aliasing an unlinked pad.
//!
//! A Fakesrc stands in for the producer of an unlinked sink pad, a Fakesink
//! for the consumer of an unlinked src pad. Neither runs a kernel nor is
//! scheduled: the fake pad shares the peer's exemplar, pool, queue and
//! parameter index, so a host enqueue or dequeue on the fake pad is the same
//! operation on the peer's queue.

use framekit_core::{config_helpers, FrameKitError, Pad, PadDirection, PadId, PadSignature, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::mirror;

/// Configuration for Fakesrc and Fakesink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FakeConfig {
    /// Pad to alias.
    pub peer: PadId,
}

/// Which side of the boundary the fake node stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeRole {
    /// Fakesrc: feeds a sink pad.
    Source,
    /// Fakesink: drains a src pad.
    Sink,
}

impl FakeRole {
    /// Direction the peer pad must have.
    pub const fn peer_direction(self) -> PadDirection {
        match self {
            Self::Source => PadDirection::Sink,
            Self::Sink => PadDirection::Src,
        }
    }
}

impl fmt::Display for FakeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "fakesrc",
            Self::Sink => "fakesink",
        })
    }
}

#[derive(Debug, Clone)]
pub struct FakeNode {
    role: FakeRole,
    config: FakeConfig,
}

impl FakeNode {
    pub const fn source(config: FakeConfig) -> Self {
        Self { role: FakeRole::Source, config }
    }

    pub const fn sink(config: FakeConfig) -> Self {
        Self { role: FakeRole::Sink, config }
    }

    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] on a missing or malformed config.
    pub fn from_params(role: FakeRole, params: Option<&serde_json::Value>) -> Result<Self> {
        let config = config_helpers::parse_config_with_context(params, &role.to_string())?;
        Ok(Self { role, config })
    }

    pub const fn role(&self) -> FakeRole {
        self.role
    }

    pub const fn peer(&self) -> PadId {
        self.config.peer
    }

    /// Checks that `peer` can be aliased.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] if the peer has the wrong
    /// direction or is already linked.
    pub fn check_peer(&self, peer: &Pad) -> Result<()> {
        if peer.direction() != self.role.peer_direction() {
            return Err(FrameKitError::Configuration(format!(
                "{} needs a {:?} peer, {} is {:?}",
                self.role,
                self.role.peer_direction(),
                peer.id,
                peer.direction()
            )));
        }
        if let Some(linked) = peer.peer {
            return Err(FrameKitError::Configuration(format!(
                "{} peer {} is already linked to {linked}",
                self.role, peer.id
            )));
        }
        Ok(())
    }

    /// A single pad opposite to the peer, sharing its exemplar and parameter index.
    pub fn signature(&self, peer: &Pad) -> PadSignature {
        let pad = mirror(peer, self.role.to_string()).with_param_index(peer.param_index);
        match self.role {
            FakeRole::Source => PadSignature::new(Vec::new(), vec![pad]),
            FakeRole::Sink => PadSignature::new(vec![pad], Vec::new()),
        }
    }
}
