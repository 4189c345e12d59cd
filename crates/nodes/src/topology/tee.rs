// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Tee node - fans one buffer out to several consumers without copying.

use framekit_core::{config_helpers, Buf, FrameKitError, Pad, PadDecl, PadId, PadSignature, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::mirror;

const fn default_fanout() -> usize {
    2
}

/// Configuration for the TeeNode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TeeConfig {
    /// Pad the Tee splices into.
    pub peer: PadId,
    /// Number of output pads.
    #[serde(default = "default_fanout")]
    #[schemars(range(min = 1))]
    pub fanout: usize,
}

/// Shares each input buffer with `fanout` outputs.
///
/// The buffer returns to its pool only after every consumer released its
/// reference, in any order.
#[derive(Debug, Clone)]
pub struct TeeNode {
    config: TeeConfig,
}

impl TeeNode {
    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] if `fanout` is zero.
    pub fn new(config: TeeConfig) -> Result<Self> {
        if config.fanout == 0 {
            return Err(FrameKitError::Configuration("Tee fanout must be at least 1".to_string()));
        }
        Ok(Self { config })
    }

    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] on a missing or malformed config.
    pub fn from_params(params: Option<&serde_json::Value>) -> Result<Self> {
        Self::new(config_helpers::parse_config_with_context(params, "tee")?)
    }

    pub const fn peer(&self) -> PadId {
        self.config.peer
    }

    pub const fn fanout(&self) -> usize {
        self.config.fanout
    }

    /// One sink `in` and `fanout` srcs `out_<i>`, all shaped like `peer`.
    pub fn signature(&self, peer: &Pad) -> PadSignature {
        PadSignature::new(
            vec![mirror(peer, "in")],
            (0..self.config.fanout).map(|i| mirror(peer, format!("out_{i}"))).collect::<Vec<PadDecl>>(),
        )
    }

    /// Turns one input reference into `fanout` references to the same buffer.
    pub fn fan_out(&self, input: Buf) -> Vec<Buf> {
        let mut outputs: Vec<Buf> = (1..self.config.fanout).map(|_| input.share()).collect();
        outputs.push(input);
        outputs
    }
}
