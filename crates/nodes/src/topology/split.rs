// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! ObjArraySplit node - partitions an object array into contiguous channel ranges.
//!
//! Outputs are windows onto the input buffer: no data is copied, each
//! consumer only sees its own channels.

use framekit_core::{
    config_helpers, Buf, Exemplar, FrameKitError, Pad, PadDecl, PadDirection, PadId, PadSignature,
    Result,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::ops::Range;

use super::mirror;

pub const MIN_PARTITIONS: usize = 2;
pub const MAX_PARTITIONS: usize = 4;

/// Configuration for the SplitNode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SplitConfig {
    /// Src pad producing the object array.
    pub peer: PadId,
    /// Channel count of each output, in order.
    pub partitions: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct SplitNode {
    config: SplitConfig,
}

impl SplitNode {
    /// Partition sizes are checked at verify time, against the resolved input.
    pub const fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] on a missing or malformed config.
    pub fn from_params(params: Option<&serde_json::Value>) -> Result<Self> {
        Ok(Self::new(config_helpers::parse_config_with_context(params, "objarray split")?))
    }

    pub const fn peer(&self) -> PadId {
        self.config.peer
    }

    pub fn partitions(&self) -> &[u32] {
        &self.config.partitions
    }

    /// Sink `in` plus one src `out_<i>` per partition, each carrying its partition's channel count.
    pub fn signature(&self, peer: &Pad) -> PadSignature {
        let srcs = self
            .config
            .partitions
            .iter()
            .enumerate()
            .map(|(i, &channels)| {
                PadDecl::new(format!("out_{i}"), peer.exemplar.clone().with_channels(channels))
                    .with_bufq_depth(peer.bufq_depth)
            })
            .collect();
        PadSignature::new(vec![mirror(peer, "in")], srcs)
    }

    /// Verify-time check of the attachment and the partition sizes.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] when the peer is not a src pad,
    /// the partition count is outside 2..=4, a partition is empty, or the
    /// sizes do not add up to the input's channel count.
    pub fn validate(&self, peer_direction: PadDirection, input: &Exemplar) -> Result<()> {
        if peer_direction != PadDirection::Src {
            return Err(FrameKitError::Configuration(format!(
                "objarray split must be attached to a src pad, {} is a sink pad",
                self.config.peer
            )));
        }
        let parts = &self.config.partitions;
        if !(MIN_PARTITIONS..=MAX_PARTITIONS).contains(&parts.len()) {
            return Err(FrameKitError::Configuration(format!(
                "objarray split needs {MIN_PARTITIONS} to {MAX_PARTITIONS} partitions, got {}",
                parts.len()
            )));
        }
        if parts.contains(&0) {
            return Err(FrameKitError::Configuration(format!(
                "objarray split partitions must be non-empty: {parts:?}"
            )));
        }
        if !input.is_resolved() {
            return Err(FrameKitError::Configuration(format!(
                "objarray split input {} has an unresolved channel count",
                self.config.peer
            )));
        }
        let total: u64 = parts.iter().map(|&p| u64::from(p)).sum();
        if total != u64::from(input.channels) {
            return Err(FrameKitError::Configuration(format!(
                "objarray split partitions {parts:?} sum to {total}, input has {} channels",
                input.channels
            )));
        }
        Ok(())
    }

    /// Channel ranges of each output inside `base`.
    pub fn windows(&self, base: &Range<usize>) -> Vec<Range<usize>> {
        let mut start = base.start;
        self.config
            .partitions
            .iter()
            .map(|&p| {
                let range = start..start + p as usize;
                start = range.end;
                range
            })
            .collect()
    }

    /// One reference per output; windows come from the consumers' ports.
    pub fn split(&self, input: Buf) -> Vec<Buf> {
        let mut outputs: Vec<Buf> =
            (1..self.config.partitions.len()).map(|_| input.share()).collect();
        outputs.insert(0, input);
        outputs
    }
}
