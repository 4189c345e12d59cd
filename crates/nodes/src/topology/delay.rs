// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Delay node - exposes the buffer written `depth` cycles ago next to the current one.
//!
//! The node keeps a ring of `depth + 1` buffer references indexed by
//! `cycle % (depth + 1)`. Each cycle the incoming buffer is stored in its slot
//! (evicting the entry stored `depth + 1` cycles earlier) and emitted on
//! `current`; the slot after it holds the entry stored `depth` cycles ago,
//! which is emitted on `aged`. The two views therefore never alias the same
//! physical buffer.

use framekit_core::{config_helpers, Buf, FrameKitError, Pad, PadId, PadSignature, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::mirror;

/// Configuration for the DelayNode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DelayConfig {
    /// Src pad whose output is delayed.
    pub peer: PadId,
    /// Number of cycles between `current` and `aged`.
    #[schemars(range(min = 1))]
    pub depth: usize,
}

/// Temporal rotation over a fixed ring of buffer references.
#[derive(Debug)]
pub struct DelayNode {
    config: DelayConfig,
    ring: Vec<Option<Buf>>,
    cycle: u64,
}

/// Buffers emitted by one Delay cycle.
#[derive(Debug)]
pub struct DelayOutput {
    pub current: Buf,
    pub aged: Buf,
}

impl DelayNode {
    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] if `depth` is zero.
    pub fn new(config: DelayConfig) -> Result<Self> {
        if config.depth == 0 {
            return Err(FrameKitError::Configuration("Delay depth must be at least 1".to_string()));
        }
        let ring = (0..=config.depth).map(|_| None).collect();
        Ok(Self { config, ring, cycle: 0 })
    }

    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] on a missing or malformed config.
    pub fn from_params(params: Option<&serde_json::Value>) -> Result<Self> {
        Self::new(config_helpers::parse_config_with_context(params, "delay")?)
    }

    pub const fn peer(&self) -> PadId {
        self.config.peer
    }

    pub const fn depth(&self) -> usize {
        self.config.depth
    }

    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Buffers the pool must hold for this node alone: the ring plus one
    /// incoming buffer.
    pub const fn required_bufq_depth(&self) -> usize {
        self.config.depth + 2
    }

    /// Sink `in` plus srcs `current` and `aged`, shaped like `peer`.
    pub fn signature(&self, peer: &Pad) -> PadSignature {
        let depth = peer.bufq_depth.max(self.required_bufq_depth());
        PadSignature::new(
            vec![mirror(peer, "in").with_bufq_depth(depth)],
            vec![mirror(peer, "current"), mirror(peer, "aged")],
        )
    }

    /// Fills the `depth` history slots with zeroed buffers so `aged` is
    /// defined from the first cycle.
    ///
    /// # Errors
    ///
    /// Propagates the allocation error from `obtain`.
    pub fn prime(&mut self, mut obtain: impl FnMut() -> Result<Buf>) -> Result<()> {
        self.clear();
        for slot in self.ring.iter_mut().skip(1) {
            let buf = obtain()?;
            buf.write().fill(0);
            *slot = Some(buf);
        }
        tracing::debug!(depth = self.config.depth, "Primed delay ring");
        Ok(())
    }

    /// Stores `input` and returns the current and aged views.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::Runtime`] if the ring was never primed.
    pub fn rotate(&mut self, input: Buf) -> Result<DelayOutput> {
        let len = self.ring.len() as u64;
        let slot = usize::try_from(self.cycle % len).unwrap_or(0);
        let aged_slot = (slot + 1) % self.ring.len();

        let aged = self.ring[aged_slot]
            .as_ref()
            .map(Buf::share)
            .ok_or_else(|| FrameKitError::Runtime("delay ring was not primed".to_string()))?;
        // Evicts the entry stored depth + 1 cycles ago.
        self.ring[slot] = Some(input.share());
        self.cycle += 1;

        Ok(DelayOutput { current: input, aged })
    }

    /// Drops every retained reference.
    pub fn clear(&mut self) {
        for slot in &mut self.ring {
            slot.take();
        }
        self.cycle = 0;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::topology::test_support::{pad, pool, take};
    use framekit_core::{NodeId, PadDirection};

    fn delay(depth: usize) -> DelayNode {
        DelayNode::new(DelayConfig { peer: NodeId(0).src(0), depth }).unwrap()
    }

    #[test]
    fn test_in_pad_reserves_ring() {
        let node = delay(3);
        let sig = node.signature(&pad(PadDirection::Src, 1, 4));
        assert_eq!(sig.sinks[0].bufq_depth, Some(5));
        assert_eq!(sig.srcs[1].name, "aged");
        assert_eq!(sig.srcs[1].bufq_depth, Some(4));
    }

    #[test]
    fn test_aged_lags_current_by_depth() {
        let depth = 3;
        let mut node = delay(depth);
        let (pool, port) = pool(depth + 2, 1);
        node.prime(|| Ok(take(&pool, port))).unwrap();

        for cycle in 0..10u8 {
            let input = take(&pool, port);
            input.write().fill(cycle + 1);
            let out = node.rotate(input).unwrap();
            assert_ne!(out.current.index(), out.aged.index());
            assert_eq!(out.current.read().channel(0).unwrap()[0], cycle + 1);
            let expected = if usize::from(cycle) < depth { 0 } else { cycle + 1 - depth as u8 };
            assert_eq!(out.aged.read().channel(0).unwrap()[0], expected, "cycle {cycle}");
        }
        // Only the ring is left holding buffers.
        assert_eq!(pool.free_count(), 1);
        node.clear();
        assert_eq!(pool.free_count(), depth + 2);
    }

    #[test]
    fn test_unprimed_ring_errors() {
        let mut node = delay(1);
        let (pool, port) = pool(2, 1);
        assert!(matches!(node.rotate(take(&pool, port)), Err(FrameKitError::Runtime(_))));
    }

    #[test]
    fn test_zero_depth_rejected() {
        assert!(DelayNode::from_params(Some(&serde_json::json!({
            "peer": { "node": 0, "direction": "src", "index": 0 },
            "depth": 0
        })))
        .is_err());
    }
}
