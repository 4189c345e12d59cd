// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Node statistics tracking and reporting.
//!
//! Each scheduled node owns a [`NodeStatsTracker`] on its execution thread and
//! publishes snapshots into a shared [`StatsHandle`] that the graph reads from.
//! Publishing is throttled (every second or every 100 cycles) unless forced.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Runtime statistics for one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStats {
    /// Cycles this node completed
    pub cycles: u64,
    /// Input buffers consumed
    pub received: u64,
    /// Output buffers produced
    pub sent: u64,
    /// Cycles that failed in the kernel
    pub errored: u64,
    /// Duration of the most recent cycle, in microseconds
    pub last_cycle_micros: u64,
    /// Seconds since the node started processing (for rate calculation)
    pub duration_secs: f64,
}

/// Shared, last-published snapshot of a node's statistics.
pub type StatsHandle = Arc<Mutex<NodeStats>>;

/// Reads the current snapshot from a handle.
pub fn snapshot(handle: &StatsHandle) -> NodeStats {
    handle.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Helper for tracking and throttling node statistics updates.
#[derive(Debug)]
pub struct NodeStatsTracker {
    stats: NodeStats,
    start_time: Instant,
    last_send: Instant,
    node_id: String,
    handle: StatsHandle,
}

impl NodeStatsTracker {
    const SEND_INTERVAL: Duration = Duration::from_secs(1);
    const SEND_CYCLE_THRESHOLD: u64 = 100;

    pub fn new(node_id: impl Into<String>, handle: StatsHandle) -> Self {
        let now = Instant::now();
        Self { stats: NodeStats::default(), start_time: now, last_send: now, node_id: node_id.into(), handle }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    #[inline]
    pub const fn received_n(&mut self, count: u64) {
        self.stats.received += count;
    }

    #[inline]
    pub const fn sent_n(&mut self, count: u64) {
        self.stats.sent += count;
    }

    #[inline]
    pub const fn errored(&mut self) {
        self.stats.errored += 1;
    }

    /// Record one finished cycle and how long it took.
    pub fn cycle(&mut self, elapsed: Duration) {
        self.stats.cycles += 1;
        self.stats.last_cycle_micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
    }

    /// Publish if the throttle allows it.
    pub fn maybe_send(&mut self) {
        let should_send = self.last_send.elapsed() >= Self::SEND_INTERVAL
            || self.stats.cycles.is_multiple_of(Self::SEND_CYCLE_THRESHOLD);

        if should_send {
            self.force_send();
        }
    }

    /// Publish immediately (end of an explicit cycle, runner shutdown).
    pub fn force_send(&mut self) {
        self.stats.duration_secs = self.start_time.elapsed().as_secs_f64();
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = self.stats.clone();
        self.last_send = Instant::now();
    }
}
