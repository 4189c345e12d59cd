// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Graph configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::constants::{DEFAULT_BUFQ_DEPTH, DEFAULT_CYCLE_TIMEOUT_MS};

/// How cycles are triggered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ScheduleMode {
    /// The host calls `schedule`/`wait` (or `process`) for every cycle.
    #[default]
    Explicit,
    /// Every node runs on its own thread whenever inputs and an output buffer
    /// are available.
    AutoQueue,
}

/// Backpressure settings for auto-queue mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AutoQueueConfig {
    /// Buffers a consumer may have queued before its producer blocks.
    /// Capped by the edge's `bufq_depth`; `None` uses the depth itself.
    #[schemars(range(min = 1))]
    pub max_in_flight: Option<usize>,
}

/// Configuration for a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GraphConfig {
    pub schedule_mode: ScheduleMode,
    /// Queue depth for pads that do not declare one (default: 4)
    #[schemars(range(min = 1))]
    pub default_bufq_depth: usize,
    /// Limit for blocking waits in explicit mode (default: 5000 ms). `None` waits forever.
    pub cycle_timeout_ms: Option<u64>,
    /// Upper bound on the size of a single buffer pool, in bytes.
    pub max_pool_bytes: Option<usize>,
    pub auto_queue: AutoQueueConfig,
    /// Hardware targets per class, handed out round-robin to kernels.
    pub targets: HashMap<String, Vec<String>>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            schedule_mode: ScheduleMode::Explicit,
            default_bufq_depth: DEFAULT_BUFQ_DEPTH,
            cycle_timeout_ms: Some(DEFAULT_CYCLE_TIMEOUT_MS),
            max_pool_bytes: None,
            auto_queue: AutoQueueConfig::default(),
            targets: HashMap::new(),
        }
    }
}

impl GraphConfig {
    pub fn auto_queue() -> Self {
        Self { schedule_mode: ScheduleMode::AutoQueue, ..Self::default() }
    }

    pub fn cycle_timeout(&self) -> Option<Duration> {
        self.cycle_timeout_ms.map(Duration::from_millis)
    }

    /// Inbox cap for an auto-queue edge whose consumer pad has `bufq_depth`.
    pub fn in_flight_cap(&self, bufq_depth: usize) -> usize {
        self.auto_queue.max_in_flight.map_or(bufq_depth, |cap| cap.min(bufq_depth)).max(1)
    }
}
