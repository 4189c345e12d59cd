// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Shared defaults for graph configuration.
//!
//! `GraphConfig` and the executors reference these constants so every
//! default lives in one place.
//!
//! # Queue depth guidelines
//!
//! Depths are measured in buffers (not bytes). The memory footprint of a pool
//! is `depth × channels × channel_bytes`.
//!
//! - **Deeper queues** = more buffering, more latency, fewer stalls
//! - **Shallower queues** = less memory, earlier backpressure

/// Default number of buffers a pad may have in flight.
///
/// Four lets a host keep one buffer being filled, one queued, one processing
/// and one being drained.
pub const DEFAULT_BUFQ_DEPTH: usize = 4;

/// Default limit for a single blocking wait in explicit scheduling mode.
///
/// A cycle whose inputs or output buffers are not available within this time
/// fails with a timeout instead of hanging the graph worker.
pub const DEFAULT_CYCLE_TIMEOUT_MS: u64 = 5_000;

/// Name of the OpenTelemetry meter used by the engine.
pub const METER_NAME: &str = "framekit_engine";
