// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! FrameKit Core - Fundamental types for pad/node/graph dataflow pipelines.
//!
//! This crate defines the building blocks shared by node implementations and
//! the graph engine:
//!
//! ## Core Modules
//!
//! - [`exemplar`]: Type and shape descriptors carried by pads
//! - [`pad`]: Pad addressing, declarations and link state
//! - [`buffer`]: Bounded buffer pools, buffer handles and host pad queues
//! - [`kernel`]: The hardware kernel contract scheduled by the engine
//! - [`target`]: Round-robin hardware target allocation
//! - [`state`]: Node and graph lifecycle states
//! - [`stats`]: Node statistics collection
//! - [`error`]: Error types and handling
//! - [`helpers`]: Configuration parsing helpers
//!
//! ## Buffer circulation
//!
//! ```ignore
//! let input = graph.pad_queue(camera.src(0))?;
//! let buf = input.acquire()?;
//! fill(&mut buf.write());
//! input.enqueue(buf)?;
//! graph.process()?;
//! let done = input.dequeue()?;
//! input.release(done);
//! ```

// Module declarations
pub mod buffer;
pub mod error;
pub mod exemplar;
pub mod helpers;
pub mod kernel;
pub mod pad;
pub mod state;
pub mod stats;
pub mod target;

// Convenience re-exports for commonly used types

// Error handling
pub use error::{FrameKitError, Result};

// Data description
pub use exemplar::{DataDesc, DataType, Exemplar, ExemplarKind, ImageFormat, PyramidScale};

// Pads
pub use pad::{NodeId, Pad, PadDecl, PadDirection, PadId, PadSignature};

// Buffers
pub use buffer::{Buf, BufState, BufferPool, PadQueue, PoolStats, PortId, PortRole, Wait};

// Kernels and targets
pub use kernel::{HwKernel, KernelContext, ParamBinding};
pub use target::{HwTarget, TargetAllocator};

// State tracking
pub use state::{GraphState, NodeState};

// Statistics
pub use stats::{NodeStats, NodeStatsTracker, StatsHandle};

pub use helpers::config_helpers;
