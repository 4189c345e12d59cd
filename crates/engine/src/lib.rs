// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! engine: graph verification and execution for FrameKit.
//!
//! A [`Graph`] owns its nodes. The host builds it with
//! [`Graph::add_node`] and [`Graph::link_pads`], brings it to life with
//! [`Graph::verify`], circulates buffers through [`framekit_core::PadQueue`]s
//! obtained from [`Graph::pad_queue`], drives cycles with
//! [`Graph::schedule`]/[`Graph::wait`] (or lets auto-queue mode run them) and
//! finally calls [`Graph::clean`].
//!
//! ```no_run
//! use framekit_core::{Exemplar, ImageFormat};
//! use framekit_engine::{Graph, NodeKind};
//! use framekit_nodes::kernels::CopyKernel;
//!
//! # fn main() -> framekit_core::Result<()> {
//! let mut graph = Graph::default();
//! let copy = graph.add_node(
//!     "copy",
//!     NodeKind::kernel(CopyKernel::new(Exemplar::image(64, 48, ImageFormat::U8).with_channels(1))),
//! )?;
//! graph.verify()?;
//!
//! let input = graph.pad_queue(copy.sink(0))?;
//! let output = graph.pad_queue(copy.src(0))?;
//! input.enqueue(input.acquire()?)?;
//! graph.process()?;
//! let frame = output.dequeue()?;
//! output.release(frame);
//! graph.clean();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
mod executor;
pub mod graph;
mod node_kind;
mod verify;

pub use config::{AutoQueueConfig, GraphConfig, ScheduleMode};
pub use graph::{Graph, NodeObj};
pub use node_kind::NodeKind;
