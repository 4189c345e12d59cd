// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Built-in nodes for FrameKit graphs.
//!
//! - [`topology`]: Tee, Delay, Fakesrc/Fakesink and ObjArraySplit. These move
//!   buffer references around without touching data.
//! - [`kernels`]: software reference kernels (feature `reference-kernels`).

pub mod topology;

#[cfg(feature = "reference-kernels")]
pub mod kernels;

pub use topology::{
    DelayConfig, DelayNode, FakeConfig, FakeNode, FakeRole, SplitConfig, SplitNode, TeeConfig,
    TeeNode,
};
