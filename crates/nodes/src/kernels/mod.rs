// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Software reference kernels.
//!
//! Byte-wise CPU implementations of the [`HwKernel`](framekit_core::HwKernel)
//! contract. They exercise graphs in tests and serve as host fallbacks when
//! no accelerator is configured.

mod add;
mod copy;
mod pattern;

pub use add::AddKernel;
pub use copy::CopyKernel;
pub use pattern::{pattern_value, PatternKernel};

use framekit_core::{FrameKitError, KernelContext, Result};

/// Shared `create_node` check: the graph bound as many parameters as declared.
fn check_bindings(kind: &str, ctx: &KernelContext, expected: usize) -> Result<()> {
    if ctx.params.len() == expected {
        tracing::debug!(
            node = %ctx.node_name,
            target = ctx.target.as_ref().map_or_else(|| "host".to_string(), ToString::to_string),
            "Created {kind} kernel"
        );
        Ok(())
    } else {
        Err(FrameKitError::ResourceCreation(format!(
            "{kind} kernel '{}' bound {} parameters, expected {expected}",
            ctx.node_name,
            ctx.params.len()
        )))
    }
}
