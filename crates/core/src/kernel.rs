// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Hardware kernel contract.
//!
//! This module defines the interface a processing stage implements to be
//! scheduled by a graph:
//! - [`HwKernel`]: configuration, pad declaration, instance creation and per-cycle processing
//! - [`KernelContext`]: what a kernel learns at creation time (finalized
//!   parameter exemplars, assigned hardware target)
//!
//! The numerical behaviour of kernels is not the graph's concern. The graph
//! only guarantees that `process` sees one buffer per parameter, ordered by
//! parameter index, shaped like the declared exemplars.

use crate::buffer::Buf;
use crate::error::{FrameKitError, Result};
use crate::exemplar::{Exemplar, ANY_CHANNELS};
use crate::pad::{PadDirection, PadId, PadSignature};
use crate::target::HwTarget;

/// One kernel parameter after verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamBinding {
    pub pad: PadId,
    pub name: String,
    /// Finalized exemplar (channel wildcards resolved).
    pub exemplar: Exemplar,
}

impl ParamBinding {
    pub const fn direction(&self) -> PadDirection {
        self.pad.direction
    }
}

/// Creation-time context handed to [`HwKernel::create_node`].
#[derive(Debug, Clone)]
pub struct KernelContext {
    pub node_name: String,
    /// Parameters ordered by parameter index.
    pub params: Vec<ParamBinding>,
    /// Hardware target assigned by the graph's allocator, if the kernel asked for one.
    pub target: Option<HwTarget>,
}

impl KernelContext {
    pub fn param(&self, index: usize) -> Option<&ParamBinding> {
        self.params.get(index)
    }
}

/// A processing stage executed by the graph engine.
///
/// Lifecycle, driven by the graph:
///
/// ```text
/// init_cfg → init_node → [infer_outputs] → create_node → process* → delete_node
/// ```
///
/// `init_cfg` and `init_node` run when the node is added, `infer_outputs` and
/// `create_node` during verification, `process` once per cycle, `delete_node`
/// at clean.
pub trait HwKernel: Send {
    /// Short type name used in logs, metrics and DOT output.
    fn kind(&self) -> &'static str;

    /// Validates and normalizes the kernel's own configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] for invalid settings.
    fn init_cfg(&mut self) -> Result<()> {
        Ok(())
    }

    /// Size in bytes of the configuration block shipped to the device.
    fn cfg_size(&self) -> usize;

    /// Declares the kernel's pads.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] if the configuration cannot be
    /// expressed as pads.
    fn init_node(&mut self) -> Result<PadSignature>;

    /// Hardware target class this kernel must run on, if any.
    fn target_class(&self) -> Option<&str> {
        None
    }

    /// Resolves channel wildcards on the outputs from the (resolved) inputs.
    ///
    /// The default copies the first input's channel count into every output
    /// still carrying the wildcard.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] if the inputs are not acceptable.
    fn infer_outputs(&self, sinks: &[Exemplar], srcs: &mut [Exemplar]) -> Result<()> {
        inherit_channels(sinks, srcs);
        Ok(())
    }

    /// Creates the device-side instance.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::ResourceCreation`] or
    /// [`FrameKitError::ExternalDevice`] when the instance cannot be created.
    fn create_node(&mut self, ctx: &KernelContext) -> Result<()>;

    /// Runs one cycle. `params` holds one buffer per parameter, ordered by
    /// parameter index; output buffers are written in place.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::Runtime`] or [`FrameKitError::ExternalDevice`].
    fn process(&mut self, params: &[Buf]) -> Result<()>;

    /// Releases the device-side instance.
    ///
    /// # Errors
    ///
    /// Errors are logged by the graph; cleanup continues.
    fn delete_node(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Fills wildcard output channel counts from the first input.
pub fn inherit_channels(sinks: &[Exemplar], srcs: &mut [Exemplar]) {
    let Some(first) = sinks.first() else { return };
    for src in srcs.iter_mut().filter(|s| s.channels == ANY_CHANNELS) {
        src.channels = first.channels;
    }
}

/// Checks that `params` matches what a kernel declared.
///
/// # Errors
///
/// Returns [`FrameKitError::Runtime`] on a count mismatch.
pub fn expect_params(kind: &str, params: &[Buf], expected: usize) -> Result<()> {
    if params.len() == expected {
        Ok(())
    } else {
        Err(FrameKitError::Runtime(format!(
            "{kind} expects {expected} parameters, got {}",
            params.len()
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::exemplar::ImageFormat;

    #[test]
    fn test_inherit_channels_only_fills_wildcards() {
        let sinks = [Exemplar::image(4, 4, ImageFormat::U8).with_channels(3)];
        let mut srcs = [
            Exemplar::image(4, 4, ImageFormat::U8).with_channels(ANY_CHANNELS),
            Exemplar::image(4, 4, ImageFormat::U8).with_channels(1),
        ];
        inherit_channels(&sinks, &mut srcs);
        assert_eq!(srcs[0].channels, 3);
        assert_eq!(srcs[1].channels, 1);
    }

    #[test]
    fn test_source_kernel_keeps_wildcard() {
        let mut srcs = [Exemplar::array(4, 8).with_channels(ANY_CHANNELS)];
        inherit_channels(&[], &mut srcs);
        assert!(!srcs[0].is_resolved());
    }
}
