// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use framekit_core::kernel::expect_params;
use framekit_core::{Buf, Exemplar, HwKernel, KernelContext, PadDecl, PadSignature, Result};

use super::check_bindings;

/// Copies `in` to `out`, channel by channel.
#[derive(Debug)]
pub struct CopyKernel {
    exemplar: Exemplar,
}

impl CopyKernel {
    pub const fn new(exemplar: Exemplar) -> Self {
        Self { exemplar }
    }
}

impl HwKernel for CopyKernel {
    fn kind(&self) -> &'static str {
        "copy"
    }

    fn cfg_size(&self) -> usize {
        0
    }

    fn init_node(&mut self) -> Result<PadSignature> {
        Ok(PadSignature::new(
            vec![PadDecl::new("in", self.exemplar.clone())],
            vec![PadDecl::new("out", self.exemplar.clone())],
        ))
    }

    fn create_node(&mut self, ctx: &KernelContext) -> Result<()> {
        check_bindings(self.kind(), ctx, 2)
    }

    fn process(&mut self, params: &[Buf]) -> Result<()> {
        expect_params(self.kind(), params, 2)?;
        let input = params[0].read();
        let mut output = params[1].write();
        for (channel, src) in input.channels().enumerate() {
            if let Some(dst) = output.channel_mut(channel) {
                let len = dst.len().min(src.len());
                dst[..len].copy_from_slice(&src[..len]);
            }
        }
        Ok(())
    }
}
