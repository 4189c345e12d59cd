// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Pattern kernel - a source filling every channel with a per-frame constant.

use framekit_core::kernel::expect_params;
use framekit_core::{
    Buf, Exemplar, FrameKitError, HwKernel, KernelContext, PadDecl, PadSignature, Result,
};

use super::check_bindings;

/// Value written to `channel` on frame `frame`: `seed + channel + frame`, wrapping.
pub fn pattern_value(seed: u8, channel: usize, frame: u64) -> u8 {
    let value = (u64::from(seed) + channel as u64 + frame) % 256;
    u8::try_from(value).unwrap_or_default()
}

/// Source kernel with one output `out`.
#[derive(Debug)]
pub struct PatternKernel {
    exemplar: Exemplar,
    seed: u8,
    frame: u64,
}

impl PatternKernel {
    pub const fn new(exemplar: Exemplar, seed: u8) -> Self {
        Self { exemplar, seed, frame: 0 }
    }
}

impl HwKernel for PatternKernel {
    fn kind(&self) -> &'static str {
        "pattern"
    }

    fn init_cfg(&mut self) -> Result<()> {
        if self.exemplar.is_resolved() {
            Ok(())
        } else {
            Err(FrameKitError::Configuration(
                "pattern source needs an explicit channel count".to_string(),
            ))
        }
    }

    fn cfg_size(&self) -> usize {
        std::mem::size_of::<u8>()
    }

    fn init_node(&mut self) -> Result<PadSignature> {
        Ok(PadSignature::new(Vec::new(), vec![PadDecl::new("out", self.exemplar.clone())]))
    }

    fn create_node(&mut self, ctx: &KernelContext) -> Result<()> {
        self.frame = 0;
        check_bindings(self.kind(), ctx, 1)
    }

    fn process(&mut self, params: &[Buf]) -> Result<()> {
        expect_params(self.kind(), params, 1)?;
        let mut out = params[0].write();
        for channel in 0..out.channel_count() {
            let value = pattern_value(self.seed, channel, self.frame);
            if let Some(data) = out.channel_mut(channel) {
                data.fill(value);
            }
        }
        self.frame += 1;
        Ok(())
    }
}
