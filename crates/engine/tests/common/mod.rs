// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Shared helpers for engine integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use framekit_core::kernel::expect_params;
use framekit_core::{
    Buf, Exemplar, FrameKitError, HwKernel, ImageFormat, KernelContext, PadDecl, PadSignature,
    Result,
};

/// Upper bound for any blocking call in a test.
pub const LIMIT: Duration = Duration::from_secs(5);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// 4x4 single-channel 8-bit frame (16 bytes per channel).
pub fn frame() -> Exemplar {
    Exemplar::image(4, 4, ImageFormat::U8)
}

pub fn fill(buf: &Buf, value: u8) {
    buf.write().fill(value);
}

pub fn first_byte(buf: &Buf, channel: usize) -> u8 {
    buf.read().channel(channel).map_or(0, |c| c[0])
}

pub type Events = Arc<Mutex<Vec<String>>>;

/// Copy kernel that records its lifecycle and can be told to fail.
pub struct ProbeKernel {
    exemplar: Exemplar,
    events: Events,
    target_class: Option<String>,
    fail_create: bool,
    fail_process: bool,
    node: String,
}

impl ProbeKernel {
    pub fn new(exemplar: Exemplar, events: &Events) -> Self {
        Self {
            exemplar,
            events: Arc::clone(events),
            target_class: None,
            fail_create: false,
            fail_process: false,
            node: String::new(),
        }
    }

    #[must_use]
    pub fn on_target(mut self, class: &str) -> Self {
        self.target_class = Some(class.to_string());
        self
    }

    #[must_use]
    pub const fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    #[must_use]
    pub const fn failing_process(mut self) -> Self {
        self.fail_process = true;
        self
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(event);
    }
}

impl HwKernel for ProbeKernel {
    fn kind(&self) -> &'static str {
        "probe"
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

    fn target_class(&self) -> Option<&str> {
        self.target_class.as_deref()
    }

    fn create_node(&mut self, ctx: &KernelContext) -> Result<()> {
        if self.fail_create {
            return Err(FrameKitError::ExternalDevice {
                code: -3,
                message: format!("{} refused", ctx.node_name),
            });
        }
        self.node.clone_from(&ctx.node_name);
        let target = ctx.target.as_ref().map_or_else(|| "host".to_string(), |t| t.name.clone());
        self.record(format!("create:{}@{target}", ctx.node_name));
        Ok(())
    }

    fn process(&mut self, params: &[Buf]) -> Result<()> {
        expect_params(self.kind(), params, 2)?;
        if self.fail_process {
            return Err(FrameKitError::ExternalDevice { code: -1, message: "device lost".to_string() });
        }
        let input = params[0].read();
        let mut output = params[1].write();
        for (channel, src) in input.channels().enumerate() {
            if let Some(dst) = output.channel_mut(channel) {
                dst.copy_from_slice(src);
            }
        }
        Ok(())
    }

    fn delete_node(&mut self) -> Result<()> {
        self.record(format!("delete:{}", self.node));
        Ok(())
    }
}

pub fn events(events: &Events) -> Vec<String> {
    events.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
}
