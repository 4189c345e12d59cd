// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use framekit_core::kernel::expect_params;
use framekit_core::{Buf, Exemplar, HwKernel, KernelContext, PadDecl, PadSignature, Result};

use super::check_bindings;

/// Saturating byte-wise sum of inputs `a` and `b` into `out`.
#[derive(Debug)]
pub struct AddKernel {
    exemplar: Exemplar,
    target_class: Option<String>,
}

impl AddKernel {
    pub const fn new(exemplar: Exemplar) -> Self {
        Self { exemplar, target_class: None }
    }

    /// Requests a hardware target of `class` at creation.
    #[must_use]
    pub fn on_target(mut self, class: impl Into<String>) -> Self {
        self.target_class = Some(class.into());
        self
    }
}

impl HwKernel for AddKernel {
    fn kind(&self) -> &'static str {
        "add"
    }

    fn cfg_size(&self) -> usize {
        0
    }

    fn init_node(&mut self) -> Result<PadSignature> {
        Ok(PadSignature::new(
            vec![PadDecl::new("a", self.exemplar.clone()), PadDecl::new("b", self.exemplar.clone())],
            vec![PadDecl::new("out", self.exemplar.clone())],
        ))
    }

    fn target_class(&self) -> Option<&str> {
        self.target_class.as_deref()
    }

    fn create_node(&mut self, ctx: &KernelContext) -> Result<()> {
        check_bindings(self.kind(), ctx, 3)
    }

    fn process(&mut self, params: &[Buf]) -> Result<()> {
        expect_params(self.kind(), params, 3)?;
        let a = params[0].read();
        let b = params[1].read();
        let mut out = params[2].write();
        for (channel, (lhs, rhs)) in a.channels().zip(b.channels()).enumerate() {
            if let Some(dst) = out.channel_mut(channel) {
                for ((d, &x), &y) in dst.iter_mut().zip(lhs).zip(rhs) {
                    *d = x.saturating_add(y);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::kernels::{pattern_value, CopyKernel, PatternKernel};
    use framekit_core::buffer::{BufferPool, PortRole, Wait};
    use framekit_core::{ImageFormat, KernelContext};

    fn ctx(params: usize) -> KernelContext {
        let ex = Exemplar::image(2, 2, ImageFormat::U8);
        let mut sig = AddKernel::new(ex).init_node().unwrap();
        let mut all = std::mem::take(&mut sig.sinks);
        all.append(&mut sig.srcs);
        KernelContext {
            node_name: "k".to_string(),
            params: all
                .into_iter()
                .take(params)
                .enumerate()
                .map(|(i, d)| framekit_core::ParamBinding {
                    pad: framekit_core::NodeId(0).sink(i),
                    name: d.name,
                    exemplar: d.exemplar,
                })
                .collect(),
            target: None,
        }
    }

    fn buf(fill: u8) -> Buf {
        let ex = Exemplar::image(2, 2, ImageFormat::U8).with_channels(2);
        let pool = BufferPool::allocate("k", &ex, 1, None).unwrap();
        let port = pool.add_port(PortRole::Internal, 0..2).unwrap();
        let buf = pool.obtain_output(port, Wait::Nonblocking).unwrap().unwrap();
        buf.write().fill(fill);
        buf
    }

    #[test]
    fn test_add_saturates() {
        let mut kernel = AddKernel::new(Exemplar::image(2, 2, ImageFormat::U8));
        kernel.create_node(&ctx(3)).unwrap();
        let params = [buf(200), buf(100), buf(0)];
        kernel.process(&params).unwrap();
        assert!(params[2].read().channels().all(|c| c.iter().all(|&v| v == 255)));
    }

    #[test]
    fn test_create_checks_bindings() {
        let mut kernel = AddKernel::new(Exemplar::image(2, 2, ImageFormat::U8));
        assert!(kernel.create_node(&ctx(2)).is_err());
        assert!(kernel.process(&[buf(1)]).is_err());
    }

    #[test]
    fn test_copy_and_pattern() {
        let ex = Exemplar::image(2, 2, ImageFormat::U8).with_channels(2);
        let mut pattern = PatternKernel::new(ex.clone(), 5);
        let out = buf(0);
        pattern.process(std::slice::from_ref(&out)).unwrap();
        pattern.process(std::slice::from_ref(&out)).unwrap();
        assert_eq!(out.read().channel(1).unwrap()[0], pattern_value(5, 1, 1));
        assert_eq!(pattern_value(5, 1, 1), 7);

        let mut copy = CopyKernel::new(ex);
        let params = [out, buf(0)];
        copy.process(&params).unwrap();
        assert_eq!(params[1].read().channel(0).unwrap()[3], 6);
    }
}
