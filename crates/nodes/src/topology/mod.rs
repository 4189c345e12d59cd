// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Topology nodes.
//!
//! Each topology node is attached to a *peer* pad of an existing node when it
//! is added to a graph. Its pads copy the peer's exemplar and queue depth, and
//! all of its pads share the peer's buffer pool: Tee, Delay and ObjArraySplit
//! hand out extra references to the same buffers, Fakesrc and Fakesink alias
//! the peer's host queue.

use framekit_core::{Pad, PadDecl};

pub mod delay;
pub mod fake;
pub mod split;
pub mod tee;

pub use delay::{DelayConfig, DelayNode};
pub use fake::{FakeConfig, FakeNode, FakeRole};
pub use split::{SplitConfig, SplitNode};
pub use tee::{TeeConfig, TeeNode};

/// A pad declaration mirroring `peer`'s exemplar and queue depth.
pub(crate) fn mirror(peer: &Pad, name: impl Into<String>) -> PadDecl {
    PadDecl::new(name, peer.exemplar.clone()).with_bufq_depth(peer.bufq_depth)
}

#[cfg(test)]
pub(crate) mod test_support {
    use framekit_core::buffer::{Buf, BufferPool, PortId, PortRole, Wait};
    use framekit_core::{Exemplar, ImageFormat, NodeId, Pad, PadDirection, PadId};
    use std::sync::Arc;

    pub fn pad(direction: PadDirection, channels: u32, bufq_depth: usize) -> Pad {
        Pad {
            id: PadId { node: NodeId(0), direction, index: 0 },
            name: "peer".to_string(),
            exemplar: Exemplar::image(4, 4, ImageFormat::U8).with_channels(channels),
            bufq_depth,
            param_index: 0,
            peer: None,
        }
    }

    pub fn pool(depth: usize, channels: u32) -> (Arc<BufferPool>, PortId) {
        let ex = Exemplar::image(4, 4, ImageFormat::U8).with_channels(channels);
        let pool = BufferPool::allocate("topology", &ex, depth, None).unwrap_or_else(|e| panic!("{e}"));
        let port = pool
            .add_port(PortRole::Internal, 0..channels as usize)
            .unwrap_or_else(|e| panic!("{e}"));
        (pool, port)
    }

    pub fn take(pool: &Arc<BufferPool>, port: PortId) -> Buf {
        pool.obtain_output(port, Wait::Nonblocking)
            .ok()
            .flatten()
            .unwrap_or_else(|| panic!("pool exhausted"))
    }
}
