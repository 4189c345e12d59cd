// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Bounded buffer pools shared by linked pads.
//!
//! A [`BufferPool`] owns `depth` fixed-size slots, allocated once at verify
//! time. Linked pads share one pool, so no data is copied across a link. Each
//! pad gets its own *port* on the pool: a pair of queues (inbox for buffers
//! handed to the engine, ready for buffers handed back to the host) plus the
//! channel window the pad is allowed to see.
//!
//! Ownership is reference counted per slot under the pool mutex:
//! - every [`Buf`] handle holds one reference and releases it on drop
//! - a buffer sitting in a queue keeps the reference of the handle that put it there
//! - a slot returns to the free list when its count reaches zero
//!
//! Fan-out (Tee) and temporal retention (Delay) are expressed with
//! [`Buf::share`], which adds a reference without copying data.
//!
//! All blocking happens on one condition variable per pool and only on that
//! pool's own emptiness or fullness.

use bytes::BytesMut;
use std::collections::VecDeque;
use std::fmt;
use std::ops::Range;
use std::sync::{
    Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::{Duration, Instant};

use crate::error::{FrameKitError, Result};
use crate::exemplar::Exemplar;

/// How long a pool operation may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Return `Ok(None)` immediately when nothing is available.
    Nonblocking,
    /// Block until available or until the pool is closed.
    Forever,
    /// Block up to the given duration, then fail with [`FrameKitError::Timeout`].
    Timeout(Duration),
}

impl Wait {
    /// `Timeout` when a limit is given, `Forever` otherwise.
    pub fn from_limit(limit: Option<Duration>) -> Self {
        limit.map_or(Self::Forever, Self::Timeout)
    }
}

/// Lifecycle position of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufState {
    Free,
    /// Owned by a host thread (after acquire or dequeue).
    Acquired,
    /// Queued at a pad, not yet picked up by the engine.
    Enqueued,
    /// Held by the engine for the current cycle.
    InFlight,
    /// Processing finished; waiting for the host to dequeue it.
    Ready,
}

/// How the host may use a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    /// Host submits filled buffers for the engine to consume.
    HostInput,
    /// Host offers empty buffers and collects filled ones.
    HostOutput,
    /// Engine-only edge between two scheduled nodes.
    Internal,
}

/// Handle to one port of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId(usize);

impl PortId {
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct Port {
    role: PortRole,
    window: Range<usize>,
    inbox: VecDeque<usize>,
    ready: VecDeque<usize>,
}

#[derive(Debug)]
struct PoolState {
    refs: Vec<u32>,
    states: Vec<BufState>,
    free: VecDeque<usize>,
    /// Empty buffers offered by the host for producers to fill.
    supplied: VecDeque<usize>,
    ports: Vec<Port>,
    closed: bool,
    acquired_total: u64,
}

impl PoolState {
    fn port(&self, port: PortId) -> Result<&Port> {
        self.ports
            .get(port.0)
            .ok_or_else(|| FrameKitError::Configuration(format!("unknown port {}", port.0)))
    }

    fn port_mut(&mut self, port: PortId) -> Result<&mut Port> {
        self.ports
            .get_mut(port.0)
            .ok_or_else(|| FrameKitError::Configuration(format!("unknown port {}", port.0)))
    }

    fn take_free(&mut self) -> Option<usize> {
        let index = self.free.pop_front()?;
        self.refs[index] = 1;
        Some(index)
    }
}

/// Storage of one slot: one byte block per channel.
#[derive(Debug)]
struct SlotData {
    channels: Vec<BytesMut>,
}

/// Snapshot of a port's queues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortStats {
    pub role: PortRole,
    pub inbox: usize,
    pub ready: usize,
}

/// Snapshot of a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub name: String,
    pub depth: usize,
    pub free: usize,
    pub supplied: usize,
    /// Slots not on the free list.
    pub outstanding: usize,
    pub acquired_total: u64,
    pub ports: Vec<PortStats>,
}

/// A bounded set of reusable buffers shared by one group of linked pads.
pub struct BufferPool {
    name: String,
    exemplar: Exemplar,
    slots: Vec<RwLock<SlotData>>,
    state: Mutex<PoolState>,
    cond: Condvar,
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("name", &self.name)
            .field("exemplar", &self.exemplar)
            .field("depth", &self.slots.len())
            .finish_non_exhaustive()
    }
}

impl BufferPool {
    /// Allocates `depth` zeroed buffers shaped like `exemplar`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::ResourceCreation`] when the depth is zero, the
    /// exemplar is unresolved or empty, or the pool would exceed `max_bytes`.
    pub fn allocate(
        name: impl Into<String>,
        exemplar: &Exemplar,
        depth: usize,
        max_bytes: Option<usize>,
    ) -> Result<Arc<Self>> {
        let name = name.into();
        if depth == 0 {
            return Err(FrameKitError::ResourceCreation(format!("pool '{name}' has zero depth")));
        }
        if !exemplar.is_resolved() {
            return Err(FrameKitError::ResourceCreation(format!(
                "pool '{name}' has an unresolved channel count"
            )));
        }
        let channel_bytes = exemplar.channel_bytes();
        if channel_bytes == 0 {
            return Err(FrameKitError::ResourceCreation(format!(
                "pool '{name}' has an empty exemplar ({exemplar})"
            )));
        }
        let total = exemplar.total_bytes().saturating_mul(depth);
        if let Some(limit) = max_bytes {
            if total > limit {
                return Err(FrameKitError::ResourceCreation(format!(
                    "pool '{name}' needs {total} bytes, limit is {limit}"
                )));
            }
        }

        let channels = exemplar.channels as usize;
        let slots = (0..depth)
            .map(|_| {
                RwLock::new(SlotData {
                    channels: (0..channels).map(|_| BytesMut::zeroed(channel_bytes)).collect(),
                })
            })
            .collect();

        tracing::debug!(pool = %name, depth, bytes = total, "Allocated buffer pool ({exemplar})");

        Ok(Arc::new(Self {
            name,
            exemplar: exemplar.clone(),
            slots,
            state: Mutex::new(PoolState {
                refs: vec![0; depth],
                states: vec![BufState::Free; depth],
                free: (0..depth).collect(),
                supplied: VecDeque::new(),
                ports: Vec::new(),
                closed: false,
                acquired_total: 0,
            }),
            cond: Condvar::new(),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn exemplar(&self) -> &Exemplar {
        &self.exemplar
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a pad view onto this pool.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] if the window is empty or lies
    /// outside the pool's channels.
    pub fn add_port(&self, role: PortRole, window: Range<usize>) -> Result<PortId> {
        if window.is_empty() || window.end > self.exemplar.channels as usize {
            return Err(FrameKitError::Configuration(format!(
                "channel window {window:?} does not fit pool '{}' ({} channels)",
                self.name, self.exemplar.channels
            )));
        }
        let mut state = self.lock();
        state.ports.push(Port {
            role,
            window,
            inbox: VecDeque::new(),
            ready: VecDeque::new(),
        });
        Ok(PortId(state.ports.len() - 1))
    }

    /// Role of a port.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] for an unknown port.
    pub fn port_role(&self, port: PortId) -> Result<PortRole> {
        Ok(self.lock().port(port)?.role)
    }

    pub fn free_count(&self) -> usize {
        self.lock().free.len()
    }

    pub fn outstanding(&self) -> usize {
        self.depth() - self.free_count()
    }

    pub fn state_of(&self, index: usize) -> Option<BufState> {
        self.lock().states.get(index).copied()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats {
            name: self.name.clone(),
            depth: self.depth(),
            free: state.free.len(),
            supplied: state.supplied.len(),
            outstanding: self.depth() - state.free.len(),
            acquired_total: state.acquired_total,
            ports: state
                .ports
                .iter()
                .map(|p| PortStats { role: p.role, inbox: p.inbox.len(), ready: p.ready.len() })
                .collect(),
        }
    }

    /// Closes the pool: every blocked or future wait fails with
    /// [`FrameKitError::PoolClosed`]. Releasing handles stays harmless.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        drop(state);
        self.cond.notify_all();
    }

    /// Polls `poll` under the pool lock until it yields, honouring `wait`.
    fn wait_for<T>(
        &self,
        wait: Wait,
        what: &str,
        mut poll: impl FnMut(&mut PoolState) -> Result<Option<T>>,
    ) -> Result<Option<T>> {
        let deadline = match wait {
            Wait::Timeout(limit) => Some(Instant::now() + limit),
            Wait::Nonblocking | Wait::Forever => None,
        };
        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(FrameKitError::PoolClosed(self.name.clone()));
            }
            if let Some(value) = poll(&mut *state)? {
                drop(state);
                self.cond.notify_all();
                return Ok(Some(value));
            }
            state = match (wait, deadline) {
                (Wait::Nonblocking, _) => return Ok(None),
                (Wait::Timeout(_), Some(deadline)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(FrameKitError::Timeout(format!(
                            "{what} on pool '{}'",
                            self.name
                        )));
                    }
                    self.cond
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                },
                _ => self.cond.wait(state).unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    fn handle(self: &Arc<Self>, index: usize, window: Range<usize>) -> Buf {
        Buf { pool: Arc::clone(self), index, window, live: true }
    }

    fn check_owner(self: &Arc<Self>, buf: &Buf) -> Result<()> {
        if Arc::ptr_eq(self, &buf.pool) {
            Ok(())
        } else {
            Err(FrameKitError::Configuration(format!(
                "buffer {} of pool '{}' does not belong to pool '{}'",
                buf.index, buf.pool.name, self.name
            )))
        }
    }

    /// Takes exclusive ownership of a free buffer.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::PoolClosed`] after cleanup or
    /// [`FrameKitError::Timeout`] when a bounded wait runs out.
    pub fn acquire(self: &Arc<Self>, port: PortId, wait: Wait) -> Result<Option<Buf>> {
        let got = self.wait_for(wait, "acquire", |state| {
            let window = state.port(port)?.window.clone();
            Ok(state.take_free().map(|index| {
                state.states[index] = BufState::Acquired;
                state.acquired_total += 1;
                (index, window)
            }))
        })?;
        Ok(got.map(|(index, window)| self.handle(index, window)))
    }

    /// Hands a host buffer to the engine through `port`.
    ///
    /// On a host-input port the buffer is queued for consumption. On a
    /// host-output port it is offered as an empty buffer for a producer.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] for a foreign buffer or an
    /// engine-internal port, [`FrameKitError::PoolClosed`] after cleanup.
    pub fn enqueue(self: &Arc<Self>, port: PortId, buf: Buf) -> Result<()> {
        self.check_owner(&buf)?;
        let mut state = self.lock();
        if state.closed {
            return Err(FrameKitError::PoolClosed(self.name.clone()));
        }
        let role = state.port(port)?.role;
        let index = buf.index;
        match role {
            PortRole::HostInput => state.port_mut(port)?.inbox.push_back(index),
            PortRole::HostOutput => state.supplied.push_back(index),
            PortRole::Internal => {
                return Err(FrameKitError::Configuration(format!(
                    "port {} of pool '{}' is internal to the graph",
                    port.0, self.name
                )));
            },
        }
        state.states[index] = BufState::Enqueued;
        buf.into_queued();
        drop(state);
        self.cond.notify_all();
        Ok(())
    }

    /// Waits for a completed buffer at `port`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::PoolClosed`] after cleanup or
    /// [`FrameKitError::Timeout`] when a bounded wait runs out.
    pub fn dequeue(self: &Arc<Self>, port: PortId, wait: Wait) -> Result<Option<Buf>> {
        let got = self.wait_for(wait, "dequeue", |state| {
            let entry = state.port_mut(port)?;
            let window = entry.window.clone();
            Ok(entry.ready.pop_front().map(|index| {
                state.states[index] = BufState::Acquired;
                (index, window)
            }))
        })?;
        Ok(got.map(|(index, window)| self.handle(index, window)))
    }

    /// Engine side: takes the next buffer queued at `port`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::dequeue`].
    pub fn take_input(self: &Arc<Self>, port: PortId, wait: Wait) -> Result<Option<Buf>> {
        let got = self.wait_for(wait, "input", |state| {
            let entry = state.port_mut(port)?;
            let window = entry.window.clone();
            Ok(entry.inbox.pop_front().map(|index| {
                state.states[index] = BufState::InFlight;
                (index, window)
            }))
        })?;
        Ok(got.map(|(index, window)| self.handle(index, window)))
    }

    /// Engine side: gets a buffer to produce into. Host-supplied buffers are
    /// used first, then the free list.
    ///
    /// # Errors
    ///
    /// Same as [`Self::dequeue`].
    pub fn obtain_output(self: &Arc<Self>, port: PortId, wait: Wait) -> Result<Option<Buf>> {
        let got = self.wait_for(wait, "output", |state| {
            let window = state.port(port)?.window.clone();
            let index = state.supplied.pop_front().or_else(|| state.take_free());
            Ok(index.map(|index| {
                state.states[index] = BufState::InFlight;
                (index, window)
            }))
        })?;
        Ok(got.map(|(index, window)| self.handle(index, window)))
    }

    /// Engine side: queues a produced buffer at a consumer's port, waiting
    /// while that inbox already holds `cap` buffers.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::PoolClosed`] or [`FrameKitError::Timeout`]; the
    /// buffer is released in that case.
    pub fn deliver(
        self: &Arc<Self>,
        port: PortId,
        buf: Buf,
        cap: Option<usize>,
        wait: Wait,
    ) -> Result<()> {
        self.check_owner(&buf)?;
        let index = buf.index;
        let mut pending = Some(buf);
        let delivered = self.wait_for(wait, "deliver", |state| {
            let entry = state.port_mut(port)?;
            if cap.is_some_and(|cap| entry.inbox.len() >= cap) {
                return Ok(None);
            }
            entry.inbox.push_back(index);
            state.states[index] = BufState::InFlight;
            Ok(pending.take())
        });
        match delivered {
            Ok(Some(buf)) => {
                buf.into_queued();
                Ok(())
            },
            Ok(None) => Err(FrameKitError::Timeout(format!(
                "consumer inbox full on pool '{}'",
                self.name
            ))),
            Err(e) => Err(e),
        }
    }

    /// Engine side: hands a finished buffer back to the host at `port`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::PoolClosed`] after cleanup.
    pub fn publish(self: &Arc<Self>, port: PortId, buf: Buf) -> Result<()> {
        self.check_owner(&buf)?;
        let mut state = self.lock();
        if state.closed {
            return Err(FrameKitError::PoolClosed(self.name.clone()));
        }
        let index = buf.index;
        state.port_mut(port)?.ready.push_back(index);
        state.states[index] = BufState::Ready;
        buf.into_queued();
        drop(state);
        self.cond.notify_all();
        Ok(())
    }

    fn retain(&self, index: usize) {
        let mut state = self.lock();
        state.refs[index] += 1;
    }

    fn release(&self, index: usize) {
        let mut state = self.lock();
        let Some(refs) = state.refs.get_mut(index) else { return };
        if *refs == 0 {
            tracing::warn!(pool = %self.name, index, "Released a buffer that was already free");
            return;
        }
        *refs -= 1;
        if *refs == 0 {
            state.states[index] = BufState::Free;
            state.free.push_back(index);
            drop(state);
            self.cond.notify_all();
        }
    }
}

/// A reference to one buffer of a pool.
///
/// Dropping the handle releases the reference; when the last reference goes
/// the buffer returns to its pool's free list.
pub struct Buf {
    pool: Arc<BufferPool>,
    index: usize,
    window: Range<usize>,
    live: bool,
}

impl fmt::Debug for Buf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buf")
            .field("pool", &self.pool.name)
            .field("index", &self.index)
            .field("window", &self.window)
            .finish()
    }
}

impl Buf {
    /// Stable index of this buffer within its pool.
    pub const fn index(&self) -> usize {
        self.index
    }

    pub const fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Number of channels visible through this handle.
    pub fn channel_count(&self) -> usize {
        self.window.len()
    }

    pub fn window(&self) -> Range<usize> {
        self.window.clone()
    }

    /// Adds a reference to the same buffer, without copying data.
    #[must_use]
    pub fn share(&self) -> Self {
        self.pool.retain(self.index);
        Self {
            pool: Arc::clone(&self.pool),
            index: self.index,
            window: self.window.clone(),
            live: true,
        }
    }

    /// Returns the reference to the pool.
    pub fn release(self) {
        drop(self);
    }

    pub fn read(&self) -> BufReadGuard<'_> {
        BufReadGuard {
            data: self.pool.slots[self.index].read().unwrap_or_else(PoisonError::into_inner),
            window: self.window.clone(),
        }
    }

    pub fn write(&self) -> BufWriteGuard<'_> {
        BufWriteGuard {
            data: self.pool.slots[self.index].write().unwrap_or_else(PoisonError::into_inner),
            window: self.window.clone(),
        }
    }

    /// Swaps the memory behind two buffers of identical layout.
    ///
    /// This is how the output of one graph becomes the input of another
    /// independently scheduled graph without a copy.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] if shapes or visible channel
    /// counts differ.
    pub fn swap_memory(&mut self, other: &mut Self) -> Result<()> {
        if Arc::ptr_eq(&self.pool, &other.pool) && self.index == other.index {
            return Ok(());
        }
        if self.pool.exemplar.desc != other.pool.exemplar.desc
            || self.channel_count() != other.channel_count()
        {
            return Err(FrameKitError::Configuration(format!(
                "cannot swap {} ({} ch) with {} ({} ch)",
                self.pool.exemplar.desc,
                self.channel_count(),
                other.pool.exemplar.desc,
                other.channel_count()
            )));
        }

        // Fixed lock order so two threads swapping the same pair cannot deadlock.
        let self_key = (Arc::as_ptr(&self.pool).addr(), self.index);
        let other_key = (Arc::as_ptr(&other.pool).addr(), other.index);
        let (mut mine, mut theirs) = if self_key < other_key {
            let mine = self.write();
            (mine, other.write())
        } else {
            let theirs = other.write();
            (self.write(), theirs)
        };
        for (a, b) in self.window.clone().zip(other.window.clone()) {
            std::mem::swap(&mut mine.data.channels[a], &mut theirs.data.channels[b]);
        }
        Ok(())
    }

    /// The queue that received this buffer now holds its reference.
    fn into_queued(mut self) {
        self.live = false;
    }
}

impl Drop for Buf {
    fn drop(&mut self) {
        if self.live {
            self.pool.release(self.index);
        }
    }
}

/// Shared read access to a buffer's visible channels.
pub struct BufReadGuard<'a> {
    data: RwLockReadGuard<'a, SlotData>,
    window: Range<usize>,
}

impl BufReadGuard<'_> {
    pub fn channel_count(&self) -> usize {
        self.window.len()
    }

    pub fn channel(&self, index: usize) -> Option<&[u8]> {
        if index >= self.window.len() {
            return None;
        }
        self.data.channels.get(self.window.start + index).map(|c| &c[..])
    }

    pub fn channels(&self) -> impl Iterator<Item = &[u8]> {
        self.data.channels[self.window.clone()].iter().map(|c| &c[..])
    }
}

/// Exclusive write access to a buffer's visible channels.
pub struct BufWriteGuard<'a> {
    data: RwLockWriteGuard<'a, SlotData>,
    window: Range<usize>,
}

impl BufWriteGuard<'_> {
    pub fn channel_count(&self) -> usize {
        self.window.len()
    }

    pub fn channel(&self, index: usize) -> Option<&[u8]> {
        if index >= self.window.len() {
            return None;
        }
        self.data.channels.get(self.window.start + index).map(|c| &c[..])
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        if index >= self.window.len() {
            return None;
        }
        self.data.channels.get_mut(self.window.start + index).map(|c| &mut c[..])
    }

    /// Sets every visible byte to `value`.
    pub fn fill(&mut self, value: u8) {
        for channel in &mut self.data.channels[self.window.clone()] {
            channel.fill(value);
        }
    }
}

/// Host-facing handle to one pad's port.
///
/// This is what application threads use to circulate buffers: `acquire`,
/// `enqueue`, `dequeue`, `release`. Cloning is cheap; clones address the same
/// port and may be used from different threads.
#[derive(Clone, Debug)]
pub struct PadQueue {
    pool: Arc<BufferPool>,
    port: PortId,
    role: PortRole,
}

impl PadQueue {
    /// # Errors
    ///
    /// Returns [`FrameKitError::Configuration`] for an unknown port.
    pub fn new(pool: Arc<BufferPool>, port: PortId) -> Result<Self> {
        let role = pool.port_role(port)?;
        Ok(Self { pool, port, role })
    }

    pub const fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub const fn port(&self) -> PortId {
        self.port
    }

    pub const fn role(&self) -> PortRole {
        self.role
    }

    fn required(got: Option<Buf>, what: &str) -> Result<Buf> {
        got.ok_or_else(|| FrameKitError::Runtime(format!("{what} returned without a buffer")))
    }

    /// Blocks until a free buffer is available.
    ///
    /// Callers track their own outstanding count; acquiring more than
    /// `bufq_depth` buffers without releasing blocks forever.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::PoolClosed`] once the graph was cleaned.
    pub fn acquire(&self) -> Result<Buf> {
        Self::required(self.pool.acquire(self.port, Wait::Forever)?, "acquire")
    }

    /// # Errors
    ///
    /// Returns [`FrameKitError::PoolClosed`] once the graph was cleaned.
    pub fn try_acquire(&self) -> Result<Option<Buf>> {
        self.pool.acquire(self.port, Wait::Nonblocking)
    }

    /// # Errors
    ///
    /// Returns [`FrameKitError::Timeout`] when no buffer freed up in time.
    pub fn acquire_timeout(&self, limit: Duration) -> Result<Buf> {
        Self::required(self.pool.acquire(self.port, Wait::Timeout(limit))?, "acquire")
    }

    /// # Errors
    ///
    /// See [`BufferPool::enqueue`].
    pub fn enqueue(&self, buf: Buf) -> Result<()> {
        self.pool.enqueue(self.port, buf)
    }

    /// Blocks until a buffer finished processing at this pad.
    ///
    /// # Errors
    ///
    /// Returns [`FrameKitError::PoolClosed`] once the graph was cleaned.
    pub fn dequeue(&self) -> Result<Buf> {
        Self::required(self.pool.dequeue(self.port, Wait::Forever)?, "dequeue")
    }

    /// # Errors
    ///
    /// Returns [`FrameKitError::PoolClosed`] once the graph was cleaned.
    pub fn try_dequeue(&self) -> Result<Option<Buf>> {
        self.pool.dequeue(self.port, Wait::Nonblocking)
    }

    /// # Errors
    ///
    /// Returns [`FrameKitError::Timeout`] when nothing completed in time.
    pub fn dequeue_timeout(&self, limit: Duration) -> Result<Buf> {
        Self::required(self.pool.dequeue(self.port, Wait::Timeout(limit))?, "dequeue")
    }

    /// Returns a buffer to the free set.
    pub fn release(&self, buf: Buf) {
        buf.release();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::exemplar::ImageFormat;
    use std::thread;

    fn pool(depth: usize, channels: u32) -> Arc<BufferPool> {
        let ex = Exemplar::image(4, 2, ImageFormat::U8).with_channels(channels);
        BufferPool::allocate("test", &ex, depth, None).unwrap()
    }

    #[test]
    fn acquire_then_release_keeps_free_count() {
        let pool = pool(4, 1);
        let port = pool.add_port(PortRole::HostInput, 0..1).unwrap();
        let queue = PadQueue::new(pool.clone(), port).unwrap();
        assert_eq!(pool.free_count(), 4);

        let buf = queue.acquire().unwrap();
        assert_eq!(pool.free_count(), 3);
        assert_eq!(pool.state_of(buf.index()), Some(BufState::Acquired));
        queue.release(buf);
        assert_eq!(pool.free_count(), 4);
    }

    #[test]
    fn over_acquire_does_not_hand_out_more_than_depth() {
        let pool = pool(2, 1);
        let port = pool.add_port(PortRole::HostInput, 0..1).unwrap();
        let queue = PadQueue::new(pool, port).unwrap();
        let _a = queue.acquire().unwrap();
        let _b = queue.acquire().unwrap();
        assert!(queue.try_acquire().unwrap().is_none());
        assert!(matches!(
            queue.acquire_timeout(Duration::from_millis(10)),
            Err(FrameKitError::Timeout(_))
        ));
    }

    #[test]
    fn enqueued_input_round_trips_by_index() {
        let pool = pool(2, 1);
        let port = pool.add_port(PortRole::HostInput, 0..1).unwrap();
        let queue = PadQueue::new(pool.clone(), port).unwrap();

        let buf = queue.acquire().unwrap();
        let index = buf.index();
        queue.enqueue(buf).unwrap();
        assert_eq!(pool.state_of(index), Some(BufState::Enqueued));

        let taken = pool.take_input(port, Wait::Nonblocking).unwrap().unwrap();
        assert_eq!(taken.index(), index);
        pool.publish(port, taken).unwrap();

        let back = queue.dequeue().unwrap();
        assert_eq!(back.index(), index);
        assert_eq!(pool.free_count(), 1);
        back.release();
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn supplied_buffers_are_filled_first() {
        let pool = pool(3, 1);
        let port = pool.add_port(PortRole::HostOutput, 0..1).unwrap();
        let queue = PadQueue::new(pool.clone(), port).unwrap();
        let _first = queue.acquire().unwrap();
        let second = queue.acquire().unwrap();
        let supplied = second.index();
        queue.enqueue(second).unwrap();

        let out = pool.obtain_output(port, Wait::Nonblocking).unwrap().unwrap();
        assert_eq!(out.index(), supplied);
    }

    #[test]
    fn internal_port_rejects_host_enqueue() {
        let pool = pool(2, 1);
        let internal = pool.add_port(PortRole::Internal, 0..1).unwrap();
        let host = pool.add_port(PortRole::HostInput, 0..1).unwrap();
        let buf = pool.acquire(host, Wait::Nonblocking).unwrap().unwrap();
        assert!(matches!(pool.enqueue(internal, buf), Err(FrameKitError::Configuration(_))));
        // The rejected handle was dropped and released.
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn shared_buffer_frees_after_last_release() {
        let pool = pool(1, 1);
        let port = pool.add_port(PortRole::Internal, 0..1).unwrap();
        let buf = pool.obtain_output(port, Wait::Nonblocking).unwrap().unwrap();
        let a = buf.share();
        let b = buf.share();
        drop(buf);
        assert_eq!(pool.free_count(), 0);
        a.release();
        assert_eq!(pool.free_count(), 0);
        b.release();
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn dequeue_blocks_until_publish() {
        let pool = pool(1, 1);
        let port = pool.add_port(PortRole::HostOutput, 0..1).unwrap();
        let queue = PadQueue::new(pool.clone(), port).unwrap();

        let waiter = thread::spawn(move || queue.dequeue().map(|b| b.index()));
        thread::sleep(Duration::from_millis(20));
        let out = pool.obtain_output(port, Wait::Nonblocking).unwrap().unwrap();
        let index = out.index();
        pool.publish(port, out).unwrap();
        assert_eq!(waiter.join().unwrap().unwrap(), index);
    }

    #[test]
    fn close_wakes_blocked_dequeue() {
        let pool = pool(1, 1);
        let port = pool.add_port(PortRole::HostOutput, 0..1).unwrap();
        let queue = PadQueue::new(pool.clone(), port).unwrap();
        let waiter = thread::spawn(move || queue.dequeue());
        thread::sleep(Duration::from_millis(20));
        pool.close();
        assert!(matches!(waiter.join().unwrap(), Err(FrameKitError::PoolClosed(_))));
    }

    #[test]
    fn windows_restrict_visible_channels() {
        let pool = pool(1, 3);
        let full = pool.add_port(PortRole::Internal, 0..3).unwrap();
        let tail = pool.add_port(PortRole::HostOutput, 1..3).unwrap();
        let buf = pool.obtain_output(full, Wait::Nonblocking).unwrap().unwrap();
        {
            let mut data = buf.write();
            for c in 0..3u8 {
                data.channel_mut(c as usize).unwrap().fill(c + 10);
            }
        }
        pool.publish(tail, buf).unwrap();
        let seen = pool.dequeue(tail, Wait::Nonblocking).unwrap().unwrap();
        let data = seen.read();
        assert_eq!(data.channel_count(), 2);
        assert_eq!(data.channel(0).unwrap()[0], 11);
        assert_eq!(data.channel(1).unwrap()[0], 12);
        assert!(data.channel(2).is_none());
    }

    #[test]
    fn deliver_respects_cap() {
        let pool = pool(3, 1);
        let producer = pool.add_port(PortRole::Internal, 0..1).unwrap();
        let consumer = pool.add_port(PortRole::Internal, 0..1).unwrap();
        let a = pool.obtain_output(producer, Wait::Nonblocking).unwrap().unwrap();
        let b = pool.obtain_output(producer, Wait::Nonblocking).unwrap().unwrap();
        pool.deliver(consumer, a, Some(1), Wait::Nonblocking).unwrap();
        let err = pool.deliver(consumer, b, Some(1), Wait::Nonblocking);
        assert!(matches!(err, Err(FrameKitError::Timeout(_))));
        // The undelivered buffer went back to the free list.
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn swap_memory_exchanges_contents() {
        let left = pool(1, 1);
        let right = pool(1, 1);
        let lp = left.add_port(PortRole::HostOutput, 0..1).unwrap();
        let rp = right.add_port(PortRole::HostInput, 0..1).unwrap();
        let mut a = left.acquire(lp, Wait::Nonblocking).unwrap().unwrap();
        let mut b = right.acquire(rp, Wait::Nonblocking).unwrap().unwrap();
        a.write().fill(7);
        b.write().fill(1);
        a.swap_memory(&mut b).unwrap();
        assert!(a.read().channel(0).unwrap().iter().all(|&v| v == 1));
        assert!(b.read().channel(0).unwrap().iter().all(|&v| v == 7));
    }

    #[test]
    fn allocation_limits() {
        let ex = Exemplar::image(4, 4, ImageFormat::U8);
        assert!(BufferPool::allocate("zero", &ex, 0, None).is_err());
        assert!(BufferPool::allocate("big", &ex, 4, Some(32)).is_err());
        let unresolved = ex.with_channels(0);
        assert!(matches!(
            BufferPool::allocate("wild", &unresolved, 2, None),
            Err(FrameKitError::ResourceCreation(_))
        ));
    }
}
