// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Node execution.
//!
//! A verified graph turns every scheduled node into a [`NodeRuntime`]: the
//! node's kind plus its bound queues. Runtimes are driven by one of two
//! executors:
//!
//! - [`ExplicitExecutor`]: a single graph worker thread runs all nodes in
//!   topological order once per `schedule()` call.
//! - [`AutoExecutor`]: one thread per node, each running a cycle whenever its
//!   inputs and an output buffer are available.
//!
//! Both hand the runtimes back when stopped so kernels can be deleted.

use opentelemetry::metrics::Histogram;
use opentelemetry::{global, KeyValue};
use std::collections::VecDeque;
use std::io;
use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use framekit_core::buffer::{Buf, BufferPool, PortId, PortRole, Wait};
use framekit_core::stats::{NodeStatsTracker, StatsHandle};
use framekit_core::{FrameKitError, NodeId, Result};

use crate::constants::METER_NAME;
use crate::graph::NodeObj;
use crate::node_kind::NodeKind;
use crate::verify::PadPort;
use crate::GraphConfig;

/// A sink pad bound to its queue.
#[derive(Debug)]
pub(crate) struct InputLink {
    pub pool: Arc<BufferPool>,
    pub port: PortId,
    /// Fed by the host; consumed buffers go back to the host.
    pub host_fed: bool,
    pub param_index: usize,
}

/// Where a produced buffer goes.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Route {
    /// Into a downstream node's inbox, waiting while it holds `cap` buffers.
    Consumer { port: PortId, cap: Option<usize> },
    /// Back to the host through this pad's own queue.
    Host,
}

/// A src pad bound to its queue.
#[derive(Debug)]
pub(crate) struct OutputLink {
    pub pool: Arc<BufferPool>,
    pub port: PortId,
    pub route: Route,
    pub param_index: usize,
}

impl OutputLink {
    pub fn route(&self, buf: Buf, wait: Wait) -> Result<()> {
        match self.route {
            Route::Consumer { port, cap } => self.pool.deliver(port, buf, cap, wait),
            Route::Host => self.pool.publish(self.port, buf),
        }
    }
}

#[derive(Debug)]
pub(crate) struct NodeLinks {
    pub inputs: Vec<InputLink>,
    pub outputs: Vec<OutputLink>,
    pub param_count: usize,
}

impl NodeLinks {
    /// Binds every pad of `node` to its port.
    pub fn bind(
        node: &NodeObj,
        port_of: impl Fn(framekit_core::PadId) -> Result<PadPort>,
        config: &GraphConfig,
        auto: bool,
    ) -> Result<Self> {
        let inputs = node
            .sinks()
            .iter()
            .map(|pad| {
                let bound = port_of(pad.id)?;
                Ok(InputLink {
                    pool: bound.pool,
                    port: bound.port,
                    host_fed: bound.role == PortRole::HostInput,
                    param_index: pad.param_index,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let outputs = node
            .srcs()
            .iter()
            .map(|pad| {
                let bound = port_of(pad.id)?;
                let route = match (bound.role, pad.peer) {
                    (PortRole::Internal, Some(peer)) => {
                        let consumer = port_of(peer)?;
                        Route::Consumer {
                            port: consumer.port,
                            cap: auto.then(|| config.in_flight_cap(consumer.depth)),
                        }
                    },
                    _ => Route::Host,
                };
                Ok(OutputLink {
                    pool: bound.pool,
                    port: bound.port,
                    route,
                    param_index: pad.param_index,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let param_count = inputs.len() + outputs.len();
        Ok(Self { inputs, outputs, param_count })
    }

    /// Hands host-fed inputs back to the host and drops the rest.
    pub fn dispose_inputs(&self, inputs: impl IntoIterator<Item = Buf>) -> Result<()> {
        let mut first_error = None;
        for (link, buf) in self.inputs.iter().zip(inputs) {
            if link.host_fed {
                if let Err(e) = link.pool.publish(link.port, buf) {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

struct NodeMetrics {
    duration: Histogram<f64>,
    ok_labels: [KeyValue; 3],
    error_labels: [KeyValue; 3],
}

impl NodeMetrics {
    fn new(name: &str, kind: &'static str) -> Self {
        let meter = global::meter(METER_NAME);
        let duration = meter
            .f64_histogram("node.execution.duration")
            .with_description("Time spent executing one node cycle")
            .with_unit("s")
            .build();
        let labels = |status: &'static str| {
            [
                KeyValue::new("node.name", name.to_string()),
                KeyValue::new("node.kind", kind),
                KeyValue::new("status", status),
            ]
        };
        Self { duration, ok_labels: labels("ok"), error_labels: labels("error") }
    }

    fn record(&self, elapsed: Duration, ok: bool) {
        let labels = if ok { &self.ok_labels } else { &self.error_labels };
        self.duration.record(elapsed.as_secs_f64(), labels);
    }
}

#[derive(Clone)]
pub(crate) struct GraphMetrics {
    cycle_duration: Histogram<f64>,
}

impl GraphMetrics {
    pub fn new() -> Self {
        let meter = global::meter(METER_NAME);
        let cycle_duration = meter
            .f64_histogram("graph.cycle.duration")
            .with_description("Time from a cycle starting on the graph worker until every node ran")
            .with_unit("s")
            .build();
        Self { cycle_duration }
    }

    fn record_cycle(&self, elapsed: Duration, ok: bool) {
        self.cycle_duration
            .record(elapsed.as_secs_f64(), &[KeyValue::new("status", if ok { "ok" } else { "error" })]);
    }
}

/// A scheduled node with its bound queues.
pub(crate) struct NodeRuntime {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    links: NodeLinks,
    stats: NodeStatsTracker,
    metrics: NodeMetrics,
}

impl NodeRuntime {
    pub fn new(id: NodeId, name: String, kind: NodeKind, links: NodeLinks, stats: StatsHandle) -> Self {
        let metrics = NodeMetrics::new(&name, kind.label());
        let stats = NodeStatsTracker::new(name.clone(), stats);
        Self { id, name, kind, links, stats, metrics }
    }

    /// Runs one cycle: takes one buffer per input, runs the node, routes the outputs.
    pub fn run_cycle(&mut self, wait: Wait) -> Result<()> {
        let start = Instant::now();
        let result = self.execute(wait);
        let elapsed = start.elapsed();

        match &result {
            Ok(sent) => {
                self.stats.sent_n(*sent as u64);
                self.stats.cycle(elapsed);
                self.metrics.record(elapsed, true);
            },
            Err(FrameKitError::PoolClosed(_)) => {},
            Err(_) => {
                self.stats.errored();
                self.metrics.record(elapsed, false);
            },
        }
        self.stats.maybe_send();
        result.map(|_| ())
    }

    fn execute(&mut self, wait: Wait) -> Result<usize> {
        let mut inputs = Vec::with_capacity(self.links.inputs.len());
        for link in &self.links.inputs {
            match link.pool.take_input(link.port, wait) {
                Ok(Some(buf)) => inputs.push(buf),
                Ok(None) => {
                    self.links.dispose_inputs(inputs)?;
                    return Err(FrameKitError::Runtime(format!(
                        "input of '{}' was not ready",
                        self.name
                    )));
                },
                Err(e) => {
                    // Whatever was already taken goes back before the error surfaces.
                    let _ = self.links.dispose_inputs(inputs);
                    return Err(e);
                },
            }
        }
        self.stats.received_n(inputs.len() as u64);
        self.kind.run(&self.links, inputs, wait)
    }

    pub fn flush_stats(&mut self) {
        self.stats.force_send();
    }

    /// Releases the node's device-side state and hands its kind back.
    pub fn into_kind(mut self) -> NodeKind {
        self.flush_stats();
        self.kind.delete(&self.name);
        self.kind
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct CycleState {
    pending: usize,
    completed: u64,
    error: Option<FrameKitError>,
    shutdown: bool,
    exited: bool,
}

#[derive(Default)]
struct CycleQueue {
    state: Mutex<CycleState>,
    cond: Condvar,
}

/// Marks the worker as gone, also when a kernel panics.
struct ExitGuard<'a>(&'a CycleQueue);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        lock(&self.0.state).exited = true;
        self.0.cond.notify_all();
    }
}

/// Executor start failure. The runtimes never reached a worker and still
/// need to be torn down.
pub(crate) struct StartError {
    pub error: FrameKitError,
    pub runtimes: Vec<NodeRuntime>,
}

/// Spawns one worker per item, then hands each item to its worker.
///
/// Workers block on their channel until the item arrives, so when a spawn
/// fails the already spawned workers exit empty-handed and every item is
/// returned untouched.
fn spawn_workers<T, R>(
    items: Vec<T>,
    mut spawn: impl FnMut(usize, mpsc::Receiver<T>) -> io::Result<JoinHandle<Option<R>>>,
) -> std::result::Result<Vec<JoinHandle<Option<R>>>, (io::Error, Vec<T>)> {
    let mut workers = Vec::with_capacity(items.len());
    let mut senders = Vec::with_capacity(items.len());
    for index in 0..items.len() {
        let (tx, rx) = mpsc::sync_channel(1);
        match spawn(index, rx) {
            Ok(handle) => {
                workers.push(handle);
                senders.push(tx);
            },
            Err(e) => {
                drop(senders);
                for worker in workers {
                    let _ = worker.join();
                }
                return Err((e, items));
            },
        }
    }
    for (index, (tx, item)) in senders.iter().zip(items).enumerate() {
        if tx.send(item).is_err() {
            tracing::error!(worker = index, "Worker exited before receiving its nodes");
        }
    }
    Ok(workers)
}

/// Runs whole-graph cycles on one worker thread, on demand.
pub(crate) struct ExplicitExecutor {
    queue: Arc<CycleQueue>,
    worker: Option<JoinHandle<Option<Vec<NodeRuntime>>>>,
}

impl ExplicitExecutor {
    /// `runtimes` must be in topological order.
    pub fn start(
        runtimes: Vec<NodeRuntime>,
        wait: Wait,
        metrics: GraphMetrics,
    ) -> std::result::Result<Self, StartError> {
        let queue = Arc::new(CycleQueue::default());
        let spawned = spawn_workers(vec![runtimes], |_, rx| {
            let queue = Arc::clone(&queue);
            let metrics = metrics.clone();
            thread::Builder::new().name("framekit-graph".to_string()).spawn(move || {
                let runtimes = rx.recv().ok()?;
                Some(run_explicit(&queue, runtimes, wait, &metrics))
            })
        });
        match spawned {
            Ok(mut workers) => Ok(Self { queue, worker: workers.pop() }),
            Err((e, mut items)) => Err(StartError {
                error: FrameKitError::ResourceCreation(format!("failed to spawn graph worker: {e}")),
                runtimes: items.pop().unwrap_or_default(),
            }),
        }
    }

    pub fn schedule(&self) {
        lock(&self.queue.state).pending += 1;
        self.queue.cond.notify_all();
    }

    /// Blocks until every scheduled cycle finished; returns the first failure.
    pub fn wait(&self) -> Result<()> {
        let mut state = lock(&self.queue.state);
        while state.pending > 0 && !state.exited {
            state = self.queue.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        if let Some(e) = state.error.take() {
            return Err(e);
        }
        if state.pending > 0 {
            return Err(FrameKitError::InvalidState(
                "graph worker stopped with cycles pending".to_string(),
            ));
        }
        Ok(())
    }

    pub fn completed(&self) -> u64 {
        lock(&self.queue.state).completed
    }

    pub fn stop(mut self) -> Vec<NodeRuntime> {
        lock(&self.queue.state).shutdown = true;
        self.queue.cond.notify_all();
        join_worker("graph worker", self.worker.take()).flatten().unwrap_or_default()
    }
}

fn run_explicit(
    queue: &CycleQueue,
    mut runtimes: Vec<NodeRuntime>,
    wait: Wait,
    metrics: &GraphMetrics,
) -> Vec<NodeRuntime> {
    let _exit = ExitGuard(queue);
    tracing::debug!(nodes = runtimes.len(), "Graph worker started");

    loop {
        {
            let mut state = lock(&queue.state);
            while state.pending == 0 && !state.shutdown {
                state = queue.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
            if state.shutdown {
                break;
            }
        }

        let start = Instant::now();
        let result = run_all(&mut runtimes, wait);
        metrics.record_cycle(start.elapsed(), result.is_ok());

        let mut state = lock(&queue.state);
        state.pending = state.pending.saturating_sub(1);
        state.completed += 1;
        if let Err(e) = result {
            state.error.get_or_insert(e);
        }
        drop(state);
        queue.cond.notify_all();
    }

    tracing::debug!("Graph worker stopped");
    runtimes
}

/// One cycle across all nodes, stopping at the first failure.
fn run_all(runtimes: &mut [NodeRuntime], wait: Wait) -> Result<()> {
    for runtime in runtimes.iter_mut() {
        let result = runtime.run_cycle(wait);
        runtime.flush_stats();
        if let Err(e) = result {
            if !matches!(e, FrameKitError::PoolClosed(_)) {
                tracing::error!(node = %runtime.name, error = %e, "Cycle failed");
            }
            return Err(e);
        }
    }
    Ok(())
}

/// Runs every node on its own thread.
pub(crate) struct AutoExecutor {
    workers: Vec<JoinHandle<Option<NodeRuntime>>>,
    cancel: CancellationToken,
    errors: Arc<Mutex<VecDeque<FrameKitError>>>,
}

impl AutoExecutor {
    pub fn start(runtimes: Vec<NodeRuntime>) -> std::result::Result<Self, StartError> {
        let cancel = CancellationToken::new();
        let errors = Arc::new(Mutex::new(VecDeque::new()));
        let names: Vec<String> = runtimes.iter().map(|r| r.name.clone()).collect();

        let spawned = spawn_workers(runtimes, |index, rx| {
            let cancel = cancel.clone();
            let errors = Arc::clone(&errors);
            thread::Builder::new().name(format!("framekit-{}", names[index])).spawn(move || {
                let runtime = rx.recv().ok()?;
                Some(run_auto(runtime, &cancel, &errors))
            })
        });
        match spawned {
            Ok(workers) => Ok(Self { workers, cancel, errors }),
            Err((e, runtimes)) => {
                cancel.cancel();
                Err(StartError {
                    error: FrameKitError::ResourceCreation(format!("failed to spawn node runner: {e}")),
                    runtimes,
                })
            },
        }
    }

    /// Oldest recorded node failure, if any.
    pub fn take_error(&self) -> Option<FrameKitError> {
        lock(&self.errors).pop_front()
    }

    /// Pools must already be closed so blocked runners wake up.
    pub fn stop(self) -> Vec<NodeRuntime> {
        self.cancel.cancel();
        self.workers
            .into_iter()
            .filter_map(|w| join_worker("node runner", Some(w)).flatten())
            .collect()
    }
}

fn run_auto(
    mut runtime: NodeRuntime,
    cancel: &CancellationToken,
    errors: &Mutex<VecDeque<FrameKitError>>,
) -> NodeRuntime {
    let span =
        tracing::info_span!("node_run", node.name = %runtime.name, node.kind = %runtime.kind.label());
    let _enter = span.enter();
    tracing::debug!("Runner started");

    while !cancel.is_cancelled() {
        match runtime.run_cycle(Wait::Forever) {
            Ok(()) => {},
            Err(FrameKitError::PoolClosed(_)) => break,
            Err(e) => {
                if !cancel.is_cancelled() {
                    tracing::error!(error = %e, "Node failed, stopping its runner");
                    lock(errors).push_back(e);
                }
                break;
            },
        }
    }

    runtime.flush_stats();
    tracing::debug!("Runner stopped");
    runtime
}

fn join_worker<T>(what: &str, worker: Option<JoinHandle<T>>) -> Option<T> {
    match worker?.join() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::error!("{what} panicked; its nodes were not cleaned up");
            None
        },
    }
}

/// The executor of a live graph.
pub(crate) enum Executor {
    Explicit(ExplicitExecutor),
    Auto(AutoExecutor),
}

impl Executor {
    pub fn stop(self) -> Vec<NodeRuntime> {
        match self {
            Self::Explicit(executor) => executor.stop(),
            Self::Auto(executor) => executor.stop(),
        }
    }
}
