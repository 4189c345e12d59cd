// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Explicit and auto-queue execution.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{fill, first_byte, frame, init_tracing, Events, ProbeKernel, LIMIT};
use framekit_core::{FrameKitError, GraphState};
use framekit_engine::{AutoQueueConfig, Graph, GraphConfig, NodeKind};
use framekit_nodes::kernels::CopyKernel;

fn copy() -> NodeKind {
    NodeKind::kernel(CopyKernel::new(frame()))
}

#[test]
fn test_schedule_then_wait_runs_queued_cycles() {
    init_tracing();
    let mut graph = Graph::default();
    let a = graph.add_node("a", copy()).unwrap();
    let b = graph.add_node("b", copy()).unwrap();
    graph.link_pads(a.src(0), b.sink(0)).unwrap();
    graph.verify().unwrap();

    let input = graph.pad_queue(a.sink(0)).unwrap();
    let output = graph.pad_queue(b.src(0)).unwrap();
    for value in [5u8, 6, 7] {
        let buf = input.acquire().unwrap();
        fill(&buf, value);
        input.enqueue(buf).unwrap();
    }
    for _ in 0..3 {
        graph.schedule().unwrap();
    }
    assert_eq!(graph.state(), GraphState::Running);
    graph.wait().unwrap();
    assert_eq!(graph.cycles_completed(), 3);

    for value in [5u8, 6, 7] {
        let out = output.dequeue_timeout(LIMIT).unwrap();
        assert_eq!(first_byte(&out, 0), value);
        input.release(input.dequeue_timeout(LIMIT).unwrap());
    }

    let stats = graph.node_stats();
    assert_eq!(stats["a"].cycles, 3);
    assert_eq!(stats["b"].received, 3);
    assert_eq!(stats["b"].sent, 3);
}

#[test]
fn test_kernel_error_surfaces_from_wait() {
    init_tracing();
    let events = Events::default();
    let mut graph = Graph::default();
    let bad = graph
        .add_node("bad", NodeKind::kernel(ProbeKernel::new(frame(), &events).failing_process()))
        .unwrap();
    graph.verify().unwrap();

    let input = graph.pad_queue(bad.sink(0)).unwrap();
    let buf = input.acquire().unwrap();
    let index = buf.index();
    input.enqueue(buf).unwrap();

    let err = graph.process().unwrap_err();
    assert!(matches!(err, FrameKitError::ExternalDevice { code: -1, .. }), "{err}");
    // The failed cycle still hands the input back.
    assert_eq!(input.dequeue_timeout(LIMIT).unwrap().index(), index);
    assert_eq!(graph.node_stats()["bad"].errored, 1);
    // Nothing was produced.
    let output = graph.pad_queue(bad.src(0)).unwrap();
    assert!(output.try_dequeue().unwrap().is_none());
    assert_eq!(output.pool().free_count(), 4);
}

#[test]
fn test_auto_queue_pipelines_frames() {
    init_tracing();
    let config = GraphConfig {
        auto_queue: AutoQueueConfig { max_in_flight: Some(2) },
        ..GraphConfig::auto_queue()
    };
    let mut graph = Graph::new(config);
    let a = graph.add_node("a", copy()).unwrap();
    let b = graph.add_node("b", copy()).unwrap();
    graph.link_pads(a.src(0), b.sink(0)).unwrap();
    graph.verify().unwrap();
    assert_eq!(graph.state(), GraphState::Running);
    assert!(matches!(graph.schedule(), Err(FrameKitError::InvalidState(_))));

    let input = graph.pad_queue(a.sink(0)).unwrap();
    let output = graph.pad_queue(b.src(0)).unwrap();
    let frames = 12u8;

    let feeder = {
        let input = input.clone();
        std::thread::spawn(move || {
            for value in 0..frames {
                let buf = input.acquire_timeout(LIMIT).unwrap();
                fill(&buf, value);
                input.enqueue(buf).unwrap();
            }
        })
    };
    let recycler = {
        let input = input.clone();
        std::thread::spawn(move || {
            for _ in 0..frames {
                input.release(input.dequeue_timeout(LIMIT).unwrap());
            }
        })
    };

    for value in 0..frames {
        let out = output.dequeue_timeout(LIMIT).unwrap();
        assert_eq!(first_byte(&out, 0), value);
        output.release(out);
    }
    feeder.join().unwrap();
    recycler.join().unwrap();
    assert!(graph.take_runtime_error().is_none());

    graph.clean();
    assert_eq!(graph.node_stats()["b"].cycles, u64::from(frames));
}

#[test]
fn test_auto_queue_records_node_failure() {
    init_tracing();
    let events = Events::default();
    let mut graph = Graph::new(GraphConfig::auto_queue());
    let bad = graph
        .add_node("bad", NodeKind::kernel(ProbeKernel::new(frame(), &events).failing_process()))
        .unwrap();
    graph.verify().unwrap();

    let input = graph.pad_queue(bad.sink(0)).unwrap();
    input.enqueue(input.acquire().unwrap()).unwrap();
    input.release(input.dequeue_timeout(LIMIT).unwrap());

    // The runner records the failure before it exits.
    let mut error = None;
    for _ in 0..100 {
        error = graph.take_runtime_error();
        if error.is_some() {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    assert!(matches!(error, Some(FrameKitError::ExternalDevice { .. })));

    graph.clean();
    assert_eq!(common::events(&events), vec!["create:bad@host", "delete:bad"]);
}
