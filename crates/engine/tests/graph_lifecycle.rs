// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Building, linking, verifying and cleaning graphs.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::{frame, init_tracing, Events, ProbeKernel};
use framekit_core::{FrameKitError, GraphState, NodeState};
use framekit_engine::{Graph, GraphConfig, NodeKind};
use framekit_nodes::kernels::CopyKernel;

fn copy(channels: u32) -> NodeKind {
    NodeKind::kernel(CopyKernel::new(frame().with_channels(channels)))
}

#[test]
fn test_link_unifies_exemplars() {
    init_tracing();
    let mut graph = Graph::default();
    let a = graph.add_node("a", copy(3)).unwrap();
    let b = graph.add_node("b", copy(0)).unwrap();

    // Argument order does not matter.
    graph.link_pads(b.sink(0), a.src(0)).unwrap();

    let src = graph.pad(a.src(0)).unwrap();
    let sink = graph.pad(b.sink(0)).unwrap();
    assert_eq!(src.exemplar, sink.exemplar);
    assert_eq!(sink.exemplar.channels, 3);
    assert_eq!(src.peer, Some(b.sink(0)));
    assert_eq!(graph.node(b).unwrap().state(), NodeState::Linked);

    graph.verify().unwrap();
    // b's output inherited the channel count through inference.
    assert_eq!(graph.pad(b.src(0)).unwrap().exemplar.channels, 3);
}

#[test]
fn test_link_rejects_bad_pairs() {
    let mut graph = Graph::default();
    let a = graph.add_node("a", copy(1)).unwrap();
    let b = graph.add_node("b", copy(1)).unwrap();
    let c = graph.add_node("c", copy(2)).unwrap();

    assert!(matches!(graph.link_pads(a.src(0), b.src(0)), Err(FrameKitError::Configuration(_))));
    assert!(matches!(graph.link_pads(a.sink(0), b.sink(0)), Err(FrameKitError::Configuration(_))));
    assert!(matches!(graph.link_pads(a.src(0), c.sink(0)), Err(FrameKitError::Configuration(_))));

    graph.link_pads(a.src(0), b.sink(0)).unwrap();
    let err = graph.link_pads(a.src(0), c.sink(0)).unwrap_err();
    assert!(err.to_string().contains("already linked"), "{err}");
}

#[test]
fn test_duplicate_name_rejected() {
    let mut graph = Graph::default();
    graph.add_node("a", copy(1)).unwrap();
    assert!(matches!(graph.add_node("a", copy(1)), Err(FrameKitError::Configuration(_))));
    assert_eq!(graph.nodes().count(), 1);
}

#[test]
fn test_cycle_rejected_without_pools() {
    init_tracing();
    let mut graph = Graph::default();
    let a = graph.add_node("a", copy(1)).unwrap();
    let b = graph.add_node("b", copy(1)).unwrap();
    graph.link_pads(a.src(0), b.sink(0)).unwrap();
    graph.link_pads(b.src(0), a.sink(0)).unwrap();

    let err = graph.verify().unwrap_err();
    assert!(matches!(err, FrameKitError::Configuration(_)));
    assert!(err.to_string().contains("cycle"), "{err}");
    assert_eq!(graph.state(), GraphState::Building);
    assert_eq!(graph.pool_count(), 0);
}

#[test]
fn test_pools_follow_links() {
    let mut graph = Graph::default();
    let a = graph.add_node("a", copy(1)).unwrap();
    let b = graph.add_node("b", copy(1)).unwrap();
    graph.link_pads(a.src(0), b.sink(0)).unwrap();
    graph.verify().unwrap();

    // a.in, a.out→b.in, b.out
    assert_eq!(graph.pool_count(), 3);
    let depths: Vec<usize> = graph.pool_stats().iter().map(|s| s.depth).collect();
    assert_eq!(depths, vec![4, 4, 4]);
}

#[test]
fn test_lifecycle_state_checks() {
    let mut graph = Graph::default();
    let a = graph.add_node("a", copy(1)).unwrap();

    assert!(matches!(graph.schedule(), Err(FrameKitError::InvalidState(_))));
    assert!(matches!(graph.pad_queue(a.sink(0)), Err(FrameKitError::InvalidState(_))));

    graph.verify().unwrap();
    assert_eq!(graph.state(), GraphState::Verified);
    assert_eq!(graph.node(a).unwrap().state(), NodeState::Verified);
    assert!(matches!(graph.verify(), Err(FrameKitError::InvalidState(_))));
    assert!(matches!(graph.add_node("b", copy(1)), Err(FrameKitError::InvalidState(_))));

    graph.clean();
    assert_eq!(graph.state(), GraphState::Cleaned);
    assert_eq!(graph.node(a).unwrap().state(), NodeState::Cleaned);
    assert!(matches!(graph.pad_queue(a.sink(0)), Err(FrameKitError::InvalidState(_))));
    assert!(matches!(graph.process(), Err(FrameKitError::InvalidState(_))));
    // Idempotent.
    graph.clean();
    assert_eq!(graph.state(), GraphState::Cleaned);
}

#[test]
fn test_internal_pad_has_no_host_queue() {
    let mut graph = Graph::default();
    let a = graph.add_node("a", copy(1)).unwrap();
    let b = graph.add_node("b", copy(1)).unwrap();
    graph.link_pads(a.src(0), b.sink(0)).unwrap();
    graph.verify().unwrap();

    assert!(matches!(graph.pad_queue(a.src(0)), Err(FrameKitError::Configuration(_))));
    assert!(matches!(graph.pad_queue(b.sink(0)), Err(FrameKitError::Configuration(_))));
    assert!(graph.pad_queue(a.sink(0)).is_ok());
    assert!(graph.pad_queue(b.src(0)).is_ok());
}

#[test]
fn test_targets_assigned_round_robin() {
    init_tracing();
    let events = Events::default();
    let config = GraphConfig {
        targets: HashMap::from([("vpu".to_string(), vec!["vpu0".to_string(), "vpu1".to_string()])]),
        ..GraphConfig::default()
    };
    let mut graph = Graph::new(config);
    for name in ["k0", "k1", "k2"] {
        graph
            .add_node(name, NodeKind::kernel(ProbeKernel::new(frame(), &events).on_target("vpu")))
            .unwrap();
    }
    graph.add_node("host", NodeKind::kernel(ProbeKernel::new(frame(), &events))).unwrap();
    graph.verify().unwrap();

    assert_eq!(
        common::events(&events),
        vec!["create:k0@vpu0", "create:k1@vpu1", "create:k2@vpu0", "create:host@host"]
    );

    graph.clean();
    let all = common::events(&events);
    assert_eq!(all.iter().filter(|e| e.starts_with("delete:")).count(), 4);
}

#[test]
fn test_unknown_target_class_fails_verify() {
    let events = Events::default();
    let mut graph = Graph::default();
    graph
        .add_node("k", NodeKind::kernel(ProbeKernel::new(frame(), &events).on_target("dsp")))
        .unwrap();
    let err = graph.verify().unwrap_err();
    assert!(matches!(err, FrameKitError::Configuration(_)), "{err}");
    assert_eq!(graph.state(), GraphState::Building);
    assert_eq!(graph.pool_count(), 0);
}

#[test]
fn test_failed_create_rolls_back() {
    init_tracing();
    let events = Events::default();
    let mut graph = Graph::default();
    let a = graph.add_node("a", NodeKind::kernel(ProbeKernel::new(frame(), &events))).unwrap();
    let b = graph
        .add_node("b", NodeKind::kernel(ProbeKernel::new(frame(), &events).failing_create()))
        .unwrap();
    graph.link_pads(a.src(0), b.sink(0)).unwrap();

    let err = graph.verify().unwrap_err();
    assert!(matches!(err, FrameKitError::ExternalDevice { code: -3, .. }), "{err}");
    assert_eq!(common::events(&events), vec!["create:a@host", "delete:a"]);
    assert_eq!(graph.state(), GraphState::Building);
    assert_eq!(graph.pool_count(), 0);
    assert_eq!(graph.node(a).unwrap().state(), NodeState::Linked);
}

#[test]
fn test_dot_output() {
    let mut graph = Graph::default();
    let a = graph.add_node("camera_copy", copy(1)).unwrap();
    let b = graph.add_node("scaler", copy(1)).unwrap();
    graph.link_pads(a.src(0), b.sink(0)).unwrap();

    let dot = graph.to_dot();
    assert!(dot.starts_with("digraph framekit {"));
    assert!(dot.contains("camera_copy"));
    assert!(dot.contains("n0 -> n1"));
    assert!(dot.contains(&format!("\"{}\"", a.sink(0))));
}

#[test]
fn test_dropping_live_graph_releases_pools() {
    let mut graph = Graph::default();
    let a = graph.add_node("a", copy(1)).unwrap();
    graph.verify().unwrap();
    let queue = graph.pad_queue(a.sink(0)).unwrap();
    let pool = Arc::clone(queue.pool());
    drop(graph);
    assert!(pool.is_closed());
    assert!(matches!(queue.try_acquire(), Err(FrameKitError::PoolClosed(_))));
}
