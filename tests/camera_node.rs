//! Acquisition node lifecycle, health, and concurrency behavior.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use frameflow::config::KEY_SOURCE;
use frameflow::{
    FrameAcquisitionNode, HealthStatus, Node, NodeConfig, NodeData, NodeError, NodeMetrics,
    METRIC_FRAME_COUNT, WARMUP_READS,
};

fn node_for(source: &str) -> FrameAcquisitionNode {
    FrameAcquisitionNode::new(
        NodeConfig::new("cam-it")
            .with(KEY_SOURCE, source)
            .with("width", 640)
            .with("height", 480)
            .with("fps", 30),
    )
}

fn expect_frame(data: NodeData) -> frameflow::FrameRecord {
    match data {
        NodeData::Frame(record) => record,
        NodeData::Empty => panic!("expected a frame record"),
    }
}

#[test]
fn frame_ids_are_sequential_from_one() {
    let mut node = node_for("stub://cam");
    node.setup().expect("setup");

    for expected in 1..=20u64 {
        let record = expect_frame(node.invoke(NodeData::Empty).expect("invoke"));
        assert_eq!(record.frame_id, expected);
    }
    assert_eq!(node.metrics().count(METRIC_FRAME_COUNT), Some(20));
}

#[test]
fn read_failure_is_terminal() {
    let mut node = node_for("stub://flaky?fail=read");
    // Warm-up fails, so setup fails and health lands in error.
    assert!(node.setup().is_err());
    assert_eq!(node.metrics().health(), Some(HealthStatus::Error));

    // No self-healing: every subsequent invoke keeps failing.
    for _ in 0..3 {
        let err = node.invoke(NodeData::Empty).unwrap_err();
        assert!(matches!(err, NodeError::Read { .. }));
        assert_eq!(node.metrics().health(), Some(HealthStatus::Error));
    }
}

#[test]
fn end_of_stream_flips_health_to_error_mid_run() {
    // 5 warm-up reads + 5 invokes, then end of stream.
    let mut node = node_for(&format!("stub://clip?frames={}", WARMUP_READS + 5));
    node.setup().expect("setup");
    assert_eq!(node.metrics().health(), Some(HealthStatus::Healthy));

    let record = expect_frame(node.invoke(NodeData::Empty).expect("first invoke"));
    assert_eq!(record.frame_id, 1);
    assert_eq!(record.shape.height, 480);
    assert_eq!(record.shape.width, 640);

    for expected in 2..=5u64 {
        let record = expect_frame(node.invoke(NodeData::Empty).expect("invoke"));
        assert_eq!(record.frame_id, expected);
    }

    let err = node.invoke(NodeData::Empty).unwrap_err();
    assert!(matches!(err, NodeError::Read { .. }));
    assert_eq!(node.metrics().health(), Some(HealthStatus::Error));
    // The counter is not reset by the failure.
    assert_eq!(node.metrics().count(METRIC_FRAME_COUNT), Some(5));
}

#[test]
fn unreadable_source_never_yields_a_frame() {
    let mut node = node_for("stub://dead?fail=open");
    let err = node.setup().unwrap_err();
    assert!(matches!(err, NodeError::DeviceOpen { .. }));
    assert_ne!(node.metrics().health(), Some(HealthStatus::Healthy));

    let err = node.invoke(NodeData::Empty).unwrap_err();
    assert!(matches!(err, NodeError::Read { .. }));
}

#[test]
fn concurrent_invokes_never_duplicate_frame_ids() {
    let mut node = node_for("stub://cam");
    node.setup().expect("setup");
    let node = Arc::new(node);

    const THREADS: usize = 8;
    const PER_THREAD: usize = 50;

    let mut handles = Vec::new();
    for _ in 0..THREADS {
        let node = Arc::clone(&node);
        handles.push(thread::spawn(move || {
            let mut ids = Vec::with_capacity(PER_THREAD);
            for _ in 0..PER_THREAD {
                let record = expect_frame(node.invoke(NodeData::Empty).expect("invoke"));
                ids.push(record.frame_id);
            }
            ids
        }));
    }

    let mut all_ids = Vec::new();
    for handle in handles {
        all_ids.extend(handle.join().expect("worker"));
    }

    let unique: HashSet<u64> = all_ids.iter().copied().collect();
    assert_eq!(unique.len(), THREADS * PER_THREAD);
    assert_eq!(
        node.metrics().count(METRIC_FRAME_COUNT),
        Some((THREADS * PER_THREAD) as u64)
    );
    // With no failures the ids are a permutation of 1..=N.
    assert_eq!(*all_ids.iter().max().unwrap(), (THREADS * PER_THREAD) as u64);
    assert_eq!(*all_ids.iter().min().unwrap(), 1);
}

#[test]
fn clone_copies_state_but_not_the_device() {
    let mut node = node_for("stub://cam");
    node.setup().expect("setup");
    for _ in 0..3 {
        node.invoke(NodeData::Empty).expect("invoke");
    }

    let copy = node.try_clone().expect("clone");
    assert_eq!(copy.config(), node.config());

    let expected: NodeMetrics = node.metrics();
    assert_eq!(copy.metrics(), expected);

    // The copy holds no device: it must be set up before it can produce.
    let err = copy.invoke(NodeData::Empty).unwrap_err();
    assert!(matches!(err, NodeError::Read { .. }));

    // And the source keeps producing from its own device, unaffected.
    let record = expect_frame(node.invoke(NodeData::Empty).expect("invoke"));
    assert_eq!(record.frame_id, 4);
}

#[test]
fn clone_can_be_set_up_independently() {
    let mut node = node_for("stub://cam");
    node.setup().expect("setup");
    node.invoke(NodeData::Empty).expect("invoke");

    let mut copy = node.try_clone().expect("clone");
    copy.setup().expect("clone setup");
    // Setup re-initializes the clone's metrics: it is a fresh instance with
    // its own device and its own frame sequence.
    let record = expect_frame(copy.invoke(NodeData::Empty).expect("invoke"));
    assert_eq!(record.frame_id, 1);
    assert_eq!(copy.metrics().health(), Some(HealthStatus::Healthy));
}

#[test]
fn teardown_twice_does_not_panic() {
    let mut node = node_for("stub://cam");
    node.setup().expect("setup");
    node.invoke(NodeData::Empty).expect("invoke");

    node.teardown();
    node.teardown();

    // Device is gone both times; invoking afterwards is a read failure.
    let err = node.invoke(NodeData::Empty).unwrap_err();
    assert!(matches!(err, NodeError::Read { .. }));
}

#[test]
fn invoke_after_teardown_downgrades_health() {
    let mut node = node_for("stub://cam");
    node.setup().expect("setup");
    assert_eq!(node.metrics().health(), Some(HealthStatus::Healthy));

    node.teardown();
    let err = node.invoke(NodeData::Empty).unwrap_err();
    assert!(matches!(err, NodeError::Read { .. }));
    // The mirror no longer claims the node is healthy.
    assert_eq!(node.metrics().health(), Some(HealthStatus::Error));

    // A node that never ran setup has no health to downgrade.
    let fresh = node_for("stub://cam");
    assert!(fresh.invoke(NodeData::Empty).is_err());
    assert_eq!(fresh.metrics().health(), None);
}

#[test]
fn teardown_without_setup_is_a_no_op() {
    let mut node = node_for("stub://cam");
    node.teardown();
    assert!(node.metrics().is_empty());
}
