//! frameflow
//!
//! Pluggable processing nodes for a vision pipeline.
//!
//! Every pipeline stage implements the [`Node`] contract: one-time `setup`,
//! repeated `invoke`, idempotent `teardown`, and introspectable metrics. The
//! flagship stage is [`FrameAcquisitionNode`], which owns a capture device
//! (camera or video file), runs an open/warm-up protocol at setup, serializes
//! concurrent reads, and tags every frame with sequence and health metadata.
//!
//! # Module Structure
//!
//! - `node`: the stage contract, metrics, health states, and error taxonomy
//! - `node::camera`: the frame-acquisition node
//! - `capture`: the capture-device layer (stub, V4L2, FFmpeg backends)
//! - `config`: string-keyed heterogeneous node configuration
//! - `frame`: the frame record produced by acquisition
//!
//! Device backends for real hardware are feature-gated (`capture-v4l2`,
//! `capture-ffmpeg`); the synthetic `stub://` backend is always available for
//! tests and demos.
//!
//! Logging goes through the `log` facade, tagged with the node's name. The
//! host application installs the logger (e.g. `env_logger`) once; the library
//! never initializes process-wide logging itself.

pub mod capture;
pub mod config;
pub mod frame;
pub mod node;

pub use capture::{CaptureDevice, CaptureFormat, CaptureSource, CapturedFrame};
pub use config::NodeConfig;
pub use frame::{FrameRecord, FrameShape};
pub use node::camera::{FrameAcquisitionNode, WARMUP_READS};
pub use node::{
    HealthStatus, MetricValue, Node, NodeData, NodeError, NodeMetrics, NodeResult,
    METRIC_FPS_ACTUAL, METRIC_FRAME_COUNT, METRIC_HEALTH_STATUS,
};
