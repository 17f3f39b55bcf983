//! The pipeline stage contract.
//!
//! Every stage implements [`Node`]: one-time `setup`, repeated `invoke`,
//! idempotent `teardown`. A driver treats heterogeneous stages polymorphically
//! through `Box<dyn Node>`.
//!
//! Lifecycle discipline is enforced by the borrow checker: `setup` and
//! `teardown` take `&mut self` and therefore cannot race in-flight `invoke`
//! calls, which take `&self` and serialize internally on the node's own lock.
//!
//! Failures are surfaced through [`NodeError`] results from both setup and
//! invoke; the `health_status` metric mirrors them for observability but is
//! never the only failure signal.

pub mod camera;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::NodeConfig;
use crate::frame::FrameRecord;

/// Metric name for the monotonically increasing frame counter.
pub const METRIC_FRAME_COUNT: &str = "frame_count";
/// Metric name for the node health state.
pub const METRIC_HEALTH_STATUS: &str = "health_status";
/// Metric name for measured frame rate. Reserved: populated with 0.0 and not
/// computed by any current node.
pub const METRIC_FPS_ACTUAL: &str = "fps_actual";

/// Error taxonomy for node lifecycle and invoke failures.
///
/// `Display` and `Error` are implemented by hand because `thiserror` would
/// treat the `source: String` fields as the error's `source()`, which they
/// are not (they name the capture source URI).
#[derive(Debug)]
pub enum NodeError {
    DeviceOpen { source: String, reason: String },

    Warmup {
        source: String,
        attempt: u32,
        budget: u32,
        reason: String,
    },

    Read { reason: String },

    InvalidInput { node: String, reason: String },
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::DeviceOpen { source, reason } => {
                write!(f, "failed to open capture source '{source}': {reason}")
            }
            NodeError::Warmup {
                source,
                attempt,
                budget,
                reason,
            } => {
                write!(
                    f,
                    "warm-up read {attempt}/{budget} failed on '{source}': {reason}"
                )
            }
            NodeError::Read { reason } => write!(f, "frame read failed: {reason}"),
            NodeError::InvalidInput { node, reason } => {
                write!(f, "invalid input for node '{node}': {reason}")
            }
        }
    }
}

impl std::error::Error for NodeError {}

/// Result type for node operations.
pub type NodeResult<T = ()> = Result<T, NodeError>;

/// Node health, mirrored into metrics.
///
/// `Error` is terminal for the instance: no transition leads out of it, and a
/// caller that needs a working device constructs and sets up a new node.
/// `Initializing` is never re-entered once setup has completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Initializing,
    Healthy,
    Error,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Initializing => "initializing",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// A single metric value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(u64),
    Rate(f64),
    Health(HealthStatus),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Count(v) => write!(f, "{}", v),
            MetricValue::Rate(v) => write!(f, "{}", v),
            MetricValue::Health(v) => write!(f, "{}", v),
        }
    }
}

/// Name-keyed metrics owned by one node instance.
///
/// Created empty at construction, populated at setup, mutated only by the
/// node's own methods. External callers read cloned snapshots; a snapshot is
/// always internally consistent but may be stale the moment it is taken.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NodeMetrics {
    #[serde(flatten)]
    values: BTreeMap<String, MetricValue>,
}

impl NodeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: MetricValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<MetricValue> {
        self.values.get(name).copied()
    }

    pub fn count(&self, name: &str) -> Option<u64> {
        match self.values.get(name) {
            Some(MetricValue::Count(v)) => Some(*v),
            _ => None,
        }
    }

    /// Increment a counter and return the post-increment value. A missing
    /// counter starts from zero.
    pub fn incr_count(&mut self, name: &str) -> u64 {
        let next = self.count(name).unwrap_or(0) + 1;
        self.values
            .insert(name.to_string(), MetricValue::Count(next));
        next
    }

    pub fn health(&self) -> Option<HealthStatus> {
        match self.values.get(METRIC_HEALTH_STATUS) {
            Some(MetricValue::Health(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn set_health(&mut self, status: HealthStatus) {
        self.values
            .insert(METRIC_HEALTH_STATUS.to_string(), MetricValue::Health(status));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, MetricValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The structured unit of data passed between stages.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeData {
    /// No payload. Source nodes take this as input.
    Empty,
    /// One acquired frame with metadata.
    Frame(FrameRecord),
}

/// The uniform shape every pipeline stage satisfies.
pub trait Node: Send + Sync {
    /// Display name, used as the log tag for this node's messages.
    fn name(&self) -> &str;

    /// The configuration this node was constructed with.
    fn config(&self) -> &NodeConfig;

    /// One-time resource acquisition. Call once per instance, before any
    /// invoke traffic; a second call is a no-op.
    ///
    /// Failures are returned here, never only logged. After an error the
    /// node is unusable and `invoke` will keep failing.
    fn setup(&mut self) -> NodeResult;

    /// Perform the node's unit of work. Safe under concurrent callers; the
    /// node serializes internally.
    fn invoke(&self, input: NodeData) -> NodeResult<NodeData>;

    /// Release resources. Safe to call multiple times; repeat calls are
    /// no-ops and never panic.
    fn teardown(&mut self);

    /// Whether `input` is acceptable to `invoke`. The default accepts all
    /// input; nodes that consume structured input override this.
    fn validate_input(&self, _input: &NodeData) -> bool {
        true
    }

    /// Snapshot of this node's metrics.
    fn metrics(&self) -> NodeMetrics;

    /// Produce an independent copy of this node's configuration and metrics.
    ///
    /// Live resource handles are never cloned: the copy starts without a
    /// device and must run `setup()` before use.
    fn try_clone(&self) -> NodeResult<Box<dyn Node>>;
}
