//! Frame acquisition node.
//!
//! Owns exactly one capture device across its lifetime and produces a
//! metadata-tagged frame on each invoke. Health follows a one-way state
//! machine: `initializing` at the start of setup, `healthy` only after open,
//! configure, and a full warm-up read sequence all succeed, and `error` once
//! anything fails. `error` is terminal: there is no reconnection, and a
//! caller that needs a fresh device constructs a new node.
//!
//! Concurrency: the device slot and the metrics live behind one mutex, so
//! concurrent `invoke` calls never interleave a hardware read with a metrics
//! update. `setup` and `teardown` take `&mut self` and are thereby excluded
//! from racing invokes on the same instance.

use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::capture::{self, CaptureDevice, CaptureFormat, CaptureSource};
use crate::config::{NodeConfig, KEY_FPS, KEY_HEIGHT, KEY_WIDTH};
use crate::frame::{FrameRecord, FrameShape};
use crate::node::{
    HealthStatus, MetricValue, Node, NodeData, NodeError, NodeMetrics, NodeResult,
    METRIC_FPS_ACTUAL, METRIC_FRAME_COUNT,
};

/// Number of consecutive successful reads required before the device is
/// trusted. Warm-up reads do not advance the frame counter.
pub const WARMUP_READS: u32 = 5;

/// A pipeline source node that owns one capture device.
pub struct FrameAcquisitionNode {
    name: String,
    config: NodeConfig,
    initialized: bool,
    inner: Mutex<AcquisitionState>,
}

struct AcquisitionState {
    device: Option<Box<dyn CaptureDevice>>,
    metrics: NodeMetrics,
}

impl FrameAcquisitionNode {
    /// Construct an un-initialized node. Metrics stay empty until `setup`.
    pub fn new(config: NodeConfig) -> Self {
        Self {
            name: config.name().to_string(),
            config,
            initialized: false,
            inner: Mutex::new(AcquisitionState {
                device: None,
                metrics: NodeMetrics::new(),
            }),
        }
    }

    /// Requested capture format from config, with documented defaults
    /// (640x480 @ 30).
    fn requested_format(&self) -> CaptureFormat {
        let defaults = CaptureFormat::default();
        CaptureFormat {
            width: self.config.get_u32(KEY_WIDTH).unwrap_or(defaults.width),
            height: self.config.get_u32(KEY_HEIGHT).unwrap_or(defaults.height),
            fps: self.config.get_u32(KEY_FPS).unwrap_or(defaults.fps),
        }
    }

    /// Current health, for callers that only poll observability.
    pub fn health(&self) -> Option<HealthStatus> {
        self.lock().metrics.health()
    }

    fn lock(&self) -> MutexGuard<'_, AcquisitionState> {
        // A panic while holding the lock poisons it; the state itself stays
        // consistent (scalar metric writes and a device slot), so recover.
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn warm_up(&self, device: &mut dyn CaptureDevice, source: &CaptureSource) -> NodeResult {
        for attempt in 1..=WARMUP_READS {
            if let Err(err) = device.read() {
                log::warn!(
                    "{}: warm-up read {}/{} failed: {}",
                    self.name,
                    attempt,
                    WARMUP_READS,
                    err
                );
                return Err(NodeError::Warmup {
                    source: source.to_string(),
                    attempt,
                    budget: WARMUP_READS,
                    reason: err.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Node for FrameAcquisitionNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &NodeConfig {
        &self.config
    }

    fn setup(&mut self) -> NodeResult {
        if self.initialized {
            log::debug!("{}: setup already completed", self.name);
            return Ok(());
        }

        let source = self.config.source();
        let format = self.requested_format();

        // &mut self guarantees no concurrent invoke; get_mut avoids holding
        // the guard across the device open.
        let state = self.inner.get_mut().unwrap_or_else(|err| err.into_inner());
        if state.metrics.health() == Some(HealthStatus::Error) {
            // Error is terminal for the instance; a fresh device needs a
            // fresh node.
            return Err(NodeError::DeviceOpen {
                source: source.to_string(),
                reason: "node is in terminal error state".to_string(),
            });
        }
        state.metrics.set(METRIC_FRAME_COUNT, MetricValue::Count(0));
        state.metrics.set(METRIC_FPS_ACTUAL, MetricValue::Rate(0.0));
        state.metrics.set_health(HealthStatus::Initializing);

        let mut device = match capture::open(&source) {
            Ok(device) => device,
            Err(err) => {
                log::error!("{}: {}", self.name, err);
                state.metrics.set_health(HealthStatus::Error);
                return Err(err);
            }
        };
        device.configure(&format);

        if let Err(err) = self.warm_up(device.as_mut(), &source) {
            device.release();
            let state = self.inner.get_mut().unwrap_or_else(|err| err.into_inner());
            state.metrics.set_health(HealthStatus::Error);
            return Err(err);
        }

        let state = self.inner.get_mut().unwrap_or_else(|err| err.into_inner());
        state.device = Some(device);
        state.metrics.set_health(HealthStatus::Healthy);
        self.initialized = true;
        log::info!(
            "{}: source '{}' healthy after {} warm-up reads",
            self.name,
            source,
            WARMUP_READS
        );
        Ok(())
    }

    fn invoke(&self, _input: NodeData) -> NodeResult<NodeData> {
        let mut state = self.lock();

        let Some(device) = state.device.as_mut() else {
            // Keep the observability mirror in step with the error stream:
            // a healthy-looking node without a device (torn down) goes to
            // error. A never-set-up node has no health to downgrade.
            if state.metrics.health() == Some(HealthStatus::Healthy) {
                state.metrics.set_health(HealthStatus::Error);
            }
            return Err(NodeError::Read {
                reason: "capture device is not open".to_string(),
            });
        };

        match device.read() {
            Ok(frame) => {
                let frame_id = state.metrics.incr_count(METRIC_FRAME_COUNT);
                let timestamp_s = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or_default();
                Ok(NodeData::Frame(FrameRecord {
                    shape: FrameShape {
                        height: frame.height,
                        width: frame.width,
                        channels: frame.channels,
                    },
                    pixels: frame.pixels,
                    frame_id,
                    timestamp_s,
                }))
            }
            Err(err) => {
                state.metrics.set_health(HealthStatus::Error);
                log::error!("{}: {}", self.name, err);
                Err(err)
            }
        }
    }

    fn teardown(&mut self) {
        let state = self.inner.get_mut().unwrap_or_else(|err| err.into_inner());
        if let Some(mut device) = state.device.take() {
            device.release();
            log::info!("{}: capture device released", self.name);
        }
    }

    fn metrics(&self) -> NodeMetrics {
        self.lock().metrics.clone()
    }

    fn try_clone(&self) -> NodeResult<Box<dyn Node>> {
        let metrics = self.lock().metrics.clone();
        Ok(Box::new(Self {
            name: self.name.clone(),
            config: self.config.clone(),
            initialized: false,
            inner: Mutex::new(AcquisitionState {
                device: None,
                metrics,
            }),
        }))
    }
}

impl Drop for FrameAcquisitionNode {
    fn drop(&mut self) {
        self.teardown();
    }
}
