//! Synthetic capture backend.
//!
//! `stub://` sources generate deterministic frames in-memory, with failure
//! behavior scripted through URI query parameters:
//!
//! - `stub://cam` — endless frames
//! - `stub://clip?frames=10` — finite clip; reads fail with end-of-stream
//!   once the budget is exhausted
//! - `stub://dead?fail=open` — open fails
//! - `stub://flaky?fail=read` — open succeeds, every read fails

use super::{CaptureDevice, CaptureFormat, CapturedFrame};
use crate::node::{NodeError, NodeResult};

const CHANNELS: u32 = 3; // RGB

/// Synthetic capture device.
#[derive(Debug)]
pub struct StubDevice {
    uri: String,
    format: CaptureFormat,
    frames_remaining: Option<u64>,
    fail_read: bool,
    frame_count: u64,
    /// Simulated "scene" state so consecutive frames differ.
    scene_state: u8,
    released: bool,
}

#[derive(Default)]
struct StubOptions {
    frames: Option<u64>,
    fail_open: bool,
    fail_read: bool,
}

impl StubOptions {
    fn parse(uri: &str) -> Self {
        let mut opts = StubOptions::default();
        let Some((_, query)) = uri.split_once('?') else {
            return opts;
        };
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("frames", value)) => opts.frames = value.parse().ok(),
                Some(("fail", "open")) => opts.fail_open = true,
                Some(("fail", "read")) => opts.fail_read = true,
                _ => {}
            }
        }
        opts
    }
}

impl StubDevice {
    pub fn open(uri: &str) -> NodeResult<Self> {
        let opts = StubOptions::parse(uri);
        if opts.fail_open {
            return Err(NodeError::DeviceOpen {
                source: uri.to_string(),
                reason: "stub source is scripted to fail open".to_string(),
            });
        }
        log::info!("StubDevice: opened {} (synthetic)", uri);
        Ok(Self {
            uri: uri.to_string(),
            format: CaptureFormat::default(),
            frames_remaining: opts.frames,
            fail_read: opts.fail_read,
            frame_count: 0,
            scene_state: 0,
            released: false,
        })
    }

    /// Generate deterministic pixels, with an occasional scene change so
    /// consecutive frames are not identical.
    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = buffer_len(&self.format);
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl CaptureDevice for StubDevice {
    fn configure(&mut self, format: &CaptureFormat) {
        self.format = *format;
    }

    fn read(&mut self) -> NodeResult<CapturedFrame> {
        if self.released {
            return Err(NodeError::Read {
                reason: format!("stub device {} was released", self.uri),
            });
        }
        if self.fail_read {
            return Err(NodeError::Read {
                reason: "stub source is scripted to fail reads".to_string(),
            });
        }
        if let Some(remaining) = self.frames_remaining {
            if remaining == 0 {
                return Err(NodeError::Read {
                    reason: format!("end of stream on {}", self.uri),
                });
            }
            self.frames_remaining = Some(remaining - 1);
        }

        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Ok(CapturedFrame {
            pixels,
            width: self.format.width,
            height: self.format.height,
            channels: CHANNELS,
        })
    }

    fn release(&mut self) {
        if !self.released {
            log::info!("StubDevice: released {}", self.uri);
        }
        self.released = true;
    }

    fn is_open(&self) -> bool {
        !self.released
    }
}

/// Buffer length for a tightly packed frame, widened before multiplying so
/// extreme configured dimensions cannot overflow `u32`.
fn buffer_len(format: &CaptureFormat) -> usize {
    format.width as usize * format.height as usize * CHANNELS as usize
}
