//! V4L2 capture backend (feature: `capture-v4l2`).
//!
//! Drives a local device node (e.g. `/dev/video0`) through libv4l. Format and
//! frame-rate requests are best-effort: a refusal is logged and the device
//! keeps whatever it negotiated. The mmap buffer stream is created lazily on
//! the first read, so `configure` can still adjust the format after open.

use ouroboros::self_referencing;
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;

use super::{CaptureDevice, CaptureFormat, CapturedFrame};
use crate::node::{NodeError, NodeResult};

const STREAM_BUFFERS: u32 = 4;
const CHANNELS: u32 = 3; // RGB3

pub(crate) struct V4l2Device {
    path: String,
    /// Held between open and the first read; consumed to build the stream.
    pending: Option<v4l::Device>,
    stream: Option<V4l2Stream>,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct V4l2Stream {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: MmapStream<'this, v4l::Device>,
}

impl V4l2Device {
    pub(crate) fn open(path: &str) -> NodeResult<Self> {
        let device = v4l::Device::with_path(path).map_err(|err| NodeError::DeviceOpen {
            source: path.to_string(),
            reason: err.to_string(),
        })?;
        let format = CaptureFormat::default();
        log::info!("V4l2Device: opened {}", path);
        Ok(Self {
            path: path.to_string(),
            pending: Some(device),
            stream: None,
            active_width: format.width,
            active_height: format.height,
        })
    }

    fn ensure_stream(&mut self) -> NodeResult<&mut V4l2Stream> {
        if self.stream.is_none() {
            let device = self.pending.take().ok_or_else(|| NodeError::Read {
                reason: format!("v4l2 device {} was released", self.path),
            })?;
            let stream = V4l2StreamTryBuilder {
                device,
                stream_builder: |device| {
                    MmapStream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS).map_err(
                        |err| NodeError::Read {
                            reason: format!("create v4l2 buffer stream: {}", err),
                        },
                    )
                },
            }
            .try_build()?;
            self.stream = Some(stream);
        }
        self.stream.as_mut().ok_or_else(|| NodeError::Read {
            reason: format!("v4l2 device {} was released", self.path),
        })
    }
}

impl CaptureDevice for V4l2Device {
    fn configure(&mut self, requested: &CaptureFormat) {
        let Some(device) = self.pending.as_mut() else {
            log::warn!(
                "V4l2Device: configure on {} ignored, stream already started",
                self.path
            );
            return;
        };

        let mut format = match device.format() {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Device: failed to read format on {}: {}", self.path, err);
                return;
            }
        };
        format.width = requested.width;
        format.height = requested.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let negotiated = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Device: failed to set format on {}: {}", self.path, err);
                device.format().unwrap_or(format)
            }
        };
        self.active_width = negotiated.width;
        self.active_height = negotiated.height;

        if requested.fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(requested.fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Device: failed to set fps on {}: {}", self.path, err);
            }
        }

        log::info!(
            "V4l2Device: {} negotiated {}x{}",
            self.path,
            self.active_width,
            self.active_height
        );
    }

    fn read(&mut self) -> NodeResult<CapturedFrame> {
        let path = self.path.clone();
        let (width, height) = (self.active_width, self.active_height);
        let stream = self.ensure_stream()?;
        let (buf, _meta) = stream
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| NodeError::Read {
                reason: format!("capture v4l2 frame from {}: {}", path, err),
            })?;

        Ok(CapturedFrame {
            pixels: buf.to_vec(),
            width,
            height,
            channels: CHANNELS,
        })
    }

    fn release(&mut self) {
        let had_pending = self.pending.take().is_some();
        let had_stream = self.stream.take().is_some();
        if had_pending || had_stream {
            log::info!("V4l2Device: released {}", self.path);
        }
    }

    fn is_open(&self) -> bool {
        self.pending.is_some() || self.stream.is_some()
    }
}
