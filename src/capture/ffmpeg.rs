//! FFmpeg file capture backend (feature: `capture-ffmpeg`).
//!
//! Decodes a local video file to packed RGB24. End of stream surfaces as a
//! read failure, matching how a disconnected camera surfaces on live
//! backends.

use ffmpeg_next as ffmpeg;

use super::{CaptureDevice, CaptureFormat, CapturedFrame};
use crate::node::{NodeError, NodeResult};

const CHANNELS: u32 = 3; // RGB24

pub(crate) struct FfmpegDevice {
    path: String,
    state: Option<FfmpegState>,
}

struct FfmpegState {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    target_width: u32,
    target_height: u32,
}

fn open_err(path: &str, reason: impl ToString) -> NodeError {
    NodeError::DeviceOpen {
        source: path.to_string(),
        reason: reason.to_string(),
    }
}

impl FfmpegDevice {
    pub(crate) fn open(path: &str) -> NodeResult<Self> {
        ffmpeg::init().map_err(|err| open_err(path, format!("initialize ffmpeg: {}", err)))?;
        let input = ffmpeg::format::input(&path).map_err(|err| open_err(path, err))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| open_err(path, "file has no video track"))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .map_err(|err| open_err(path, format!("load decoder parameters: {}", err)))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|err| open_err(path, format!("open video decoder: {}", err)))?;

        let target_width = decoder.width();
        let target_height = decoder.height();
        let scaler = build_scaler(&decoder, target_width, target_height)
            .map_err(|err| open_err(path, err))?;

        log::info!("FfmpegDevice: opened {}", path);
        Ok(Self {
            path: path.to_string(),
            state: Some(FfmpegState {
                input,
                stream_index,
                decoder,
                scaler,
                target_width,
                target_height,
            }),
        })
    }
}

impl CaptureDevice for FfmpegDevice {
    fn configure(&mut self, requested: &CaptureFormat) {
        // A file delivers at its encoded rate; only the output size can be
        // adjusted, by rescaling.
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if requested.width == state.target_width && requested.height == state.target_height {
            return;
        }
        match build_scaler(&state.decoder, requested.width, requested.height) {
            Ok(scaler) => {
                state.scaler = scaler;
                state.target_width = requested.width;
                state.target_height = requested.height;
            }
            Err(err) => {
                log::warn!(
                    "FfmpegDevice: failed to rescale {} to {}x{}: {}",
                    self.path,
                    requested.width,
                    requested.height,
                    err
                );
            }
        }
    }

    fn read(&mut self) -> NodeResult<CapturedFrame> {
        let state = self.state.as_mut().ok_or_else(|| NodeError::Read {
            reason: format!("ffmpeg device {} was released", self.path),
        })?;

        let mut decoded = ffmpeg::frame::Video::empty();
        let mut rgb_frame = ffmpeg::frame::Video::empty();

        for (stream, packet) in state.input.packets() {
            if stream.index() != state.stream_index {
                continue;
            }
            state
                .decoder
                .send_packet(&packet)
                .map_err(|err| NodeError::Read {
                    reason: format!("send packet to decoder: {}", err),
                })?;

            while state.decoder.receive_frame(&mut decoded).is_ok() {
                state
                    .scaler
                    .run(&decoded, &mut rgb_frame)
                    .map_err(|err| NodeError::Read {
                        reason: format!("scale frame to RGB: {}", err),
                    })?;
                let pixels = frame_to_pixels(&rgb_frame)?;
                return Ok(CapturedFrame {
                    pixels,
                    width: rgb_frame.width(),
                    height: rgb_frame.height(),
                    channels: CHANNELS,
                });
            }
        }

        Err(NodeError::Read {
            reason: format!("end of stream on {}", self.path),
        })
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!("FfmpegDevice: released {}", self.path);
        }
    }

    fn is_open(&self) -> bool {
        self.state.is_some()
    }
}

fn build_scaler(
    decoder: &ffmpeg::codec::decoder::Video,
    width: u32,
    height: u32,
) -> Result<ffmpeg::software::scaling::Context, String> {
    ffmpeg::software::scaling::context::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        ffmpeg::util::format::pixel::Pixel::RGB24,
        width,
        height,
        ffmpeg::software::scaling::flag::Flags::BILINEAR,
    )
    .map_err(|err| format!("create scaler: {}", err))
}

/// Copy a decoded RGB24 frame into a tightly packed buffer, honoring the
/// row stride.
fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> NodeResult<Vec<u8>> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let row_bytes = width * CHANNELS as usize;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok(data.to_vec());
    }

    let mut pixels = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(data.get(start..end).ok_or_else(|| NodeError::Read {
            reason: "decoded frame row is out of bounds".to_string(),
        })?);
    }
    Ok(pixels)
}
