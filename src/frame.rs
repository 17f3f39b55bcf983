//! Frame records produced by acquisition.
//!
//! A [`FrameRecord`] is the output of one successful acquisition invoke. The
//! pixel buffer is exclusively owned by the caller after return; the node
//! keeps no reference to it.

use serde::Serialize;

/// Frame dimensions as a fixed (height, width, channels) triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FrameShape {
    pub height: u32,
    pub width: u32,
    pub channels: u32,
}

impl FrameShape {
    /// Expected buffer length in bytes for a tightly packed frame.
    pub fn byte_len(&self) -> usize {
        self.height as usize * self.width as usize * self.channels as usize
    }
}

/// One captured frame plus its acquisition metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRecord {
    /// Owned pixel buffer (packed rows, `shape.channels` bytes per pixel).
    pub pixels: Vec<u8>,
    /// Post-increment frame counter: unique and strictly increasing for the
    /// lifetime of one node instance, never reset on error.
    pub frame_id: u64,
    /// Capture time in seconds since the Unix epoch.
    pub timestamp_s: u64,
    pub shape: FrameShape,
}
