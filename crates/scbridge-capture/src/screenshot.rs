//! One-shot image capture.

use std::fmt;

use bytes::Bytes;

use crate::handle::{HandleId, OwnedHandle};

/// A captured still image. Owns its native image object.
pub struct CapturedImage {
    handle: OwnedHandle,
    width: u32,
    height: u32,
    data: Bytes,
}

impl CapturedImage {
    pub(crate) fn new(handle: OwnedHandle, width: u32, height: u32, data: Bytes) -> Self {
        Self {
            handle,
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Tightly packed RGBA pixels, row by row.
    pub fn rgba(&self) -> &[u8] {
        &self.data
    }

    /// Cheap clone of the pixel data. The bytes stay valid after the image
    /// is released.
    pub fn to_bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// RGBA value of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.data.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn handle_id(&self) -> HandleId {
        self.handle.id()
    }
}

impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}
