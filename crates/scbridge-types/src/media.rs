//! Media descriptors: output kinds, pixel formats and frame status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of output a stream delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    /// Captured video frames.
    Video,

    /// Captured system audio.
    Audio,
}

impl MediaType {
    /// All media types, in delivery-slot order.
    pub const ALL: [MediaType; 2] = [MediaType::Video, MediaType::Audio];

    /// Slot index used for per-media counters.
    pub fn index(self) -> usize {
        match self {
            Self::Video => 0,
            Self::Audio => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pixel layout of captured video frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Packed little endian ARGB8888.
    #[default]
    Bgra,

    /// Packed little endian ARGB2101010 (10-bit color).
    L10r,

    /// Two-plane video range YCbCr 4:2:0.
    YCbCr420Video,

    /// Two-plane full range YCbCr 4:2:0.
    YCbCr420Full,
}

impl PixelFormat {
    /// The four character code the native layer uses for this format.
    pub fn four_char_code(self) -> u32 {
        let code = match self {
            Self::Bgra => *b"BGRA",
            Self::L10r => *b"l10r",
            Self::YCbCr420Video => *b"420v",
            Self::YCbCr420Full => *b"420f",
        };
        u32::from_be_bytes(code)
    }

    /// Map a four character code back to a pixel format.
    pub fn from_four_char_code(code: u32) -> Option<Self> {
        match &code.to_be_bytes() {
            b"BGRA" => Some(Self::Bgra),
            b"l10r" => Some(Self::L10r),
            b"420v" => Some(Self::YCbCr420Video),
            b"420f" => Some(Self::YCbCr420Full),
            _ => None,
        }
    }

    /// Bytes per row for a frame of the given width.
    pub fn bytes_per_row(self, width: u32) -> usize {
        match self {
            Self::Bgra | Self::L10r => width as usize * 4,
            // Luma plane only; chroma rows are half height.
            Self::YCbCr420Video | Self::YCbCr420Full => width as usize,
        }
    }

    /// Total buffer size for a frame of the given dimensions.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        let luma = self.bytes_per_row(width) * height as usize;
        match self {
            Self::Bgra | Self::L10r => luma,
            Self::YCbCr420Video | Self::YCbCr420Full => luma + luma / 2,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.four_char_code().to_be_bytes();
        f.write_str(&String::from_utf8_lossy(&bytes))
    }
}

/// Status the native layer attaches to each video frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameStatus {
    /// Frame contains new content.
    #[default]
    Complete,

    /// Nothing changed since the previous frame.
    Idle,

    /// Frame is blank.
    Blank,

    /// Capture is suspended.
    Suspended,

    /// First frame after the stream started.
    Started,

    /// Last frame before the stream stopped.
    Stopped,
}

impl FrameStatus {
    /// Map the native integer status.
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Complete),
            1 => Some(Self::Idle),
            2 => Some(Self::Blank),
            3 => Some(Self::Suspended),
            4 => Some(Self::Started),
            5 => Some(Self::Stopped),
            _ => None,
        }
    }

    /// Returns true if the frame carries image content.
    pub fn has_content(self) -> bool {
        matches!(self, Self::Complete | Self::Started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_four_char_code() {
        for format in [
            PixelFormat::Bgra,
            PixelFormat::L10r,
            PixelFormat::YCbCr420Video,
            PixelFormat::YCbCr420Full,
        ] {
            assert_eq!(
                PixelFormat::from_four_char_code(format.four_char_code()),
                Some(format)
            );
        }
        assert_eq!(PixelFormat::Bgra.to_string(), "BGRA");
        assert_eq!(PixelFormat::from_four_char_code(0), None);
    }

    #[test]
    fn test_pixel_format_frame_size() {
        assert_eq!(PixelFormat::Bgra.frame_size(4, 2), 32);
        assert_eq!(PixelFormat::YCbCr420Full.frame_size(4, 2), 12);
    }

    #[test]
    fn test_frame_status() {
        assert_eq!(FrameStatus::from_raw(4), Some(FrameStatus::Started));
        assert_eq!(FrameStatus::from_raw(9), None);
        assert!(FrameStatus::Complete.has_content());
        assert!(!FrameStatus::Idle.has_content());
    }
}
