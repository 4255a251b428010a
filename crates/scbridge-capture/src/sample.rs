//! Captured samples as seen by output handlers.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use scbridge_types::{FrameStatus, MediaType, PixelFormat};

use crate::native::NativeSample;

/// Layout of a captured sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    Video {
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        status: FrameStatus,
    },
    Audio {
        sample_rate: u32,
        channel_count: u32,
        frame_count: u32,
    },
}

impl SampleFormat {
    pub fn media_type(&self) -> MediaType {
        match self {
            Self::Video { .. } => MediaType::Video,
            Self::Audio { .. } => MediaType::Audio,
        }
    }

    /// Frame status for video samples.
    pub fn frame_status(&self) -> Option<FrameStatus> {
        match self {
            Self::Video { status, .. } => Some(*status),
            Self::Audio { .. } => None,
        }
    }
}

/// A captured sample, valid only for the duration of the output callback.
///
/// The borrow ends when the handler returns. Call [`SampleBuffer::retain`]
/// to keep the sample longer.
pub struct SampleBuffer<'a> {
    media_type: MediaType,
    sequence: u64,
    sample: &'a dyn NativeSample,
}

impl<'a> SampleBuffer<'a> {
    pub(crate) fn new(media_type: MediaType, sequence: u64, sample: &'a dyn NativeSample) -> Self {
        Self {
            media_type,
            sequence,
            sample,
        }
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Position of this sample among samples of the same media type.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn format(&self) -> SampleFormat {
        self.sample.format()
    }

    pub fn presentation_time(&self) -> Duration {
        self.sample.presentation_time()
    }

    /// Borrowed payload bytes.
    pub fn data(&self) -> &'a [u8] {
        self.sample.data()
    }

    /// Take an owned reference to the native sample.
    pub fn retain(&self) -> RetainedSample {
        RetainedSample {
            media_type: self.media_type,
            sequence: self.sequence,
            sample: self.sample.retain(),
        }
    }

    /// Copy the payload out of the sample.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.sample.data())
    }
}

impl fmt::Debug for SampleBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("media_type", &self.media_type)
            .field("sequence", &self.sequence)
            .field("format", &self.format())
            .field("len", &self.sample.data().len())
            .finish()
    }
}

/// A sample kept alive past its callback. Releases its native reference when
/// dropped.
pub struct RetainedSample {
    media_type: MediaType,
    sequence: u64,
    sample: Box<dyn NativeSample>,
}

impl RetainedSample {
    /// Borrow as a [`SampleBuffer`].
    pub fn as_buffer(&self) -> SampleBuffer<'_> {
        SampleBuffer::new(self.media_type, self.sequence, self.sample.as_ref())
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Debug for RetainedSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetainedSample")
            .field("media_type", &self.media_type)
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Handler for captured samples of one media type.
///
/// Runs on the stream's dispatcher thread. Samples of the same media type
/// arrive in capture order.
pub trait StreamOutput: Send + 'static {
    fn did_output(&mut self, sample: &SampleBuffer<'_>);
}

impl<F> StreamOutput for F
where
    F: FnMut(&SampleBuffer<'_>) + Send + 'static,
{
    fn did_output(&mut self, sample: &SampleBuffer<'_>) {
        self(sample)
    }
}
