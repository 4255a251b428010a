//! Samples produced by simulated streams.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::native::NativeSample;
use crate::sample::SampleFormat;

/// A simulated sample. Each box counts as one live native reference.
pub(crate) struct SimSample {
    format: SampleFormat,
    presentation_time: Duration,
    data: Bytes,
    live: Arc<AtomicI64>,
}

impl SimSample {
    pub fn new(
        format: SampleFormat,
        presentation_time: Duration,
        data: Bytes,
        live: Arc<AtomicI64>,
    ) -> Self {
        live.fetch_add(1, Ordering::Relaxed);
        Self {
            format,
            presentation_time,
            data,
            live,
        }
    }
}

impl NativeSample for SimSample {
    fn format(&self) -> SampleFormat {
        self.format
    }

    fn presentation_time(&self) -> Duration {
        self.presentation_time
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn retain(&self) -> Box<dyn NativeSample> {
        Box::new(SimSample::new(
            self.format,
            self.presentation_time,
            self.data.clone(),
            Arc::clone(&self.live),
        ))
    }
}

impl Drop for SimSample {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Payload cache so frames of the same size share one allocation.
#[derive(Default)]
pub(crate) struct PayloadCache {
    fill: u8,
    bytes: Bytes,
}

impl PayloadCache {
    pub fn get(&mut self, len: usize, fill: u8) -> Bytes {
        if self.bytes.len() != len || self.fill != fill {
            self.bytes = Bytes::from(vec![fill; len]);
            self.fill = fill;
        }
        self.bytes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scbridge_types::{FrameStatus, PixelFormat};

    #[test]
    fn test_retained_samples_count_as_live() {
        let live = Arc::new(AtomicI64::new(0));
        let format = SampleFormat::Video {
            width: 2,
            height: 2,
            pixel_format: PixelFormat::Bgra,
            status: FrameStatus::Complete,
        };
        let sample = SimSample::new(format, Duration::ZERO, Bytes::from_static(&[0; 16]), live.clone());
        let retained = sample.retain();
        assert_eq!(live.load(Ordering::Relaxed), 2);
        assert_eq!(retained.data().len(), 16);

        drop(sample);
        drop(retained);
        assert_eq!(live.load(Ordering::Relaxed), 0);
    }
}
