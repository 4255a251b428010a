//! Stream configuration.

use std::time::Duration;

use scbridge_types::PixelFormat;
use serde::{Deserialize, Serialize};

/// Default output width in pixels.
pub const DEFAULT_WIDTH: u32 = 1920;

/// Default output height in pixels.
pub const DEFAULT_HEIGHT: u32 = 1080;

/// Default audio sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Default number of audio channels.
pub const DEFAULT_CHANNEL_COUNT: u32 = 2;

/// Default number of frames the native layer may keep queued.
pub const DEFAULT_QUEUE_DEPTH: u32 = 3;

/// Default minimum interval between frames (60 fps).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_nanos(16_666_667);

/// Settings for a capture stream.
///
/// Setters never fail. Values are validated by the native layer when the
/// configuration is used to start or update a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfiguration {
    width: u32,
    height: u32,
    captures_audio: bool,
    sample_rate: u32,
    channel_count: u32,
    pixel_format: PixelFormat,
    shows_cursor: bool,
    #[serde(with = "duration_nanos")]
    minimum_frame_interval: Duration,
    queue_depth: u32,
}

impl Default for StreamConfiguration {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            captures_audio: false,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channel_count: DEFAULT_CHANNEL_COUNT,
            pixel_format: PixelFormat::default(),
            shows_cursor: true,
            minimum_frame_interval: DEFAULT_FRAME_INTERVAL,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl StreamConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn captures_audio(&self) -> bool {
        self.captures_audio
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u32 {
        self.channel_count
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn shows_cursor(&self) -> bool {
        self.shows_cursor
    }

    pub fn minimum_frame_interval(&self) -> Duration {
        self.minimum_frame_interval
    }

    pub fn queue_depth(&self) -> u32 {
        self.queue_depth
    }

    /// Highest frame rate the interval allows, or `None` when unlimited.
    pub fn max_frame_rate(&self) -> Option<f64> {
        if self.minimum_frame_interval.is_zero() {
            None
        } else {
            Some(1.0 / self.minimum_frame_interval.as_secs_f64())
        }
    }

    pub fn set_width(&mut self, width: u32) -> &mut Self {
        self.width = width;
        self
    }

    pub fn set_height(&mut self, height: u32) -> &mut Self {
        self.height = height;
        self
    }

    pub fn set_captures_audio(&mut self, captures_audio: bool) -> &mut Self {
        self.captures_audio = captures_audio;
        self
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) -> &mut Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn set_channel_count(&mut self, channel_count: u32) -> &mut Self {
        self.channel_count = channel_count;
        self
    }

    pub fn set_pixel_format(&mut self, pixel_format: PixelFormat) -> &mut Self {
        self.pixel_format = pixel_format;
        self
    }

    pub fn set_shows_cursor(&mut self, shows_cursor: bool) -> &mut Self {
        self.shows_cursor = shows_cursor;
        self
    }

    pub fn set_minimum_frame_interval(&mut self, interval: Duration) -> &mut Self {
        self.minimum_frame_interval = interval;
        self
    }

    pub fn set_queue_depth(&mut self, queue_depth: u32) -> &mut Self {
        self.queue_depth = queue_depth;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = height;
        self
    }

    pub fn with_captures_audio(mut self, captures_audio: bool) -> Self {
        self.captures_audio = captures_audio;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_channel_count(mut self, channel_count: u32) -> Self {
        self.channel_count = channel_count;
        self
    }

    pub fn with_pixel_format(mut self, pixel_format: PixelFormat) -> Self {
        self.pixel_format = pixel_format;
        self
    }

    pub fn with_shows_cursor(mut self, shows_cursor: bool) -> Self {
        self.shows_cursor = shows_cursor;
        self
    }

    pub fn with_minimum_frame_interval(mut self, interval: Duration) -> Self {
        self.minimum_frame_interval = interval;
        self
    }

    /// Limit delivery to at most `fps` frames per second. Zero removes the
    /// limit.
    pub fn with_frame_rate(mut self, fps: u32) -> Self {
        self.minimum_frame_interval = if fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / fps
        };
        self
    }

    pub fn with_queue_depth(mut self, queue_depth: u32) -> Self {
        self.queue_depth = queue_depth;
        self
    }
}

mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_nanos() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_in_any_order() {
        let mut config = StreamConfiguration::new();
        config
            .set_queue_depth(5)
            .set_width(1280)
            .set_captures_audio(true)
            .set_height(720)
            .set_pixel_format(PixelFormat::YCbCr420Video);

        assert_eq!(config.width(), 1280);
        assert_eq!(config.height(), 720);
        assert!(config.captures_audio());
        assert_eq!(config.queue_depth(), 5);
        assert_eq!(config.pixel_format(), PixelFormat::YCbCr420Video);
    }

    #[test]
    fn test_frame_rate_and_interval() {
        let config = StreamConfiguration::new().with_frame_rate(30);
        let fps = config.max_frame_rate().unwrap();
        assert!((fps - 30.0).abs() < 0.01);

        let unlimited = StreamConfiguration::new().with_frame_rate(0);
        assert_eq!(unlimited.max_frame_rate(), None);
    }

    #[test]
    fn test_out_of_range_values_are_accepted() {
        let config = StreamConfiguration::new()
            .with_size(0, 0)
            .with_channel_count(9)
            .with_sample_rate(1);
        assert_eq!(config.width(), 0);
        assert_eq!(config.channel_count(), 9);
    }

    #[test]
    fn test_json_defaults() {
        let config: StreamConfiguration =
            serde_json::from_str(r#"{"width": 640, "minimum_frame_interval": 50000000}"#).unwrap();
        assert_eq!(config.width(), 640);
        assert_eq!(config.height(), DEFAULT_HEIGHT);
        assert_eq!(config.minimum_frame_interval(), Duration::from_millis(50));
    }
}
