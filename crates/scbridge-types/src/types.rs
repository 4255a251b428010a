//! Common value types used across the capture boundary.

use serde::{Deserialize, Serialize};

/// Options for a shareable content request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentOptions {
    /// Leave desktop-level windows (wallpaper, desktop icons) out of the result.
    pub exclude_desktop_windows: bool,

    /// Only report windows that are currently on screen.
    pub on_screen_windows_only: bool,
}

impl ContentOptions {
    pub fn exclude_desktop_windows(mut self, exclude: bool) -> Self {
        self.exclude_desktop_windows = exclude;
        self
    }

    pub fn on_screen_windows_only(mut self, on_screen_only: bool) -> Self {
        self.on_screen_windows_only = on_screen_only;
        self
    }
}

/// Delivery counters for a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStats {
    /// Video frames handed to output handlers.
    pub video_delivered: u64,

    /// Audio buffers handed to output handlers.
    pub audio_delivered: u64,

    /// Samples released because the output queue was full.
    pub queue_drops: u64,

    /// Samples released because delivery was closed (not running, or stale run).
    pub discarded: u64,

    /// Native failure events observed.
    pub failures: u64,

    /// Number of successful starts.
    pub starts: u64,
}

impl StreamStats {
    /// Total samples delivered across media types.
    pub fn delivered(&self) -> u64 {
        self.video_delivered + self.audio_delivered
    }
}
