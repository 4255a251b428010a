//! Shared value types for the scbridge capture boundary.
//!
//! This crate defines the plain-data types that cross between the capture
//! core and its callers: geometry, media descriptors, the stream state
//! machine, lifecycle events and bridge settings.

mod events;
mod geometry;
mod media;
mod settings;
mod state;
mod types;

pub use events::StreamEvent;
pub use geometry::{Point, Rect, Size};
pub use media::{FrameStatus, MediaType, PixelFormat};
pub use settings::BridgeSettings;
pub use state::StreamState;
pub use types::{ContentOptions, StreamStats};

use crossbeam_channel::{Receiver, Sender};

/// Default channel capacity for stream lifecycle events.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Default channel capacity for samples queued between the native layer and
/// the dispatcher.
pub const OUTPUT_CHANNEL_CAPACITY: usize = 8;

/// Creates a bounded stream event channel.
pub fn event_channel(capacity: usize) -> (Sender<StreamEvent>, Receiver<StreamEvent>) {
    crossbeam_channel::bounded(capacity.max(1))
}
