//! The seam between the capture core and a native capture engine.
//!
//! A backend owns native objects and hands them out as [`NativeToken`]s. Every
//! token returned from a `create_*` call or inside a record carries exactly one
//! reference that the core later gives back through [`NativeBackend::release`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use scbridge_types::{ContentOptions, MediaType, Rect};

use crate::completion::NativeCompletion;
use crate::configuration::StreamConfiguration;
use crate::error::NativeError;
use crate::filter::ContentFilter;
use crate::sample::SampleFormat;

/// Opaque identity of a native object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeToken(u64);

impl NativeToken {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NativeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A display as reported by a content enumeration.
#[derive(Debug, Clone)]
pub struct DisplayRecord {
    pub token: NativeToken,
    pub display_id: u32,
    pub width: u32,
    pub height: u32,
    pub frame: Rect,
}

/// A window as reported by a content enumeration.
#[derive(Debug, Clone)]
pub struct WindowRecord {
    pub token: NativeToken,
    pub window_id: u32,
    pub title: Option<String>,
    pub frame: Rect,
    pub on_screen: bool,
    pub layer: i32,
    pub active: bool,
    pub owner_pid: Option<i32>,
}

/// A running application as reported by a content enumeration.
#[derive(Debug, Clone)]
pub struct ApplicationRecord {
    pub token: NativeToken,
    pub bundle_identifier: String,
    pub application_name: String,
    pub process_id: i32,
}

/// Result of a content enumeration. The snapshot token and every element
/// token each carry one reference.
#[derive(Debug, Clone)]
pub struct ContentRecord {
    pub token: NativeToken,
    pub displays: Vec<DisplayRecord>,
    pub windows: Vec<WindowRecord>,
    pub applications: Vec<ApplicationRecord>,
}

/// Result of a one-shot screenshot.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub token: NativeToken,
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA pixels.
    pub data: Bytes,
}

/// One captured sample owned by the native layer.
///
/// Holding the box keeps one native reference alive; dropping it releases
/// that reference.
pub trait NativeSample: Send + Sync {
    /// Layout of the sample payload.
    fn format(&self) -> SampleFormat;

    /// Presentation time relative to the start of the stream.
    fn presentation_time(&self) -> Duration;

    /// Raw payload bytes.
    fn data(&self) -> &[u8];

    /// Take an additional reference to the same native sample.
    fn retain(&self) -> Box<dyn NativeSample>;
}

/// Receiver for a stream's native callbacks.
///
/// Called on native threads. Implementations must not block.
pub trait StreamSink: Send + Sync {
    /// A sample of the given media type was produced.
    fn did_output(&self, sample: Box<dyn NativeSample>, media: MediaType);

    /// The stream stopped because of an error.
    fn did_stop_with_error(&self, error: NativeError);
}

/// A native capture engine.
///
/// Completions may be fired from any thread, but never synchronously from
/// inside the call that received them.
pub trait NativeBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Enumerate shareable displays, windows and applications.
    fn shareable_content(&self, options: ContentOptions, completion: NativeCompletion<ContentRecord>);

    /// Create a native filter object.
    fn create_filter(&self, filter: &ContentFilter) -> Result<NativeToken, NativeError>;

    /// Create a native configuration object.
    fn create_configuration(
        &self,
        configuration: &StreamConfiguration,
    ) -> Result<NativeToken, NativeError>;

    /// Create a stream from a filter and configuration. The backend keeps its
    /// own references to both and to the sink until the stream is released.
    fn create_stream(
        &self,
        filter: NativeToken,
        configuration: NativeToken,
        sink: Arc<dyn StreamSink>,
    ) -> Result<NativeToken, NativeError>;

    /// Subscribe the stream to a media type.
    fn add_stream_output(&self, stream: NativeToken, media: MediaType) -> Result<(), NativeError>;

    /// Unsubscribe the stream from a media type.
    fn remove_stream_output(&self, stream: NativeToken, media: MediaType)
        -> Result<(), NativeError>;

    fn start_capture(&self, stream: NativeToken, completion: NativeCompletion<()>);

    fn stop_capture(&self, stream: NativeToken, completion: NativeCompletion<()>);

    fn update_configuration(
        &self,
        stream: NativeToken,
        configuration: NativeToken,
        completion: NativeCompletion<()>,
    );

    fn update_content_filter(
        &self,
        stream: NativeToken,
        filter: NativeToken,
        completion: NativeCompletion<()>,
    );

    /// Capture a single image of the filtered content.
    fn capture_image(
        &self,
        filter: NativeToken,
        configuration: NativeToken,
        completion: NativeCompletion<ImageRecord>,
    );

    /// Give back one reference to a native object.
    fn release(&self, token: NativeToken);
}
