//! Capture session lifecycle and native handle management.
//!
//! This crate turns an asynchronous, callback driven, reference counted
//! native capture API into an ownership-explicit Rust API:
//!
//! - every native object is held by an [`OwnedHandle`] and released exactly
//!   once, when the handle is dropped;
//! - every asynchronous native call completes its continuation exactly once,
//!   on whatever thread the native layer uses;
//! - captured samples flow through a bounded per-stream queue to a
//!   dispatcher thread, so the native producer never blocks.
//!
//! The native engine is reached through [`NativeBackend`]. The [`sim`]
//! module provides an in-process backend for tests and tooling.

pub mod async_api;
pub mod bridge;
pub mod completion;
pub mod configuration;
pub mod content;
mod dispatch;
pub mod error;
pub mod filter;
pub mod handle;
pub mod native;
pub mod sample;
pub mod screenshot;
pub mod sim;
pub mod stream;

pub use bridge::CaptureBridge;
pub use completion::{Correlator, NativeCompletion, Operation, RequestId};
pub use configuration::StreamConfiguration;
pub use content::{Application, ContentSnapshot, Display, HandleArray, Window};
pub use error::{describe_error, CaptureError, NativeError};
pub use filter::{ContentFilter, FilterMode};
pub use handle::{HandleId, HandleKind, HandleRegistry, OwnedHandle};
pub use native::{NativeBackend, NativeSample, NativeToken, StreamSink};
pub use sample::{RetainedSample, SampleBuffer, SampleFormat, StreamOutput};
pub use screenshot::CapturedImage;
pub use stream::{OutputId, Stream, StreamId};

pub use scbridge_types::{
    BridgeSettings, ContentOptions, FrameStatus, MediaType, PixelFormat, Rect, StreamEvent,
    StreamState, StreamStats,
};

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;
