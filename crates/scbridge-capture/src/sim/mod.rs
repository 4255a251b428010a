//! An in-process native backend.
//!
//! The simulated backend behaves like a native capture engine: objects are
//! retain counted, completions fire on their own threads after a short
//! latency, and running streams produce video frames and audio buffers on a
//! producer thread. Faults can be injected to exercise error paths.

mod objects;
mod sample;
mod stream;
mod world;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use scbridge_types::{ContentOptions, MediaType};
use tracing::{debug, error, warn};

use self::objects::{ObjectTable, SimPayload};
use self::stream::SimStream;
use crate::completion::NativeCompletion;
use crate::configuration::StreamConfiguration;
use crate::error::NativeError;
use crate::filter::{ContentFilter, FilterMode};
use crate::native::{
    ApplicationRecord, ContentRecord, DisplayRecord, ImageRecord, NativeBackend, NativeToken,
    StreamSink, WindowRecord,
};

pub use self::stream::AUDIO_BUFFER_INTERVAL;
pub use self::world::{SimApplication, SimDisplay, SimWindow, SimWorld, DESKTOP_WINDOW_LAYER};

/// Error domain used for simulated stream errors.
pub const STREAM_ERROR_DOMAIN: &str = "com.apple.ScreenCaptureKit.SCStreamErrorDomain";

/// Stream error codes.
pub mod codes {
    pub const USER_DECLINED: i64 = -3801;
    pub const FAILED_TO_START: i64 = -3802;
    pub const ATTEMPT_TO_START_STREAM_STATE: i64 = -3807;
    pub const ATTEMPT_TO_STOP_STREAM_STATE: i64 = -3808;
    pub const ATTEMPT_TO_UPDATE_FILTER_STATE: i64 = -3809;
    pub const ATTEMPT_TO_CONFIG_STATE: i64 = -3810;
    pub const INTERNAL_ERROR: i64 = -3811;
    pub const INVALID_PARAMETER: i64 = -3812;
    pub const NO_CAPTURE_SOURCE: i64 = -3815;
    pub const SYSTEM_STOPPED_STREAM: i64 = -3821;
}

/// Largest accepted output dimension.
pub const MAX_DIMENSION: u32 = 16_384;

/// Accepted audio sample rates.
pub const SAMPLE_RATES: [u32; 4] = [8_000, 16_000, 24_000, 48_000];

/// Accepted queue depths.
pub const QUEUE_DEPTH_RANGE: std::ops::RangeInclusive<u32> = 1..=8;

/// Default completion latency.
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(2);

/// Build an error in the stream error domain.
pub fn stream_error(code: i64, message: impl Into<String>) -> NativeError {
    NativeError::new(STREAM_ERROR_DOMAIN, code, message)
}

#[derive(Default)]
struct Faults {
    next_start: Option<NativeError>,
    next_content_request: Option<NativeError>,
    abandon_next: bool,
}

struct SimInner {
    objects: ObjectTable,
    world: RwLock<SimWorld>,
    latency: Mutex<Duration>,
    faults: Mutex<Faults>,
    live_samples: Arc<AtomicI64>,
}

impl SimInner {
    fn release(&self, token: NativeToken) {
        // Tear down outside the table lock.
        if let Some(SimPayload::Stream(stream)) = self.objects.release(token) {
            stream.stop_producer();
            let (filter, configuration) = stream.attached_tokens();
            self.release(filter);
            self.release(configuration);
            debug!(%token, "Simulated stream destroyed");
        }
    }
}

/// A simulated native capture engine.
#[derive(Clone)]
pub struct SimulatedBackend {
    inner: Arc<SimInner>,
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBackend {
    /// A backend with the default world.
    pub fn new() -> Self {
        Self::with_world(SimWorld::default())
    }

    pub fn with_world(world: SimWorld) -> Self {
        Self {
            inner: Arc::new(SimInner {
                objects: ObjectTable::default(),
                world: RwLock::new(world),
                latency: Mutex::new(DEFAULT_LATENCY),
                faults: Mutex::new(Faults::default()),
                live_samples: Arc::new(AtomicI64::new(0)),
            }),
        }
    }

    /// Delay before completions fire.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.inner.latency.lock() = latency;
    }

    pub fn world(&self) -> SimWorld {
        self.inner.world.read().clone()
    }

    /// Replace the world. Later enumerations see the new content.
    pub fn set_world(&self, world: SimWorld) {
        *self.inner.world.write() = world;
    }

    /// Native objects that still hold at least one reference.
    pub fn live_objects(&self) -> usize {
        self.inner.objects.live_count()
    }

    /// Live objects grouped by kind.
    pub fn live_object_kinds(&self) -> Vec<(&'static str, usize)> {
        self.inner.objects.live_kinds()
    }

    /// Releases of objects that were already destroyed.
    pub fn over_releases(&self) -> u64 {
        self.inner.objects.over_releases()
    }

    /// Samples handed out and not yet released.
    pub fn live_samples(&self) -> i64 {
        self.inner.live_samples.load(Ordering::Relaxed)
    }

    /// Allocate a bare object owning one reference.
    pub fn allocate_test_object(&self) -> NativeToken {
        self.inner.objects.allocate(SimPayload::Opaque)
    }

    /// Make the next start fail with `error`.
    pub fn fail_next_start(&self, error: NativeError) {
        self.inner.faults.lock().next_start = Some(error);
    }

    /// Make the next shareable content request fail with `error`.
    pub fn fail_next_content_request(&self, error: NativeError) {
        self.inner.faults.lock().next_content_request = Some(error);
    }

    /// Drop the next completion without firing it.
    pub fn abandon_next_completion(&self) {
        self.inner.faults.lock().abandon_next = true;
    }

    /// Streams whose producer is running.
    pub fn running_streams(&self) -> Vec<NativeToken> {
        self.inner
            .objects
            .streams()
            .into_iter()
            .filter(|(_, stream)| stream.is_running())
            .map(|(token, _)| token)
            .collect()
    }

    /// Stop a running stream with an error, as the system would when the
    /// captured display disappears. Returns false if the stream is not
    /// running.
    pub fn fail_stream(&self, token: NativeToken, error: NativeError) -> bool {
        let Some(stream) = self.inner.objects.stream(token) else {
            return false;
        };
        if !stream.is_running() || !self.inner.objects.retain(token) {
            return false;
        }

        self.defer(move |inner| {
            stream.stop_producer();
            warn!(%token, %error, "Simulated stream failure");
            stream.sink().did_stop_with_error(error);
            inner.release(token);
        });
        true
    }

    /// Every live stream object, running or not.
    pub fn stream_tokens(&self) -> Vec<NativeToken> {
        self.inner
            .objects
            .streams()
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    /// Report an error on the calling thread without touching the producer,
    /// like a failure event racing a pending start.
    pub fn report_stream_error(&self, token: NativeToken, error: NativeError) -> bool {
        let Some(stream) = self.inner.objects.stream(token) else {
            return false;
        };
        warn!(%token, %error, "Simulated stream error event");
        stream.sink().did_stop_with_error(error);
        true
    }

    fn take_abandon(&self) -> bool {
        std::mem::take(&mut self.inner.faults.lock().abandon_next)
    }

    /// Run `f` on a native thread after the configured latency.
    fn defer<F>(&self, f: F)
    where
        F: FnOnce(&SimInner) + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let latency = *self.inner.latency.lock();
        let spawned = thread::Builder::new()
            .name("scbridge-sim-native".to_string())
            .spawn(move || {
                if !latency.is_zero() {
                    thread::sleep(latency);
                }
                f(&inner);
            });
        if let Err(err) = spawned {
            // The closure and any completion it owns are dropped here.
            error!(%err, "Failed to spawn simulated native thread");
        }
    }

    /// Deliver a completion later, or drop it if abandonment was requested.
    fn finish_later<T: Send + 'static>(
        &self,
        completion: NativeCompletion<T>,
        result: Result<T, NativeError>,
    ) {
        if self.take_abandon() {
            self.defer(move |_| drop(completion));
        } else {
            self.defer(move |_| completion.complete(result));
        }
    }

    fn validate_configuration(configuration: &StreamConfiguration) -> Result<(), NativeError> {
        let (width, height) = (configuration.width(), configuration.height());
        if !(1..=MAX_DIMENSION).contains(&width) || !(1..=MAX_DIMENSION).contains(&height) {
            return Err(stream_error(
                codes::INVALID_PARAMETER,
                format!("invalid output size {width}x{height}"),
            ));
        }
        if !QUEUE_DEPTH_RANGE.contains(&configuration.queue_depth()) {
            return Err(stream_error(
                codes::INVALID_PARAMETER,
                format!("invalid queue depth {}", configuration.queue_depth()),
            ));
        }
        if configuration.captures_audio() {
            if !SAMPLE_RATES.contains(&configuration.sample_rate()) {
                return Err(stream_error(
                    codes::INVALID_PARAMETER,
                    format!("unsupported sample rate {}", configuration.sample_rate()),
                ));
            }
            if !(1..=2).contains(&configuration.channel_count()) {
                return Err(stream_error(
                    codes::INVALID_PARAMETER,
                    format!("unsupported channel count {}", configuration.channel_count()),
                ));
            }
        }
        Ok(())
    }

    fn validate_filter(&self, filter: &ContentFilter) -> Result<(), NativeError> {
        let world = self.inner.world.read();
        let missing = match filter.mode() {
            FilterMode::DesktopIndependentWindow { window } => {
                world.window(window.window_id).is_none()
            }
            _ => filter
                .display_id()
                .map_or(true, |id| world.display(id).is_none()),
        };
        if missing {
            return Err(stream_error(
                codes::NO_CAPTURE_SOURCE,
                "the capture source is no longer available",
            ));
        }
        Ok(())
    }

    fn content_record(inner: &SimInner, options: ContentOptions) -> ContentRecord {
        let world = inner.world.read();
        let objects = &inner.objects;

        ContentRecord {
            token: objects.allocate(SimPayload::Snapshot),
            displays: world
                .displays
                .iter()
                .map(|d| DisplayRecord {
                    token: objects.allocate(SimPayload::Display),
                    display_id: d.display_id,
                    width: d.width,
                    height: d.height,
                    frame: d.frame,
                })
                .collect(),
            windows: world
                .visible_windows(options)
                .map(|w| WindowRecord {
                    token: objects.allocate(SimPayload::Window),
                    window_id: w.window_id,
                    title: w.title.clone(),
                    frame: w.frame,
                    on_screen: w.on_screen,
                    layer: w.layer,
                    active: w.active,
                    owner_pid: w.owner_pid,
                })
                .collect(),
            applications: world
                .applications
                .iter()
                .map(|a| ApplicationRecord {
                    token: objects.allocate(SimPayload::Application),
                    bundle_identifier: a.bundle_identifier.clone(),
                    application_name: a.application_name.clone(),
                    process_id: a.process_id,
                })
                .collect(),
        }
    }

    /// Look up a stream and hold a reference to it for an in-flight
    /// operation.
    fn stream_for_operation(&self, token: NativeToken) -> Result<Arc<SimStream>, NativeError> {
        match self.inner.objects.stream(token) {
            Some(stream) if self.inner.objects.retain(token) => Ok(stream),
            _ => Err(stream_error(
                codes::INVALID_PARAMETER,
                format!("unknown stream {token}"),
            )),
        }
    }
}

impl NativeBackend for SimulatedBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    fn shareable_content(
        &self,
        options: ContentOptions,
        completion: NativeCompletion<ContentRecord>,
    ) {
        if self.take_abandon() {
            self.defer(move |_| drop(completion));
            return;
        }

        let fault = self.inner.faults.lock().next_content_request.take();
        self.defer(move |inner| match fault {
            Some(error) => completion.fail(error),
            None => completion.succeed(Self::content_record(inner, options)),
        });
    }

    fn create_filter(&self, filter: &ContentFilter) -> Result<NativeToken, NativeError> {
        self.validate_filter(filter)?;
        Ok(self.inner.objects.allocate(SimPayload::Filter(filter.clone())))
    }

    fn create_configuration(
        &self,
        configuration: &StreamConfiguration,
    ) -> Result<NativeToken, NativeError> {
        Ok(self
            .inner
            .objects
            .allocate(SimPayload::Configuration(configuration.clone())))
    }

    fn create_stream(
        &self,
        filter: NativeToken,
        configuration: NativeToken,
        sink: Arc<dyn StreamSink>,
    ) -> Result<NativeToken, NativeError> {
        let objects = &self.inner.objects;
        let (Some(filter_value), Some(configuration_value)) =
            (objects.filter(filter), objects.configuration(configuration))
        else {
            return Err(stream_error(
                codes::INVALID_PARAMETER,
                "stream requires a filter and a configuration",
            ));
        };

        if !objects.retain(filter) {
            return Err(stream_error(codes::INTERNAL_ERROR, "filter vanished"));
        }
        if !objects.retain(configuration) {
            self.inner.release(filter);
            return Err(stream_error(codes::INTERNAL_ERROR, "configuration vanished"));
        }

        let stream = SimStream::new(
            sink,
            filter,
            filter_value,
            configuration,
            configuration_value,
            Arc::clone(&self.inner.live_samples),
        );
        Ok(objects.allocate(SimPayload::Stream(Arc::new(stream))))
    }

    fn add_stream_output(&self, stream: NativeToken, media: MediaType) -> Result<(), NativeError> {
        let stream = self
            .inner
            .objects
            .stream(stream)
            .ok_or_else(|| stream_error(codes::INVALID_PARAMETER, "unknown stream"))?;
        stream.set_output(media, true);
        Ok(())
    }

    fn remove_stream_output(
        &self,
        stream: NativeToken,
        media: MediaType,
    ) -> Result<(), NativeError> {
        let stream = self
            .inner
            .objects
            .stream(stream)
            .ok_or_else(|| stream_error(codes::INVALID_PARAMETER, "unknown stream"))?;
        stream.set_output(media, false);
        Ok(())
    }

    fn start_capture(&self, token: NativeToken, completion: NativeCompletion<()>) {
        let stream = match self.stream_for_operation(token) {
            Ok(stream) => stream,
            Err(error) => return self.finish_later(completion, Err(error)),
        };

        let outcome = if stream.is_running() {
            Err(stream_error(
                codes::ATTEMPT_TO_START_STREAM_STATE,
                "the stream is already running",
            ))
        } else if let Some(error) = self.inner.faults.lock().next_start.take() {
            Err(error)
        } else {
            Self::validate_configuration(&stream.configuration())
        };

        if self.take_abandon() {
            self.defer(move |inner| {
                drop(completion);
                inner.release(token);
            });
            return;
        }

        self.defer(move |inner| {
            if outcome.is_ok() {
                stream.start_producer();
            }
            // The operation's reference goes before the caller hears back.
            inner.release(token);
            completion.complete(outcome);
        });
    }

    fn stop_capture(&self, token: NativeToken, completion: NativeCompletion<()>) {
        let stream = match self.stream_for_operation(token) {
            Ok(stream) => stream,
            Err(error) => return self.finish_later(completion, Err(error)),
        };

        if !stream.is_running() {
            self.inner.release(token);
            return self.finish_later(
                completion,
                Err(stream_error(
                    codes::ATTEMPT_TO_STOP_STREAM_STATE,
                    "the stream is not running",
                )),
            );
        }

        self.defer(move |inner| {
            stream.stop_producer();
            inner.release(token);
            completion.succeed(());
        });
    }

    fn update_configuration(
        &self,
        token: NativeToken,
        configuration: NativeToken,
        completion: NativeCompletion<()>,
    ) {
        let stream = match self.stream_for_operation(token) {
            Ok(stream) => stream,
            Err(error) => return self.finish_later(completion, Err(error)),
        };

        let value = self.inner.objects.configuration(configuration);
        let checked = match &value {
            _ if !stream.is_running() => Err(stream_error(
                codes::ATTEMPT_TO_CONFIG_STATE,
                "the stream is not running",
            )),
            Some(value) => Self::validate_configuration(value),
            None => Err(stream_error(codes::INVALID_PARAMETER, "unknown configuration")),
        };

        let (Ok(()), Some(value)) = (checked.clone(), value) else {
            self.inner.release(token);
            return self.finish_later(completion, checked);
        };

        if !self.inner.objects.retain(configuration) {
            self.inner.release(token);
            return self.finish_later(
                completion,
                Err(stream_error(codes::INTERNAL_ERROR, "configuration vanished")),
            );
        }

        self.defer(move |inner| {
            let previous = stream.replace_configuration(configuration, value);
            inner.release(previous);
            inner.release(token);
            completion.succeed(());
        });
    }

    fn update_content_filter(
        &self,
        token: NativeToken,
        filter: NativeToken,
        completion: NativeCompletion<()>,
    ) {
        let stream = match self.stream_for_operation(token) {
            Ok(stream) => stream,
            Err(error) => return self.finish_later(completion, Err(error)),
        };

        let value = self.inner.objects.filter(filter);
        let value = match value {
            Some(value) if stream.is_running() && self.inner.objects.retain(filter) => value,
            Some(_) => {
                self.inner.release(token);
                return self.finish_later(
                    completion,
                    Err(stream_error(
                        codes::ATTEMPT_TO_UPDATE_FILTER_STATE,
                        "the stream is not running",
                    )),
                );
            }
            None => {
                self.inner.release(token);
                return self.finish_later(
                    completion,
                    Err(stream_error(codes::INVALID_PARAMETER, "unknown filter")),
                );
            }
        };

        self.defer(move |inner| {
            let previous = stream.replace_filter(filter, value);
            inner.release(previous);
            inner.release(token);
            completion.succeed(());
        });
    }

    fn capture_image(
        &self,
        filter: NativeToken,
        configuration: NativeToken,
        completion: NativeCompletion<ImageRecord>,
    ) {
        let objects = &self.inner.objects;
        let request = match (objects.filter(filter), objects.configuration(configuration)) {
            (Some(filter), Some(configuration)) => {
                Self::validate_configuration(&configuration).map(|()| (filter, configuration))
            }
            _ => Err(stream_error(
                codes::INVALID_PARAMETER,
                "image capture requires a filter and a configuration",
            )),
        };

        let (filter, configuration) = match request {
            Ok(request) => request,
            Err(error) => return self.finish_later(completion, Err(error)),
        };

        if self.take_abandon() {
            self.defer(move |_| drop(completion));
            return;
        }

        self.defer(move |inner| {
            let (width, height) = (configuration.width(), configuration.height());
            // Tint by source so images of different sources differ.
            let shade = filter.display_id().unwrap_or(0xFF) as u8;
            let pixel = [shade, 0x40, 0x80, 0xFF];
            let data: Vec<u8> = pixel
                .iter()
                .copied()
                .cycle()
                .take(width as usize * height as usize * 4)
                .collect();

            completion.succeed(ImageRecord {
                token: inner.objects.allocate(SimPayload::Image),
                width,
                height,
                data: Bytes::from(data),
            });
        });
    }

    fn release(&self, token: NativeToken) {
        self.inner.release(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{channel, Correlator, Operation};

    #[test]
    fn test_content_request_allocates_one_reference_per_element() {
        let sim = SimulatedBackend::new();
        let correlator = Correlator::new();
        let (callback, rx) = channel();
        sim.shareable_content(
            ContentOptions::default(),
            correlator.issue(Operation::ShareableContent, callback),
        );

        let record = rx.recv().unwrap().unwrap();
        let expected = 1 + record.displays.len() + record.windows.len() + record.applications.len();
        assert_eq!(sim.live_objects(), expected);

        sim.release(record.token);
        for display in &record.displays {
            sim.release(display.token);
        }
        for window in &record.windows {
            sim.release(window.token);
        }
        for app in &record.applications {
            sim.release(app.token);
        }
        assert_eq!(sim.live_objects(), 0);
        assert_eq!(sim.over_releases(), 0);
    }

    #[test]
    fn test_abandoned_completion_resolves() {
        let sim = SimulatedBackend::new();
        let correlator = Correlator::new();
        sim.abandon_next_completion();

        let (callback, rx) = channel();
        sim.shareable_content(
            ContentOptions::default(),
            correlator.issue(Operation::ShareableContent, callback),
        );

        assert!(matches!(
            rx.recv().unwrap(),
            Err(crate::CaptureError::Abandoned { .. })
        ));
        assert_eq!(correlator.abandoned_count(), 1);
    }

    #[test]
    fn test_configuration_validation() {
        let ok = StreamConfiguration::new();
        assert!(SimulatedBackend::validate_configuration(&ok).is_ok());

        let zero = StreamConfiguration::new().with_size(0, 720);
        let err = SimulatedBackend::validate_configuration(&zero).unwrap_err();
        assert_eq!(err.code(), codes::INVALID_PARAMETER);
        assert_eq!(err.domain(), Some(STREAM_ERROR_DOMAIN));

        let audio = StreamConfiguration::new()
            .with_captures_audio(true)
            .with_sample_rate(44_100);
        assert!(SimulatedBackend::validate_configuration(&audio).is_err());

        let silent = StreamConfiguration::new().with_sample_rate(44_100);
        assert!(SimulatedBackend::validate_configuration(&silent).is_ok());
    }
}
