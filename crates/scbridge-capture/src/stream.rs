//! Capture stream session.
//!
//! A [`Stream`] owns the native stream object together with the filter and
//! configuration it was created from. It drives the lifecycle state machine
//! and routes samples from the native layer to the registered outputs.
//!
//! Delivery guarantees:
//! - No output handler runs before the start completion has fired with
//!   success, and none runs after the stop completion has fired. A handler
//!   already running when stop is requested finishes first; the stop
//!   completion waits for it.
//! - Samples of one media type are delivered in capture order. Video and
//!   audio may interleave.
//! - After a configuration or filter update, a few frames produced with the
//!   previous settings may still be delivered.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use scbridge_types::{BridgeSettings, MediaType, StreamEvent, StreamState, StreamStats};
use tracing::{debug, error, info, instrument, warn};

use crate::completion::{Callback, Correlator, Operation};
use crate::configuration::StreamConfiguration;
use crate::dispatch::{Dispatcher, Envelope, OutputSink};
use crate::error::{CaptureError, NativeError};
use crate::filter::ContentFilter;
use crate::handle::{HandleKind, HandleRegistry, OwnedHandle};
use crate::native::{NativeBackend, NativeToken};
use crate::sample::{SampleBuffer, StreamOutput};
use crate::CaptureResult;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique stream identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

impl StreamId {
    fn next() -> Self {
        Self(NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// Identity of a registered output handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(u64);

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output-{}", self.0)
    }
}

/// Handler invoked once per native failure event.
pub type ErrorHandler = Box<dyn Fn(NativeError) + Send + Sync + 'static>;

type SharedOutput = Arc<Mutex<Box<dyn StreamOutput>>>;

struct OutputSlot {
    id: OutputId,
    media: MediaType,
    handler: SharedOutput,
}

#[derive(Default)]
struct Counters {
    delivered: [AtomicU64; 2],
    queue_drops: AtomicU64,
    discarded: AtomicU64,
    failures: AtomicU64,
    starts: AtomicU64,
}

/// State shared between the stream, its dispatcher and native callbacks.
pub(crate) struct StreamShared {
    id: StreamId,
    state: Mutex<StreamState>,
    /// Open while samples may reach handlers. Held for reading during each
    /// delivery, so closing it waits for the delivery in flight.
    gate: RwLock<bool>,
    /// Mirror of `gate` for native callbacks, which must not wait on it.
    delivering: AtomicBool,
    shutdown: AtomicBool,
    run: AtomicU64,
    pending_stop: Mutex<Option<Callback<()>>>,
    outputs: RwLock<Vec<OutputSlot>>,
    next_output: AtomicU64,
    configuration: Mutex<StreamConfiguration>,
    filter: Mutex<ContentFilter>,
    configuration_handle: Mutex<Option<OwnedHandle>>,
    filter_handle: Mutex<Option<OwnedHandle>>,
    error_handler: Option<ErrorHandler>,
    events: Sender<StreamEvent>,
    counters: Counters,
}

impl StreamShared {
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Lock free; safe to call from the native producer thread.
    pub fn is_delivering(&self) -> bool {
        self.delivering.load(Ordering::Acquire) && !self.shutdown.load(Ordering::Acquire)
    }

    pub fn run_generation(&self) -> u64 {
        self.run.load(Ordering::Acquire)
    }

    pub fn record_queue_drop(&self) {
        self.counters.queue_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discard(&self) {
        self.counters.discarded.fetch_add(1, Ordering::Relaxed);
    }

    fn emit(&self, event: StreamEvent) {
        // Events are advisory; a slow reader loses the newest ones.
        let _ = self.events.try_send(event);
    }

    /// Move to `next` and publish the change.
    fn transition(&self, state: &mut StreamState, next: StreamState) {
        if *state == next {
            return;
        }
        let previous = std::mem::replace(state, next.clone());
        info!(
            stream = %self.id,
            from = previous.name(),
            to = next.name(),
            "Stream state changed"
        );
        self.emit(StreamEvent::StateChanged {
            previous: Box::new(previous),
            current: Box::new(next),
        });
    }

    /// Update the gate while holding it for writing.
    fn set_gate(&self, gate: &mut bool, open: bool) {
        *gate = open;
        self.delivering.store(open, Ordering::Release);
    }

    fn close_gate(&self) {
        // Stop native callbacks from queueing before waiting on the gate.
        self.delivering.store(false, Ordering::Release);
        let mut gate = self.gate.write();
        self.set_gate(&mut gate, false);
    }

    /// Open delivery for the current run if the stream is still running.
    fn open_gate(&self, run: u64) {
        let mut gate = self.gate.write();
        if self.state.lock().is_running() && self.run_generation() == run {
            self.set_gate(&mut gate, true);
        }
    }

    /// Run the handlers registered for the envelope's media type.
    pub fn deliver(&self, envelope: Envelope) {
        let gate = self.gate.read();
        let current = *gate
            && !self.shutdown.load(Ordering::Acquire)
            && envelope.run == self.run_generation()
            && self.state.lock().is_running();

        if !current {
            self.record_discard();
            return;
        }

        let handlers: Vec<SharedOutput> = self
            .outputs
            .read()
            .iter()
            .filter(|slot| slot.media == envelope.media)
            .map(|slot| Arc::clone(&slot.handler))
            .collect();

        if handlers.is_empty() {
            self.record_discard();
            return;
        }

        let buffer = SampleBuffer::new(envelope.media, envelope.sequence, envelope.sample.as_ref());
        for handler in &handlers {
            handler.lock().did_output(&buffer);
        }

        self.counters.delivered[envelope.media.index()].fetch_add(1, Ordering::Relaxed);
        drop(gate);
    }

    /// A native failure event. The error handler runs once per event.
    pub fn handle_native_failure(&self, error: NativeError) {
        self.counters.failures.fetch_add(1, Ordering::Relaxed);
        let message = error.describe();
        error!(stream = %self.id, %message, "Stream stopped with error");

        let pending_stop = {
            self.delivering.store(false, Ordering::Release);
            let mut gate = self.gate.write();
            let mut state = self.state.lock();
            if state.is_active() {
                self.set_gate(&mut gate, false);
                self.transition(
                    &mut state,
                    StreamState::Failed {
                        message: message.clone(),
                    },
                );
            }
            self.pending_stop.lock().take()
        };

        self.emit(StreamEvent::Error { message });

        // A stop deferred behind a start that will no longer succeed.
        if let Some(stop) = pending_stop {
            stop(Ok(()));
        }

        if let Some(handler) = &self.error_handler {
            handler(error);
        }
    }

    fn stats(&self) -> StreamStats {
        let c = &self.counters;
        StreamStats {
            video_delivered: c.delivered[MediaType::Video.index()].load(Ordering::Relaxed),
            audio_delivered: c.delivered[MediaType::Audio.index()].load(Ordering::Relaxed),
            queue_drops: c.queue_drops.load(Ordering::Relaxed),
            discarded: c.discarded.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            starts: c.starts.load(Ordering::Relaxed),
        }
    }
}

/// What a completion needs to reach back into its stream.
#[derive(Clone)]
struct StreamContext {
    shared: Weak<StreamShared>,
    backend: Arc<dyn NativeBackend>,
    correlator: Correlator,
    token: NativeToken,
}

impl StreamContext {
    fn issue_stop(&self, completion: Callback<()>) {
        let shared = self.shared.clone();
        let native = self.correlator.issue(Operation::StopCapture, move |result| {
            on_stop_complete(&shared, result, completion)
        });
        self.backend.stop_capture(self.token, native);
    }
}

fn on_start_complete(ctx: &StreamContext, result: CaptureResult<()>, completion: Callback<()>) {
    let Some(shared) = ctx.shared.upgrade() else {
        completion(result);
        return;
    };

    match result {
        Ok(()) => {
            let mut state = shared.state.lock();
            let deferred_stop = shared.pending_stop.lock().take();

            if let Some(stop) = deferred_stop {
                drop(state);
                debug!(stream = %shared.id, "Start completed with a stop pending");
                completion(Err(CaptureError::Cancelled {
                    operation: Operation::StartCapture,
                }));
                ctx.issue_stop(stop);
            } else if state.is_starting() {
                let run = shared.run.fetch_add(1, Ordering::AcqRel) + 1;
                shared.counters.starts.fetch_add(1, Ordering::Relaxed);
                shared.transition(&mut state, StreamState::Running);
                drop(state);
                completion(Ok(()));
                shared.open_gate(run);
            } else {
                // A failure event arrived before the start completion. The
                // native side is capturing anyway, so stop it again.
                let state_name = state.name();
                drop(state);
                completion(Err(CaptureError::InvalidState {
                    operation: "start capture",
                    state: state_name,
                }));
                let id = shared.id;
                ctx.issue_stop(Box::new(move |result| {
                    if let Err(err) = result {
                        warn!(stream = %id, error = %err, "Stop after failed start failed");
                    }
                }));
            }
        }
        Err(err) => {
            warn!(stream = %shared.id, error = %err, "Start capture failed");
            let deferred_stop = {
                let mut state = shared.state.lock();
                let deferred_stop = shared.pending_stop.lock().take();
                let next = if deferred_stop.is_some() {
                    StreamState::Stopped
                } else {
                    StreamState::Failed {
                        message: err.to_string(),
                    }
                };
                shared.transition(&mut state, next);
                deferred_stop
            };
            shared.emit(StreamEvent::Error {
                message: err.to_string(),
            });
            completion(Err(err));
            if let Some(stop) = deferred_stop {
                stop(Ok(()));
            }
        }
    }
}

fn on_stop_complete(shared: &Weak<StreamShared>, result: CaptureResult<()>, completion: Callback<()>) {
    if let Some(shared) = shared.upgrade() {
        shared.delivering.store(false, Ordering::Release);
        let mut gate = shared.gate.write();
        shared.set_gate(&mut gate, false);
        let mut state = shared.state.lock();
        if state.is_stopping() {
            let next = match &result {
                Ok(()) => StreamState::Stopped,
                Err(err) => StreamState::Failed {
                    message: err.to_string(),
                },
            };
            shared.transition(&mut state, next);
        }
    }
    completion(result);
}

/// A capture session.
pub struct Stream {
    shared: Arc<StreamShared>,
    ctx: StreamContext,
    registry: Arc<HandleRegistry>,
    handle: Option<OwnedHandle>,
    dispatcher: Dispatcher,
    queue: Receiver<Envelope>,
    events: Receiver<StreamEvent>,
}

impl Stream {
    /// Create the native stream. Filter and configuration handles are adopted
    /// by the stream.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create(
        backend: Arc<dyn NativeBackend>,
        registry: Arc<HandleRegistry>,
        correlator: Correlator,
        settings: &BridgeSettings,
        filter: ContentFilter,
        filter_handle: OwnedHandle,
        configuration: StreamConfiguration,
        configuration_handle: OwnedHandle,
        error_handler: Option<ErrorHandler>,
    ) -> CaptureResult<Self> {
        let id = StreamId::next();
        let (event_tx, event_rx) = scbridge_types::event_channel(settings.event_queue_capacity);
        let (queue_tx, queue_rx) =
            crossbeam_channel::bounded(settings.output_queue_capacity.max(1));

        let filter_token = filter_handle.token();
        let configuration_token = configuration_handle.token();

        let shared = Arc::new(StreamShared {
            id,
            state: Mutex::new(StreamState::Idle),
            gate: RwLock::new(false),
            delivering: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            run: AtomicU64::new(0),
            pending_stop: Mutex::new(None),
            outputs: RwLock::new(Vec::new()),
            next_output: AtomicU64::new(1),
            configuration: Mutex::new(configuration),
            filter: Mutex::new(filter),
            configuration_handle: Mutex::new(Some(configuration_handle)),
            filter_handle: Mutex::new(Some(filter_handle)),
            error_handler,
            events: event_tx,
            counters: Counters::default(),
        });

        let sink = Arc::new(OutputSink::new(Arc::downgrade(&shared), queue_tx));
        let token = backend.create_stream(filter_token, configuration_token, sink)?;
        let handle = registry.adopt(HandleKind::Stream, token);

        let name = format!("{}-{}", settings.dispatcher_thread_prefix, id.raw());
        let dispatcher = match Dispatcher::spawn(Arc::clone(&shared), queue_rx.clone(), name) {
            Ok(dispatcher) => dispatcher,
            Err(err) => {
                return Err(CaptureError::Native(NativeError::new(
                    "scbridge",
                    -1,
                    format!("failed to spawn dispatcher thread: {err}"),
                )))
            }
        };

        info!(stream = %id, %token, "Stream created");

        Ok(Self {
            ctx: StreamContext {
                shared: Arc::downgrade(&shared),
                backend,
                correlator,
                token,
            },
            shared,
            registry,
            handle: Some(handle),
            dispatcher,
            queue: queue_rx,
            events: event_rx,
        })
    }

    pub fn id(&self) -> StreamId {
        self.shared.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.shared.state.lock().clone()
    }

    /// The configuration currently in effect.
    pub fn configuration(&self) -> StreamConfiguration {
        self.shared.configuration.lock().clone()
    }

    /// The filter currently in effect.
    pub fn filter(&self) -> ContentFilter {
        self.shared.filter.lock().clone()
    }

    pub fn stats(&self) -> StreamStats {
        self.shared.stats()
    }

    /// Lifecycle events. The channel is bounded; events are dropped when
    /// nobody reads them.
    pub fn events(&self) -> Receiver<StreamEvent> {
        self.events.clone()
    }

    /// Number of registered output handlers.
    pub fn output_count(&self) -> usize {
        self.shared.outputs.read().len()
    }

    /// Register a handler for one media type.
    ///
    /// Only allowed while the stream is not active.
    #[instrument(skip(self, handler), fields(stream = %self.shared.id))]
    pub fn add_output<O: StreamOutput>(&self, media: MediaType, handler: O) -> CaptureResult<OutputId> {
        let state = self.shared.state.lock();
        if !state.accepts_outputs() {
            return Err(CaptureError::OutputWhileActive {
                state: state.name(),
            });
        }

        let mut outputs = self.shared.outputs.write();
        if !outputs.iter().any(|slot| slot.media == media) {
            self.ctx.backend.add_stream_output(self.ctx.token, media)?;
        }

        let id = OutputId(self.shared.next_output.fetch_add(1, Ordering::Relaxed));
        outputs.push(OutputSlot {
            id,
            media,
            handler: Arc::new(Mutex::new(Box::new(handler))),
        });
        drop(state);

        debug!(output = %id, %media, "Output added");
        Ok(id)
    }

    /// Unregister a handler. A delivery already in progress may still reach
    /// it once.
    #[instrument(skip(self), fields(stream = %self.shared.id))]
    pub fn remove_output(&self, id: OutputId) -> CaptureResult<()> {
        let mut outputs = self.shared.outputs.write();
        let index = outputs
            .iter()
            .position(|slot| slot.id == id)
            .ok_or(CaptureError::OutputNotFound(id))?;
        let slot = outputs.remove(index);

        if !outputs.iter().any(|other| other.media == slot.media) {
            self.ctx.backend.remove_stream_output(self.ctx.token, slot.media)?;
        }

        debug!(output = %id, media = %slot.media, "Output removed");
        Ok(())
    }

    /// Start capturing. The completion fires exactly once.
    #[instrument(skip(self, completion), fields(stream = %self.shared.id))]
    pub fn start_capture<F>(&self, completion: F)
    where
        F: FnOnce(CaptureResult<()>) + Send + 'static,
    {
        {
            let mut state = self.shared.state.lock();
            if !state.can_start() {
                let err = CaptureError::invalid_state("start capture", &state);
                drop(state);
                warn!(error = %err, "Start rejected");
                completion(Err(err));
                return;
            }
            self.shared.transition(&mut state, StreamState::Starting);
        }

        info!("Starting capture");

        let ctx = self.ctx.clone();
        let completion: Callback<()> = Box::new(completion);
        let native = self
            .ctx
            .correlator
            .issue(Operation::StartCapture, move |result| {
                on_start_complete(&ctx, result, completion)
            });
        self.ctx.backend.start_capture(self.ctx.token, native);
    }

    /// Stop capturing.
    ///
    /// When called while a start is pending, the stop is deferred until the
    /// start completes. The start then reports `Cancelled`.
    #[instrument(skip(self, completion), fields(stream = %self.shared.id))]
    pub fn stop_capture<F>(&self, completion: F)
    where
        F: FnOnce(CaptureResult<()>) + Send + 'static,
    {
        let completion: Callback<()> = Box::new(completion);
        let mut state = self.shared.state.lock();

        if state.is_running() {
            self.shared.transition(&mut state, StreamState::Stopping);
            drop(state);
            info!("Stopping capture");
            self.ctx.issue_stop(completion);
        } else if state.is_starting() {
            self.shared.transition(&mut state, StreamState::Stopping);
            *self.shared.pending_stop.lock() = Some(completion);
            drop(state);
            info!("Stop deferred until start completes");
        } else {
            let err = CaptureError::invalid_state("stop capture", &state);
            drop(state);
            warn!(error = %err, "Stop rejected");
            completion(Err(err));
        }
    }

    /// Replace the active configuration. Only valid while running.
    #[instrument(skip_all, fields(stream = %self.shared.id))]
    pub fn update_configuration<F>(&self, configuration: StreamConfiguration, completion: F)
    where
        F: FnOnce(CaptureResult<()>) + Send + 'static,
    {
        let handle = match self.prepare_update("update configuration", || {
            self.ctx.backend.create_configuration(&configuration)
        }) {
            Ok(token) => self.registry.adopt(HandleKind::Configuration, token),
            Err(err) => {
                completion(Err(err));
                return;
            }
        };

        let token = handle.token();
        let shared = self.ctx.shared.clone();
        let native = self
            .ctx
            .correlator
            .issue(Operation::UpdateConfiguration, move |result: CaptureResult<()>| {
                if let (Ok(()), Some(shared)) = (&result, shared.upgrade()) {
                    let (width, height) = (configuration.width(), configuration.height());
                    *shared.configuration.lock() = configuration;
                    let previous = shared.configuration_handle.lock().replace(handle);
                    drop(previous);
                    info!(stream = %shared.id, width, height, "Configuration updated");
                    shared.emit(StreamEvent::ConfigurationUpdated { width, height });
                }
                completion(result);
            });
        self.ctx.backend.update_configuration(self.ctx.token, token, native);
    }

    /// Replace the active content filter. Only valid while running.
    #[instrument(skip_all, fields(stream = %self.shared.id))]
    pub fn update_content_filter<F>(&self, filter: ContentFilter, completion: F)
    where
        F: FnOnce(CaptureResult<()>) + Send + 'static,
    {
        let handle = match self.prepare_update("update content filter", || {
            self.ctx.backend.create_filter(&filter)
        }) {
            Ok(token) => self.registry.adopt(HandleKind::Filter, token),
            Err(err) => {
                completion(Err(err));
                return;
            }
        };

        let token = handle.token();
        let shared = self.ctx.shared.clone();
        let native = self
            .ctx
            .correlator
            .issue(Operation::UpdateContentFilter, move |result: CaptureResult<()>| {
                if let (Ok(()), Some(shared)) = (&result, shared.upgrade()) {
                    *shared.filter.lock() = filter;
                    let previous = shared.filter_handle.lock().replace(handle);
                    drop(previous);
                    info!(stream = %shared.id, "Content filter updated");
                    shared.emit(StreamEvent::FilterUpdated);
                }
                completion(result);
            });
        self.ctx.backend.update_content_filter(self.ctx.token, token, native);
    }

    /// Check the state and create the replacement native object.
    fn prepare_update(
        &self,
        operation: &'static str,
        create: impl FnOnce() -> Result<NativeToken, NativeError>,
    ) -> CaptureResult<NativeToken> {
        {
            let state = self.shared.state.lock();
            if !state.can_update() {
                let err = CaptureError::invalid_state(operation, &state);
                warn!(error = %err, "Update rejected");
                return Err(err);
            }
        }
        Ok(create()?)
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .field("outputs", &self.output_count())
            .finish()
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        debug!(stream = %self.shared.id, "Dropping stream");

        {
            let mut state = self.shared.state.lock();
            if state.is_running() {
                self.shared.transition(&mut state, StreamState::Stopping);
                drop(state);
                let id = self.shared.id;
                self.ctx.issue_stop(Box::new(move |result| {
                    if let Err(err) = result {
                        warn!(stream = %id, error = %err, "Stop on drop failed");
                    }
                }));
            } else if state.is_starting() {
                // Releasing the native stream ends the pending capture.
                self.shared.transition(&mut state, StreamState::Stopping);
            }
        }

        self.shared.shutdown.store(true, Ordering::Release);
        if !self.dispatcher.is_current_thread() {
            self.shared.close_gate();
        }
        self.dispatcher.shutdown();

        // A stop deferred behind a start that can no longer complete here.
        let pending_stop = self.shared.pending_stop.lock().take();
        if let Some(stop) = pending_stop {
            stop(Ok(()));
        }

        let mut drained = 0u64;
        while self.queue.try_recv().is_ok() {
            drained += 1;
        }
        if drained > 0 {
            self.shared
                .counters
                .discarded
                .fetch_add(drained, Ordering::Relaxed);
        }

        drop(self.handle.take());
        drop(self.shared.filter_handle.lock().take());
        drop(self.shared.configuration_handle.lock().take());
        debug!(stream = %self.shared.id, "Stream released");
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::bridge::CaptureBridge;
    use crate::completion::channel;
    use crate::sim::SimulatedBackend;
    use scbridge_types::ContentOptions;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_delivery_check_does_not_wait_for_running_handler() {
        let bridge = CaptureBridge::new(Arc::new(SimulatedBackend::new()));
        let content = bridge
            .shareable_content_blocking(ContentOptions::default())
            .unwrap();
        let display = content.displays().get(0).unwrap();
        let filter = ContentFilter::excluding_windows(&display, &[]);
        let config = StreamConfiguration::new()
            .with_size(16, 16)
            .with_frame_rate(100);
        let stream = bridge.create_stream(&filter, &config).unwrap();

        let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
        let mut slept = false;
        stream
            .add_output(MediaType::Video, move |_: &SampleBuffer<'_>| {
                if !slept {
                    slept = true;
                    let _ = entered_tx.send(());
                    thread::sleep(Duration::from_millis(300));
                }
            })
            .unwrap();

        let (start_cb, start_rx) = channel::<()>();
        stream.start_capture(start_cb);
        start_rx.recv_timeout(TIMEOUT).unwrap().unwrap();
        entered_rx.recv_timeout(TIMEOUT).unwrap();

        // The stop completion now waits on the gate behind the handler.
        let (stop_cb, stop_rx) = channel::<()>();
        stream.stop_capture(stop_cb);
        thread::sleep(Duration::from_millis(50));

        let begin = Instant::now();
        assert!(!stream.shared.is_delivering());
        assert!(begin.elapsed() < Duration::from_millis(100));

        stop_rx.recv_timeout(TIMEOUT).unwrap().unwrap();
        assert!(stream.state().is_stopped());
    }
}
