//! Output dispatch.
//!
//! Native sample callbacks only enqueue into a bounded channel and never
//! block. A dispatcher thread per stream drains the channel and runs the
//! registered handlers in FIFO order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{select, Receiver, Sender, TrySendError};
use scbridge_types::MediaType;
use tracing::{debug, error, trace, warn};

use crate::error::NativeError;
use crate::native::{NativeSample, StreamSink};
use crate::stream::StreamShared;

/// A sample in flight between the native callback and the dispatcher.
pub(crate) struct Envelope {
    pub media: MediaType,
    pub sequence: u64,
    /// Run generation the sample was captured in.
    pub run: u64,
    pub sample: Box<dyn NativeSample>,
}

/// Receives native callbacks for one stream.
pub(crate) struct OutputSink {
    shared: Weak<StreamShared>,
    sender: Sender<Envelope>,
    sequence: [AtomicU64; 2],
}

impl OutputSink {
    pub fn new(shared: Weak<StreamShared>, sender: Sender<Envelope>) -> Self {
        Self {
            shared,
            sender,
            sequence: [AtomicU64::new(0), AtomicU64::new(0)],
        }
    }
}

impl StreamSink for OutputSink {
    fn did_output(&self, sample: Box<dyn NativeSample>, media: MediaType) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        if !shared.is_delivering() {
            shared.record_discard();
            return;
        }

        let envelope = Envelope {
            media,
            sequence: self.sequence[media.index()].fetch_add(1, Ordering::Relaxed),
            run: shared.run_generation(),
            sample,
        };

        match self.sender.try_send(envelope) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                shared.record_queue_drop();
                trace!(stream = %shared.id(), %media, "Output queue full, dropping sample");
            }
            Err(TrySendError::Disconnected(_)) => {
                shared.record_discard();
            }
        }
    }

    fn did_stop_with_error(&self, error: NativeError) {
        match self.shared.upgrade() {
            Some(shared) => shared.handle_native_failure(error),
            None => warn!(%error, "Native error for a released stream"),
        }
    }
}

/// The dispatcher thread of one stream.
pub(crate) struct Dispatcher {
    handle: Option<JoinHandle<()>>,
    control: Sender<()>,
    thread_id: Option<ThreadId>,
}

impl Dispatcher {
    /// Spawn the dispatcher thread.
    pub fn spawn(
        shared: Arc<StreamShared>,
        receiver: Receiver<Envelope>,
        name: String,
    ) -> std::io::Result<Self> {
        let (control, control_rx) = crossbeam_channel::bounded::<()>(1);

        let handle = thread::Builder::new().name(name).spawn(move || {
            debug!(stream = %shared.id(), "Dispatcher started");
            loop {
                select! {
                    recv(control_rx) -> _ => break,
                    recv(receiver) -> msg => match msg {
                        Ok(envelope) => shared.deliver(envelope),
                        Err(_) => break,
                    },
                }
            }
            debug!(stream = %shared.id(), "Dispatcher exited");
        })?;

        let thread_id = Some(handle.thread().id());

        Ok(Self {
            handle: Some(handle),
            control,
            thread_id,
        })
    }

    /// Whether the caller is running on this dispatcher's thread.
    pub fn is_current_thread(&self) -> bool {
        self.thread_id == Some(thread::current().id())
    }

    /// Stop the thread and wait for it, unless called from the thread itself.
    pub fn shutdown(&mut self) {
        let _ = self.control.try_send(());

        if let Some(handle) = self.handle.take() {
            if self.is_current_thread() {
                // The loop exits once the current handler returns.
                return;
            }
            if handle.join().is_err() {
                error!("Dispatcher thread panicked");
            }
        }
    }
}
