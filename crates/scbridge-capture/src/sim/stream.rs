//! Simulated capture streams and their sample producers.

use std::sync::atomic::AtomicI64;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender};
use parking_lot::Mutex;
use scbridge_types::{FrameStatus, MediaType};
use tracing::{debug, error, trace};

use super::sample::{PayloadCache, SimSample};
use crate::configuration::StreamConfiguration;
use crate::filter::{ContentFilter, FilterMode};
use crate::native::{NativeToken, StreamSink};
use crate::sample::SampleFormat;

/// Interval between simulated audio buffers.
pub const AUDIO_BUFFER_INTERVAL: Duration = Duration::from_millis(10);

/// Shortest interval the producer honours when the frame rate is unlimited.
const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

const VIDEO_FILL: u8 = 0x80;

struct Producer {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

struct Attached {
    filter_token: NativeToken,
    filter: ContentFilter,
    configuration_token: NativeToken,
    configuration: StreamConfiguration,
}

pub(crate) struct SimStream {
    sink: Arc<dyn StreamSink>,
    attached: Mutex<Attached>,
    outputs: Mutex<[bool; 2]>,
    producer: Mutex<Option<Producer>>,
    live_samples: Arc<AtomicI64>,
}

impl SimStream {
    pub fn new(
        sink: Arc<dyn StreamSink>,
        filter_token: NativeToken,
        filter: ContentFilter,
        configuration_token: NativeToken,
        configuration: StreamConfiguration,
        live_samples: Arc<AtomicI64>,
    ) -> Self {
        Self {
            sink,
            attached: Mutex::new(Attached {
                filter_token,
                filter,
                configuration_token,
                configuration,
            }),
            outputs: Mutex::new([false; 2]),
            producer: Mutex::new(None),
            live_samples,
        }
    }

    pub fn sink(&self) -> &Arc<dyn StreamSink> {
        &self.sink
    }

    pub fn is_running(&self) -> bool {
        self.producer.lock().is_some()
    }

    pub fn configuration(&self) -> StreamConfiguration {
        self.attached.lock().configuration.clone()
    }

    pub fn set_output(&self, media: MediaType, enabled: bool) {
        self.outputs.lock()[media.index()] = enabled;
    }

    /// Swap in a new configuration; returns the token whose reference the
    /// stream no longer holds.
    pub fn replace_configuration(
        &self,
        token: NativeToken,
        configuration: StreamConfiguration,
    ) -> NativeToken {
        let mut attached = self.attached.lock();
        attached.configuration = configuration;
        std::mem::replace(&mut attached.configuration_token, token)
    }

    pub fn replace_filter(&self, token: NativeToken, filter: ContentFilter) -> NativeToken {
        let mut attached = self.attached.lock();
        attached.filter = filter;
        std::mem::replace(&mut attached.filter_token, token)
    }

    /// Filter and configuration tokens the stream holds references to.
    pub fn attached_tokens(&self) -> (NativeToken, NativeToken) {
        let attached = self.attached.lock();
        (attached.filter_token, attached.configuration_token)
    }

    pub fn start_producer(self: &Arc<Self>) {
        let mut producer = self.producer.lock();
        if producer.is_some() {
            return;
        }

        let (stop, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let stream = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("scbridge-sim-producer".to_string())
            .spawn(move || stream.produce(stop_rx));

        match spawned {
            Ok(handle) => *producer = Some(Producer { stop, handle }),
            Err(err) => error!(%err, "Failed to spawn simulated producer"),
        }
    }

    /// Stop producing. Once this returns no further samples are emitted,
    /// unless called from the producer thread itself.
    pub fn stop_producer(&self) {
        let producer = self.producer.lock().take();
        if let Some(producer) = producer {
            let _ = producer.stop.send(());
            if producer.handle.thread().id() != thread::current().id()
                && producer.handle.join().is_err()
            {
                error!("Simulated producer panicked");
            }
        }
    }

    fn produce(&self, stop: crossbeam_channel::Receiver<()>) {
        let epoch = Instant::now();
        let mut next_video = epoch;
        let mut next_audio = epoch;
        let mut video_payload = PayloadCache::default();
        let mut audio_payload = PayloadCache::default();
        let mut first_frame = true;

        debug!("Simulated producer started");

        loop {
            let deadline = next_video.min(next_audio);
            match stop.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }

            let now = Instant::now();
            let (configuration, blank) = {
                let attached = self.attached.lock();
                (attached.configuration.clone(), captures_nothing(&attached.filter))
            };
            let outputs = *self.outputs.lock();

            if now >= next_video {
                if outputs[MediaType::Video.index()] {
                    let (width, height) = (configuration.width(), configuration.height());
                    let pixel_format = configuration.pixel_format();
                    let status = if blank {
                        FrameStatus::Blank
                    } else if first_frame {
                        FrameStatus::Started
                    } else {
                        FrameStatus::Complete
                    };
                    first_frame = false;

                    let data = video_payload.get(pixel_format.frame_size(width, height), VIDEO_FILL);
                    let format = SampleFormat::Video {
                        width,
                        height,
                        pixel_format,
                        status,
                    };
                    self.emit(format, now - epoch, data, MediaType::Video);
                }
                let interval = configuration.minimum_frame_interval().max(MIN_FRAME_INTERVAL);
                next_video = (next_video + interval).max(now);
            }

            if now >= next_audio {
                if outputs[MediaType::Audio.index()] && configuration.captures_audio() {
                    let sample_rate = configuration.sample_rate();
                    let channel_count = configuration.channel_count();
                    let frame_count = sample_rate / 100;
                    // 32-bit float samples.
                    let len = frame_count as usize * channel_count as usize * 4;
                    let format = SampleFormat::Audio {
                        sample_rate,
                        channel_count,
                        frame_count,
                    };
                    self.emit(format, now - epoch, audio_payload.get(len, 0), MediaType::Audio);
                }
                next_audio = (next_audio + AUDIO_BUFFER_INTERVAL).max(now);
            }
        }

        debug!("Simulated producer stopped");
    }

    fn emit(&self, format: SampleFormat, pts: Duration, data: bytes::Bytes, media: MediaType) {
        trace!(%media, ?pts, "Simulated sample");
        let sample = SimSample::new(format, pts, data, Arc::clone(&self.live_samples));
        self.sink.did_output(Box::new(sample), media);
    }
}

/// A filter that includes no windows yields blank frames.
fn captures_nothing(filter: &ContentFilter) -> bool {
    match filter.mode() {
        FilterMode::DisplayIncludingWindows { included, .. } => included.is_empty(),
        FilterMode::DisplayIncludingApplications { applications, .. } => applications.is_empty(),
        _ => false,
    }
}
