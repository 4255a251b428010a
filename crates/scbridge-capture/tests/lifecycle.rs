//! End-to-end lifecycle tests against the simulated backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use scbridge_capture::completion::channel;
use scbridge_capture::sim::{codes, stream_error, SimWorld, SimulatedBackend};
use scbridge_capture::{
    BridgeSettings, CaptureBridge, CaptureError, ContentFilter, ContentOptions, MediaType,
    NativeError, Operation, RetainedSample, SampleFormat, Stream, StreamConfiguration,
    StreamEvent, StreamState,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn setup() -> (Arc<SimulatedBackend>, CaptureBridge) {
    let sim = Arc::new(SimulatedBackend::new());
    let bridge = CaptureBridge::new(sim.clone());
    (sim, bridge)
}

fn display_filter(bridge: &CaptureBridge) -> ContentFilter {
    let content = bridge
        .shareable_content_blocking(ContentOptions::default())
        .unwrap();
    let display = content.displays().get(0).unwrap();
    ContentFilter::excluding_windows(&display, &[])
}

fn fast_config() -> StreamConfiguration {
    StreamConfiguration::new()
        .with_size(64, 48)
        .with_frame_rate(200)
}

fn start(stream: &Stream) -> Result<(), CaptureError> {
    let (callback, rx) = channel();
    stream.start_capture(callback);
    rx.recv_timeout(TIMEOUT).unwrap()
}

fn stop(stream: &Stream) -> Result<(), CaptureError> {
    let (callback, rx) = channel();
    stream.stop_capture(callback);
    rx.recv_timeout(TIMEOUT).unwrap()
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn counting_output(stream: &Stream, media: MediaType) -> Arc<AtomicU64> {
    let count = Arc::new(AtomicU64::new(0));
    let handler_count = count.clone();
    stream
        .add_output(media, move |_: &scbridge_capture::SampleBuffer<'_>| {
            handler_count.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    count
}

#[test]
fn test_full_lifecycle_releases_everything() {
    let (sim, bridge) = setup();
    let filter = display_filter(&bridge);
    let stream = bridge.create_stream(&filter, &fast_config()).unwrap();
    let frames = counting_output(&stream, MediaType::Video);

    assert!(stream.state().is_idle());
    start(&stream).unwrap();
    assert!(stream.state().is_running());
    assert!(wait_until(|| frames.load(Ordering::SeqCst) >= 5));

    stop(&stream).unwrap();
    assert!(stream.state().is_stopped());

    drop(stream);
    drop(filter);
    assert_eq!(bridge.registry().live_count(), 0);
    assert_eq!(sim.live_objects(), 0, "leaked: {:?}", sim.live_object_kinds());
    assert_eq!(sim.over_releases(), 0);
    assert!(wait_until(|| sim.live_samples() == 0));
    assert_eq!(bridge.correlator().pending_count(), 0);
}

#[test]
fn test_no_output_after_stop_completion() {
    let (_sim, bridge) = setup();
    let stream = bridge
        .create_stream(&display_filter(&bridge), &fast_config())
        .unwrap();
    let frames = counting_output(&stream, MediaType::Video);

    start(&stream).unwrap();
    assert!(wait_until(|| frames.load(Ordering::SeqCst) >= 3));

    let at_stop = Arc::new(AtomicU64::new(u64::MAX));
    let (callback, rx) = channel::<()>();
    let observed = at_stop.clone();
    let frames_at_stop = frames.clone();
    stream.stop_capture(move |result| {
        observed.store(frames_at_stop.load(Ordering::SeqCst), Ordering::SeqCst);
        callback(result);
    });
    rx.recv_timeout(TIMEOUT).unwrap().unwrap();

    thread::sleep(Duration::from_millis(50));
    assert_eq!(frames.load(Ordering::SeqCst), at_stop.load(Ordering::SeqCst));
}

#[test]
fn test_no_output_before_start_completion() {
    let (sim, bridge) = setup();
    sim.set_latency(Duration::from_millis(30));
    let stream = bridge
        .create_stream(&display_filter(&bridge), &fast_config())
        .unwrap();

    let started = Arc::new(AtomicU64::new(0));
    let early = Arc::new(AtomicU64::new(0));
    {
        let started = started.clone();
        let early = early.clone();
        stream
            .add_output(MediaType::Video, move |_: &scbridge_capture::SampleBuffer<'_>| {
                if started.load(Ordering::SeqCst) == 0 {
                    early.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();
    }

    let (callback, rx) = channel::<()>();
    let flag = started.clone();
    stream.start_capture(move |result| {
        flag.store(1, Ordering::SeqCst);
        callback(result);
    });
    assert!(stream.state().is_starting());
    rx.recv_timeout(TIMEOUT).unwrap().unwrap();

    thread::sleep(Duration::from_millis(30));
    assert_eq!(early.load(Ordering::SeqCst), 0);
    assert!(stream.stats().video_delivered > 0);
}

#[test]
fn test_start_in_running_state_is_rejected() {
    let (_sim, bridge) = setup();
    let stream = bridge
        .create_stream(&display_filter(&bridge), &fast_config())
        .unwrap();
    start(&stream).unwrap();

    let calls = Arc::new(AtomicU64::new(0));
    let seen = calls.clone();
    let (callback, rx) = channel::<()>();
    stream.start_capture(move |result| {
        seen.fetch_add(1, Ordering::SeqCst);
        callback(result);
    });

    match rx.recv_timeout(TIMEOUT).unwrap() {
        Err(CaptureError::InvalidState { state, .. }) => assert_eq!(state, "Running"),
        other => panic!("unexpected result: {other:?}"),
    }
    thread::sleep(Duration::from_millis(20));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(stream.state().is_running());
}

#[test]
fn test_stop_in_idle_state_is_rejected() {
    let (_sim, bridge) = setup();
    let stream = bridge
        .create_stream(&display_filter(&bridge), &fast_config())
        .unwrap();

    assert!(matches!(
        stop(&stream),
        Err(CaptureError::InvalidState { state: "Idle", .. })
    ));
    assert!(stream.state().is_idle());
}

#[test]
fn test_stop_while_starting_cancels_start() {
    let (sim, bridge) = setup();
    sim.set_latency(Duration::from_millis(20));
    let stream = bridge
        .create_stream(&display_filter(&bridge), &fast_config())
        .unwrap();
    let frames = counting_output(&stream, MediaType::Video);

    let (start_cb, start_rx) = channel::<()>();
    let (stop_cb, stop_rx) = channel::<()>();
    stream.start_capture(start_cb);
    stream.stop_capture(stop_cb);
    assert!(stream.state().is_stopping());

    assert!(matches!(
        start_rx.recv_timeout(TIMEOUT).unwrap(),
        Err(CaptureError::Cancelled {
            operation: Operation::StartCapture
        })
    ));
    stop_rx.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert!(stream.state().is_stopped());

    thread::sleep(Duration::from_millis(30));
    assert_eq!(frames.load(Ordering::SeqCst), 0);
    assert!(sim.running_streams().is_empty());
}

#[test]
fn test_stop_while_starting_after_failed_start() {
    let (sim, bridge) = setup();
    sim.set_latency(Duration::from_millis(20));
    sim.fail_next_start(stream_error(codes::FAILED_TO_START, "no permission"));
    let stream = bridge
        .create_stream(&display_filter(&bridge), &fast_config())
        .unwrap();

    let (start_cb, start_rx) = channel::<()>();
    let (stop_cb, stop_rx) = channel::<()>();
    stream.start_capture(start_cb);
    stream.stop_capture(stop_cb);

    let err = start_rx.recv_timeout(TIMEOUT).unwrap().unwrap_err();
    assert_eq!(err.native_error().map(NativeError::code), Some(codes::FAILED_TO_START));
    stop_rx.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert!(stream.state().is_stopped());
}

#[test]
fn test_failed_start_then_restart() {
    let (sim, bridge) = setup();
    sim.fail_next_start(stream_error(codes::USER_DECLINED, "The user declined"));
    let stream = bridge
        .create_stream(&display_filter(&bridge), &fast_config())
        .unwrap();

    let err = start(&stream).unwrap_err();
    assert!(err.to_string().contains("The user declined"));
    match stream.state() {
        StreamState::Failed { message } => assert!(message.contains("-3801")),
        other => panic!("unexpected state: {other:?}"),
    }

    start(&stream).unwrap();
    assert!(stream.state().is_running());
    assert_eq!(stream.stats().starts, 1);
}

#[test]
fn test_invalid_configuration_fails_at_start() {
    let (_sim, bridge) = setup();
    let config = StreamConfiguration::new().with_size(0, 0);
    let stream = bridge
        .create_stream(&display_filter(&bridge), &config)
        .unwrap();

    let err = start(&stream).unwrap_err();
    assert_eq!(
        err.native_error().map(NativeError::code),
        Some(codes::INVALID_PARAMETER)
    );
    assert!(stream.state().is_failed());
}

#[test]
fn test_add_output_only_while_inactive() {
    let (_sim, bridge) = setup();
    let stream = bridge
        .create_stream(&display_filter(&bridge), &fast_config())
        .unwrap();
    let _frames = counting_output(&stream, MediaType::Video);
    start(&stream).unwrap();

    let err = stream
        .add_output(MediaType::Audio, |_: &scbridge_capture::SampleBuffer<'_>| {})
        .unwrap_err();
    assert!(matches!(err, CaptureError::OutputWhileActive { state: "Running" }));

    stop(&stream).unwrap();
    let id = stream
        .add_output(MediaType::Audio, |_: &scbridge_capture::SampleBuffer<'_>| {})
        .unwrap();
    assert_eq!(stream.output_count(), 2);
    stream.remove_output(id).unwrap();
    assert!(matches!(
        stream.remove_output(id),
        Err(CaptureError::OutputNotFound(_))
    ));
}

#[test]
fn test_update_configuration_requires_running() {
    let (_sim, bridge) = setup();
    let stream = bridge
        .create_stream(&display_filter(&bridge), &fast_config())
        .unwrap();

    let (callback, rx) = channel::<()>();
    stream.update_configuration(fast_config().with_size(128, 96), callback);
    assert!(matches!(
        rx.recv_timeout(TIMEOUT).unwrap(),
        Err(CaptureError::InvalidState { state: "Idle", .. })
    ));
    assert_eq!(stream.configuration().width(), 64);
}

#[test]
fn test_update_configuration_replaces_geometry() {
    let (sim, bridge) = setup();
    let stream = bridge
        .create_stream(&display_filter(&bridge), &fast_config())
        .unwrap();
    let events = stream.events();

    let widths = Arc::new(Mutex::new(Vec::new()));
    let seen = widths.clone();
    stream
        .add_output(MediaType::Video, move |sample: &scbridge_capture::SampleBuffer<'_>| {
            if let SampleFormat::Video { width, .. } = sample.format() {
                seen.lock().push(width);
            }
        })
        .unwrap();

    start(&stream).unwrap();
    let (callback, rx) = channel::<()>();
    stream.update_configuration(fast_config().with_size(128, 96), callback);
    rx.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!(stream.configuration().width(), 128);

    assert!(wait_until(|| widths.lock().last() == Some(&128)));
    assert!(events
        .try_iter()
        .any(|e| e == StreamEvent::ConfigurationUpdated { width: 128, height: 96 }));

    stop(&stream).unwrap();
    drop(stream);
    assert_eq!(sim.live_objects(), 0, "leaked: {:?}", sim.live_object_kinds());
}

#[test]
fn test_update_content_filter() {
    let (sim, bridge) = setup();
    let content = bridge
        .shareable_content_blocking(ContentOptions::default())
        .unwrap();
    let first = content.displays().get(0).unwrap();
    let second = content.displays().get(1).unwrap();

    let stream = bridge
        .create_stream(&ContentFilter::excluding_windows(&first, &[]), &fast_config())
        .unwrap();
    start(&stream).unwrap();

    let (callback, rx) = channel::<()>();
    stream.update_content_filter(ContentFilter::excluding_windows(&second, &[]), callback);
    rx.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!(stream.filter().display_id(), Some(second.display_id()));

    // The stop issued on drop holds the native stream until it completes.
    drop(stream);
    drop((first, second, content));
    assert!(
        wait_until(|| sim.live_objects() == 0),
        "leaked: {:?}",
        sim.live_object_kinds()
    );
    assert_eq!(sim.over_releases(), 0);
}

#[test]
fn test_native_failure_reaches_error_handler_once() {
    let (sim, bridge) = setup();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let seen = errors.clone();
    let stream = bridge
        .create_stream_with_error_handler(&display_filter(&bridge), &fast_config(), move |err| {
            seen.lock().push(err)
        })
        .unwrap();
    let frames = counting_output(&stream, MediaType::Video);
    start(&stream).unwrap();
    assert!(wait_until(|| frames.load(Ordering::SeqCst) > 0));

    let running = sim.running_streams();
    assert_eq!(running.len(), 1);
    assert!(sim.fail_stream(
        running[0],
        stream_error(codes::SYSTEM_STOPPED_STREAM, "display disconnected")
    ));

    assert!(wait_until(|| stream.state().is_failed()));
    assert!(wait_until(|| errors.lock().len() == 1));
    let after_failure = frames.load(Ordering::SeqCst);

    thread::sleep(Duration::from_millis(30));
    assert_eq!(errors.lock().len(), 1);
    assert_eq!(errors.lock()[0].code(), codes::SYSTEM_STOPPED_STREAM);
    assert_eq!(frames.load(Ordering::SeqCst), after_failure);
    assert_eq!(stream.stats().failures, 1);

    // A failed stream can be started again.
    start(&stream).unwrap();
    assert!(stream.state().is_running());
}

#[test]
fn test_full_queue_drops_instead_of_blocking() {
    let sim = Arc::new(SimulatedBackend::new());
    let settings = BridgeSettings {
        output_queue_capacity: 1,
        ..BridgeSettings::default()
    };
    let bridge = CaptureBridge::with_settings(sim.clone(), settings);
    let stream = bridge
        .create_stream(
            &display_filter(&bridge),
            &StreamConfiguration::new().with_size(16, 16).with_frame_rate(0),
        )
        .unwrap();
    stream
        .add_output(MediaType::Video, |_: &scbridge_capture::SampleBuffer<'_>| {
            thread::sleep(Duration::from_millis(20));
        })
        .unwrap();

    start(&stream).unwrap();
    assert!(wait_until(|| stream.stats().queue_drops > 0));
    stop(&stream).unwrap();
    drop(stream);
    assert!(wait_until(|| sim.live_samples() == 0));
}

#[test]
fn test_samples_arrive_in_order_per_media_type() {
    let (_sim, bridge) = setup();
    let stream = bridge
        .create_stream(
            &display_filter(&bridge),
            &fast_config().with_captures_audio(true),
        )
        .unwrap();

    let video = Arc::new(Mutex::new(Vec::new()));
    let audio = Arc::new(Mutex::new(Vec::new()));
    for (media, log) in [(MediaType::Video, video.clone()), (MediaType::Audio, audio.clone())] {
        stream
            .add_output(media, move |sample: &scbridge_capture::SampleBuffer<'_>| {
                assert_eq!(sample.media_type(), media);
                log.lock().push(sample.sequence());
            })
            .unwrap();
    }

    start(&stream).unwrap();
    assert!(wait_until(|| video.lock().len() >= 10 && audio.lock().len() >= 5));
    stop(&stream).unwrap();

    for log in [video, audio] {
        let log = log.lock();
        assert!(log.windows(2).all(|pair| pair[0] < pair[1]));
    }
}

#[test]
fn test_retained_sample_outlives_callback() {
    let (sim, bridge) = setup();
    let stream = bridge
        .create_stream(&display_filter(&bridge), &fast_config())
        .unwrap();

    let kept: Arc<Mutex<Option<RetainedSample>>> = Arc::new(Mutex::new(None));
    let slot = kept.clone();
    stream
        .add_output(MediaType::Video, move |sample: &scbridge_capture::SampleBuffer<'_>| {
            let mut slot = slot.lock();
            if slot.is_none() {
                *slot = Some(sample.retain());
            }
        })
        .unwrap();

    start(&stream).unwrap();
    assert!(wait_until(|| kept.lock().is_some()));
    stop(&stream).unwrap();
    drop(stream);

    let retained = kept.lock().take().unwrap();
    let buffer = retained.as_buffer();
    assert_eq!(buffer.data().len(), 64 * 48 * 4);
    assert_eq!(buffer.to_bytes().len(), 64 * 48 * 4);
    assert_eq!(sim.live_samples(), 1);

    drop(retained);
    assert_eq!(sim.live_samples(), 0);
}

#[test]
fn test_dropping_running_stream_stops_capture() {
    let (sim, bridge) = setup();
    let stream = bridge
        .create_stream(&display_filter(&bridge), &fast_config())
        .unwrap();
    let _frames = counting_output(&stream, MediaType::Video);
    start(&stream).unwrap();
    assert_eq!(sim.running_streams().len(), 1);

    drop(stream);
    assert!(wait_until(|| sim.running_streams().is_empty()));
    assert!(wait_until(|| sim.live_objects() == 0));
    assert_eq!(sim.over_releases(), 0);
}

#[test]
fn test_abandoned_start_reports_abandoned() {
    let (sim, bridge) = setup();
    let stream = bridge
        .create_stream(&display_filter(&bridge), &fast_config())
        .unwrap();
    sim.abandon_next_completion();

    assert!(matches!(
        start(&stream),
        Err(CaptureError::Abandoned {
            operation: Operation::StartCapture
        })
    ));
    assert!(stream.state().is_failed());
    assert_eq!(bridge.correlator().abandoned_count(), 1);
}

#[test]
fn test_content_request_failure() {
    let (sim, bridge) = setup();
    sim.fail_next_content_request(stream_error(codes::USER_DECLINED, "The user declined"));

    let err = bridge
        .shareable_content_blocking(ContentOptions::default())
        .unwrap_err();
    assert_eq!(err.native_error().map(NativeError::code), Some(codes::USER_DECLINED));
    assert_eq!(sim.live_objects(), 0);

    assert!(bridge
        .shareable_content_blocking(ContentOptions::default())
        .is_ok());
}

#[test]
fn test_create_stream_rejects_vanished_source() {
    let (sim, bridge) = setup();
    let filter = display_filter(&bridge);
    sim.set_world(SimWorld::empty());

    let err = bridge.create_stream(&filter, &fast_config()).unwrap_err();
    assert_eq!(
        err.native_error().map(NativeError::code),
        Some(codes::NO_CAPTURE_SOURCE)
    );
    assert_eq!(bridge.registry().live_count(), 0);
    assert_eq!(sim.live_objects(), 0);
}

#[test]
fn test_screenshot_owns_its_image() {
    let (sim, bridge) = setup();
    let filter = display_filter(&bridge);
    let (callback, rx) = channel();
    bridge.capture_image(&filter, &StreamConfiguration::new().with_size(8, 4), callback);

    let image = rx.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!((image.width(), image.height()), (8, 4));
    assert_eq!(image.pixel(0, 0).map(|px| px[3]), Some(0xFF));
    assert_eq!(image.pixel(8, 0), None);
    assert_eq!(sim.live_objects(), 1);

    let bytes = image.to_bytes();
    drop(image);
    assert_eq!(sim.live_objects(), 0);
    assert_eq!(bytes.len(), 8 * 4 * 4);
}

#[test]
fn test_state_events_follow_lifecycle() {
    let (_sim, bridge) = setup();
    let stream = bridge
        .create_stream(&display_filter(&bridge), &fast_config())
        .unwrap();
    let events = stream.events();

    start(&stream).unwrap();
    stop(&stream).unwrap();

    let states: Vec<_> = events
        .try_iter()
        .filter_map(|event| match event {
            StreamEvent::StateChanged { current, .. } => Some(current.name()),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec!["Starting", "Running", "Stopping", "Stopped"]);
}

#[test]
fn test_empty_world() {
    let sim = Arc::new(SimulatedBackend::with_world(SimWorld::empty()));
    let bridge = CaptureBridge::new(sim.clone());
    let content = bridge
        .shareable_content_blocking(ContentOptions::default())
        .unwrap();

    assert_eq!(content.displays().len(), 0);
    assert!(content.windows().is_empty());
    assert!(content.applications().is_empty());
    drop(content);
    assert_eq!(sim.live_objects(), 0);
}

#[test]
fn test_drop_while_stop_is_deferred_resolves_stop() {
    let (sim, bridge) = setup();
    sim.set_latency(Duration::from_millis(50));
    let stream = bridge
        .create_stream(&display_filter(&bridge), &fast_config())
        .unwrap();

    let (start_cb, start_rx) = channel::<()>();
    let (stop_cb, stop_rx) = channel::<()>();
    stream.start_capture(start_cb);
    stream.stop_capture(stop_cb);
    drop(stream);

    stop_rx.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert!(start_rx.recv_timeout(TIMEOUT).is_ok());
    assert!(wait_until(|| sim.running_streams().is_empty()));
    assert!(wait_until(|| sim.live_objects() == 0));
}

#[test]
fn test_failure_event_during_start_stops_native_capture() {
    let (sim, bridge) = setup();
    sim.set_latency(Duration::from_millis(40));
    let stream = bridge
        .create_stream(&display_filter(&bridge), &fast_config())
        .unwrap();
    let tokens = sim.stream_tokens();
    assert_eq!(tokens.len(), 1);

    let (callback, rx) = channel::<()>();
    stream.start_capture(callback);
    assert!(sim.report_stream_error(
        tokens[0],
        stream_error(codes::SYSTEM_STOPPED_STREAM, "display disconnected")
    ));
    assert!(stream.state().is_failed());

    assert!(matches!(
        rx.recv_timeout(TIMEOUT).unwrap(),
        Err(CaptureError::InvalidState { state: "Failed", .. })
    ));
    assert!(wait_until(|| sim.running_streams().is_empty()));

    // Native capture is idle again, so a restart goes through.
    start(&stream).unwrap();
    assert!(stream.state().is_running());
    stop(&stream).unwrap();
}

#[test]
fn test_typical_configuration_starts_or_fails_cleanly() {
    let (sim, bridge) = setup();
    let config = StreamConfiguration::new()
        .with_size(1920, 1080)
        .with_captures_audio(true)
        .with_sample_rate(48_000)
        .with_channel_count(2)
        .with_shows_cursor(false)
        .with_minimum_frame_interval(Duration::from_secs(1) / 30);
    assert!(config.max_frame_rate().is_some_and(|fps| (fps - 30.0).abs() < 0.01));

    let stream = bridge
        .create_stream(&display_filter(&bridge), &config)
        .unwrap();
    let video = counting_output(&stream, MediaType::Video);
    let audio = counting_output(&stream, MediaType::Audio);

    match start(&stream) {
        Ok(()) => {
            assert!(stream.state().is_running());
            assert!(wait_until(|| {
                video.load(Ordering::SeqCst) > 0 && audio.load(Ordering::SeqCst) > 0
            }));
            stop(&stream).unwrap();
            assert!(stream.state().is_stopped());
        }
        Err(err) => {
            assert!(err.native_error().is_some(), "unexpected error: {err}");
            assert!(stream.state().is_failed());
        }
    }

    drop(stream);
    assert!(wait_until(|| sim.live_objects() == 0));
}

#[test]
fn test_display_and_window_streams_run_side_by_side() {
    let (sim, bridge) = setup();
    let content = bridge
        .shareable_content_blocking(ContentOptions::default())
        .unwrap();
    let display = content.display(1).unwrap();
    let window = content.window(101).unwrap();

    let display_stream = bridge
        .create_stream(&ContentFilter::excluding_windows(&display, &[]), &fast_config())
        .unwrap();
    let window_stream = bridge
        .create_stream(&ContentFilter::desktop_independent_window(&window), &fast_config())
        .unwrap();
    assert_ne!(display_stream.id(), window_stream.id());
    assert_eq!(window_stream.filter().display_id(), None);

    let display_frames = counting_output(&display_stream, MediaType::Video);
    let window_frames = counting_output(&window_stream, MediaType::Video);
    start(&display_stream).unwrap();
    start(&window_stream).unwrap();
    assert_eq!(sim.running_streams().len(), 2);

    assert!(wait_until(|| {
        display_frames.load(Ordering::SeqCst) >= 3 && window_frames.load(Ordering::SeqCst) >= 3
    }));

    stop(&window_stream).unwrap();
    assert!(display_stream.state().is_running());
    assert_eq!(sim.running_streams().len(), 1);
    stop(&display_stream).unwrap();

    drop((display_stream, window_stream, display, window, content));
    assert!(wait_until(|| sim.live_objects() == 0));
    assert_eq!(sim.over_releases(), 0);
}

#[test]
fn test_enumeration_options_filter_windows() {
    let (sim, bridge) = setup();
    let options = ContentOptions::default()
        .exclude_desktop_windows(true)
        .on_screen_windows_only(true);

    let all = bridge
        .shareable_content_blocking(ContentOptions::default())
        .unwrap();
    let filtered = bridge.shareable_content_blocking(options).unwrap();

    let ids: Vec<u32> = filtered.windows().iter().map(|w| w.window_id()).collect();
    assert_eq!(ids, vec![100, 101]);
    assert!(all.windows().len() > filtered.windows().len());
    assert!(filtered
        .windows()
        .iter()
        .all(|w| w.is_on_screen() && w.window_layer() == 0));
    assert_eq!(filtered.displays().len(), all.displays().len());

    drop((all, filtered));
    assert_eq!(sim.live_objects(), 0);

    let empty = Arc::new(SimulatedBackend::with_world(SimWorld::empty()));
    let bridge = CaptureBridge::new(empty.clone());
    let content = bridge.shareable_content_blocking(options).unwrap();
    assert!(content.displays().is_empty());
    assert!(content.windows().is_empty());
    assert!(content.applications().is_empty());
    drop(content);
    assert_eq!(empty.live_objects(), 0);
}
