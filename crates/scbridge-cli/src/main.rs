//! Command line driver for the capture bridge.
//!
//! Runs against the simulated backend so capture flows can be exercised on
//! any machine.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use crossbeam_channel::select;
use tracing::{info, warn};

use scbridge_capture::sim::{SimWorld, SimulatedBackend};
use scbridge_capture::{
    completion, BridgeSettings, CaptureBridge, CapturedImage, ContentFilter, ContentSnapshot,
    MediaType, SampleBuffer, StreamConfiguration,
};
use scbridge_types::{ContentOptions, PixelFormat, StreamEvent};

#[derive(Parser)]
#[command(name = "scbridge")]
#[command(version)]
#[command(about = "Enumerate, record and screenshot shareable content")]
struct Cli {
    /// Bridge settings file (JSON)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Simulated world file (JSON); defaults to two displays and a few windows
    #[arg(long, global = true)]
    world: Option<PathBuf>,

    /// Simulated completion latency in milliseconds
    #[arg(long, global = true, default_value_t = 2)]
    latency_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List displays, windows and applications
    List {
        /// Leave out desktop-level windows
        #[arg(long)]
        exclude_desktop: bool,

        /// Only list windows that are on screen
        #[arg(long)]
        on_screen_only: bool,

        /// Print the world as JSON
        #[arg(long)]
        json: bool,
    },

    /// Capture a display or window for a while and report delivery stats
    Record {
        #[command(flatten)]
        source: SourceArgs,

        /// Recording length in seconds
        #[arg(long, default_value_t = 2.0)]
        seconds: f64,

        /// Video frame rate
        #[arg(long, default_value_t = 60)]
        frame_rate: u32,

        /// Capture system audio
        #[arg(long)]
        audio: bool,

        /// Pixel format of delivered frames
        #[arg(long, value_enum, default_value = "bgra")]
        pixel_format: PixelFormatArg,
    },

    /// Capture a single image
    Screenshot {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file for raw RGBA pixels
        #[arg(long, default_value = "screenshot.rgba")]
        output: PathBuf,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Display id to capture
    #[arg(long, conflicts_with = "window")]
    display: Option<u32>,

    /// Window id to capture
    #[arg(long, conflicts_with = "display")]
    window: Option<u32>,

    /// Output width; defaults to the source width
    #[arg(long)]
    width: Option<u32>,

    /// Output height; defaults to the source height
    #[arg(long)]
    height: Option<u32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PixelFormatArg {
    Bgra,
    L10r,
    #[value(name = "420v")]
    YCbCr420Video,
    #[value(name = "420f")]
    YCbCr420Full,
}

impl From<PixelFormatArg> for PixelFormat {
    fn from(arg: PixelFormatArg) -> Self {
        match arg {
            PixelFormatArg::Bgra => PixelFormat::Bgra,
            PixelFormatArg::L10r => PixelFormat::L10r,
            PixelFormatArg::YCbCr420Video => PixelFormat::YCbCr420Video,
            PixelFormatArg::YCbCr420Full => PixelFormat::YCbCr420Full,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => read_json::<BridgeSettings>(path)?,
        None => BridgeSettings::default(),
    };
    let world = match &cli.world {
        Some(path) => read_json::<SimWorld>(path)?,
        None => SimWorld::default(),
    };

    let backend = SimulatedBackend::with_world(world)
        .with_latency(Duration::from_millis(cli.latency_ms));
    let bridge = CaptureBridge::with_settings(Arc::new(backend), settings);

    match cli.command {
        Command::List {
            exclude_desktop,
            on_screen_only,
            json,
        } => {
            let options = ContentOptions::default()
                .exclude_desktop_windows(exclude_desktop)
                .on_screen_windows_only(on_screen_only);
            list(&bridge, options, json)
        }
        Command::Record {
            source,
            seconds,
            frame_rate,
            audio,
            pixel_format,
        } => record(
            &bridge,
            &source,
            Duration::from_secs_f64(seconds.max(0.0)),
            frame_rate,
            audio,
            pixel_format.into(),
        ),
        Command::Screenshot { source, output } => screenshot(&bridge, &source, &output),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn list(bridge: &CaptureBridge, options: ContentOptions, json: bool) -> Result<()> {
    let content = bridge.shareable_content_blocking(options)?;

    if json {
        let value = serde_json::json!({
            "displays": content.displays().iter().map(|d| serde_json::json!({
                "display_id": d.display_id(),
                "width": d.width(),
                "height": d.height(),
                "frame": d.frame(),
            })).collect::<Vec<_>>(),
            "windows": content.windows().iter().map(|w| serde_json::json!({
                "window_id": w.window_id(),
                "title": w.title(),
                "frame": w.frame(),
                "on_screen": w.is_on_screen(),
                "layer": w.window_layer(),
                "owner_pid": w.owner_pid(),
            })).collect::<Vec<_>>(),
            "applications": content.applications().iter().map(|a| serde_json::json!({
                "bundle_identifier": a.bundle_identifier(),
                "application_name": a.application_name(),
                "process_id": a.process_id(),
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let displays = content.displays();
    println!("Displays ({}):", displays.len());
    for display in &displays {
        println!(
            "  {:>4}  {}x{}",
            display.display_id(),
            display.width(),
            display.height()
        );
    }

    let windows = content.windows();
    println!("Windows ({}):", windows.len());
    for window in &windows {
        println!(
            "  {:>4}  {:<24} {}",
            window.window_id(),
            window.title().unwrap_or_else(|| "<untitled>".to_string()),
            if window.is_on_screen() { "on screen" } else { "hidden" }
        );
    }

    let applications = content.applications();
    println!("Applications ({}):", applications.len());
    for app in &applications {
        println!(
            "  {:>6}  {} ({})",
            app.process_id(),
            app.application_name(),
            app.bundle_identifier()
        );
    }

    Ok(())
}

/// Build a filter for the requested source and the matching output size.
fn resolve_source(
    content: &ContentSnapshot,
    source: &SourceArgs,
) -> Result<(ContentFilter, u32, u32)> {
    let filter = match (source.display, source.window) {
        (_, Some(window_id)) => {
            ContentFilter::desktop_independent_window(&content.window(window_id)?)
        }
        (Some(display_id), None) => {
            ContentFilter::excluding_windows(&content.display(display_id)?, &[])
        }
        (None, None) => {
            let Some(display) = content.displays().get(0) else {
                bail!("No display available");
            };
            ContentFilter::excluding_windows(&display, &[])
        }
    };

    let (width, height) = filter.source_size();
    Ok((
        filter,
        source.width.unwrap_or(width),
        source.height.unwrap_or(height),
    ))
}

fn record(
    bridge: &CaptureBridge,
    source: &SourceArgs,
    duration: Duration,
    frame_rate: u32,
    audio: bool,
    pixel_format: PixelFormat,
) -> Result<()> {
    let content = bridge.shareable_content_blocking(ContentOptions::default())?;
    let (filter, width, height) = resolve_source(&content, source)?;
    drop(content);

    let configuration = StreamConfiguration::new()
        .with_size(width, height)
        .with_frame_rate(frame_rate)
        .with_captures_audio(audio)
        .with_pixel_format(pixel_format);

    let stream = bridge.create_stream_with_error_handler(&filter, &configuration, |err| {
        warn!(error = %err, "Stream error");
    })?;

    let bytes = Arc::new(AtomicU64::new(0));
    for media in MediaType::ALL {
        if media == MediaType::Audio && !audio {
            continue;
        }
        let bytes = Arc::clone(&bytes);
        stream.add_output(media, move |sample: &SampleBuffer<'_>| {
            bytes.fetch_add(sample.data().len() as u64, Ordering::Relaxed);
        })?;
    }

    let events = stream.events();
    let (callback, rx) = completion::channel::<()>();
    stream.start_capture(callback);
    rx.recv()??;

    info!(width, height, frame_rate, audio, "Recording");
    let started = Instant::now();
    let deadline = crossbeam_channel::after(duration);
    loop {
        select! {
            recv(events) -> event => match event {
                Ok(StreamEvent::Error { message }) => bail!("Stream failed: {message}"),
                Ok(event) => info!(?event, "Stream event"),
                Err(_) => break,
            },
            recv(deadline) -> _ => break,
        }
    }

    let (callback, rx) = completion::channel::<()>();
    stream.stop_capture(callback);
    rx.recv()??;

    let stats = stream.stats();
    let elapsed = started.elapsed().as_secs_f64();
    println!("Recorded {elapsed:.2}s");
    println!(
        "  video frames: {} ({:.1} fps)",
        stats.video_delivered,
        stats.video_delivered as f64 / elapsed.max(f64::EPSILON)
    );
    println!("  audio buffers: {}", stats.audio_delivered);
    println!("  dropped (queue full): {}", stats.queue_drops);
    println!("  discarded: {}", stats.discarded);
    println!("  bytes delivered: {}", bytes.load(Ordering::Relaxed));

    Ok(())
}

fn screenshot(bridge: &CaptureBridge, source: &SourceArgs, output: &Path) -> Result<()> {
    let content = bridge.shareable_content_blocking(ContentOptions::default())?;
    let (filter, width, height) = resolve_source(&content, source)?;
    drop(content);

    let configuration = StreamConfiguration::new().with_size(width, height);
    let (callback, rx) = completion::channel::<CapturedImage>();
    bridge.capture_image(&filter, &configuration, callback);
    let image = rx.recv()??;

    std::fs::write(output, image.rgba())
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Wrote {}x{} RGBA image to {}",
        image.width(),
        image.height(),
        output.display()
    );

    Ok(())
}
