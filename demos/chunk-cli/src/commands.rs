use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use chunk_capture_core::storage::metadata::read_metadata;
use chunk_capture_core::{AesGcmEncryptor, ChunkSpool, ChunkingConfig, ReplayCapture, SourceFormat, WavHeader};

use crate::{ChunkOptions, RecordArgs, SplitArgs};

/// Key id recorded in the metadata of chunks sealed with a command-line key.
const CLI_KEY_ID: &str = "cli-key";

fn chunks_dir() -> PathBuf {
    dirs_next::document_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Meeting Chunks")
}

/// Chunking configuration from `--config`, with `--chunk-secs` on top.
pub(crate) fn load_config(options: &ChunkOptions) -> Result<ChunkingConfig, String> {
    let mut config = match &options.config {
        Some(path) => {
            let json = fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
            serde_json::from_str::<ChunkingConfig>(&json)
                .map_err(|e| format!("invalid config {}: {}", path.display(), e))?
        }
        None => ChunkingConfig::default(),
    };
    if let Some(secs) = options.chunk_secs {
        config.chunk_duration_secs = secs;
    }
    config.validate()?;
    Ok(config)
}

fn build_spool(options: &ChunkOptions) -> Result<ChunkSpool, String> {
    let dir = options.out.clone().unwrap_or_else(chunks_dir);
    let spool = ChunkSpool::new(dir);
    match &options.key_hex {
        Some(hex) => {
            let encryptor = AesGcmEncryptor::from_hex(hex, CLI_KEY_ID).map_err(|e| e.to_string())?;
            Ok(spool.with_encryptor(Box::new(encryptor)))
        }
        None => Ok(spool),
    }
}

/// `audio/mpeg` or `mp3` alike.
pub(crate) fn parse_format(value: &str) -> SourceFormat {
    if value.contains('/') {
        SourceFormat::from_mime_type(value)
    } else {
        SourceFormat::from_extension(value)
    }
}

pub fn split(args: &SplitArgs) -> Result<(), String> {
    let config = load_config(&args.chunks)?;
    let format = match &args.format {
        Some(value) => parse_format(value),
        None => SourceFormat::from_path(&args.file),
    };
    let bytes = fs::read(&args.file).map_err(|e| format!("failed to read {}: {}", args.file.display(), e))?;

    let replay = ReplayCapture::new(config);
    let buffer = replay.load(&bytes, format).map_err(|e| e.to_string())?;
    let spool = build_spool(&args.chunks)?;

    println!(
        "{}: {:.2}s, {} ch @ {} Hz -> {} chunks in {}",
        args.file.display(),
        buffer.total_duration_secs(),
        buffer.channels(),
        buffer.sample_rate(),
        buffer.chunk_count(),
        spool.dir().display()
    );

    while let Some(sequence_number) = replay.send_next(&spool).map_err(|e| e.to_string())? {
        let meta = read_metadata(spool.dir(), sequence_number).map_err(|e| e.to_string())?;
        println!(
            "  chunk {:>3}: {:>7.2}s {:>10} bytes  sha256 {}…  ({:.0}%)",
            sequence_number,
            meta.duration_secs,
            meta.byte_length,
            &meta.checksum[..12.min(meta.checksum.len())],
            replay.progress().percent()
        );
    }
    Ok(())
}

/// `--seconds` as a `Duration`.
pub(crate) fn recording_length(seconds: f64) -> Result<Duration, String> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err("--seconds must be a positive number".into());
    }
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("--seconds {} is out of range: {}", seconds, e))
}

#[cfg(feature = "cpal")]
pub fn record(args: &RecordArgs) -> Result<(), String> {
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    use chunk_capture_core::{CaptureError, ErrorCallback, LiveCapture};
    use chunk_capture_cpal::CpalInputStream;
    use parking_lot::Mutex;

    let total = recording_length(args.seconds)?;
    let config = load_config(&args.chunks)?;
    let spool = Arc::new(build_spool(&args.chunks)?);

    let stream = match &args.device {
        Some(name) => CpalInputStream::with_device(name.clone()),
        None => CpalInputStream::default_device(),
    };
    let mut capture = LiveCapture::new(stream);

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink_errors = Arc::clone(&errors);
    let on_error: ErrorCallback = Arc::new(move |e: &CaptureError| {
        log::warn!("Capture error: {}", e);
        sink_errors.lock().push(e.to_string());
    });

    capture
        .start(config, spool.clone(), on_error)
        .map_err(|e| e.to_string())?;
    println!(
        "Recording {:.0}s from '{}' into {} ({}s chunks)",
        args.seconds,
        capture.device_info().name,
        spool.dir().display(),
        config.chunk_duration_secs
    );

    let pause = args
        .pause_secs
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
    let started = Instant::now();
    let mut paused_once = false;

    while started.elapsed() < total && capture.status().is_active() {
        if let Some(pause) = pause {
            if !paused_once && started.elapsed() >= total / 2 {
                capture.pause().map_err(|e| e.to_string())?;
                println!("Paused for {:.1}s", pause.as_secs_f64());
                thread::sleep(pause);
                capture.resume().map_err(|e| e.to_string())?;
                paused_once = true;
            }
        }
        thread::sleep(Duration::from_millis(100));
    }

    capture.stop().map_err(|e| e.to_string())?;

    let snapshot = capture.snapshot();
    let json = serde_json::to_string_pretty(&snapshot).map_err(|e| e.to_string())?;
    println!("{}", json);
    for error in errors.lock().iter() {
        eprintln!("warning: {}", error);
    }
    Ok(())
}

#[cfg(not(feature = "cpal"))]
pub fn record(args: &RecordArgs) -> Result<(), String> {
    recording_length(args.seconds)?;
    Err("live recording needs the `cpal` feature (cargo run -p chunk-cli --features cpal)".into())
}

#[cfg(feature = "cpal")]
pub fn devices() -> Result<(), String> {
    let devices = chunk_capture_cpal::list_input_devices().map_err(|e| e.to_string())?;
    if devices.is_empty() {
        println!("No input devices found");
    }
    for device in devices {
        let marker = if device.is_default { " (default)" } else { "" };
        println!("{}{}", device.name, marker);
    }
    Ok(())
}

#[cfg(not(feature = "cpal"))]
pub fn devices() -> Result<(), String> {
    Err("device listing needs the `cpal` feature (cargo run -p chunk-cli --features cpal)".into())
}

/// Header fields of a chunk file, for display.
#[derive(Serialize)]
struct HeaderSummary {
    file: String,
    channels: u16,
    sample_rate: u32,
    bit_depth: u16,
    block_align: u16,
    data_size: u32,
    frames: usize,
    duration_secs: f64,
}

pub fn inspect(path: &Path) -> Result<(), String> {
    let bytes = fs::read(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    let header = WavHeader::parse(&bytes).map_err(|e| e.to_string())?;
    let summary = HeaderSummary {
        file: path.display().to_string(),
        channels: header.channels,
        sample_rate: header.sample_rate,
        bit_depth: header.bit_depth,
        block_align: header.block_align,
        data_size: header.data_size,
        frames: header.frame_count(),
        duration_secs: header.duration_secs(),
    };
    let json = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}
