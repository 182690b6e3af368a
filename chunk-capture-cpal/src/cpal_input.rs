//! cpal microphone stream.
//!
//! Opens an input device in its default configuration and delivers f32
//! interleaved samples via the `SampleCallback`.

use std::sync::mpsc;
use std::thread;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{
    BuildStreamError, DefaultStreamConfigError, FromSample, PlayStreamError, Sample, SampleFormat, SizedSample, Stream,
    StreamConfig, StreamError,
};

use chunk_capture_core::{
    AudioSource, CaptureError, FaultCallback, LiveStream, SampleCallback, StreamFormat,
};

use crate::device_enumerator::{default_input_device_name, resolve_input_device};
use crate::errors::classify_backend_error;

type Reply = mpsc::Sender<Result<(), CaptureError>>;

enum Command {
    Pause(Reply),
    Resume(Reply),
    Stop,
}

/// Microphone capture through cpal.
///
/// A cpal `Stream` may not leave the thread that built it, so the stream
/// lives on a dedicated "cpal-input" thread that takes commands over a
/// channel.
pub struct CpalInputStream {
    device_name: Option<String>,
    commands: Option<mpsc::Sender<Command>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl CpalInputStream {
    /// Capture from the system default input device.
    pub fn default_device() -> Self {
        Self {
            device_name: None,
            commands: None,
            worker: None,
        }
    }

    /// Capture from the input device with this name.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            commands: None,
            worker: None,
        }
    }

    fn request(&self, make: fn(Reply) -> Command) -> Result<(), CaptureError> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| CaptureError::Unknown("input stream is not running".into()))?;
        let (reply_tx, reply_rx) = mpsc::channel();
        commands
            .send(make(reply_tx))
            .map_err(|_| CaptureError::DeviceUnavailable)?;
        reply_rx.recv().map_err(|_| CaptureError::DeviceUnavailable)?
    }
}

impl LiveStream for CpalInputStream {
    fn is_available(&self) -> bool {
        resolve_input_device(self.device_name.as_deref()).is_ok()
    }

    fn start(&mut self, on_samples: SampleCallback, on_fault: FaultCallback) -> Result<StreamFormat, CaptureError> {
        if self.worker.is_some() {
            return Err(CaptureError::Unknown("input stream already running".into()));
        }

        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let device_name = self.device_name.clone();
        let fault_tx = command_tx.clone();

        let handle = thread::Builder::new()
            .name("cpal-input".into())
            .spawn(move || {
                stream_thread(device_name, on_samples, on_fault, ready_tx, command_rx, fault_tx);
            })
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn input thread: {}", e)))?;

        let opened = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(CaptureError::Unknown("input thread exited before opening".into())));

        match opened {
            Ok(format) => {
                self.commands = Some(command_tx);
                self.worker = Some(handle);
                Ok(format)
            }
            Err(e) => {
                let _ = handle.join();
                Err(e)
            }
        }
    }

    fn pause(&mut self) -> Result<(), CaptureError> {
        self.request(Command::Pause)
    }

    fn resume(&mut self) -> Result<(), CaptureError> {
        self.request(Command::Resume)
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(commands) = self.commands.take() {
            // Fails if the thread already ended after a device fault.
            let _ = commands.send(Command::Stop);
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn device_info(&self) -> AudioSource {
        describe_device(self.device_name.as_deref(), default_input_device_name())
    }
}

/// The default device is identified by its resolved name, so one physical
/// input has one lease id however it was selected.
fn describe_device(device_name: Option<&str>, default_name: Option<String>) -> AudioSource {
    let is_default = device_name.is_none() || device_name == default_name.as_deref();
    let resolved = device_name.map(str::to_string).or(default_name);
    AudioSource {
        id: resolved.clone().unwrap_or_else(|| "default-input".into()),
        name: resolved.unwrap_or_else(|| "Default Input".into()),
        is_default,
    }
}

impl Drop for CpalInputStream {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Owns the cpal stream for its whole life.
///
/// Sequence:
/// 1. Resolve the device (default or by name)
/// 2. Build an input stream in the device's default configuration
/// 3. Start it and report the format back to `start`
/// 4. Serve pause/resume until told to stop
fn stream_thread(
    device_name: Option<String>,
    on_samples: SampleCallback,
    on_fault: FaultCallback,
    ready: mpsc::Sender<Result<StreamFormat, CaptureError>>,
    commands: mpsc::Receiver<Command>,
    fault_tx: mpsc::Sender<Command>,
) {
    let (stream, format) = match open_stream(device_name.as_deref(), on_samples, on_fault, fault_tx) {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(format));

    for command in commands.iter() {
        match command {
            Command::Pause(reply) => {
                let result = stream
                    .pause()
                    .map_err(|e| CaptureError::Unknown(format!("failed to pause input stream: {}", e)));
                let _ = reply.send(result);
            }
            Command::Resume(reply) => {
                let _ = reply.send(stream.play().map_err(map_play_error));
            }
            Command::Stop => break,
        }
    }

    drop(stream);
    log::debug!("Input stream closed");
}

fn open_stream(
    device_name: Option<&str>,
    on_samples: SampleCallback,
    on_fault: FaultCallback,
    fault_tx: mpsc::Sender<Command>,
) -> Result<(Stream, StreamFormat), CaptureError> {
    let device = resolve_input_device(device_name)?;
    let supported = device.default_input_config().map_err(map_config_error)?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();
    let format = StreamFormat::new(config.sample_rate.0, config.channels);

    let on_error = move |e: StreamError| match e {
        StreamError::DeviceNotAvailable => {
            log::error!("Input device disappeared");
            on_fault(CaptureError::DeviceUnavailable);
            let _ = fault_tx.send(Command::Stop);
        }
        other => {
            log::warn!("Input stream error: {}", other);
            on_fault(CaptureError::Unknown(other.to_string()));
        }
    };

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| on_samples(data),
            on_error,
            None,
        ),
        SampleFormat::I16 => build_converting::<i16>(&device, &config, on_samples, on_error),
        SampleFormat::U16 => build_converting::<u16>(&device, &config, on_samples, on_error),
        SampleFormat::I32 => build_converting::<i32>(&device, &config, on_samples, on_error),
        other => {
            return Err(CaptureError::Unknown(format!("unsupported input sample format {:?}", other)));
        }
    }
    .map_err(map_build_error)?;

    stream.play().map_err(map_play_error)?;

    let name = device.name().unwrap_or_else(|_| "unknown".into());
    log::info!(
        "Input stream opened on '{}' ({} Hz, {} ch, {:?})",
        name,
        format.sample_rate,
        format.channels,
        sample_format
    );
    Ok((stream, format))
}

fn build_converting<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    on_samples: SampleCallback,
    on_error: impl FnMut(StreamError) + Send + 'static,
) -> Result<Stream, BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let mut converted: Vec<f32> = Vec::new();
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            converted.clear();
            converted.extend(data.iter().map(|s| s.to_sample::<f32>()));
            on_samples(&converted);
        },
        on_error,
        None,
    )
}

fn map_config_error(e: DefaultStreamConfigError) -> CaptureError {
    match e {
        DefaultStreamConfigError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
        DefaultStreamConfigError::BackendSpecific { err } => classify_backend_error(&err.description),
        other => CaptureError::Unknown(other.to_string()),
    }
}

fn map_build_error(e: BuildStreamError) -> CaptureError {
    match e {
        BuildStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
        BuildStreamError::BackendSpecific { err } => classify_backend_error(&err.description),
        other => CaptureError::Unknown(other.to_string()),
    }
}

fn map_play_error(e: PlayStreamError) -> CaptureError {
    match e {
        PlayStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
        PlayStreamError::BackendSpecific { err } => classify_backend_error(&err.description),
    }
}
