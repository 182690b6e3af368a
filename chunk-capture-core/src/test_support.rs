//! Fakes shared by the unit tests.

use std::sync::mpsc;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{AudioSource, StreamFormat};
use crate::models::chunk::AudioChunk;
use crate::models::error::{CaptureError, UploadError};
use crate::traits::chunk_sink::{ChunkSink, ErrorCallback};
use crate::traits::live_stream::{FaultCallback, LiveStream, SampleCallback};

#[derive(Default)]
struct FakeStreamInner {
    on_samples: Option<SampleCallback>,
    on_fault: Option<FaultCallback>,
    started: bool,
    paused: bool,
    stop_calls: usize,
}

/// Test-side controls of a [`FakeStream`].
#[derive(Clone, Default)]
pub(crate) struct FakeStreamHandle {
    inner: Arc<Mutex<FakeStreamInner>>,
}

impl FakeStreamHandle {
    /// Deliver a buffer the way a running stream would. Dropped while
    /// paused or stopped.
    pub(crate) fn push(&self, samples: &[f32]) {
        let callback = {
            let inner = self.inner.lock();
            if !inner.started || inner.paused {
                return;
            }
            inner.on_samples.clone()
        };
        if let Some(callback) = callback {
            callback(samples);
        }
    }

    pub(crate) fn fault(&self, error: CaptureError) {
        let callback = self.inner.lock().on_fault.clone();
        if let Some(callback) = callback {
            callback(error);
        }
    }

    pub(crate) fn is_started(&self) -> bool {
        self.inner.lock().started
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    pub(crate) fn stop_calls(&self) -> usize {
        self.inner.lock().stop_calls
    }
}

/// In-memory [`LiveStream`] driven by hand through its handle.
pub(crate) struct FakeStream {
    device_id: String,
    format: StreamFormat,
    available: bool,
    start_error: Option<CaptureError>,
    /// Delivered from inside `start`, before it returns.
    start_samples: Vec<f32>,
    start_fault: Option<CaptureError>,
    handle: FakeStreamHandle,
}

impl FakeStream {
    /// Device ids must be unique per test: the device lease table is process-wide.
    pub(crate) fn new(device_id: &str, format: StreamFormat) -> (Self, FakeStreamHandle) {
        let handle = FakeStreamHandle::default();
        let stream = Self {
            device_id: device_id.to_string(),
            format,
            available: true,
            start_error: None,
            start_samples: Vec::new(),
            start_fault: None,
            handle: handle.clone(),
        };
        (stream, handle)
    }

    pub(crate) fn failing(device_id: &str, error: CaptureError) -> Self {
        let (mut stream, _) = Self::new(device_id, StreamFormat::new(8000, 1));
        stream.start_error = Some(error);
        stream
    }

    /// Opens, delivers `samples`, then reports `fault` before `start` returns,
    /// the way a device unplugged mid-open behaves.
    pub(crate) fn faulting_on_start(
        device_id: &str,
        samples: &[f32],
        fault: CaptureError,
    ) -> (Self, FakeStreamHandle) {
        let (mut stream, handle) = Self::new(device_id, StreamFormat::new(8000, 1));
        stream.start_samples = samples.to_vec();
        stream.start_fault = Some(fault);
        (stream, handle)
    }

    pub(crate) fn unavailable(device_id: &str) -> Self {
        let (mut stream, _) = Self::new(device_id, StreamFormat::new(8000, 1));
        stream.available = false;
        stream
    }
}

impl LiveStream for FakeStream {
    fn is_available(&self) -> bool {
        self.available
    }

    fn start(&mut self, on_samples: SampleCallback, on_fault: FaultCallback) -> Result<StreamFormat, CaptureError> {
        if let Some(error) = self.start_error.clone() {
            return Err(error);
        }
        {
            let mut inner = self.handle.inner.lock();
            inner.on_samples = Some(Arc::clone(&on_samples));
            inner.on_fault = Some(Arc::clone(&on_fault));
            inner.started = true;
            inner.paused = false;
        }
        if !self.start_samples.is_empty() {
            on_samples(&self.start_samples);
        }
        if let Some(fault) = self.start_fault.clone() {
            on_fault(fault);
        }
        Ok(self.format)
    }

    fn pause(&mut self) -> Result<(), CaptureError> {
        self.handle.inner.lock().paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), CaptureError> {
        self.handle.inner.lock().paused = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        let mut inner = self.handle.inner.lock();
        inner.started = false;
        inner.on_samples = None;
        inner.on_fault = None;
        inner.stop_calls += 1;
        Ok(())
    }

    fn device_info(&self) -> AudioSource {
        AudioSource {
            id: self.device_id.clone(),
            name: format!("Fake {}", self.device_id),
            is_default: false,
        }
    }
}

/// Sink that records every chunk it receives.
#[derive(Default)]
pub(crate) struct RecordingSink {
    chunks: Mutex<Vec<AudioChunk>>,
    fail_with: Mutex<Option<String>>,
}

impl RecordingSink {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn chunks(&self) -> Vec<AudioChunk> {
        self.chunks.lock().clone()
    }

    pub(crate) fn sequence_numbers(&self) -> Vec<u32> {
        self.chunks.lock().iter().map(|c| c.sequence_number).collect()
    }

    /// Reject every following delivery with `message` (None to accept again).
    pub(crate) fn fail_with(&self, message: Option<&str>) {
        *self.fail_with.lock() = message.map(str::to_string);
    }
}

impl ChunkSink for RecordingSink {
    fn emit(&self, chunk: AudioChunk) -> Result<(), UploadError> {
        if let Some(message) = self.fail_with.lock().clone() {
            return Err(UploadError::new(message));
        }
        self.chunks.lock().push(chunk);
        Ok(())
    }
}

/// Sink whose deliveries block until the test releases them, one per
/// message on the returned sender.
pub(crate) struct GatedSink {
    pub(crate) inner: Arc<RecordingSink>,
    entered: Mutex<mpsc::Sender<u32>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl GatedSink {
    /// Returns the sink, a receiver that reports each sequence number as its
    /// delivery starts, and the sender that lets one delivery finish.
    pub(crate) fn new() -> (Arc<Self>, mpsc::Receiver<u32>, mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let sink = Arc::new(Self {
            inner: RecordingSink::new(),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        (sink, entered_rx, release_tx)
    }
}

impl ChunkSink for GatedSink {
    fn emit(&self, chunk: AudioChunk) -> Result<(), UploadError> {
        let _ = self.entered.lock().send(chunk.sequence_number);
        let _ = self.release.lock().recv();
        self.inner.emit(chunk)
    }
}

/// Error callback that collects what it is given.
pub(crate) fn collecting_errors() -> (ErrorCallback, Arc<Mutex<Vec<CaptureError>>>) {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let callback: ErrorCallback = Arc::new(move |e: &CaptureError| sink.lock().push(e.clone()));
    (callback, errors)
}

/// A mono ramp of `frames` samples in `[-1.0, 1.0)`.
pub(crate) fn ramp(frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|i| (i % 200) as f32 / 100.0 - 1.0)
        .collect()
}
