use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::models::audio_models::{AudioSource, StreamFormat};
use crate::models::chunk::AudioChunk;
use crate::models::config::ChunkingConfig;
use crate::models::error::CaptureError;
use crate::models::state::{CaptureStatus, LiveCaptureSnapshot};
use crate::processing::wav_format;
use crate::session::device_lease::DeviceLease;
use crate::session::timer::{ChunkTimer, TimerSignal};
use crate::traits::chunk_sink::{ChunkSink, ErrorCallback};
use crate::traits::live_stream::{FaultCallback, LiveStream, SampleCallback};

/// Internal mutable session state, protected by `parking_lot::Mutex`.
struct SessionState {
    status: CaptureStatus,
    /// Whether arriving buffers are appended. Raised just before the stream
    /// starts, lowered once the stream is stopped or lost.
    accepting: bool,
    format: Option<StreamFormat>,
    accumulated: Vec<f32>,
    chunk_start: Option<Instant>,
    sequence_number: u32,
    total_duration_secs: f64,
    last_error: Option<String>,
    sink: Option<Arc<dyn ChunkSink>>,
    on_error: Option<ErrorCallback>,
    timer_signal: Option<Arc<TimerSignal>>,
    lease: Option<DeviceLease>,
    /// Set while `start` has the stream open but has not committed yet.
    starting: bool,
    /// Device loss reported before `start` committed.
    startup_fault: Option<CaptureError>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            status: CaptureStatus::Idle,
            accepting: false,
            format: None,
            accumulated: Vec::new(),
            chunk_start: None,
            sequence_number: 0,
            total_duration_secs: 0.0,
            last_error: None,
            sink: None,
            on_error: None,
            timer_signal: None,
            lease: None,
            starting: false,
            startup_fault: None,
        }
    }

    fn pending_frames(&self) -> usize {
        self.format
            .map(|f| f.frames(self.accumulated.len()))
            .unwrap_or(0)
    }
}

/// Chunk drained from the accumulator, ready to encode outside the lock.
struct DrainedChunk {
    samples: Vec<f32>,
    format: StreamFormat,
    sequence_number: u32,
    duration_secs: f64,
    sink: Option<Arc<dyn ChunkSink>>,
}

/// Holds the in-progress flag for the duration of a finalize's bookkeeping.
struct FinalizeGuard<'a>(&'a AtomicBool);

impl<'a> FinalizeGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FinalizeGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// State shared between the session, the stream callbacks and the timer.
struct ChunkerCore {
    state: Mutex<SessionState>,
    finalizing: AtomicBool,
}

impl ChunkerCore {
    fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::new()),
            finalizing: AtomicBool::new(false),
        }
    }

    fn status(&self) -> CaptureStatus {
        self.state.lock().status
    }

    /// Data-arrival handler: append in arrival order.
    fn append(&self, samples: &[f32]) {
        let mut s = self.state.lock();
        if s.accepting {
            s.accumulated.extend_from_slice(samples);
        }
    }

    fn on_timer_tick(&self) {
        // Boundaries are wall-clock driven and keep firing while paused.
        if self.status().is_active() {
            self.finalize_chunk();
        }
    }

    /// Cut the accumulated samples into a chunk and hand it to the sink.
    ///
    /// Returns immediately if another finalize is still doing its
    /// bookkeeping, or if nothing has accumulated. The in-progress flag is
    /// released before the sink runs so a slow sink never stalls the next
    /// boundary. Returns the sequence number of the emitted chunk.
    fn finalize_chunk(&self) -> Option<u32> {
        let Some(guard) = FinalizeGuard::try_acquire(&self.finalizing) else {
            log::debug!("Chunk boundary skipped: finalize already in progress");
            return None;
        };

        let drained = {
            let mut s = self.state.lock();
            let Some(format) = s.format else {
                return None;
            };
            let frames = s.pending_frames();
            if frames == 0 {
                return None;
            }

            let now = Instant::now();
            let duration_secs = s
                .chunk_start
                .map(|start| now.duration_since(start).as_secs_f64())
                .unwrap_or(0.0);

            // Whole frames only; a partial trailing frame stays for the next chunk.
            let whole = frames * format.channels as usize;
            let samples = if whole == s.accumulated.len() {
                std::mem::take(&mut s.accumulated)
            } else {
                s.accumulated.drain(..whole).collect()
            };

            s.chunk_start = Some(now);
            s.sequence_number += 1;
            s.total_duration_secs += duration_secs;

            DrainedChunk {
                samples,
                format,
                sequence_number: s.sequence_number,
                duration_secs,
                sink: s.sink.clone(),
            }
        };
        drop(guard);

        let sequence_number = drained.sequence_number;
        let channel_data = wav_format::deinterleave(&drained.samples, drained.format.channels as usize);
        let payload = match wav_format::encode_wav(&channel_data, drained.format.sample_rate) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Failed to encode chunk {}: {}", sequence_number, e);
                self.report_error(&e);
                return None;
            }
        };

        log::debug!(
            "Chunk {} finalized: {:.2}s, {} bytes",
            sequence_number,
            drained.duration_secs,
            payload.len()
        );

        let Some(sink) = drained.sink else {
            return Some(sequence_number);
        };
        if let Err(e) = sink.emit(AudioChunk::new(sequence_number, payload, drained.duration_secs)) {
            log::warn!("Chunk {} was not delivered: {}", sequence_number, e);
            self.report_error(&CaptureError::Upload(e));
        }
        Some(sequence_number)
    }

    /// Stream fault handler. Device loss ends the session: the remaining
    /// samples are flushed as a last chunk and the status becomes `stopped`.
    fn on_stream_fault(&self, error: CaptureError) {
        if !error.is_device_loss() {
            log::warn!("Live stream reported an error: {}", error);
            self.report_error(&error);
            return;
        }

        let (timer_signal, lease) = {
            let mut s = self.state.lock();
            if !s.status.is_active() {
                if s.starting {
                    // `start` picks this up before it commits.
                    s.startup_fault = Some(error);
                }
                return;
            }
            s.status = CaptureStatus::Stopped;
            s.accepting = false;
            (s.timer_signal.take(), s.lease.take())
        };
        if let Some(signal) = timer_signal {
            signal.cancel();
        }

        log::error!("Live capture lost its device: {}", error);
        self.finalize_chunk();
        drop(lease);
        self.report_error(&error);
    }

    /// Record `error` as the current error and forward it to the callback.
    fn report_error(&self, error: &CaptureError) {
        let callback = {
            let mut s = self.state.lock();
            s.last_error = Some(error.to_string());
            s.on_error.clone()
        };
        if let Some(callback) = callback {
            callback(error);
        }
    }
}

/// Timer-driven segmentation of a live audio stream.
///
/// Accumulates every buffer the stream delivers and, on a fixed wall-clock
/// interval, cuts the accumulation into an [`AudioChunk`] (WAV encoded) that
/// is pushed to the sink. `stop` flushes a final, possibly short, chunk.
///
/// ```text
/// [LiveStream] → append → [accumulator] ─┬─ timer tick ─┐
///                                        └─ stop ───────┴→ finalize → [WAV] → sink
/// ```
///
/// One instance is one recording run; once stopped it cannot be restarted.
pub struct LiveCapture<S: LiveStream> {
    stream: S,
    core: Arc<ChunkerCore>,
    timer: Option<ChunkTimer>,
    stream_open: bool,
}

impl<S: LiveStream> LiveCapture<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            core: Arc::new(ChunkerCore::new()),
            timer: None,
            stream_open: false,
        }
    }

    pub fn status(&self) -> CaptureStatus {
        self.core.status()
    }

    pub fn snapshot(&self) -> LiveCaptureSnapshot {
        let s = self.core.state.lock();
        LiveCaptureSnapshot {
            status: s.status,
            chunks_emitted: s.sequence_number,
            total_duration_secs: s.total_duration_secs,
            pending_frames: s.pending_frames(),
            error: s.last_error.clone(),
        }
    }

    /// The current error, if any, for display.
    pub fn error(&self) -> Option<String> {
        self.core.state.lock().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.core.state.lock().last_error = None;
    }

    pub fn device_info(&self) -> AudioSource {
        self.stream.device_info()
    }

    /// Start recording. Transitions: idle → recording.
    ///
    /// A no-op while already recording or paused. On failure the status
    /// stays `idle`, the error is recorded and `on_error` is invoked.
    pub fn start(
        &mut self,
        config: ChunkingConfig,
        sink: Arc<dyn ChunkSink>,
        on_error: ErrorCallback,
    ) -> Result<(), CaptureError> {
        match self.status() {
            CaptureStatus::Recording | CaptureStatus::Paused => {
                log::debug!("start ignored: session already running");
                return Ok(());
            }
            CaptureStatus::Stopped => return Err(CaptureError::SessionStopped),
            CaptureStatus::Idle => {}
        }

        let period = match config.validate().and_then(|_| config.chunk_period()) {
            Ok(period) => period,
            Err(message) => {
                return Err(self.fail_start(CaptureError::InvalidConfiguration(message), &on_error));
            }
        };

        let device = self.stream.device_info();
        let lease = DeviceLease::acquire(&device.id).map_err(|e| self.fail_start(e, &on_error))?;

        if !self.stream.is_available() {
            return Err(self.fail_start(CaptureError::DeviceUnavailable, &on_error));
        }

        {
            let mut s = self.core.state.lock();
            s.accumulated.clear();
            s.chunk_start = Some(Instant::now());
            s.accepting = true;
            s.starting = true;
            s.startup_fault = None;
        }

        let on_samples: SampleCallback = {
            let core = Arc::clone(&self.core);
            Arc::new(move |samples: &[f32]| core.append(samples))
        };
        let on_fault: FaultCallback = {
            let core = Arc::clone(&self.core);
            Arc::new(move |error: CaptureError| core.on_stream_fault(error))
        };

        let format = match self.stream.start(on_samples, on_fault) {
            Ok(format) => format,
            Err(e) => {
                self.reset_to_idle();
                return Err(self.fail_start(e, &on_error));
            }
        };
        self.stream_open = true;

        if format.channels == 0 || format.sample_rate == 0 {
            let _ = self.release_stream();
            self.reset_to_idle();
            let e = CaptureError::Unknown(format!(
                "stream reported an unusable format ({} Hz, {} channels)",
                format.sample_rate, format.channels
            ));
            return Err(self.fail_start(e, &on_error));
        }

        let tick_core = Arc::clone(&self.core);
        let timer = match ChunkTimer::spawn(period, move || tick_core.on_timer_tick()) {
            Ok(timer) => timer,
            Err(e) => {
                let _ = self.release_stream();
                self.reset_to_idle();
                return Err(self.fail_start(e, &on_error));
            }
        };

        let mut lease = Some(lease);
        let startup_fault = {
            let mut s = self.core.state.lock();
            s.starting = false;
            s.format = Some(format);
            s.sink = Some(sink);
            s.on_error = Some(on_error);
            s.last_error = None;
            match s.startup_fault.take() {
                Some(fault) => {
                    s.status = CaptureStatus::Stopped;
                    s.accepting = false;
                    Some(fault)
                }
                None => {
                    s.status = CaptureStatus::Recording;
                    s.timer_signal = Some(timer.signal());
                    s.lease = lease.take();
                    None
                }
            }
        };

        if let Some(fault) = startup_fault {
            // Same ending as a loss while recording: flush, stopped, report.
            timer.cancel();
            let _ = self.release_stream();
            log::error!("Live capture lost its device while starting: {}", fault);
            self.core.finalize_chunk();
            drop(lease);
            self.core.report_error(&fault);
            return Err(fault);
        }
        self.timer = Some(timer);

        log::info!(
            "Live capture started on '{}' ({} Hz, {} ch, {}s chunks)",
            device.name,
            format.sample_rate,
            format.channels,
            config.chunk_duration_secs
        );
        Ok(())
    }

    /// Pause recording. Transitions: recording → paused.
    ///
    /// The stream stops delivering, but chunk boundaries stay on the wall
    /// clock, so a paused session still emits whatever was accumulated.
    pub fn pause(&mut self) -> Result<(), CaptureError> {
        if !self.status().is_recording() {
            return Ok(());
        }
        if let Err(e) = self.stream.pause() {
            self.core.report_error(&e);
            return Err(e);
        }
        self.core.state.lock().status = CaptureStatus::Paused;
        log::info!("Live capture paused");
        Ok(())
    }

    /// Resume recording. Transitions: paused → recording.
    pub fn resume(&mut self) -> Result<(), CaptureError> {
        if !self.status().is_paused() {
            return Ok(());
        }
        if let Err(e) = self.stream.resume() {
            self.core.report_error(&e);
            return Err(e);
        }
        self.core.state.lock().status = CaptureStatus::Recording;
        log::info!("Live capture resumed");
        Ok(())
    }

    /// Stop recording. Transitions: recording/paused → stopped.
    ///
    /// Disarms the timer, releases the device and emits a final chunk with
    /// whatever accumulated since the last boundary. The session ends up
    /// `stopped` even if releasing the stream fails.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        if !self.status().is_active() {
            // Device loss already ended the session; just release what is left.
            self.timer = None;
            let _ = self.release_stream();
            return Ok(());
        }

        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.core.state.lock().accepting = false;
        let stop_result = self.release_stream();

        let lease = {
            let mut s = self.core.state.lock();
            s.status = CaptureStatus::Stopped;
            s.timer_signal = None;
            s.lease.take()
        };
        self.core.finalize_chunk();
        drop(lease);

        let snapshot = self.snapshot();
        log::info!(
            "Live capture stopped after {} chunks ({:.1}s)",
            snapshot.chunks_emitted,
            snapshot.total_duration_secs
        );

        if let Err(e) = stop_result {
            self.core.report_error(&e);
            return Err(e);
        }
        Ok(())
    }

    fn fail_start(&self, error: CaptureError, on_error: &ErrorCallback) -> CaptureError {
        log::warn!("Live capture failed to start: {}", error);
        self.core.state.lock().last_error = Some(error.to_string());
        on_error(&error);
        error
    }

    fn reset_to_idle(&self) {
        let mut s = self.core.state.lock();
        s.accepting = false;
        s.starting = false;
        s.startup_fault = None;
        s.accumulated.clear();
        s.chunk_start = None;
    }

    fn release_stream(&mut self) -> Result<(), CaptureError> {
        if !self.stream_open {
            return Ok(());
        }
        self.stream_open = false;
        self.stream.stop()
    }
}

impl<S: LiveStream> Drop for LiveCapture<S> {
    fn drop(&mut self) {
        if self.status().is_active() || self.stream_open {
            let _ = self.stop();
        }
    }
}
