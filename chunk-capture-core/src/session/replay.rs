use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::DecodedAudio;
use crate::models::chunk::AudioChunk;
use crate::models::config::{ChunkingConfig, SourceFormat};
use crate::models::error::CaptureError;
use crate::models::state::ReplayProgress;
use crate::processing::{decoder, wav_format};
use crate::traits::chunk_sink::ChunkSink;

const FRAME_EPSILON: f64 = 1e-6;

/// A fully decoded, finite source cut into fixed-duration windows.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    audio: DecodedAudio,
    chunk_duration_secs: f64,
}

impl ReplayBuffer {
    fn new(audio: DecodedAudio, chunk_duration_secs: f64) -> Self {
        Self {
            audio,
            chunk_duration_secs,
        }
    }

    pub fn audio(&self) -> &DecodedAudio {
        &self.audio
    }

    pub fn sample_rate(&self) -> u32 {
        self.audio.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.audio.channels()
    }

    pub fn chunk_duration_secs(&self) -> f64 {
        self.chunk_duration_secs
    }

    pub fn total_duration_secs(&self) -> f64 {
        self.audio.duration_secs()
    }

    /// `ceil(total / chunk_duration)`.
    pub fn chunk_count(&self) -> usize {
        let total = self.total_duration_secs();
        if total <= 0.0 {
            return 0;
        }
        (total / self.chunk_duration_secs).ceil() as usize
    }

    /// Time window `(start, end)` of chunk `index`, or `None` past the end or
    /// for a degenerate window.
    pub fn window(&self, index: usize) -> Option<(f64, f64)> {
        if index >= self.chunk_count() {
            return None;
        }
        let total = self.total_duration_secs();
        let start = index as f64 * self.chunk_duration_secs;
        let end = ((index + 1) as f64 * self.chunk_duration_secs).min(total);
        (end > start).then_some((start, end))
    }

    /// Index of the frame at `secs`. Times that land a hair below a frame
    /// boundary through float error still round onto it.
    fn frame_at(&self, secs: f64) -> usize {
        let frame = (secs * self.audio.sample_rate as f64 + FRAME_EPSILON).floor() as usize;
        frame.min(self.audio.frame_count())
    }

    /// Copy the samples of `[start, end)` out of every channel.
    fn slice(&self, start: f64, end: f64) -> Vec<Vec<f32>> {
        let frames = self.audio.frame_count();
        let start_frame = self.frame_at(start);
        let end_frame = if end >= self.total_duration_secs() {
            frames
        } else {
            self.frame_at(end)
        };
        self.audio
            .channel_data
            .iter()
            .map(|channel| channel[start_frame..end_frame.max(start_frame)].to_vec())
            .collect()
    }
}

#[derive(Default)]
struct ReplayState {
    buffer: Option<Arc<ReplayBuffer>>,
    /// Index of the next chunk to emit.
    cursor: usize,
    complete: bool,
    last_error: Option<String>,
    /// Bumped on every load/reset so an in-flight advance can tell that its
    /// source went away.
    generation: u64,
}

/// Resets the in-progress flag when the advance ends, however it ends.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl<'a> ProcessingGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Result<Self, CaptureError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(flag))
            .map_err(|_| CaptureError::AlreadyProcessing)
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Chunk cut from the buffer but not yet committed.
struct PendingChunk {
    chunk: AudioChunk,
    generation: u64,
}

/// Demand-driven segmentation of a prerecorded file.
///
/// Nothing happens on a timer: every [`advance`](Self::advance) slices the
/// next window, encodes it as WAV and returns it. A second call while one
/// is in flight fails with `AlreadyProcessing` instead of queuing.
pub struct ReplayCapture {
    config: ChunkingConfig,
    state: Mutex<ReplayState>,
    processing: AtomicBool,
}

impl ReplayCapture {
    pub fn new(config: ChunkingConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ReplayState::default()),
            processing: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Decode `bytes` and make it the current source, discarding any
    /// progress made on the previous one.
    pub fn load(&self, bytes: &[u8], format: SourceFormat) -> Result<Arc<ReplayBuffer>, CaptureError> {
        self.validate_config()?;
        let audio = decoder::decode_audio(bytes, format).inspect_err(|e| self.record_error(e))?;
        self.install(audio)
    }

    /// Like [`load`](Self::load), for audio that is already decoded.
    pub fn load_decoded(&self, audio: DecodedAudio) -> Result<Arc<ReplayBuffer>, CaptureError> {
        self.validate_config()?;
        if audio.channels() == 0 || audio.sample_rate == 0 {
            let e = CaptureError::InvalidAudioData("decoded audio has no channels or sample rate".into());
            self.record_error(&e);
            return Err(e);
        }
        if audio.channel_data.iter().any(|c| c.len() != audio.frame_count()) {
            let e = CaptureError::InvalidAudioData("channels have different lengths".into());
            self.record_error(&e);
            return Err(e);
        }
        self.install(audio)
    }

    /// Next chunk, or `None` once the buffer is exhausted (or nothing is loaded).
    pub fn advance(&self) -> Result<Option<AudioChunk>, CaptureError> {
        let _guard = ProcessingGuard::try_acquire(&self.processing)?;
        let Some(pending) = self.cut_next()? else {
            return Ok(None);
        };
        self.commit(&pending)?;
        Ok(Some(pending.chunk))
    }

    /// Cut the next chunk and deliver it to `sink`. The cursor only moves
    /// when delivery succeeds, so a failed chunk is retried by the next call.
    ///
    /// Returns the delivered sequence number, `None` when exhausted.
    pub fn send_next(&self, sink: &dyn ChunkSink) -> Result<Option<u32>, CaptureError> {
        let _guard = ProcessingGuard::try_acquire(&self.processing)?;
        let Some(pending) = self.cut_next()? else {
            return Ok(None);
        };
        let sequence_number = pending.chunk.sequence_number;

        if let Err(e) = sink.emit(pending.chunk.clone()) {
            log::warn!("Replay chunk {} was not delivered: {}", sequence_number, e);
            let e = CaptureError::Upload(e);
            self.record_error(&e);
            return Err(e);
        }
        self.commit(&pending)?;
        Ok(Some(sequence_number))
    }

    /// Rewind to the first chunk of the current source.
    pub fn reset(&self) {
        let mut s = self.state.lock();
        s.cursor = 0;
        s.complete = false;
        s.last_error = None;
        s.generation += 1;
    }

    pub fn progress(&self) -> ReplayProgress {
        let s = self.state.lock();
        let total_chunks = s.buffer.as_ref().map(|b| b.chunk_count()).unwrap_or(0);
        ReplayProgress {
            chunks_sent: s.cursor,
            total_chunks,
            is_processing: self.processing.load(Ordering::Acquire),
            is_complete: s.complete,
            error: s.last_error.clone(),
        }
    }

    pub fn buffer(&self) -> Option<Arc<ReplayBuffer>> {
        self.state.lock().buffer.clone()
    }

    pub fn is_exhausted(&self) -> bool {
        let s = self.state.lock();
        match &s.buffer {
            Some(buffer) => s.complete || s.cursor >= buffer.chunk_count(),
            None => true,
        }
    }

    fn validate_config(&self) -> Result<(), CaptureError> {
        self.config.validate().map_err(|message| {
            let e = CaptureError::InvalidConfiguration(message);
            self.record_error(&e);
            e
        })
    }

    fn install(&self, audio: DecodedAudio) -> Result<Arc<ReplayBuffer>, CaptureError> {
        // Every window must hold at least one frame or the chunk count lies.
        let frames_per_chunk = self.config.chunk_duration_secs * audio.sample_rate as f64;
        if frames_per_chunk + FRAME_EPSILON < 1.0 {
            let e = CaptureError::InvalidConfiguration(format!(
                "chunk duration {}s is shorter than one frame at {} Hz",
                self.config.chunk_duration_secs, audio.sample_rate
            ));
            self.record_error(&e);
            return Err(e);
        }

        let buffer = Arc::new(ReplayBuffer::new(audio, self.config.chunk_duration_secs));
        log::info!(
            "Replay source loaded: {:.2}s, {} ch @ {} Hz, {} chunks of {}s",
            buffer.total_duration_secs(),
            buffer.channels(),
            buffer.sample_rate(),
            buffer.chunk_count(),
            buffer.chunk_duration_secs()
        );

        let mut s = self.state.lock();
        s.buffer = Some(Arc::clone(&buffer));
        s.cursor = 0;
        s.complete = buffer.chunk_count() == 0;
        s.last_error = None;
        s.generation += 1;
        Ok(buffer)
    }

    /// Slice and encode the window under the cursor without moving it.
    fn cut_next(&self) -> Result<Option<PendingChunk>, CaptureError> {
        let (buffer, cursor, generation) = {
            let s = self.state.lock();
            let Some(buffer) = s.buffer.clone() else {
                return Ok(None);
            };
            if s.complete || s.cursor >= buffer.chunk_count() {
                return Ok(None);
            }
            (buffer, s.cursor, s.generation)
        };

        let Some((start, end)) = buffer.window(cursor) else {
            self.mark_complete(generation);
            return Ok(None);
        };
        let channel_data = buffer.slice(start, end);
        if channel_data.first().map_or(true, |c| c.is_empty()) {
            self.mark_complete(generation);
            return Ok(None);
        }

        let payload =
            wav_format::encode_wav(&channel_data, buffer.sample_rate()).inspect_err(|e| self.record_error(e))?;
        let sequence_number = cursor as u32 + 1;
        log::debug!(
            "Replay chunk {} cut: {:.2}s..{:.2}s, {} bytes",
            sequence_number,
            start,
            end,
            payload.len()
        );
        Ok(Some(PendingChunk {
            chunk: AudioChunk::new(sequence_number, payload, end - start),
            generation,
        }))
    }

    fn commit(&self, pending: &PendingChunk) -> Result<(), CaptureError> {
        let mut s = self.state.lock();
        if s.generation != pending.generation {
            return Err(CaptureError::SourceReplaced);
        }
        s.cursor += 1;
        s.last_error = None;
        if let Some(buffer) = &s.buffer {
            if s.cursor >= buffer.chunk_count() {
                s.complete = true;
                log::info!("Replay complete: {} chunks", s.cursor);
            }
        }
        Ok(())
    }

    fn mark_complete(&self, generation: u64) {
        let mut s = self.state.lock();
        if s.generation == generation {
            s.complete = true;
        }
    }

    fn record_error(&self, error: &CaptureError) {
        self.state.lock().last_error = Some(error.to_string());
    }
}
