use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::error::CaptureError;

/// Cancellation flag shared between a [`ChunkTimer`] and whoever may need
/// to disarm it without owning it (e.g. a stream fault handler).
#[derive(Debug, Default)]
pub struct TimerSignal {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

impl TimerSignal {
    pub fn cancel(&self) {
        *self.cancelled.lock() = true;
        self.condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock()
    }

    /// Block until `deadline` (forever if `None`) or cancellation.
    /// Returns `true` if cancelled.
    fn wait_until(&self, deadline: Option<Instant>) -> bool {
        let mut cancelled = self.cancelled.lock();
        while !*cancelled {
            match deadline {
                Some(deadline) => {
                    if self.condvar.wait_until(&mut cancelled, deadline).timed_out() {
                        break;
                    }
                }
                None => self.condvar.wait(&mut cancelled),
            }
        }
        *cancelled
    }
}

/// Repeating chunk-boundary timer on a dedicated thread.
///
/// Fixed-rate: ticks are scheduled at `start + n * period`. A tick that
/// overruns skips the deadlines it missed rather than firing back-to-back.
/// Dropping the timer cancels it and joins the thread, unless the drop
/// happens on the timer thread itself.
pub struct ChunkTimer {
    signal: Arc<TimerSignal>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ChunkTimer {
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> Result<Self, CaptureError>
    where
        F: FnMut() + Send + 'static,
    {
        if period.is_zero() {
            return Err(CaptureError::InvalidConfiguration("timer period must be positive".into()));
        }

        let signal = Arc::new(TimerSignal::default());
        let thread_signal = Arc::clone(&signal);

        let handle = thread::Builder::new()
            .name("chunk-timer".into())
            .spawn(move || {
                // A deadline past the end of the clock never fires.
                let mut deadline = Instant::now().checked_add(period);
                loop {
                    if thread_signal.wait_until(deadline) {
                        break;
                    }
                    on_tick();
                    deadline = deadline.and_then(|previous| next_deadline(previous, period));
                }
            })
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn chunk timer: {}", e)))?;

        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    pub fn signal(&self) -> Arc<TimerSignal> {
        Arc::clone(&self.signal)
    }

    /// Disarm the timer and wait for an in-progress tick to finish.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for ChunkTimer {
    fn drop(&mut self) {
        self.signal.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

/// First `previous + n * period` (n >= 1) that is still in the future.
fn next_deadline(previous: Instant, period: Duration) -> Option<Instant> {
    let mut next = previous.checked_add(period)?;
    let now = Instant::now();
    while next <= now {
        next = next.checked_add(period)?;
    }
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn ticks_repeatedly_until_cancelled() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let timer = ChunkTimer::spawn(Duration::from_millis(20), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(150));
        timer.cancel();
        let after_cancel = ticks.load(Ordering::SeqCst);
        assert!(after_cancel >= 2, "expected at least 2 ticks, got {}", after_cancel);

        thread::sleep(Duration::from_millis(60));
        assert_eq!(ticks.load(Ordering::SeqCst), after_cancel);
    }

    #[test]
    fn cancel_is_immediate_for_long_periods() {
        let timer = ChunkTimer::spawn(Duration::from_secs(3600), || {}).unwrap();
        let started = Instant::now();
        timer.cancel();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn period_beyond_the_clock_never_ticks() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let timer = ChunkTimer::spawn(Duration::MAX, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        thread::sleep(Duration::from_millis(30));
        timer.cancel();
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn next_deadline_skips_missed_ticks() {
        let period = Duration::from_millis(10);
        let long_ago = Instant::now() - Duration::from_millis(95);
        let next = next_deadline(long_ago, period).unwrap();
        assert!(next > Instant::now() - Duration::from_millis(1));
        assert!(next <= Instant::now() + period);
        assert_eq!(next_deadline(Instant::now(), Duration::MAX), None);
    }

    #[test]
    fn external_signal_stops_the_thread() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let timer = ChunkTimer::spawn(Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        let signal = timer.signal();
        signal.cancel();
        assert!(signal.is_cancelled());
        thread::sleep(Duration::from_millis(50));
        let seen = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
        drop(timer);
    }

    #[test]
    fn rejects_zero_period() {
        assert!(ChunkTimer::spawn(Duration::ZERO, || {}).is_err());
    }
}
