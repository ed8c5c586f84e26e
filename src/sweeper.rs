//! Background expiry sweeper.
//!
//! One thread per cache, woken on a timer. Each round visits every
//! bucket once and removes expired entries in bounded batches; the
//! per-bucket budget caps worst-case lock hold time. A round that
//! exhausts its budget anywhere signals a backlog, and the next sleep
//! shortens from the base interval to the minimum interval.
//!
//! Cancellation is cooperative: [`SweepSignal::stop`] flips a flag and
//! notifies the condvar the thread sleeps on, so the thread observes the
//! stop at its next wakeup without waiting out the full interval.
//! `stop` never joins (it is safe to call from inside a removal
//! callback), while dropping the [`Sweeper`] joins the thread so it
//! cannot outlive the cache that owns it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Cooperative cancellation shared between a cache and its sweeper.
#[derive(Debug, Default)]
pub(crate) struct SweepSignal {
    stopped: AtomicBool,
    lock: Mutex<()>,
    condvar: Condvar,
}

impl SweepSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Signals the sweeper to stop. Idempotent; never blocks on the
    /// sweeper thread.
    pub(crate) fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            let _guard = self.lock.lock();
            self.condvar.notify_all();
        }
    }

    /// Returns `true` once [`stop`](Self::stop) has been called.
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Sleeps for `timeout` or until stopped, whichever comes first.
    ///
    /// Returns `true` if the signal was stopped.
    fn wait(&self, timeout: Duration) -> bool {
        let mut guard = self.lock.lock();
        if self.stopped.load(Ordering::SeqCst) {
            return true;
        }
        let _ = self.condvar.wait_for(&mut guard, timeout);
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Handle to the background sweeper thread.
#[derive(Debug)]
pub(crate) struct Sweeper {
    signal: Arc<SweepSignal>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Spawns the sweeper loop.
    ///
    /// `round` performs one sweep pass over all buckets and returns
    /// `true` when it exhausted a deletion budget, in which case the
    /// next sleep uses `min_interval` instead of `interval`.
    pub(crate) fn spawn(
        interval: Duration,
        min_interval: Duration,
        mut round: impl FnMut() -> bool + Send + 'static,
    ) -> Self {
        let signal = Arc::new(SweepSignal::new());
        let thread_signal = Arc::clone(&signal);
        let handle = std::thread::Builder::new()
            .name("ttlkit-sweeper".to_string())
            .spawn(move || {
                let mut backlog = false;
                loop {
                    let timeout = if backlog { min_interval } else { interval };
                    if thread_signal.wait(timeout) {
                        break;
                    }
                    backlog = round();
                }
            })
            .expect("failed to spawn sweeper thread");

        Self {
            signal,
            handle: Some(handle),
        }
    }

    pub(crate) fn stop(&self) {
        self.signal.stop();
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.signal.is_stopped()
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.signal.stop();
        if let Some(handle) = self.handle.take() {
            // A panicking callback poisons nothing; ignore its unwind.
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[test]
    fn sweeper_runs_rounds_until_stopped() {
        let rounds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&rounds);
        let sweeper = Sweeper::spawn(Duration::from_millis(5), Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        });

        std::thread::sleep(Duration::from_millis(60));
        sweeper.stop();
        let observed = rounds.load(Ordering::SeqCst);
        assert!(observed > 0, "sweeper never ran");

        std::thread::sleep(Duration::from_millis(30));
        let after_stop = rounds.load(Ordering::SeqCst);
        // At most one in-flight round after the stop signal.
        assert!(after_stop <= observed + 1);
    }

    #[test]
    fn stop_is_idempotent_and_observable() {
        let sweeper = Sweeper::spawn(Duration::from_secs(3600), Duration::from_secs(3600), || false);
        assert!(!sweeper.is_stopped());
        sweeper.stop();
        sweeper.stop();
        assert!(sweeper.is_stopped());
    }

    #[test]
    fn stop_interrupts_a_long_sleep() {
        let sweeper = Sweeper::spawn(Duration::from_secs(3600), Duration::from_secs(3600), || false);
        let start = Instant::now();
        sweeper.stop();
        drop(sweeper); // joins the thread
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn backlog_shortens_the_sleep() {
        let rounds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&rounds);
        let sweeper = Sweeper::spawn(
            Duration::from_millis(10),
            Duration::from_millis(1),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            },
        );

        std::thread::sleep(Duration::from_millis(100));
        sweeper.stop();
        // With a 10ms base and 1ms backlog interval, well over 10 rounds
        // fit into 100ms only if the backlog path is taken.
        assert!(rounds.load(Ordering::SeqCst) > 10);
    }
}
