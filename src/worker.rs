//! Background collector thread (C6).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::scheduler::Scheduler;

/// The single dedicated collector thread: wakes every tick period, asks the
/// scheduler to run automatic collection, and exits on shutdown.
pub(crate) struct Worker {
    shutdown: Arc<AtomicBool>,
    wake: Arc<(Mutex<()>, Condvar)>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    pub fn spawn(scheduler: Arc<Scheduler>, tick_period: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let wake = Arc::new((Mutex::new(()), Condvar::new()));

        let handle = {
            let shutdown = shutdown.clone();
            let wake = wake.clone();
            std::thread::Builder::new()
                .name("otter-gc-collector".to_string())
                .spawn(move || Self::run(scheduler, shutdown, wake, tick_period))
                .expect("failed to spawn the gc collector thread")
        };

        Self {
            shutdown,
            wake,
            handle: Mutex::new(Some(handle)),
        }
    }

    fn run(
        scheduler: Arc<Scheduler>,
        shutdown: Arc<AtomicBool>,
        wake: Arc<(Mutex<()>, Condvar)>,
        tick_period: Duration,
    ) {
        tracing::debug!(target: "otter_gc::worker", "collector thread started");
        loop {
            {
                let (lock, condvar) = &*wake;
                let mut guard = lock.lock();
                condvar.wait_for(&mut guard, tick_period);
            }

            if shutdown.load(Ordering::Acquire) {
                break;
            }

            scheduler.maybe_autocollect();
        }
        tracing::debug!(target: "otter_gc::worker", "collector thread shut down");
    }

    /// Signal shutdown and join the thread. Idempotent: calling this more
    /// than once (e.g. once explicitly and once from `Drop`) is harmless.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        let (lock, condvar) = &*self.wake;
        let _guard = lock.lock();
        condvar.notify_all();
        drop(_guard);

        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn worker_shuts_down_promptly_on_request() {
        let scheduler = Arc::new(Scheduler::new(Config::default()));
        let worker = Worker::spawn(scheduler, Duration::from_secs(3600));

        let start = std::time::Instant::now();
        worker.shutdown();
        // Shutdown must not wait out the (long) tick period.
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn worker_ticks_trigger_autocollect() {
        let scheduler = Arc::new(Scheduler::new(Config::default()));
        scheduler.configure(1, 1_000_000, 0.0, 2.0);
        let _address = scheduler.allocate(64, true, None).unwrap();

        let worker = Worker::spawn(scheduler.clone(), Duration::from_millis(20));
        std::thread::sleep(Duration::from_millis(200));
        worker.shutdown();

        assert!(scheduler.collections_count() >= 1);
    }
}
