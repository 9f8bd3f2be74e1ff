//! Debounced background saves.
//!
//! Every call to [`Debouncer::schedule`] supersedes the previous one, so a
//! burst of edits produces a single save once the window has passed with no
//! further edits. Superseded tasks wake up, notice a newer generation and
//! exit without running their job. Jobs that do run are serialized, which
//! makes the store last-write-wins.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct Debouncer {
    window: Duration,
    generation: Arc<AtomicU64>,
    running: Arc<Mutex<()>>,
    shutdown: CancellationToken,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            generation: Arc::new(AtomicU64::new(0)),
            running: Arc::new(Mutex::new(())),
            shutdown: CancellationToken::new(),
        }
    }

    /// Run `job` once `window` elapses without another call to `schedule`.
    pub fn schedule<F, Fut>(&self, job: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return;
        }
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = self.generation.clone();
        let running = self.running.clone();
        let shutdown = self.shutdown.clone();
        let window = self.window;

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(window) => {}
            }
            let _guard = running.lock().await;
            if generation.load(Ordering::SeqCst) != ticket {
                debug!("Debounced job {ticket} superseded");
                return;
            }
            job().await;
        });
    }

    /// Drop the pending job, if any. Later calls to `schedule` still work.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Drop the pending job and wait for one already running to finish.
    pub async fn cancel_and_wait(&self) {
        self.cancel();
        let _guard = self.running.lock().await;
    }

    /// Cancel the pending job and refuse new ones.
    pub fn shutdown(&self) {
        self.cancel();
        self.shutdown.cancel();
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn bump(count: &Arc<AtomicUsize>) -> impl (FnOnce() -> std::future::Ready<()>) + Send + 'static {
        let count = count.clone();
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_calls_runs_the_job_once() {
        let debouncer = Debouncer::new(Duration::from_secs(1));
        let runs = counter();
        for _ in 0..10 {
            debouncer.schedule(bump(&runs));
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_quiet_periods_run_separately() {
        let debouncer = Debouncer::new(Duration::from_secs(1));
        let runs = counter();
        debouncer.schedule(bump(&runs));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        debouncer.schedule(bump(&runs));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_pending_job() {
        let debouncer = Debouncer::new(Duration::from_secs(1));
        let runs = counter();
        debouncer.schedule(bump(&runs));
        debouncer.cancel();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        debouncer.schedule(bump(&runs));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_and_wait_outlasts_a_running_job() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = done.clone();
        debouncer.schedule(move || async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            flag.store(true, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!done.load(Ordering::SeqCst));

        debouncer.cancel_and_wait().await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_refuses_new_jobs() {
        let debouncer = Debouncer::new(Duration::from_secs(1));
        let runs = counter();
        debouncer.schedule(bump(&runs));
        debouncer.shutdown();
        debouncer.schedule(bump(&runs));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
