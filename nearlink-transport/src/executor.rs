//! Concurrency primitives (§5): dedicated OS threads rather than an async
//! runtime, per §9's "coroutine/blocking I/O" design note. Named and shaped
//! after the teacher's `s2n_quic_dc::task` executor split (one single-thread
//! executor for callback ordering, a shared bounded pool for per-endpoint
//! loops) but built on `std::thread` + `crossbeam_channel` instead of
//! `tokio`, since the spec mandates blocking reader/writer loops.

use crossbeam_channel::{bounded, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs one at a time, in submission order, on a single dedicated
/// thread. Used for a `ClientProxy`'s application-callback queue (§5:
/// "preserves callback ordering per-session") and for per-endpoint
/// state-transition work.
pub struct SingleThreadExecutor {
    sender: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl SingleThreadExecutor {
    pub fn new(name: impl Into<String>) -> Self {
        let (sender, receiver) = bounded::<Job>(256);
        let handle = std::thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                for job in receiver {
                    job();
                }
            })
            .expect("failed to spawn executor thread");
        Self { sender: Some(sender), handle: Some(handle) }
    }

    /// Enqueues `job`. Silently dropped if the executor has already been
    /// shut down (mirrors a closed channel having no listener).
    pub fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(Box::new(job));
        }
    }
}

impl Drop for SingleThreadExecutor {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// A shared, bounded pool of worker threads, used for the per-endpoint
/// reader-loop pool and writer-loop pool (§5): one logical task per
/// endpoint, but a bounded number of OS threads serve them.
pub struct BoundedExecutor {
    sender: Sender<Job>,
    _handles: Vec<JoinHandle<()>>,
}

impl BoundedExecutor {
    pub fn new(name: impl Into<String>, worker_count: usize) -> Self {
        let name = name.into();
        let (sender, receiver) = bounded::<Job>(1024);
        let handles = (0..worker_count.max(1))
            .map(|i| {
                let receiver = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("{name}-{i}"))
                    .spawn(move || {
                        for job in receiver {
                            job();
                        }
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();
        Self { sender, _handles: handles }
    }

    pub fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        let _ = self.sender.send(Box::new(job));
    }
}

/// Fires a closure once after `delay`, or repeatedly every `interval`,
/// both on their own thread. Backs keep-alive timers and BWU backoff (§5).
pub struct ScheduledTask {
    handle: Option<JoinHandle<()>>,
    cancel: Sender<()>,
}

impl ScheduledTask {
    pub fn periodic(interval: Duration, mut job: impl FnMut() + Send + 'static) -> Self {
        let (cancel, canceled) = bounded::<()>(0);
        let handle = std::thread::spawn(move || loop {
            match canceled.recv_timeout(interval) {
                Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => job(),
            }
        });
        Self { handle: Some(handle), cancel }
    }

    pub fn after(delay: Duration, job: impl FnOnce() + Send + 'static) -> Self {
        let (cancel, canceled) = bounded::<()>(0);
        let handle = std::thread::spawn(move || {
            if canceled.recv_timeout(delay) == Err(crossbeam_channel::RecvTimeoutError::Timeout) {
                job();
            }
        });
        Self { handle: Some(handle), cancel }
    }

    /// Stops the task; idempotent.
    pub fn cancel(&self) {
        let _ = self.cancel.send(());
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn single_thread_executor_runs_jobs_in_order() {
        let executor = SingleThreadExecutor::new("test");
        let observed = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for i in 0..5 {
            let observed = Arc::clone(&observed);
            executor.spawn(move || observed.lock().push(i));
        }
        drop(executor);
        assert_eq!(*observed.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn bounded_executor_runs_every_job() {
        let executor = BoundedExecutor::new("pool", 4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            executor.spawn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        drop(executor);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn scheduled_task_after_fires_once_if_not_canceled() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        let task = ScheduledTask::after(Duration::from_millis(10), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        std::thread::sleep(Duration::from_millis(40));
        drop(task);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scheduled_task_after_is_a_no_op_if_canceled_first() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        let task = ScheduledTask::after(Duration::from_millis(50), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        task.cancel();
        drop(task);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
