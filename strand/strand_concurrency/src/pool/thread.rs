//! Thread pool implementation for deferred work.
//!
//! A [`TaskExecutor`] owns a fixed set of worker threads that pull tasks
//! from one shared FIFO queue. Each submission returns a [`TaskFuture`]
//! carrying the body's result, its panic, or the reason it never ran.
//! Tasks may carry an expiry: a task whose deadline has passed by the
//! time a worker dequeues it is skipped rather than run late.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};
use log::{debug, error, info, trace, warn};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::VecDeque;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use strand_core::utils::clock::{self, Clock, SystemClock};
use thiserror::Error;

/// Error returned by executor lifecycle and submission calls
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// Workers are already running
    #[error("executor workers are already running")]
    AlreadyStarted,

    /// The executor has been stopped and cannot accept work or restart
    #[error("executor has been stopped")]
    Stopped,

    /// The configured worker count is zero
    #[error("worker count must be at least 1")]
    NoWorkers,

    /// A worker thread could not be spawned
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Why a task produced no value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task's deadline passed before a worker picked it up
    #[error("task expired before it was dequeued")]
    Expired,

    /// The task body panicked
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The executor stopped before the task was dequeued
    #[error("task was abandoned when the executor stopped")]
    Abandoned,
}

/// Statistics about the executor
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExecutorStats {
    /// Tasks accepted by `submit`
    pub submitted: usize,

    /// Tasks whose body ran to completion
    pub completed: usize,

    /// Tasks skipped because their deadline had passed
    pub expired: usize,

    /// Tasks whose body panicked
    pub panicked: usize,

    /// Tasks dropped from the queue by `stop(false)`
    pub abandoned: usize,
}

/// Configuration for the executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Number of worker threads started by `start`
    pub threads: usize,

    /// Name prefix for worker threads
    pub thread_name_prefix: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            thread_name_prefix: "strand-worker".to_string(),
        }
    }
}

/// What happened when a worker ran a task
enum Outcome {
    Completed,
    Expired,
    Panicked(String),
}

/// Task with metadata for tracking
struct Task {
    /// Submission sequence number, for logs
    seq: u64,

    /// Absolute deadline in epoch milliseconds; 0 = never expires
    expire_at_ms: i64,

    /// Runs the body (or reports expiry when passed `true`) and
    /// delivers the result to the future
    run: Box<dyn FnOnce(bool) -> Outcome + Send + 'static>,

    /// When the task was enqueued
    enqueued_at: Instant,
}

/// State guarded by the executor lock
#[derive(Default)]
struct Queue {
    tasks: VecDeque<Task>,
    terminate: bool,
    in_flight: usize,
}

impl Queue {
    fn is_idle(&self) -> bool {
        self.tasks.is_empty() && self.in_flight == 0
    }
}

#[derive(Default)]
struct Counters {
    submitted: AtomicUsize,
    completed: AtomicUsize,
    expired: AtomicUsize,
    panicked: AtomicUsize,
    abandoned: AtomicUsize,
}

/// State shared between the executor handle and its workers
struct Shared {
    queue: Mutex<Queue>,

    /// Signalled when a task is queued or terminate is set
    available: Condvar,

    /// Signalled when the queue is empty and nothing is in flight
    idle: Condvar,

    clock: Arc<dyn Clock>,
    next_seq: AtomicU64,
    counters: Counters,
}

impl Shared {
    /// Block until a task is available, or return `None` once the
    /// executor is terminating and the queue is empty.
    fn next_task(&self) -> Option<Task> {
        let mut queue = self.queue.lock();
        loop {
            if let Some(task) = queue.tasks.pop_front() {
                queue.in_flight += 1;
                return Some(task);
            }
            if queue.terminate {
                return None;
            }
            self.available.wait(&mut queue);
        }
    }

    fn run_task(&self, worker: usize, task: Task) {
        let now = self.clock.now_ms();
        let expired = clock::is_expired(task.expire_at_ms, now);

        trace!(
            "Worker {}: running task #{} (queue time: {:.2}ms)",
            worker,
            task.seq,
            task.enqueued_at.elapsed().as_micros() as f64 / 1000.0
        );

        match (task.run)(expired) {
            Outcome::Completed => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Expired => {
                warn!(
                    "Worker {}: task #{} expired {}ms before dequeue, skipping",
                    worker,
                    task.seq,
                    now - task.expire_at_ms
                );
                self.counters.expired.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Panicked(message) => {
                error!("Worker {}: task #{} panicked: {}", worker, task.seq, message);
                self.counters.panicked.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut queue = self.queue.lock();
        queue.in_flight -= 1;
        if queue.is_idle() {
            self.idle.notify_all();
        }
    }
}

struct Workers {
    handles: Vec<JoinHandle<()>>,
    config: ExecutorConfig,
    started: bool,
    stopped: bool,
}

/// A fixed-size pool of worker threads draining one FIFO task queue
pub struct TaskExecutor {
    shared: Arc<Shared>,
    workers: Mutex<Workers>,
}

impl TaskExecutor {
    /// Create an executor with `threads` workers. Workers are not
    /// spawned until [`start`](Self::start).
    pub fn new(threads: usize) -> Self {
        let config = ExecutorConfig {
            threads,
            ..Default::default()
        };
        Self::with_config(config)
    }

    /// Create an executor with the specified configuration
    pub fn with_config(config: ExecutorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an executor that reads task deadlines from `clock`
    pub fn with_clock(config: ExecutorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue::default()),
                available: Condvar::new(),
                idle: Condvar::new(),
                clock,
                next_seq: AtomicU64::new(1),
                counters: Counters::default(),
            }),
            workers: Mutex::new(Workers {
                handles: Vec::new(),
                config,
                started: false,
                stopped: false,
            }),
        }
    }

    /// Change the worker count. Only valid before `start`.
    pub fn configure(&self, threads: usize) -> Result<(), ExecutorError> {
        let mut workers = self.workers.lock();
        if workers.stopped {
            return Err(ExecutorError::Stopped);
        }
        if workers.started {
            return Err(ExecutorError::AlreadyStarted);
        }
        workers.config.threads = threads;
        Ok(())
    }

    /// Spawn the worker threads.
    ///
    /// If a thread cannot be spawned, the workers already running are
    /// stopped and the executor is left in the stopped state.
    pub fn start(&self) -> Result<(), ExecutorError> {
        let mut workers = self.workers.lock();
        if workers.stopped {
            return Err(ExecutorError::Stopped);
        }
        if workers.started {
            return Err(ExecutorError::AlreadyStarted);
        }
        if workers.config.threads == 0 {
            return Err(ExecutorError::NoWorkers);
        }

        info!(
            "Starting executor with {} workers ({} tasks already queued)",
            workers.config.threads,
            self.pending_count()
        );

        for id in 0..workers.config.threads {
            let thread_name = format!("{}-{}", workers.config.thread_name_prefix, id);
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(thread_name)
                .spawn(move || worker_loop(id, shared));

            match spawned {
                Ok(handle) => workers.handles.push(handle),
                Err(e) => {
                    error!("Failed to spawn worker {}: {}", id, e);
                    workers.stopped = true;
                    let handles = mem::take(&mut workers.handles);
                    drop(workers);
                    self.terminate(false, !handles.is_empty());
                    join_workers(handles);
                    return Err(ExecutorError::Spawn(e));
                }
            }
        }

        workers.started = true;
        Ok(())
    }

    /// Queue `body` with no deadline.
    pub fn submit<F, T>(&self, body: F) -> Result<TaskFuture<T>, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit_with_timeout(0, body)
    }

    /// Queue `body`; if `timeout_ms > 0` the task is skipped when no
    /// worker dequeues it within `timeout_ms` milliseconds.
    ///
    /// Never blocks. Fails only once the executor has been stopped.
    pub fn submit_with_timeout<F, T>(
        &self,
        timeout_ms: u64,
        body: F,
    ) -> Result<TaskFuture<T>, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (sender, receiver) = bounded(1);
        let expire_at_ms = clock::deadline_after(self.shared.clock.now_ms(), timeout_ms);

        let run = Box::new(move |expired: bool| {
            if expired {
                let _ = sender.send(Err(TaskError::Expired));
                return Outcome::Expired;
            }
            match panic::catch_unwind(AssertUnwindSafe(body)) {
                Ok(value) => {
                    let _ = sender.send(Ok(value));
                    Outcome::Completed
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    let _ = sender.send(Err(TaskError::Panicked(message.clone())));
                    Outcome::Panicked(message)
                }
            }
        });

        let mut queue = self.shared.queue.lock();
        if queue.terminate {
            return Err(ExecutorError::Stopped);
        }
        let seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed);
        queue.tasks.push_back(Task {
            seq,
            expire_at_ms,
            run,
            enqueued_at: Instant::now(),
        });
        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        self.shared.available.notify_one();

        Ok(TaskFuture { receiver })
    }

    /// Block until the queue is empty and no task is running.
    ///
    /// A negative `timeout_ms` waits indefinitely. Returns `false` if the
    /// timeout elapsed first. Calling this from inside a task body with a
    /// negative timeout never returns, since the caller is itself in flight.
    pub fn drain(&self, timeout_ms: i64) -> bool {
        let mut queue = self.shared.queue.lock();

        if timeout_ms < 0 {
            while !queue.is_idle() {
                self.shared.idle.wait(&mut queue);
            }
            return true;
        }

        let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);
        while !queue.is_idle() {
            if self
                .shared
                .idle
                .wait_until(&mut queue, deadline)
                .timed_out()
            {
                return queue.is_idle();
            }
        }
        true
    }

    /// Stop the workers and join them.
    ///
    /// With `drain_pending` the workers first run everything still queued;
    /// without it the backlog is dropped and its futures resolve to
    /// [`TaskError::Abandoned`]. Tasks already running always finish.
    /// Calling `stop` again is a no-op.
    pub fn stop(&self, drain_pending: bool) {
        let handles = {
            let mut workers = self.workers.lock();
            if workers.stopped {
                return;
            }
            workers.stopped = true;
            mem::take(&mut workers.handles)
        };

        info!(
            "Stopping executor ({} workers, drain_pending={})",
            handles.len(),
            drain_pending
        );
        self.terminate(drain_pending, !handles.is_empty());
        join_workers(handles);
        info!("Executor stopped");
    }

    /// Set terminate and, unless the backlog is to be drained by live
    /// workers, drop it.
    fn terminate(&self, drain_pending: bool, have_workers: bool) {
        let abandoned = {
            let mut queue = self.shared.queue.lock();
            queue.terminate = true;
            let abandoned = if drain_pending && have_workers {
                VecDeque::new()
            } else {
                mem::take(&mut queue.tasks)
            };
            self.shared.available.notify_all();
            if queue.is_idle() {
                self.shared.idle.notify_all();
            }
            abandoned
        };

        if !abandoned.is_empty() {
            warn!("Abandoning {} queued tasks", abandoned.len());
            self.shared
                .counters
                .abandoned
                .fetch_add(abandoned.len(), Ordering::Relaxed);
        }
        // Dropping the tasks drops their senders, resolving the futures.
        drop(abandoned);
    }

    /// Number of live worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.lock().handles.len()
    }

    /// Number of tasks waiting to be dequeued
    pub fn pending_count(&self) -> usize {
        self.shared.queue.lock().tasks.len()
    }

    /// Number of tasks currently running
    pub fn in_flight_count(&self) -> usize {
        self.shared.queue.lock().in_flight
    }

    /// Whether `stop` has been called
    pub fn is_stopped(&self) -> bool {
        self.workers.lock().stopped
    }

    /// Get current statistics for the executor
    pub fn stats(&self) -> ExecutorStats {
        let counters = &self.shared.counters;
        ExecutorStats {
            submitted: counters.submitted.load(Ordering::Relaxed),
            completed: counters.completed.load(Ordering::Relaxed),
            expired: counters.expired.load(Ordering::Relaxed),
            panicked: counters.panicked.load(Ordering::Relaxed),
            abandoned: counters.abandoned.load(Ordering::Relaxed),
        }
    }
}

impl Drop for TaskExecutor {
    fn drop(&mut self) {
        self.stop(false);
    }
}

/// Worker thread main loop
fn worker_loop(id: usize, shared: Arc<Shared>) {
    debug!("Worker {}: starting", id);
    while let Some(task) = shared.next_task() {
        shared.run_task(id, task);
    }
    debug!("Worker {}: exiting", id);
}

fn join_workers(handles: Vec<JoinHandle<()>>) {
    let current = thread::current().id();
    for (id, handle) in handles.into_iter().enumerate() {
        // stop() called from a task body: the calling worker exits on its own.
        if handle.thread().id() == current {
            continue;
        }
        if handle.join().is_err() {
            error!("Worker {} panicked during shutdown", id);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<unknown panic>".to_string()
    }
}

/// The pending result of a submitted task
#[must_use = "a task's result is only observable through its future"]
pub struct TaskFuture<T> {
    receiver: Receiver<Result<T, TaskError>>,
}

impl<T> TaskFuture<T> {
    /// Block until the task has run, been skipped, or been abandoned
    pub fn wait(self) -> Result<T, TaskError> {
        self.receiver.recv().unwrap_or(Err(TaskError::Abandoned))
    }

    /// Wait up to `timeout`; `None` if the task has not finished yet.
    ///
    /// The result is handed out once; later calls report
    /// [`TaskError::Abandoned`].
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T, TaskError>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(TaskError::Abandoned)),
        }
    }

    /// Non-blocking check; `None` if the task has not finished yet
    pub fn try_get(&self) -> Option<Result<T, TaskError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(TaskError::Abandoned)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use strand_core::utils::clock::ManualClock;

    fn started(threads: usize) -> TaskExecutor {
        let executor = TaskExecutor::new(threads);
        executor.start().unwrap();
        executor
    }

    #[test]
    fn test_executor_basic() {
        let executor = started(4);
        let future = executor.submit(|| 21 * 2).unwrap();
        assert_eq!(future.wait(), Ok(42));
        assert_eq!(executor.worker_count(), 4);
    }

    #[test]
    fn test_configure_only_before_start() {
        let executor = TaskExecutor::new(1);
        executor.configure(3).unwrap();
        executor.start().unwrap();
        assert_eq!(executor.worker_count(), 3);

        assert!(matches!(executor.configure(5), Err(ExecutorError::AlreadyStarted)));
        assert!(matches!(executor.start(), Err(ExecutorError::AlreadyStarted)));
        assert_eq!(executor.worker_count(), 3);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let executor = TaskExecutor::new(0);
        assert!(matches!(executor.start(), Err(ExecutorError::NoWorkers)));
    }

    #[test]
    fn test_drain_resolves_every_future() {
        for threads in 1..=4 {
            let executor = started(threads);
            let counter = Arc::new(AtomicUsize::new(0));

            let futures: Vec<_> = (0..20)
                .map(|i| {
                    let counter = Arc::clone(&counter);
                    executor
                        .submit(move || {
                            thread::sleep(Duration::from_millis(2));
                            counter.fetch_add(1, Ordering::SeqCst);
                            i
                        })
                        .unwrap()
                })
                .collect();

            assert!(executor.drain(-1));
            assert_eq!(counter.load(Ordering::SeqCst), 20);
            assert_eq!(executor.pending_count(), 0);
            for (i, future) in futures.iter().enumerate() {
                assert_eq!(future.try_get(), Some(Ok(i)));
            }
        }
    }

    #[test]
    fn test_drain_timeout_then_complete() {
        let executor = started(2);
        let a = executor.submit(|| "a").unwrap();
        let b = executor
            .submit(|| {
                thread::sleep(Duration::from_millis(50));
                "b"
            })
            .unwrap();
        let c = executor.submit(|| "c").unwrap();

        assert!(!executor.drain(10));
        assert!(executor.drain(-1));

        assert_eq!(a.wait(), Ok("a"));
        assert_eq!(b.wait(), Ok("b"));
        assert_eq!(c.wait(), Ok("c"));
    }

    #[test]
    fn test_drain_on_idle_executor() {
        let executor = started(1);
        assert!(executor.drain(0));
        assert!(executor.drain(-1));
    }

    #[test]
    fn test_expired_task_is_skipped() {
        let executor = started(1);
        let ran = Arc::new(AtomicBool::new(false));

        let blocker = executor
            .submit(|| thread::sleep(Duration::from_millis(100)))
            .unwrap();

        let ran_clone = Arc::clone(&ran);
        let late = executor
            .submit_with_timeout(20, move || ran_clone.store(true, Ordering::SeqCst))
            .unwrap();

        assert_eq!(blocker.wait(), Ok(()));
        assert_eq!(late.wait(), Err(TaskError::Expired));
        assert!(!ran.load(Ordering::SeqCst));
        assert!(executor.drain(-1));
        assert_eq!(executor.stats().expired, 1);
    }

    #[test]
    fn test_expiry_uses_injected_clock() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let config = ExecutorConfig {
            threads: 1,
            ..Default::default()
        };
        let executor = TaskExecutor::with_clock(config, clock.clone());

        let fresh = executor.submit_with_timeout(500, || "fresh").unwrap();
        let stale = executor.submit_with_timeout(10, || "stale").unwrap();
        let forever = executor.submit(|| "forever").unwrap();

        clock.advance(100);
        executor.start().unwrap();

        assert_eq!(fresh.wait(), Ok("fresh"));
        assert_eq!(stale.wait(), Err(TaskError::Expired));
        assert_eq!(forever.wait(), Ok("forever"));
    }

    #[test]
    fn test_panic_is_contained() {
        let executor = started(1);

        let failing = executor
            .submit(|| -> u32 { panic!("This task should panic") })
            .unwrap();
        let next = executor.submit(|| 7).unwrap();

        assert_eq!(
            failing.wait(),
            Err(TaskError::Panicked("This task should panic".to_string()))
        );
        assert_eq!(next.wait(), Ok(7));
        assert!(executor.drain(-1));

        let stats = executor.stats();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(executor.worker_count(), 1);
    }

    #[test]
    fn test_fifo_dequeue_order() {
        let executor = started(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let order = Arc::clone(&order);
            executor.submit(move || order.lock().push(i)).unwrap();
        }

        assert!(executor.drain(-1));
        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_submit_before_start_runs_after_start() {
        let executor = TaskExecutor::new(2);
        let future = executor.submit(|| "queued").unwrap();
        assert_eq!(executor.pending_count(), 1);
        assert!(future.wait_timeout(Duration::from_millis(20)).is_none());

        executor.start().unwrap();
        assert_eq!(future.wait(), Ok("queued"));
    }

    #[test]
    fn test_stop_abandons_backlog() {
        let executor = started(1);
        let (gate_tx, gate_rx) = unbounded::<()>();
        let (running_tx, running_rx) = unbounded::<()>();

        let blocker = executor
            .submit(move || {
                running_tx.send(()).unwrap();
                gate_rx.recv().unwrap();
                "finished"
            })
            .unwrap();
        running_rx.recv().unwrap();

        let queued: Vec<_> = (0..3).map(|i| executor.submit(move || i).unwrap()).collect();
        assert_eq!(executor.pending_count(), 3);

        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            gate_tx.send(()).unwrap();
        });

        executor.stop(false);
        releaser.join().unwrap();

        assert_eq!(blocker.wait(), Ok("finished"));
        for future in queued {
            assert_eq!(future.wait(), Err(TaskError::Abandoned));
        }
        assert_eq!(executor.stats().abandoned, 3);
        assert_eq!(executor.worker_count(), 0);
        assert!(matches!(executor.submit(|| ()), Err(ExecutorError::Stopped)));
        assert!(matches!(executor.start(), Err(ExecutorError::Stopped)));
    }

    #[test]
    fn test_stop_with_drain_runs_backlog() {
        let executor = started(1);
        let counter = Arc::new(AtomicUsize::new(0));

        let futures: Vec<_> = (0..5)
            .map(|_| {
                let counter = Arc::clone(&counter);
                executor
                    .submit(move || {
                        thread::sleep(Duration::from_millis(5));
                        counter.fetch_add(1, Ordering::SeqCst)
                    })
                    .unwrap()
            })
            .collect();

        executor.stop(true);

        assert_eq!(counter.load(Ordering::SeqCst), 5);
        for future in futures {
            assert!(future.wait().is_ok());
        }
        assert_eq!(executor.stats().abandoned, 0);
    }

    #[test]
    fn test_stop_before_start_abandons_queue() {
        let executor = TaskExecutor::new(2);
        let future = executor.submit(|| ()).unwrap();
        executor.stop(true);
        assert_eq!(future.wait(), Err(TaskError::Abandoned));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let executor = started(2);
        executor.stop(false);
        executor.stop(false);
        executor.stop(true);
        assert!(executor.is_stopped());
        assert!(executor.drain(0));
    }

    #[test]
    fn test_stop_from_task_body() {
        let executor = Arc::new(started(2));
        let inner = Arc::clone(&executor);

        let future = executor.submit(move || inner.stop(false)).unwrap();

        assert_eq!(future.wait(), Ok(()));
        assert!(executor.is_stopped());
    }

    #[test]
    fn test_stats_count_submissions() {
        let executor = started(2);
        for _ in 0..5 {
            executor.submit(|| ()).unwrap();
        }
        assert!(executor.drain(-1));

        let stats = executor.stats();
        assert_eq!(stats.submitted, 5);
        assert_eq!(stats.completed, 5);
        assert_eq!(stats.expired, 0);
    }
}
