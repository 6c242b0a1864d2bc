use crate::backup::glacier::job::{JobContext, JobStatus, UploadJob};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub static DEFAULT_THREADS: usize = 4;

/// State shared by the coordinator and its workers.
#[derive(Default)]
struct Shared {
    queue: Mutex<VecDeque<UploadJob>>,
    abort: AtomicBool,
    sent: AtomicU64,
    active: AtomicUsize,
    began: OnceLock<Instant>,
}

impl Shared {
    fn pop(&self) -> Option<UploadJob> {
        if self.abort.load(Ordering::SeqCst) {
            return None;
        }
        // A worker that panicked mid-job never holds this lock, so poisoning only
        // means the queue itself was left consistent.
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.pop_front()
    }

    fn worker(&self, ctx: &JobContext) {
        let _retire = Retire(self);
        while let Some(mut job) = self.pop() {
            match job.run(ctx) {
                JobStatus::Done => {
                    self.sent.fetch_add(job.size(), Ordering::SeqCst);
                }
                status => {
                    debug_assert!(status.is_terminal());
                    tracing::error!(
                        "Part {} at offset {} failed, stopping upload",
                        job.index(),
                        job.offset()
                    );
                    self.abort.store(true, Ordering::SeqCst);
                    break;
                }
            }
        }
    }
}

/// Retires a worker on every exit path, unwinding included.
struct Retire<'a>(&'a Shared);

impl Drop for Retire<'_> {
    fn drop(&mut self) {
        // Raised before the count drops so `is_done` never races ahead of it.
        if std::thread::panicking() {
            tracing::error!("Upload worker panicked, stopping upload");
            self.0.abort.store(true, Ordering::SeqCst);
        }
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Drives a fixed pool of worker threads over one queue of part uploads.
///
/// All jobs are queued before [`start`](Self::start). Workers pop until the
/// queue is empty or a job has failed; a failed job sets the abort flag, which
/// stops further pops but never interrupts jobs already running.
pub struct UploadCoordinator {
    threads: usize,
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

impl UploadCoordinator {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
            shared: Arc::new(Shared::default()),
            handles: Vec::new(),
        }
    }

    /// Queues a job. Refused once the upload has been aborted.
    pub fn add(&self, job: UploadJob) -> bool {
        if self.abort_requested() {
            return false;
        }
        self.shared
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(job);
        true
    }

    pub fn queued(&self) -> usize {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn start(&mut self, ctx: Arc<JobContext>) -> Result<()> {
        let _ = self.shared.began.set(Instant::now());
        tracing::debug!(
            "Starting {} upload workers for {} parts",
            self.threads,
            self.queued()
        );
        for i in 0..self.threads {
            let shared = self.shared.clone();
            let ctx = ctx.clone();
            self.shared.active.fetch_add(1, Ordering::SeqCst);
            let spawned = std::thread::Builder::new()
                .name(format!("upload-worker-{i}"))
                .spawn(move || shared.worker(&ctx));
            match spawned {
                Ok(handle) => self.handles.push(handle),
                Err(e) => {
                    self.shared.active.fetch_sub(1, Ordering::SeqCst);
                    self.shared.abort.store(true, Ordering::SeqCst);
                    return Err(Error::from(e));
                }
            }
        }
        Ok(())
    }

    /// True once every worker has retired, whether or not the upload succeeded.
    pub fn is_done(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst) == 0
    }

    pub fn abort_requested(&self) -> bool {
        self.shared.abort.load(Ordering::SeqCst)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.shared.sent.load(Ordering::SeqCst)
    }

    /// Time since [`start`](Self::start), never less than one second.
    pub fn elapsed(&self) -> Duration {
        self.shared
            .began
            .get()
            .map(Instant::elapsed)
            .unwrap_or_default()
            .max(Duration::from_secs(1))
    }

    /// Waits for all workers to retire and reports whether every part made it.
    ///
    /// Jobs still queued after an abort are dropped here, releasing them.
    pub fn finish(mut self) -> Result<bool> {
        let panics = self
            .handles
            .drain(..)
            .filter_map(|handle| {
                let name = handle.thread().name().unwrap_or("upload-worker").to_string();
                handle.join().err().map(|_| Error::worker_panicked(name))
            })
            .collect::<Vec<_>>();
        if !panics.is_empty() {
            self.shared.abort.store(true, Ordering::SeqCst);
            return Err(panics.into());
        }

        let leftover = std::mem::take(
            &mut *self.shared.queue.lock().unwrap_or_else(|e| e.into_inner()),
        );
        if !leftover.is_empty() {
            tracing::debug!("Discarding {} queued parts", leftover.len());
        }
        Ok(!self.abort_requested())
    }
}
