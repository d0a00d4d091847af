//! Bounded-concurrency batch scheduler.

use super::job::Job;
use crate::Error;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const DEFAULT_BATCH_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerStats {
    pub batches: u64,
    pub succeeded: u64,
    pub failed: u64,
}

struct Shared {
    batch_size: usize,
    queue: Mutex<VecDeque<Job>>,
    draining: AtomicBool,
    batches: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl Shared {
    fn queue(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_batch(&self) -> Vec<Job> {
        let mut queue = self.queue();
        let n = self.batch_size.min(queue.len());
        queue.drain(..n).collect()
    }

    /// Drain loop. Exactly one instance runs while `draining` is set.
    async fn drain(self: Arc<Self>) {
        loop {
            let batch = self.next_batch();
            if batch.is_empty() {
                self.draining.store(false, Ordering::SeqCst);
                // An enqueue may have raced the flag reset; reclaim the cycle if so.
                if self.queue().is_empty() || !self.try_claim() {
                    return;
                }
                continue;
            }

            let index = self.batches.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(batch = index, size = batch.len(), "dispatching batch");

            let handles: Vec<_> = batch.into_iter().map(|job| tokio::spawn(job.run())).collect();
            for outcome in futures::future::join_all(handles).await {
                match outcome {
                    Ok(true) => self.succeeded.fetch_add(1, Ordering::SeqCst),
                    // A panicking provider drops its reply sender; the caller sees a runtime error.
                    Ok(false) | Err(_) => self.failed.fetch_add(1, Ordering::SeqCst),
                };
            }
        }
    }

    fn try_claim(&self) -> bool {
        self.draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// FIFO job queue drained in fixed-size batches.
///
/// - idle -> draining when a job is enqueued
/// - every job of a batch runs concurrently; the next batch starts only after
///   the whole current batch has settled
/// - draining -> idle once the queue is empty
///
/// One job's failure is delivered to that job's handle only.
#[derive(Clone)]
pub struct BatchScheduler {
    shared: Arc<Shared>,
}

impl BatchScheduler {
    /// `batch_size` below 1 is treated as 1.
    pub fn new(batch_size: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                batch_size: batch_size.max(1),
                queue: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
                batches: AtomicU64::new(0),
                succeeded: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.shared.batch_size
    }

    /// Queue a job and start a drain cycle unless one is already running.
    ///
    /// Must be called from within a Tokio runtime; otherwise queued jobs fail
    /// with a runtime error.
    pub fn enqueue(&self, job: Job) {
        self.shared.queue().push_back(job);
        if !self.shared.try_claim() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(Arc::clone(&self.shared).drain());
            }
            Err(_) => {
                let stranded: Vec<Job> = self.shared.queue().drain(..).collect();
                self.shared.draining.store(false, Ordering::SeqCst);
                for job in stranded {
                    self.shared.failed.fetch_add(1, Ordering::SeqCst);
                    job.fail(Error::runtime("save() requires a running Tokio runtime"));
                }
            }
        }
    }

    pub fn is_draining(&self) -> bool {
        self.shared.draining.load(Ordering::SeqCst)
    }

    /// Jobs waiting for a batch slot (excludes the batch in flight).
    pub fn pending(&self) -> usize {
        self.shared.queue().len()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            batches: self.shared.batches.load(Ordering::SeqCst),
            succeeded: self.shared.succeeded.load(Ordering::SeqCst),
            failed: self.shared.failed.load(Ordering::SeqCst),
        }
    }
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl std::fmt::Debug for BatchScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScheduler")
            .field("batch_size", &self.batch_size())
            .field("pending", &self.pending())
            .field("draining", &self.is_draining())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::JobSnapshot;
    use crate::markup::MarkupOptions;
    use crate::provider::{AudioFormat, ProviderKind, TtsProvider};
    use crate::Result;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[derive(Debug, Clone, Default)]
    struct Recorder {
        events: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl TtsProvider for Recorder {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Cartesia
        }

        async fn save(
            &self,
            voice_id: &str,
            _text: &str,
            _format: AudioFormat,
            dir: &Path,
            file_name: &str,
        ) -> Result<PathBuf> {
            self.events.lock().unwrap().push(format!("start:{}", file_name));
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.events.lock().unwrap().push(format!("end:{}", file_name));
            if voice_id == "broken" {
                return Err(Error::provider("boom", "cartesia"));
            }
            Ok(dir.join(file_name))
        }

        fn snapshot(&self) -> Arc<dyn TtsProvider> {
            Arc::new(self.clone())
        }
    }

    fn snapshot(name: &str, voice: Option<&str>) -> JobSnapshot {
        JobSnapshot {
            text: "hello".to_string(),
            voice_id: voice.map(str::to_string),
            format: AudioFormat::Mp3,
            dir: PathBuf::from("/out"),
            file_name: format!("{}.mp3", name),
            markup: MarkupOptions::default(),
        }
    }

    #[test]
    fn test_batch_size_is_at_least_one() {
        assert_eq!(BatchScheduler::new(0).batch_size(), 1);
        assert_eq!(BatchScheduler::default().batch_size(), DEFAULT_BATCH_SIZE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drains_fifo_in_batches() {
        let recorder = Recorder::default();
        let scheduler = BatchScheduler::new(2);
        let mut handles = Vec::new();
        for i in 0..5 {
            let (job, handle) =
                Job::new(snapshot(&format!("j{}", i), Some("v")), recorder.snapshot());
            scheduler.enqueue(job);
            handles.push(handle);
        }
        assert!(scheduler.is_draining());
        assert_eq!(scheduler.pending(), 5);

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), PathBuf::from(format!("/out/j{}.mp3", i)));
        }

        let events = recorder.events.lock().unwrap().clone();
        let pos = |e: &str| events.iter().position(|x| x == e).unwrap();
        // j2 cannot start before both j0 and j1 have ended
        assert!(pos("start:j1.mp3") < pos("end:j0.mp3"));
        assert!(pos("start:j2.mp3") > pos("end:j0.mp3"));
        assert!(pos("start:j2.mp3") > pos("end:j1.mp3"));
        assert!(pos("start:j4.mp3") > pos("end:j3.mp3"));

        // let the drain loop observe the empty queue
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!scheduler.is_draining());
        assert_eq!(scheduler.stats().batches, 3);
        assert_eq!(scheduler.stats().succeeded, 5);
    }

    #[tokio::test]
    async fn test_missing_voice_is_rejected_before_provider() {
        let recorder = Recorder::default();
        let scheduler = BatchScheduler::default();
        let (job, handle) = Job::new(snapshot("a", None), recorder.snapshot());
        scheduler.enqueue(job);
        let err = handle.await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.field(), Some("ttsId"));
        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_enqueue_without_runtime_fails_job() {
        let recorder = Recorder::default();
        let scheduler = BatchScheduler::default();
        let (job, handle) = Job::new(snapshot("a", Some("v")), recorder.snapshot());
        scheduler.enqueue(job);
        assert!(!scheduler.is_draining());
        let err = futures::executor::block_on(handle).unwrap_err();
        assert_eq!(err.name(), "RuntimeError");
    }
}
