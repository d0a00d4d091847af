//! Queued synthesis jobs and their completion handles.

use crate::markup::{apply_markup, MarkupOptions};
use crate::provider::{AudioFormat, TtsProvider};
use crate::{Error, Result};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Value copy of the request settings taken when `save()` runs.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub text: String,
    pub voice_id: Option<String>,
    pub format: AudioFormat,
    pub dir: PathBuf,
    /// File name including extension.
    pub file_name: String,
    pub markup: MarkupOptions,
}

impl JobSnapshot {
    pub fn full_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Validate, apply markup for the provider and run the synthesis.
    pub async fn execute(&self, provider: &dyn TtsProvider) -> Result<PathBuf> {
        let voice_id = self
            .voice_id
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::validation("Voice ID is required", "ttsId"))?;
        let text = apply_markup(&self.text, &self.markup, provider.kind());
        provider
            .save(voice_id, &text, self.format, &self.dir, &self.file_name)
            .await
    }
}

/// A snapshot bound to the provider settings it was queued with, plus the
/// sender half of its completion handle.
pub struct Job {
    pub snapshot: JobSnapshot,
    pub provider: Arc<dyn TtsProvider>,
    reply: oneshot::Sender<Result<PathBuf>>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("snapshot", &self.snapshot)
            .field("provider", &self.provider.kind())
            .finish()
    }
}

impl Job {
    pub fn new(snapshot: JobSnapshot, provider: Arc<dyn TtsProvider>) -> (Job, PendingSave) {
        let (reply, rx) = oneshot::channel();
        let job = Job {
            snapshot,
            provider,
            reply,
        };
        (job, PendingSave::waiting(rx))
    }

    /// Run the job and deliver its outcome. Returns whether it succeeded.
    pub(crate) async fn run(self) -> bool {
        let Job {
            snapshot,
            provider,
            reply,
        } = self;
        let result = snapshot.execute(provider.as_ref()).await;
        if let Err(ref err) = result {
            tracing::error!("{}", err.report());
        }
        let ok = result.is_ok();
        // The caller may have dropped its handle; the outcome is then discarded.
        let _ = reply.send(result);
        ok
    }

    pub(crate) fn fail(self, err: Error) {
        tracing::error!("{}", err.report());
        let _ = self.reply.send(Err(err));
    }
}

enum PendingState {
    Ready(Option<Result<PathBuf>>),
    Waiting(oneshot::Receiver<Result<PathBuf>>),
}

/// Deferred result of `VoiceMix::save`; resolves to the written file path.
#[must_use = "a PendingSave does nothing useful unless awaited"]
pub struct PendingSave {
    state: PendingState,
}

impl PendingSave {
    pub(crate) fn ready(result: Result<PathBuf>) -> Self {
        Self {
            state: PendingState::Ready(Some(result)),
        }
    }

    fn waiting(rx: oneshot::Receiver<Result<PathBuf>>) -> Self {
        Self {
            state: PendingState::Waiting(rx),
        }
    }

    /// True when the result was known at creation (dry runs).
    pub fn is_immediate(&self) -> bool {
        matches!(self.state, PendingState::Ready(_))
    }
}

impl Future for PendingSave {
    type Output = Result<PathBuf>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            PendingState::Ready(result) => Poll::Ready(
                result
                    .take()
                    .unwrap_or_else(|| Err(Error::runtime("PendingSave polled after completion"))),
            ),
            PendingState::Waiting(rx) => Pin::new(rx).poll(cx).map(|received| {
                received.unwrap_or_else(|_| Err(Error::runtime("Job dropped before completion")))
            }),
        }
    }
}

impl std::fmt::Debug for PendingSave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingSave")
            .field("immediate", &self.is_immediate())
            .finish()
    }
}
