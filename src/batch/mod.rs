//! Job queueing and batched dispatch.
//!
//! `VoiceMix::save` turns the builder state into a [`JobSnapshot`], pairs it with a
//! frozen copy of the active provider and hands the resulting [`Job`] to the
//! [`BatchScheduler`]. The caller keeps the [`PendingSave`] half.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`JobSnapshot`] | Value copy of the request settings |
//! | [`Job`] | Snapshot + provider + completion sender |
//! | [`PendingSave`] | Future resolving to the written file path |
//! | [`BatchScheduler`] | FIFO queue drained `batch_size` jobs at a time |
//!
//! ## Example
//!
//! ```rust,no_run
//! use voicemix::VoiceMix;
//!
//! # async fn run() -> voicemix::Result<()> {
//! let mut mix = VoiceMix::new()?;
//! let first = mix.voice("voice-a").say("First line").save();
//! let second = mix.voice("voice-b").say("Second line").save();
//! let (a, b) = futures::join!(first, second);
//! println!("{:?} {:?}", a?, b?);
//! # Ok(())
//! # }
//! ```

mod job;
mod scheduler;

pub use job::{Job, JobSnapshot, PendingSave};
pub use scheduler::{BatchScheduler, SchedulerStats, DEFAULT_BATCH_SIZE};
