//! # voicemix
//!
//! Multi-provider text-to-speech request builder with a batched job queue.
//!
//! ## Overview
//!
//! A [`VoiceMix`] builder collects the text, voice and output settings for one
//! utterance at a time. Each [`VoiceMix::save`] freezes those settings, queues a
//! job and hands back a [`PendingSave`] that resolves to the written file. Jobs
//! are drained in fixed-size batches: all jobs of a batch run concurrently, and
//! the next batch starts once the current one has settled.
//!
//! ## Key Features
//!
//! - **Providers**: ElevenLabs, Resemble and Cartesia behind one [`TtsProvider`] trait
//! - **Stable names**: default file names are content fingerprints, so reruns can
//!   skip files that already exist ([`VoiceMix::exists`])
//! - **Markup**: prompt, language and prosody wrapping for markup-capable providers
//! - **Dry runs**: preview output names without any network or disk I/O
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use voicemix::VoiceMix;
//!
//! #[tokio::main]
//! async fn main() -> voicemix::Result<()> {
//!     voicemix::logging::init_tracing();
//!
//!     let mut mix = VoiceMix::new()?;
//!     mix.path("./audio").voice("21m00Tcm4TlvDq8ikWAM");
//!
//!     let path = mix.say("Hello there [whispers] friend.").save().await?;
//!     println!("{}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`builder`] | The [`VoiceMix`] request builder |
//! | [`batch`] | Job snapshots and the batch scheduler |
//! | [`provider`] | Provider trait and the ElevenLabs / Resemble / Cartesia clients |
//! | [`fingerprint`] | Content-derived output names |
//! | [`markup`] | Provider-conditional text wrapping |
//! | [`config`] | Defaults, YAML and environment configuration |
//! | [`error`] | Error taxonomy and log formatting |
//! | [`logging`] | Tracing subscriber setup |

pub mod batch;
pub mod builder;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod markup;
pub mod provider;

pub use batch::{BatchScheduler, PendingSave};
pub use builder::VoiceMix;
pub use config::VoiceMixConfig;
pub use error::{Error, ErrorContext};
pub use fingerprint::{FingerprintHasher, FingerprintMode};
pub use markup::{apply_markup, MarkupOptions};
pub use provider::{AudioFormat, ProviderKind, TtsProvider};

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
