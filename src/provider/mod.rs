//! TTS provider abstraction.
//!
//! Every backend implements [`TtsProvider::save`]: validate the inputs, make sure
//! the output directory exists, run the provider-specific synthesis request and
//! persist the returned audio. Backend-specific tuning (model, sample rate,
//! precision) lives on the concrete types and is reached through the
//! `as_*_mut` capability hooks, guarded by [`TtsProvider::kind`].

mod cartesia;
mod elevenlabs;
mod resemble;

pub use cartesia::{
    CartesiaProvider, CartesiaSettings, GenerationConfig, CARTESIA_BASE_URL, CARTESIA_VERSION,
};
pub use elevenlabs::{ElevenLabsModel, ElevenLabsProvider, VoiceSettings, ELEVENLABS_BASE_URL};
pub use resemble::{Precision, ResembleProvider, ResembleSettings, RESEMBLE_BASE_URL};

use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use url::Url;

/// Identity of a provider variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    ElevenLabs,
    Resemble,
    Cartesia,
}

impl ProviderKind {
    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::ElevenLabs => "elevenlabs",
            ProviderKind::Resemble => "resemble",
            ProviderKind::Cartesia => "cartesia",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::ElevenLabs => "ElevenLabs",
            ProviderKind::Resemble => "Resemble",
            ProviderKind::Cartesia => "Cartesia",
        }
    }

    /// Environment variable consulted when no credential is passed explicitly.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::ElevenLabs => "ELEVENLABS_API_KEY",
            ProviderKind::Resemble => "RESEMBLE_API_KEY",
            ProviderKind::Cartesia => "CARTESIA_API_KEY",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::ElevenLabs => ELEVENLABS_BASE_URL,
            ProviderKind::Resemble => RESEMBLE_BASE_URL,
            ProviderKind::Cartesia => CARTESIA_BASE_URL,
        }
    }

    /// Whether outbound text gets prosody/speak/lang wrapping.
    pub fn supports_markup(&self) -> bool {
        matches!(self, ProviderKind::Resemble)
    }

    /// Build the live provider for this kind with default settings.
    pub fn connect(&self, api_key: Option<&str>, timeout: Duration) -> Result<Box<dyn TtsProvider>> {
        Ok(match self {
            ProviderKind::ElevenLabs => Box::new(ElevenLabsProvider::connect(api_key, timeout)?),
            ProviderKind::Resemble => Box::new(ResembleProvider::connect(api_key, timeout)?),
            ProviderKind::Cartesia => Box::new(CartesiaProvider::connect(api_key, timeout)?),
        })
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "elevenlabs" | "eleven-labs" | "11labs" => Ok(ProviderKind::ElevenLabs),
            "resemble" | "resemble-ai" => Ok(ProviderKind::Resemble),
            "cartesia" => Ok(ProviderKind::Cartesia),
            other => Err(Error::validation(
                format!(
                    "Unsupported provider: {}. Must be one of: elevenlabs, resemble, cartesia",
                    other
                ),
                "provider",
            )),
        }
    }
}

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            _ => Err(Error::validation(
                "Invalid output format. Must be one of: mp3, wav",
                "output_format",
            )),
        }
    }
}

/// A text-to-speech backend that writes synthesized audio to disk.
#[async_trait]
pub trait TtsProvider: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> ProviderKind;

    /// Synthesize `text` with `voice_id` and write it to `dir/file_name`.
    /// Returns the full path of the written file.
    async fn save(
        &self,
        voice_id: &str,
        text: &str,
        format: AudioFormat,
        dir: &Path,
        file_name: &str,
    ) -> Result<PathBuf>;

    /// Frozen copy of the current settings, handed to queued jobs.
    fn snapshot(&self) -> Arc<dyn TtsProvider>;

    fn as_elevenlabs_mut(&mut self) -> Option<&mut ElevenLabsProvider> {
        None
    }

    fn as_resemble_mut(&mut self) -> Option<&mut ResembleProvider> {
        None
    }
}

/// Request timeout used when a provider is built without one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Credential, endpoint and HTTP client shared by the provider variants.
#[derive(Clone)]
pub(crate) struct HttpTarget {
    kind: ProviderKind,
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    timeout: Duration,
}

impl std::fmt::Debug for HttpTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTarget")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpTarget {
    pub(crate) fn new(kind: ProviderKind, api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        let api_key = api_key
            .map(str::to_string)
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(kind.api_key_env())
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
            .ok_or_else(|| {
                Error::provider(
                    format!("{} API key is required", kind.display_name()),
                    kind.id(),
                )
            })?;
        let base_url = parse_base_url(kind.default_base_url())?;
        Ok(Self {
            kind,
            client: build_client(kind, timeout)?,
            base_url,
            api_key,
            timeout,
        })
    }

    pub(crate) fn set_base_url(&mut self, base_url: &str) -> Result<()> {
        self.base_url = parse_base_url(base_url)?;
        Ok(())
    }

    pub(crate) fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.client = build_client(self.kind, timeout)?;
        self.timeout = timeout;
        Ok(())
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// `base_url` with `segments` appended (each segment percent-encoded).
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::validation("Base URL cannot carry a path", "base_url"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Transport-level failure (DNS, connect, timeout, TLS).
    pub(crate) fn request_failed(&self, err: reqwest::Error) -> Error {
        let mut ctx = ErrorContext::new()
            .with_provider(self.kind.id())
            .with_detail("error", &err);
        if err.is_timeout() {
            ctx = ctx.with_detail("timeout_secs", self.timeout.as_secs());
        }
        Error::provider_with_context(
            format!("Failed to save audio from {} API", self.kind.display_name()),
            ctx,
        )
    }

    /// Non-2xx response. A body that could not be read is reported under
    /// `error` in place of `data`.
    pub(crate) fn rejected(
        &self,
        message: impl Into<String>,
        status: reqwest::StatusCode,
        body: &reqwest::Result<String>,
    ) -> Error {
        let mut ctx = ErrorContext::new()
            .with_provider(self.kind.id())
            .with_detail("status", status.as_u16());
        if let Some(reason) = status.canonical_reason() {
            ctx = ctx.with_detail("status_text", reason);
        }
        match body {
            Ok(body) if !body.is_empty() => ctx = ctx.with_detail("data", body),
            Ok(_) => {}
            Err(e) => ctx = ctx.with_detail("error", e),
        }
        Error::provider_with_context(message, ctx)
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| {
        Error::validation_with_context(
            format!("Invalid base URL: {}", e),
            ErrorContext::new()
                .with_field("base_url")
                .with_detail("value", raw),
        )
    })?;
    if url.cannot_be_a_base() {
        return Err(Error::validation("Base URL cannot carry a path", "base_url"));
    }
    Ok(url)
}

fn build_client(kind: ProviderKind, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| {
            Error::provider_with_context(
                "Failed to create HTTP client",
                ErrorContext::new()
                    .with_provider(kind.id())
                    .with_detail("error", e),
            )
        })
}

/// Preconditions shared by every provider; each failure names its own field.
pub(crate) fn check_inputs(
    kind: ProviderKind,
    voice_id: &str,
    text: &str,
    dir: &Path,
    file_name: &str,
) -> Result<()> {
    let missing = |message: &str, field: &str| {
        Error::validation_with_context(
            message,
            ErrorContext::new()
                .with_field(field)
                .with_detail("provider", kind.id()),
        )
    };
    if voice_id.trim().is_empty() {
        return Err(missing("Voice ID is required", "voice_id"));
    }
    if text.is_empty() {
        return Err(missing("Text is required", "text"));
    }
    if dir.as_os_str().is_empty() {
        return Err(missing("File path is required", "file_path"));
    }
    if file_name.is_empty() {
        return Err(missing("File name is required", "file_name"));
    }
    Ok(())
}

pub(crate) async fn ensure_dir(kind: ProviderKind, dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| write_failed(kind, "Failed to create output directory", dir, &e))
}

/// Write a fully-buffered payload.
pub(crate) async fn write_bytes(kind: ProviderKind, path: PathBuf, bytes: &[u8]) -> Result<PathBuf> {
    let body = futures::stream::iter([Ok::<_, std::convert::Infallible>(bytes)]);
    persist(kind, path, body).await
}

/// Stream a binary response body straight to disk.
pub(crate) async fn write_stream(
    kind: ProviderKind,
    path: PathBuf,
    response: reqwest::Response,
) -> Result<PathBuf> {
    persist(kind, path, response.bytes_stream()).await
}

async fn persist<S, B, E>(kind: ProviderKind, path: PathBuf, body: S) -> Result<PathBuf>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| write_failed(kind, "Failed to write audio file", &path, &e))?;
    persist_into(kind, path, file, body).await
}

/// Copy `body` into `sink`, which was opened on `path`. On any failure the file
/// at `path` is removed so no truncated audio is left behind.
async fn persist_into<W, S, B, E>(kind: ProviderKind, path: PathBuf, mut sink: W, body: S) -> Result<PathBuf>
where
    W: AsyncWrite + Unpin,
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let copied = copy_body(kind, &path, &mut sink, body).await;
    drop(sink);
    match copied {
        Ok(written) => {
            tracing::info!(provider = kind.id(), path = %path.display(), bytes = written, "audio saved");
            Ok(path)
        }
        Err(err) => {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "could not remove partial audio file");
            }
            Err(err)
        }
    }
}

async fn copy_body<W, S, B, E>(kind: ProviderKind, path: &Path, sink: &mut W, body: S) -> Result<usize>
where
    W: AsyncWrite + Unpin,
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut body = Box::pin(body);
    let mut written = 0usize;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| {
            Error::provider_with_context(
                "Audio stream interrupted",
                ErrorContext::new()
                    .with_provider(kind.id())
                    .with_detail("path", path.display())
                    .with_detail("error", e),
            )
        })?;
        let chunk = chunk.as_ref();
        sink.write_all(chunk)
            .await
            .map_err(|e| write_failed(kind, "Failed to write audio file", path, &e))?;
        written += chunk.len();
    }
    sink.flush()
        .await
        .map_err(|e| write_failed(kind, "Failed to write audio file", path, &e))?;
    Ok(written)
}

fn write_failed(kind: ProviderKind, message: &str, path: &Path, err: &std::io::Error) -> Error {
    Error::provider_with_context(
        message,
        ErrorContext::new()
            .with_provider(kind.id())
            .with_detail("path", path.display())
            .with_detail("error", err),
    )
}
