//! Resemble text-to-speech.
//!
//! `POST {base}/synthesize` returns a JSON envelope
//! `{success, audio_content (base64), issues[]}`. The only markup-capable backend.

use super::{
    check_inputs, ensure_dir, write_bytes, AudioFormat, HttpTarget, ProviderKind, TtsProvider,
    DEFAULT_TIMEOUT,
};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const RESEMBLE_BASE_URL: &str = "https://f.cluster.resemble.ai";

/// Sample precision of the synthesized audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    Mulaw,
    #[default]
    Pcm16,
    Pcm24,
    Pcm32,
}

impl Precision {
    pub const ALL: [Precision; 4] = [
        Precision::Mulaw,
        Precision::Pcm16,
        Precision::Pcm24,
        Precision::Pcm32,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::Mulaw => "MULAW",
            Precision::Pcm16 => "PCM_16",
            Precision::Pcm24 => "PCM_24",
            Precision::Pcm32 => "PCM_32",
        }
    }
}

impl FromStr for Precision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Precision::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                let accepted: Vec<&str> = Precision::ALL.iter().map(|p| p.as_str()).collect();
                Error::validation_with_context(
                    format!("Invalid precision. Must be one of: {}", accepted.join(", ")),
                    ErrorContext::new()
                        .with_field("precision")
                        .with_detail("value", s),
                )
            })
    }
}

/// Tunable request settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ResembleSettings {
    pub sample_rate: u32,
    pub precision: Precision,
    /// Overrides the job's format in the request when set.
    pub output_format: Option<AudioFormat>,
}

impl Default for ResembleSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            precision: Precision::default(),
            output_format: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    voice_uuid: &'a str,
    data: &'a str,
    sample_rate: u32,
    output_format: &'static str,
    precision: &'static str,
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    audio_content: Option<String>,
    #[serde(default)]
    issues: Vec<serde_json::Value>,
}

impl SynthesizeResponse {
    fn issues_message(&self) -> Option<String> {
        if self.issues.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .issues
            .iter()
            .map(|issue| match issue {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        Some(parts.join(", "))
    }
}

#[derive(Debug, Clone)]
pub struct ResembleProvider {
    http: HttpTarget,
    settings: ResembleSettings,
}

impl ResembleProvider {
    /// `api_key` falls back to `RESEMBLE_API_KEY`.
    pub fn new(api_key: Option<&str>) -> Result<Self> {
        Self::connect(api_key, DEFAULT_TIMEOUT)
    }

    pub fn connect(api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: HttpTarget::new(ProviderKind::Resemble, api_key, timeout)?,
            settings: ResembleSettings::default(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.http.set_base_url(base_url)?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http.set_timeout(timeout)?;
        Ok(self)
    }

    pub fn set_sample_rate(&mut self, rate: u32) -> &mut Self {
        self.settings.sample_rate = rate;
        self
    }

    /// Accepts `MULAW`, `PCM_16`, `PCM_24` or `PCM_32`.
    pub fn set_precision(&mut self, precision: &str) -> Result<&mut Self> {
        self.settings.precision = precision.parse()?;
        Ok(self)
    }

    /// Accepts `mp3` or `wav`.
    pub fn set_output_format(&mut self, format: &str) -> Result<&mut Self> {
        self.settings.output_format = Some(format.parse()?);
        Ok(self)
    }

    pub fn settings(&self) -> &ResembleSettings {
        &self.settings
    }

    fn request_body<'a>(&self, voice_id: &'a str, text: &'a str, format: AudioFormat) -> SynthesizeRequest<'a> {
        SynthesizeRequest {
            voice_uuid: voice_id,
            data: text,
            sample_rate: self.settings.sample_rate,
            output_format: self.settings.output_format.unwrap_or(format).extension(),
            precision: self.settings.precision.as_str(),
        }
    }

    fn decode_audio(&self, body: &str) -> Result<Vec<u8>> {
        let kind = self.kind();
        let parsed: SynthesizeResponse = serde_json::from_str(body).map_err(|e| {
            Error::provider_with_context(
                "Invalid response from Resemble API",
                ErrorContext::new()
                    .with_provider(kind.id())
                    .with_detail("error", e)
                    .with_detail("data", body),
            )
        })?;

        if !parsed.success {
            return Err(Error::provider_with_context(
                parsed
                    .issues_message()
                    .unwrap_or_else(|| "Synthesis failed".to_string()),
                ErrorContext::new()
                    .with_provider(kind.id())
                    .with_detail("data", body),
            ));
        }

        let audio = parsed
            .audio_content
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Error::provider("Response did not include audio content", kind.id()))?;
        base64::engine::general_purpose::STANDARD
            .decode(audio.as_bytes())
            .map_err(|e| {
                Error::provider_with_context(
                    "Failed to decode audio content",
                    ErrorContext::new()
                        .with_provider(kind.id())
                        .with_detail("error", e),
                )
            })
    }
}

#[async_trait]
impl TtsProvider for ResembleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Resemble
    }

    async fn save(
        &self,
        voice_id: &str,
        text: &str,
        format: AudioFormat,
        dir: &Path,
        file_name: &str,
    ) -> Result<PathBuf> {
        check_inputs(self.kind(), voice_id, text, dir, file_name)?;
        ensure_dir(self.kind(), dir).await?;

        let url = self.http.endpoint(&["synthesize"])?;
        let body = self.request_body(voice_id, text, format);
        tracing::debug!(
            provider = "resemble",
            voice_id,
            sample_rate = body.sample_rate,
            precision = body.precision,
            "synthesis request"
        );

        let response = self
            .http
            .client()
            .post(url)
            .bearer_auth(self.http.api_key())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.http.request_failed(e))?;

        let status = response.status();
        let text = response.text().await;
        if !status.is_success() {
            return Err(self.http.rejected(
                "Failed to save audio from Resemble API",
                status,
                &text,
            ));
        }

        let text = text.map_err(|e| self.http.request_failed(e))?;
        let audio = self.decode_audio(&text)?;
        write_bytes(self.kind(), dir.join(file_name), &audio).await
    }

    fn snapshot(&self) -> Arc<dyn TtsProvider> {
        Arc::new(self.clone())
    }

    fn as_resemble_mut(&mut self) -> Option<&mut ResembleProvider> {
        Some(self)
    }
}
