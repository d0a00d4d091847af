//! Cartesia text-to-speech (`POST {base}/tts/bytes`, streamed audio).

use super::{
    check_inputs, ensure_dir, write_stream, AudioFormat, HttpTarget, ProviderKind, TtsProvider,
    DEFAULT_TIMEOUT,
};
use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const CARTESIA_BASE_URL: &str = "https://api.cartesia.ai";

/// Value sent in the `Cartesia-Version` header.
pub const CARTESIA_VERSION: &str = "2024-06-10";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationConfig {
    pub speed: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CartesiaSettings {
    pub model_id: String,
    pub speed: String,
    pub generation_config: GenerationConfig,
    pub sample_rate: u32,
}

impl Default for CartesiaSettings {
    fn default() -> Self {
        Self {
            model_id: "sonic-3".to_string(),
            speed: "normal".to_string(),
            generation_config: GenerationConfig {
                speed: 1.0,
                volume: 1.0,
            },
            sample_rate: 44_100,
        }
    }
}

#[derive(Debug, Serialize)]
struct OutputFormat {
    container: &'static str,
    encoding: &'static str,
    sample_rate: u32,
}

#[derive(Debug, Serialize)]
struct VoiceRef<'a> {
    mode: &'static str,
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct BytesRequest<'a> {
    model_id: &'a str,
    transcript: &'a str,
    voice: VoiceRef<'a>,
    output_format: OutputFormat,
    speed: &'a str,
    generation_config: &'a GenerationConfig,
}

#[derive(Debug, Clone)]
pub struct CartesiaProvider {
    http: HttpTarget,
    settings: CartesiaSettings,
}

impl CartesiaProvider {
    /// `api_key` falls back to `CARTESIA_API_KEY`.
    pub fn new(api_key: Option<&str>) -> Result<Self> {
        Self::connect(api_key, DEFAULT_TIMEOUT)
    }

    pub fn connect(api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: HttpTarget::new(ProviderKind::Cartesia, api_key, timeout)?,
            settings: CartesiaSettings::default(),
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

    pub fn with_settings(mut self, settings: CartesiaSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &CartesiaSettings {
        &self.settings
    }

    fn request_body<'a>(&'a self, voice_id: &'a str, text: &'a str, format: AudioFormat) -> BytesRequest<'a> {
        let output_format = match format {
            AudioFormat::Mp3 => OutputFormat {
                container: "mp3",
                encoding: "mp3",
                sample_rate: self.settings.sample_rate,
            },
            AudioFormat::Wav => OutputFormat {
                container: "wav",
                encoding: "pcm_f32le",
                sample_rate: self.settings.sample_rate,
            },
        };
        BytesRequest {
            model_id: &self.settings.model_id,
            transcript: text,
            voice: VoiceRef {
                mode: "id",
                id: voice_id,
            },
            output_format,
            speed: &self.settings.speed,
            generation_config: &self.settings.generation_config,
        }
    }
}

#[async_trait]
impl TtsProvider for CartesiaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cartesia
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

        let url = self.http.endpoint(&["tts", "bytes"])?;
        tracing::debug!(
            provider = "cartesia",
            model = %self.settings.model_id,
            voice_id,
            "synthesis request"
        );

        let response = self
            .http
            .client()
            .post(url)
            .bearer_auth(self.http.api_key())
            .header("Cartesia-Version", CARTESIA_VERSION)
            .json(&self.request_body(voice_id, text, format))
            .send()
            .await
            .map_err(|e| self.http.request_failed(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await;
            // Cartesia puts a readable reason in the body; prefer it as the message.
            let message = match &body {
                Ok(reason) if !reason.trim().is_empty() => reason.trim().to_string(),
                _ => "Failed to save audio from Cartesia API".to_string(),
            };
            return Err(self.http.rejected(message, status, &body));
        }

        write_stream(self.kind(), dir.join(file_name), response).await
    }

    fn snapshot(&self) -> Arc<dyn TtsProvider> {
        Arc::new(self.clone())
    }
}
