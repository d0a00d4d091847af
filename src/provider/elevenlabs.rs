//! ElevenLabs text-to-speech.
//!
//! - Endpoint: `POST {base}/v1/text-to-speech/{voice_id}`
//! - Auth: `xi-api-key` header
//! - Response: streamed audio bytes

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

pub const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";

/// Synthesis model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElevenLabsModel {
    MonolingualV1,
    MultilingualV1,
    #[default]
    MultilingualV2,
    V3,
}

impl ElevenLabsModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElevenLabsModel::MonolingualV1 => "eleven_monolingual_v1",
            ElevenLabsModel::MultilingualV1 => "eleven_multilingual_v1",
            ElevenLabsModel::MultilingualV2 => "eleven_multilingual_v2",
            ElevenLabsModel::V3 => "eleven_v3",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub stability: f64,
    pub similarity_boost: f64,
    pub style: f64,
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.5,
            style: 0.4,
            use_speaker_boost: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'static str,
    voice_settings: &'a VoiceSettings,
}

#[derive(Debug, Clone)]
pub struct ElevenLabsProvider {
    http: HttpTarget,
    model: ElevenLabsModel,
    voice_settings: VoiceSettings,
}

impl ElevenLabsProvider {
    /// `api_key` falls back to `ELEVENLABS_API_KEY`.
    pub fn new(api_key: Option<&str>) -> Result<Self> {
        Self::connect(api_key, DEFAULT_TIMEOUT)
    }

    pub fn connect(api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: HttpTarget::new(ProviderKind::ElevenLabs, api_key, timeout)?,
            model: ElevenLabsModel::default(),
            voice_settings: VoiceSettings::default(),
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

    pub fn set_model(&mut self, model: ElevenLabsModel) -> &mut Self {
        self.model = model;
        self
    }

    pub fn set_voice_settings(&mut self, settings: VoiceSettings) -> &mut Self {
        self.voice_settings = settings;
        self
    }

    pub fn model(&self) -> ElevenLabsModel {
        self.model
    }

    pub fn voice_settings(&self) -> &VoiceSettings {
        &self.voice_settings
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }
}

#[async_trait]
impl TtsProvider for ElevenLabsProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ElevenLabs
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

        let url = self.http.endpoint(&["v1", "text-to-speech", voice_id])?;
        let body = SpeechRequest {
            text,
            model_id: self.model.as_str(),
            voice_settings: &self.voice_settings,
        };
        tracing::debug!(
            provider = "elevenlabs",
            model = self.model.as_str(),
            voice_id,
            "synthesis request"
        );

        let response = self
            .http
            .client()
            .post(url)
            .header("xi-api-key", self.http.api_key())
            .header("accept", format.mime_type())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.http.request_failed(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await;
            return Err(self.http.rejected(
                "Failed to save audio from ElevenLabs API",
                status,
                &body,
            ));
        }

        write_stream(self.kind(), dir.join(file_name), response).await
    }

    fn snapshot(&self) -> Arc<dyn TtsProvider> {
        Arc::new(self.clone())
    }

    fn as_elevenlabs_mut(&mut self) -> Option<&mut ElevenLabsProvider> {
        Some(self)
    }
}
