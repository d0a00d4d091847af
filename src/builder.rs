//! Fluent request builder.
//!
//! A [`VoiceMix`] accumulates the text, voice and output settings of the next
//! utterance. [`VoiceMix::save`] freezes them into a job and queues it; the
//! builder can be reconfigured immediately afterwards without touching jobs
//! already queued.

use crate::batch::{BatchScheduler, Job, JobSnapshot, PendingSave};
use crate::config::{absolute_dir, VoiceMixConfig};
use crate::fingerprint::{FingerprintHasher, FingerprintInput};
use crate::markup::MarkupOptions;
use crate::provider::{AudioFormat, ElevenLabsModel, ProviderKind, TtsProvider, VoiceSettings};
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Inline synthesis directives such as `[laughs]`.
static ANNOTATIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[.*?\]").expect("annotation pattern is valid"));

const DEFAULT_OUTPUT: &str = "speech";

/// Text-to-speech request builder bound to one active provider.
///
/// ```rust,no_run
/// use voicemix::VoiceMix;
///
/// # async fn run() -> voicemix::Result<()> {
/// let mut mix = VoiceMix::new()?;
/// mix.use_resemble(None)?.path("./audio");
/// mix.add_voice("narrator", "1f2e3d4c");
///
/// let path = mix
///     .actor("narrator")
///     .prompt("calm and slow")
///     .say("Welcome back [sighs] to the show.")
///     .save()
///     .await?;
/// println!("wrote {}", path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct VoiceMix {
    provider: Box<dyn TtsProvider>,
    scheduler: BatchScheduler,
    stable: FingerprintHasher,
    unique: FingerprintHasher,
    timeout: Duration,

    voices: BTreeMap<String, String>,
    text: String,
    voice_id: Option<String>,
    format: AudioFormat,
    dir: PathBuf,
    default_output: String,
    explicit_output: Option<String>,
    prefix: String,
    random_suffix: bool,
    dry_run: bool,

    prompt: Option<String>,
    language: Option<String>,
    temperature: Option<f32>,
    exaggeration: Option<f32>,
    prosody_rate: Option<String>,
    prosody_pitch: Option<String>,
    escape_markup: bool,
}

impl VoiceMix {
    /// Builder configured from defaults plus `VOICEMIX_*` environment overrides.
    pub fn new() -> Result<Self> {
        Self::with_config(VoiceMixConfig::from_env())
    }

    /// Connect the configured provider and start from `config`.
    pub fn with_config(config: VoiceMixConfig) -> Result<Self> {
        let provider = config
            .provider
            .connect(config.api_key.as_deref(), config.request_timeout())?;
        Ok(Self::with_provider(config, provider))
    }

    /// Start from `config` with an already constructed provider.
    ///
    /// `config.provider` and `config.api_key` are ignored.
    pub fn with_provider(config: VoiceMixConfig, provider: Box<dyn TtsProvider>) -> Self {
        Self {
            provider,
            scheduler: BatchScheduler::new(config.effective_batch_size()),
            stable: FingerprintHasher::stable(),
            unique: FingerprintHasher::unique(),
            timeout: config.request_timeout(),
            voices: config.voices,
            text: String::new(),
            voice_id: None,
            format: config.format,
            dir: absolute_dir(&config.output_dir),
            default_output: DEFAULT_OUTPUT.to_string(),
            explicit_output: None,
            prefix: config.prefix,
            random_suffix: config.random_suffix,
            dry_run: config.dry_run,
            prompt: config.prompt,
            language: config.language,
            temperature: config.temperature,
            exaggeration: config.exaggeration,
            prosody_rate: None,
            prosody_pitch: None,
            escape_markup: config.escape_markup,
        }
    }

    // ---- provider selection ----

    /// Switch to ElevenLabs with fresh default settings. `api_key` falls back to
    /// `ELEVENLABS_API_KEY`.
    pub fn use_elevenlabs(&mut self, api_key: Option<&str>) -> Result<&mut Self> {
        self.switch_to(ProviderKind::ElevenLabs, api_key)
    }

    /// Switch to Resemble (`RESEMBLE_API_KEY`).
    pub fn use_resemble(&mut self, api_key: Option<&str>) -> Result<&mut Self> {
        self.switch_to(ProviderKind::Resemble, api_key)
    }

    /// Switch to Cartesia (`CARTESIA_API_KEY`).
    pub fn use_cartesia(&mut self, api_key: Option<&str>) -> Result<&mut Self> {
        self.switch_to(ProviderKind::Cartesia, api_key)
    }

    /// Replace the active provider with a caller-built one.
    pub fn use_provider(&mut self, provider: Box<dyn TtsProvider>) -> &mut Self {
        tracing::debug!(provider = %provider.kind(), "provider selected");
        self.provider = provider;
        self
    }

    fn switch_to(&mut self, kind: ProviderKind, api_key: Option<&str>) -> Result<&mut Self> {
        let provider = kind.connect(api_key, self.timeout)?;
        Ok(self.use_provider(provider))
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub fn provider(&self) -> &dyn TtsProvider {
        self.provider.as_ref()
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    // ---- provider-specific tuning; no-ops on other providers ----

    pub fn monolingual_v1(&mut self) -> &mut Self {
        self.elevenlabs_model(ElevenLabsModel::MonolingualV1)
    }

    pub fn multilingual_v1(&mut self) -> &mut Self {
        self.elevenlabs_model(ElevenLabsModel::MultilingualV1)
    }

    pub fn multilingual_v2(&mut self) -> &mut Self {
        self.elevenlabs_model(ElevenLabsModel::MultilingualV2)
    }

    pub fn v3(&mut self) -> &mut Self {
        self.elevenlabs_model(ElevenLabsModel::V3)
    }

    fn elevenlabs_model(&mut self, model: ElevenLabsModel) -> &mut Self {
        if let Some(p) = self.provider.as_elevenlabs_mut() {
            p.set_model(model);
        }
        self
    }

    pub fn voice_settings(&mut self, settings: VoiceSettings) -> &mut Self {
        if let Some(p) = self.provider.as_elevenlabs_mut() {
            p.set_voice_settings(settings);
        }
        self
    }

    pub fn sample_rate(&mut self, rate: u32) -> &mut Self {
        if let Some(p) = self.provider.as_resemble_mut() {
            p.set_sample_rate(rate);
        }
        self
    }

    /// Resemble precision (`MULAW`, `PCM_16`, `PCM_24`, `PCM_32`).
    ///
    /// Only fails for an unknown value while Resemble is active.
    pub fn precision(&mut self, precision: &str) -> Result<&mut Self> {
        if let Some(p) = self.provider.as_resemble_mut() {
            p.set_precision(precision)?;
        }
        Ok(self)
    }

    /// Resemble output container override (`mp3`, `wav`).
    pub fn output_format(&mut self, format: &str) -> Result<&mut Self> {
        if let Some(p) = self.provider.as_resemble_mut() {
            p.set_output_format(format)?;
        }
        Ok(self)
    }

    // ---- voice ----

    pub fn voice(&mut self, id: impl Into<String>) -> &mut Self {
        self.voice_id = Some(id.into());
        self
    }

    pub fn id(&mut self, id: impl Into<String>) -> &mut Self {
        self.voice(id)
    }

    /// Select the voice registered under `key`. Unknown keys leave the current
    /// voice unchanged.
    pub fn actor(&mut self, key: &str) -> &mut Self {
        match self.voices.get(key) {
            Some(id) => self.voice_id = Some(id.clone()),
            None => tracing::debug!(key, "unknown voice alias, keeping current voice"),
        }
        self
    }

    /// Replace the alias map.
    pub fn voices(&mut self, voices: BTreeMap<String, String>) -> &mut Self {
        self.voices = voices;
        self
    }

    pub fn add_voice(&mut self, key: impl Into<String>, id: impl Into<String>) -> &mut Self {
        self.voices.insert(key.into(), id.into());
        self
    }

    // ---- output location ----

    /// Output directory; relative paths resolve against the working directory.
    pub fn path(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        self.dir = absolute_dir(dir.as_ref());
        self
    }

    pub fn prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.prefix = prefix.into();
        self
    }

    pub fn format(&mut self, format: AudioFormat) -> &mut Self {
        self.format = format;
        self
    }

    /// Explicit output name (without extension). Takes precedence over the
    /// fingerprint-derived name until [`auto_file`](Self::auto_file) is called.
    ///
    /// The name is kept across later [`say`](Self::say) calls, so every job saved
    /// afterwards targets the same file and later jobs overwrite earlier ones. Call
    /// `auto_file()` (or `file` again) before the next utterance to avoid that.
    pub fn file(&mut self, name: impl Into<String>) -> &mut Self {
        self.explicit_output = Some(name.into());
        self
    }

    /// Go back to fingerprint-derived names.
    pub fn auto_file(&mut self) -> &mut Self {
        self.explicit_output = None;
        self
    }

    /// Time-salt default names so every `say()` yields a new file.
    pub fn random_suffix(&mut self, enabled: bool) -> &mut Self {
        self.random_suffix = enabled;
        self
    }

    /// Preview mode: `save()` resolves with the output name and does no I/O.
    pub fn dry_run(&mut self, enabled: bool) -> &mut Self {
        self.dry_run = enabled;
        self
    }

    // ---- markup ----

    /// Speaking-style prompt. Ignored unless the active provider accepts markup.
    pub fn prompt(&mut self, prompt: impl Into<String>) -> &mut Self {
        if self.provider.kind().supports_markup() {
            self.prompt = Some(prompt.into());
        }
        self
    }

    pub fn lang(&mut self, language: impl Into<String>) -> &mut Self {
        self.language = Some(language.into());
        self
    }

    pub fn temperature(&mut self, temperature: f32) -> &mut Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn exaggeration(&mut self, exaggeration: f32) -> &mut Self {
        self.exaggeration = Some(exaggeration);
        self
    }

    pub fn prosody_rate(&mut self, rate: impl Into<String>) -> &mut Self {
        self.prosody_rate = Some(rate.into());
        self
    }

    pub fn prosody_pitch(&mut self, pitch: impl Into<String>) -> &mut Self {
        self.prosody_pitch = Some(pitch.into());
        self
    }

    /// XML-escape markup attribute values (off by default).
    pub fn escape_markup(&mut self, enabled: bool) -> &mut Self {
        self.escape_markup = enabled;
        self
    }

    // ---- utterance ----

    /// Record the utterance and derive the default output name from it.
    ///
    /// Bracketed annotations are kept in the text sent to the provider but do
    /// not contribute to the name.
    pub fn say(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = text.into();
        let naming_text = ANNOTATIONS.replace_all(&self.text, "");
        let input = FingerprintInput {
            text: naming_text.trim(),
            prompt: self.prompt.as_deref(),
            language: self.language.as_deref(),
            voice_id: self.voice_id.as_deref(),
            provider: self.provider.kind().id(),
        };
        let hasher = if self.random_suffix {
            &self.unique
        } else {
            &self.stable
        };
        self.default_output = format!("{}{}", self.prefix, hasher.fingerprint(&input));
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn voice_id(&self) -> Option<&str> {
        self.voice_id.as_deref()
    }

    pub fn audio_format(&self) -> AudioFormat {
        self.format
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Output name without extension.
    pub fn file_output(&self) -> &str {
        self.explicit_output
            .as_deref()
            .unwrap_or(self.default_output.as_str())
    }

    /// `<output>.<extension>`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.file_output(), self.format.extension())
    }

    pub fn full_path(&self) -> PathBuf {
        self.dir.join(self.file_name())
    }

    /// Whether the current output file is already on disk.
    pub fn exists(&self) -> bool {
        self.full_path().exists()
    }

    pub fn markup_options(&self) -> MarkupOptions {
        MarkupOptions {
            prompt: self.prompt.clone(),
            language: self.language.clone(),
            temperature: self.temperature,
            exaggeration: self.exaggeration,
            prosody_rate: self.prosody_rate.clone(),
            prosody_pitch: self.prosody_pitch.clone(),
            escape_attributes: self.escape_markup,
        }
    }

    /// Value copy of the current request settings.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            text: self.text.clone(),
            voice_id: self.voice_id.clone(),
            format: self.format,
            dir: self.dir.clone(),
            file_name: self.file_name(),
            markup: self.markup_options(),
        }
    }

    /// Queue the current request.
    ///
    /// In dry-run mode the handle is already resolved with the output name and
    /// nothing is queued. Otherwise the job runs on the Tokio runtime this is
    /// called from; the handle resolves to the written path.
    pub fn save(&self) -> PendingSave {
        if self.dry_run {
            return PendingSave::ready(Ok(PathBuf::from(self.file_output())));
        }
        let (job, handle) = Job::new(self.snapshot(), self.provider.snapshot());
        tracing::debug!(
            provider = %self.provider.kind(),
            file = %job.snapshot.file_name,
            "job queued"
        );
        self.scheduler.enqueue(job);
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ElevenLabsProvider, ResembleProvider};
    use futures::FutureExt;

    fn elevenlabs() -> VoiceMix {
        let provider = ElevenLabsProvider::new(Some("test-key")).unwrap();
        VoiceMix::with_provider(VoiceMixConfig::default(), Box::new(provider))
    }

    fn resemble() -> VoiceMix {
        let provider = ResembleProvider::new(Some("test-key")).unwrap();
        VoiceMix::with_provider(VoiceMixConfig::default(), Box::new(provider))
    }

    #[test]
    fn test_defaults() {
        let mix = elevenlabs();
        assert_eq!(mix.provider_kind(), ProviderKind::ElevenLabs);
        assert_eq!(mix.file_name(), "speech.mp3");
        assert!(mix.dir().is_absolute());
        assert_eq!(mix.scheduler().batch_size(), 3);
    }

    #[test]
    fn test_unknown_alias_keeps_voice() {
        let mut mix = elevenlabs();
        mix.add_voice("narrator", "voice-n").voice("voice-a");
        mix.actor("missing");
        assert_eq!(mix.voice_id(), Some("voice-a"));
        mix.actor("narrator");
        assert_eq!(mix.voice_id(), Some("voice-n"));
    }

    #[test]
    fn test_tuning_is_noop_on_other_providers() {
        let mut mix = elevenlabs();
        mix.sample_rate(8000);
        assert!(mix.precision("bogus").is_ok());
        assert!(mix.output_format("ogg").is_ok());

        let mut mix = resemble();
        mix.v3().monolingual_v1();
        assert_eq!(mix.provider_kind(), ProviderKind::Resemble);
    }

    #[test]
    fn test_invalid_precision_on_resemble() {
        let mut mix = resemble();
        let err = mix.precision("PCM_8").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.field(), Some("precision"));
        assert!(err.message().contains("MULAW, PCM_16, PCM_24, PCM_32"));

        let err = mix.output_format("ogg").unwrap_err();
        assert_eq!(err.field(), Some("output_format"));
    }

    #[test]
    fn test_prompt_needs_markup_provider() {
        let mut mix = elevenlabs();
        mix.prompt("calm");
        assert_eq!(mix.markup_options().prompt, None);

        let mut mix = resemble();
        mix.prompt("calm");
        assert_eq!(mix.markup_options().prompt.as_deref(), Some("calm"));
    }

    #[test]
    fn test_annotations_skip_name_but_reach_text() {
        let mut a = elevenlabs();
        a.voice("v").say("Hello [laughs] world");
        let mut b = elevenlabs();
        b.voice("v").say("Hello  world");

        assert_eq!(a.text(), "Hello [laughs] world");
        assert_eq!(a.snapshot().text, "Hello [laughs] world");
        assert_eq!(a.file_output(), b.file_output());
        assert!(!a.file_output().contains("laughs"));
    }

    #[test]
    fn test_name_depends_on_voice_and_prefix() {
        let mut mix = elevenlabs();
        mix.voice("a").say("same words");
        let first = mix.file_output().to_string();
        mix.voice("b").say("same words");
        assert_ne!(mix.file_output(), first);

        mix.prefix("ch1_").say("same words");
        assert!(mix.file_output().starts_with("ch1_same-words_"));
    }

    #[test]
    fn test_random_suffix_changes_name() {
        let mut mix = elevenlabs();
        mix.voice("v").random_suffix(true).say("again");
        let first = mix.file_output().to_string();
        mix.say("again");
        assert_ne!(mix.file_output(), first);
    }

    #[test]
    fn test_explicit_file_wins_in_either_order() {
        let mut mix = elevenlabs();
        mix.file("intro").say("Some text");
        assert_eq!(mix.file_name(), "intro.mp3");
        mix.say("Other text").file("outro");
        assert_eq!(mix.file_name(), "outro.mp3");
        mix.auto_file();
        assert!(mix.file_output().starts_with("other-text_"));
    }

    #[test]
    fn test_explicit_file_sticks_across_utterances() {
        let mut mix = elevenlabs();
        mix.voice("v").say("one").file("intro");
        assert_eq!(mix.snapshot().file_name, "intro.mp3");
        mix.say("two");
        assert_eq!(mix.snapshot().file_name, "intro.mp3");
        mix.auto_file().say("three");
        assert!(mix.snapshot().file_name.starts_with("three_"));
    }

    #[test]
    fn test_switching_provider_resets_tuning() {
        let mut mix = elevenlabs();
        mix.v3();
        let model = mix.provider.as_elevenlabs_mut().map(|p| p.model());
        assert_eq!(model, Some(ElevenLabsModel::V3));

        mix.use_resemble(Some("k")).unwrap();
        assert_eq!(mix.provider_kind(), ProviderKind::Resemble);
        mix.use_elevenlabs(Some("k")).unwrap();
        assert_eq!(mix.provider_kind(), ProviderKind::ElevenLabs);
        let model = mix.provider.as_elevenlabs_mut().map(|p| p.model());
        assert_eq!(model, Some(ElevenLabsModel::MultilingualV2));
        assert_eq!(ElevenLabsModel::MultilingualV2.as_str(), "eleven_multilingual_v2");

        mix.use_cartesia(Some("k")).unwrap();
        assert_eq!(mix.provider_kind(), ProviderKind::Cartesia);
        assert!(mix.provider.as_elevenlabs_mut().is_none());
    }

    #[test]
    fn test_switched_provider_uses_configured_timeout() {
        let config = VoiceMixConfig {
            request_timeout_secs: 7,
            ..Default::default()
        };
        let provider = ElevenLabsProvider::new(Some("k")).unwrap();
        let mut mix = VoiceMix::with_provider(config, Box::new(provider));
        mix.use_cartesia(Some("k")).unwrap();
        assert!(format!("{:?}", mix.provider()).contains("timeout: 7s"));
    }

    #[test]
    fn test_dry_run_resolves_without_runtime() {
        let mut mix = elevenlabs();
        mix.dry_run(true).voice("v").format(AudioFormat::Wav).say("Preview me");
        let pending = mix.save();
        assert!(pending.is_immediate());
        let name = pending.now_or_never().unwrap().unwrap();
        assert_eq!(name, PathBuf::from(mix.file_output()));
        assert_eq!(mix.scheduler().stats().batches, 0);
    }

    #[tokio::test]
    async fn test_missing_voice_rejects_with_tts_id() {
        let mut mix = elevenlabs();
        let err = mix.say("No voice set").save().await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.field(), Some("ttsId"));
    }

    #[test]
    fn test_snapshot_is_a_value_copy() {
        let mut mix = resemble();
        mix.voice("v").prompt("calm").say("first");
        let snap = mix.snapshot();
        mix.voice("w").prompt("angry").say("second");
        assert_eq!(snap.voice_id.as_deref(), Some("v"));
        assert_eq!(snap.markup.prompt.as_deref(), Some("calm"));
        assert_eq!(snap.text, "first");
    }
}
