//! Builder defaults: built-in values, YAML files and `VOICEMIX_*` environment overrides.

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::provider::{AudioFormat, ProviderKind};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Settings a [`VoiceMix`](crate::VoiceMix) starts from.
///
/// Every field has a default, so a YAML file only needs the keys it changes:
///
/// ```yaml
/// provider: resemble
/// output_dir: ./audio
/// batch_size: 4
/// voices:
///   narrator: 1f2e3d4c
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceMixConfig {
    pub provider: ProviderKind,
    /// Falls back to the provider's `*_API_KEY` variable when unset.
    pub api_key: Option<String>,
    pub output_dir: PathBuf,
    pub format: AudioFormat,
    pub prefix: String,
    pub random_suffix: bool,
    pub dry_run: bool,
    pub batch_size: usize,
    pub request_timeout_secs: u64,
    pub language: Option<String>,
    pub temperature: Option<f32>,
    pub exaggeration: Option<f32>,
    pub prompt: Option<String>,
    pub escape_markup: bool,
    /// Alias -> voice id map used by `VoiceMix::actor`.
    pub voices: BTreeMap<String, String>,
}

impl Default for VoiceMixConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            api_key: None,
            output_dir: PathBuf::from("./"),
            format: AudioFormat::default(),
            prefix: String::new(),
            random_suffix: false,
            dry_run: false,
            batch_size: DEFAULT_BATCH_SIZE,
            request_timeout_secs: 60,
            language: Some("en-us".to_string()),
            temperature: Some(0.8),
            exaggeration: Some(0.0),
            prompt: None,
            escape_markup: false,
            voices: BTreeMap::new(),
        }
    }
}

impl VoiceMixConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                "Invalid configuration",
                ErrorContext::new().with_detail("error", e),
            )
        })
    }

    /// Load a YAML file. Environment overrides are applied on top.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                "Failed to read configuration file",
                ErrorContext::new()
                    .with_detail("path", path.display())
                    .with_detail("error", e),
            )
        })?;
        let mut config = Self::from_yaml_str(&content)?;
        config.apply_env();
        tracing::debug!(path = %path.display(), provider = %config.provider, "configuration loaded");
        Ok(config)
    }

    /// Apply `VOICEMIX_*` variables from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source. Unparseable values are
    /// ignored and the current value kept.
    pub fn apply_vars<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("VOICEMIX_PROVIDER") {
            match v.parse::<ProviderKind>() {
                Ok(kind) => self.provider = kind,
                Err(_) => tracing::warn!(value = %v, "ignoring invalid VOICEMIX_PROVIDER"),
            }
        }
        if let Some(v) = get("VOICEMIX_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("VOICEMIX_BATCH_SIZE") {
            match v.parse::<usize>() {
                Ok(n) => self.batch_size = n,
                Err(_) => tracing::warn!(value = %v, "ignoring invalid VOICEMIX_BATCH_SIZE"),
            }
        }
        if let Some(v) = get("VOICEMIX_HTTP_TIMEOUT_SECS") {
            match v.parse::<u64>() {
                Ok(n) if n > 0 => self.request_timeout_secs = n,
                _ => tracing::warn!(value = %v, "ignoring invalid VOICEMIX_HTTP_TIMEOUT_SECS"),
            }
        }
        if let Some(v) = get("VOICEMIX_DRY_RUN") {
            match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.dry_run = true,
                "0" | "false" | "no" => self.dry_run = false,
                _ => tracing::warn!(value = %v, "ignoring invalid VOICEMIX_DRY_RUN"),
            }
        }
    }

    /// Batch size clamped to at least 1.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Absolute, `.`-free form of `path`, resolved against the working directory.
pub(crate) fn absolute_dir(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = VoiceMixConfig::default();
        assert_eq!(config.provider, ProviderKind::ElevenLabs);
        assert_eq!(config.format, AudioFormat::Mp3);
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.language.as_deref(), Some("en-us"));
        assert_eq!(config.temperature, Some(0.8));
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_yaml_only_needs_changed_keys() {
        let config = VoiceMixConfig::from_yaml_str(
            "provider: cartesia\nformat: wav\nvoices:\n  narrator: abc123\n",
        )
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Cartesia);
        assert_eq!(config.format, AudioFormat::Wav);
        assert_eq!(config.voices.get("narrator").map(String::as_str), Some("abc123"));
        assert_eq!(config.batch_size, 3);
    }

    #[test]
    fn test_bad_yaml_is_configuration_error() {
        let err = VoiceMixConfig::from_yaml_str("provider: [").unwrap_err();
        assert_eq!(err.name(), "ConfigurationError");
        assert!(err.details().contains_key("error"));

        let err = VoiceMixConfig::from_yaml_str("provider: polly\n").unwrap_err();
        assert_eq!(err.name(), "ConfigurationError");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = VoiceMixConfig::default();
        config.apply_vars(vars(&[
            ("VOICEMIX_PROVIDER", "resemble"),
            ("VOICEMIX_OUTPUT_DIR", "/tmp/voices"),
            ("VOICEMIX_BATCH_SIZE", "5"),
            ("VOICEMIX_HTTP_TIMEOUT_SECS", "15"),
            ("VOICEMIX_DRY_RUN", "true"),
        ]));
        assert_eq!(config.provider, ProviderKind::Resemble);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/voices"));
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert!(config.dry_run);
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let mut config = VoiceMixConfig::default();
        config.apply_vars(vars(&[
            ("VOICEMIX_PROVIDER", "polly"),
            ("VOICEMIX_BATCH_SIZE", "many"),
            ("VOICEMIX_HTTP_TIMEOUT_SECS", "0"),
            ("VOICEMIX_DRY_RUN", "maybe"),
        ]));
        assert_eq!(config, VoiceMixConfig::default());
    }

    #[test]
    fn test_batch_size_clamps_to_one() {
        let config = VoiceMixConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert_eq!(config.effective_batch_size(), 1);
    }

    #[test]
    fn test_absolute_dir_normalizes() {
        assert_eq!(absolute_dir(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        let rel = absolute_dir(Path::new("./out"));
        assert!(rel.is_absolute());
        assert!(rel.ends_with("out"));
    }
}
