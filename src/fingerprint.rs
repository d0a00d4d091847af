//! Content-derived identifiers used as default output file names.

use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Hashing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FingerprintMode {
    /// Same inputs always give the same identifier.
    #[default]
    Stable,
    /// Time-salted; every call gives a fresh identifier.
    Unique,
}

/// Request-relevant fields that feed a fingerprint.
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintInput<'a> {
    pub text: &'a str,
    pub prompt: Option<&'a str>,
    pub language: Option<&'a str>,
    pub voice_id: Option<&'a str>,
    pub provider: &'a str,
}

impl FingerprintInput<'_> {
    /// Space-joined composite string. Unset parts contribute an empty segment so
    /// that field positions stay fixed.
    pub fn composite(&self) -> String {
        [
            self.text,
            self.prompt.unwrap_or_default(),
            self.language.unwrap_or_default(),
            self.voice_id.unwrap_or_default(),
            self.provider,
        ]
        .join(" ")
    }
}

/// Produces filesystem-safe identifiers of the form `some-leading-words_3f9a0c12de`.
///
/// The word slug comes from the utterance text alone; the hash covers the whole
/// composite, so changing the voice or provider changes the name.
#[derive(Debug, Clone)]
pub struct FingerprintHasher {
    mode: FingerprintMode,
    max_words: usize,
    max_slug_len: usize,
    hash_len: usize,
}

impl FingerprintHasher {
    pub fn new(mode: FingerprintMode) -> Self {
        Self {
            mode,
            max_words: 6,
            max_slug_len: 48,
            hash_len: 10,
        }
    }

    pub fn stable() -> Self {
        Self::new(FingerprintMode::Stable)
    }

    pub fn unique() -> Self {
        Self::new(FingerprintMode::Unique)
    }

    pub fn with_max_words(mut self, n: usize) -> Self {
        self.max_words = n;
        self
    }

    /// Number of hex characters kept from the digest (clamped to 4..=64).
    pub fn with_hash_len(mut self, n: usize) -> Self {
        self.hash_len = n.clamp(4, 64);
        self
    }

    pub fn mode(&self) -> FingerprintMode {
        self.mode
    }

    pub fn fingerprint(&self, input: &FingerprintInput<'_>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(input.composite().as_bytes());
        if self.mode == FingerprintMode::Unique {
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or_default();
            hasher.update(nanos.to_le_bytes());
            hasher.update(uuid::Uuid::new_v4().as_bytes());
        }
        let digest: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        let hash = &digest[..self.hash_len];

        let slug = self.slug(input.text);
        if slug.is_empty() {
            hash.to_string()
        } else {
            format!("{}_{}", slug, hash)
        }
    }

    fn slug(&self, text: &str) -> String {
        let mut slug = String::new();
        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .take(self.max_words);
        for word in words {
            let word = word.to_lowercase();
            let extra = if slug.is_empty() { 0 } else { 1 };
            if slug.chars().count() + extra + word.chars().count() > self.max_slug_len {
                break;
            }
            if extra == 1 {
                slug.push('-');
            }
            slug.push_str(&word);
        }
        slug
    }
}

impl Default for FingerprintHasher {
    fn default() -> Self {
        Self::stable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(text: &'a str, voice: &'a str) -> FingerprintInput<'a> {
        FingerprintInput {
            text,
            prompt: None,
            language: Some("en-us"),
            voice_id: Some(voice),
            provider: "elevenlabs",
        }
    }

    #[test]
    fn test_stable_is_pure() {
        let hasher = FingerprintHasher::stable();
        let a = hasher.fingerprint(&input("Hello there, friend.", "v1"));
        let b = hasher.fingerprint(&input("Hello there, friend.", "v1"));
        assert_eq!(a, b);
        assert!(a.starts_with("hello-there-friend_"));
    }

    #[test]
    fn test_stable_depends_on_every_field() {
        let hasher = FingerprintHasher::stable();
        let base = hasher.fingerprint(&input("Hello", "v1"));
        assert_ne!(base, hasher.fingerprint(&input("Hello", "v2")));

        let mut other = input("Hello", "v1");
        other.provider = "resemble";
        assert_ne!(base, hasher.fingerprint(&other));

        let mut prompted = input("Hello", "v1");
        prompted.prompt = Some("calm");
        assert_ne!(base, hasher.fingerprint(&prompted));
    }

    #[test]
    fn test_unique_differs_across_calls() {
        let hasher = FingerprintHasher::unique();
        let a = hasher.fingerprint(&input("Hello", "v1"));
        let b = hasher.fingerprint(&input("Hello", "v1"));
        assert_ne!(a, b);
        assert!(a.starts_with("hello_"));
    }

    #[test]
    fn test_output_is_filesystem_safe() {
        let hasher = FingerprintHasher::stable();
        let id = hasher.fingerprint(&input("a/b\\c: \"d\" <e>?*|", "v1"));
        assert!(id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_slug_limits() {
        let hasher = FingerprintHasher::stable().with_max_words(2).with_hash_len(6);
        let id = hasher.fingerprint(&input("one two three four", "v1"));
        let (slug, hash) = id.split_once('_').unwrap();
        assert_eq!(slug, "one-two");
        assert_eq!(hash.len(), 6);
    }

    #[test]
    fn test_empty_text_yields_bare_hash() {
        let id = FingerprintHasher::stable().fingerprint(&input("...", "v1"));
        assert_eq!(id.len(), 10);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
