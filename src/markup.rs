//! Provider-conditional markup injection for outbound text.
//!
//! Only markup-capable providers see wrapped text. Wrapping order, innermost first:
//! `<prosody>` (rate/pitch), `<speak>` (prompt and its generation attributes),
//! `<lang>` (language tag).

use crate::provider::ProviderKind;

/// Markup inputs captured from a request snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkupOptions {
    pub prompt: Option<String>,
    pub language: Option<String>,
    pub temperature: Option<f32>,
    pub exaggeration: Option<f32>,
    pub prosody_rate: Option<String>,
    pub prosody_pitch: Option<String>,
    /// XML-escape attribute values. Off by default: values are concatenated verbatim.
    pub escape_attributes: bool,
}

impl MarkupOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn with_exaggeration(mut self, e: f32) -> Self {
        self.exaggeration = Some(e);
        self
    }

    pub fn with_prosody(mut self, rate: Option<&str>, pitch: Option<&str>) -> Self {
        self.prosody_rate = rate.map(str::to_string);
        self.prosody_pitch = pitch.map(str::to_string);
        self
    }

    pub fn with_escape_attributes(mut self, escape: bool) -> Self {
        self.escape_attributes = escape;
        self
    }

    fn attr(&self, name: &str, value: &str) -> String {
        if self.escape_attributes {
            format!("{}=\"{}\"", name, escape_attr(value))
        } else {
            format!("{}=\"{}\"", name, value)
        }
    }
}

/// Text actually sent to `provider` for `text`.
pub fn apply_markup(text: &str, options: &MarkupOptions, provider: ProviderKind) -> String {
    if !provider.supports_markup() {
        return text.to_string();
    }

    let mut out = text.to_string();

    let mut prosody = Vec::new();
    if let Some(rate) = non_empty(&options.prosody_rate) {
        prosody.push(options.attr("rate", rate));
    }
    if let Some(pitch) = non_empty(&options.prosody_pitch) {
        prosody.push(options.attr("pitch", pitch));
    }
    if !prosody.is_empty() {
        out = format!("<prosody {}>{}</prosody>", prosody.join(" "), out);
    }

    // temperature/exaggeration only ride along with a prompt
    if let Some(prompt) = non_empty(&options.prompt) {
        let mut speak = vec![options.attr("prompt", prompt)];
        if let Some(t) = options.temperature {
            speak.push(options.attr("temperature", &t.to_string()));
        }
        if let Some(e) = options.exaggeration {
            speak.push(options.attr("exaggeration", &e.to_string()));
        }
        out = format!("<speak {}>{}</speak>", speak.join(" "), out);
    }

    if let Some(lang) = non_empty(&options.language) {
        out = format!("<lang {}>{}</lang>", options.attr("xml:lang", lang), out);
    }

    out
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_and_language_wrap() {
        let opts = MarkupOptions::new()
            .with_prompt("calm")
            .with_language("en-us");
        assert_eq!(
            apply_markup("original text", &opts, ProviderKind::Resemble),
            r#"<lang xml:lang="en-us"><speak prompt="calm">original text</speak></lang>"#
        );
    }

    #[test]
    fn test_non_markup_provider_passes_through() {
        let opts = MarkupOptions::new()
            .with_prompt("calm")
            .with_language("en-us")
            .with_prosody(Some("90%"), None);
        for kind in [ProviderKind::ElevenLabs, ProviderKind::Cartesia] {
            assert_eq!(apply_markup("original text", &opts, kind), "original text");
        }
    }

    #[test]
    fn test_full_nesting_order() {
        let opts = MarkupOptions::new()
            .with_prompt("whisper")
            .with_temperature(0.8)
            .with_exaggeration(0.0)
            .with_language("es-us")
            .with_prosody(Some("110%"), Some("high"));
        assert_eq!(
            apply_markup("hola", &opts, ProviderKind::Resemble),
            concat!(
                r#"<lang xml:lang="es-us">"#,
                r#"<speak prompt="whisper" temperature="0.8" exaggeration="0">"#,
                r#"<prosody rate="110%" pitch="high">hola</prosody>"#,
                "</speak></lang>"
            )
        );
    }

    #[test]
    fn test_generation_attributes_need_a_prompt() {
        let opts = MarkupOptions::new().with_temperature(0.5);
        assert_eq!(apply_markup("x", &opts, ProviderKind::Resemble), "x");
    }

    #[test]
    fn test_prosody_only() {
        let opts = MarkupOptions::new().with_prosody(None, Some("low"));
        assert_eq!(
            apply_markup("x", &opts, ProviderKind::Resemble),
            r#"<prosody pitch="low">x</prosody>"#
        );
    }

    #[test]
    fn test_attribute_escaping_is_opt_in() {
        let raw = MarkupOptions::new().with_prompt(r#"say "hi""#);
        assert_eq!(
            apply_markup("x", &raw, ProviderKind::Resemble),
            r#"<speak prompt="say "hi"">x</speak>"#
        );

        let escaped = raw.with_escape_attributes(true);
        assert_eq!(
            apply_markup("<b>x</b>", &escaped, ProviderKind::Resemble),
            r#"<speak prompt="say &quot;hi&quot;"><b>x</b></speak>"#
        );
    }
}
