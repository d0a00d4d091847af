use std::collections::BTreeMap;
use thiserror::Error;

/// Structured error context shared by every error category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Offending input field (e.g. "ttsId", "precision"), set on validation failures.
    pub field: Option<String>,
    /// Provider id (e.g. "elevenlabs") when the failure happened inside a provider.
    pub provider: Option<String>,
    /// Free-form details: HTTP status, response body, I/O message, target path.
    pub details: BTreeMap<String, String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.insert(key.into(), value.to_string());
        self
    }
}

/// Unified error type for voicemix.
///
/// Validation errors are raised before any I/O happens. Provider errors cover
/// everything past that point: missing credentials, transport failures, remote
/// rejections and local write failures.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Provider error: {message}{}", format_context(.context))]
    Provider {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref provider) = ctx.provider {
        parts.push(format!("provider: {}", provider));
    }
    if let Some(ref field) = ctx.field {
        parts.push(format!("field: {}", field));
    }
    for (key, value) in &ctx.details {
        parts.push(format!("{}: {}", key, value));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Validation failure on a named input field.
    pub fn validation(msg: impl Into<String>, field: impl Into<String>) -> Self {
        Error::Validation {
            message: msg.into(),
            context: ErrorContext::new().with_field(field),
        }
    }

    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Provider-layer failure without extra details.
    pub fn provider(msg: impl Into<String>, provider: impl Into<String>) -> Self {
        Error::Provider {
            message: msg.into(),
            context: ErrorContext::new().with_provider(provider),
        }
    }

    pub fn provider_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Provider {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Error::Runtime {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    /// Taxonomy name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "ValidationError",
            Error::Provider { .. } => "ProviderError",
            Error::Configuration { .. } => "ConfigurationError",
            Error::Runtime { .. } => "RuntimeError",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::Validation { message, .. }
            | Error::Provider { message, .. }
            | Error::Configuration { message, .. }
            | Error::Runtime { message, .. } => message,
        }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Error::Validation { context, .. }
            | Error::Provider { context, .. }
            | Error::Configuration { context, .. }
            | Error::Runtime { context, .. } => context,
        }
    }

    pub fn field(&self) -> Option<&str> {
        self.context().field.as_deref()
    }

    pub fn provider_id(&self) -> Option<&str> {
        self.context().provider.as_deref()
    }

    pub fn details(&self) -> &BTreeMap<String, String> {
        &self.context().details
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    pub fn is_provider(&self) -> bool {
        matches!(self, Error::Provider { .. })
    }

    /// Multi-line, human-readable rendering for logs.
    ///
    /// ```text
    /// ProviderError: Failed to write audio file
    /// Provider: resemble
    /// Details:
    ///   error: permission denied
    ///   path: /out/a.mp3
    /// ```
    pub fn report(&self) -> String {
        let mut out = format!("{}: {}", self.name(), self.message());
        let ctx = self.context();
        match self {
            Error::Provider { .. } => {
                if let Some(ref provider) = ctx.provider {
                    out.push_str(&format!("\nProvider: {}", provider));
                }
            }
            Error::Validation { .. } | Error::Configuration { .. } => {
                if let Some(ref field) = ctx.field {
                    out.push_str(&format!("\nField: {}", field));
                }
            }
            Error::Runtime { .. } => {}
        }
        if !ctx.details.is_empty() {
            out.push_str("\nDetails:");
            for (key, value) in &ctx.details {
                out.push_str(&format!("\n  {}: {}", key, value));
            }
        }
        out
    }
}
