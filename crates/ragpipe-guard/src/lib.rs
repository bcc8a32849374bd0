//! Input/output guardrails: length limits, blocked-content patterns,
//! PII detection and masking.
//!
//! Validation never panics and never returns an error. Every check
//! resolves to a [`Verdict`] so callers decide what a rejection means
//! for their request.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Category of personally identifiable information a pattern detects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PiiKind {
    Ssn,
    CreditCard,
    Email,
}

impl PiiKind {
    /// Short tag used in warnings and redaction markers.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ssn => "SSN",
            Self::CreditCard => "CC",
            Self::Email => "EMAIL",
        }
    }
}

/// Outcome of a validation check.
///
/// `Pass` may carry a warning (PII detected in input is allowed through
/// but flagged); `Blocked` carries a user-facing message explaining the
/// rejection without echoing the offending content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass {
        warning: Option<String>,
        pii: Vec<PiiKind>,
    },
    Blocked {
        message: String,
    },
}

impl Verdict {
    #[must_use]
    pub const fn pass() -> Self {
        Self::Pass {
            warning: None,
            pii: Vec::new(),
        }
    }

    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self, Self::Pass { .. })
    }

    /// The rejection message, if blocked.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Blocked { message } => Some(message),
            Self::Pass { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    pub enabled: bool,
    pub max_input_length: usize,
    pub max_output_length: usize,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_input_length: 2000,
            max_output_length: 4000,
        }
    }
}

// Content categories that are rejected outright, in either direction.
static BLOCKED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(hack|exploit|vulnerability|malware|phishing)",
        r"(?i)(password|credential|api[_\s]?key|secret[_\s]?key)",
        r"(?i)(inject|sql|xss|csrf)",
        r"(?i)(bypass|circumvent|override)\s+(security|safety)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("blocked-content regex is valid"))
    .collect()
});

static PII_PATTERNS: LazyLock<Vec<(Regex, PiiKind)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("SSN regex is valid"),
            PiiKind::Ssn,
        ),
        (
            Regex::new(r"\b\d{16}\b").expect("credit card regex is valid"),
            PiiKind::CreditCard,
        ),
        (
            Regex::new(r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b")
                .expect("email regex is valid"),
            PiiKind::Email,
        ),
    ]
});

fn blocked_match(text: &str) -> Option<&'static str> {
    const NAMES: &[&str] = &["harmful-content", "credential-terms", "injection", "bypass"];
    BLOCKED_PATTERNS
        .iter()
        .position(|p| p.is_match(text))
        .map(|i| NAMES[i])
}

fn detect_pii(text: &str) -> Vec<PiiKind> {
    PII_PATTERNS
        .iter()
        .filter(|(pattern, _)| pattern.is_match(text))
        .map(|&(_, kind)| kind)
        .collect()
}

/// Stateless validator applying the configured limits and pattern tables.
#[derive(Debug, Clone)]
pub struct Guardrails {
    config: GuardrailConfig,
}

impl Guardrails {
    #[must_use]
    pub fn new(config: GuardrailConfig) -> Self {
        Self { config }
    }

    /// A validator that passes everything through unchanged.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(GuardrailConfig {
            enabled: false,
            ..GuardrailConfig::default()
        })
    }

    /// Validate user input before it reaches retrieval or generation.
    ///
    /// Over-length, empty, and blocked-content inputs are rejected. PII in
    /// input passes with a warning; the match positions are logged, never
    /// the matched text.
    #[must_use]
    pub fn validate_input(&self, text: &str) -> Verdict {
        if !self.config.enabled {
            return Verdict::pass();
        }

        let length = text.chars().count();
        if length > self.config.max_input_length {
            return Verdict::Blocked {
                message: format!(
                    "Input exceeds maximum length of {} characters",
                    self.config.max_input_length
                ),
            };
        }

        if text.trim().is_empty() {
            return Verdict::Blocked {
                message: "Input cannot be empty".to_owned(),
            };
        }

        if let Some(category) = blocked_match(text) {
            tracing::warn!(category, "input blocked by guardrail pattern");
            return Verdict::Blocked {
                message: "Input contains potentially unsafe content. Please rephrase your query."
                    .to_owned(),
            };
        }

        let pii = detect_pii(text);
        if pii.is_empty() {
            return Verdict::pass();
        }

        let kinds: Vec<&str> = pii.iter().map(|k| k.label()).collect();
        tracing::warn!(kinds = ?kinds, "PII detected in input");
        Verdict::Pass {
            warning: Some(format!(
                "Detected potential PII: {}. Please avoid sharing sensitive information.",
                kinds.join(", ")
            )),
            pii,
        }
    }

    /// Validate generated output before it is returned to the caller.
    ///
    /// Unlike input, PII here is a hard block: a leaked identifier must
    /// never leave the pipeline.
    #[must_use]
    pub fn validate_output(&self, text: &str) -> Verdict {
        if !self.config.enabled {
            return Verdict::pass();
        }

        if text.chars().count() > self.config.max_output_length {
            tracing::warn!("output exceeds maximum length");
            return Verdict::Blocked {
                message: "Response too long. Please try a more specific query.".to_owned(),
            };
        }

        if let Some(category) = blocked_match(text) {
            tracing::warn!(category, "output blocked by guardrail pattern");
            return Verdict::Blocked {
                message: "I cannot provide that information. Please ask a different question."
                    .to_owned(),
            };
        }

        let pii = detect_pii(text);
        if !pii.is_empty() {
            let kinds: Vec<&str> = pii.iter().map(|k| k.label()).collect();
            tracing::error!(kinds = ?kinds, "PII leaked in output");
            return Verdict::Blocked {
                message: "I apologize, but I cannot provide that response for privacy reasons."
                    .to_owned(),
            };
        }

        Verdict::pass()
    }

    /// Mask every PII match with `[{KIND}_REDACTED]`.
    ///
    /// Runs regardless of the `enabled` flag so stored text is always
    /// masked. Returns `Cow::Borrowed` when nothing matched.
    #[must_use]
    pub fn sanitize<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut result = Cow::Borrowed(text);
        for (pattern, kind) in PII_PATTERNS.iter() {
            let marker = format!("[{}_REDACTED]", kind.label());
            match pattern.replace_all(&result, marker.as_str()) {
                Cow::Borrowed(_) => {}
                Cow::Owned(s) => result = Cow::Owned(s),
            }
        }
        result
    }
}

impl Default for Guardrails {
    fn default() -> Self {
        Self::new(GuardrailConfig::default())
    }
}
