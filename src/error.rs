//! Error types for rulegate.
//!
//! All errors are strongly typed using thiserror. Errors are grouped by
//! concern (parsing, hooks) with a top-level [`RuleError`] wrapper so
//! callers can pattern match on specific failure conditions.

use thiserror::Error;

/// Errors raised while parsing tag expressions or rule text.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed tag pair '{pair}': expected key=value")]
    MalformedTag { pair: String },

    #[error("Empty tag key in expression '{expr}'")]
    EmptyTagKey { expr: String },

    #[error("Empty tag value for key '{key}'")]
    EmptyTagValue { key: String },

    #[error("Duplicate tag key '{key}'")]
    DuplicateTagKey { key: String },

    #[error("Line {line}: expected 'kind name {{', got '{text}'")]
    MalformedSectionHeader { line: usize, text: String },

    #[error("Line {line}: unknown section kind '{kind}'")]
    UnknownSectionKind { line: usize, kind: String },

    #[error("Unterminated section '{name}' starting at line {line}")]
    UnterminatedSection { name: String, line: usize },

    #[error("Line {line}: expected 'key = value', got '{text}'")]
    MalformedBodyLine { line: usize, text: String },

    #[error("Line {line}: unknown key '{key}' in {kind} '{name}'")]
    UnknownKey {
        line: usize,
        key: String,
        kind: String,
        name: String,
    },

    #[error("Duplicate {kind} definition '{name}'")]
    DuplicateDefinition { kind: String, name: String },

    #[error("{kind} '{name}' references unknown {target_kind} '{target}'")]
    UnknownReference {
        kind: String,
        name: String,
        target_kind: String,
        target: String,
    },

    #[error("Notification '{name}' declares no delivery action")]
    NoAction { name: String },

    #[error("Lookup '{name}' entry {index} declares guard keys {got:?}, expected {expected:?}")]
    MismatchedEntryKeys {
        name: String,
        index: usize,
        got: Vec<String>,
        expected: Vec<String>,
    },

    #[error("Invalid duration '{value}': expected e.g. 30s, 5m, 1h, 2d")]
    InvalidDuration { value: String },

    #[error("Invalid boolean '{value}': expected true or false")]
    InvalidBool { value: String },

    #[error("Invalid integer '{value}'")]
    InvalidInteger { value: String },
}

/// Errors raised by save-hook construction or invocation.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Hook command '{command}' not found on the search path")]
    NotFound { command: String },

    #[error("Failed to launch hook command '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Hook command '{command}' exited with {status}: {stderr}")]
    NonZeroExit {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Top-level error type for rulegate operations.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid squelch pattern for tag '{key}': {source}")]
    Regex {
        key: String,
        #[source]
        source: Box<regex::Error>,
    },

    #[error("Hook error: {0}")]
    Hook(#[from] HookError),

    #[error("Validation failed for {kind} '{name}': {source}")]
    Validation {
        kind: String,
        name: String,
        #[source]
        source: Box<RuleError>,
    },

    #[error("Cannot delete unknown {kind} '{name}'")]
    DeleteUnknown { kind: String, name: String },

    #[error("Reload failed: {source}")]
    Reload {
        #[source]
        source: Box<RuleError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuleError {
    /// Returns true if this is a parse error.
    #[must_use]
    pub const fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    /// Returns true if this is a hook error.
    #[must_use]
    pub const fn is_hook(&self) -> bool {
        matches!(self, Self::Hook(_))
    }

    /// Returns true if this error came from a reload, meaning the text
    /// was already persisted but the new configuration is unusable.
    #[must_use]
    pub const fn is_reload(&self) -> bool {
        matches!(self, Self::Reload { .. })
    }
}

/// Result type alias for rulegate operations.
pub type RuleResult<T> = Result<T, RuleError>;
