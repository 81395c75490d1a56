//! Error types for E2E scenarios

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which layer of the application a compared value was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Api,
    Database,
    Ui,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Layer::Api => "api",
            Layer::Database => "db",
            Layer::Ui => "ui",
        })
    }
}

/// A single field that did not hold the expected value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub layer: Layer,
    pub field: String,
    pub expected: String,
    /// `None` when the field was absent or null
    pub actual: Option<String>,
}

impl Mismatch {
    pub fn new(layer: Layer, field: impl Into<String>, expected: impl Into<String>, actual: Option<String>) -> Self {
        Self {
            layer,
            field: field.into(),
            expected: expected.into(),
            actual,
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.actual {
            Some(actual) => write!(
                f,
                "[{}] {}: expected '{}', got '{}'",
                self.layer, self.field, self.expected, actual
            ),
            None => write!(
                f,
                "[{}] {}: expected '{}', got nothing",
                self.layer, self.field, self.expected
            ),
        }
    }
}

/// Every mismatch found by one comparison, never truncated to the first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatches(pub Vec<Mismatch>);

impl Mismatches {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, mismatch: Mismatch) {
        self.0.push(mismatch);
    }

    pub fn extend(&mut self, other: Mismatches) {
        self.0.extend(other.0);
    }

    /// Names of the mismatching fields, in report order
    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|m| m.field.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mismatch> {
        self.0.iter()
    }

    /// `Ok(())` when empty, otherwise a `FieldMismatch` carrying all of them
    pub fn into_result(self) -> E2eResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(E2eError::FieldMismatch(self))
        }
    }
}

impl fmt::Display for Mismatches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} field(s) differ", self.0.len())?;
        for mismatch in &self.0 {
            write!(f, "\n  {}", mismatch)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Unknown role: '{0}'")]
    UnknownRole(String),

    #[error("Invalid fixture kind: '{0}'")]
    InvalidFixtureKind(String),

    #[error("Authentication failed (status {status}): {reason}")]
    Authentication { status: u16, reason: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Element not visible after {timeout_ms} ms: {locator}")]
    UiElementNotVisible { locator: String, timeout_ms: u64 },

    #[error("Field mismatch: {0}")]
    FieldMismatch(Mismatches),

    #[error("No {scope} mapping declared for field '{field}'")]
    MissingFieldMapping { scope: String, field: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Step needs {0}, but no earlier step provided it")]
    MissingContext(&'static str),

    #[error("Row {index} not found (query returned {available} row(s))")]
    RowNotFound { index: usize, available: usize },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Browser script did not finish within {timeout_ms} ms")]
    ScriptTimeout { timeout_ms: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;

/// Stable classification of a failure for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnknownRole,
    InvalidFixtureKind,
    Authentication,
    Transport,
    UiElementNotVisible,
    FieldMismatch,
    MissingFieldMapping,
    Config,
    MissingContext,
    RowNotFound,
    Database,
    Browser,
    Io,
}

impl FailureKind {
    /// True when the harness itself is misconfigured rather than the
    /// application under test misbehaving.
    pub fn is_harness_fault(self) -> bool {
        matches!(
            self,
            FailureKind::UnknownRole
                | FailureKind::InvalidFixtureKind
                | FailureKind::MissingFieldMapping
                | FailureKind::Config
                | FailureKind::MissingContext
                | FailureKind::Io
        )
    }
}

impl E2eError {
    pub fn kind(&self) -> FailureKind {
        match self {
            E2eError::UnknownRole(_) => FailureKind::UnknownRole,
            E2eError::InvalidFixtureKind(_) => FailureKind::InvalidFixtureKind,
            E2eError::Authentication { .. } => FailureKind::Authentication,
            E2eError::Transport(_) => FailureKind::Transport,
            E2eError::UiElementNotVisible { .. } => FailureKind::UiElementNotVisible,
            E2eError::FieldMismatch(_) => FailureKind::FieldMismatch,
            E2eError::MissingFieldMapping { .. } => FailureKind::MissingFieldMapping,
            E2eError::Config(_) | E2eError::Yaml(_) | E2eError::Toml(_) => FailureKind::Config,
            E2eError::MissingContext(_) => FailureKind::MissingContext,
            E2eError::RowNotFound { .. } => FailureKind::RowNotFound,
            E2eError::Database(_) => FailureKind::Database,
            E2eError::Browser(_) | E2eError::PlaywrightNotFound | E2eError::ScriptTimeout { .. } => {
                FailureKind::Browser
            }
            E2eError::Io(_) | E2eError::Json(_) => FailureKind::Io,
        }
    }

    /// The structured diff, if this is a field mismatch
    pub fn mismatches(&self) -> Option<&Mismatches> {
        match self {
            E2eError::FieldMismatch(m) => Some(m),
            _ => None,
        }
    }
}
