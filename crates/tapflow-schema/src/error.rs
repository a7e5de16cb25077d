use std::fmt;

use thiserror::Error;

/// A single validation failure, located by a structural path into the
/// flow payload (e.g. `nodes[2].config.coordinate`).
///
/// Value-object and per-node validation fail fast with the first
/// violated constraint; flow-level validation aggregates these into a
/// [`ValidationErrors`] report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// A failure with no location yet. Callers attach one with [`Self::at`].
    pub fn message(message: impl Into<String>) -> Self {
        Self::new("", message)
    }

    /// Prepend a path segment, so leaf errors can bubble up with their
    /// full location (`config.clickDelay` → `nodes[3].config.clickDelay`).
    pub fn at(mut self, prefix: &str) -> Self {
        self.path = if self.path.is_empty() {
            prefix.to_string()
        } else if self.path.starts_with('[') {
            format!("{prefix}{}", self.path)
        } else {
            format!("{prefix}.{}", self.path)
        };
        self
    }
}

/// Every failure found while validating a flow payload. Flow validation
/// is all-or-nothing: either a fully typed flow, or this full report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.0.len())?;
        for err in &self.0 {
            write!(f, "\n  {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationError> for ValidationErrors {
    fn from(err: ValidationError) -> Self {
        Self(vec![err])
    }
}

/// Failure while ingesting a serialized flow: either the payload is not
/// valid JSON at all, or it is JSON that does not validate.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid flow JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}
