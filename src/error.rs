//! Error types for sqltrans.

use thiserror::Error;

use crate::tree::NodeId;

/// The main error type for translation operations.
#[derive(Debug, Error)]
pub enum TransError {
    /// No registered route connects the two dialects.
    #[error("Couldn't find {src} to {tgt} translation")]
    TranslationNotFound { src: String, tgt: String },

    /// A translation is already registered for the pair.
    #[error("Translation from {src} to {tgt} already exists. Use overwrite if you want to replace it")]
    DuplicateTranslation { src: String, tgt: String },

    /// A node is no longer held by its recorded parent.
    #[error("Stale reference: node {node} is not attached to its recorded parent")]
    StaleReference { node: NodeId },

    /// A rule predicate or action failed.
    #[error("Rule '{rule}' failed at {location}: {source}")]
    RuleApplication {
        rule: String,
        location: String,
        #[source]
        source: anyhow::Error,
    },

    /// Failed to lex or parse SQL text.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Input held a different number of statements than the call allows.
    #[error("Expected {expected} statement(s), found {found}")]
    StatementCount { expected: usize, found: usize },

    /// The built-in dialects of the global translator failed to register.
    #[error("Built-in dialects unavailable: {0}")]
    Builtin(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransError {
    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create a not-found error for a dialect pair.
    pub fn not_found(src: &str, tgt: &str) -> Self {
        Self::TranslationNotFound {
            src: src.to_string(),
            tgt: tgt.to_string(),
        }
    }

    /// Create a duplicate registration error for a dialect pair.
    pub fn duplicate(src: &str, tgt: &str) -> Self {
        Self::DuplicateTranslation {
            src: src.to_string(),
            tgt: tgt.to_string(),
        }
    }
}

/// Result type alias for translation operations.
pub type TransResult<T> = Result<T, TransError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransError::parse(5, "unexpected character");
        assert_eq!(
            err.to_string(),
            "Parse error at position 5: unexpected character"
        );
    }

    #[test]
    fn test_not_found_names_pair() {
        let err = TransError::not_found("mysql", "oracle");
        assert_eq!(err.to_string(), "Couldn't find mysql to oracle translation");
    }

    #[test]
    fn test_statement_count_display() {
        let err = TransError::StatementCount {
            expected: 1,
            found: 2,
        };
        assert_eq!(err.to_string(), "Expected 1 statement(s), found 2");
    }

    #[test]
    fn test_rule_error_keeps_source() {
        let err = TransError::RuleApplication {
            rule: "limit".to_string(),
            location: "Statement[3]".to_string(),
            source: anyhow::anyhow!("bad limit"),
        };
        assert!(err.to_string().contains("limit"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
