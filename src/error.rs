// src/error.rs - Error types for the moderation core

// Collaborator traits and file-backed adapters return `anyhow::Result`; the
// analysis pipeline reports one of these kinds so the engine can log it and
// fail open.

use thiserror::Error;

use crate::types::WordListKind;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ModerationError {
    #[error("Failed to compile pattern for word '{word}': {source}")]
    Pattern {
        word: String,
        #[source]
        source: regex::Error,
    },

    #[error("Cannot compile an empty word")]
    EmptyWord,

    #[error("Failed to fetch word list '{kind}': {reason}")]
    WordList { kind: WordListKind, reason: String },

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("An unexpected I/O error occurred: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ModerationResult<T> = std::result::Result<T, ModerationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_messages() {
        let error = ModerationError::WordList {
            kind: WordListKind::Humanities,
            reason: "file missing".to_string(),
        };
        assert_eq!(error.to_string(), "Failed to fetch word list 'humanities': file missing");
        assert_eq!(ModerationError::EmptyWord.to_string(), "Cannot compile an empty word");
    }

    #[test]
    fn test_pattern_error_keeps_source() {
        let source = regex::Regex::new("(").unwrap_err();
        let error = ModerationError::Pattern {
            word: "duck".to_string(),
            source,
        };
        assert!(error.to_string().starts_with("Failed to compile pattern for word 'duck'"));
        assert!(error.source().is_some());

        // Crosses into anyhow at the trait edges
        let wrapped: anyhow::Error = error.into();
        assert!(wrapped.downcast_ref::<ModerationError>().is_some());
    }
}
