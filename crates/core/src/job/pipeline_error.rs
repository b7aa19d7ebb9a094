use std::backtrace::Backtrace;
use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::input::domain::audio_fetcher::FetchError;

/// Everything that can stop a job before it produces a transcript.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("failed to decode inline audio")]
    Decode(#[source] base64::DecodeError),
    #[error("failed to fetch audio from {url}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("failed to store audio in a temporary file")]
    Storage(#[source] std::io::Error),
    #[error("failed to load audio")]
    AudioLoad(#[source] Box<dyn StdError>),
    #[error("transcription failed")]
    Transcription(#[source] Box<dyn StdError>),
    #[error("no alignment model available for language '{language}'")]
    UnsupportedLanguage { language: String },
    #[error("alignment failed")]
    Alignment(#[source] Box<dyn StdError>),
    #[error("diarization failed")]
    Diarization(#[source] Box<dyn StdError>),
}

/// Stable tag for each failure class, as it appears in job output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    DecodeError,
    FetchError,
    StorageError,
    AudioLoadError,
    TranscriptionError,
    UnsupportedLanguage,
    AlignmentError,
    DiarizationError,
    Panic,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidInput(_) => ErrorKind::InvalidInput,
            PipelineError::Decode(_) => ErrorKind::DecodeError,
            PipelineError::Fetch { .. } => ErrorKind::FetchError,
            PipelineError::Storage(_) => ErrorKind::StorageError,
            PipelineError::AudioLoad(_) => ErrorKind::AudioLoadError,
            PipelineError::Transcription(_) => ErrorKind::TranscriptionError,
            PipelineError::UnsupportedLanguage { .. } => ErrorKind::UnsupportedLanguage,
            PipelineError::Alignment(_) => ErrorKind::AlignmentError,
            PipelineError::Diarization(_) => ErrorKind::DiarizationError,
        }
    }

    /// Structured arguments of the failure, for the job error payload.
    pub fn args(&self) -> Value {
        match self {
            PipelineError::InvalidInput(reason) => json!({ "reason": reason }),
            PipelineError::Fetch { url, source } => {
                let status = match source {
                    FetchError::Status(status) => Some(*status),
                    FetchError::Transport(_) => None,
                };
                json!({ "url": url, "status": status, "reason": source.to_string() })
            }
            PipelineError::UnsupportedLanguage { language } => json!({ "language": language }),
            PipelineError::Decode(e) => json!({ "reason": e.to_string() }),
            PipelineError::Storage(e) => json!({ "reason": e.to_string() }),
            PipelineError::AudioLoad(e)
            | PipelineError::Transcription(e)
            | PipelineError::Alignment(e)
            | PipelineError::Diarization(e) => json!({ "reason": e.to_string() }),
        }
    }
}

/// A pipeline error together with the stack captured where it surfaced.
#[derive(Debug)]
pub struct StageFailure {
    pub error: PipelineError,
    pub backtrace: Backtrace,
}

impl From<PipelineError> for StageFailure {
    fn from(error: PipelineError) -> Self {
        Self {
            error,
            backtrace: Backtrace::force_capture(),
        }
    }
}

/// One-line message: the error followed by each of its causes.
pub fn full_message(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Render an error and its `source()` chain, one cause per line.
pub fn error_chain(error: &dyn StdError) -> String {
    let mut lines = vec![format!("0: {error}")];
    let mut source = error.source();
    let mut depth = 1;
    while let Some(cause) = source {
        lines.push(format!("{depth}: {cause}"));
        source = cause.source();
        depth += 1;
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_kinds_are_distinct_for_stage_failures() {
        let errors = [
            PipelineError::Transcription("a".into()),
            PipelineError::Alignment("b".into()),
            PipelineError::Diarization("c".into()),
            PipelineError::UnsupportedLanguage {
                language: "xx".into(),
            },
        ];
        let kinds: Vec<ErrorKind> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::TranscriptionError,
                ErrorKind::AlignmentError,
                ErrorKind::DiarizationError,
                ErrorKind::UnsupportedLanguage,
            ]
        );
    }

    #[test]
    fn test_fetch_args_carry_status() {
        let err = PipelineError::Fetch {
            url: "https://example.com/a.mp3".into(),
            source: FetchError::Status(404),
        };
        let args = err.args();
        assert_eq!(args["url"], "https://example.com/a.mp3");
        assert_eq!(args["status"], 404);
        assert_eq!(err.to_string(), "failed to fetch audio from https://example.com/a.mp3");
        assert!(full_message(&err).contains("404"));
    }

    #[test]
    fn test_unsupported_language_message_names_language() {
        let err = PipelineError::UnsupportedLanguage {
            language: "tlh".into(),
        };
        assert!(err.to_string().contains("'tlh'"));
        assert_eq!(err.args()["language"], "tlh");
    }

    #[test]
    fn test_error_chain_names_each_cause_once() {
        let err = PipelineError::Fetch {
            url: "https://example.com/a.mp3".into(),
            source: FetchError::Status(503),
        };
        let chain = error_chain(&err);
        assert_eq!(chain.matches("503").count(), 1);
        assert!(chain.starts_with("0: failed to fetch audio from https://example.com/a.mp3\n1: "));
    }

    #[test]
    fn test_full_message_joins_causes() {
        let err = PipelineError::Alignment("model exploded".into());
        assert_eq!(full_message(&err), "alignment failed: model exploded");
    }

    #[test]
    fn test_error_chain_lists_sources() {
        let err = PipelineError::Storage(io::Error::new(io::ErrorKind::Other, "disk full"));
        let chain = error_chain(&err);
        assert!(chain.starts_with("0: failed to store audio"));
        assert!(chain.contains("1: disk full"));
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_value(ErrorKind::UnsupportedLanguage).unwrap();
        assert_eq!(json, "unsupported_language");
        let json = serde_json::to_value(ErrorKind::InvalidInput).unwrap();
        assert_eq!(json, "invalid_input");
    }
}
