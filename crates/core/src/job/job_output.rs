use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::job::pipeline_error::{error_chain, full_message, ErrorKind, StageFailure};
use crate::transcript::segment::{Segment, Word};

/// The transcript a successful job returns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub segments: Vec<Segment>,
    pub word_segments: Vec<Word>,
    pub language: String,
}

impl PipelineResult {
    pub fn new(segments: Vec<Segment>, language: impl Into<String>) -> Self {
        let word_segments = segments
            .iter()
            .flat_map(|s| s.words.iter().cloned())
            .collect();
        Self {
            segments,
            word_segments,
            language: language.into(),
        }
    }
}

/// Descriptive failure value returned in place of a transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
    pub args: Value,
    pub traceback: String,
}

impl JobError {
    pub fn from_failure(failure: &StageFailure) -> Self {
        Self {
            kind: failure.error.kind(),
            message: full_message(&failure.error),
            args: failure.error.args(),
            traceback: format!(
                "Error chain:\n{}\n\nStack backtrace:\n{}",
                error_chain(&failure.error),
                failure.backtrace
            ),
        }
    }

    pub fn from_panic(payload: &(dyn Any + Send), backtrace: &Backtrace) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "pipeline stage panicked".to_string()
        };
        Self {
            kind: ErrorKind::Panic,
            message: format!("pipeline stage panicked: {message}"),
            args: json!({ "reason": message }),
            traceback: format!("Stack backtrace:\n{backtrace}"),
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error transcribing audio: {}, Args: {}, Traceback: {}",
            self.message, self.args, self.traceback
        )
    }
}

/// What a job hands back to the harness: a transcript or an error, never a
/// fault.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutput {
    Success { result: PipelineResult },
    Failure { error: JobError },
}

impl JobOutput {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutput::Success { .. })
    }

    pub fn result(&self) -> Option<&PipelineResult> {
        match self {
            JobOutput::Success { result } => Some(result),
            JobOutput::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&JobError> {
        match self {
            JobOutput::Success { .. } => None,
            JobOutput::Failure { error } => Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::pipeline_error::PipelineError;

    #[test]
    fn test_result_collects_word_segments_in_order() {
        let mut a = Segment::new(0.0, 1.0, "one two");
        a.words = vec![Word::timed("one", 0.0, 0.4, 0.9), Word::timed("two", 0.5, 1.0, 0.8)];
        let mut b = Segment::new(1.5, 2.0, "three");
        b.words = vec![Word::untimed("three")];

        let result = PipelineResult::new(vec![a, b], "en");

        let words: Vec<&str> = result.word_segments.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(words, vec!["one", "two", "three"]);
        assert_eq!(result.language, "en");
    }

    #[test]
    fn test_job_error_from_failure() {
        let failure = StageFailure::from(PipelineError::Alignment("model exploded".into()));
        let err = JobError::from_failure(&failure);

        assert_eq!(err.kind, ErrorKind::AlignmentError);
        assert_eq!(err.message, "alignment failed: model exploded");
        assert_eq!(err.args["reason"], "model exploded");
        assert!(err.traceback.contains("Error chain:"));
        assert!(err.traceback.contains("Stack backtrace:"));
    }

    #[test]
    fn test_job_error_from_panic_payloads() {
        let bt = Backtrace::force_capture();
        let err = JobError::from_panic(&"index out of bounds", &bt);
        assert_eq!(err.kind, ErrorKind::Panic);
        assert!(err.message.contains("index out of bounds"));

        let err = JobError::from_panic(&String::from("owned message"), &bt);
        assert!(err.message.contains("owned message"));

        let err = JobError::from_panic(&42u32, &bt);
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_display_mirrors_legacy_error_string() {
        let failure = StageFailure::from(PipelineError::Transcription("cuda oom".into()));
        let text = JobError::from_failure(&failure).to_string();
        assert!(text.starts_with("Error transcribing audio: transcription failed: cuda oom"));
        assert!(text.contains("Args: "));
        assert!(text.contains("Traceback: "));
    }

    #[test]
    fn test_output_is_tagged() {
        let ok = JobOutput::Success {
            result: PipelineResult::new(vec![], "pl"),
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["result"]["language"], "pl");

        let failure = StageFailure::from(PipelineError::InvalidInput("No audio input provided".into()));
        let err = JobOutput::Failure {
            error: JobError::from_failure(&failure),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["error"]["kind"], "invalid_input");
        assert_eq!(json["error"]["message"], "No audio input provided");
    }
}
