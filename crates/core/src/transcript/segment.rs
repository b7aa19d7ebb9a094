use serde::{Deserialize, Serialize};

/// A single word inside a segment.
///
/// Timing is optional: words the aligner cannot place (digits, symbols
/// outside the model vocabulary) keep their text but carry no timestamps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

impl Word {
    pub fn untimed(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            start: None,
            end: None,
            score: None,
            speaker: None,
        }
    }

    pub fn timed(word: impl Into<String>, start: f64, end: f64, score: f32) -> Self {
        Self {
            word: word.into(),
            start: Some(start),
            end: Some(end),
            score: Some(score),
            speaker: None,
        }
    }

    /// `(start, end)` when both boundaries are known.
    pub fn span(&self) -> Option<(f64, f64)> {
        Some((self.start?, self.end?))
    }
}

/// A time-bounded unit of transcribed speech. Times are in seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<Word>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            words: Vec::new(),
            speaker: None,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Length of the intersection of two time ranges, `0.0` when disjoint.
pub fn overlap(a_start: f64, a_end: f64, b_start: f64, b_end: f64) -> f64 {
    (a_end.min(b_end) - a_start.max(b_start)).max(0.0)
}
