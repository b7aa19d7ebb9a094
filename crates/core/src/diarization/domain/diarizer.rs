use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audio::domain::audio_segment::AudioSegment;
use crate::shared::worker_config::Device;

/// Inclusive bounds on the number of distinct speakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeakerBounds {
    pub min: u32,
    pub max: u32,
}

/// One speaker-homogeneous time span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiarizationTurn {
    pub start: f64,
    pub end: f64,
    pub speaker: String,
}

impl DiarizationTurn {
    pub fn new(start: f64, end: f64, speaker: impl Into<String>) -> Self {
        Self {
            start,
            end,
            speaker: speaker.into(),
        }
    }
}

/// Domain interface for speaker diarization.
///
/// Returned turns are ordered by start time.
pub trait Diarizer: Send + Sync {
    fn diarize(
        &self,
        audio: &AudioSegment,
        bounds: Option<SpeakerBounds>,
    ) -> Result<Vec<DiarizationTurn>, Box<dyn std::error::Error>>;
}

/// Loads a diarizer; `credential` authorizes model downloads.
pub trait DiarizerLoader: Send + Sync {
    fn load(
        &self,
        credential: Option<&str>,
        device: Device,
    ) -> Result<Arc<dyn Diarizer>, Box<dyn std::error::Error>>;
}
