use std::sync::Arc;

use serde_json::{Map, Value};

use crate::audio::domain::audio_segment::AudioSegment;
use crate::shared::worker_config::{ComputeType, Device};
use crate::transcript::segment::Segment;

/// Everything a recognition model is bound to when it is loaded.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecognizerSpec {
    pub model: String,
    pub device: Device,
    pub compute_type: ComputeType,
    pub language: String,
}

/// Per-invocation parameters.
///
/// `options` is forwarded untouched from the job; only the backend decides
/// what its keys mean.
#[derive(Clone, Debug)]
pub struct TranscribeParams<'a> {
    pub language: &'a str,
    pub batch_size: usize,
    pub options: &'a Map<String, Value>,
}

/// Raw recognizer output: timed segments plus the language actually used.
#[derive(Clone, Debug, PartialEq)]
pub struct Transcription {
    pub segments: Vec<Segment>,
    pub language: String,
}

/// Domain interface for speech-to-text over a whole clip.
pub trait SpeechRecognizer: Send + Sync {
    fn transcribe(
        &self,
        audio: &AudioSegment,
        params: &TranscribeParams<'_>,
    ) -> Result<Transcription, Box<dyn std::error::Error>>;
}

/// Loads a recognition model for a given device/precision/language binding.
pub trait RecognizerLoader: Send + Sync {
    fn load(
        &self,
        spec: &RecognizerSpec,
    ) -> Result<Arc<dyn SpeechRecognizer>, Box<dyn std::error::Error>>;
}
