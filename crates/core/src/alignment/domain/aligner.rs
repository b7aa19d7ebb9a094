use std::sync::Arc;

use thiserror::Error;

use crate::audio::domain::audio_segment::AudioSegment;
use crate::shared::worker_config::Device;
use crate::transcript::segment::Segment;

#[derive(Error, Debug)]
pub enum AlignerLoadError {
    #[error("no alignment model for language '{0}'")]
    UnsupportedLanguage(String),
    #[error("failed to load alignment model")]
    Load(#[source] Box<dyn std::error::Error>),
}

/// Domain interface for forced alignment.
///
/// Output has the same segments, in the same order, with the same text;
/// only segment and word timing is refined.
pub trait Aligner: Send + Sync {
    fn align(
        &self,
        segments: &[Segment],
        audio: &AudioSegment,
    ) -> Result<Vec<Segment>, Box<dyn std::error::Error>>;
}

/// Loads the alignment model for a language.
pub trait AlignerLoader: Send + Sync {
    fn load(&self, language: &str, device: Device) -> Result<Arc<dyn Aligner>, AlignerLoadError>;
}
