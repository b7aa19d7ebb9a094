use std::path::Path;

use super::audio_segment::AudioSegment;

/// Domain interface for decoding an audio file into model-ready samples.
pub trait AudioLoader: Send + Sync {
    /// Decode the file's audio track to mono PCM at `sample_rate`.
    fn load(&self, path: &Path, sample_rate: u32) -> Result<AudioSegment, Box<dyn std::error::Error>>;
}
