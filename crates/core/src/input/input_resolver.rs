use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::input::domain::audio_fetcher::AudioFetcher;
use crate::input::domain::audio_handle::AudioHandle;
use crate::job::job_request::{AudioSource, JobRequest};
use crate::job::pipeline_error::PipelineError;
use crate::shared::constants::NO_AUDIO_INPUT_MESSAGE;

/// Turns a job's declared audio source into a local temporary file.
pub struct InputResolver {
    fetcher: Box<dyn AudioFetcher>,
    temp_dir: Option<PathBuf>,
}

impl InputResolver {
    pub fn new(fetcher: Box<dyn AudioFetcher>) -> Self {
        Self {
            fetcher,
            temp_dir: None,
        }
    }

    /// Place temporary audio files in `dir` instead of the system temp dir.
    pub fn with_temp_dir(mut self, dir: PathBuf) -> Self {
        self.temp_dir = Some(dir);
        self
    }

    pub fn resolve(&self, request: &JobRequest) -> Result<AudioHandle, PipelineError> {
        let bytes = match request.audio_source() {
            Some(AudioSource::Inline(data)) => decode_inline(data)?,
            Some(AudioSource::Remote(url)) => {
                log::info!("Fetching audio from {url}");
                self.fetcher
                    .fetch(url)
                    .map_err(|source| PipelineError::Fetch {
                        url: url.to_string(),
                        source,
                    })?
            }
            None => {
                return Err(PipelineError::InvalidInput(
                    NO_AUDIO_INPUT_MESSAGE.to_string(),
                ))
            }
        };

        let handle = AudioHandle::persist(&bytes, self.temp_dir.as_deref())
            .map_err(PipelineError::Storage)?;
        log::debug!(
            "Stored {} bytes of audio at {}",
            bytes.len(),
            handle.path().display()
        );
        Ok(handle)
    }
}

/// Decode base64 audio, tolerating embedded whitespace and a data-URL prefix.
fn decode_inline(data: &str) -> Result<Vec<u8>, PipelineError> {
    let payload = match data.find(";base64,") {
        Some(idx) if data.starts_with("data:") => &data[idx + ";base64,".len()..],
        _ => data,
    };
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD.decode(compact).map_err(PipelineError::Decode)
}
