use serde::Deserialize;
use serde_json::{Map, Value};

use crate::diarization::domain::diarizer::SpeakerBounds;
use crate::job::pipeline_error::PipelineError;
use crate::shared::constants::DEFAULT_LANGUAGE_CODE;

/// The `input` mapping of one job.
///
/// Every field is optional on the wire; `null` is treated like an absent
/// field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub audio_base_64: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub diarize: Option<bool>,
    #[serde(default)]
    pub min_speakers: Option<u32>,
    #[serde(default)]
    pub max_speakers: Option<u32>,
    #[serde(default)]
    pub transcribe_options: Option<Map<String, Value>>,
}

/// Where the job's audio comes from. Exactly one source is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSource<'a> {
    Inline(&'a str),
    Remote(&'a str),
}

impl JobRequest {
    /// Parse the job's `input` mapping.
    pub fn from_value(input: &Value) -> Result<Self, PipelineError> {
        if !input.is_object() {
            return Err(PipelineError::InvalidInput(
                "job input must be a JSON object".to_string(),
            ));
        }
        Self::deserialize(input)
            .map_err(|e| PipelineError::InvalidInput(format!("malformed job input: {e}")))
    }

    /// Inline audio wins when present and non-empty; otherwise a URL with an
    /// HTTP scheme is used. `None` means the job carries no usable audio.
    pub fn audio_source(&self) -> Option<AudioSource<'_>> {
        if let Some(data) = self.audio_base_64.as_deref().filter(|d| !d.trim().is_empty()) {
            return Some(AudioSource::Inline(data));
        }
        self.audio_url
            .as_deref()
            .map(str::trim)
            .filter(|url| is_fetchable_url(url))
            .map(AudioSource::Remote)
    }

    pub fn language_code(&self) -> &str {
        self.language_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .unwrap_or(DEFAULT_LANGUAGE_CODE)
    }

    pub fn diarize(&self) -> bool {
        self.diarize.unwrap_or(false)
    }

    /// Speaker-count bounds, all or nothing: a single bound is ignored.
    pub fn speaker_bounds(&self) -> Option<SpeakerBounds> {
        match (self.min_speakers, self.max_speakers) {
            (Some(min), Some(max)) => Some(SpeakerBounds { min, max }),
            (Some(min), None) => {
                log::warn!("min_speakers={min} given without max_speakers; diarizing unbounded");
                None
            }
            (None, Some(max)) => {
                log::warn!("max_speakers={max} given without min_speakers; diarizing unbounded");
                None
            }
            (None, None) => None,
        }
    }

    pub fn transcribe_options(&self) -> Map<String, Value> {
        self.transcribe_options.clone().unwrap_or_default()
    }
}

fn is_fetchable_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let req = JobRequest::from_value(&json!({})).unwrap();
        assert_eq!(req.language_code(), "pl");
        assert!(!req.diarize());
        assert!(req.speaker_bounds().is_none());
        assert!(req.transcribe_options().is_empty());
        assert!(req.audio_source().is_none());
    }

    #[test]
    fn test_null_fields_behave_like_absent() {
        let req = JobRequest::from_value(&json!({
            "language_code": null,
            "diarize": null,
            "transcribe_options": null,
            "audio_url": null,
        }))
        .unwrap();
        assert_eq!(req.language_code(), "pl");
        assert!(!req.diarize());
        assert!(req.transcribe_options().is_empty());
    }

    #[test]
    fn test_inline_audio_wins_over_url() {
        let req = JobRequest::from_value(&json!({
            "audio_base_64": "AAAA",
            "audio_url": "https://example.com/a.mp3",
        }))
        .unwrap();
        assert_eq!(req.audio_source(), Some(AudioSource::Inline("AAAA")));
    }

    #[test]
    fn test_empty_inline_falls_back_to_url() {
        let req = JobRequest::from_value(&json!({
            "audio_base_64": "",
            "audio_url": "https://example.com/a.mp3",
        }))
        .unwrap();
        assert_eq!(
            req.audio_source(),
            Some(AudioSource::Remote("https://example.com/a.mp3"))
        );
    }

    #[rstest]
    #[case("ftp://example.com/a.mp3")]
    #[case("example.com/a.mp3")]
    #[case("")]
    #[case("httpx")]
    fn test_non_http_url_is_not_a_source(#[case] url: &str) {
        let req = JobRequest::from_value(&json!({ "audio_url": url })).unwrap();
        assert!(req.audio_source().is_none());
    }

    #[rstest]
    #[case(Some(1), Some(3), Some(SpeakerBounds { min: 1, max: 3 }))]
    #[case(Some(2), None, None)]
    #[case(None, Some(2), None)]
    #[case(None, None, None)]
    fn test_speaker_bounds_all_or_nothing(
        #[case] min: Option<u32>,
        #[case] max: Option<u32>,
        #[case] expected: Option<SpeakerBounds>,
    ) {
        let req = JobRequest {
            min_speakers: min,
            max_speakers: max,
            ..Default::default()
        };
        assert_eq!(req.speaker_bounds(), expected);
    }

    #[test]
    fn test_transcribe_options_pass_through_verbatim() {
        let req = JobRequest::from_value(&json!({
            "transcribe_options": {"temperature": 0.2, "custom": {"nested": [1, 2]}}
        }))
        .unwrap();
        let opts = req.transcribe_options();
        assert_eq!(opts["temperature"], json!(0.2));
        assert_eq!(opts["custom"], json!({"nested": [1, 2]}));
    }

    #[rstest]
    #[case(json!({"diarize": "yes"}))]
    #[case(json!({"min_speakers": -1}))]
    #[case(json!({"transcribe_options": [1, 2]}))]
    #[case(json!("not an object"))]
    fn test_malformed_input_is_invalid(#[case] input: Value) {
        let err = JobRequest::from_value(&input).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let req = JobRequest::from_value(&json!({"webhook": "x", "diarize": true})).unwrap();
        assert!(req.diarize());
    }
}
