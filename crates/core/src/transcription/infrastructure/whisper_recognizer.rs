use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::domain::audio_segment::AudioSegment;
use crate::shared::constants::WHISPER_MODEL_BASE_URL;
use crate::shared::model_resolver;
use crate::shared::worker_config::ComputeType;
use crate::transcript::segment::Segment;
use crate::transcription::domain::speech_recognizer::{
    RecognizerLoader, RecognizerSpec, SpeechRecognizer, TranscribeParams, Transcription,
};

/// Option keys this backend understands; everything else is ignored.
const KNOWN_OPTIONS: &[&str] = &[
    "initial_prompt",
    "temperature",
    "beam_size",
    "best_of",
    "patience",
    "suppress_blank",
    "no_speech_threshold",
    "task",
];

/// Speech recognizer using whisper.cpp via whisper-rs.
pub struct WhisperRecognizer {
    ctx: WhisperContext,
}

impl WhisperRecognizer {
    pub fn new(model_path: &Path, use_gpu: bool) -> Result<Self, Box<dyn std::error::Error>> {
        if !model_path.exists() {
            return Err(format!("Whisper model not found at: {}", model_path.display()).into());
        }
        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(use_gpu);
        let ctx = WhisperContext::new_with_params(
            model_path.to_str().ok_or("Invalid model path")?,
            ctx_params,
        )
        .map_err(|e| format!("Failed to load Whisper model: {e}"))?;

        Ok(Self { ctx })
    }
}

impl SpeechRecognizer for WhisperRecognizer {
    fn transcribe(
        &self,
        audio: &AudioSegment,
        request: &TranscribeParams<'_>,
    ) -> Result<Transcription, Box<dyn std::error::Error>> {
        // whisper.cpp decodes one window at a time; batch size has no effect here.
        log::debug!("Whisper backend ignores batch_size={}", request.batch_size);
        for key in request.options.keys() {
            if !KNOWN_OPTIONS.contains(&key.as_str()) {
                log::debug!("Ignoring unsupported transcribe option '{key}'");
            }
        }

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| format!("Failed to create Whisper state: {e}"))?;

        let mut params = FullParams::new(sampling_strategy(request.options));
        params.set_language(Some(request.language));
        params.set_translate(option_str(request.options, "task") == Some("translate"));
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_n_threads(num_cpus().min(8) as i32);
        if let Some(prompt) = option_str(request.options, "initial_prompt") {
            params.set_initial_prompt(prompt);
        }
        if let Some(t) = option_f32(request.options, "temperature") {
            params.set_temperature(t);
        }
        if let Some(v) = request.options.get("suppress_blank").and_then(Value::as_bool) {
            params.set_suppress_blank(v);
        }
        if let Some(t) = option_f32(request.options, "no_speech_threshold") {
            params.set_no_speech_thold(t);
        }

        state
            .full(params, audio.samples())
            .map_err(|e| format!("Whisper inference failed: {e}"))?;

        let mut segments = Vec::new();
        let num_segments = state.full_n_segments();

        for seg_idx in 0..num_segments {
            let segment = match state.get_segment(seg_idx) {
                Some(s) => s,
                None => continue,
            };
            let text = segment
                .to_str()
                .map_err(|e| format!("Invalid text in segment {seg_idx}: {e}"))?;
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            // Segment timestamps are in centiseconds (10ms units)
            let start = segment.start_timestamp() as f64 / 100.0;
            let end = segment.end_timestamp() as f64 / 100.0;
            segments.push(Segment::new(start, end.max(start), text));
        }

        log::info!(
            "Whisper produced {} segments from {:.1}s of audio",
            segments.len(),
            audio.duration()
        );
        Ok(Transcription {
            segments,
            language: request.language.to_string(),
        })
    }
}

/// Loads ggml weights for the requested model and precision, downloading on
/// first use.
pub struct WhisperLoader {
    bundled_dir: Option<PathBuf>,
}

impl WhisperLoader {
    pub fn new(bundled_dir: Option<PathBuf>) -> Self {
        Self { bundled_dir }
    }
}

impl RecognizerLoader for WhisperLoader {
    fn load(
        &self,
        spec: &RecognizerSpec,
    ) -> Result<Arc<dyn SpeechRecognizer>, Box<dyn std::error::Error>> {
        let file_name = model_file_name(&spec.model, spec.compute_type);
        let url = format!("{WHISPER_MODEL_BASE_URL}/{file_name}");
        let model_path =
            model_resolver::resolve(&file_name, &url, self.bundled_dir.as_deref(), None)?;
        log::info!(
            "Loading Whisper model {} on {} for language '{}'",
            model_path.display(),
            spec.device,
            spec.language
        );
        Ok(Arc::new(WhisperRecognizer::new(
            &model_path,
            spec.device.is_gpu(),
        )?))
    }
}

/// Map a model name and precision onto a ggml weight file.
///
/// Integer precision selects the quantized weights; float precisions share
/// the full-precision file. Names already ending in `.bin` are used as-is.
pub fn model_file_name(model: &str, compute_type: ComputeType) -> String {
    if model.ends_with(".bin") {
        return model.to_string();
    }
    match compute_type {
        ComputeType::Int8 => format!("ggml-{model}-q5_0.bin"),
        ComputeType::Float16 | ComputeType::Float32 => format!("ggml-{model}.bin"),
    }
}

fn sampling_strategy(options: &Map<String, Value>) -> SamplingStrategy {
    match options.get("beam_size").and_then(Value::as_i64) {
        Some(beam_size) if beam_size > 1 => SamplingStrategy::BeamSearch {
            beam_size: beam_size as i32,
            patience: option_f32(options, "patience").unwrap_or(-1.0),
        },
        _ => SamplingStrategy::Greedy {
            best_of: options
                .get("best_of")
                .and_then(Value::as_i64)
                .unwrap_or(1) as i32,
        },
    }
}

fn option_str<'a>(options: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    options.get(key).and_then(Value::as_str)
}

fn option_f32(options: &Map<String, Value>, key: &str) -> Option<f32> {
    options.get(key).and_then(Value::as_f64).map(|v| v as f32)
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
