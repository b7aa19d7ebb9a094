use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ndarray::{Array2, Axis, Ix3};
use thiserror::Error;

use crate::alignment::domain::aligner::{Aligner, AlignerLoadError, AlignerLoader};
use crate::alignment::domain::transcript_alignment::{align_segments, Vocabulary};
use crate::alignment::infrastructure::alignment_models::AlignmentModel;
use crate::audio::domain::audio_segment::AudioSegment;
use crate::shared::constants::ALIGNMENT_MODEL_BASE_URL;
use crate::shared::execution_provider::build_session;
use crate::shared::model_resolver;
use crate::shared::worker_config::Device;
use crate::transcript::segment::Segment;

/// Forced aligner over a wav2vec2 CTC model exported to ONNX.
///
/// Input is `[1, samples]` float audio at 16 kHz; output is
/// `[1, frames, vocabulary]` logits.
pub struct Wav2Vec2Aligner {
    session: Mutex<ort::session::Session>,
    vocab: Vocabulary,
}

impl Wav2Vec2Aligner {
    pub fn new(
        model_path: &Path,
        vocab_path: &Path,
        device: Device,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let vocab = read_vocabulary(vocab_path)?;
        let session = build_session(model_path, device)?;
        Ok(Self {
            session: Mutex::new(session),
            vocab,
        })
    }

    /// Per-frame log-probabilities for a slice of audio.
    fn emissions(&self, samples: &[f32]) -> Result<Array2<f32>, Box<dyn std::error::Error>> {
        let input = Array2::from_shape_vec((1, samples.len()), normalize(samples))?;
        let input_value = ort::value::Tensor::from_array(input)?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        let logits = outputs[0].try_extract_array::<f32>()?;
        let logits = logits.into_dimensionality::<Ix3>()?;
        let mut emission = logits.index_axis(Axis(0), 0).to_owned();
        for mut row in emission.rows_mut() {
            log_softmax(row.as_slice_mut().ok_or("Non-contiguous logits")?);
        }
        Ok(emission)
    }
}

impl Aligner for Wav2Vec2Aligner {
    fn align(
        &self,
        segments: &[Segment],
        audio: &AudioSegment,
    ) -> Result<Vec<Segment>, Box<dyn std::error::Error>> {
        align_segments(segments, audio, &self.vocab, |samples| self.emissions(samples))
    }
}

/// Resolves the per-language checkpoint and builds an aligner for it.
pub struct Wav2Vec2Loader {
    bundled_dir: Option<PathBuf>,
    base_url: String,
}

impl Wav2Vec2Loader {
    pub fn new(bundled_dir: Option<PathBuf>) -> Self {
        Self {
            bundled_dir,
            base_url: ALIGNMENT_MODEL_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn resolve_file(&self, model: &AlignmentModel, file: &str) -> Result<PathBuf, AlignerLoadError> {
        model_resolver::resolve(
            &model.local_name(file),
            &model.url(&self.base_url, file),
            self.bundled_dir.as_deref(),
            None,
        )
        .map_err(|e| AlignerLoadError::Load(Box::new(e)))
    }

    /// The ONNX export is never downloaded; it must already be provisioned.
    fn find_onnx(&self, model: &AlignmentModel) -> Result<PathBuf, AlignerLoadError> {
        let name = model.local_name(AlignmentModel::onnx_file());
        model_resolver::find_local(&name, self.bundled_dir.as_deref())
            .map_err(|e| AlignerLoadError::Load(Box::new(e)))?
            .ok_or_else(|| {
                let expected = match &self.bundled_dir {
                    Some(dir) => dir.join(&name),
                    None => PathBuf::from(&name),
                };
                AlignerLoadError::Load(Box::new(MissingOnnxExport {
                    repo: model.repo,
                    expected,
                }))
            })
    }
}

#[derive(Error, Debug)]
#[error(
    "no ONNX export of {repo} found; run `optimum-cli export onnx --model {repo} <dir>` \
     and place model.onnx at {}",
    .expected.display()
)]
pub struct MissingOnnxExport {
    pub repo: &'static str,
    pub expected: PathBuf,
}

impl AlignerLoader for Wav2Vec2Loader {
    fn load(&self, language: &str, device: Device) -> Result<Arc<dyn Aligner>, AlignerLoadError> {
        let model = AlignmentModel::for_language(language)
            .ok_or_else(|| AlignerLoadError::UnsupportedLanguage(language.to_string()))?;
        let model_path = self.find_onnx(&model)?;
        let vocab_path = self.resolve_file(&model, AlignmentModel::vocab_file())?;
        log::info!("Loading alignment model {} on {device}", model.repo);
        let aligner =
            Wav2Vec2Aligner::new(&model_path, &vocab_path, device).map_err(AlignerLoadError::Load)?;
        Ok(Arc::new(aligner))
    }
}

fn read_vocabulary(path: &Path) -> Result<Vocabulary, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let entries: HashMap<String, usize> = serde_json::from_str(&text)?;
    if entries.is_empty() {
        return Err(format!("Empty vocabulary in {}", path.display()).into());
    }
    Ok(Vocabulary::from_entries(&entries))
}

/// Zero mean, unit variance, as the feature extractor expects.
fn normalize(samples: &[f32]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
    let var = samples
        .iter()
        .map(|&s| (s as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    let std = (var + 1e-7).sqrt();
    samples
        .iter()
        .map(|&s| ((s as f64 - mean) / std) as f32)
        .collect()
}

fn log_softmax(row: &mut [f32]) {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let sum: f32 = row.iter().map(|&x| (x - max).exp()).sum();
    let log_sum = max + sum.ln();
    for x in row.iter_mut() {
        *x -= log_sum;
    }
}
