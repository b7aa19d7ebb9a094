use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ndarray::Axis;

use crate::audio::domain::audio_segment::AudioSegment;
use crate::diarization::domain::diarizer::{
    DiarizationTurn, Diarizer, DiarizerLoader, SpeakerBounds,
};
use crate::diarization::infrastructure::fbank::FbankExtractor;
use crate::diarization::infrastructure::speaker_clustering::{self, l2_normalize};
use crate::shared::constants::{SPEAKER_EMBEDDING_MODEL_NAME, SPEAKER_EMBEDDING_MODEL_URL};
use crate::shared::execution_provider::build_session;
use crate::shared::model_resolver;
use crate::shared::worker_config::Device;

const WINDOW_SECONDS: f64 = 1.5;
const HOP_SECONDS: f64 = 0.75;
/// Shorter audio is not worth embedding.
const MIN_WINDOW_SECONDS: f64 = 0.5;
/// Roughly -60 dBFS.
const SILENCE_RMS: f32 = 1e-3;

/// Maps a window of 16 kHz mono audio to a speaker embedding.
pub trait SpeakerEmbedder: Send + Sync {
    fn embed(&self, samples: &[f32]) -> Result<Vec<f32>, Box<dyn std::error::Error>>;
}

/// Wespeaker ResNet embedding model over log-mel features.
///
/// Input `[1, frames, 80]`, output `[1, dim]`.
pub struct OnnxSpeakerEmbedder {
    session: Mutex<ort::session::Session>,
    fbank: FbankExtractor,
}

impl OnnxSpeakerEmbedder {
    pub fn new(
        model_path: &Path,
        device: Device,
        sample_rate: u32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: Mutex::new(build_session(model_path, device)?),
            fbank: FbankExtractor::new(sample_rate),
        })
    }
}

impl SpeakerEmbedder for OnnxSpeakerEmbedder {
    fn embed(&self, samples: &[f32]) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let feats = self.fbank.compute(samples);
        if feats.nrows() == 0 {
            return Err("Window too short for feature extraction".into());
        }
        let input_value = ort::value::Tensor::from_array(feats.insert_axis(Axis(0)))?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let embedding = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?
            .to_vec();
        Ok(embedding)
    }
}

/// Sliding-window diarizer: embed overlapping windows, cluster the
/// embeddings, then stitch same-speaker windows into turns.
pub struct EmbeddingDiarizer {
    embedder: Box<dyn SpeakerEmbedder>,
    threshold: f64,
}

impl EmbeddingDiarizer {
    pub fn new(embedder: Box<dyn SpeakerEmbedder>, threshold: f64) -> Self {
        Self {
            embedder,
            threshold,
        }
    }
}

/// One analysis window and the stretch of time it speaks for.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Window {
    start: f64,
    end: f64,
    own_start: f64,
    own_end: f64,
}

fn windows(duration: f64) -> Vec<Window> {
    if duration < MIN_WINDOW_SECONDS {
        return Vec::new();
    }
    if duration <= WINDOW_SECONDS {
        return vec![Window {
            start: 0.0,
            end: duration,
            own_start: 0.0,
            own_end: duration,
        }];
    }

    let mut starts = Vec::new();
    let mut start = 0.0;
    while start + WINDOW_SECONDS <= duration + 1e-9 {
        starts.push(start);
        start += HOP_SECONDS;
    }
    let last_end = starts.last().map(|s| s + WINDOW_SECONDS).unwrap_or(0.0);
    if duration - last_end > 1e-9 {
        starts.push(duration - WINDOW_SECONDS);
    }

    let margin = (WINDOW_SECONDS - HOP_SECONDS) / 2.0;
    let mut result: Vec<Window> = starts
        .iter()
        .map(|&s| Window {
            start: s,
            end: s + WINDOW_SECONDS,
            own_start: s + margin,
            own_end: s + margin + HOP_SECONDS,
        })
        .collect();
    for i in 1..result.len() {
        // Tail window may overlap its predecessor by more than a hop.
        result[i].own_start = result[i - 1].own_end;
    }
    if let Some(first) = result.first_mut() {
        first.own_start = 0.0;
    }
    if let Some(last) = result.last_mut() {
        last.own_end = duration;
    }
    result
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

impl Diarizer for EmbeddingDiarizer {
    fn diarize(
        &self,
        audio: &AudioSegment,
        bounds: Option<SpeakerBounds>,
    ) -> Result<Vec<DiarizationTurn>, Box<dyn std::error::Error>> {
        let mut voiced: Vec<(usize, Window)> = Vec::new();
        let mut embeddings = Vec::new();
        for (index, window) in windows(audio.duration()).into_iter().enumerate() {
            let samples = audio.slice(window.start, window.end);
            if rms(samples) < SILENCE_RMS {
                continue;
            }
            let mut embedding = self.embedder.embed(samples)?;
            l2_normalize(&mut embedding);
            embeddings.push(embedding);
            voiced.push((index, window));
        }
        log::debug!(
            "Embedded {} voiced windows from {:.1}s of audio",
            voiced.len(),
            audio.duration()
        );

        let labels = speaker_clustering::cluster(&embeddings, self.threshold, bounds);

        let mut turns: Vec<DiarizationTurn> = Vec::new();
        let mut previous_index: Option<usize> = None;
        for ((index, window), label) in voiced.iter().zip(&labels) {
            let speaker = format!("SPEAKER_{label:02}");
            let adjacent = previous_index.map(|p| p + 1 == *index).unwrap_or(false);
            match turns.last_mut() {
                Some(turn) if adjacent && turn.speaker == speaker => turn.end = window.own_end,
                _ => turns.push(DiarizationTurn::new(window.own_start, window.own_end, speaker)),
            }
            previous_index = Some(*index);
        }

        let speakers = labels.iter().max().map(|m| m + 1).unwrap_or(0);
        log::info!("Diarization found {speakers} speakers in {} turns", turns.len());
        Ok(turns)
    }
}

/// Resolves the speaker embedding model (authorized by the access
/// credential) and builds a diarizer around it.
pub struct EmbeddingDiarizerLoader {
    bundled_dir: Option<PathBuf>,
    sample_rate: u32,
    threshold: f64,
}

impl EmbeddingDiarizerLoader {
    pub fn new(bundled_dir: Option<PathBuf>, sample_rate: u32) -> Self {
        Self {
            bundled_dir,
            sample_rate,
            threshold: speaker_clustering::DEFAULT_THRESHOLD,
        }
    }
}

impl DiarizerLoader for EmbeddingDiarizerLoader {
    fn load(
        &self,
        credential: Option<&str>,
        device: Device,
    ) -> Result<Arc<dyn Diarizer>, Box<dyn std::error::Error>> {
        if credential.is_none() {
            log::warn!("No access credential configured for the diarization model download");
        }
        let model_path = model_resolver::resolve(
            SPEAKER_EMBEDDING_MODEL_NAME,
            SPEAKER_EMBEDDING_MODEL_URL,
            self.bundled_dir.as_deref(),
            credential,
        )?;
        log::info!("Loading speaker embedding model {} on {device}", model_path.display());
        let embedder = OnnxSpeakerEmbedder::new(&model_path, device, self.sample_rate)?;
        Ok(Arc::new(EmbeddingDiarizer::new(
            Box::new(embedder),
            self.threshold,
        )))
    }
}
