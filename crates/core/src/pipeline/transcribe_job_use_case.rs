use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use serde_json::Value;

use crate::alignment::domain::aligner::{AlignerLoadError, AlignerLoader};
use crate::audio::domain::audio_loader::AudioLoader;
use crate::diarization::domain::diarizer::DiarizerLoader;
use crate::diarization::domain::speaker_assigner::assign_speakers;
use crate::input::input_resolver::InputResolver;
use crate::job::job_output::{JobError, JobOutput, PipelineResult};
use crate::job::job_request::JobRequest;
use crate::job::pipeline_error::{PipelineError, StageFailure};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::constants::SAMPLE_RATE;
use crate::shared::worker_config::WorkerConfig;
use crate::transcription::domain::speech_recognizer::{
    RecognizerLoader, RecognizerSpec, TranscribeParams,
};

/// Runs one transcription job end to end: resolve the audio, transcribe,
/// align, optionally diarize, and assemble the result.
pub struct TranscribeJobUseCase {
    config: WorkerConfig,
    resolver: InputResolver,
    audio_loader: Box<dyn AudioLoader>,
    recognizers: Box<dyn RecognizerLoader>,
    aligners: Box<dyn AlignerLoader>,
    diarizers: Box<dyn DiarizerLoader>,
    logger: Box<dyn PipelineLogger>,
}

impl TranscribeJobUseCase {
    pub fn new(
        config: WorkerConfig,
        resolver: InputResolver,
        audio_loader: Box<dyn AudioLoader>,
        recognizers: Box<dyn RecognizerLoader>,
        aligners: Box<dyn AlignerLoader>,
        diarizers: Box<dyn DiarizerLoader>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            config,
            resolver,
            audio_loader,
            recognizers,
            aligners,
            diarizers,
            logger,
        }
    }

    /// Handle one job's `input` mapping. Never fails and never panics: every
    /// error, including a panicking stage, becomes a failure output.
    pub fn handle(&mut self, input: &Value) -> JobOutput {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let request = JobRequest::from_value(input)?;
            self.run(&request)
        }));

        let output = match outcome {
            Ok(Ok(result)) => JobOutput::Success { result },
            Ok(Err(failure)) => {
                log::error!("Job failed: {}", failure.error);
                JobOutput::Failure {
                    error: JobError::from_failure(&failure),
                }
            }
            Err(payload) => {
                let error = JobError::from_panic(&*payload, &Backtrace::force_capture());
                log::error!("Job aborted: {}", error.message);
                JobOutput::Failure { error }
            }
        };
        self.logger.job_finished(output.is_success());
        output
    }

    /// Run the stages in order. The temporary audio file lives exactly as
    /// long as this call.
    pub fn run(&mut self, request: &JobRequest) -> Result<PipelineResult, StageFailure> {
        let started = Instant::now();
        let handle = self.resolver.resolve(request)?;
        self.logger.timing("resolve", elapsed_ms(started));

        let started = Instant::now();
        let audio = self
            .audio_loader
            .load(handle.path(), SAMPLE_RATE)
            .map_err(PipelineError::AudioLoad)?;
        self.logger.timing("load_audio", elapsed_ms(started));
        self.logger.metric("audio_seconds", audio.duration());

        let language = request.language_code().to_string();
        let spec = RecognizerSpec {
            model: self.config.whisper_model.clone(),
            device: self.config.device,
            compute_type: self.config.compute_type,
            language: language.clone(),
        };
        self.logger.info(&format!(
            "Transcribing {:.1}s of audio with {} ({}, {}, language '{language}')",
            audio.duration(),
            spec.model,
            spec.device,
            spec.compute_type
        ));
        let started = Instant::now();
        let options = request.transcribe_options();
        let transcription = self
            .recognizers
            .load(&spec)
            .and_then(|recognizer| {
                recognizer.transcribe(
                    &audio,
                    &TranscribeParams {
                        language: &language,
                        batch_size: self.config.batch_size,
                        options: &options,
                    },
                )
            })
            .map_err(PipelineError::Transcription)?;
        self.logger.timing("transcribe", elapsed_ms(started));
        self.logger
            .metric("segments", transcription.segments.len() as f64);

        let started = Instant::now();
        let aligner = self
            .aligners
            .load(&transcription.language, self.config.device)
            .map_err(|e| match e {
                AlignerLoadError::UnsupportedLanguage(language) => {
                    PipelineError::UnsupportedLanguage { language }
                }
                AlignerLoadError::Load(source) => PipelineError::Alignment(source),
            })?;
        let mut segments = aligner
            .align(&transcription.segments, &audio)
            .map_err(PipelineError::Alignment)?;
        self.logger.timing("align", elapsed_ms(started));

        if request.diarize() {
            let started = Instant::now();
            let bounds = request.speaker_bounds();
            let turns = self
                .diarizers
                .load(self.config.hf_token.as_deref(), self.config.device)
                .and_then(|diarizer| diarizer.diarize(&audio, bounds))
                .map_err(PipelineError::Diarization)?;
            assign_speakers(&turns, &mut segments);
            self.logger.timing("diarize", elapsed_ms(started));
            self.logger.metric("turns", turns.len() as f64);
        }

        Ok(PipelineResult::new(segments, transcription.language))
    }

    pub fn summary(&self) {
        self.logger.summary();
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
