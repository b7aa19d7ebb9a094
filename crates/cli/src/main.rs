use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use voxjob_core::alignment::domain::aligner::AlignerLoader;
use voxjob_core::alignment::infrastructure::cached_aligner_loader::CachedAlignerLoader;
use voxjob_core::alignment::infrastructure::wav2vec2_aligner::Wav2Vec2Loader;
use voxjob_core::audio::infrastructure::ffmpeg_audio_loader::FfmpegAudioLoader;
use voxjob_core::diarization::domain::diarizer::DiarizerLoader;
use voxjob_core::diarization::infrastructure::cached_diarizer_loader::CachedDiarizerLoader;
use voxjob_core::diarization::infrastructure::embedding_diarizer::EmbeddingDiarizerLoader;
use voxjob_core::input::infrastructure::http_audio_fetcher::HttpAudioFetcher;
use voxjob_core::input::input_resolver::InputResolver;
use voxjob_core::job::job_output::{JobError, JobOutput};
use voxjob_core::job::pipeline_error::{PipelineError, StageFailure};
use voxjob_core::pipeline::pipeline_logger::StagePipelineLogger;
use voxjob_core::pipeline::transcribe_job_use_case::TranscribeJobUseCase;
use voxjob_core::shared::constants::SAMPLE_RATE;
use voxjob_core::shared::worker_config::{ComputeType, Device, WorkerConfig};
use voxjob_core::transcription::domain::speech_recognizer::RecognizerLoader;
use voxjob_core::transcription::infrastructure::cached_recognizer_loader::CachedRecognizerLoader;
use voxjob_core::transcription::infrastructure::whisper_recognizer::WhisperLoader;

/// Run transcription jobs: `{"input": {...}}` events in, tagged results out.
///
/// Settings not given as flags come from the environment (DEVICE,
/// COMPUTE_TYPE, HF_TOKEN, BATCH_SIZE, WHISPER_MODEL, CACHE_MODELS,
/// MODEL_DIR).
#[derive(Parser)]
#[command(name = "voxjob")]
struct Cli {
    /// Job event file (reads stdin when omitted or "-").
    job: Option<PathBuf>,

    /// Treat the input as one job event per line and stream one result
    /// per line.
    #[arg(long)]
    jsonl: bool,

    /// Execution device: cuda or cpu.
    #[arg(long)]
    device: Option<Device>,

    /// Recognition precision: float16, float32 or int8.
    #[arg(long)]
    compute_type: Option<ComputeType>,

    /// Recognition batch size.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Whisper model name (e.g. large-v3, medium, small).
    #[arg(long)]
    model: Option<String>,

    /// Keep loaded models in memory across jobs.
    #[arg(long)]
    cache_models: bool,

    /// Directory searched for pre-downloaded model files.
    #[arg(long)]
    model_dir: Option<PathBuf>,
}

/// One job as delivered by the queue.
#[derive(Deserialize)]
struct JobEvent {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    input: Value,
}

/// A job's output, echoing the event id when one was given.
#[derive(Serialize)]
struct JobReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    #[serde(flatten)]
    output: JobOutput,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = apply_overrides(WorkerConfig::from_env()?, &cli)?;
    log::info!(
        "Worker starting: model={} device={} compute_type={} batch_size={} cache_models={}",
        config.whisper_model,
        config.device,
        config.compute_type,
        config.batch_size,
        config.cache_models
    );

    let mut use_case = build_use_case(config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if cli.jsonl {
        let reader: Box<dyn BufRead> = match &cli.job {
            Some(path) if path.as_os_str() != "-" => {
                Box::new(io::BufReader::new(fs::File::open(path)?))
            }
            _ => Box::new(io::stdin().lock()),
        };
        serve_lines(reader, &mut out, |text| process_event(&mut use_case, text))?;
    } else {
        let text = match &cli.job {
            Some(path) if path.as_os_str() != "-" => fs::read_to_string(path)?,
            _ => {
                let mut text = String::new();
                io::stdin().read_to_string(&mut text)?;
                text
            }
        };
        let reply = process_event(&mut use_case, &text);
        writeln!(out, "{}", serde_json::to_string_pretty(&reply)?)?;
    }

    use_case.summary();
    Ok(())
}

fn apply_overrides(
    mut config: WorkerConfig,
    cli: &Cli,
) -> Result<WorkerConfig, Box<dyn std::error::Error>> {
    if let Some(device) = cli.device {
        config.device = device;
    }
    if let Some(compute_type) = cli.compute_type {
        config.compute_type = compute_type;
    }
    if let Some(batch_size) = cli.batch_size {
        if batch_size == 0 {
            return Err("Batch size must be at least 1".into());
        }
        config.batch_size = batch_size;
    }
    if let Some(model) = &cli.model {
        config.whisper_model = model.clone();
    }
    if cli.cache_models {
        config.cache_models = true;
    }
    if let Some(dir) = &cli.model_dir {
        config.model_dir = Some(dir.clone());
    }
    Ok(config)
}

fn build_use_case(
    config: WorkerConfig,
) -> Result<TranscribeJobUseCase, Box<dyn std::error::Error>> {
    let resolver = InputResolver::new(Box::new(HttpAudioFetcher::new(None)?));
    let model_dir = config.model_dir.clone();

    let mut recognizers: Box<dyn RecognizerLoader> =
        Box::new(WhisperLoader::new(model_dir.clone()));
    let mut aligners: Box<dyn AlignerLoader> = Box::new(Wav2Vec2Loader::new(model_dir.clone()));
    let mut diarizers: Box<dyn DiarizerLoader> =
        Box::new(EmbeddingDiarizerLoader::new(model_dir, SAMPLE_RATE));
    if config.cache_models {
        recognizers = Box::new(CachedRecognizerLoader::new(recognizers));
        aligners = Box::new(CachedAlignerLoader::new(aligners));
        diarizers = Box::new(CachedDiarizerLoader::new(diarizers));
    }

    Ok(TranscribeJobUseCase::new(
        config,
        resolver,
        Box::new(FfmpegAudioLoader),
        recognizers,
        aligners,
        diarizers,
        Box::new(StagePipelineLogger::new()),
    ))
}

/// Answer one job per line. A line that is not valid UTF-8 is answered with
/// a failure and the stream goes on.
fn serve_lines<R, W, F>(
    mut reader: R,
    out: &mut W,
    mut handle: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    R: BufRead,
    W: Write,
    F: FnMut(&str) -> JobReply,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let reply = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => handle(line),
            Err(e) => JobReply {
                id: None,
                output: invalid_event(format!("job event is not valid UTF-8: {e}")),
            },
        };
        writeln!(out, "{}", serde_json::to_string(&reply)?)?;
        out.flush()?;
    }
    Ok(())
}

/// Parse one event and run it; a malformed event is answered with a
/// failure like any other bad input.
fn process_event(use_case: &mut TranscribeJobUseCase, text: &str) -> JobReply {
    match parse_event(text) {
        Ok(event) => {
            let output = use_case.handle(&event.input);
            JobReply {
                id: event.id,
                output,
            }
        }
        Err(output) => JobReply { id: None, output },
    }
}

fn parse_event(text: &str) -> Result<JobEvent, JobOutput> {
    serde_json::from_str(text).map_err(|e| invalid_event(format!("malformed job event: {e}")))
}

fn invalid_event(reason: String) -> JobOutput {
    let failure = StageFailure::from(PipelineError::InvalidInput(reason));
    JobOutput::Failure {
        error: JobError::from_failure(&failure),
    }
}
