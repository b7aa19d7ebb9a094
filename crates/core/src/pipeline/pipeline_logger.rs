use std::collections::BTreeMap;
use std::time::Instant;

/// Cross-cutting logger for job orchestration events.
///
/// Keeps the use case independent of where stage timings and status
/// messages end up.
pub trait PipelineLogger: Send {
    /// Record how long a named stage took for one job.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a per-job quantity (audio seconds, segment count, ...).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Count one finished job.
    fn job_finished(&mut self, success: bool);

    /// Emit a summary of everything recorded so far. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events. Used by tests.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
    fn job_finished(&mut self, _success: bool) {}
}

/// Running count and sum of one recorded quantity.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Aggregate {
    count: usize,
    total: f64,
}

impl Aggregate {
    fn add(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
    }

    fn mean(&self) -> f64 {
        self.total / self.count.max(1) as f64
    }
}

/// Tracks per-stage timings and metrics across jobs and reports them
/// through `log`.
///
/// Only running aggregates are kept, so memory stays flat however many
/// jobs a worker serves.
pub struct StagePipelineLogger {
    timings: BTreeMap<String, Aggregate>,
    metrics: BTreeMap<String, Aggregate>,
    start_time: Instant,
    succeeded: usize,
    failed: usize,
}

impl StagePipelineLogger {
    pub fn new() -> Self {
        Self {
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            start_time: Instant::now(),
            succeeded: 0,
            failed: 0,
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        let jobs = self.succeeded + self.failed;
        if self.timings.is_empty() && self.metrics.is_empty() && jobs == 0 {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Worker summary ({jobs} jobs, {} failed, {:.1}s total):",
            self.failed,
            elapsed_ms / 1000.0
        )];

        for (stage, durations) in &self.timings {
            lines.push(format!(
                "  {stage:12}: avg {:8.1}ms  total {:9.0}ms  ({} runs)",
                durations.mean(),
                durations.total,
                durations.count
            ));
        }

        for (name, values) in &self.metrics {
            lines.push(format!("  {name}: avg {:.1}", values.mean()));
        }

        if let (Some(audio), Some(stages)) = (
            self.metrics.get("audio_seconds"),
            self.timings.get("transcribe"),
        ) {
            let transcribe_s = stages.total / 1000.0;
            if transcribe_s > 0.0 {
                lines.push(format!(
                    "  Real-time factor (transcribe): {:.2}x",
                    audio.total / transcribe_s
                ));
            }
        }

        Some(lines.join("\n"))
    }
}

impl Default for StagePipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineLogger for StagePipelineLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        log::debug!("Stage {stage} took {duration_ms:.1}ms");
        self.timings
            .entry(stage.to_string())
            .or_default()
            .add(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().add(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn job_finished(&mut self, success: bool) {
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
