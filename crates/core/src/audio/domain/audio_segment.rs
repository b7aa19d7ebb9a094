/// Decoded audio: interleaved PCM samples normalized to [-1.0, 1.0].
#[derive(Clone, Debug)]
pub struct AudioSegment {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioSegment {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }

    pub fn sample_index_at_time(&self, time: f64) -> usize {
        (time.max(0.0) * self.sample_rate as f64 * self.channels as f64) as usize
    }

    /// Samples between two timestamps, clamped to the available audio.
    pub fn slice(&self, start: f64, end: f64) -> &[f32] {
        let len = self.samples.len();
        let from = self.sample_index_at_time(start).min(len);
        let to = self.sample_index_at_time(end).clamp(from, len);
        &self.samples[from..to]
    }
}
