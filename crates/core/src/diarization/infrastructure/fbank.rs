use std::f32::consts::PI;
use std::sync::Arc;

use ndarray::{Array2, Axis};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

pub const NUM_MEL_BINS: usize = 80;

/// 25 ms analysis frames at 16 kHz.
const FRAME_LENGTH: usize = 400;
/// 10 ms frame shift at 16 kHz.
const FRAME_SHIFT: usize = 160;
const FFT_SIZE: usize = 512;
const PREEMPHASIS: f32 = 0.97;
const LOW_FREQ: f32 = 20.0;
/// Speaker models are trained on 16-bit PCM magnitudes.
const PCM_SCALE: f32 = 32768.0;

/// Log-mel filterbank features as the speaker embedding model expects them.
pub struct FbankExtractor {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    mel_banks: Vec<Vec<(usize, f32)>>,
}

impl FbankExtractor {
    pub fn new(sample_rate: u32) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        // Hamming window
        let window = (0..FRAME_LENGTH)
            .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f32 / (FRAME_LENGTH - 1) as f32).cos())
            .collect();
        Self {
            fft,
            window,
            mel_banks: mel_banks(sample_rate as f32),
        }
    }

    pub fn num_frames(num_samples: usize) -> usize {
        if num_samples < FRAME_LENGTH {
            0
        } else {
            1 + (num_samples - FRAME_LENGTH) / FRAME_SHIFT
        }
    }

    /// `frames x 80` features with the per-bin mean removed.
    pub fn compute(&self, samples: &[f32]) -> Array2<f32> {
        let mut feats = self.log_mel(samples);
        if feats.nrows() > 0 {
            if let Some(mean) = feats.mean_axis(Axis(0)) {
                feats -= &mean;
            }
        }
        feats
    }

    fn log_mel(&self, samples: &[f32]) -> Array2<f32> {
        let num_frames = Self::num_frames(samples.len());
        let mut feats = Array2::zeros((num_frames, NUM_MEL_BINS));
        let mut frame = vec![0.0f32; FRAME_LENGTH];
        let mut buf = vec![Complex::new(0.0f32, 0.0); FFT_SIZE];

        for t in 0..num_frames {
            let start = t * FRAME_SHIFT;
            for (dst, &src) in frame.iter_mut().zip(&samples[start..start + FRAME_LENGTH]) {
                *dst = src * PCM_SCALE;
            }
            let dc = frame.iter().sum::<f32>() / FRAME_LENGTH as f32;
            for x in frame.iter_mut() {
                *x -= dc;
            }
            for i in (1..FRAME_LENGTH).rev() {
                frame[i] -= PREEMPHASIS * frame[i - 1];
            }
            frame[0] -= PREEMPHASIS * frame[0];

            for (i, slot) in buf.iter_mut().enumerate() {
                *slot = if i < FRAME_LENGTH {
                    Complex::new(frame[i] * self.window[i], 0.0)
                } else {
                    Complex::new(0.0, 0.0)
                };
            }
            self.fft.process(&mut buf);

            for (m, bank) in self.mel_banks.iter().enumerate() {
                let energy: f32 = bank.iter().map(|&(k, w)| w * buf[k].norm_sqr()).sum();
                feats[[t, m]] = energy.max(f32::EPSILON).ln();
            }
        }
        feats
    }
}

fn mel(freq: f32) -> f32 {
    1127.0 * (1.0 + freq / 700.0).ln()
}

/// Triangular filters evenly spaced on the mel scale, as sparse
/// `(fft_bin, weight)` lists.
fn mel_banks(sample_rate: f32) -> Vec<Vec<(usize, f32)>> {
    let num_bins = FFT_SIZE / 2 + 1;
    let mel_low = mel(LOW_FREQ);
    let mel_high = mel(sample_rate / 2.0);
    let delta = (mel_high - mel_low) / (NUM_MEL_BINS + 1) as f32;

    (0..NUM_MEL_BINS)
        .map(|m| {
            let left = mel_low + m as f32 * delta;
            let center = left + delta;
            let right = center + delta;
            (0..num_bins)
                .filter_map(|k| {
                    let f = mel(k as f32 * sample_rate / FFT_SIZE as f32);
                    if f <= left || f >= right {
                        None
                    } else if f <= center {
                        Some((k, (f - left) / (center - left)))
                    } else {
                        Some((k, (right - f) / (right - center)))
                    }
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tone(freq: f32, seconds: f32) -> Vec<f32> {
        let n = (seconds * 16000.0) as usize;
        (0..n)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / 16000.0).sin())
            .collect()
    }

    fn loudest_bin(feats: &Array2<f32>) -> usize {
        let mean = feats.mean_axis(Axis(0)).unwrap();
        mean.iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn test_shape_for_one_second() {
        let fbank = FbankExtractor::new(16000);
        let feats = fbank.compute(&tone(440.0, 1.0));
        assert_eq!(feats.dim(), (98, NUM_MEL_BINS));
    }

    #[test]
    fn test_too_short_input_has_no_frames() {
        let fbank = FbankExtractor::new(16000);
        assert_eq!(fbank.compute(&[0.1; 399]).nrows(), 0);
        assert_eq!(FbankExtractor::num_frames(400), 1);
    }

    #[test]
    fn test_features_are_mean_normalized() {
        let fbank = FbankExtractor::new(16000);
        let feats = fbank.compute(&tone(300.0, 0.5));
        for mean in feats.mean_axis(Axis(0)).unwrap().iter() {
            assert_relative_eq!(*mean, 0.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_higher_tone_lands_in_higher_bin() {
        let fbank = FbankExtractor::new(16000);
        let low = loudest_bin(&fbank.log_mel(&tone(500.0, 0.5)));
        let high = loudest_bin(&fbank.log_mel(&tone(3000.0, 0.5)));
        assert!(high > low, "expected {high} > {low}");
    }

    #[test]
    fn test_every_filter_has_support() {
        assert!(mel_banks(16000.0).iter().all(|bank| !bank.is_empty()));
    }
}
