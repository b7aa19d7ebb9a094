use std::path::Path;

use crate::audio::domain::audio_loader::AudioLoader;
use crate::audio::domain::audio_segment::AudioSegment;

/// Decodes any container/codec ffmpeg understands and resamples to mono f32.
pub struct FfmpegAudioLoader;

impl AudioLoader for FfmpegAudioLoader {
    fn load(
        &self,
        path: &Path,
        sample_rate: u32,
    ) -> Result<AudioSegment, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let mut ictx = ffmpeg_next::format::input(path)?;

        let audio_stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Audio)
            .ok_or_else(|| format!("No audio stream found in {}", path.display()))?;

        let audio_stream_index = audio_stream.index();
        let codec_ctx =
            ffmpeg_next::codec::context::Context::from_parameters(audio_stream.parameters())?;
        let mut decoder = codec_ctx.decoder().audio()?;

        let mut resampler = ffmpeg_next::software::resampling::Context::get(
            decoder.format(),
            decoder.channel_layout(),
            decoder.rate(),
            ffmpeg_next::format::Sample::F32(ffmpeg_next::format::sample::Type::Planar),
            ffmpeg_next::ChannelLayout::MONO,
            sample_rate,
        )?;

        let mut all_samples: Vec<f32> = Vec::new();
        let mut decoded_frame = ffmpeg_next::util::frame::audio::Audio::empty();
        let mut resampled_frame = ffmpeg_next::util::frame::audio::Audio::empty();

        for (stream, packet) in ictx.packets() {
            if stream.index() != audio_stream_index {
                continue;
            }

            decoder.send_packet(&packet)?;

            while decoder.receive_frame(&mut decoded_frame).is_ok() {
                resampler.run(&decoded_frame, &mut resampled_frame)?;
                extract_f32_samples(&resampled_frame, &mut all_samples);
            }
        }

        // Flush the decoder
        decoder.send_eof()?;
        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            resampler.run(&decoded_frame, &mut resampled_frame)?;
            extract_f32_samples(&resampled_frame, &mut all_samples);
        }

        // Flush the resampler (may have buffered samples)
        if let Ok(Some(delay)) = resampler.flush(&mut resampled_frame) {
            if delay.output > 0 {
                extract_f32_samples(&resampled_frame, &mut all_samples);
            }
        }

        if all_samples.is_empty() {
            return Err(format!("Audio stream in {} decoded to no samples", path.display()).into());
        }

        log::debug!(
            "Decoded {:.1}s of audio from {}",
            all_samples.len() as f64 / sample_rate as f64,
            path.display()
        );
        Ok(AudioSegment::new(all_samples, sample_rate, 1))
    }
}

/// Extract f32 samples from a planar mono resampled frame.
fn extract_f32_samples(frame: &ffmpeg_next::util::frame::audio::Audio, out: &mut Vec<f32>) {
    let num_samples = frame.samples();
    if num_samples == 0 {
        return;
    }
    let data = frame.data(0);
    let floats = unsafe { std::slice::from_raw_parts(data.as_ptr() as *const f32, num_samples) };
    out.extend_from_slice(floats);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_nonexistent_file() {
        let path = if cfg!(windows) {
            Path::new("Z:\\nonexistent\\clip.wav")
        } else {
            Path::new("/nonexistent/clip.wav")
        };
        assert!(FfmpegAudioLoader.load(path, 16000).is_err());
    }

    #[test]
    fn test_load_garbage_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("noise.audio");
        fs::write(&path, b"definitely not audio").unwrap();
        assert!(FfmpegAudioLoader.load(&path, 16000).is_err());
    }

    #[test]
    fn test_load_wav_resamples_to_mono() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tone.wav");
        fs::write(&path, stereo_wav(8000, 8000)).unwrap();

        let audio = FfmpegAudioLoader.load(&path, 16000).unwrap();

        assert_eq!(audio.channels(), 1);
        assert_eq!(audio.sample_rate(), 16000);
        assert!((audio.duration() - 1.0).abs() < 0.05);
    }

    /// Minimal 16-bit PCM stereo WAV with a square wave.
    fn stereo_wav(sample_rate: u32, frames: u32) -> Vec<u8> {
        let channels = 2u16;
        let data_len = frames * channels as u32 * 2;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
        out.extend_from_slice(&(channels * 2).to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for i in 0..frames {
            let v: i16 = if (i / 20) % 2 == 0 { 8000 } else { -8000 };
            for _ in 0..channels {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        out
    }
}
