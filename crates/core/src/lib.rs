pub mod alignment;
pub mod audio;
pub mod diarization;
pub mod input;
pub mod job;
pub mod pipeline;
pub mod shared;
pub mod transcript;
pub mod transcription;
