pub mod diarizer;
pub mod speaker_assigner;
