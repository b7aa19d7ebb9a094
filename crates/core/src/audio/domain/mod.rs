pub mod audio_loader;
pub mod audio_segment;
