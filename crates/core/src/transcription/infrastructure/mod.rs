pub mod cached_recognizer_loader;
pub mod whisper_recognizer;
