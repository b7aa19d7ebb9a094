pub mod cached_diarizer_loader;
pub mod embedding_diarizer;
pub mod fbank;
pub mod speaker_clustering;
