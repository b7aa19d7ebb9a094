pub mod alignment_models;
pub mod cached_aligner_loader;
pub mod wav2vec2_aligner;
