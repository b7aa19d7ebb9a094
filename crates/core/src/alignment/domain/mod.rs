pub mod aligner;
pub mod ctc_alignment;
pub mod transcript_alignment;
