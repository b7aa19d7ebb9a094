pub const DEFAULT_LANGUAGE_CODE: &str = "pl";
pub const DEFAULT_BATCH_SIZE: usize = 16;
pub const DEFAULT_WHISPER_MODEL: &str = "large-v3";

/// All models consume 16 kHz mono audio.
pub const SAMPLE_RATE: u32 = 16000;

pub const WHISPER_MODEL_BASE_URL: &str =
    "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

pub const ALIGNMENT_MODEL_BASE_URL: &str = "https://huggingface.co";

pub const SPEAKER_EMBEDDING_MODEL_NAME: &str = "voxceleb_resnet34_LM.onnx";
pub const SPEAKER_EMBEDDING_MODEL_URL: &str =
    "https://huggingface.co/Wespeaker/wespeaker-voxceleb-resnet34-LM/resolve/main/voxceleb_resnet34_LM.onnx";

pub const NO_AUDIO_INPUT_MESSAGE: &str = "No audio input provided";
