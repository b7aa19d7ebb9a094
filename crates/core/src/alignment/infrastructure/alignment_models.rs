/// wav2vec2 CTC checkpoints used for forced alignment, per language code.
///
/// These repositories publish PyTorch weights and `vocab.json`. The ONNX
/// graph has to be exported ahead of time (`optimum-cli export onnx`) and
/// placed next to the vocabulary under the model directory.
const ALIGNMENT_MODELS: &[(&str, &str)] = &[
    ("en", "facebook/wav2vec2-base-960h"),
    ("fr", "jonatasgrosman/wav2vec2-large-xlsr-53-french"),
    ("de", "jonatasgrosman/wav2vec2-large-xlsr-53-german"),
    ("es", "jonatasgrosman/wav2vec2-large-xlsr-53-spanish"),
    ("it", "jonatasgrosman/wav2vec2-large-xlsr-53-italian"),
    ("pt", "jonatasgrosman/wav2vec2-large-xlsr-53-portuguese"),
    ("nl", "jonatasgrosman/wav2vec2-large-xlsr-53-dutch"),
    ("pl", "jonatasgrosman/wav2vec2-large-xlsr-53-polish"),
    ("ru", "jonatasgrosman/wav2vec2-large-xlsr-53-russian"),
    ("uk", "Yehor/wav2vec2-xls-r-300m-uk-with-small-lm"),
    ("cs", "comodoro/wav2vec2-xls-r-300m-cs-250"),
    ("hu", "jonatasgrosman/wav2vec2-large-xlsr-53-hungarian"),
    ("fi", "jonatasgrosman/wav2vec2-large-xlsr-53-finnish"),
    ("fa", "jonatasgrosman/wav2vec2-large-xlsr-53-persian"),
    ("el", "jonatasgrosman/wav2vec2-large-xlsr-53-greek"),
    ("tr", "mpoyraz/wav2vec2-xls-r-300m-cv7-turkish"),
    ("ar", "jonatasgrosman/wav2vec2-large-xlsr-53-arabic"),
    ("ja", "jonatasgrosman/wav2vec2-large-xlsr-53-japanese"),
    ("zh", "jonatasgrosman/wav2vec2-large-xlsr-53-chinese-zh-cn"),
];

const ONNX_FILE: &str = "model.onnx";
const VOCAB_FILE: &str = "vocab.json";

/// Where the files of one alignment checkpoint live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentModel {
    pub repo: &'static str,
}

impl AlignmentModel {
    /// Look up the checkpoint for a language code (`"pl"`, `"EN"`, `"pt-BR"`).
    pub fn for_language(language: &str) -> Option<Self> {
        let code = language
            .split(['-', '_'])
            .next()
            .unwrap_or(language)
            .to_ascii_lowercase();
        ALIGNMENT_MODELS
            .iter()
            .find(|(lang, _)| *lang == code)
            .map(|(_, repo)| Self { repo })
    }

    /// Local name of a checkpoint file, one directory per repository.
    pub fn local_name(&self, file: &str) -> String {
        format!("{}/{}", self.repo.replace('/', "--"), file)
    }

    pub fn url(&self, base_url: &str, file: &str) -> String {
        format!("{base_url}/{}/resolve/main/{file}", self.repo)
    }

    pub fn onnx_file() -> &'static str {
        ONNX_FILE
    }

    pub fn vocab_file() -> &'static str {
        VOCAB_FILE
    }
}
