use std::sync::Arc;

use crate::shared::model_cache::ModelCache;
use crate::transcription::domain::speech_recognizer::{
    RecognizerLoader, RecognizerSpec, SpeechRecognizer,
};

/// Keeps loaded recognizers alive across jobs, one per distinct spec.
pub struct CachedRecognizerLoader {
    inner: Box<dyn RecognizerLoader>,
    cache: ModelCache<RecognizerSpec, dyn SpeechRecognizer>,
}

impl CachedRecognizerLoader {
    pub fn new(inner: Box<dyn RecognizerLoader>) -> Self {
        Self {
            inner,
            cache: ModelCache::new(),
        }
    }
}

impl RecognizerLoader for CachedRecognizerLoader {
    fn load(
        &self,
        spec: &RecognizerSpec,
    ) -> Result<Arc<dyn SpeechRecognizer>, Box<dyn std::error::Error>> {
        self.cache.get_or_load(spec, || {
            log::debug!("Recognizer cache miss for {} ({})", spec.model, spec.language);
            self.inner.load(spec)
        })
    }
}
