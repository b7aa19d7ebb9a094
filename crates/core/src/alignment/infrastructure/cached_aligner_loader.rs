use std::sync::Arc;

use crate::alignment::domain::aligner::{Aligner, AlignerLoadError, AlignerLoader};
use crate::shared::model_cache::ModelCache;
use crate::shared::worker_config::Device;

/// Keeps one aligner per (language, device) alive across jobs.
pub struct CachedAlignerLoader {
    inner: Box<dyn AlignerLoader>,
    cache: ModelCache<(String, Device), dyn Aligner>,
}

impl CachedAlignerLoader {
    pub fn new(inner: Box<dyn AlignerLoader>) -> Self {
        Self {
            inner,
            cache: ModelCache::new(),
        }
    }
}

impl AlignerLoader for CachedAlignerLoader {
    fn load(&self, language: &str, device: Device) -> Result<Arc<dyn Aligner>, AlignerLoadError> {
        self.cache
            .get_or_load(&(language.to_string(), device), || {
                log::debug!("Aligner cache miss for '{language}' on {device}");
                self.inner.load(language, device)
            })
    }
}
