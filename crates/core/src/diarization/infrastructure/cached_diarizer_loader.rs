use std::sync::Arc;

use crate::diarization::domain::diarizer::{Diarizer, DiarizerLoader};
use crate::shared::model_cache::ModelCache;
use crate::shared::worker_config::Device;

/// Keeps loaded diarizers alive across jobs, keyed by credential and device.
pub struct CachedDiarizerLoader {
    inner: Box<dyn DiarizerLoader>,
    cache: ModelCache<(Option<String>, Device), dyn Diarizer>,
}

impl CachedDiarizerLoader {
    pub fn new(inner: Box<dyn DiarizerLoader>) -> Self {
        Self {
            inner,
            cache: ModelCache::new(),
        }
    }
}

impl DiarizerLoader for CachedDiarizerLoader {
    fn load(
        &self,
        credential: Option<&str>,
        device: Device,
    ) -> Result<Arc<dyn Diarizer>, Box<dyn std::error::Error>> {
        let key = (credential.map(str::to_string), device);
        self.cache.get_or_load(&key, || {
            log::debug!("Diarizer cache miss on {device}");
            self.inner.load(credential, device)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::domain::audio_segment::AudioSegment;
    use crate::diarization::domain::diarizer::{DiarizationTurn, SpeakerBounds};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NobodyDiarizer;

    impl Diarizer for NobodyDiarizer {
        fn diarize(
            &self,
            _: &AudioSegment,
            _: Option<SpeakerBounds>,
        ) -> Result<Vec<DiarizationTurn>, Box<dyn std::error::Error>> {
            Ok(vec![])
        }
    }

    struct CountingLoader {
        loads: Arc<AtomicUsize>,
    }

    impl DiarizerLoader for CountingLoader {
        fn load(
            &self,
            _: Option<&str>,
            _: Device,
        ) -> Result<Arc<dyn Diarizer>, Box<dyn std::error::Error>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NobodyDiarizer))
        }
    }

    #[test]
    fn test_loads_once_per_credential_and_device() {
        let loads = Arc::new(AtomicUsize::new(0));
        let loader = CachedDiarizerLoader::new(Box::new(CountingLoader {
            loads: loads.clone(),
        }));

        loader.load(Some("hf_abc"), Device::Cpu).unwrap();
        loader.load(Some("hf_abc"), Device::Cpu).unwrap();
        loader.load(Some("hf_abc"), Device::Cuda).unwrap();
        loader.load(None, Device::Cpu).unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 3);
    }
}
