use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

/// Load-once store for expensive model handles, keyed by load parameters.
///
/// Only immutable, shareable handles are stored; per-job state never
/// passes through here.
pub struct ModelCache<K, T: ?Sized> {
    entries: Mutex<HashMap<K, Arc<T>>>,
}

impl<K: Eq + Hash + Clone, T: ?Sized> ModelCache<K, T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached handle for `key`, or run `load` and remember its result.
    ///
    /// Failed loads are not cached. The lock is held while loading so two
    /// callers never load the same model concurrently.
    pub fn get_or_load<E>(
        &self,
        key: &K,
        load: impl FnOnce() -> Result<Arc<T>, E>,
    ) -> Result<Arc<T>, E> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = entries.get(key) {
            return Ok(handle.clone());
        }
        let handle = load()?;
        entries.insert(key.clone(), handle.clone());
        Ok(handle)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone, T: ?Sized> Default for ModelCache<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_loads_once_per_key() {
        let cache: ModelCache<String, str> = ModelCache::new();
        let loads = Cell::new(0);
        let load = || -> Result<Arc<str>, String> {
            loads.set(loads.get() + 1);
            Ok(Arc::from("model"))
        };

        let a = cache.get_or_load(&"pl".to_string(), load).unwrap();
        let b = cache
            .get_or_load(&"pl".to_string(), || -> Result<Arc<str>, String> {
                loads.set(loads.get() + 1);
                Ok(Arc::from("other"))
            })
            .unwrap();

        assert_eq!(loads.get(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_keys_load_separately() {
        let cache: ModelCache<u32, str> = ModelCache::new();
        cache.get_or_load(&1, || Ok::<_, ()>(Arc::from("a"))).unwrap();
        cache.get_or_load(&2, || Ok::<_, ()>(Arc::from("b"))).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let cache: ModelCache<u32, str> = ModelCache::new();
        let err = cache.get_or_load(&1, || Err::<Arc<str>, _>("boom"));
        assert_eq!(err.unwrap_err(), "boom");
        assert!(cache.is_empty());

        let ok = cache.get_or_load(&1, || Ok::<_, &str>(Arc::from("retry")));
        assert_eq!(&*ok.unwrap(), "retry");
    }
}
