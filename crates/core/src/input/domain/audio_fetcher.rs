use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Transport(String),
}

/// Domain interface for retrieving remote audio.
///
/// Implementations block until the whole body is available.
pub trait AudioFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}
