pub mod audio_fetcher;
pub mod audio_handle;
