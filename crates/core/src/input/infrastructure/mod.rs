pub mod http_audio_fetcher;
