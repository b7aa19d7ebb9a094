use std::time::Duration;

use crate::input::domain::audio_fetcher::{AudioFetcher, FetchError};

/// Blocking HTTP(S) retrieval via reqwest.
///
/// No request timeout is applied unless one is configured; job timeouts
/// belong to the harness.
pub struct HttpAudioFetcher {
    client: reqwest::blocking::Client,
}

impl HttpAudioFetcher {
    pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl AudioFetcher for HttpAudioFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        log::debug!("Fetched {} bytes from {url}", bytes.len());
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn serve_once(status_line: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let header = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(header.as_bytes()).unwrap();
            stream.write_all(body).unwrap();
        });
        format!("http://{addr}/clip.wav")
    }

    #[test]
    fn test_fetch_returns_body_on_success() {
        let url = serve_once("200 OK", b"RIFFfake");
        let fetcher = HttpAudioFetcher::new(Some(Duration::from_secs(10))).unwrap();
        assert_eq!(fetcher.fetch(&url).unwrap(), b"RIFFfake");
    }

    #[test]
    fn test_fetch_non_success_status_is_error() {
        let url = serve_once("404 Not Found", b"missing");
        let fetcher = HttpAudioFetcher::new(Some(Duration::from_secs(10))).unwrap();
        assert_eq!(fetcher.fetch(&url).unwrap_err(), FetchError::Status(404));
    }

    #[test]
    fn test_fetch_unreachable_host_is_transport_error() {
        let fetcher = HttpAudioFetcher::new(Some(Duration::from_secs(5))).unwrap();
        let err = fetcher
            .fetch("http://invalid.nonexistent.example.com/clip.wav")
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
