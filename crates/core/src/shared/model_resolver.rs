use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("download failed for {url}: server responded with status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to write model to {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Resolve a model file by name, checking cache locations before downloading.
///
/// `name` may contain a subdirectory (e.g. `wav2vec2-polish/vocab.json`).
///
/// Resolution order:
/// 1. User cache directory (platform-specific)
/// 2. Bundled directory (for pre-baked container images)
/// 3. Download from URL to cache, sending `auth_token` as a bearer token
pub fn resolve(
    name: &str,
    url: &str,
    bundled_dir: Option<&Path>,
    auth_token: Option<&str>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = find_local(name, bundled_dir)? {
        return Ok(path);
    }

    // 3. Download to cache
    let cache_dir = model_cache_dir()?;
    let cached_path = cache_dir.join(name);
    let parent = cached_path.parent().unwrap_or(&cache_dir);
    fs::create_dir_all(parent).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading model {name} from {url}");
    download(url, &cached_path, auth_token)?;
    Ok(cached_path)
}

/// Look for a model file in the user cache, then the bundled directory,
/// without touching the network.
pub fn find_local(
    name: &str,
    bundled_dir: Option<&Path>,
) -> Result<Option<PathBuf>, ModelResolveError> {
    // 1. Check user cache
    let cached_path = model_cache_dir()?.join(name);
    if cached_path.exists() {
        log::debug!("Model {name} found in cache at {}", cached_path.display());
        return Ok(Some(cached_path));
    }

    // 2. Check bundled path
    if let Some(dir) = bundled_dir {
        let bundled_path = dir.join(name);
        if bundled_path.exists() {
            log::debug!("Model {name} found at {}", bundled_path.display());
            return Ok(Some(bundled_path));
        }
    }

    Ok(None)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/voxjob/models/`
/// - Linux: `$XDG_CACHE_HOME/voxjob/models/` or `~/.cache/voxjob/models/`
/// - Windows: `%LOCALAPPDATA%/voxjob/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("voxjob").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("voxjob").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, auth_token: Option<&str>) -> Result<(), ModelResolveError> {
    // Write to a temp file first, then rename for atomicity
    let temp_path = dest.with_extension("part");
    let result = download_inner(url, dest, &temp_path, auth_token);

    // Clean up .part file on any error
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    auth_token: Option<&str>,
) -> Result<(), ModelResolveError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(None::<std::time::Duration>)
        .build()
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;
    let mut request = client.get(url);
    if let Some(token) = auth_token {
        request = request.bearer_auth(token);
    }
    let mut response = request.send().map_err(|e| ModelResolveError::Download {
        url: url.to_string(),
        source: e,
    })?;
    if !response.status().is_success() {
        return Err(ModelResolveError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut last_reported_pct = 0;

    let mut file = fs::File::create(temp_path).map_err(|e| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    })?;

    // Stream the body; whisper weights run to several GB.
    let mut buf = vec![0u8; 1024 * 1024]; // 1MB buffer
    loop {
        let n = response
            .read(&mut buf)
            .map_err(|e| ModelResolveError::Write {
                path: temp_path.to_path_buf(),
                source: e,
            })?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])
            .map_err(|e| ModelResolveError::Write {
                path: temp_path.to_path_buf(),
                source: e,
            })?;
        downloaded += n as u64;
        if total > 0 {
            let pct = downloaded * 100 / total;
            if pct >= last_reported_pct + 10 {
                last_reported_pct = pct;
                log::info!("Downloading {}... {pct}%", dest.display());
            }
        }
    }

    file.flush().map_err(|e| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    })?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(())
}
