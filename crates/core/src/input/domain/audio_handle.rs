use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

const TEMP_PREFIX: &str = "voxjob-";
const TEMP_SUFFIX: &str = ".audio";

/// A job's audio persisted to a uniquely named temporary file.
///
/// The file is deleted when the handle is dropped, on every exit path.
#[derive(Debug)]
pub struct AudioHandle {
    file: NamedTempFile,
}

impl AudioHandle {
    /// Write `bytes` to a fresh temporary file in `dir` (or the system temp
    /// directory).
    pub fn persist(bytes: &[u8], dir: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX).suffix(TEMP_SUFFIX);
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_persist_writes_exact_bytes() {
        let tmp = TempDir::new().unwrap();
        let handle = AudioHandle::persist(b"RIFF\x00\x01\x02", Some(tmp.path())).unwrap();
        assert_eq!(fs::read(handle.path()).unwrap(), b"RIFF\x00\x01\x02");
        assert_eq!(fs::metadata(handle.path()).unwrap().len(), 7);
    }

    #[test]
    fn test_drop_removes_file() {
        let tmp = TempDir::new().unwrap();
        let handle = AudioHandle::persist(b"data", Some(tmp.path())).unwrap();
        let path = handle.path().to_path_buf();
        assert!(path.exists());
        drop(handle);
        assert!(!path.exists());
    }

    #[test]
    fn test_each_handle_gets_unique_path() {
        let tmp = TempDir::new().unwrap();
        let a = AudioHandle::persist(b"a", Some(tmp.path())).unwrap();
        let b = AudioHandle::persist(b"b", Some(tmp.path())).unwrap();
        assert_ne!(a.path(), b.path());
        let name = a.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("voxjob-"));
    }

    #[test]
    fn test_empty_payload() {
        let tmp = TempDir::new().unwrap();
        let handle = AudioHandle::persist(b"", Some(tmp.path())).unwrap();
        assert_eq!(fs::metadata(handle.path()).unwrap().len(), 0);
    }
}
