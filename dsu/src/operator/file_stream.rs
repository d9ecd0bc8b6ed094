//! Local file stream provider.

use super::{ByteStream, StreamProvider};
use dsu_shared::errors::{DsuError, DsuResult};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

/// Opens plain paths and `file://` URIs.
///
/// Remote schemes are rejected; hosts that install from the network supply their
/// own `StreamProvider`.
#[derive(Debug, Clone, Default)]
pub struct FileStreamProvider;

impl FileStreamProvider {
    pub fn new() -> Self {
        Self
    }

    fn resolve(locator: &str) -> DsuResult<PathBuf> {
        if let Some(path) = locator.strip_prefix("file://") {
            return Ok(PathBuf::from(path));
        }
        if let Some((scheme, _)) = locator.split_once("://") {
            return Err(DsuError::Unsupported(format!(
                "cannot open `{}` locators: {}",
                scheme, locator
            )));
        }
        Ok(PathBuf::from(locator))
    }
}

impl StreamProvider for FileStreamProvider {
    fn open_stream(&self, locator: &str) -> DsuResult<ByteStream> {
        let path = Self::resolve(locator)?;
        let file = File::open(&path).map_err(|e| {
            DsuError::Stream(format!("failed to open {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "Opened local stream");
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_opens_plain_and_file_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system.img");
        std::fs::write(&path, b"payload").unwrap();

        let provider = FileStreamProvider::new();
        for locator in [
            path.to_string_lossy().to_string(),
            format!("file://{}", path.display()),
        ] {
            let mut buf = String::new();
            provider
                .open_stream(&locator)
                .unwrap()
                .read_to_string(&mut buf)
                .unwrap();
            assert_eq!(buf, "payload");
        }
    }

    #[test]
    fn test_rejects_remote_scheme() {
        let err = FileStreamProvider::new()
            .open_stream("https://example.com/dsu.zip")
            .err()
            .unwrap();
        assert!(matches!(err, DsuError::Unsupported(_)));
    }

    #[test]
    fn test_missing_file_is_stream_error() {
        let err = FileStreamProvider::new()
            .open_stream("/nonexistent/dsu/system.img")
            .err()
            .unwrap();
        assert!(matches!(err, DsuError::Stream(_)));
    }
}
