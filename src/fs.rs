use std::io::ErrorKind;
use std::path::Path;

use crate::error::{Error, Result};

/// Creates `path` and its parents unless it already is a directory.
pub async fn assert_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::filesystem(
            path,
            std::io::Error::new(ErrorKind::AlreadyExists, "path exists but is not a directory"),
        )),
        Err(_) => tokio::fs::create_dir_all(path)
            .await
            .map_err(|err| Error::filesystem(path, err)),
    }
}

/// Writes `data` to `path`, replacing an existing file.
pub async fn write_file(path: impl AsRef<Path>, data: impl AsRef<[u8]>) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, data)
        .await
        .map_err(|err| Error::filesystem(path, err))
}
