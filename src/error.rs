use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid sticker pack url `{0}` (expected something like https://t.me/addstickers/PackName)")]
    InvalidPackUrl(String),
    #[error("TELEGRAM_BOT_TOKEN is not set, add it to the environment or a .env file")]
    MissingCredential,
    #[error("sticker pack not found: {0}")]
    PackNotFound(String),
    #[error("couldn't resolve file `{file_id}`: {description}")]
    FileResolutionFailed { file_id: String, description: String },
    #[error("downloading `{path}` failed with status {status}")]
    DownloadFailed { path: String, status: u16 },
    #[error("conversion failed: {0}")]
    ConversionFailed(String),
    #[error("filesystem error at `{}`: {}", .path.display(), .source)]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("request timed out")]
    RequestTimeout,
    #[error("request failed: {0}")]
    Http(#[source] reqwest::Error),
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::RequestTimeout
        } else {
            // request urls carry the bot token
            Self::Http(err.without_url())
        }
    }
}
