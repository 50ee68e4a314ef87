use std::path::Path;

use bytes::Bytes;
use log::{debug, info};

use crate::convert::{Rendered, TGS_EXTENSION};
use crate::error::{Error, Result};
use crate::pack_id::PackId;
use crate::sanitize::sanitize;
use crate::telegram::{BotApi, StickerSet};

const VIDEO_EXTENSION: &str = "webm";
const DEFAULT_RASTER_EXTENSION: &str = "webp";

#[derive(Debug, Clone)]
pub struct StickerDescriptor {
    pub file_id: String,
    pub emoji: Option<String>,
    /// As declared by the server. The resolved file path decides.
    pub is_animated: bool,
}

#[derive(Debug, Clone)]
pub struct PackMetadata {
    pub id: PackId,
    pub title: String,
    pub author: Option<String>,
    /// In server order, which is also the numbering of the written files
    pub stickers: Vec<StickerDescriptor>,
}

impl PackMetadata {
    pub fn from_set(id: PackId, set: StickerSet) -> Self {
        let stickers = set
            .stickers
            .into_iter()
            .map(|sticker| StickerDescriptor {
                file_id: sticker.file_id,
                emoji: sticker.emoji,
                is_animated: sticker.is_animated,
            })
            .collect();
        Self {
            title: set.title.unwrap_or_else(|| id.to_string()),
            author: set.author,
            id,
            stickers,
        }
    }

    pub async fn fetch<A>(api: &A, id: &PackId) -> Result<Self>
    where
        A: BotApi + ?Sized,
    {
        let set = api
            .get_sticker_set(id.as_str())
            .await?
            .map_err(Error::PackNotFound)?;
        let meta = Self::from_set(id.clone(), set);
        info!(
            "found {} stickers in pack `{}` ({id})",
            meta.stickers.len(),
            meta.title
        );
        Ok(meta)
    }

    /// `<title> (<id>)`
    pub fn dir_name(&self) -> String {
        format!("{} ({})", sanitize(&self.title), self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFormat {
    /// `.tgs`, gzip'd Lottie
    Animated,
    /// `.webm` video sticker, always stored as is
    Video,
    Raster(String),
}

impl SourceFormat {
    pub fn from_path(file_path: &str) -> Self {
        let extension = Path::new(file_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some(TGS_EXTENSION) => Self::Animated,
            Some(VIDEO_EXTENSION) => Self::Video,
            Some(ext) if !ext.is_empty() => Self::Raster(ext.to_owned()),
            _ => Self::Raster(DEFAULT_RASTER_EXTENSION.to_owned()),
        }
    }
    pub fn is_animated(&self) -> bool {
        matches!(self, Self::Animated)
    }
    pub fn extension(&self) -> &str {
        match self {
            Self::Animated => TGS_EXTENSION,
            Self::Video => VIDEO_EXTENSION,
            Self::Raster(ext) => ext.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StickerPayload {
    pub file_path: String,
    pub bytes: Bytes,
    pub format: SourceFormat,
}

impl StickerPayload {
    pub async fn fetch<A>(api: &A, sticker: &StickerDescriptor) -> Result<Self>
    where
        A: BotApi + ?Sized,
    {
        let resolution_failed = |description: String| Error::FileResolutionFailed {
            file_id: sticker.file_id.clone(),
            description,
        };

        let file = api
            .get_file(&sticker.file_id)
            .await?
            .map_err(resolution_failed)?;
        let file_path = file
            .file_path
            .ok_or_else(|| resolution_failed("no file path in response".to_owned()))?;
        debug!("resolved `{}` to `{file_path}`", file.file_id);

        let bytes = api.download(&file_path).await?;
        let format = SourceFormat::from_path(&file_path);
        if format.is_animated() != sticker.is_animated {
            debug!(
                "`{file_path}` declared animated={} but has suffix `{}`",
                sticker.is_animated,
                format.extension()
            );
        }

        Ok(Self {
            file_path,
            bytes,
            format,
        })
    }

    /// The payload as downloaded
    pub fn original(&self) -> Rendered {
        Rendered::new(self.bytes.clone(), self.format.extension())
    }
}
