use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::debug;

use crate::convert::StaticFormat;
use crate::error::Result;
use crate::pack::PackMetadata;
use crate::pipeline::PackRequest;

pub const FILE_NAME: &str = "pack_info.txt";

/// Human readable summary written next to the stickers.
#[derive(Debug)]
pub struct PackManifest<'a> {
    pub title: &'a str,
    pub sticker_count: usize,
    pub source_url: &'a str,
    pub author: Option<&'a str>,
    pub static_format: StaticFormat,
    pub convert_animated: bool,
    pub downloaded_at: DateTime<Local>,
}

impl<'a> PackManifest<'a> {
    pub fn new(meta: &'a PackMetadata, request: &'a PackRequest) -> Self {
        Self {
            title: &meta.title,
            sticker_count: meta.stickers.len(),
            source_url: &request.source_url,
            author: meta.author.as_deref(),
            static_format: request.static_format,
            convert_animated: request.convert_animated,
            downloaded_at: Local::now(),
        }
    }

    pub async fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(FILE_NAME);
        crate::fs::write_file(&path, self.to_string()).await?;
        debug!("wrote manifest `{}`", path.display());
        Ok(path)
    }
}

impl Display for PackManifest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Pack Name: {}", self.title)?;
        writeln!(f, "Sticker Count: {}", self.sticker_count)?;
        writeln!(f, "Original URL: {}", self.source_url)?;
        if let Some(author) = self.author {
            writeln!(f, "Author: {author}")?;
        }
        writeln!(f, "Static stickers format: {}", self.static_format)?;
        let animated = if self.convert_animated {
            "Lottie JSON"
        } else {
            "TGS"
        };
        writeln!(f, "Animated stickers saved as: {animated}")?;
        writeln!(
            f,
            "Downloaded: {}",
            self.downloaded_at.format("%Y-%m-%d %H:%M:%S %:z")
        )
    }
}
