use std::fmt::Display;
use std::io::{Cursor, Read};
use std::str::FromStr;

use bytes::Bytes;
use flate2::read::GzDecoder;
use image::{DynamicImage, ImageFormat};
use thiserror::Error;

use crate::error::{Error, Result};

pub const TGS_EXTENSION: &str = "tgs";
pub const LOTTIE_EXTENSION: &str = "json";

/// Target for static (raster) stickers. `Raw` keeps whatever Telegram serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaticFormat {
    #[default]
    Raw,
    Png,
    Jpeg,
}

#[derive(Error, Debug)]
#[error("unknown static format `{0}`, expected one of: raw, png, jpeg")]
pub struct UnknownFormat(String);

impl StaticFormat {
    fn image_format(self) -> Option<ImageFormat> {
        match self {
            StaticFormat::Raw => None,
            StaticFormat::Png => Some(ImageFormat::Png),
            StaticFormat::Jpeg => Some(ImageFormat::Jpeg),
        }
    }
    fn extension(self) -> &'static str {
        match self {
            StaticFormat::Raw => "webp",
            StaticFormat::Png => "png",
            StaticFormat::Jpeg => "jpeg",
        }
    }
    /// Formats without an alpha channel
    fn is_opaque(self) -> bool {
        matches!(self, StaticFormat::Jpeg)
    }
}

impl FromStr for StaticFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "png" => Ok(Self::Png),
            "jpeg" => Ok(Self::Jpeg),
            _ => Err(UnknownFormat(s.to_owned())),
        }
    }
}

impl Display for StaticFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StaticFormat::Raw => "RAW",
            StaticFormat::Png => "PNG",
            StaticFormat::Jpeg => "JPEG",
        })
    }
}

/// Bytes ready to be written, together with the extension they should get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub bytes: Bytes,
    pub extension: String,
}

impl Rendered {
    pub fn new(bytes: Bytes, extension: impl Into<String>) -> Self {
        Self {
            bytes,
            extension: extension.into(),
        }
    }
}

#[derive(Debug)]
pub enum ConversionOutcome {
    Converted(Rendered),
    /// Conversion failed, the original is kept untouched
    Fallback { original: Rendered, reason: Error },
}

impl ConversionOutcome {
    fn from_result(result: Result<Rendered>, original: Rendered) -> Self {
        match result {
            Ok(rendered) => Self::Converted(rendered),
            Err(reason) => Self::Fallback { original, reason },
        }
    }
    pub fn fallback_reason(&self) -> Option<&Error> {
        match self {
            Self::Converted(_) => None,
            Self::Fallback { reason, .. } => Some(reason),
        }
    }
    pub fn into_rendered(self) -> Rendered {
        match self {
            Self::Converted(rendered) => rendered,
            Self::Fallback { original, .. } => original,
        }
    }
}

fn failed(what: &str, err: impl Display) -> Error {
    Error::ConversionFailed(format!("{what}: {err}"))
}

fn lottie_json(tgs: &[u8]) -> Result<Rendered> {
    let mut json = Vec::new();
    GzDecoder::new(tgs)
        .read_to_end(&mut json)
        .map_err(|err| failed("couldn't decompress tgs", err))?;
    let document: serde_json::Value =
        serde_json::from_slice(&json).map_err(|err| failed("invalid lottie json", err))?;
    let pretty =
        serde_json::to_vec_pretty(&document).map_err(|err| failed("couldn't write json", err))?;
    Ok(Rendered::new(Bytes::from(pretty), LOTTIE_EXTENSION))
}

/// Unpacks a TGS sticker (gzip'd Lottie) into pretty-printed Lottie JSON.
pub fn animated(tgs: Bytes) -> ConversionOutcome {
    let result = lottie_json(&tgs);
    ConversionOutcome::from_result(result, Rendered::new(tgs, TGS_EXTENSION))
}

fn reencode(data: &[u8], target: StaticFormat, format: ImageFormat) -> Result<Rendered> {
    let mut image =
        image::load_from_memory(data).map_err(|err| failed("couldn't decode image", err))?;
    if target.is_opaque() {
        image = DynamicImage::ImageRgb8(image.to_rgb8());
    }
    let mut out = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut out), format)
        .map_err(|err| failed("couldn't encode image", err))?;
    Ok(Rendered::new(Bytes::from(out), target.extension()))
}

/// Re-encodes a static sticker. [`StaticFormat::Raw`] hands back the
/// original bytes without decoding them.
pub fn raster(data: Bytes, source_extension: &str, target: StaticFormat) -> ConversionOutcome {
    let original = Rendered::new(data, source_extension);
    match target.image_format() {
        None => ConversionOutcome::Converted(original),
        Some(format) => {
            let result = reencode(&original.bytes, target, format);
            ConversionOutcome::from_result(result, original)
        }
    }
}

/// Runs a conversion on the blocking pool. A panicking conversion falls back
/// to `original` like any other failure.
pub async fn in_background<F>(original: Rendered, convert: F) -> ConversionOutcome
where
    F: FnOnce() -> ConversionOutcome + Send + 'static,
{
    match tokio::task::spawn_blocking(convert).await {
        Ok(outcome) => outcome,
        Err(err) => ConversionOutcome::Fallback {
            original,
            reason: failed("conversion task died", err),
        },
    }
}
