use std::fmt::{Debug, Display};

use reqwest::Url;

use crate::error::{Error, Result};

const MARKER: &str = "addstickers";
const DEEP_LINK_SCHEME: &str = "tg";

/// Short name of a sticker pack, e.g. `JollySanta` in
/// `https://t.me/addstickers/JollySanta`.
#[derive(Clone, PartialEq, Eq)]
pub struct PackId(String);

impl PackId {
    /// Accepts `https://t.me/addstickers/<name>`, the same without a scheme,
    /// and `tg://addstickers?set=<name>`.
    pub fn from_url(input: &str) -> Result<Self> {
        let invalid = || Error::InvalidPackUrl(input.to_owned());

        let trimmed = input.trim();
        let url = match Url::parse(trimmed) {
            Ok(url) => url,
            Err(_) if !trimmed.contains("://") => {
                Url::parse(&format!("https://{trimmed}")).map_err(|_| invalid())?
            }
            Err(_) => return Err(invalid()),
        };

        let name = if url.scheme() == DEEP_LINK_SCHEME {
            Self::from_deep_link(&url)
        } else {
            Self::from_path(&url)
        };
        name.map(PackId).ok_or_else(invalid)
    }

    fn from_path(url: &Url) -> Option<String> {
        let mut segments = url.path_segments()?;
        segments.by_ref().find(|segment| *segment == MARKER)?;
        segments
            .next()
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
    }

    fn from_deep_link(url: &Url) -> Option<String> {
        if url.host_str() != Some(MARKER) {
            return None;
        }
        url.query_pairs()
            .find(|(key, _)| key == "set")
            .map(|(_, name)| name.into_owned())
            .filter(|name| !name.is_empty())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
impl Debug for PackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PackId").field(&self.0).finish()
    }
}
