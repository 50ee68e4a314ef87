use std::time::Duration;

use crate::error::{Error, Result};

pub const TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";
pub const API_URL_VAR: &str = "TELEGRAM_API_URL";
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

pub struct Config {
    pub token: String,
    pub api_url: String,
    pub timeout: Duration,
}

impl Config {
    /// Reads the bot credentials from the environment, honoring a `.env`
    /// file in the working directory.
    pub fn from_env(timeout: Duration) -> Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok(), timeout)
    }

    pub fn from_lookup<F>(lookup: F, timeout: Duration) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(TOKEN_VAR)
            .map(|token| token.trim().to_owned())
            .filter(|token| !token.is_empty())
            .ok_or(Error::MissingCredential)?;
        let api_url = lookup(API_URL_VAR)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_owned());
        Ok(Self {
            token,
            api_url,
            timeout,
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}
