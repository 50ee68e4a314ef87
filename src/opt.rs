use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;
use log::LevelFilter;
use structopt::StructOpt;
use thiserror::Error;

use crate::convert::StaticFormat;
use crate::pack_id::PackId;

#[derive(Error, Debug)]
pub enum ParallelParseError {
    #[error("not a number: {0}")]
    Syntax(#[from] std::num::ParseIntError),
    #[error("must be at least 1")]
    Zero,
}

fn parallelism(src: &str) -> Result<usize, ParallelParseError> {
    match src.parse::<usize>()? {
        0 => Err(ParallelParseError::Zero),
        n => Ok(n),
    }
}

#[derive(Debug, StructOpt)]
#[structopt(name = "stickerpull", about = "Download Telegram sticker packs.")]
pub struct Opt {
    /// Sticker pack URL like https://t.me/addstickers/PackName, asked for when omitted
    pub url: Option<String>,

    /// Store animated stickers as Lottie JSON instead of TGS
    #[structopt(long)]
    pub convert_tgs: bool,

    /// Format for static stickers: raw, png or jpeg
    #[structopt(long, default_value = "raw")]
    pub static_format: StaticFormat,

    /// Where pack directories are created
    #[structopt(long = "out-dir", default_value = "downloads", parse(from_os_str))]
    pub out_dir: PathBuf,

    /// How many stickers to download at once
    #[structopt(long, default_value = "4", parse(try_from_str = parallelism))]
    pub parallel: usize,

    /// Timeout for each request, in seconds
    #[structopt(long, default_value = "30")]
    pub timeout: u64,

    /// Don't draw a progress bar
    #[structopt(long)]
    pub no_progress: bool,

    /// Log more, repeat for even more
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u8,
}

impl Opt {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

fn prompt_url_blocking() -> std::io::Result<String> {
    Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt("Sticker pack URL")
        .validate_with(|input: &String| {
            PackId::from_url(input)
                .map(|_| ())
                .map_err(|err| err.to_string())
        })
        .interact_text()
}

pub async fn prompt_url() -> Result<String> {
    Ok(tokio::task::spawn_blocking(prompt_url_blocking).await??)
}
