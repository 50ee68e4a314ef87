use std::fmt::Display;
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use futures::future::{AbortRegistration, Abortable};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use crate::convert::{self, Rendered, StaticFormat};
use crate::error::{Error, Result};
use crate::manifest::PackManifest;
use crate::pack::{PackMetadata, SourceFormat, StickerDescriptor, StickerPayload};
use crate::pack_id::PackId;
use crate::sanitize::sanitize;
use crate::telegram::BotApi;

const FALLBACK_LABEL: &str = "sticker";

/// What to download and how to store it.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct PackRequest {
    pub source_url: String,
    /// Store animated stickers as Lottie JSON instead of TGS
    #[builder(default)]
    pub convert_animated: bool,
    #[builder(default)]
    pub static_format: StaticFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Resolving,
    FetchingMetadata,
    PreparingOutput,
    IteratingStickers,
    Done,
    FailedFast,
}

#[derive(Debug)]
pub struct StickerReport {
    /// 1-based position in the pack
    pub index: usize,
    pub result: Result<PathBuf>,
}

#[derive(Debug)]
pub struct StickerFailure {
    pub index: usize,
    pub error: Error,
}

#[derive(Debug)]
pub struct RunSummary {
    pub pack_dir: PathBuf,
    pub attempted: usize,
    /// Written files, in pack order
    pub written: Vec<PathBuf>,
    pub failures: Vec<StickerFailure>,
}

impl RunSummary {
    fn from_reports(pack_dir: PathBuf, mut reports: Vec<StickerReport>) -> Self {
        reports.sort_by_key(|report| report.index);
        let attempted = reports.len();
        let mut written = Vec::with_capacity(attempted);
        let mut failures = Vec::new();
        for StickerReport { index, result } in reports {
            match result {
                Ok(path) => written.push(path),
                Err(error) => failures.push(StickerFailure { index, error }),
            }
        }
        Self {
            pack_dir,
            attempted,
            written,
            failures,
        }
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "saved {}/{} stickers to `{}`",
            self.written.len(),
            self.attempted,
            self.pack_dir.display()
        )?;
        if !self.failures.is_empty() {
            write!(f, " ({} failed)", self.failures.len())?;
        }
        Ok(())
    }
}

/// `{index:03}_{emoji}.{extension}`, with `sticker` standing in for a
/// missing or unusable emoji.
pub fn sticker_file_name(index: usize, emoji: Option<&str>, extension: &str) -> String {
    let label = emoji
        .map(sanitize)
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| FALLBACK_LABEL.to_owned());
    format!("{index:03}_{label}.{extension}")
}

async fn render(payload: StickerPayload, request: &PackRequest, progress: &ProgressBar) -> Rendered {
    let original = payload.original();
    let outcome = match &payload.format {
        SourceFormat::Animated if request.convert_animated => {
            let tgs = payload.bytes.clone();
            convert::in_background(original, move || convert::animated(tgs)).await
        }
        SourceFormat::Raster(ext) if request.static_format != StaticFormat::Raw => {
            let (data, ext, target) = (payload.bytes.clone(), ext.clone(), request.static_format);
            convert::in_background(original, move || convert::raster(data, &ext, target)).await
        }
        _ => return original,
    };
    if let Some(reason) = outcome.fallback_reason() {
        progress.suspend(|| warn!("keeping `{}` as is: {reason}", payload.file_path));
    }
    outcome.into_rendered()
}

/// Downloads one sticker pack into `<out_dir>/<title> (<id>)/`.
pub struct Pipeline<A> {
    api: A,
    out_dir: PathBuf,
    parallel: usize,
    show_progress: bool,
    stage: Stage,
}

impl<A> Pipeline<A>
where
    A: BotApi,
{
    pub fn new(api: A, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            out_dir: out_dir.into(),
            parallel: 1,
            show_progress: false,
            stage: Stage::Idle,
        }
    }

    /// How many stickers are in flight at once
    pub fn parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel.max(1);
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, stage: Stage) {
        debug!("{:?} -> {stage:?}", self.stage);
        self.stage = stage;
    }

    /// Errors before the first sticker is attempted abort the run. After
    /// that, failures are collected per sticker in the [`RunSummary`].
    pub async fn run(&mut self, request: &PackRequest) -> Result<RunSummary> {
        let (meta, pack_dir) = match self.prepare(request).await {
            Ok(prepared) => prepared,
            Err(err) => {
                self.enter(Stage::FailedFast);
                return Err(err);
            }
        };

        self.enter(Stage::IteratingStickers);
        let reports = self.download_all(request, &meta, &pack_dir).await;
        self.enter(Stage::Done);

        Ok(RunSummary::from_reports(pack_dir, reports))
    }

    /// [`Pipeline::run`] that resolves to [`Error::Cancelled`] once the
    /// matching `AbortHandle` fires.
    pub async fn run_abortable(
        &mut self,
        request: &PackRequest,
        registration: AbortRegistration,
    ) -> Result<RunSummary> {
        match Abortable::new(self.run(request), registration).await {
            Ok(result) => result,
            Err(_) => {
                warn!("cancelled while {:?}", self.stage);
                Err(Error::Cancelled)
            }
        }
    }

    async fn prepare(&mut self, request: &PackRequest) -> Result<(PackMetadata, PathBuf)> {
        self.enter(Stage::Resolving);
        let id = PackId::from_url(&request.source_url)?;

        self.enter(Stage::FetchingMetadata);
        let meta = PackMetadata::fetch(&self.api, &id).await?;

        self.enter(Stage::PreparingOutput);
        let pack_dir = self.out_dir.join(meta.dir_name());
        crate::fs::assert_dir(&pack_dir).await?;
        PackManifest::new(&meta, request).write_to(&pack_dir).await?;
        info!("saving stickers to `{}`", pack_dir.display());

        Ok((meta, pack_dir))
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64).with_message("Downloading stickers");
        if let Ok(style) = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({eta})") {
            bar.set_style(style.progress_chars("=> "));
        }
        bar
    }

    async fn download_all(
        &self,
        request: &PackRequest,
        meta: &PackMetadata,
        pack_dir: &Path,
    ) -> Vec<StickerReport> {
        let progress = self.progress_bar(meta.stickers.len());
        let reports = futures::stream::iter(meta.stickers.iter().enumerate())
            .map(|(i, sticker)| {
                let progress = &progress;
                async move {
                    let index = i + 1;
                    let result = self
                        .process(request, pack_dir, index, sticker, progress)
                        .await;
                    if let Err(err) = &result {
                        progress.suspend(|| warn!("sticker {index} failed: {err}"));
                    }
                    progress.inc(1);
                    StickerReport { index, result }
                }
            })
            .buffer_unordered(self.parallel)
            .collect::<Vec<_>>()
            .await;
        progress.finish_and_clear();
        reports
    }

    async fn process(
        &self,
        request: &PackRequest,
        pack_dir: &Path,
        index: usize,
        sticker: &StickerDescriptor,
        progress: &ProgressBar,
    ) -> Result<PathBuf> {
        let payload = StickerPayload::fetch(&self.api, sticker).await?;
        let rendered = render(payload, request, progress).await;

        let file_name = sticker_file_name(index, sticker.emoji.as_deref(), &rendered.extension);
        let path = pack_dir.join(file_name);
        crate::fs::write_file(&path, &rendered.bytes).await?;
        debug!("wrote `{}`", path.display());
        Ok(path)
    }
}
