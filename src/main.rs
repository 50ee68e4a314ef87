mod config;
mod convert;
mod error;
mod fs;
mod logging;
mod manifest;
mod opt;
mod pack;
mod pack_id;
mod pipeline;
mod sanitize;
mod telegram;
mod unwrap_ext;

use futures::future::AbortHandle;
use log::{debug, error, info, warn};
use structopt::StructOpt;

use config::Config;
use opt::Opt;
use pipeline::{PackRequestBuilder, Pipeline};
use telegram::HttpBotApi;
use unwrap_ext::OrExit;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let opt = Opt::from_args();

    if let Err(err) = logging::init(opt.log_level()) {
        eprintln!("couldn't set up logging: {err}");
        std::process::exit(1);
    }

    let config = Config::from_env(opt.timeout()).or_exit("missing configuration");
    let api = HttpBotApi::new(&config).or_exit("couldn't create http client");

    let source_url = match opt.url.clone() {
        Some(url) => url,
        None => opt::prompt_url().await.or_exit("no sticker pack url"),
    };
    let request = PackRequestBuilder::default()
        .source_url(source_url)
        .convert_animated(opt.convert_tgs)
        .static_format(opt.static_format)
        .build()
        .or_exit("invalid request");

    let (handle, registration) = AbortHandle::new_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping");
            handle.abort();
        }
    });

    let mut pipeline = Pipeline::new(api, &opt.out_dir)
        .parallel(opt.parallel)
        .show_progress(!opt.no_progress);
    let summary = match pipeline.run_abortable(&request, registration).await {
        Ok(summary) => summary,
        Err(err) => {
            error!("download failed while {:?}: {err}", pipeline.stage());
            std::process::exit(1);
        }
    };

    info!("{summary}");
    if !summary.failures.is_empty() {
        let indices = summary
            .failures
            .iter()
            .map(|failure| failure.index.to_string())
            .collect::<Vec<_>>();
        warn!("failed stickers: {}", indices.join(", "));
        for failure in &summary.failures {
            debug!("sticker {}: {:?}", failure.index, failure.error);
        }
    }
}
