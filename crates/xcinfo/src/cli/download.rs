use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Args;
use tracing::{info, warn};
use url::Url;
use xcinfo_fetch::{Error, Orchestrator, ProgressMode, ReqwestEngine, ResumeDataCache};

use crate::config::{Config, ProgressChoice};

#[derive(Args, Clone, Debug)]
pub struct DownloadArg {
    /// Download URL
    pub url: Url,

    /// Continue from resume data saved by an earlier attempt
    #[arg(long, conflicts_with = "discard_resume")]
    pub resume: bool,

    /// Forget saved resume data and start over
    #[arg(long)]
    pub discard_resume: bool,

    /// Parallel connections for servers that support ranges
    #[arg(long, short = 'j', value_parser = clap::value_parser!(u32).range(1..))]
    pub concurrency: Option<u32>,

    /// Let the machine sleep while downloading
    #[arg(long)]
    pub no_disable_sleep: bool,

    /// Log progress lines instead of drawing a bar
    #[arg(long)]
    pub plain: bool,

    /// Directory the file is written to
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

impl DownloadArg {
    fn concurrency(&self, config: &Config) -> u32 { self.concurrency.unwrap_or(config.concurrency) }

    fn disable_sleep(&self, config: &Config) -> bool { config.disable_sleep && !self.no_disable_sleep }

    fn download_dir(&self, config: &Config) -> PathBuf {
        self.output.clone().unwrap_or_else(|| config.download_dir())
    }

    fn progress(&self, config: &Config) -> ProgressMode {
        if self.plain {
            return ProgressMode::Plain;
        }
        match config.progress {
            ProgressChoice::Rich => ProgressMode::Rich,
            ProgressChoice::Plain => ProgressMode::Plain,
            ProgressChoice::Auto if console::Term::stderr().is_term() => ProgressMode::Rich,
            ProgressChoice::Auto => ProgressMode::Plain,
        }
    }
}

pub async fn run(arg: DownloadArg, config: &Config) -> Result<()> {
    let url = arg.url.clone();
    let cache = ResumeDataCache::new();

    if arg.discard_resume {
        cache
            .remove(&url)
            .with_context(|| format!("failed to discard resume data for {url}"))?;
    }

    let resume_token = if arg.resume {
        let token = cache.load(&url);
        if token.is_none() {
            warn!("no resume data for {url}, starting from the beginning");
        }
        token
    } else {
        None
    };

    let download_dir = arg.download_dir(config);
    let engine = ReqwestEngine::new(&download_dir).context("failed to build HTTP client")?;
    let mut orchestrator = Orchestrator::new(engine, cache.clone())
        .with_progress(arg.progress(config))
        .with_authorization(config.authorization.clone());

    let canceller = orchestrator.canceller();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("cancelling download");
            canceller.cancel();
        }
    });

    let result = orchestrator
        .start(
            &url,
            arg.disable_sleep(config),
            arg.concurrency(config),
            resume_token,
        )
        .await;
    ctrl_c.abort();

    match result {
        Ok(path) => {
            if let Err(e) = cache.remove(&url) {
                warn!("failed to clear resume data for {url}: {e}");
            }
            println!("{}", path.display());
            Ok(())
        }
        Err(Error::Recoverable { url, resume_token }) => {
            match cache.save(&resume_token, &url) {
                Ok(path) => info!("resume data saved to {}", path.display()),
                Err(e) => warn!("failed to save resume data for {url}: {e}"),
            }
            Err(anyhow!(
                "download of {url} stopped early; run again with --resume to continue"
            ))
        }
        Err(Error::Interrupted) => Err(interrupted(&cache, &url)),
        Err(e) => Err(e).with_context(|| format!("failed to download {url}")),
    }
}

/// Only suggest `--resume` when resume data for `url` was actually kept.
fn interrupted(cache: &ResumeDataCache, url: &Url) -> anyhow::Error {
    if cache.load(url).is_some() {
        anyhow!("download interrupted; run again with --resume to continue")
    } else {
        anyhow!("download interrupted; no resume data was kept for {url}")
    }
}
