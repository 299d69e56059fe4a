pub mod app;
pub mod download;
pub mod resume_path;

use anyhow::{Context, Result};

use crate::cli::app::{App, Commands};
use crate::config::Config;

pub async fn run(app: App) -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    match app.cmd {
        Commands::Download(args) => download::run(args, &config).await,
        Commands::ResumePath(args) => resume_path::run(&args),
    }
}
