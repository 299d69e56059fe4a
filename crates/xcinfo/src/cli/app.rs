use clap::{Parser, Subcommand};

use crate::cli::download::DownloadArg;
use crate::cli::resume_path::ResumePathArg;

#[derive(Clone, Debug, Parser)]
#[command(name = "xcinfo", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    #[command(subcommand)]
    pub cmd: Commands,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "dl", name = "download", about = "Download a file, resumably")]
    Download(DownloadArg),
    #[command(name = "resume-path", about = "Print where resume data for a URL is kept")]
    ResumePath(ResumePathArg),
}
