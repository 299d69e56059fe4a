use std::process::ExitCode;

use clap::Parser;
use console::style;

use crate::cli::app::App;

mod cli;
mod config;
mod logging;

fn main() -> ExitCode {
    let app = App::parse();
    logging::init(app.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{} failed to start runtime: {e}", style("error:").red().bold());
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(cli::run(app)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", style("error:").red().bold());
            ExitCode::FAILURE
        }
    }
}
