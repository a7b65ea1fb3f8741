use std::process::ExitCode;

use clap::Parser;

use passcompass::api::{cli, Cli};
use passcompass::common::log;
use passcompass::AppCfg;

fn main() -> ExitCode {
    let args = Cli::parse();
    let cfg = match AppCfg::load(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("passcompass: {err}");
            return ExitCode::from(err.code() as u8);
        }
    };
    log::init(&cfg.logging);

    match cli::run(args.command, cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, code = err.code() as u32, "command failed");
            eprintln!("passcompass: {err}");
            ExitCode::from(err.code() as u8)
        }
    }
}
