use std::env;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format;

use self::args::{Args, Command};
use self::fit::run_fit;
use self::respond::run_respond;

mod args;
mod data;
mod fit;
mod output;
mod respond;

fn main() -> ExitCode {
    let args = Args::parse();

    if matches!(args.command, Command::Fit(_)) {
        set_default_logging();
    }

    let event_format = format().with_target(false).without_time();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .event_format(event_format)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Fit(config) => run_fit(config),
        Command::Respond(config) => run_respond(config),
    }
}

fn set_default_logging() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
}
