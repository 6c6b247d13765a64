//! ghrewrite CLI: rule-based rewrites for GitHub Actions workflows.

use clap::Parser;
use ghrewrite::cli::Cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(e) = ghrewrite::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
