use anyhow::Context;
use rehearsal_rs::cli::run_cli_simulation;
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let file = File::create("output.log").context("failed to create log file")?;
    let file_layer = fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_thread_names(true)
        .with_level(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(false)
        .with_thread_names(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    // rehearsal [config_dir] [output_dir]
    let mut args = std::env::args_os().skip(1);
    let config_dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let output_dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| config_dir.join("takes"));

    run_cli_simulation(&config_dir, &output_dir)
}
