//! Logging setup based on the CLI arguments.
use crate::cli::Args;
use anyhow::{Context, Result};
use fern::colors::ColoredLevelConfig;
use std::path::Path;

/// Initializes the global logger.
///
/// Verbosity maps `-v` to Info, `-vv` to Debug and `-vvv` to Trace, everything
/// else stays at Warn. Logs go to stdout unless `--logoutput` names a file
/// (`-` selects stdout explicitly).
pub fn setup(args: &Args) -> Result<()> {
    let level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let colors = ColoredLevelConfig::new();

    let dispatch = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.target(),
                colors.color(record.level()),
                message
            ))
        })
        .level(level);

    let dispatch = match &args.logoutput {
        Some(path) if path.as_path() != Path::new("-") => dispatch.chain(
            fern::log_file(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?,
        ),
        _ => dispatch.chain(std::io::stdout()),
    };

    dispatch.apply().context("Failed to setup logging utility")
}
