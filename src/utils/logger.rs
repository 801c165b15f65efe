use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

/// Initialise logging for binaries and tests embedding the wallet.
///
/// Dependencies are capped at warnings; this crate logs at `Info`, or
/// `Debug` when `verbose` is set. Recovery-log failures surface here as
/// loud red errors, so embedders should call this (or install their own
/// logger) before opening a wallet.
pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Module targets use the crate name, underscored.
    let crate_target = env!("CARGO_PKG_NAME").replace('-', "_");

    Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(&crate_target, level)
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME");
            let line = match record.level() {
                Level::Error => format!("[{} {}] {}", name.cyan(), "ERROR".red(), record.args()),
                Level::Warn => format!("[{} {}] {}", name.cyan(), "WARN".yellow(), record.args()),
                _ => format!("[{}] {}", name.cyan(), record.args()),
            };
            writeln!(buf, "{}", line)
        })
        .init();
}
