//! Append-only recovery log: every secret the wallet derives or accepts is
//! written here, flushed, before the database learns about it.
//!
//! Line grammar is `<unix-seconds> <event> <payload>` with event one of
//! `hdroot`, `unused`, `pay`, `recieve` (sic), `change`, `mining`. The log
//! alone must be able to reproduce every secret the database ever knew.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use log::error;

use crate::types::{Category, SecretWebcash};

/// Narrow sink for recovery lines, so the wallet can be exercised against an
/// in-memory log in tests.
pub trait RecoveryLog: Send {
    /// Append one line and flush it to the OS before returning.
    fn append_line(&mut self, line: &str) -> Result<()>;
}

/// The `hdroot` event written once, when the master seed is minted.
pub fn root_line(timestamp: i64, secret_hex: &str) -> String {
    format!("{timestamp} hdroot {secret_hex} version=1")
}

/// A derived or accepted secret, tagged with its category name.
pub fn secret_line(timestamp: i64, category: Category, webcash: &SecretWebcash) -> String {
    format!("{timestamp} {} {webcash}", category.log_name())
}

/// Append a line, shouting on failure instead of aborting: the database is
/// the operational source of truth, so the caller proceeds, but the user must
/// copy the secret somewhere safe by hand.
pub fn append_or_warn(log: &mut dyn RecoveryLog, line: &str) {
    if let Err(err) = log.append_line(line) {
        error!("FAILED TO WRITE WALLET RECOVERY LOG ({err:#}). BACKUP THIS KEY NOW: {line}");
    }
}

/// File-backed log at the wallet's `.bak` path.
pub struct FileRecoveryLog {
    file: File,
}

impl FileRecoveryLog {
    pub fn open(path: &Path) -> Result<FileRecoveryLog> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .with_context(|| format!("open recovery log {}", path.display()))?;
        Ok(FileRecoveryLog { file })
    }
}

impl RecoveryLog for FileRecoveryLog {
    fn append_line(&mut self, line: &str) -> Result<()> {
        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.write_all(b"\n"))
            .context("append recovery line")?;
        // The line must be durable before any dependent database write.
        self.file.sync_data().context("flush recovery log")?;
        Ok(())
    }
}

/// In-memory log for tests; clone the handle to inspect lines afterwards.
#[derive(Clone, Default)]
pub struct MemoryRecoveryLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryRecoveryLog {
    pub fn new() -> MemoryRecoveryLog {
        MemoryRecoveryLog::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl RecoveryLog for MemoryRecoveryLog {
    fn append_line(&mut self, line: &str) -> Result<()> {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_owned());
        }
        Ok(())
    }
}
