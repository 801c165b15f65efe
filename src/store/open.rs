//! Open the wallet database: file creation, exclusive lock, schema migration.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use fs4::FileExt;
use rusqlite::{Connection, OpenFlags};

use crate::utils::config::WalletFiles;

use super::SCHEMA;

/// Handle on the wallet's two files: the relational database (exclusively
/// locked for the lifetime of this value) and the recovery log path.
///
/// Dropping the store closes the connection and releases the advisory lock.
pub struct Store {
    conn: Connection,
    db_path: PathBuf,
    log_path: PathBuf,
    // Whole-file advisory lock; released when the handle drops.
    _lock: File,
}

impl Store {
    /// Open or create the wallet at `base`, which may be the shared basename
    /// or either of the two wallet files; extensions are replaced either way.
    ///
    /// Fails fast when another process holds the wallet, when the database
    /// cannot be opened, or when schema migration fails.
    pub fn open(base: &Path) -> Result<Store> {
        let db_path = base.with_extension(WalletFiles::DB_EXTENSION);
        let log_path = base.with_extension(WalletFiles::LOG_EXTENSION);

        // Create the database file up front so the inter-process lock has a
        // target. An empty file is a valid, albeit empty, sqlite3 database.
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&db_path)
            .with_context(|| format!("unable to create wallet database {}", db_path.display()))?;
        lock.try_lock_exclusive().map_err(|_| {
            anyhow!(
                "unable to lock wallet database {}; wallet is in use by another process",
                db_path.display()
            )
        })?;

        let conn = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .context("open wallet database")?;
        conn.execute_batch(SCHEMA).context("create wallet schema")?;

        // Touch the recovery log so the user can see it before the first
        // secret is ever written.
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(&log_path)
            .with_context(|| format!("unable to create wallet recovery file {}", log_path.display()))?;

        Ok(Store {
            conn,
            db_path,
            log_path,
            _lock: lock,
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

/// In-memory database with the same schema, for ledger tests.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory database")?;
    conn.execute_batch(SCHEMA).context("create wallet schema")?;
    Ok(conn)
}
