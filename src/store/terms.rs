//! Terms-of-service ledger: append-only record of acknowledged legal texts.

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

/// Have *any* terms of service been accepted?
pub fn have_accepted_terms(conn: &Connection) -> Result<bool> {
    conn.query_row("SELECT EXISTS(SELECT 1 FROM terms)", [], |row| row.get(0))
        .context("query terms table")
}

/// Have these exact terms (byte-for-byte) been accepted?
pub fn are_terms_accepted(conn: &Connection, body: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM terms WHERE body = ?1)",
        params![body],
        |row| row.get(0),
    )
    .context("query terms acceptance")
}

/// Record acceptance of `body`. Idempotent.
pub fn accept_terms(conn: &Connection, timestamp: i64, body: &str) -> Result<()> {
    if !are_terms_accepted(conn, body)? {
        conn.execute(
            "INSERT INTO terms (body, timestamp) VALUES (?1, ?2)",
            params![body, timestamp],
        )
        .context("record terms acceptance")?;
    }
    Ok(())
}
