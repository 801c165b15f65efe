//! Secret and output ledger: merge-inserts, spent marking, balance queries.

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};

use crate::types::{Amount, Category, Hash256};

/// Merge-insert for the `secret` table. On collision the flags fold
/// monotonically: a secret can lose `mine` but never regain it, and can gain
/// `sweep` but never lose it.
const INSERT_SECRET_SQL: &str = "INSERT INTO secret (timestamp, secret, mine, sweep) \
     VALUES (?1, ?2, ?3, ?4) \
     ON CONFLICT(secret) DO UPDATE SET mine = (mine AND excluded.mine), sweep = (sweep OR excluded.sweep)";

/// Insert or merge a secret, returning the id of the fresh or pre-existing row.
pub fn insert_secret(
    conn: &Connection,
    timestamp: i64,
    secret_hex: &str,
    mine: bool,
    sweep: bool,
) -> Result<i64> {
    conn.execute(INSERT_SECRET_SQL, params![timestamp, secret_hex, mine, sweep])
        .context("insert secret")?;
    lookup_secret_id(conn, secret_hex)?
        .ok_or_else(|| anyhow!("secret row missing immediately after insert"))
}

/// Row id for a secret's hex text, if the wallet holds it.
pub fn lookup_secret_id(conn: &Connection, secret_hex: &str) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM secret WHERE secret = ?1",
        params![secret_hex],
        |row| row.get(0),
    )
    .optional()
    .context("look up secret id")
}

/// Insert one tracked output. `secret_id` is NULL when the wallet does not
/// hold the preimage.
pub fn insert_output(
    conn: &Connection,
    timestamp: i64,
    hash: &Hash256,
    secret_id: Option<i64>,
    amount: Amount,
    spent: bool,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO output (timestamp, hash, secret_id, amount, spent) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![timestamp, hash.as_bytes().as_slice(), secret_id, amount.0, spent],
    )
    .context("insert output")?;
    Ok(conn.last_insert_rowid())
}

/// Flip an output to spent. The flag only ever moves false → true.
pub fn mark_output_spent(conn: &Connection, output_id: i64) -> Result<()> {
    let changed = conn
        .execute("UPDATE output SET spent = 1 WHERE id = ?1", params![output_id])
        .context("mark output spent")?;
    if changed != 1 {
        return Err(anyhow!("no output row with id {output_id}"));
    }
    Ok(())
}

/// An output loaded for spending: row id, face amount, spent flag, and the
/// secret text when the wallet holds the preimage.
#[derive(Clone, Debug)]
pub struct StoredInput {
    pub output_id: i64,
    pub amount: Amount,
    pub spent: bool,
    pub secret: Option<String>,
}

/// Load one output joined to its secret, or `None` when the id is unknown.
pub fn load_input(conn: &Connection, output_id: i64) -> Result<Option<StoredInput>> {
    conn.query_row(
        "SELECT o.amount, o.spent, s.secret \
         FROM output o LEFT JOIN secret s ON s.id = o.secret_id \
         WHERE o.id = ?1",
        params![output_id],
        |row| {
            Ok(StoredInput {
                output_id,
                amount: Amount(row.get(0)?),
                spent: row.get(1)?,
                secret: row.get(2)?,
            })
        },
    )
    .optional()
    .context("load replace input")
}

/// One row of the output table with its category resolved.
#[derive(Clone, Debug)]
pub struct OutputRecord {
    pub id: i64,
    pub timestamp: i64,
    pub hash: Hash256,
    pub secret_id: Option<i64>,
    pub amount: Amount,
    pub spent: bool,
    pub category: Category,
}

const SELECT_OUTPUTS_SQL: &str = "SELECT o.id, o.timestamp, o.hash, o.secret_id, o.amount, o.spent, \
            s.mine, s.sweep, \
            (SELECT COUNT(*) FROM hdkey k WHERE k.secret_id = s.id) \
     FROM output o LEFT JOIN secret s ON s.id = o.secret_id \
     ORDER BY o.id";

/// Enumerate tracked outputs, optionally filtered by spent flag.
pub fn outputs(conn: &Connection, spent: Option<bool>) -> Result<Vec<OutputRecord>> {
    let mut stmt = conn
        .prepare(SELECT_OUTPUTS_SQL)
        .context("prepare output enumeration")?;
    let rows = stmt.query_map([], |row| {
        let hash: Vec<u8> = row.get(2)?;
        let mine: Option<bool> = row.get(6)?;
        let sweep: Option<bool> = row.get(7)?;
        let chained: i64 = row.get(8)?;
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            hash,
            row.get::<_, Option<i64>>(3)?,
            row.get::<_, i64>(4)?,
            row.get::<_, bool>(5)?,
            mine,
            sweep,
            chained,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, timestamp, hash, secret_id, amount, is_spent, mine, sweep, chained) =
            row.context("read output row")?;
        if let Some(want) = spent
            && is_spent != want
        {
            continue;
        }
        let hash = Hash256::from_slice(&hash)
            .ok_or_else(|| anyhow!("output {id} has a hash of {} bytes", hash.len()))?;
        // A secret the wallet never linked into a chain stays uncategorised.
        let category = match (mine, sweep) {
            (Some(mine), Some(sweep)) if chained > 0 => Category::from_flags(mine, sweep),
            _ => Category::Unused,
        };
        records.push(OutputRecord {
            id,
            timestamp,
            hash,
            secret_id,
            amount: Amount(amount),
            spent: is_spent,
            category,
        });
    }
    Ok(records)
}

/// Unspent value per category. Totals refuse to overflow.
pub fn balances(conn: &Connection) -> Result<HashMap<Category, Amount>> {
    let mut by_category: HashMap<Category, Amount> = HashMap::new();
    for record in outputs(conn, Some(false))? {
        let entry = by_category.entry(record.category).or_insert(Amount::ZERO);
        *entry = entry
            .checked_add(record.amount)
            .ok_or_else(|| anyhow!("wallet balance overflows in category {}", record.category))?;
    }
    Ok(by_category)
}

/// Total unspent value across all categories.
pub fn unspent_total(conn: &Connection) -> Result<Amount> {
    let amounts = outputs(conn, Some(false))?.into_iter().map(|r| r.amount);
    Amount::checked_sum(amounts).ok_or_else(|| anyhow!("wallet balance overflows"))
}
