//! HD key engine: master root creation/load and deterministic derivation of
//! per-chain secrets.
//!
//! Every secret is `SHA256(tag || tag || root || chaincode || depth)` with
//! `tag = SHA256("webcashwalletv1")`, the chaincode encoded big-endian with
//! the category in its low 2 bits, and the depth encoded big-endian. The
//! encoding is a durable contract: changing a single bit orphans every
//! wallet derived under the old scheme.

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use rand::RngCore;
use rand::rngs::OsRng;
use rusqlite::{Connection, params};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use crate::recovery::{self, RecoveryLog};
use crate::store::{SqlValue, execute_statements, lookup_secret_id};
use crate::types::{Amount, Category, WalletSecret};
use crate::utils::config::{
    DEFAULT_CHAINCODE, DERIVATION_DOMAIN, HDROOT_VERSION, ROOT_SECRET_LEN, ROOT_SECRET_MIN_LEN,
};

/// The loaded master seed. The working buffer is wiped when dropped.
pub struct HdRoot {
    id: i64,
    secret: Zeroizing<[u8; 32]>,
}

impl HdRoot {
    pub fn id(&self) -> i64 {
        self.id
    }

    fn secret(&self) -> &[u8; 32] {
        &self.secret
    }
}

/// Category selector folded into the low 2 bits of the encoded chaincode.
fn category_bits(mine: bool, sweep: bool) -> u64 {
    match (mine, sweep) {
        (false, true) => 0,
        (false, false) => 1,
        (true, false) => 2,
        (true, true) => 3,
    }
}

/// 8 big-endian bytes: the 62-bit chaincode shifted left by 2 with the
/// category OR-ed into the bottom.
pub fn encode_chaincode(chaincode: u64, mine: bool, sweep: bool) -> [u8; 8] {
    ((chaincode << 2) | category_bits(mine, sweep)).to_be_bytes()
}

/// Deterministically derive the secret at `(chaincode, mine, sweep, depth)`
/// under `root`, presented as 64 lowercase hex characters. The raw digest is
/// wiped after the hex conversion.
pub fn derive_secret(
    root: &[u8; 32],
    chaincode: u64,
    mine: bool,
    sweep: bool,
    depth: u64,
) -> String {
    let tag: [u8; 32] = Sha256::digest(DERIVATION_DOMAIN).into();
    let mut hasher = Sha256::new();
    hasher.update(tag);
    hasher.update(tag);
    hasher.update(root);
    hasher.update(encode_chaincode(chaincode, mine, sweep));
    hasher.update(depth.to_be_bytes());
    let raw: Zeroizing<[u8; 32]> = Zeroizing::new(hasher.finalize().into());
    hex::encode(raw.as_slice())
}

/// Root plus the four initial chains, inserted atomically. The recovery line
/// is already durable by the time this runs.
const CREATE_ROOT_SQL: &str = "\
    BEGIN TRANSACTION; \
    INSERT INTO hdroot (timestamp, version, secret) VALUES (:timestamp, :version, :secret); \
    INSERT INTO hdchain (hdroot_id, chaincode, mine, sweep, mindepth, maxdepth) SELECT id, :chaincode, 0, 0, 0, 0 FROM hdroot; \
    INSERT INTO hdchain (hdroot_id, chaincode, mine, sweep, mindepth, maxdepth) SELECT id, :chaincode, 0, 1, 0, 0 FROM hdroot; \
    INSERT INTO hdchain (hdroot_id, chaincode, mine, sweep, mindepth, maxdepth) SELECT id, :chaincode, 1, 0, 0, 0 FROM hdroot; \
    INSERT INTO hdchain (hdroot_id, chaincode, mine, sweep, mindepth, maxdepth) SELECT id, :chaincode, 1, 1, 0, 0 FROM hdroot; \
    COMMIT";

/// Load the wallet's root, creating it (and its four chains) on first open.
///
/// Exactly zero or one root rows are tolerated; anything else is a corrupt
/// wallet and fails construction.
pub fn get_or_create_root(
    conn: &Connection,
    log: &mut dyn RecoveryLog,
    timestamp: i64,
) -> Result<HdRoot> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM hdroot", [], |row| row.get(0))
        .context("count hdroot rows")?;
    match count {
        0 => create_root(conn, log, timestamp),
        1 => load_root(conn),
        n => Err(anyhow!("wallet database has {n} hd roots; refusing to load")),
    }
}

fn create_root(conn: &Connection, log: &mut dyn RecoveryLog, timestamp: i64) -> Result<HdRoot> {
    let mut secret = Zeroizing::new([0u8; 32]);
    OsRng.fill_bytes(&mut secret[..]);

    // The seed reaches the recovery log before the database ever sees it;
    // refusing here keeps an unrecoverable root from existing at all.
    log.append_line(&recovery::root_line(timestamp, &hex::encode(secret.as_slice())))
        .context("write hd root to recovery log")?;

    let params: HashMap<&str, SqlValue> = HashMap::from([
        (":timestamp", SqlValue::Integer(timestamp)),
        (":version", SqlValue::Integer(HDROOT_VERSION)),
        (":secret", SqlValue::Blob(secret.to_vec())),
        (":chaincode", SqlValue::Integer(DEFAULT_CHAINCODE as i64)),
    ]);
    execute_statements(conn, CREATE_ROOT_SQL, &params).context("create hd root")?;

    let id = conn
        .query_row("SELECT id FROM hdroot", [], |row| row.get(0))
        .context("read back hd root id")?;
    Ok(HdRoot { id, secret })
}

fn load_root(conn: &Connection) -> Result<HdRoot> {
    let (id, version, mut raw): (i64, i64, Vec<u8>) = conn
        .query_row("SELECT id, version, secret FROM hdroot", [], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .context("load hd root")?;
    if version != HDROOT_VERSION {
        raw.zeroize();
        return Err(anyhow!("unsupported hd root version {version}"));
    }
    if raw.len() < ROOT_SECRET_MIN_LEN || raw.len() > ROOT_SECRET_LEN {
        raw.zeroize();
        return Err(anyhow!("hd root secret length {} out of range", raw.len()));
    }
    // Short historical roots are right-padded with zero bytes.
    let mut secret = Zeroizing::new([0u8; 32]);
    secret[..raw.len()].copy_from_slice(&raw);
    raw.zeroize();
    Ok(HdRoot { id, secret })
}

/// Merge-insert the derived secret, bind it to its derivation path, and
/// advance the chain's depth counter, atomically.
const RESERVE_SECRET_SQL: &str = "\
    BEGIN TRANSACTION; \
    INSERT INTO secret (timestamp, secret, mine, sweep) VALUES (:timestamp, :secret, :mine, :sweep) \
        ON CONFLICT(secret) DO UPDATE SET mine = (mine AND excluded.mine), sweep = (sweep OR excluded.sweep); \
    INSERT INTO hdkey (hdchain_id, depth, secret_id) \
        VALUES (:hdchain_id, :depth, (SELECT id FROM secret WHERE secret = :secret)); \
    UPDATE hdchain SET maxdepth = :nextdepth WHERE id = :hdchain_id; \
    COMMIT";

/// Reserve the next secret on the `(mine, sweep)` chain.
///
/// The secret is derived at the chain's current `maxdepth`, written to the
/// recovery log (a write failure warns loudly but does not abort), and only
/// then inserted and linked, with `maxdepth` advancing by exactly one.
pub fn reserve_secret(
    conn: &Connection,
    root: &HdRoot,
    log: &mut dyn RecoveryLog,
    timestamp: i64,
    amount: Amount,
    mine: bool,
    sweep: bool,
) -> Result<WalletSecret> {
    let (chain_id, depth): (i64, i64) = conn
        .query_row(
            "SELECT id, maxdepth FROM hdchain WHERE hdroot_id = ?1 AND chaincode = ?2 AND mine = ?3 AND sweep = ?4",
            params![root.id, DEFAULT_CHAINCODE as i64, mine, sweep],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .context("load hd chain state")?;

    let secret_hex = derive_secret(root.secret(), DEFAULT_CHAINCODE, mine, sweep, depth as u64);

    let webcash = crate::types::SecretWebcash {
        sk: secret_hex.clone(),
        amount,
    };
    recovery::append_or_warn(
        log,
        &recovery::secret_line(timestamp, Category::from_flags(mine, sweep), &webcash),
    );

    let params: HashMap<&str, SqlValue> = HashMap::from([
        (":timestamp", SqlValue::Integer(timestamp)),
        (":secret", SqlValue::Text(secret_hex.clone())),
        (":mine", SqlValue::Bool(mine)),
        (":sweep", SqlValue::Bool(sweep)),
        (":hdchain_id", SqlValue::Integer(chain_id)),
        (":depth", SqlValue::Integer(depth)),
        (":nextdepth", SqlValue::Integer(depth + 1)),
    ]);
    execute_statements(conn, RESERVE_SECRET_SQL, &params).context("reserve hd secret")?;

    let id = lookup_secret_id(conn, &secret_hex)?
        .ok_or_else(|| anyhow!("reserved secret missing immediately after insert"))?;
    Ok(WalletSecret {
        id,
        secret: secret_hex,
        mine,
        sweep,
    })
}
