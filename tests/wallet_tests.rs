//! Wallet lifecycle tests: bootstrap, reservation, secret merging, terms,
//! and the inter-process lock.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tempfile::TempDir;
use webcash_wallet::recovery::MemoryRecoveryLog;
use webcash_wallet::{Amount, SecretWebcash, Wallet, WalletOptions};

fn wallet_base(dir: &TempDir) -> PathBuf {
    dir.path().join("wallet")
}

fn read_only_db(base: &Path) -> Connection {
    Connection::open(base.with_extension("db")).unwrap()
}

#[test]
fn test_fresh_wallet_bootstrap() {
    let dir = TempDir::new().unwrap();
    let base = wallet_base(&dir);
    let wallet = Wallet::open(&base).unwrap();
    drop(wallet);

    assert!(base.with_extension("db").exists());
    assert!(base.with_extension("bak").exists());

    let conn = read_only_db(&base);
    let roots: i64 = conn
        .query_row("SELECT COUNT(*) FROM hdroot", [], |r| r.get(0))
        .unwrap();
    assert_eq!(roots, 1);
    let version: i64 = conn
        .query_row("SELECT version FROM hdroot", [], |r| r.get(0))
        .unwrap();
    assert_eq!(version, 1);

    let mut stmt = conn
        .prepare("SELECT mine, sweep, mindepth, maxdepth FROM hdchain ORDER BY mine, sweep")
        .unwrap();
    let chains: Vec<(bool, bool, i64, i64)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(
        chains,
        vec![
            (false, false, 0, 0),
            (false, true, 0, 0),
            (true, false, 0, 0),
            (true, true, 0, 0),
        ]
    );

    // Exactly one recovery line: "<ts> hdroot <64 hex> version=1".
    let log = std::fs::read_to_string(base.with_extension("bak")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 1);
    let fields: Vec<&str> = lines[0].split(' ').collect();
    assert_eq!(fields.len(), 4);
    assert!(fields[0].parse::<i64>().is_ok());
    assert_eq!(fields[1], "hdroot");
    assert_eq!(fields[2].len(), 64);
    assert!(fields[2].bytes().all(|b| b.is_ascii_hexdigit()));
    assert_eq!(fields[3], "version=1");
}

#[test]
fn test_reopen_loads_same_root() {
    let dir = TempDir::new().unwrap();
    let base = wallet_base(&dir);

    let wallet = Wallet::open(&base).unwrap();
    let first = wallet
        .reserve_secret(1000, Amount(1), false, true)
        .unwrap();
    drop(wallet);

    // Reopening loads the persisted root and chain counters instead of
    // minting fresh ones, so the next reservation lands at depth 1.
    let wallet = Wallet::open(&base).unwrap();
    let second = wallet.reserve_secret(1001, Amount(1), false, true).unwrap();
    drop(wallet);
    assert_ne!(first.secret, second.secret);

    let conn = read_only_db(&base);
    let maxdepth: i64 = conn
        .query_row(
            "SELECT maxdepth FROM hdchain WHERE mine = 0 AND sweep = 1",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(maxdepth, 2);
}

#[test]
fn test_reserve_secret_advances_chain() {
    let dir = TempDir::new().unwrap();
    let base = wallet_base(&dir);
    let wallet = Wallet::open(&base).unwrap();

    let first = wallet.reserve_secret(1000, Amount(5), false, true).unwrap();
    let second = wallet.reserve_secret(1001, Amount(5), false, true).unwrap();
    assert_ne!(first.secret, second.secret);
    assert!(first.id > 0);
    assert!(second.id > 0);
    assert_ne!(first.id, second.id);
    drop(wallet);

    let conn = read_only_db(&base);
    let maxdepth: i64 = conn
        .query_row(
            "SELECT maxdepth FROM hdchain WHERE mine = 0 AND sweep = 1",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(maxdepth, 2);

    let mut stmt = conn
        .prepare(
            "SELECT k.depth FROM hdkey k \
             JOIN hdchain c ON c.id = k.hdchain_id \
             WHERE c.mine = 0 AND c.sweep = 1 ORDER BY k.depth",
        )
        .unwrap();
    let depths: Vec<i64> = stmt
        .query_map([], |r| r.get(0))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(depths, vec![0, 1]);
}

#[test]
fn test_add_secret_is_idempotent_and_merges_flags() {
    let dir = TempDir::new().unwrap();
    let base = wallet_base(&dir);
    let memlog = MemoryRecoveryLog::new();
    let wallet = Wallet::open_with_log(
        &base,
        WalletOptions::default(),
        Box::new(memlog.clone()),
    )
    .unwrap();

    let webcash = SecretWebcash {
        sk: "ab".repeat(32),
        amount: Amount(100),
    };
    let first = wallet.add_secret(2000, &webcash, true, false).unwrap();
    let second = wallet.add_secret(2001, &webcash, false, true).unwrap();
    assert_eq!(first, second);
    drop(wallet);

    // mine only ever falls, sweep only ever rises.
    let conn = read_only_db(&base);
    let (mine, sweep): (bool, bool) = conn
        .query_row(
            "SELECT mine, sweep FROM secret WHERE secret = ?1",
            [webcash.sk.as_str()],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert!(!mine);
    assert!(sweep);

    // Both attempts hit the recovery log before the database, with their
    // category names.
    let lines = memlog.lines();
    assert_eq!(lines.len(), 3); // hdroot + two secret lines
    assert!(lines[1].starts_with("2000 change "));
    assert!(lines[2].starts_with("2001 recieve "));
    assert!(lines[1].ends_with(&webcash.to_string()));
}

#[test]
fn test_log_precedes_database_for_secrets() {
    let dir = TempDir::new().unwrap();
    let base = wallet_base(&dir);
    let wallet = Wallet::open(&base).unwrap();
    let reserved = wallet.reserve_secret(3000, Amount(7), true, false).unwrap();
    drop(wallet);

    let log = std::fs::read_to_string(base.with_extension("bak")).unwrap();
    assert!(
        log.lines().any(|l| l.contains(&reserved.secret)),
        "reserved secret must appear in the recovery log"
    );

    let conn = read_only_db(&base);
    let db_timestamp: i64 = conn
        .query_row(
            "SELECT timestamp FROM secret WHERE secret = ?1",
            [reserved.secret.as_str()],
            |r| r.get(0),
        )
        .unwrap();
    let log_timestamp: i64 = log
        .lines()
        .find(|l| l.contains(&reserved.secret))
        .and_then(|l| l.split(' ').next())
        .and_then(|t| t.parse().ok())
        .unwrap();
    assert!(log_timestamp <= db_timestamp);
}

#[test]
fn test_accept_terms_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let wallet = Wallet::open(&wallet_base(&dir)).unwrap();

    assert!(!wallet.have_accepted_terms().unwrap());
    assert!(!wallet.are_terms_accepted("terms of service").unwrap());

    wallet.accept_terms(4000, "terms of service").unwrap();
    wallet.accept_terms(4001, "terms of service").unwrap();

    assert!(wallet.have_accepted_terms().unwrap());
    assert!(wallet.are_terms_accepted("terms of service").unwrap());
    assert!(!wallet.are_terms_accepted("other terms").unwrap());
}

#[test]
fn test_second_open_fails_while_wallet_is_live() {
    let dir = TempDir::new().unwrap();
    let base = wallet_base(&dir);
    let wallet = Wallet::open(&base).unwrap();

    let err = Wallet::open(&base).unwrap_err();
    assert!(err.to_string().contains("in use"), "{err:#}");

    // Releasing the first wallet releases the lock.
    drop(wallet);
    Wallet::open(&base).unwrap();
}

#[test]
fn test_unused_category_for_unchained_secret_outputs() {
    let dir = TempDir::new().unwrap();
    let wallet = Wallet::open(&wallet_base(&dir)).unwrap();

    let webcash = SecretWebcash {
        sk: "cd".repeat(32),
        amount: Amount(10),
    };
    let secret_id = wallet.add_secret(5000, &webcash, false, true).unwrap();
    let public = webcash_wallet::PublicWebcash::from_secret(&webcash);
    wallet.add_output(5000, &public, Some(secret_id), false).unwrap();

    let outputs = wallet.outputs(None).unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].category, webcash_wallet::Category::Unused);
    assert_eq!(outputs[0].amount, Amount(10));
    assert!(!outputs[0].spent);

    let balances = wallet.balances().unwrap();
    assert_eq!(balances[&webcash_wallet::Category::Unused], Amount(10));
    assert_eq!(wallet.unspent_total().unwrap(), Amount(10));
}
