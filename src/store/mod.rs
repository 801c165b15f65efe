//! Database layer: schema, value binding, open/lock, secret/output ledger.

mod ledger;
mod open;
mod sql;
mod terms;

pub use ledger::{
    OutputRecord, StoredInput, balances, insert_output, insert_secret, load_input, lookup_secret_id,
    mark_output_spent, outputs, unspent_total,
};
pub use open::{Store, open_in_memory};
pub use sql::{SqlParams, SqlValue, execute_statements};
pub use terms::{accept_terms, are_terms_accepted, have_accepted_terms};

/// Wallet schema. Idempotent; applied on every open.
///
/// `hdroot` holds the single master seed, `hdchain` one depth counter per
/// derivation stream, `secret`/`hdkey` the derived material and its path
/// binding, `output` the tracked claim hashes, and `terms` the acknowledged
/// legal texts.
pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS hdroot (
    id INTEGER PRIMARY KEY NOT NULL,
    timestamp INTEGER NOT NULL,
    version INTEGER NOT NULL,
    secret BLOB NOT NULL,
    UNIQUE(version, secret)
);

CREATE TABLE IF NOT EXISTS hdchain (
    id INTEGER PRIMARY KEY NOT NULL,
    hdroot_id INTEGER NOT NULL REFERENCES hdroot(id),
    chaincode INTEGER NOT NULL,
    mine INTEGER NOT NULL,
    sweep INTEGER NOT NULL,
    mindepth INTEGER NOT NULL,
    maxdepth INTEGER NOT NULL,
    UNIQUE(hdroot_id, chaincode, mine, sweep)
);

CREATE TABLE IF NOT EXISTS secret (
    id INTEGER PRIMARY KEY NOT NULL,
    timestamp INTEGER NOT NULL,
    secret TEXT UNIQUE NOT NULL,
    mine INTEGER NOT NULL,
    sweep INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS hdkey (
    id INTEGER PRIMARY KEY NOT NULL,
    hdchain_id INTEGER NOT NULL REFERENCES hdchain(id),
    depth INTEGER NOT NULL,
    secret_id INTEGER UNIQUE NOT NULL REFERENCES secret(id),
    UNIQUE(hdchain_id, depth)
);

CREATE TABLE IF NOT EXISTS output (
    id INTEGER PRIMARY KEY NOT NULL,
    timestamp INTEGER NOT NULL,
    hash BLOB NOT NULL,
    secret_id INTEGER REFERENCES secret(id),
    amount INTEGER NOT NULL,
    spent INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS terms (
    id INTEGER PRIMARY KEY NOT NULL,
    body TEXT UNIQUE NOT NULL,
    timestamp INTEGER NOT NULL
);
"#;
