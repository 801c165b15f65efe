//! Wallet configuration constants.
//! Protocol values and file conventions in one place.

// ---- Key derivation ----

/// Domain-separation preimage for the derivation tag; hashing it yields the
/// 32-byte tag prefixed twice to every derivation. Part of the durable
/// derivation contract.
pub const DERIVATION_DOMAIN: &[u8] = b"webcashwalletv1";

/// The only `hdroot` schema version this wallet reads or writes.
pub const HDROOT_VERSION: i64 = 1;

/// Working length of the root secret (bytes). Shorter stored roots down to
/// [`ROOT_SECRET_MIN_LEN`] are right-padded with zeros on load.
pub const ROOT_SECRET_LEN: usize = 32;
pub const ROOT_SECRET_MIN_LEN: usize = 16;

/// The single chaincode used by this wallet; the upper 62 bits are reserved
/// for future per-purpose streams.
pub const DEFAULT_CHAINCODE: u64 = 0;

// ---- Mint protocol ----

/// Endpoints and limits for talking to the mint.
pub struct MintApi;

impl MintApi {
    /// Replacement endpoint, relative to the configured server base URL.
    pub const REPLACE_PATH: &'static str = "/api/v1/replace";
    /// Read and write timeout for mint round trips (seconds).
    pub const TIMEOUT_SECS: u64 = 60;
    pub const CONTENT_TYPE_JSON: &'static str = "application/json";
}

// ---- Wallet files ----

/// The two sibling files derived from the wallet base path.
pub struct WalletFiles;

impl WalletFiles {
    /// Relational database; exclusively locked while the wallet is open.
    pub const DB_EXTENSION: &'static str = "db";
    /// Append-only plaintext recovery log.
    pub const LOG_EXTENSION: &'static str = "bak";
}
