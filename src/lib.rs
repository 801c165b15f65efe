//! Webcash wallet core: HD key derivation, durable secret/output ledger, and
//! the mint replace protocol.
//!
//! A [`Wallet`] owns two sibling files derived from its base path: `<base>.db`
//! (relational database, exclusively file-locked while open) and `<base>.bak`
//! (append-only plaintext recovery log). Every secret the wallet derives or
//! accepts is flushed to the recovery log before the database learns about
//! it, so the log alone can reconstruct the wallet after a disaster.
//!
//! ```ignore
//! let wallet = webcash_wallet::Wallet::open(Path::new("my-wallet"))?;
//! let mint = webcash_wallet::replace::MintClient::new("https://webcash.org")?;
//! let received: SecretWebcash = "e1:secret:...".parse()?;
//! let swept = wallet.insert(&mint, &received, false)?;
//! ```

pub mod hd;
pub mod recovery;
pub mod replace;
pub mod store;
pub mod types;
pub mod utils;
pub mod wallet;

/// Re-export types for API
pub use types::*;
pub use wallet::{Wallet, WalletOptions};

/// Result alias used by the public wallet API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;
