//! Public value types for the wallet API: amounts, digests, webcash strings.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Rejection from one of the strict text codecs in this module.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed amount string")]
    BadAmount,
    #[error("malformed webcash string")]
    BadWebcash,
}

/// Webcash amount in minor units of 10^-8, totally ordered, signed.
///
/// Rendered as a fixed-precision decimal with up to 8 fractional digits and
/// terminal fractional zeros trimmed (`3000000` → `"0.03"`). Parsing accepts
/// only strings this rendering can produce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(pub i64);

/// Minor units per whole webcash.
const COIN: u64 = 100_000_000;

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Addition that surfaces overflow instead of wrapping or saturating.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Sum of amounts; `None` when any partial sum overflows.
    pub fn checked_sum<I: IntoIterator<Item = Amount>>(amounts: I) -> Option<Amount> {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, Amount::checked_add)
    }

    pub fn is_positive(self) -> bool {
        self.0 >= 1
    }
}

impl FromStr for Amount {
    type Err = ParseError;

    // Accepts a fractional-precision decimal with no more than 8 digits past
    // the decimal point and an optional leading minus sign. A leading zero is
    // only valid immediately before the decimal point or on its own.
    fn from_str(s: &str) -> Result<Amount, ParseError> {
        let bytes = s.as_bytes();
        if bytes.is_empty() {
            return Err(ParseError::BadAmount);
        }

        let mut pos = 0;
        let negative = bytes[0] == b'-';
        if negative {
            pos += 1;
            // A single minus sign is not a valid encoding.
            if pos == bytes.len() {
                return Err(ParseError::BadAmount);
            }
        }

        if !bytes[pos].is_ascii_digit() {
            return Err(ParseError::BadAmount);
        }
        if bytes[pos] == b'0' && pos + 1 != bytes.len() && bytes[pos + 1] != b'.' {
            return Err(ParseError::BadAmount);
        }

        // Whole part, accumulated in 128 bits so overflow is detectable.
        let mut acc: i128 = 0;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            acc = acc * 10 + i128::from(bytes[pos] - b'0');
            if acc > i128::from(i64::MAX) {
                return Err(ParseError::BadAmount);
            }
            pos += 1;
        }

        // Fractional digits are optional but at most 8, and nothing may follow.
        let mut frac_digits = 0;
        if pos < bytes.len() {
            if bytes[pos] != b'.' {
                return Err(ParseError::BadAmount);
            }
            pos += 1;
            if pos == bytes.len() {
                return Err(ParseError::BadAmount);
            }
            while frac_digits < 8 && pos < bytes.len() {
                if !bytes[pos].is_ascii_digit() {
                    return Err(ParseError::BadAmount);
                }
                acc = acc * 10 + i128::from(bytes[pos] - b'0');
                pos += 1;
                frac_digits += 1;
            }
            if pos != bytes.len() {
                return Err(ParseError::BadAmount);
            }
        }
        for _ in frac_digits..8 {
            acc *= 10;
        }
        if acc > i128::from(i64::MAX) {
            return Err(ParseError::BadAmount);
        }

        let value = acc as i64;
        Ok(Amount(if negative { -value } else { value }))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        let whole = magnitude / COIN;
        let frac = magnitude % COIN;
        if frac == 0 {
            write!(f, "{sign}{whole}")
        } else {
            let mut digits = format!("{frac:08}");
            while digits.ends_with('0') {
                digits.pop();
            }
            write!(f, "{sign}{whole}.{digits}")
        }
    }
}

/// 256-bit digest as a fixed 32-byte buffer with byte-level access.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    pub const LEN: usize = 32;

    pub fn from_bytes(bytes: [u8; 32]) -> Hash256 {
        Hash256(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Hash256> {
        let mut buf = [0u8; 32];
        if bytes.len() != buf.len() {
            return None;
        }
        buf.copy_from_slice(bytes);
        Some(Hash256(buf))
    }

    /// Strict inverse of `Display`: exactly 64 lowercase hex characters.
    pub fn from_hex(s: &str) -> Result<Hash256, ParseError> {
        if !is_hex64(s) {
            return Err(ParseError::BadWebcash);
        }
        let mut buf = [0u8; 32];
        hex::decode_to_slice(s, &mut buf).map_err(|_| ParseError::BadWebcash)?;
        Ok(Hash256(buf))
    }

    /// SHA-256 of `data`.
    pub fn digest(data: &[u8]) -> Hash256 {
        Hash256(Sha256::digest(data).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, u8> {
        self.0.iter()
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self)
    }
}

/// True for exactly 64 lowercase hex characters.
pub(crate) fn is_hex64(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Shared shape of `e<amount>:<kind>:<payload>`.
fn split_webcash(s: &str) -> Result<(Amount, &str, &str), ParseError> {
    let rest = s.strip_prefix('e').ok_or(ParseError::BadWebcash)?;
    let mut parts = rest.splitn(3, ':');
    let amount = parts.next().ok_or(ParseError::BadWebcash)?;
    let kind = parts.next().ok_or(ParseError::BadWebcash)?;
    let payload = parts.next().ok_or(ParseError::BadWebcash)?;
    let amount = amount.parse().map_err(|_| ParseError::BadWebcash)?;
    Ok((amount, kind, payload))
}

// The serialized forms never carry a negative amount.
fn clamped(amount: Amount) -> Amount {
    if amount.0 < 0 { Amount::ZERO } else { amount }
}

/// A claim code: the bearer secret plus its face amount.
///
/// Wallet-derived secrets are always 64 lowercase hex characters; the public
/// form is the SHA-256 of those characters as bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretWebcash {
    pub sk: String,
    pub amount: Amount,
}

impl FromStr for SecretWebcash {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<SecretWebcash, ParseError> {
        let (amount, kind, payload) = split_webcash(s)?;
        if kind != "secret" || !is_hex64(payload) {
            return Err(ParseError::BadWebcash);
        }
        Ok(SecretWebcash {
            sk: payload.to_owned(),
            amount,
        })
    }
}

impl fmt::Display for SecretWebcash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}:secret:{}", clamped(self.amount), self.sk)
    }
}

/// The public face of a claim code: hash of the secret plus its amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicWebcash {
    pub hash: Hash256,
    pub amount: Amount,
}

impl PublicWebcash {
    /// Hash the secret characters to produce the public form.
    pub fn from_secret(esk: &SecretWebcash) -> PublicWebcash {
        PublicWebcash {
            hash: Hash256::digest(esk.sk.as_bytes()),
            amount: esk.amount,
        }
    }
}

impl FromStr for PublicWebcash {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<PublicWebcash, ParseError> {
        let (amount, kind, payload) = split_webcash(s)?;
        if kind != "public" {
            return Err(ParseError::BadWebcash);
        }
        Ok(PublicWebcash {
            hash: Hash256::from_hex(payload)?,
            amount,
        })
    }
}

impl fmt::Display for PublicWebcash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}:public:{}", clamped(self.amount), self.hash)
    }
}

/// Spending bucket of a secret, named by the `(mine, sweep)` flag pair.
///
/// The pair also selects the derivation chain: the low 2 bits of the encoded
/// chaincode are `receive=0, payment=1, change=2, mining=3`. `Unused` is a
/// secret not (or not yet) linked into any chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Unused,
    Payment,
    Receive,
    Change,
    Mining,
}

impl Category {
    pub fn from_flags(mine: bool, sweep: bool) -> Category {
        match (mine, sweep) {
            (false, true) => Category::Receive,
            (false, false) => Category::Payment,
            (true, false) => Category::Change,
            (true, true) => Category::Mining,
        }
    }

    /// The `(mine, sweep)` pair, or `None` for `Unused`.
    pub fn flags(self) -> Option<(bool, bool)> {
        match self {
            Category::Unused => None,
            Category::Payment => Some((false, false)),
            Category::Receive => Some((false, true)),
            Category::Change => Some((true, false)),
            Category::Mining => Some((true, true)),
        }
    }

    /// Event name used in the recovery log. The historical misspelling of
    /// `recieve` is part of the on-disk format and must not be corrected.
    pub fn log_name(self) -> &'static str {
        match self {
            Category::Unused => "unused",
            Category::Payment => "pay",
            Category::Receive => "recieve",
            Category::Change => "change",
            Category::Mining => "mining",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.log_name())
    }
}

/// A secret reserved from an HD chain, with the ledger row it landed in.
#[derive(Clone, Debug)]
pub struct WalletSecret {
    /// Row id of the `secret` table entry.
    pub id: i64,
    /// 64 lowercase hex characters.
    pub secret: String,
    pub mine: bool,
    pub sweep: bool,
}

impl WalletSecret {
    /// Attach a face amount, yielding a spendable claim code.
    pub fn to_webcash(&self, amount: Amount) -> SecretWebcash {
        SecretWebcash {
            sk: self.secret.clone(),
            amount,
        }
    }
}
