//! Ledger primitives: account identifiers, currency quantities and block hashes.
//!
//! Accounts are 256-bit public keys. Their text form is the `xrb_` address:
//!
//! ```text
//! "xrb_" + 60 chars, 5 bits each (alphabet below), most significant first:
//!   4 zero bits | 256-bit public key | 40-bit Blake2b-5 checksum (bytes reversed)
//! ```

use std::fmt;
use std::str::FromStr;

use blake2::digest::consts::U5;
use blake2::{Blake2b, Digest};

/// Address prefix.
pub const ACCOUNT_PREFIX: &str = "xrb_";

/// 32-character alphabet used by account addresses (no `0`, `2`, `l`, `v`).
const ACCOUNT_ALPHABET: &[u8; 32] = b"13456789abcdefghijkmnopqrstuwxyz";

/// Number of 5-bit characters following the prefix.
const ENCODED_CHARS: usize = 60;

/// Checksum width in bytes.
const CHECKSUM_LEN: usize = 5;

type Blake2b40 = Blake2b<U5>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccountParseError {
    #[error("account must be `xrb_` address or 64 hex chars, got {0} chars")]
    InvalidLength(usize),
    #[error("invalid character {0:?} in account address")]
    InvalidCharacter(char),
    #[error("account address has non-zero padding bits")]
    InvalidPadding,
    #[error("account address checksum mismatch")]
    ChecksumMismatch,
    #[error("invalid hex account: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// A 256-bit ledger account identifier.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Account([u8; 32]);

impl Account {
    pub const LEN: usize = 32;

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    fn checksum(&self) -> [u8; CHECKSUM_LEN] {
        let digest = Blake2b40::digest(self.0);
        let mut check = [0u8; CHECKSUM_LEN];
        // The checksum is read as a little-endian 40-bit number, so its
        // big-endian byte form is the digest reversed.
        for (dst, src) in check.iter_mut().zip(digest.iter().rev()) {
            *dst = *src;
        }
        check
    }

    /// Encode as an `xrb_` address.
    pub fn encode_account(&self) -> String {
        let mut payload = [0u8; Self::LEN + CHECKSUM_LEN];
        payload[..Self::LEN].copy_from_slice(&self.0);
        payload[Self::LEN..].copy_from_slice(&self.checksum());

        let mut out = String::with_capacity(ACCOUNT_PREFIX.len() + ENCODED_CHARS);
        out.push_str(ACCOUNT_PREFIX);

        // 4 leading zero bits make 300 bits, an exact multiple of 5.
        let mut acc: u16 = 0;
        let mut bits: u8 = 4;
        for byte in payload {
            acc = (acc << 8) | u16::from(byte);
            bits += 8;
            while bits >= 5 {
                let index = (acc >> (bits - 5)) & 0x1f;
                out.push(ACCOUNT_ALPHABET[index as usize] as char);
                bits -= 5;
                acc &= (1 << bits) - 1;
            }
        }
        out
    }

    /// Decode an `xrb_` address, validating padding and checksum.
    pub fn decode_account(text: &str) -> Result<Self, AccountParseError> {
        let body = text
            .strip_prefix(ACCOUNT_PREFIX)
            .ok_or(AccountParseError::InvalidLength(text.len()))?;
        if body.len() != ENCODED_CHARS {
            return Err(AccountParseError::InvalidLength(text.len()));
        }

        let mut payload = [0u8; Self::LEN + CHECKSUM_LEN];
        let mut written = 0usize;
        let mut acc: u16 = 0;
        let mut bits: u8 = 0;
        for (position, c) in body.chars().enumerate() {
            let value = decode_char(c)?;
            if position == 0 {
                // Only the lowest bit of the first character carries data.
                if value > 1 {
                    return Err(AccountParseError::InvalidPadding);
                }
                acc = u16::from(value);
                bits = 1;
                continue;
            }
            acc = (acc << 5) | u16::from(value);
            bits += 5;
            if bits >= 8 {
                payload[written] = (acc >> (bits - 8)) as u8;
                written += 1;
                bits -= 8;
                acc &= (1 << bits) - 1;
            }
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&payload[..Self::LEN]);
        let account = Self(key);
        if account.checksum()[..] != payload[Self::LEN..] {
            return Err(AccountParseError::ChecksumMismatch);
        }
        Ok(account)
    }
}

fn decode_char(c: char) -> Result<u8, AccountParseError> {
    ACCOUNT_ALPHABET
        .iter()
        .position(|&a| a as char == c)
        .map(|p| p as u8)
        .ok_or(AccountParseError::InvalidCharacter(c))
}

impl From<[u8; 32]> for Account {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Small numeric accounts, big-endian in the low bytes. Mostly useful for tests.
impl From<u64> for Account {
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

impl FromStr for Account {
    type Err = AccountParseError;

    /// Accepts an `xrb_` address or 64 hex characters.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with(ACCOUNT_PREFIX) {
            return Self::decode_account(s);
        }
        if s.len() != 64 {
            return Err(AccountParseError::InvalidLength(s.len()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode_account())
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Account({})", self.encode_account())
    }
}

/// A quantity of the ledger's native unit, in raw (smallest) units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);
    pub const MAX: Amount = Amount(u128::MAX);
    pub const LEN: usize = 16;

    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u128 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl From<u128> for Amount {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}

impl FromStr for Amount {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u128>().map(Self)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash of the block that carried a payment.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BlockHash([u8; 32]);

impl BlockHash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl FromStr for BlockHash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s.trim(), &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({self})")
    }
}
