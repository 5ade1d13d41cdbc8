//! The distribution checkpoint record and its fixed-width binary codec.
//!
//! ```text
//! Bytes 0-31:   source account (raw public key)
//! Bytes 32-63:  destination account (raw public key)
//! Bytes 64-79:  amount (u128, big-endian)
//! Bytes 80-87:  last distribution time (u64 seconds, big-endian)
//! ```
//!
//! There is no header, version tag or length prefix. Whoever writes the
//! record must fully replace any previous content at the target.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::account::{Account, Amount};

const SOURCE_OFFSET: usize = 0;
const DESTINATION_OFFSET: usize = SOURCE_OFFSET + Account::LEN;
const AMOUNT_OFFSET: usize = DESTINATION_OFFSET + Account::LEN;
const LAST_OFFSET: usize = AMOUNT_OFFSET + Amount::LEN;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("checkpoint truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("checkpoint has {extra} unexpected trailing bytes")]
    TrailingBytes { extra: usize },
    #[error("failed to read checkpoint: {0}")]
    Io(#[from] io::Error),
}

/// Durable progress marker for periodic distribution.
///
/// `last` is the only field that changes during normal operation; it is
/// advanced by the distribution controller after a payout was accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CheckpointRecord {
    /// Reserve account payouts are drawn from.
    pub source: Account,
    /// Recipient of every payout.
    pub destination: Account,
    /// Size of each payout.
    pub amount: Amount,
    /// Seconds since the Unix epoch of the last completed distribution.
    pub last: u64,
}

impl CheckpointRecord {
    /// Size of an encoded record.
    pub const ENCODED_LEN: usize = LAST_OFFSET + 8;

    pub fn new(
        source: impl Into<Account>,
        destination: impl Into<Account>,
        amount: impl Into<Amount>,
        last: u64,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            amount: amount.into(),
            last,
        }
    }

    /// Write the record to `sink` in field order. Flushing and replacing any
    /// previous content is up to the caller.
    pub fn serialize<W: Write>(&self, sink: &mut W) -> io::Result<()> {
        sink.write_all(self.source.as_bytes())?;
        sink.write_all(self.destination.as_bytes())?;
        sink.write_u128::<BigEndian>(self.amount.raw())?;
        sink.write_u64::<BigEndian>(self.last)?;
        Ok(())
    }

    /// Read exactly one record from `source`.
    ///
    /// Bytes after the record are left unread.
    pub fn deserialize<R: Read>(source: &mut R) -> Result<Self, DecodeError> {
        let mut buf = Vec::with_capacity(Self::ENCODED_LEN);
        source
            .take(Self::ENCODED_LEN as u64)
            .read_to_end(&mut buf)?;
        if buf.len() < Self::ENCODED_LEN {
            return Err(DecodeError::Truncated {
                expected: Self::ENCODED_LEN,
                found: buf.len(),
            });
        }
        Ok(Self::decode_fixed(&buf))
    }

    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut buf = [0u8; Self::ENCODED_LEN];
        buf[SOURCE_OFFSET..DESTINATION_OFFSET].copy_from_slice(self.source.as_bytes());
        buf[DESTINATION_OFFSET..AMOUNT_OFFSET].copy_from_slice(self.destination.as_bytes());
        BigEndian::write_u128(&mut buf[AMOUNT_OFFSET..LAST_OFFSET], self.amount.raw());
        BigEndian::write_u64(&mut buf[LAST_OFFSET..], self.last);
        buf
    }

    /// Decode a buffer that must hold exactly one record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        match bytes.len() {
            n if n < Self::ENCODED_LEN => Err(DecodeError::Truncated {
                expected: Self::ENCODED_LEN,
                found: n,
            }),
            n if n > Self::ENCODED_LEN => Err(DecodeError::TrailingBytes {
                extra: n - Self::ENCODED_LEN,
            }),
            _ => Ok(Self::decode_fixed(bytes)),
        }
    }

    // Caller guarantees `bytes.len() >= ENCODED_LEN`.
    fn decode_fixed(bytes: &[u8]) -> Self {
        let mut source = [0u8; 32];
        source.copy_from_slice(&bytes[SOURCE_OFFSET..DESTINATION_OFFSET]);
        let mut destination = [0u8; 32];
        destination.copy_from_slice(&bytes[DESTINATION_OFFSET..AMOUNT_OFFSET]);
        Self {
            source: Account::new(source),
            destination: Account::new(destination),
            amount: Amount::new(BigEndian::read_u128(&bytes[AMOUNT_OFFSET..LAST_OFFSET])),
            last: BigEndian::read_u64(&bytes[LAST_OFFSET..Self::ENCODED_LEN]),
        }
    }
}
