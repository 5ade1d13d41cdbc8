//! In-memory collaborators for tests.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{LedgerError, LedgerSource, PaymentSubmitter, SubmissionError};
use crate::account::{Account, Amount, BlockHash};
use crate::checkpoint::{CheckpointRecord, CheckpointStore, DecodeError, PersistenceError};

/// Ledger with fixed balances.
#[derive(Default)]
pub struct MockLedger {
    balances: Mutex<HashMap<Account, Amount>>,
    /// Whether balance queries should fail.
    pub should_fail: AtomicBool,
    queries: AtomicUsize,
}

impl MockLedger {
    pub fn with_balance(account: Account, balance: Amount) -> Self {
        let ledger = Self::default();
        ledger.set_balance(account, balance);
        ledger
    }

    pub fn set_balance(&self, account: Account, balance: Amount) {
        self.balances.lock().insert(account, balance);
    }

    /// Number of balance queries answered so far, failed ones included.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl LedgerSource for MockLedger {
    fn balance(
        &self,
        account: Account,
    ) -> Pin<Box<dyn Future<Output = Result<Amount, LedgerError>> + Send + '_>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.should_fail.load(Ordering::SeqCst) {
            return Box::pin(async { Err(LedgerError::Other("mock failure".to_string())) });
        }
        let balance = self
            .balances
            .lock()
            .get(&account)
            .copied()
            .unwrap_or_default();
        Box::pin(async move { Ok(balance) })
    }
}

/// A payment the mock submitter accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedPayment {
    pub source: Account,
    pub destination: Account,
    pub amount: Amount,
}

/// Submitter that accepts everything unless told otherwise.
#[derive(Default)]
pub struct MockSubmitter {
    /// Outcomes handed out before falling back to acceptance.
    scripted: Mutex<VecDeque<Result<BlockHash, SubmissionError>>>,
    /// Whether submissions should fail.
    pub should_fail: AtomicBool,
    accepted: Mutex<Vec<SubmittedPayment>>,
    attempts: AtomicUsize,
}

impl MockSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for the next submission.
    pub fn push_outcome(&self, outcome: Result<BlockHash, SubmissionError>) {
        self.scripted.lock().push_back(outcome);
    }

    pub fn accepted(&self) -> Vec<SubmittedPayment> {
        self.accepted.lock().clone()
    }

    /// Number of submission attempts, rejected ones included.
    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl PaymentSubmitter for MockSubmitter {
    fn submit_payment(
        &self,
        source: Account,
        destination: Account,
        amount: Amount,
    ) -> Pin<Box<dyn Future<Output = Result<BlockHash, SubmissionError>> + Send + '_>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = if let Some(scripted) = self.scripted.lock().pop_front() {
            scripted
        } else if self.should_fail.load(Ordering::SeqCst) {
            Err(SubmissionError::Other("mock failure".to_string()))
        } else {
            let mut hash = [0u8; 32];
            hash[..8].copy_from_slice(&(attempt as u64 + 1).to_be_bytes());
            Ok(BlockHash::new(hash))
        };
        if outcome.is_ok() {
            self.accepted.lock().push(SubmittedPayment {
                source,
                destination,
                amount,
            });
        }
        Box::pin(async move { outcome })
    }
}

/// Checkpoint kept in memory, encoded with the real codec.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemoryCheckpointStore {
    pub fn with_record(record: &CheckpointRecord) -> Self {
        let store = Self::default();
        *store.bytes.lock() = Some(record.to_bytes().to_vec());
        store
    }

    /// Overwrite the stored bytes directly, bypassing the codec.
    pub fn set_raw(&self, bytes: Vec<u8>) {
        *self.bytes.lock() = Some(bytes);
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self) -> Result<Option<CheckpointRecord>, DecodeError> {
        match self.bytes.lock().as_deref() {
            Some(bytes) => CheckpointRecord::from_bytes(bytes).map(Some),
            None => Ok(None),
        }
    }

    fn persist(&self, record: &CheckpointRecord) -> Result<(), PersistenceError> {
        let mut buf = Vec::with_capacity(CheckpointRecord::ENCODED_LEN);
        record
            .serialize(&mut buf)
            .map_err(|source| PersistenceError::Write {
                path: "<memory>".into(),
                source,
            })?;
        *self.bytes.lock() = Some(buf);
        Ok(())
    }
}

/// Wraps a store and fails a configurable number of writes.
pub struct FlakyStore<S> {
    inner: S,
    failures_remaining: AtomicU32,
    fail_always: AtomicBool,
    write_attempts: AtomicU32,
}

impl<S: CheckpointStore> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failures_remaining: AtomicU32::new(0),
            fail_always: AtomicBool::new(false),
            write_attempts: AtomicU32::new(0),
        }
    }

    /// Fail the next `n` writes.
    pub fn fail_next(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Fail every write until called again with `false`.
    pub fn set_fail_always(&self, fail: bool) {
        self.fail_always.store(fail, Ordering::SeqCst);
    }

    pub fn write_attempts(&self) -> u32 {
        self.write_attempts.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: CheckpointStore> CheckpointStore for FlakyStore<S> {
    fn load(&self) -> Result<Option<CheckpointRecord>, DecodeError> {
        self.inner.load()
    }

    fn persist(&self, record: &CheckpointRecord) -> Result<(), PersistenceError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        let scripted_failure = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted_failure || self.fail_always.load(Ordering::SeqCst) {
            return Err(PersistenceError::Write {
                path: "<flaky>".into(),
                source: std::io::Error::other("injected write failure"),
            });
        }
        self.inner.persist(record)
    }
}
