//! Periodic distribution of a fixed amount from a reserve account.
//!
//! ## Architecture
//!
//! The [`DistributionController`] owns the in-memory checkpoint and, on every
//! tick, decides whether a payout is due. Everything outside the decision is
//! a collaborator passed in through [`DistributionContext`]:
//!
//! - [`LedgerSource`] answers balance queries,
//! - [`PaymentSubmitter`] constructs and broadcasts the payment,
//! - [`CheckpointStore`] persists progress,
//! - [`TimeSource`] provides the current time.
//!
//! The checkpoint only advances after the submitter confirmed the payment,
//! and a confirmed payment is never resubmitted: failed checkpoint writes
//! are retried on their own.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::account::{Account, Amount, BlockHash};
use crate::checkpoint::CheckpointStore;
use crate::util::time_source::TimeSource;

mod controller;
#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use controller::{ControllerState, DistributionController, DistributionStatus, TickOutcome};

// =============================================================================
// Errors
// =============================================================================

/// Errors from ledger balance queries.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("RPC request failed: {0}")]
    Rpc(#[from] reqwest::Error),
    #[error("failed to parse ledger response: {0}")]
    Parse(String),
    #[error("ledger error: {0}")]
    Node(String),
    #[error("{0}")]
    Other(String),
}

/// Errors from payment submission. None of these mean the payment happened.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("payment rejected: {0}")]
    Rejected(String),
    #[error("RPC request failed: {0}")]
    Rpc(#[from] reqwest::Error),
    #[error("payment submission timed out")]
    Timeout,
    #[error("failed to parse submission response: {0}")]
    Parse(String),
    #[error("{0}")]
    Other(String),
}

// =============================================================================
// Collaborators
// =============================================================================

/// Read access to account state on the ledger.
pub trait LedgerSource: Send + Sync + 'static {
    /// Spendable balance of `account`.
    fn balance(
        &self,
        account: Account,
    ) -> Pin<Box<dyn Future<Output = Result<Amount, LedgerError>> + Send + '_>>;
}

/// Builds, signs and broadcasts payments.
pub trait PaymentSubmitter: Send + Sync + 'static {
    /// Send `amount` from `source` to `destination`, resolving once the
    /// outcome is definitive. `Ok` carries the hash of the payment block.
    fn submit_payment(
        &self,
        source: Account,
        destination: Account,
        amount: Amount,
    ) -> Pin<Box<dyn Future<Output = Result<BlockHash, SubmissionError>> + Send + '_>>;
}

/// Everything the controller needs from the rest of the node.
#[derive(Clone)]
pub struct DistributionContext {
    pub ledger: Arc<dyn LedgerSource>,
    pub submitter: Arc<dyn PaymentSubmitter>,
    pub store: Arc<dyn CheckpointStore>,
    pub time_source: Arc<dyn TimeSource>,
}
