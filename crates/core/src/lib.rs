//! Periodic fund distribution for a ledger node.
//!
//! A reserve account pays a fixed amount to a recipient once per interval.
//! Progress is kept in a small binary checkpoint so restarts neither repeat
//! nor skip payouts.

pub mod account;
pub mod checkpoint;
pub mod config;
pub mod distribution;
#[cfg(feature = "trace")]
pub mod logging;
pub mod rpc;
pub mod util;

pub use account::{Account, Amount, BlockHash};
pub use checkpoint::{CheckpointRecord, CheckpointStore, DecodeError, FileCheckpointStore};
pub use config::LandingConfig;
pub use distribution::{DistributionContext, DistributionController, TickOutcome};
