//! The per-tick distribution state machine.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};

use super::DistributionContext;
use crate::account::{Amount, BlockHash};
use crate::checkpoint::{CheckpointRecord, PersistenceError};
use crate::config::DistributionConfig;

/// What the controller is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Waiting for the next tick.
    Idle,
    /// Checking elapsed time and balance.
    Evaluating,
    /// Payment in flight.
    Submitting,
    /// Writing the advanced checkpoint.
    Persisting,
}

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The configured amount is zero.
    Disabled,
    /// Less than one interval has passed since the last payout.
    NotDue { remaining: Duration },
    /// The balance query failed; retried next tick.
    BalanceUnavailable,
    /// The reserve cannot cover a payout yet.
    InsufficientBalance { balance: Amount },
    /// The payment was not accepted; the checkpoint is unchanged.
    SubmissionFailed,
    /// Payment accepted and checkpoint durable.
    Distributed {
        block: BlockHash,
        last: u64,
        write_attempts: u32,
    },
    /// Payment accepted but shutdown arrived before the checkpoint became
    /// durable. The in-memory checkpoint has advanced, the stored one has not.
    PersistenceAbandoned { last: u64 },
}

/// Consistent snapshot for status queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionStatus {
    pub checkpoint: CheckpointRecord,
    pub state: ControllerState,
    /// Set while checkpoint writes keep failing.
    pub persistence_degraded: bool,
}

struct Shared {
    checkpoint: CheckpointRecord,
    state: ControllerState,
    persistence_degraded: bool,
}

/// Drives periodic payouts from `source` to `destination`.
pub struct DistributionController {
    ctx: DistributionContext,
    config: DistributionConfig,
    shared: RwLock<Shared>,
    /// Held for a whole tick so ticks never overlap.
    tick_lock: Mutex<()>,
    shutdown: watch::Receiver<bool>,
}

impl DistributionController {
    /// `checkpoint` is the record loaded (or created) at startup. Sending
    /// `true` on the `shutdown` channel stops [`run`](Self::run).
    pub fn new(
        ctx: DistributionContext,
        config: DistributionConfig,
        checkpoint: CheckpointRecord,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            ctx,
            config,
            shared: RwLock::new(Shared {
                checkpoint,
                state: ControllerState::Idle,
                persistence_degraded: false,
            }),
            tick_lock: Mutex::new(()),
            shutdown,
        }
    }

    pub fn checkpoint(&self) -> CheckpointRecord {
        self.shared.read().checkpoint
    }

    pub fn state(&self) -> ControllerState {
        self.shared.read().state
    }

    pub fn status(&self) -> DistributionStatus {
        let shared = self.shared.read();
        DistributionStatus {
            checkpoint: shared.checkpoint,
            state: shared.state,
            persistence_degraded: shared.persistence_degraded,
        }
    }

    fn set_state(&self, state: ControllerState) {
        self.shared.write().state = state;
    }

    /// Tick until shutdown is signalled. A tick in progress when shutdown
    /// arrives runs to completion first.
    pub async fn run(self: Arc<Self>) {
        let mut shutdown = self.shutdown.clone();
        let checkpoint = self.checkpoint();
        tracing::info!(
            source = %checkpoint.source,
            destination = %checkpoint.destination,
            amount = %checkpoint.amount,
            last = checkpoint.last,
            interval_secs = self.config.interval_secs,
            tick_interval_secs = self.config.tick_interval_secs,
            "Distribution controller started"
        );

        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {
                    // Both branches may be ready at once.
                    if *shutdown.borrow() {
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let outcome = self.tick().await;
            tracing::debug!(?outcome, "Waiting for next distribution cycle");
        }

        tracing::info!(last = self.checkpoint().last, "Distribution controller stopped");
    }

    /// Run one evaluation cycle.
    pub async fn tick(&self) -> TickOutcome {
        let _guard = self.tick_lock.lock().await;
        let outcome = self.evaluate().await;
        self.set_state(ControllerState::Idle);
        outcome
    }

    async fn evaluate(&self) -> TickOutcome {
        let checkpoint = self.checkpoint();
        if checkpoint.amount.is_zero() {
            return TickOutcome::Disabled;
        }

        // A payout whose write was abandoned must be durable before the next
        // decision, or a restart would repeat it.
        if !self.stored_matches(checkpoint).await {
            self.set_state(ControllerState::Persisting);
            tracing::warn!(
                last = checkpoint.last,
                "Stored distribution checkpoint does not match, writing it again"
            );
            if let Err(e) = self.persist_until_durable(checkpoint).await {
                tracing::error!(
                    error = %e,
                    last = checkpoint.last,
                    "Shutting down before distribution checkpoint became durable"
                );
                return TickOutcome::PersistenceAbandoned {
                    last: checkpoint.last,
                };
            }
        }

        self.set_state(ControllerState::Evaluating);
        let now = self.ctx.time_source.now_secs();
        let elapsed = now.saturating_sub(checkpoint.last);
        if elapsed < self.config.interval_secs {
            return TickOutcome::NotDue {
                remaining: Duration::from_secs(self.config.interval_secs - elapsed),
            };
        }

        let balance = match self.ctx.ledger.balance(checkpoint.source).await {
            Ok(balance) => balance,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    source = %checkpoint.source,
                    "Distribution deferred: balance query failed"
                );
                return TickOutcome::BalanceUnavailable;
            }
        };
        if balance < checkpoint.amount {
            tracing::info!(
                source = %checkpoint.source,
                %balance,
                amount = %checkpoint.amount,
                "Distribution deferred: insufficient balance"
            );
            return TickOutcome::InsufficientBalance { balance };
        }

        self.set_state(ControllerState::Submitting);
        let block = match self
            .ctx
            .submitter
            .submit_payment(checkpoint.source, checkpoint.destination, checkpoint.amount)
            .await
        {
            Ok(block) => block,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    destination = %checkpoint.destination,
                    amount = %checkpoint.amount,
                    "Error while sending distribution"
                );
                return TickOutcome::SubmissionFailed;
            }
        };
        tracing::info!(
            amount = %checkpoint.amount,
            %block,
            destination = %checkpoint.destination,
            "Successfully distributed"
        );

        // From here on the payment is final: only the write may be retried.
        let updated = {
            let mut shared = self.shared.write();
            shared.state = ControllerState::Persisting;
            shared.checkpoint.last = shared.checkpoint.last.max(now);
            shared.checkpoint
        };

        match self.persist_until_durable(updated).await {
            Ok(write_attempts) => TickOutcome::Distributed {
                block,
                last: updated.last,
                write_attempts,
            },
            Err(e) => {
                tracing::error!(
                    error = %e,
                    last = updated.last,
                    %block,
                    "Shutting down before distribution checkpoint became durable; \
                     this payout may be repeated after restart"
                );
                TickOutcome::PersistenceAbandoned { last: updated.last }
            }
        }
    }

    /// Write `record` until it is durable, backing off between attempts.
    /// Returns the number of attempts used. Gives up only after a failed
    /// attempt made once shutdown was signalled.
    async fn persist_until_durable(&self, record: CheckpointRecord) -> Result<u32, PersistenceError> {
        let mut shutdown = self.shutdown.clone();
        let mut stopping = *shutdown.borrow();
        let mut shutdown_open = true;
        let mut attempt = 0u32;
        let mut backoff_ms = self.config.persist_backoff_base_ms;

        loop {
            attempt += 1;
            match self.write_and_verify(record).await {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::info!(
                            attempts = attempt,
                            last = record.last,
                            "Distribution checkpoint persisted after retries"
                        );
                    }
                    self.shared.write().persistence_degraded = false;
                    return Ok(attempt);
                }
                Err(e) => {
                    if stopping {
                        return Err(e);
                    }
                    if attempt >= self.config.degraded_after_attempts {
                        self.shared.write().persistence_degraded = true;
                        tracing::error!(
                            error = %e,
                            attempts = attempt,
                            next_backoff_ms = backoff_ms,
                            "Distribution checkpoint persistence degraded; retrying write"
                        );
                    } else {
                        tracing::warn!(
                            error = %e,
                            attempts = attempt,
                            next_backoff_ms = backoff_ms,
                            "Failed to write distribution checkpoint; retrying"
                        );
                    }
                }
            }

            let jitter = rand::random_range(0u64..=(backoff_ms / 4));
            let sleep = tokio::time::sleep(Duration::from_millis(backoff_ms + jitter));
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut sleep => break,
                    changed = shutdown.changed(), if shutdown_open => match changed {
                        // One last attempt, then give up.
                        Ok(()) if *shutdown.borrow() => {
                            stopping = true;
                            break;
                        }
                        Ok(()) => {}
                        // Nobody can signal shutdown any more.
                        Err(_) => shutdown_open = false,
                    },
                }
            }
            backoff_ms = backoff_ms
                .saturating_mul(2)
                .min(self.config.persist_backoff_max_ms.max(self.config.persist_backoff_base_ms));
        }
    }

    /// Whether the store holds exactly `record`. Read errors count as a
    /// mismatch.
    async fn stored_matches(&self, record: CheckpointRecord) -> bool {
        let store = self.ctx.store.clone();
        match tokio::task::spawn_blocking(move || store.load()).await {
            Ok(Ok(Some(stored))) => stored == record,
            Ok(Ok(None)) => false,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Cannot read distribution checkpoint");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Checkpoint reader task failed");
                false
            }
        }
    }

    /// Persist on the blocking pool, then read the record back and compare.
    async fn write_and_verify(&self, record: CheckpointRecord) -> Result<(), PersistenceError> {
        let store = self.ctx.store.clone();
        tokio::task::spawn_blocking(move || -> Result<(), PersistenceError> {
            store.persist(&record)?;
            match store.load()? {
                Some(stored) if stored == record => Ok(()),
                _ => Err(PersistenceError::Mismatch),
            }
        })
        .await
        .map_err(|e| PersistenceError::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::checkpoint::CheckpointStore;
    use crate::distribution::mock::{FlakyStore, MemoryCheckpointStore, MockLedger, MockSubmitter};
    use crate::distribution::SubmissionError;
    use crate::util::time_source::SharedMockTimeSource;

    const INTERVAL: u64 = 64;
    const START: u64 = 1_000_000;

    struct Harness {
        controller: Arc<DistributionController>,
        ledger: Arc<MockLedger>,
        submitter: Arc<MockSubmitter>,
        store: Arc<FlakyStore<MemoryCheckpointStore>>,
        time: SharedMockTimeSource,
        shutdown: watch::Sender<bool>,
    }

    fn source() -> Account {
        Account::from(10u64)
    }

    fn destination() -> Account {
        Account::from(20u64)
    }

    fn harness(amount: u128, last: u64, balance: u128) -> Harness {
        let record = CheckpointRecord::new(source(), destination(), amount, last);
        let ledger = Arc::new(MockLedger::with_balance(source(), Amount::new(balance)));
        let submitter = Arc::new(MockSubmitter::new());
        let store = Arc::new(FlakyStore::new(MemoryCheckpointStore::with_record(&record)));
        let time = SharedMockTimeSource::starting_at(START);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let config = DistributionConfig {
            interval_secs: INTERVAL,
            tick_interval_secs: 7,
            persist_backoff_base_ms: 100,
            persist_backoff_max_ms: 1_000,
            degraded_after_attempts: 3,
        };
        let ctx = DistributionContext {
            ledger: ledger.clone(),
            submitter: submitter.clone(),
            store: store.clone(),
            time_source: Arc::new(time.clone()),
        };
        let controller = Arc::new(DistributionController::new(ctx, config, record, shutdown_rx));
        Harness {
            controller,
            ledger,
            submitter,
            store,
            time,
            shutdown,
        }
    }

    fn stored(h: &Harness) -> CheckpointRecord {
        h.store.load().unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_not_due_skips_collaborators() {
        let h = harness(5, START - 10, 100);
        let outcome = h.controller.tick().await;
        assert_eq!(
            outcome,
            TickOutcome::NotDue {
                remaining: Duration::from_secs(INTERVAL - 10)
            }
        );
        assert_eq!(h.ledger.query_count(), 0);
        assert_eq!(h.submitter.attempt_count(), 0);
        assert_eq!(h.controller.state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn test_due_distributes_and_persists() {
        let h = harness(5, START - INTERVAL, 100);
        let outcome = h.controller.tick().await;
        let TickOutcome::Distributed {
            last,
            write_attempts,
            ..
        } = outcome
        else {
            panic!("expected distribution, got {outcome:?}");
        };
        assert_eq!(last, START);
        assert_eq!(write_attempts, 1);
        assert_eq!(h.submitter.accepted().len(), 1);
        assert_eq!(h.submitter.accepted()[0].amount, Amount::new(5));
        assert_eq!(h.submitter.accepted()[0].destination, destination());
        assert_eq!(h.controller.checkpoint().last, START);
        assert_eq!(stored(&h), h.controller.checkpoint());
        assert_eq!(h.controller.state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn test_second_tick_in_same_interval_is_not_due() {
        let h = harness(5, 0, 100);
        assert!(matches!(
            h.controller.tick().await,
            TickOutcome::Distributed { .. }
        ));
        h.time.advance_time(Duration::from_secs(INTERVAL - 1));
        assert!(matches!(h.controller.tick().await, TickOutcome::NotDue { .. }));
        h.time.advance_time(Duration::from_secs(1));
        assert!(matches!(
            h.controller.tick().await,
            TickOutcome::Distributed { .. }
        ));
        assert_eq!(h.submitter.accepted().len(), 2);
        assert_eq!(stored(&h).last, START + INTERVAL);
    }

    #[tokio::test]
    async fn test_zero_amount_is_disabled() {
        let h = harness(0, 0, 100);
        assert_eq!(h.controller.tick().await, TickOutcome::Disabled);
        assert_eq!(h.ledger.query_count(), 0);
        assert_eq!(h.submitter.attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_balance_defers() {
        let h = harness(500, 0, 499);
        assert_eq!(
            h.controller.tick().await,
            TickOutcome::InsufficientBalance {
                balance: Amount::new(499)
            }
        );
        assert_eq!(h.submitter.attempt_count(), 0);
        assert_eq!(h.controller.checkpoint().last, 0);

        h.ledger.set_balance(source(), Amount::new(500));
        assert!(matches!(
            h.controller.tick().await,
            TickOutcome::Distributed { .. }
        ));
    }

    #[tokio::test]
    async fn test_balance_failure_defers() {
        let h = harness(5, 0, 100);
        h.ledger
            .should_fail
            .store(true, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(h.controller.tick().await, TickOutcome::BalanceUnavailable);
        assert_eq!(h.submitter.attempt_count(), 0);
        assert_eq!(h.controller.checkpoint().last, 0);
    }

    #[tokio::test]
    async fn test_submission_failure_keeps_checkpoint() {
        let h = harness(5, 0, 100);
        h.submitter
            .push_outcome(Err(SubmissionError::Rejected("fork".to_string())));
        h.submitter.push_outcome(Err(SubmissionError::Timeout));

        for _ in 0..2 {
            assert_eq!(h.controller.tick().await, TickOutcome::SubmissionFailed);
            assert_eq!(h.controller.checkpoint().last, 0);
            assert_eq!(stored(&h).last, 0);
        }
        assert_eq!(h.store.write_attempts(), 0);

        // Next tick retries from scratch with the same `last`.
        assert!(matches!(
            h.controller.tick().await,
            TickOutcome::Distributed { last: START, .. }
        ));
        assert_eq!(h.submitter.attempt_count(), 3);
        assert_eq!(h.submitter.accepted().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_retries_write_not_payment() {
        let h = harness(5, 0, 100);
        h.store.fail_next(2);
        let outcome = h.controller.tick().await;
        assert!(matches!(
            outcome,
            TickOutcome::Distributed {
                write_attempts: 3,
                last: START,
                ..
            }
        ));
        assert_eq!(h.submitter.attempt_count(), 1);
        assert_eq!(h.store.write_attempts(), 3);
        assert_eq!(stored(&h).last, START);
        assert!(!h.controller.status().persistence_degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_does_not_touch_stored_checkpoint() {
        let h = harness(5, 0, 100);
        h.store.set_fail_always(true);

        let controller = h.controller.clone();
        let tick = tokio::spawn(async move { controller.tick().await });

        // Let several write attempts fail.
        tokio::time::sleep(Duration::from_secs(5)).await;
        let status = h.controller.status();
        assert_eq!(status.state, ControllerState::Persisting);
        assert_eq!(status.checkpoint.last, START, "in-memory checkpoint advanced");
        assert!(status.persistence_degraded);
        assert_eq!(stored(&h).last, 0, "stored checkpoint must not advance");

        h.store.set_fail_always(false);
        let outcome = tick.await.unwrap();
        assert!(matches!(outcome, TickOutcome::Distributed { .. }));
        assert_eq!(stored(&h).last, START);
        assert_eq!(h.submitter.attempt_count(), 1);
        assert!(!h.controller.status().persistence_degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_persistence_after_final_attempt() {
        let h = harness(5, 0, 100);
        h.store.set_fail_always(true);

        let controller = h.controller.clone();
        let tick = tokio::spawn(async move { controller.tick().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let attempts_before = h.store.write_attempts();

        h.shutdown.send(true).unwrap();
        let outcome = tick.await.unwrap();
        assert_eq!(outcome, TickOutcome::PersistenceAbandoned { last: START });
        assert_eq!(h.store.write_attempts(), attempts_before + 1);
        assert_eq!(stored(&h).last, 0);
        assert_eq!(h.submitter.attempt_count(), 1);
    }

    #[tokio::test]
    async fn test_submitter_outage_retries_every_tick() {
        let h = harness(5, 0, 100);
        h.submitter
            .should_fail
            .store(true, std::sync::atomic::Ordering::SeqCst);
        for _ in 0..3 {
            assert_eq!(h.controller.tick().await, TickOutcome::SubmissionFailed);
        }
        assert_eq!(stored(&h).last, 0);

        h.submitter
            .should_fail
            .store(false, std::sync::atomic::Ordering::SeqCst);
        assert!(matches!(
            h.controller.tick().await,
            TickOutcome::Distributed { last: START, .. }
        ));
        assert_eq!(h.submitter.accepted().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_shutdown_sender_keeps_retrying_write() {
        let h = harness(5, 0, 100);
        drop(h.shutdown);
        h.store.fail_next(2);

        let outcome = h.controller.tick().await;
        assert!(
            matches!(
                outcome,
                TickOutcome::Distributed {
                    write_attempts: 3,
                    last: START,
                    ..
                }
            ),
            "got {outcome:?}"
        );
        assert_eq!(h.store.load().unwrap().unwrap().last, START);
        assert_eq!(h.submitter.attempt_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_channel_sending_false_keeps_retrying_write() {
        let h = harness(5, 0, 100);
        h.store.fail_next(2);

        let controller = h.controller.clone();
        let tick = tokio::spawn(async move { controller.tick().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.shutdown.send(false).unwrap();

        let outcome = tick.await.unwrap();
        assert!(matches!(
            outcome,
            TickOutcome::Distributed {
                write_attempts: 3,
                ..
            }
        ));
        assert_eq!(stored(&h).last, START);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_write_is_repaired_on_next_tick() {
        let h = harness(5, 0, 100);
        h.store.set_fail_always(true);

        let controller = h.controller.clone();
        let tick = tokio::spawn(async move { controller.tick().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.shutdown.send(true).unwrap();
        assert_eq!(
            tick.await.unwrap(),
            TickOutcome::PersistenceAbandoned { last: START }
        );
        assert_eq!(stored(&h).last, 0);

        // Storage is back: the next tick writes the advanced record and
        // does not pay again.
        h.store.set_fail_always(false);
        assert!(matches!(
            h.controller.tick().await,
            TickOutcome::NotDue { .. }
        ));
        assert_eq!(stored(&h).last, START);
        assert_eq!(h.submitter.attempt_count(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_stored_checkpoint_is_rewritten_before_evaluating() {
        let h = harness(5, START - 10, 100);
        h.store.inner().set_raw(vec![0xEE; 3]);
        assert!(h.store.load().is_err());

        assert!(matches!(
            h.controller.tick().await,
            TickOutcome::NotDue { .. }
        ));
        assert_eq!(h.store.write_attempts(), 1);
        assert_eq!(stored(&h), h.controller.checkpoint());
        assert_eq!(h.ledger.query_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_racing_a_tick_starts_no_payout() {
        let h = harness(5, 0, 100);
        let handle = tokio::spawn(h.controller.clone().run());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.submitter.accepted().len(), 1);

        // Make the next tick due, then let it fire together with shutdown.
        h.time.advance_time(Duration::from_secs(INTERVAL));
        h.shutdown.send(true).unwrap();
        tokio::time::advance(Duration::from_secs(7)).await;
        handle.await.unwrap();
        assert_eq!(h.submitter.accepted().len(), 1);
    }

    #[tokio::test]
    async fn test_clock_going_backwards_is_not_due() {
        let h = harness(5, START + 100, 100);
        assert!(matches!(
            h.controller.tick().await,
            TickOutcome::NotDue { .. }
        ));
        assert_eq!(h.ledger.query_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_distributes_and_stops() {
        let h = harness(5, 0, 100);
        let controller = h.controller.clone();
        let handle = tokio::spawn(controller.run());

        // First interval tick fires immediately.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.submitter.accepted().len(), 1);

        // Several ticks within one distribution interval: no new payout.
        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(h.submitter.accepted().len(), 1);

        h.time.advance_time(Duration::from_secs(INTERVAL));
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(h.submitter.accepted().len(), 2);

        h.shutdown.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(stored(&h).last, START + INTERVAL);
    }

    #[tokio::test]
    async fn test_ticks_do_not_overlap() {
        let h = harness(5, 0, 1_000);
        let (a, b) = tokio::join!(h.controller.tick(), h.controller.tick());
        let distributed = [&a, &b]
            .iter()
            .filter(|o| matches!(o, TickOutcome::Distributed { .. }))
            .count();
        assert_eq!(distributed, 1, "outcomes: {a:?} {b:?}");
        assert_eq!(h.submitter.accepted().len(), 1);
    }
}
