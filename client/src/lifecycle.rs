//! Two-phase escrow flow: create, wait for the time gate, then finish by
//! revealing the fulfillment; or create, then cancel.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use xescrow_core::{
    generate, Amount, Condition, ConditionPair, EscrowCancel, EscrowCreate, EscrowError,
    EscrowFinish, EscrowRecord, EscrowState, Fulfillment, LedgerTime, Transaction, Wallet,
};

use crate::error::{ClientError, Result};
use crate::gate;
use crate::ledger::{Ledger, SubmitOutcome};

/// Everything an `EscrowCreate` can carry besides the creator.
#[derive(Debug, Clone)]
pub struct EscrowCreateRequest {
    pub destination: String,
    pub amount: Amount,
    pub finish_after: Option<LedgerTime>,
    pub cancel_after: Option<LedgerTime>,
    pub condition: Option<Condition>,
    pub destination_tag: Option<u32>,
}

/// A created escrow together with the `EscrowCreate` outcome.
#[derive(Debug, Clone)]
pub struct CreatedEscrow {
    pub escrow: EscrowRecord,
    pub outcome: SubmitOutcome,
}

/// Result of a full create, wait and finish run.
#[derive(Debug, Clone)]
pub struct FlowReport {
    pub escrow: EscrowRecord,
    pub condition: ConditionPair,
    pub create: SubmitOutcome,
    pub finish: SubmitOutcome,
}

/// Interval between close-time checks once the wall clock has passed a gate.
const CLOSE_TIME_POLL: Duration = Duration::from_secs(1);

/// Drives escrows through the ledger collaborator `L`.
///
/// Keeps a local record per `(owner, sequence)` so a terminal escrow is
/// refused without a network round trip; independent escrows share
/// nothing else. Records stay, terminal ones included, until
/// [`EscrowLifecycle::forget`] drops them.
pub struct EscrowLifecycle<L> {
    ledger: L,
    records: Mutex<HashMap<(String, u32), EscrowRecord>>,
}

impl<L: Ledger> EscrowLifecycle<L> {
    pub fn new(ledger: L) -> Self {
        Self {
            ledger,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Creates an XRP escrow gated by `not_before` and `condition`.
    ///
    /// # Returns
    /// The sequence that identifies the escrow for finish or cancel.
    pub async fn create(
        &self,
        creator: &Wallet,
        destination: &str,
        amount_drops: u64,
        not_before: LedgerTime,
        condition: &Condition,
    ) -> Result<u32> {
        let created = self
            .create_with(
                creator,
                EscrowCreateRequest {
                    destination: destination.to_string(),
                    amount: Amount::Drops(amount_drops),
                    finish_after: Some(not_before),
                    cancel_after: None,
                    condition: Some(*condition),
                    destination_tag: None,
                },
            )
            .await?;
        Ok(created.escrow.offer_sequence)
    }

    /// Submits an `EscrowCreate` carrying the condition, never the fulfillment.
    ///
    /// # Errors
    /// [`EscrowError::Submission`] if the ledger rejects the transaction.
    #[instrument(skip_all, fields(
        creator = %creator.address,
        destination = %request.destination,
        amount = %request.amount,
        finish_after = ?request.finish_after,
        cancel_after = ?request.cancel_after,
    ))]
    pub async fn create_with(
        &self,
        creator: &Wallet,
        request: EscrowCreateRequest,
    ) -> Result<CreatedEscrow> {
        request.amount.validate().map_err(EscrowError::from)?;

        let tx = Transaction::EscrowCreate(EscrowCreate {
            account: creator.address.clone(),
            destination: request.destination.clone(),
            amount: request.amount.clone(),
            finish_after: request.finish_after,
            cancel_after: request.cancel_after,
            condition: request.condition,
            destination_tag: request.destination_tag,
        });
        let outcome = self.submit(&tx, creator).await?;
        let offer_sequence = outcome
            .sequence
            .ok_or_else(|| ClientError::MissingSequence(outcome.hash.clone()))?;

        let escrow = EscrowRecord {
            owner: creator.address.clone(),
            destination: request.destination,
            amount: request.amount,
            offer_sequence,
            condition: request.condition,
            finish_after: request.finish_after,
            cancel_after: request.cancel_after,
            state: EscrowState::Created,
        };
        self.track(escrow.clone()).await;
        info!(offer_sequence, hash = %outcome.hash, "Escrow created");
        Ok(CreatedEscrow { escrow, outcome })
    }

    /// Registers an escrow created elsewhere (e.g. loaded from metadata)
    /// so finish can check its gate locally.
    pub async fn track(&self, escrow: EscrowRecord) {
        let key = (escrow.owner.clone(), escrow.offer_sequence);
        self.records.lock().await.insert(key, escrow);
    }

    /// Stops tracking the escrow at `(owner, sequence)`, returning its last
    /// local view. Later calls for it go straight to the ledger.
    pub async fn forget(&self, owner: &str, sequence: u32) -> Option<EscrowRecord> {
        let mut records = self.records.lock().await;
        records.remove(&(owner.to_string(), sequence))
    }

    /// Local view of the escrow at `(owner, sequence)`.
    pub async fn record(&self, owner: &str, sequence: u32) -> Option<EscrowRecord> {
        let records = self.records.lock().await;
        records.get(&(owner.to_string(), sequence)).cloned()
    }

    /// Blocks until both the wall clock and the ledger's validated close
    /// time are strictly past `not_before`.
    ///
    /// Close time trails the wall clock by a ledger interval or so; a
    /// finish submitted on the wall clock alone can land on a ledger that
    /// still reads `not_before` and fail with `tecNO_PERMISSION`.
    #[instrument(skip(self))]
    pub async fn await_gate(&self, not_before: LedgerTime) -> Result<()> {
        gate::await_gate(not_before).await;
        loop {
            let close_time = self.ledger.ledger_time().await?;
            if close_time > not_before {
                return Ok(());
            }
            debug!(%close_time, "Ledger close time not yet past gate");
            tokio::time::sleep(CLOSE_TIME_POLL).await;
        }
    }

    /// Submits an `EscrowFinish` revealing `fulfillment`.
    ///
    /// The ledger checks the fulfillment against the condition; this only
    /// fails fast when a tracked escrow is terminal or the wall clock is not
    /// yet strictly past its `finish_after`.
    ///
    /// # Errors
    /// [`EscrowError::GateNotElapsed`], [`EscrowError::InvalidState`], or
    /// [`EscrowError::Submission`] if the ledger rejects the transaction.
    #[instrument(skip(self, destination, condition, fulfillment), fields(account = %destination.address))]
    pub async fn complete(
        &self,
        destination: &Wallet,
        condition: &Condition,
        fulfillment: &Fulfillment,
        owner: &str,
        sequence: u32,
    ) -> Result<SubmitOutcome> {
        if let Some(escrow) = self.record(owner, sequence).await {
            escrow.ensure_finishable(LedgerTime::now()?)?;
        }

        let tx = Transaction::EscrowFinish(EscrowFinish {
            account: destination.address.clone(),
            owner: owner.to_string(),
            offer_sequence: sequence,
            condition: Some(*condition),
            fulfillment: Some(fulfillment.clone()),
        });
        let outcome = self.submit(&tx, destination).await?;

        self.settle(owner, sequence, EscrowRecord::complete).await?;
        info!(hash = %outcome.hash, "Escrow finished");
        Ok(outcome)
    }

    /// Submits an `EscrowCancel`, returning the funds to `owner`.
    ///
    /// # Errors
    /// [`EscrowError::InvalidState`] if the tracked escrow is terminal, or
    /// [`EscrowError::Submission`] if the ledger rejects the transaction.
    #[instrument(skip(self, creator), fields(account = %creator.address))]
    pub async fn cancel(&self, creator: &Wallet, owner: &str, sequence: u32) -> Result<SubmitOutcome> {
        if let Some(escrow) = self.record(owner, sequence).await {
            if escrow.state.is_terminal() {
                return Err(EscrowError::InvalidState.into());
            }
        }

        let tx = Transaction::EscrowCancel(EscrowCancel {
            account: creator.address.clone(),
            owner: owner.to_string(),
            offer_sequence: sequence,
        });
        let outcome = self.submit(&tx, creator).await?;

        self.settle(owner, sequence, EscrowRecord::cancel).await?;
        info!(hash = %outcome.hash, "Escrow canceled");
        Ok(outcome)
    }

    /// Generates a condition, creates an escrow finishable after `wait`,
    /// waits for the gate and finishes it.
    #[instrument(skip(self, creator, destination), fields(
        creator = %creator.address,
        destination = %destination.address,
    ))]
    pub async fn run(
        &self,
        creator: &Wallet,
        destination: &Wallet,
        amount_drops: u64,
        wait: Duration,
    ) -> Result<FlowReport> {
        let condition = generate()?;
        info!(condition = %condition.condition, "Generated crypto condition");

        let not_before = LedgerTime::after(wait)?;
        let created = self
            .create_with(
                creator,
                EscrowCreateRequest {
                    destination: destination.address.clone(),
                    amount: Amount::Drops(amount_drops),
                    finish_after: Some(not_before),
                    cancel_after: None,
                    condition: Some(condition.condition),
                    destination_tag: None,
                },
            )
            .await?;

        self.await_gate(not_before).await?;

        let finish = self
            .complete(
                destination,
                &condition.condition,
                &condition.fulfillment,
                &creator.address,
                created.escrow.offer_sequence,
            )
            .await?;

        let escrow = self
            .record(&creator.address, created.escrow.offer_sequence)
            .await
            .unwrap_or(created.escrow);
        Ok(FlowReport {
            escrow,
            condition,
            create: created.outcome,
            finish,
        })
    }

    async fn submit(&self, tx: &Transaction, signer: &Wallet) -> Result<SubmitOutcome> {
        let outcome = self.ledger.submit_and_wait(tx, signer).await?;
        if !outcome.is_success() {
            warn!(kind = tx.kind(), result_code = %outcome.result_code, "Ledger rejected transaction");
            return Err(EscrowError::Submission {
                result_code: outcome.result_code,
            }
            .into());
        }
        Ok(outcome)
    }

    async fn settle<F>(&self, owner: &str, sequence: u32, transition: F) -> Result<()>
    where
        F: FnOnce(&mut EscrowRecord) -> xescrow_core::Result<EscrowState>,
    {
        let mut records = self.records.lock().await;
        if let Some(escrow) = records.get_mut(&(owner.to_string(), sequence)) {
            transition(escrow)?;
        }
        Ok(())
    }
}
