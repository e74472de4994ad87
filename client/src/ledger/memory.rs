use std::collections::{HashMap, VecDeque};

use serde_json::Map;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use xescrow_core::{
    EscrowCancel, EscrowCreate, EscrowFinish, EscrowRecord, EscrowState, LedgerTime, Transaction,
    Wallet,
};

use super::{Ledger, SubmitOutcome, TES_SUCCESS};
use crate::error::{ClientError, Result};

/// First sequence handed out to a new account.
const FIRST_SEQUENCE: u32 = 1;

/// In-process ledger that applies the escrow rules of the real network:
/// time gates against the wall clock, fulfillment verification and
/// at-most-once finish or cancel.
///
/// Its close time is the wall clock in whole seconds; a gate opens once
/// that is strictly past `FinishAfter` or `CancelAfter`.
///
/// Used by tests and by the CLI's dry-run demo.
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    // Next sequence per account
    sequences: HashMap<String, u32>,
    // Open escrows keyed by (owner, offer sequence)
    escrows: HashMap<(String, u32), EscrowRecord>,
    // Result codes forced onto the next transactions of a kind
    forced: HashMap<&'static str, VecDeque<String>>,
    ledger_index: u32,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the next transaction of `kind` (e.g. `"EscrowFinish"`)
    /// to fail with `result_code` instead of being applied.
    pub async fn fail_next(&self, kind: &'static str, result_code: &str) {
        let mut state = self.state.lock().await;
        state
            .forced
            .entry(kind)
            .or_default()
            .push_back(result_code.to_string());
    }

    /// The open escrow at `(owner, sequence)`, if it still exists.
    pub async fn escrow(&self, owner: &str, sequence: u32) -> Option<EscrowRecord> {
        let state = self.state.lock().await;
        state.escrows.get(&(owner.to_string(), sequence)).cloned()
    }

    pub async fn open_escrows(&self) -> usize {
        self.state.lock().await.escrows.len()
    }
}

#[async_trait::async_trait]
impl Ledger for MemoryLedger {
    #[instrument(skip(self, tx, signer), fields(kind = tx.kind(), account = %signer.address))]
    async fn submit_and_wait(&self, tx: &Transaction, signer: &Wallet) -> Result<SubmitOutcome> {
        if tx.account() != signer.address {
            return Err(ClientError::SignerMismatch {
                signer: signer.address.clone(),
                account: tx.account().to_string(),
            });
        }

        let now = self.ledger_time().await?;
        let mut state = self.state.lock().await;
        let sequence = *state
            .sequences
            .entry(signer.address.clone())
            .or_insert(FIRST_SEQUENCE);

        let forced = state
            .forced
            .get_mut(tx.kind())
            .and_then(VecDeque::pop_front);
        let result_code = match forced {
            Some(code) => code,
            None => state.apply(tx, sequence, now).to_string(),
        };
        debug!(%result_code, sequence, "Applied");

        // Malformed or locally failed transactions never reach a ledger.
        if super::is_final_rejection(&result_code) {
            return Ok(SubmitOutcome {
                hash: tx_hash(tx, sequence),
                result_code,
                sequence: Some(sequence),
                validated: false,
                ledger_index: None,
                fields: Map::new(),
            });
        }

        state.sequences.insert(signer.address.clone(), sequence + 1);
        state.ledger_index += 1;
        Ok(SubmitOutcome {
            hash: tx_hash(tx, sequence),
            result_code,
            sequence: Some(sequence),
            validated: true,
            ledger_index: Some(state.ledger_index),
            fields: Map::new(),
        })
    }

    async fn ledger_time(&self) -> Result<LedgerTime> {
        Ok(LedgerTime::now()?)
    }
}

impl LedgerState {
    fn apply(&mut self, tx: &Transaction, sequence: u32, now: LedgerTime) -> &'static str {
        match tx {
            Transaction::EscrowCreate(tx) => self.create(tx, sequence, now),
            Transaction::EscrowFinish(tx) => self.finish(tx, now),
            Transaction::EscrowCancel(tx) => self.cancel(tx, now),
        }
    }

    fn create(&mut self, tx: &EscrowCreate, sequence: u32, now: LedgerTime) -> &'static str {
        if tx.amount.validate().is_err() {
            return "temBAD_AMOUNT";
        }
        if tx.finish_after.is_none() && tx.cancel_after.is_none() {
            return "temBAD_EXPIRATION";
        }
        if let (Some(finish), Some(cancel)) = (tx.finish_after, tx.cancel_after) {
            if cancel <= finish {
                return "temBAD_EXPIRATION";
            }
        }
        if tx.finish_after.is_some_and(|t| now > t) || tx.cancel_after.is_some_and(|t| now > t) {
            return "tecNO_PERMISSION";
        }

        self.escrows.insert(
            (tx.account.clone(), sequence),
            EscrowRecord {
                owner: tx.account.clone(),
                destination: tx.destination.clone(),
                amount: tx.amount.clone(),
                offer_sequence: sequence,
                condition: tx.condition,
                finish_after: tx.finish_after,
                cancel_after: tx.cancel_after,
                state: EscrowState::Created,
            },
        );
        TES_SUCCESS
    }

    fn finish(&mut self, tx: &EscrowFinish, now: LedgerTime) -> &'static str {
        if tx.condition.is_some() != tx.fulfillment.is_some() {
            return "temMALFORMED";
        }
        let key = (tx.owner.clone(), tx.offer_sequence);
        let Some(escrow) = self.escrows.get(&key) else {
            return "tecNO_TARGET";
        };
        if escrow.ensure_finishable(now).is_err() {
            return "tecNO_PERMISSION";
        }
        if escrow.cancel_after.is_some_and(|t| now > t) {
            return "tecNO_PERMISSION";
        }
        match (&escrow.condition, &tx.condition, &tx.fulfillment) {
            (None, None, None) => {}
            (Some(expected), Some(supplied), Some(fulfillment)) => {
                if expected != supplied || fulfillment.verify(expected).is_err() {
                    return "tecCRYPTOCONDITION_ERROR";
                }
            }
            _ => return "tecCRYPTOCONDITION_ERROR",
        }

        self.escrows.remove(&key);
        TES_SUCCESS
    }

    fn cancel(&mut self, tx: &EscrowCancel, now: LedgerTime) -> &'static str {
        let key = (tx.owner.clone(), tx.offer_sequence);
        let Some(escrow) = self.escrows.get(&key) else {
            return "tecNO_TARGET";
        };
        match escrow.cancel_after {
            Some(t) if now > t => {
                self.escrows.remove(&key);
                TES_SUCCESS
            }
            _ => "tecNO_PERMISSION",
        }
    }
}

fn tx_hash(tx: &Transaction, sequence: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(tx).unwrap_or_default());
    hasher.update(sequence.to_be_bytes());
    hex::encode_upper(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use xescrow_core::{generate, Amount};

    use super::*;

    fn alice() -> Wallet {
        Wallet::new("rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe", "snoPBrXtMeMyMHUVTgbuqAfg1SUTb")
    }

    fn create_tx(finish_after: u32, cancel_after: Option<u32>) -> Transaction {
        let now = LedgerTime::now().unwrap();
        Transaction::EscrowCreate(EscrowCreate {
            account: alice().address,
            destination: "rGWrZyQqhTp9Xu7G5Pkayo7bXjH4k4QYpf".into(),
            amount: Amount::Drops(1_000_000),
            finish_after: now.checked_add(finish_after),
            cancel_after: cancel_after.and_then(|secs| now.checked_add(secs)),
            condition: Some(generate().unwrap().condition),
            destination_tag: None,
        })
    }

    #[tokio::test]
    async fn sequences_advance() {
        let ledger = MemoryLedger::new();
        let first = ledger
            .submit_and_wait(&create_tx(60, None), &alice())
            .await
            .unwrap();
        let second = ledger
            .submit_and_wait(&create_tx(60, None), &alice())
            .await
            .unwrap();
        assert!(first.is_success() && first.validated);
        assert_eq!(first.sequence, Some(FIRST_SEQUENCE));
        assert_eq!(second.sequence, Some(FIRST_SEQUENCE + 1));
        assert_ne!(first.hash, second.hash);
        assert_eq!(ledger.open_escrows().await, 2);
    }

    #[tokio::test]
    async fn rejects_bad_gates() {
        let ledger = MemoryLedger::new();
        let outcome = ledger
            .submit_and_wait(&create_tx(60, Some(30)), &alice())
            .await
            .unwrap();
        assert_eq!(outcome.result_code, "temBAD_EXPIRATION");
        assert!(!outcome.validated);

        // temBAD_* does not consume the sequence
        let outcome = ledger
            .submit_and_wait(&create_tx(60, None), &alice())
            .await
            .unwrap();
        assert_eq!(outcome.sequence, Some(FIRST_SEQUENCE));
    }

    #[tokio::test]
    async fn forced_result() {
        let ledger = MemoryLedger::new();
        ledger.fail_next("EscrowCreate", "tecUNFUNDED").await;
        let outcome = ledger
            .submit_and_wait(&create_tx(60, None), &alice())
            .await
            .unwrap();
        assert_eq!(outcome.result_code, "tecUNFUNDED");
        assert_eq!(ledger.open_escrows().await, 0);
    }

    #[tokio::test]
    async fn cancel_before_cancel_after() {
        let ledger = MemoryLedger::new();
        let created = ledger
            .submit_and_wait(&create_tx(60, Some(120)), &alice())
            .await
            .unwrap();
        let cancel = Transaction::EscrowCancel(EscrowCancel {
            account: alice().address,
            owner: alice().address,
            offer_sequence: created.sequence.unwrap(),
        });
        let outcome = ledger.submit_and_wait(&cancel, &alice()).await.unwrap();
        assert_eq!(outcome.result_code, "tecNO_PERMISSION");
        assert!(ledger
            .escrow(&alice().address, created.sequence.unwrap())
            .await
            .is_some());
    }

    fn bob() -> Wallet {
        Wallet::new("rGWrZyQqhTp9Xu7G5Pkayo7bXjH4k4QYpf", "sEd7rBGm5kxzauRTAV2hbsNz7N45X91")
    }

    // Sleeps until the ledger clock reads exactly `at`.
    async fn sleep_until(at: LedgerTime) {
        let wait = at
            .to_system_time()
            .duration_since(SystemTime::now())
            .unwrap_or_default();
        tokio::time::sleep(wait).await;
    }

    #[tokio::test]
    async fn finish_at_finish_after_is_too_early() {
        let ledger = MemoryLedger::new();
        let pair = generate().unwrap();
        let finish_after = ledger.ledger_time().await.unwrap().checked_add(1).unwrap();
        let create = Transaction::EscrowCreate(EscrowCreate {
            account: alice().address,
            destination: bob().address,
            amount: Amount::Drops(1_000_000),
            finish_after: Some(finish_after),
            cancel_after: None,
            condition: Some(pair.condition),
            destination_tag: None,
        });
        let created = ledger.submit_and_wait(&create, &alice()).await.unwrap();
        assert!(created.is_success());

        let finish = Transaction::EscrowFinish(EscrowFinish {
            account: bob().address,
            owner: alice().address,
            offer_sequence: created.sequence.unwrap(),
            condition: Some(pair.condition),
            fulfillment: Some(pair.fulfillment.clone()),
        });
        sleep_until(finish_after).await;
        assert_eq!(ledger.ledger_time().await.unwrap(), finish_after);
        let outcome = ledger.submit_and_wait(&finish, &bob()).await.unwrap();
        assert_eq!(outcome.result_code, "tecNO_PERMISSION");

        tokio::time::sleep(finish_after.until_past(SystemTime::now())).await;
        let outcome = ledger.submit_and_wait(&finish, &bob()).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(ledger.open_escrows().await, 0);
    }

    #[tokio::test]
    async fn cancel_at_cancel_after_is_too_early() {
        let ledger = MemoryLedger::new();
        let cancel_after = ledger.ledger_time().await.unwrap().checked_add(1).unwrap();
        let create = Transaction::EscrowCreate(EscrowCreate {
            account: alice().address,
            destination: bob().address,
            amount: Amount::Drops(1_000_000),
            finish_after: None,
            cancel_after: Some(cancel_after),
            condition: Some(generate().unwrap().condition),
            destination_tag: None,
        });
        let created = ledger.submit_and_wait(&create, &alice()).await.unwrap();
        let cancel = Transaction::EscrowCancel(EscrowCancel {
            account: alice().address,
            owner: alice().address,
            offer_sequence: created.sequence.unwrap(),
        });

        sleep_until(cancel_after).await;
        let outcome = ledger.submit_and_wait(&cancel, &alice()).await.unwrap();
        assert_eq!(outcome.result_code, "tecNO_PERMISSION");

        tokio::time::sleep(cancel_after.until_past(SystemTime::now())).await;
        let outcome = ledger.submit_and_wait(&cancel, &alice()).await.unwrap();
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn close_time_follows_the_clock() {
        let ledger = MemoryLedger::new();
        let before = LedgerTime::now().unwrap();
        let close_time = ledger.ledger_time().await.unwrap();
        assert!(close_time >= before);
        assert!(close_time <= LedgerTime::now().unwrap());
    }

    #[tokio::test]
    async fn signer_must_match() {
        let ledger = MemoryLedger::new();
        let bob = Wallet::new("rGWrZyQqhTp9Xu7G5Pkayo7bXjH4k4QYpf", "sEdT");
        assert!(matches!(
            ledger.submit_and_wait(&create_tx(60, None), &bob).await,
            Err(ClientError::SignerMismatch { .. })
        ));
    }
}
