//! Escrow state machine with time gates and an optional crypto condition.

use serde::{Deserialize, Serialize};

use crate::{Amount, Condition, EscrowError, LedgerTime, Result};

/// Lifecycle of an escrow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EscrowState {
    /// Funds are locked; awaiting finish or cancellation.
    Created,
    /// Gates met; funds have been released to the destination.
    Completed,
    /// Funds have been returned to the owner.
    Canceled,
}

impl EscrowState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Created)
    }
}

/// Local view of an escrow held by the ledger,
/// keyed by `(owner, offer_sequence)`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EscrowRecord {
    /// Account that created and funded the escrow.
    pub owner: String,
    /// Recipient of funds.
    pub destination: String,
    /// Amount locked in escrow.
    pub amount: Amount,
    /// Sequence of the `EscrowCreate` transaction.
    pub offer_sequence: u32,
    /// Optional crypto condition.
    pub condition: Option<Condition>,
    /// Earliest time the escrow can be finished.
    pub finish_after: Option<LedgerTime>,
    /// Earliest time the escrow can be canceled.
    pub cancel_after: Option<LedgerTime>,
    /// Current state.
    pub state: EscrowState,
}

impl EscrowRecord {
    /// Checks locally whether finishing at `now` could succeed.
    ///
    /// # Errors
    ///
    /// [`EscrowError::InvalidState`] once the escrow is terminal and
    /// [`EscrowError::GateNotElapsed`] until `now` is strictly past
    /// `finish_after`, the same comparison the ledger applies to its
    /// parent close time.
    pub fn ensure_finishable(&self, now: LedgerTime) -> Result<()> {
        if self.state.is_terminal() {
            return Err(EscrowError::InvalidState);
        }
        match self.finish_after {
            Some(not_before) if now <= not_before => {
                Err(EscrowError::GateNotElapsed { now, not_before })
            }
            _ => Ok(()),
        }
    }

    /// Records that the ledger released the funds.
    pub fn complete(&mut self) -> Result<EscrowState> {
        self.transition(EscrowState::Completed)
    }

    /// Records that the ledger returned the funds to the owner.
    pub fn cancel(&mut self) -> Result<EscrowState> {
        self.transition(EscrowState::Canceled)
    }

    fn transition(&mut self, to: EscrowState) -> Result<EscrowState> {
        if self.state.is_terminal() {
            return Err(EscrowError::InvalidState);
        }
        self.state = to;
        Ok(self.state)
    }
}
