use thiserror::Error;

use crate::time::LedgerTime;

/// Escrow-related errors.
#[derive(Debug, Error, PartialEq)]
pub enum EscrowError {
    /// The OS random source failed; no condition can be generated.
    #[error("random source exhausted: {0}")]
    RandomSourceExhausted(String),

    /// The ledger rejected a create, finish or cancel transaction.
    #[error("ledger rejected transaction: {result_code}")]
    Submission { result_code: String },

    /// Finish attempted before the escrow's `FinishAfter` time.
    #[error("time gate not elapsed: now {now}, not before {not_before}")]
    GateNotElapsed {
        now: LedgerTime,
        not_before: LedgerTime,
    },

    /// Attempted an invalid state transition.
    #[error("invalid state transition")]
    InvalidState,

    #[error("condition error: {0}")]
    Condition(ConditionError),

    #[error("amount error: {0}")]
    Amount(AmountError),

    #[error("invalid escrow params: {0}")]
    InvalidParams(String),

    /// Time before the ledger epoch or beyond its 32-bit range.
    #[error("time out of range for the ledger epoch")]
    TimeOutOfRange,
}

/// Errors that might occur while decoding or verifying
/// a condition or fulfillment.
#[derive(Debug, Error, PartialEq)]
pub enum ConditionError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid {kind} length: expected {expected} bytes, found {found}")]
    Length {
        kind: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("unexpected {0} encoding")]
    Encoding(&'static str),

    #[error("SHA256(preimage) != condition fingerprint")]
    PreimageMismatch,
}

/// Errors when parsing or working with `Amount`.
#[derive(Debug, Error, PartialEq)]
pub enum AmountError {
    #[error("amount must be non-zero")]
    Zero,

    #[error("invalid XRP amount: {0}")]
    InvalidXrp(String),

    #[error("XRP amounts have at most 6 decimal places: {0}")]
    TooPrecise(String),

    #[error("amount exceeds the XRP supply: {0}")]
    Overflow(String),

    #[error("invalid token value: {0}")]
    InvalidValue(String),
}

impl From<ConditionError> for EscrowError {
    fn from(value: ConditionError) -> Self {
        Self::Condition(value)
    }
}

impl From<AmountError> for EscrowError {
    fn from(value: AmountError) -> Self {
        Self::Amount(value)
    }
}
