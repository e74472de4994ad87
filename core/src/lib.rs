//! Core library for crypto-condition escrows on the XRP Ledger.

/// PREIMAGE-SHA-256 conditions, fulfillments
/// and their binary encoding
pub mod condition;
/// Escrow record and its terminal transitions
pub mod escrow;
/// XRP drops, issued tokens and MPT amounts
pub mod amount;
/// JSON (de)serialization of configs, params and metadata
pub mod interface;
/// Ledger epoch time
pub mod time;
/// Escrow transaction models
pub mod tx;

pub mod error;
pub mod serde;

pub use amount::{drops_to_xrp, xrp_to_drops, Amount};
pub use condition::{generate, Condition, ConditionPair, Fulfillment, Preimage};
pub use error::{AmountError, ConditionError, EscrowError};
pub use escrow::{EscrowRecord, EscrowState};
pub use interface::{EscrowMetadata, EscrowParams, LedgerConfig, Wallet};
pub use time::LedgerTime;
pub use tx::{EscrowCancel, EscrowCreate, EscrowFinish, Transaction};

pub type Result<T> = std::result::Result<T, EscrowError>;
