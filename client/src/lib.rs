//! Client side of xescrow: the ledger collaborator and the escrow lifecycle
//! driven through it.

pub use error::{ClientError, Result};
pub use lifecycle::{CreatedEscrow, EscrowCreateRequest, EscrowLifecycle, FlowReport};
pub use xescrow_core::interface;

pub mod commands;
pub mod error;
pub mod faucet;
pub mod gate;
pub mod ledger;
pub mod lifecycle;
