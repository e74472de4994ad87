//! Escrow transactions in the ledger's JSON shape.

use serde::{Deserialize, Serialize};

use crate::{Amount, Condition, Fulfillment, LedgerTime};

/// A transaction ready to be signed and submitted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "TransactionType")]
pub enum Transaction {
    EscrowCreate(EscrowCreate),
    EscrowFinish(EscrowFinish),
    EscrowCancel(EscrowCancel),
}

impl Transaction {
    /// The account that sends (and signs) the transaction.
    pub fn account(&self) -> &str {
        match self {
            Self::EscrowCreate(tx) => &tx.account,
            Self::EscrowFinish(tx) => &tx.account,
            Self::EscrowCancel(tx) => &tx.account,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::EscrowCreate(_) => "EscrowCreate",
            Self::EscrowFinish(_) => "EscrowFinish",
            Self::EscrowCancel(_) => "EscrowCancel",
        }
    }
}

/// Locks `amount` until the time and/or crypto-condition gates are met.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct EscrowCreate {
    pub account: String,
    pub destination: String,
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_after: Option<LedgerTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_after: Option<LedgerTime>,
    /// Only the condition is published; never the fulfillment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_tag: Option<u32>,
}

/// Releases the escrow identified by `(owner, offer_sequence)` to its destination.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct EscrowFinish {
    pub account: String,
    pub owner: String,
    pub offer_sequence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfillment: Option<Fulfillment>,
}

/// Returns the escrow identified by `(owner, offer_sequence)` to its owner.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct EscrowCancel {
    pub account: String,
    pub owner: String,
    pub offer_sequence: u32,
}
