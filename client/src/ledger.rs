use std::sync::Arc;

use serde_json::{Map, Value};
use xescrow_core::{LedgerTime, Transaction, Wallet};

use crate::Result;

pub mod jsonrpc;
pub mod memory;

pub use jsonrpc::JsonRpcLedger;
pub use memory::MemoryLedger;

/// Result code of a successfully applied transaction.
pub const TES_SUCCESS: &str = "tesSUCCESS";

/// Ledger collaborator the escrow lifecycle submits through.
///
/// Implementors sign `tx` on behalf of `signer`, submit it and block until
/// the ledger reports a final outcome.
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    /// Submit a transaction and wait for its validated result.
    ///
    /// # Returns
    /// The outcome whatever its result code; only transport and
    /// protocol failures are errors.
    async fn submit_and_wait(&self, tx: &Transaction, signer: &Wallet) -> Result<SubmitOutcome>;

    /// Close time of the latest validated ledger, the clock `FinishAfter`
    /// and `CancelAfter` are checked against.
    async fn ledger_time(&self) -> Result<LedgerTime>;
}

#[async_trait::async_trait]
impl<L: Ledger + ?Sized> Ledger for Arc<L> {
    async fn submit_and_wait(&self, tx: &Transaction, signer: &Wallet) -> Result<SubmitOutcome> {
        (**self).submit_and_wait(tx, signer).await
    }

    async fn ledger_time(&self) -> Result<LedgerTime> {
        (**self).ledger_time().await
    }
}

/// Final outcome of a submitted transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    /// Ledger result code, e.g. `tesSUCCESS` or `tecNO_TARGET`.
    pub result_code: String,
    /// Transaction hash.
    pub hash: String,
    /// Account sequence consumed by the transaction.
    pub sequence: Option<u32>,
    /// Whether the outcome comes from a validated ledger.
    pub validated: bool,
    /// Index of the ledger that included the transaction.
    pub ledger_index: Option<u32>,
    /// Remaining response fields.
    pub fields: Map<String, Value>,
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        self.result_code == TES_SUCCESS
    }
}

/// Result-code classes the ledger never applies or retries
/// (malformed, failed locally, failed to forward).
pub(crate) fn is_final_rejection(result_code: &str) -> bool {
    ["tem", "tef", "tel"]
        .iter()
        .any(|prefix| result_code.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_classes() {
        assert!(is_final_rejection("temMALFORMED"));
        assert!(is_final_rejection("tefPAST_SEQ"));
        assert!(is_final_rejection("telINSUF_FEE_P"));
        assert!(!is_final_rejection("tesSUCCESS"));
        assert!(!is_final_rejection("terQUEUED"));
        assert!(!is_final_rejection("tecNO_TARGET"));
    }
}
