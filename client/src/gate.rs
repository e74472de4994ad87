use std::time::SystemTime;

use tracing::{debug, info, instrument};
use xescrow_core::LedgerTime;

/// Blocks until the wall clock is strictly past `not_before`, the first
/// moment the ledger would accept a transaction gated on it.
///
/// Sleeps straight to the deadline, then re-reads the clock and sleeps
/// again if it drifted, so it never returns early.
#[instrument]
pub async fn await_gate(not_before: LedgerTime) {
    loop {
        let remaining = not_before.until_past(SystemTime::now());
        if remaining.is_zero() {
            break;
        }
        debug!(?remaining, "Waiting for time gate");
        tokio::time::sleep(remaining).await;
    }
    info!("Time gate elapsed");
}

/// Whether the wall clock is strictly past `not_before`.
pub fn gate_elapsed(not_before: LedgerTime) -> bool {
    not_before.is_past(SystemTime::now())
}
