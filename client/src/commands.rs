//! File-backed escrow commands behind `xescrow-cli`: each reads and writes
//! the JSON files under `interface` and drives an [`EscrowLifecycle`].

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;
use xescrow_core::interface::{load_escrow_data, save_escrow_data};
use xescrow_core::{generate, ConditionPair, EscrowMetadata, EscrowParams, EscrowState, Wallet};

use crate::ledger::Ledger;
use crate::{EscrowCreateRequest, EscrowLifecycle};

/// Where an escrow's metadata and its secret condition pair live.
#[derive(Debug, Clone)]
pub struct EscrowFiles {
    /// Public metadata, written on create and updated on finish or cancel.
    pub metadata: PathBuf,
    /// Condition and fulfillment; private until the escrow is finished.
    pub secret: PathBuf,
}

/// Generates a condition pair, creates the escrow described by `params`
/// and writes both files.
///
/// The secret file is written before submitting, so a fulfillment never
/// goes missing for an escrow the ledger accepted.
pub async fn create_escrow<L: Ledger>(
    lifecycle: &EscrowLifecycle<L>,
    creator: &Wallet,
    destination: String,
    params: &EscrowParams,
    files: &EscrowFiles,
) -> anyhow::Result<EscrowMetadata> {
    params.validate()?;
    let pair = generate()?;
    save_escrow_data(&files.secret, &pair)?;

    let (finish_after, cancel_after) = params.gates()?;
    let created = lifecycle
        .create_with(
            creator,
            EscrowCreateRequest {
                destination,
                amount: params.amount.clone(),
                finish_after: Some(finish_after),
                cancel_after,
                condition: Some(pair.condition),
                destination_tag: params.destination_tag,
            },
        )
        .await?;

    let metadata = EscrowMetadata {
        escrow: created.escrow,
        create_hash: created.outcome.hash,
    };
    save_escrow_data(&files.metadata, &metadata)?;
    info!(offer_sequence = metadata.escrow.offer_sequence, "Escrow created successfully");
    Ok(metadata)
}

/// Finishes the escrow in `files.metadata` with the fulfillment in
/// `files.secret`, waiting for its time gate first unless `wait` is off.
///
/// # Errors
///
/// Fails without submitting if the stored condition does not match the
/// escrow's.
pub async fn finish_escrow<L: Ledger>(
    lifecycle: &EscrowLifecycle<L>,
    signer: &Wallet,
    files: &EscrowFiles,
    wait: bool,
) -> anyhow::Result<EscrowMetadata> {
    let mut metadata: EscrowMetadata = load_escrow_data(&files.metadata)?;
    let pair: ConditionPair = load_escrow_data(&files.secret)?;
    if metadata.escrow.condition != Some(pair.condition) {
        anyhow::bail!(
            "Condition in {:?} does not match the escrow",
            files.secret
        );
    }

    lifecycle.track(metadata.escrow.clone()).await;
    if let (true, Some(not_before)) = (wait, metadata.escrow.finish_after) {
        info!("Waiting until {} before finishing escrow...", not_before);
        lifecycle.await_gate(not_before).await?;
    }
    lifecycle
        .complete(
            signer,
            &pair.condition,
            &pair.fulfillment,
            &metadata.escrow.owner,
            metadata.escrow.offer_sequence,
        )
        .await?;

    metadata.escrow.state = EscrowState::Completed;
    save_escrow_data(&files.metadata, &metadata)?;
    info!("Escrow finished successfully");
    Ok(metadata)
}

/// Cancels the escrow in `metadata_file` and records the new state there.
pub async fn cancel_escrow<L: Ledger>(
    lifecycle: &EscrowLifecycle<L>,
    signer: &Wallet,
    metadata_file: &Path,
) -> anyhow::Result<EscrowMetadata> {
    let mut metadata: EscrowMetadata = load_escrow_data(metadata_file)
        .with_context(|| "loading escrow metadata")?;

    lifecycle.track(metadata.escrow.clone()).await;
    lifecycle
        .cancel(
            signer,
            &metadata.escrow.owner,
            metadata.escrow.offer_sequence,
        )
        .await?;

    metadata.escrow.state = EscrowState::Canceled;
    save_escrow_data(metadata_file, &metadata)?;
    info!("Escrow canceled successfully");
    Ok(metadata)
}
