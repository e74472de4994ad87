//! Core types for JSON (de)serialization of ledger config, escrow params and metadata.

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Amount, EscrowError, EscrowRecord, LedgerTime, Result};

/// Default path to the ledger config template.
pub const LEDGER_CONFIG_PATH: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../templates/ledger_config.json"
);

/// Default path to the escrow params template.
pub const ESCROW_PARAMS_PATH: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../templates/escrow_params.json"
);

/// Reads a JSON-encoded file from the given `path` and deserializes into type `T`.
///
/// # Errors
///
/// Returns an `anyhow::Error` if the file cannot be opened, read, or parsed.
pub fn load_escrow_data<P, T>(path: P) -> anyhow::Result<T>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("loading escrow data: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parsing JSON from {:?}", path))
}

/// Writes `data` (serializable) as pretty-printed JSON to the given `path`,
/// creating parent directories as needed.
///
/// # Errors
///
/// Returns an `anyhow::Error` if the file cannot be created or data cannot be serialized.
pub fn save_escrow_data<P, T>(path: P, data: &T) -> anyhow::Result<()>
where
    P: AsRef<Path>,
    T: Serialize,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {:?}", parent))?;
    }
    let file = File::create(path).with_context(|| format!("creating file {:?}", path))?;
    serde_json::to_writer_pretty(file, data)
        .with_context(|| format!("serializing to JSON to {:?}", path))
}

/// Network configuration for the ledger client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,
    /// Testnet faucet used to fund throwaway wallets.
    #[serde(default)]
    pub faucet_url: Option<String>,
    /// Interval between validation polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Ledgers a submitted transaction may wait before it expires
    /// (`LastLedgerSequence` offset).
    #[serde(default = "default_max_ledger_offset")]
    pub max_ledger_offset: u32,
    /// HTTP request timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_max_ledger_offset() -> u32 {
    20
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://s.altnet.rippletest.net:51234".to_string(),
            faucet_url: Some("https://faucet.altnet.rippletest.net/accounts".to_string()),
            poll_interval_ms: default_poll_interval_ms(),
            max_ledger_offset: default_max_ledger_offset(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl LedgerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// An account address with the seed the node signs with.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Wallet {
    /// Classic address (`r...`).
    pub address: String,
    /// Family seed (`s...`); never logged.
    pub seed: String,
}

impl Wallet {
    pub fn new(address: impl Into<String>, seed: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            seed: seed.into(),
        }
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("seed", &"..")
            .finish()
    }
}

/// Parameters required to **create** an escrow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EscrowParams {
    /// Amount to lock (drops, issued token or MPT).
    pub amount: Amount,
    /// Seconds from creation until the escrow may be finished.
    pub finish_after_secs: u64,
    /// Seconds from creation after which the escrow may be canceled.
    /// Must be greater than `finish_after_secs` if set.
    #[serde(default)]
    pub cancel_after_secs: Option<u64>,
    /// Optional destination tag.
    #[serde(default)]
    pub destination_tag: Option<u32>,
}

impl EscrowParams {
    /// Validate amount and gate ordering.
    pub fn validate(&self) -> Result<()> {
        self.amount.validate()?;
        if let Some(cancel_after) = self.cancel_after_secs {
            if cancel_after <= self.finish_after_secs {
                return Err(EscrowError::InvalidParams(format!(
                    "cancel_after_secs ({}) must be greater than finish_after_secs ({})",
                    cancel_after, self.finish_after_secs
                )));
            }
        }
        Ok(())
    }

    /// Resolves the relative gates into absolute ledger times.
    pub fn gates(&self) -> Result<(LedgerTime, Option<LedgerTime>)> {
        let finish_after = LedgerTime::after(Duration::from_secs(self.finish_after_secs))?;
        let cancel_after = self
            .cancel_after_secs
            .map(|secs| LedgerTime::after(Duration::from_secs(secs)))
            .transpose()?;
        Ok((finish_after, cancel_after))
    }
}

/// Metadata **returned** from escrow creation; read back to finish or cancel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EscrowMetadata {
    /// The escrow as created on the ledger.
    #[serde(flatten)]
    pub escrow: EscrowRecord,
    /// Hash of the `EscrowCreate` transaction.
    pub create_hash: String,
}
