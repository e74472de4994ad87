use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, trace, warn};
use url::Url;
use xescrow_core::{LedgerConfig, LedgerTime, Transaction, Wallet};

use super::{is_final_rejection, Ledger, SubmitOutcome};
use crate::error::{ClientError, Result};

/// Ledger collaborator talking to a node's JSON-RPC endpoint.
///
/// Transactions are signed by the node (`submit` in sign-and-submit mode),
/// so the endpoint must permit signing, as a local or standalone node does.
pub struct JsonRpcLedger {
    // HTTP client
    client: Client,
    // JSON-RPC endpoint of the node
    rpc_url: Url,
    // Delay between validation polls
    poll_interval: Duration,
    // `LastLedgerSequence` offset from the current open ledger
    max_ledger_offset: u32,
    // Request ID counter
    request_id: AtomicU64,
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    params: [Value; 1],
    id: u64,
}

impl JsonRpcLedger {
    /// Create a new JsonRpcLedger from network configuration.
    #[instrument(skip_all, fields(rpc_url = %config.rpc_url))]
    pub fn new(config: &LedgerConfig) -> Result<Self> {
        let rpc_url = Url::parse(&config.rpc_url)?;
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        info!("Using ledger node {}", rpc_url);

        Ok(Self {
            client,
            rpc_url,
            poll_interval: config.poll_interval(),
            max_ledger_offset: config.max_ledger_offset,
            request_id: AtomicU64::new(0),
        })
    }

    /// Make an RPC call and return its `result` object.
    async fn call(&self, method: &str, params: Value) -> Result<Map<String, Value>> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = RpcRequest {
            method,
            params: [params],
            id,
        };
        trace!("RPC call: {} id={}", method, id);

        let response = self
            .client
            .post(self.rpc_url.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let mut body: Map<String, Value> = response.json().await?;

        let result = match body.remove("result") {
            Some(Value::Object(result)) => result,
            _ => {
                return Err(ClientError::Serialization(format!(
                    "{} response has no result object",
                    method
                )))
            }
        };
        if result.get("status").and_then(Value::as_str) == Some("error") {
            return Err(ClientError::Rpc {
                error: str_field(&result, "error").unwrap_or("unknown").to_string(),
                message: str_field(&result, "error_message")
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        Ok(result)
    }

    async fn current_ledger_index(&self) -> Result<u32> {
        let result = self.call("ledger_current", json!({})).await?;
        u32_field(&result, "ledger_current_index").ok_or_else(|| missing("ledger_current_index"))
    }

    async fn validated_ledger_index(&self) -> Result<u32> {
        let result = self
            .call("ledger", json!({ "ledger_index": "validated" }))
            .await?;
        u32_field(&result, "ledger_index").ok_or_else(|| missing("ledger_index"))
    }
}

/// `ledger.close_time` of a `ledger` response.
fn close_time(result: &Map<String, Value>) -> Option<LedgerTime> {
    let ledger = result.get("ledger")?.as_object()?;
    u32_field(ledger, "close_time").map(LedgerTime::from_secs)
}

#[async_trait::async_trait]
impl Ledger for JsonRpcLedger {
    #[instrument(skip(self, tx, signer), fields(kind = tx.kind(), account = %signer.address))]
    async fn submit_and_wait(&self, tx: &Transaction, signer: &Wallet) -> Result<SubmitOutcome> {
        if tx.account() != signer.address {
            return Err(ClientError::SignerMismatch {
                signer: signer.address.clone(),
                account: tx.account().to_string(),
            });
        }

        let last_ledger_sequence = self.current_ledger_index().await? + self.max_ledger_offset;
        let mut tx_json = serde_json::to_value(tx)?;
        if let Value::Object(fields) = &mut tx_json {
            fields.insert("LastLedgerSequence".into(), json!(last_ledger_sequence));
        }

        let submitted = self
            .call(
                "submit",
                json!({
                    "tx_json": tx_json,
                    "secret": signer.seed,
                    "fee_mult_max": 1000,
                }),
            )
            .await?;
        let engine_result = str_field(&submitted, "engine_result")
            .ok_or_else(|| missing("engine_result"))?
            .to_string();
        let submitted_tx = submitted
            .get("tx_json")
            .and_then(Value::as_object)
            .ok_or_else(|| missing("tx_json"))?;
        let hash = str_field(submitted_tx, "hash")
            .ok_or_else(|| missing("hash"))?
            .to_string();
        let sequence = u32_field(submitted_tx, "Sequence");
        info!(%hash, %engine_result, ?sequence, "Submitted");

        if is_final_rejection(&engine_result) {
            warn!(%engine_result, "Rejected before reaching a ledger");
            return Ok(SubmitOutcome {
                result_code: engine_result,
                hash,
                sequence,
                validated: false,
                ledger_index: None,
                fields: submitted,
            });
        }

        loop {
            tokio::time::sleep(self.poll_interval).await;

            match self
                .call("tx", json!({ "transaction": hash, "binary": false }))
                .await
            {
                Ok(result) if result.get("validated").and_then(Value::as_bool) == Some(true) => {
                    let result_code = result
                        .get("meta")
                        .and_then(|meta| str_field(meta.as_object()?, "TransactionResult"))
                        .ok_or_else(|| missing("meta.TransactionResult"))?
                        .to_string();
                    let sequence = u32_field(&result, "Sequence")
                        .or_else(|| {
                            result
                                .get("tx_json")
                                .and_then(Value::as_object)
                                .and_then(|tx| u32_field(tx, "Sequence"))
                        })
                        .or(sequence);
                    let ledger_index = u32_field(&result, "ledger_index");
                    info!(%hash, %result_code, ?ledger_index, "Validated");
                    return Ok(SubmitOutcome {
                        result_code,
                        hash,
                        sequence,
                        validated: true,
                        ledger_index,
                        fields: result,
                    });
                }
                Ok(_) => debug!(%hash, "Not yet validated"),
                Err(ClientError::Rpc { error, .. }) if error == "txnNotFound" => {
                    debug!(%hash, "Not yet found")
                }
                Err(e) => return Err(e),
            }

            let validated = self.validated_ledger_index().await?;
            if validated > last_ledger_sequence {
                return Err(ClientError::Expired {
                    hash,
                    last_ledger_sequence,
                });
            }
        }
    }

    #[instrument(skip(self))]
    async fn ledger_time(&self) -> Result<LedgerTime> {
        let result = self
            .call("ledger", json!({ "ledger_index": "validated" }))
            .await?;
        let close_time = close_time(&result).ok_or_else(|| missing("ledger.close_time"))?;
        trace!(%close_time, "Validated close time");
        Ok(close_time)
    }
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

// Ledger indexes come back as numbers or, in older API versions, strings.
fn u32_field(map: &Map<String, Value>, key: &str) -> Option<u32> {
    match map.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn missing(field: &str) -> ClientError {
    ClientError::Serialization(format!("missing `{}` in ledger response", field))
}
