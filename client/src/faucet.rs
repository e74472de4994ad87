use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use xescrow_core::{LedgerConfig, Wallet};

use crate::error::{ClientError, Result};

#[derive(Debug, Deserialize)]
struct FaucetResponse {
    account: FaucetAccount,
    #[serde(default)]
    balance: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaucetAccount {
    classic_address: Option<String>,
    address: Option<String>,
    secret: Option<String>,
}

/// Asks the test network faucet for a new funded account.
#[instrument(skip_all, fields(faucet_url = ?config.faucet_url))]
pub async fn fund_wallet(config: &LedgerConfig) -> Result<Wallet> {
    let url = config
        .faucet_url
        .as_deref()
        .ok_or_else(|| ClientError::Faucet("no faucet_url configured".to_string()))?;

    let client = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()?;
    let response = client
        .post(url)
        .json(&json!({}))
        .send()
        .await?
        .error_for_status()?;
    let funded: FaucetResponse = response.json().await?;

    let account = funded.account;
    let address = account
        .classic_address
        .or(account.address)
        .ok_or_else(|| ClientError::Faucet("faucet returned no address".to_string()))?;
    let seed = account
        .secret
        .ok_or_else(|| ClientError::Faucet("faucet returned no seed".to_string()))?;
    let wallet = Wallet::new(address, seed);
    info!(address = %wallet.address, balance = ?funded.balance, "Funded wallet");
    Ok(wallet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_faucet_response() {
        let body = r#"{
            "account": {
                "xAddress": "T7jkn8zYC2NhPdcbVxkiEXZGy56YiEE4P7uXRgpy5j4Q6S1",
                "classicAddress": "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe",
                "address": "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe",
                "secret": "snoPBrXtMeMyMHUVTgbuqAfg1SUTb"
            },
            "amount": 1000,
            "balance": 1000
        }"#;
        let parsed: FaucetResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.account.classic_address.as_deref(),
            Some("rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe")
        );
        assert_eq!(parsed.balance, Some(1000.0));
    }

    #[tokio::test]
    async fn requires_faucet_url() {
        let config = LedgerConfig {
            faucet_url: None,
            ..LedgerConfig::default()
        };
        assert!(matches!(
            fund_wallet(&config).await,
            Err(ClientError::Faucet(_))
        ));
    }
}
