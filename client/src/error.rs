use xescrow_core::EscrowError;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Escrow(#[from] EscrowError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("RPC error {error}: {message}")]
    Rpc { error: String, message: String },
    #[error("URL parse error")]
    UrlParse(#[from] url::ParseError),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Transaction {hash} not validated by ledger {last_ledger_sequence}")]
    Expired {
        hash: String,
        last_ledger_sequence: u32,
    },
    #[error("Validated {0} carries no sequence")]
    MissingSequence(String),
    #[error("Signer {signer} cannot submit for account {account}")]
    SignerMismatch { signer: String, account: String },
    #[error("Faucet error: {0}")]
    Faucet(String),
}

impl ClientError {
    /// Ledger result code of a rejected transaction, if that is what failed.
    pub fn result_code(&self) -> Option<&str> {
        match self {
            Self::Escrow(EscrowError::Submission { result_code }) => Some(result_code),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}
