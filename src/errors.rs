use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] mongodb::error::Error),

    #[error("Solana client error: {0}")]
    SolanaClientError(#[from] solana_client::client_error::ClientError),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(#[from] solana_sdk::pubkey::ParsePubkeyError),

    #[error("Account decode error: {0}")]
    DecodeError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("BSON error: {0}")]
    BsonError(#[from] bson::ser::Error),

    #[error("Deposit not found: {0}")]
    DepositNotFound(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<anchor_lang::error::Error> for ServiceError {
    fn from(err: anchor_lang::error::Error) -> Self {
        ServiceError::DecodeError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
