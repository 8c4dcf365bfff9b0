use crate::errors::{Result, ServiceError};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub solana: SolanaConfig,
    pub mongodb: MongoDbConfig,
    pub server: ServerConfig,
    pub program: ProgramConfig,
    pub tracker: TrackerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolanaConfig {
    pub rpc_url: String,
    pub ws_url: String,
    pub commitment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDbConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramConfig {
    pub program_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Seconds between full on-chain scans
    pub sync_interval_secs: u64,
    /// Seconds between analytics snapshots
    pub stats_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; missing keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            solana: SolanaConfig {
                rpc_url: var("SOLANA_RPC_URL", "http://localhost:8899"),
                ws_url: var("SOLANA_WS_URL", "ws://localhost:8900"),
                commitment: var("SOLANA_COMMITMENT", "confirmed"),
            },
            mongodb: MongoDbConfig {
                uri: var("MONGODB_URI", "mongodb://localhost:27017"),
                database: var("MONGODB_DATABASE", "timelock_wallet"),
            },
            server: ServerConfig {
                host: var("SERVER_HOST", "0.0.0.0"),
                port: parse_var("SERVER_PORT", &var("SERVER_PORT", "8080"))?,
            },
            program: ProgramConfig {
                program_id: var("TIMELOCK_PROGRAM_ID", &timelock_wallet::ID.to_string()),
            },
            tracker: TrackerConfig {
                sync_interval_secs: parse_var("SYNC_INTERVAL_SECS", &var("SYNC_INTERVAL_SECS", "30"))?,
                stats_interval_secs: parse_var(
                    "STATS_INTERVAL_SECS",
                    &var("STATS_INTERVAL_SECS", "60"),
                )?,
            },
        })
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ServiceError::ConfigError(format!("{} has invalid value '{}'", key, value)))
}
