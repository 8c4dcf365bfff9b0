use crate::analytics::DepositAnalytics;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::BTreeMap;
use timelock_wallet::{DepositRecord, DepositState, LockCondition};

/// Indexed copy of an on-chain deposit record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepositDocument {
    #[serde(rename = "_id")]
    pub id: String, // deposit pubkey as string
    pub owner: String,
    pub mint: String,
    pub vault: String,
    #[serde(with = "u64_string")]
    pub amount: u64,
    #[serde(with = "condition_storage")]
    pub condition: ConditionDocument,
    pub status: DepositStatus,
    /// On-chain creation time (unix seconds)
    pub created_at: i64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub last_synced: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionDocument {
    ByTime { unlock_timestamp: i64 },
    ByAmount { unlock_amount: u64 },
}

impl From<LockCondition> for ConditionDocument {
    fn from(condition: LockCondition) -> Self {
        match condition {
            LockCondition::ByTime { unlock_timestamp } => ConditionDocument::ByTime { unlock_timestamp },
            LockCondition::ByAmount { unlock_amount } => ConditionDocument::ByAmount { unlock_amount },
        }
    }
}

impl From<ConditionDocument> for LockCondition {
    fn from(condition: ConditionDocument) -> Self {
        match condition {
            ConditionDocument::ByTime { unlock_timestamp } => LockCondition::ByTime { unlock_timestamp },
            ConditionDocument::ByAmount { unlock_amount } => LockCondition::ByAmount { unlock_amount },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    Active,
    Withdrawn,
    /// Record no longer exists on-chain
    Closed,
}

impl From<DepositState> for DepositStatus {
    fn from(state: DepositState) -> Self {
        match state {
            DepositState::Active => DepositStatus::Active,
            DepositState::Withdrawn => DepositStatus::Withdrawn,
        }
    }
}

impl DepositDocument {
    pub fn from_record(address: &Pubkey, record: &DepositRecord) -> Self {
        Self {
            id: address.to_string(),
            owner: record.owner.to_string(),
            mint: record.mint.to_string(),
            vault: record.vault_address.to_string(),
            amount: record.amount,
            condition: record.lock_condition.into(),
            status: record.state.into(),
            created_at: record.created_at,
            last_synced: Utc::now(),
        }
    }

    /// True when the fields that change on-chain differ.
    pub fn differs_from(&self, other: &DepositDocument) -> bool {
        self.amount != other.amount || self.status != other.status
    }
}

// ============ API Request/Response Models ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepositView {
    pub address: String,
    pub owner: String,
    pub mint: String,
    pub vault: String,
    pub amount: u64,
    pub condition: ConditionDocument,
    pub status: DepositStatus,
    pub created_at: i64,
    /// Advisory only: evaluated against this server's clock, not the ledger's
    pub unlockable: bool,
}

impl DepositView {
    pub fn from_record(address: &Pubkey, record: &DepositRecord, now: i64) -> Self {
        Self {
            address: address.to_string(),
            owner: record.owner.to_string(),
            mint: record.mint.to_string(),
            vault: record.vault_address.to_string(),
            amount: record.amount,
            condition: record.lock_condition.into(),
            status: record.state.into(),
            created_at: record.created_at,
            unlockable: record.is_active() && record.condition_met(now),
        }
    }

    pub fn from_document(doc: &DepositDocument, now: i64) -> Self {
        let condition: LockCondition = doc.condition.into();
        Self {
            address: doc.id.clone(),
            owner: doc.owner.clone(),
            mint: doc.mint.clone(),
            vault: doc.vault.clone(),
            amount: doc.amount,
            condition: doc.condition,
            status: doc.status,
            created_at: doc.created_at,
            unlockable: doc.status == DepositStatus::Active && condition.is_met(doc.amount, now),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LockKind {
    Time,
    Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeriveQuery {
    pub owner: String,
    pub kind: LockKind,
    /// Unlock timestamp or unlock amount, as a decimal string
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DerivedAddresses {
    pub deposit: String,
    pub deposit_bump: u8,
    pub vault: String,
    pub vault_bump: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "instruction", rename_all = "snake_case")]
pub enum PrepareTransactionRequest {
    InitializeDeposit {
        owner: String,
        mint: String,
        amount: u64,
        unlock_timestamp: i64,
    },
    InitializeDepositByAmount {
        owner: String,
        mint: String,
        amount: u64,
        unlock_amount: u64,
    },
    AddFunds {
        owner: String,
        deposit: String,
        additional_amount: u64,
    },
    Withdraw {
        owner: String,
        deposit: String,
    },
    CloseDeposit {
        owner: String,
        deposit: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrepareTransactionResponse {
    /// Base58 serialized message for the owner's wallet to sign
    pub message: String,
    pub recent_blockhash: String,
    pub deposit: String,
}

/// Analytics snapshot persisted on an interval
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepositStats {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner: Option<String>,
    #[serde(with = "analytics_storage")]
    pub analytics: DepositAnalytics,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

// ============ WebSocket Messages ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum WsMessage {
    #[serde(rename = "deposit_created")]
    DepositCreated {
        deposit: String,
        owner: String,
        amount: u64,
    },
    #[serde(rename = "deposit_updated")]
    DepositUpdated {
        deposit: String,
        amount: u64,
        status: DepositStatus,
    },
    #[serde(rename = "deposit_closed")]
    DepositClosed { deposit: String },
    #[serde(rename = "stats_update")]
    StatsUpdate {
        total_locked: u64,
        active_count: u64,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

// ============ Storage Encoding ============
//
// BSON has no unsigned 64-bit integer and rejects u64 values above i64::MAX,
// so token amounts are stored as decimal strings. API JSON keeps numbers.

mod u64_string {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(D::Error::custom)
    }
}

mod u64_string_map {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, u64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(map.iter().map(|(key, value)| (key, value.to_string())))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, u64>, D::Error> {
        BTreeMap::<String, String>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, value)| {
                value
                    .parse()
                    .map(|value| (key, value))
                    .map_err(D::Error::custom)
            })
            .collect()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StoredCondition {
    ByTime {
        unlock_timestamp: i64,
    },
    ByAmount {
        #[serde(with = "u64_string")]
        unlock_amount: u64,
    },
}

mod condition_storage {
    use super::{ConditionDocument, StoredCondition};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        condition: &ConditionDocument,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let stored = match *condition {
            ConditionDocument::ByTime { unlock_timestamp } => StoredCondition::ByTime { unlock_timestamp },
            ConditionDocument::ByAmount { unlock_amount } => StoredCondition::ByAmount { unlock_amount },
        };
        stored.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ConditionDocument, D::Error> {
        Ok(match StoredCondition::deserialize(deserializer)? {
            StoredCondition::ByTime { unlock_timestamp } => ConditionDocument::ByTime { unlock_timestamp },
            StoredCondition::ByAmount { unlock_amount } => ConditionDocument::ByAmount { unlock_amount },
        })
    }
}

#[derive(Serialize, Deserialize)]
struct StoredAnalytics {
    #[serde(with = "u64_string")]
    total_locked: u64,
    #[serde(with = "u64_string_map")]
    locked_by_mint: BTreeMap<String, u64>,
    active_count: u64,
    withdrawn_count: u64,
    closed_count: u64,
    average_lock_secs: f64,
}

mod analytics_storage {
    use super::{DepositAnalytics, StoredAnalytics};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        analytics: &DepositAnalytics,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        StoredAnalytics {
            total_locked: analytics.total_locked,
            locked_by_mint: analytics.locked_by_mint.clone(),
            active_count: analytics.active_count,
            withdrawn_count: analytics.withdrawn_count,
            closed_count: analytics.closed_count,
            average_lock_secs: analytics.average_lock_secs,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DepositAnalytics, D::Error> {
        let stored = StoredAnalytics::deserialize(deserializer)?;
        Ok(DepositAnalytics {
            total_locked: stored.total_locked,
            locked_by_mint: stored.locked_by_mint,
            active_count: stored.active_count,
            withdrawn_count: stored.withdrawn_count,
            closed_count: stored.closed_count,
            average_lock_secs: stored.average_lock_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record(state: DepositState) -> DepositRecord {
        DepositRecord {
            owner: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            vault_address: Pubkey::new_unique(),
            amount: 400,
            lock_condition: LockCondition::ByAmount { unlock_amount: 400 },
            lock_seed: 400u64.to_le_bytes(),
            state,
            created_at: 1_700_000_000,
            bump: 255,
        }
    }

    #[test]
    fn document_mirrors_record() {
        let address = Pubkey::new_unique();
        let record = sample_record(DepositState::Active);
        let doc = DepositDocument::from_record(&address, &record);

        assert_eq!(doc.id, address.to_string());
        assert_eq!(doc.owner, record.owner.to_string());
        assert_eq!(doc.vault, record.vault_address.to_string());
        assert_eq!(doc.status, DepositStatus::Active);
        assert_eq!(doc.condition, ConditionDocument::ByAmount { unlock_amount: 400 });
    }

    #[test]
    fn differs_only_on_mutable_fields() {
        let address = Pubkey::new_unique();
        let record = sample_record(DepositState::Active);
        let doc = DepositDocument::from_record(&address, &record);

        let mut resynced = doc.clone();
        resynced.last_synced = Utc::now();
        assert!(!doc.differs_from(&resynced));

        let mut withdrawn = doc.clone();
        withdrawn.status = DepositStatus::Withdrawn;
        assert!(doc.differs_from(&withdrawn));
    }

    #[test]
    fn withdrawn_deposit_is_never_unlockable() {
        let address = Pubkey::new_unique();
        let mut record = sample_record(DepositState::Withdrawn);
        record.amount = 0;
        record.lock_condition = LockCondition::ByTime { unlock_timestamp: 0 };

        let view = DepositView::from_record(&address, &record, 1_800_000_000);
        assert_eq!(view.status, DepositStatus::Withdrawn);
        assert!(!view.unlockable);
    }

    #[test]
    fn view_from_document_evaluates_condition() {
        let address = Pubkey::new_unique();
        let doc = DepositDocument::from_record(&address, &sample_record(DepositState::Active));

        assert!(DepositView::from_document(&doc, 0).unlockable);

        let mut short = doc.clone();
        short.amount = 399;
        assert!(!DepositView::from_document(&short, 0).unlockable);
    }

    #[test]
    fn condition_json_is_tagged() {
        let json = serde_json::to_value(ConditionDocument::ByTime { unlock_timestamp: 7 }).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "by_time", "unlock_timestamp": 7 }));
    }

    #[test]
    fn ws_message_json_is_tagged() {
        let json = serde_json::to_value(WsMessage::DepositClosed {
            deposit: "abc".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "type": "deposit_closed", "deposit": "abc" }));
    }

    #[test]
    fn large_amounts_survive_bson_storage() {
        let mut record = sample_record(DepositState::Active);
        record.amount = u64::MAX - 10;
        record.lock_condition = LockCondition::ByAmount { unlock_amount: u64::MAX };

        let mut doc = DepositDocument::from_record(&Pubkey::new_unique(), &record);
        doc.last_synced = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();

        let raw = bson::to_raw_document_buf(&doc).unwrap();
        let decoded: DepositDocument = bson::from_slice(raw.as_bytes()).unwrap();
        assert_eq!(decoded, doc);

        let stored = bson::to_document(&doc).unwrap();
        assert_eq!(stored.get_str("amount").unwrap(), (u64::MAX - 10).to_string());
        assert_eq!(
            stored
                .get_document("condition")
                .unwrap()
                .get_str("unlock_amount")
                .unwrap(),
            u64::MAX.to_string()
        );
        assert!(matches!(stored.get("last_synced"), Some(bson::Bson::DateTime(_))));
    }

    #[test]
    fn view_json_keeps_amounts_numeric() {
        let mut record = sample_record(DepositState::Active);
        record.amount = u64::MAX;
        let view = DepositView::from_record(&Pubkey::new_unique(), &record, 0);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["amount"], serde_json::json!(u64::MAX));
        assert_eq!(json["condition"]["unlock_amount"], serde_json::json!(400));
    }

    #[test]
    fn saturated_stats_snapshot_is_storable() {
        let analytics = DepositAnalytics {
            total_locked: u64::MAX,
            locked_by_mint: BTreeMap::from([("mint".to_string(), u64::MAX)]),
            active_count: 2,
            average_lock_secs: 4.5,
            ..DepositAnalytics::default()
        };
        let stats = DepositStats {
            id: "snapshot".to_string(),
            owner: None,
            analytics,
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        };

        let raw = bson::to_raw_document_buf(&stats).unwrap();
        let decoded: DepositStats = bson::from_slice(raw.as_bytes()).unwrap();
        assert_eq!(decoded, stats);
    }
}
