use crate::models::{ConditionDocument, DepositDocument, DepositStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregates over a set of indexed deposits
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DepositAnalytics {
    /// Sum of `amount` over active deposits
    pub total_locked: u64,
    /// Active locked amount per mint
    pub locked_by_mint: BTreeMap<String, u64>,
    pub active_count: u64,
    pub withdrawn_count: u64,
    pub closed_count: u64,
    /// Mean `unlock_timestamp - created_at` over active time-locked deposits
    pub average_lock_secs: f64,
}

pub fn compute(deposits: &[DepositDocument]) -> DepositAnalytics {
    let mut analytics = DepositAnalytics::default();
    let mut lock_secs_total: i128 = 0;
    let mut time_locked: u64 = 0;

    for deposit in deposits {
        match deposit.status {
            DepositStatus::Active => {
                analytics.active_count += 1;
                analytics.total_locked = analytics.total_locked.saturating_add(deposit.amount);

                let per_mint = analytics
                    .locked_by_mint
                    .entry(deposit.mint.clone())
                    .or_insert(0);
                *per_mint = per_mint.saturating_add(deposit.amount);

                if let ConditionDocument::ByTime { unlock_timestamp } = deposit.condition {
                    lock_secs_total += i128::from(unlock_timestamp) - i128::from(deposit.created_at);
                    time_locked += 1;
                }
            }
            DepositStatus::Withdrawn => analytics.withdrawn_count += 1,
            DepositStatus::Closed => analytics.closed_count += 1,
        }
    }

    if time_locked > 0 {
        analytics.average_lock_secs = lock_secs_total as f64 / time_locked as f64;
    }

    analytics
}
