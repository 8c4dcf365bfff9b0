use crate::analytics::{self, DepositAnalytics};
use crate::database::DatabaseManager;
use crate::deposit_manager::DepositManager;
use crate::errors::Result;
use crate::models::{DepositDocument, DepositStats, DepositStatus, WsMessage};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{interval, Duration};

/// Mirrors on-chain deposits into MongoDB and pushes changes to WebSocket clients
pub struct DepositTracker {
    db: Arc<DatabaseManager>,
    deposits: Arc<DepositManager>,
    ws_sender: broadcast::Sender<WsMessage>,
    sync_interval: Duration,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub closed: usize,
    pub discrepancies: usize,
    /// Records that could not be written to the index this round
    pub failed: usize,
}

impl DepositTracker {
    pub fn new(
        db: Arc<DatabaseManager>,
        deposits: Arc<DepositManager>,
        ws_sender: broadcast::Sender<WsMessage>,
        sync_interval: Duration,
    ) -> Self {
        Self {
            db,
            deposits,
            ws_sender,
            sync_interval,
        }
    }

    /// Start the periodic sync loop
    pub fn start_monitoring(&self) {
        let tracker = self.clone();

        tokio::spawn(async move {
            let mut sync_interval = interval(tracker.sync_interval);

            loop {
                sync_interval.tick().await;
                match tracker.sync_deposits().await {
                    Ok(report) => log::debug!("Deposit sync finished: {:?}", report),
                    Err(e) => log::error!("Failed to sync deposits: {}", e),
                }
            }
        });
    }

    /// Scan the program, upsert every record and reconcile vault balances
    pub async fn sync_deposits(&self) -> Result<SyncReport> {
        let records = self.deposits.list_all_records().await?;
        let mut known: HashMap<String, DepositDocument> = self
            .db
            .get_all_deposits()
            .await?
            .into_iter()
            .map(|doc| (doc.id.clone(), doc))
            .collect();

        let mut report = SyncReport::default();

        for (address, record) in &records {
            let doc = DepositDocument::from_record(address, record);
            let previous = known.remove(&doc.id);

            if let Err(e) = self.db.upsert_deposit(&doc).await {
                log::error!("Failed to index deposit {}: {}", doc.id, e);
                report.failed += 1;
                continue;
            }

            match (&previous, change_message(previous.as_ref(), &doc)) {
                (None, Some(msg)) => {
                    report.created += 1;
                    self.broadcast(msg);
                }
                (Some(_), Some(msg)) => {
                    report.updated += 1;
                    self.broadcast(msg);
                }
                _ => {}
            }
        }

        let vaults: Vec<_> = records.iter().map(|(_, record)| record.vault_address).collect();
        let balances = self.deposits.vault_balances(&vaults).await?;

        for ((address, record), balance) in records.iter().zip(balances) {
            if let Some(message) = reconcile(&address.to_string(), record.amount, balance) {
                log::warn!("{}", message);
                report.discrepancies += 1;
                self.broadcast(WsMessage::Error { message });
            }
        }

        for id in vanished(known) {
            if let Err(e) = self.db.mark_deposit_closed(&id).await {
                log::error!("Failed to mark deposit {} closed: {}", id, e);
                report.failed += 1;
                continue;
            }
            report.closed += 1;
            self.broadcast(WsMessage::DepositClosed { deposit: id });
        }

        if report.discrepancies > 0 {
            log::warn!("Found {} deposits with vault discrepancies", report.discrepancies);
        }
        if report.failed > 0 {
            log::warn!("{} deposits could not be indexed this round", report.failed);
        }
        log::info!(
            "Synced {} deposits ({} new, {} updated, {} closed)",
            records.len(),
            report.created,
            report.updated,
            report.closed
        );

        Ok(report)
    }

    /// Compute global analytics, persist a snapshot and broadcast it
    pub async fn update_stats(&self) -> Result<DepositAnalytics> {
        let deposits = self.db.get_all_deposits().await?;
        let analytics = analytics::compute(&deposits);

        self.db
            .insert_stats(DepositStats {
                id: uuid::Uuid::new_v4().to_string(),
                owner: None,
                analytics: analytics.clone(),
                timestamp: Utc::now(),
            })
            .await?;

        self.broadcast(WsMessage::StatsUpdate {
            total_locked: analytics.total_locked,
            active_count: analytics.active_count,
        });

        log::info!(
            "Stats updated: {} tokens locked across {} active deposits",
            analytics.total_locked,
            analytics.active_count
        );

        Ok(analytics)
    }

    fn broadcast(&self, msg: WsMessage) {
        // no subscribers is not an error
        let _ = self.ws_sender.send(msg);
    }
}

impl Clone for DepositTracker {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            deposits: Arc::clone(&self.deposits),
            ws_sender: self.ws_sender.clone(),
            sync_interval: self.sync_interval,
        }
    }
}

/// Message to publish for a record seen during a scan, if anything changed
fn change_message(previous: Option<&DepositDocument>, current: &DepositDocument) -> Option<WsMessage> {
    match previous {
        None => Some(WsMessage::DepositCreated {
            deposit: current.id.clone(),
            owner: current.owner.clone(),
            amount: current.amount,
        }),
        Some(prev) if prev.differs_from(current) => Some(WsMessage::DepositUpdated {
            deposit: current.id.clone(),
            amount: current.amount,
            status: current.status,
        }),
        Some(_) => None,
    }
}

/// Indexed deposits that were not seen on-chain and are not yet marked closed
fn vanished(remaining: HashMap<String, DepositDocument>) -> Vec<String> {
    let mut ids: Vec<String> = remaining
        .into_values()
        .filter(|doc| doc.status != DepositStatus::Closed)
        .map(|doc| doc.id)
        .collect();
    ids.sort();
    ids
}

/// The record's amount must equal the vault's token balance.
fn reconcile(deposit: &str, recorded: u64, vault_balance: Option<u64>) -> Option<String> {
    match vault_balance {
        Some(balance) if balance == recorded => None,
        Some(balance) => Some(format!(
            "Vault balance mismatch for deposit {}: recorded={}, vault={}",
            deposit, recorded, balance
        )),
        None => Some(format!("Vault missing for deposit {}", deposit)),
    }
}
