use crate::analytics::{self, DepositAnalytics};
use crate::database::DatabaseManager;
use crate::deposit_manager::DepositManager;
use crate::errors::ServiceError;
use crate::models::*;
use crate::transaction_builder::TransactionBuilder;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use timelock_wallet::DepositRecord;
use tokio::sync::broadcast;

pub struct AppState {
    pub deposits: Arc<DepositManager>,
    pub transaction_builder: Arc<TransactionBuilder>,
    pub db: Arc<DatabaseManager>,
    pub ws_sender: broadcast::Sender<WsMessage>,
}

// Error response helper
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::DepositNotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::InvalidPublicKey(_) | ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ServiceError::TransactionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn parse_pubkey(value: &str) -> Result<Pubkey, ServiceError> {
    Ok(Pubkey::from_str(value)?)
}

// ============ API Handlers ============

/// Live read of a single deposit from chain, falling back to the index for closed records
pub async fn get_deposit(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<DepositView>, ServiceError> {
    let address = parse_pubkey(&address)?;
    match state.deposits.get_deposit(&address).await {
        Ok(deposit) => Ok(Json(deposit)),
        Err(ServiceError::DepositNotFound(id)) => {
            let doc = state
                .db
                .get_deposit(&id)
                .await?
                .ok_or(ServiceError::DepositNotFound(id))?;
            Ok(Json(DepositView::from_document(&doc, Utc::now().timestamp())))
        }
        Err(e) => Err(e),
    }
}

/// Deposits of an owner, newest first. The index is merged with a live scan so
/// deposits created since the last sync show up immediately.
pub async fn get_deposits_by_owner(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
) -> Result<Json<Vec<DepositView>>, ServiceError> {
    let owner = parse_pubkey(&owner)?;
    let now = Utc::now().timestamp();

    let indexed = state.db.get_deposits_by_owner(&owner.to_string()).await?;
    let live = match state.deposits.list_owner_records(&owner).await {
        Ok(records) => Some(records),
        Err(e) => {
            log::warn!("Live scan for {} failed, serving index only: {}", owner, e);
            None
        }
    };

    Ok(Json(merge_owner_deposits(&indexed, live.as_deref(), now)))
}

/// Live records win over their indexed copies. When the live scan succeeded,
/// an indexed deposit missing from it no longer exists on-chain.
fn merge_owner_deposits(
    indexed: &[DepositDocument],
    live: Option<&[(Pubkey, DepositRecord)]>,
    now: i64,
) -> Vec<DepositView> {
    let mut views: Vec<DepositView> = live
        .unwrap_or_default()
        .iter()
        .map(|(address, record)| DepositView::from_record(address, record, now))
        .collect();
    let seen: HashSet<String> = views.iter().map(|view| view.address.clone()).collect();

    for doc in indexed.iter().filter(|doc| !seen.contains(&doc.id)) {
        let mut view = DepositView::from_document(doc, now);
        if live.is_some() && view.status != DepositStatus::Closed {
            view.status = DepositStatus::Closed;
            view.amount = 0;
            view.unlockable = false;
        }
        views.push(view);
    }

    views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    views
}

pub async fn derive_addresses(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeriveQuery>,
) -> Result<Json<DerivedAddresses>, ServiceError> {
    let derived = state
        .deposits
        .derive_addresses(&query.owner, query.kind, &query.value)?;
    Ok(Json(derived))
}

/// Build and simulate an unsigned transaction for the owner's wallet
pub async fn prepare_transaction(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PrepareTransactionRequest>,
) -> Result<Json<PrepareTransactionResponse>, ServiceError> {
    let builder = &state.transaction_builder;

    let (owner, deposit, instruction) = match payload {
        PrepareTransactionRequest::InitializeDeposit {
            owner,
            mint,
            amount,
            unlock_timestamp,
        } => {
            let owner = parse_pubkey(&owner)?;
            let mint = parse_pubkey(&mint)?;
            let (deposit, ix) = builder.initialize_deposit(&owner, &mint, amount, unlock_timestamp);
            (owner, deposit, ix)
        }
        PrepareTransactionRequest::InitializeDepositByAmount {
            owner,
            mint,
            amount,
            unlock_amount,
        } => {
            let owner = parse_pubkey(&owner)?;
            let mint = parse_pubkey(&mint)?;
            let (deposit, ix) = builder.initialize_deposit_by_amount(&owner, &mint, amount, unlock_amount);
            (owner, deposit, ix)
        }
        PrepareTransactionRequest::AddFunds {
            owner,
            deposit,
            additional_amount,
        } => {
            let owner = parse_pubkey(&owner)?;
            let deposit = parse_pubkey(&deposit)?;
            let record = state.deposits.fetch_record(&deposit).await?;
            (owner, deposit, builder.add_funds(&owner, &deposit, &record, additional_amount))
        }
        PrepareTransactionRequest::Withdraw { owner, deposit } => {
            let owner = parse_pubkey(&owner)?;
            let deposit = parse_pubkey(&deposit)?;
            let record = state.deposits.fetch_record(&deposit).await?;
            (owner, deposit, builder.withdraw(&owner, &deposit, &record))
        }
        PrepareTransactionRequest::CloseDeposit { owner, deposit } => {
            let owner = parse_pubkey(&owner)?;
            let deposit = parse_pubkey(&deposit)?;
            let record = state.deposits.fetch_record(&deposit).await?;
            (owner, deposit, builder.close_deposit(&owner, &deposit, &record))
        }
    };

    let prepared = builder.prepare(&[instruction], &owner).await?;

    Ok(Json(PrepareTransactionResponse {
        message: prepared.message,
        recent_blockhash: prepared.recent_blockhash.to_string(),
        deposit: deposit.to_string(),
    }))
}

/// Analytics over every indexed deposit
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DepositAnalytics>, ServiceError> {
    let deposits = state.db.get_all_deposits().await?;
    Ok(Json(analytics::compute(&deposits)))
}

/// Analytics over one owner's deposits
pub async fn get_owner_analytics(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
) -> Result<Json<DepositAnalytics>, ServiceError> {
    let owner = parse_pubkey(&owner)?;
    let deposits = state.db.get_deposits_by_owner(&owner.to_string()).await?;
    Ok(Json(analytics::compute(&deposits)))
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.db.ping().await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            log::warn!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "DATABASE UNAVAILABLE")
        }
    }
}
