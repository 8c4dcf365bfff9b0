use crate::config::MongoDbConfig;
use crate::errors::Result;
use crate::models::*;
use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{ClientOptions, FindOptions, IndexOptions, ReplaceOptions},
    Client, Collection, Database, IndexModel,
};

const DEPOSITS: &str = "deposits";
const DEPOSIT_STATS: &str = "deposit_stats";

#[derive(Clone)]
pub struct DatabaseManager {
    client: Client,
    db: Database,
}

impl DatabaseManager {
    pub async fn new(config: &MongoDbConfig) -> Result<Self> {
        let client_options = ClientOptions::parse(&config.uri).await?;
        let client = Client::with_options(client_options)?;
        let db = client.database(&config.database);

        let manager = Self { client, db };
        manager.create_indexes().await?;

        Ok(manager)
    }

    async fn create_indexes(&self) -> Result<()> {
        let deposits = self.deposits();
        deposits
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "owner": 1, "created_at": -1 })
                    .build(),
                None,
            )
            .await?;

        deposits
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "mint": 1 })
                    .options(IndexOptions::builder().unique(false).build())
                    .build(),
                None,
            )
            .await?;

        let stats: Collection<DepositStats> = self.db.collection(DEPOSIT_STATS);
        stats
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "owner": 1, "timestamp": -1 })
                    .build(),
                None,
            )
            .await?;

        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }

    fn deposits(&self) -> Collection<DepositDocument> {
        self.db.collection(DEPOSITS)
    }

    // ============ Deposit Operations ============

    pub async fn upsert_deposit(&self, deposit: &DepositDocument) -> Result<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.deposits()
            .replace_one(doc! { "_id": &deposit.id }, deposit, options)
            .await?;
        Ok(())
    }

    pub async fn get_deposit(&self, deposit_pubkey: &str) -> Result<Option<DepositDocument>> {
        let deposit = self
            .deposits()
            .find_one(doc! { "_id": deposit_pubkey }, None)
            .await?;
        Ok(deposit)
    }

    /// Newest first
    pub async fn get_deposits_by_owner(&self, owner_pubkey: &str) -> Result<Vec<DepositDocument>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let cursor = self
            .deposits()
            .find(doc! { "owner": owner_pubkey }, options)
            .await?;
        let deposits: Vec<DepositDocument> = cursor.try_collect().await?;
        Ok(deposits)
    }

    pub async fn get_all_deposits(&self) -> Result<Vec<DepositDocument>> {
        let cursor = self.deposits().find(None, None).await?;
        let deposits: Vec<DepositDocument> = cursor.try_collect().await?;
        Ok(deposits)
    }

    pub async fn mark_deposit_closed(&self, deposit_pubkey: &str) -> Result<()> {
        self.deposits()
            .update_one(
                doc! { "_id": deposit_pubkey },
                doc! {
                    "$set": {
                        "status": bson::to_bson(&DepositStatus::Closed)?,
                        "amount": "0",
                        "last_synced": bson::DateTime::from_chrono(Utc::now()),
                    }
                },
                None,
            )
            .await?;
        Ok(())
    }

    // ============ Stats Operations ============

    pub async fn insert_stats(&self, stats: DepositStats) -> Result<()> {
        let collection: Collection<DepositStats> = self.db.collection(DEPOSIT_STATS);
        collection.insert_one(stats, None).await?;
        Ok(())
    }
}
