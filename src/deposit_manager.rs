use crate::config::Config;
use crate::errors::{Result, ServiceError};
use crate::models::*;
use anchor_lang::AccountDeserialize;
use chrono::Utc;
use solana_account_decoder::UiAccountEncoding;
use solana_client::{
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
    rpc_filter::{Memcmp, RpcFilterType},
};
use solana_program::program_pack::Pack;
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::str::FromStr;
use std::sync::Arc;
use timelock_wallet::pda;
use timelock_wallet::DepositRecord;

/// `getMultipleAccounts` accepts at most this many keys per call.
const MAX_MULTIPLE_ACCOUNTS: usize = 100;

/// Read-only access to deposit records and vaults on-chain
pub struct DepositManager {
    rpc_client: Arc<RpcClient>,
    program_id: Pubkey,
    commitment: CommitmentConfig,
}

impl DepositManager {
    pub fn new(config: &Config, rpc_client: Arc<RpcClient>) -> Result<Self> {
        let program_id = Pubkey::from_str(&config.program.program_id)
            .map_err(|e| ServiceError::ConfigError(format!("Invalid program ID: {}", e)))?;

        let commitment = CommitmentConfig::from_str(&config.solana.commitment)
            .map_err(|e| ServiceError::ConfigError(format!("Invalid commitment: {}", e)))?;

        Ok(Self {
            rpc_client,
            program_id,
            commitment,
        })
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn derive_addresses(&self, owner: &str, kind: LockKind, value: &str) -> Result<DerivedAddresses> {
        let owner = Pubkey::from_str(owner)?;
        let lock_seed = parse_lock_seed(kind, value)?;

        let (deposit, deposit_bump) = pda::find_deposit_address(&owner, &lock_seed, &self.program_id);
        let (vault, vault_bump) = pda::find_vault_address(&deposit, &self.program_id);

        Ok(DerivedAddresses {
            deposit: deposit.to_string(),
            deposit_bump,
            vault: vault.to_string(),
            vault_bump,
        })
    }

    /// Fetch a record; a closed or never-created deposit is `DepositNotFound`.
    pub async fn fetch_record(&self, address: &Pubkey) -> Result<DepositRecord> {
        let account = self
            .rpc_client
            .get_account_with_commitment(address, self.commitment)
            .await?
            .value
            .ok_or_else(|| ServiceError::DepositNotFound(address.to_string()))?;

        if account.owner != self.program_id {
            return Err(ServiceError::DepositNotFound(address.to_string()));
        }

        decode_record(&account.data)
    }

    pub async fn get_deposit(&self, address: &Pubkey) -> Result<DepositView> {
        let record = self.fetch_record(address).await?;
        Ok(DepositView::from_record(address, &record, Utc::now().timestamp()))
    }

    /// All records of `owner`, newest first
    pub async fn list_owner_records(&self, owner: &Pubkey) -> Result<Vec<(Pubkey, DepositRecord)>> {
        let mut records = self
            .scan(vec![RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
                DepositRecord::OWNER_OFFSET,
                owner.as_ref(),
            ))])
            .await?;
        records.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at));
        Ok(records)
    }

    pub async fn list_all_records(&self) -> Result<Vec<(Pubkey, DepositRecord)>> {
        self.scan(Vec::new()).await
    }

    async fn scan(&self, mut filters: Vec<RpcFilterType>) -> Result<Vec<(Pubkey, DepositRecord)>> {
        filters.insert(0, RpcFilterType::DataSize(DepositRecord::LEN as u64));

        let config = RpcProgramAccountsConfig {
            filters: Some(filters),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(self.commitment),
                ..RpcAccountInfoConfig::default()
            },
            ..RpcProgramAccountsConfig::default()
        };

        let accounts = self
            .rpc_client
            .get_program_accounts_with_config(&self.program_id, config)
            .await?;

        let mut records = Vec::with_capacity(accounts.len());
        for (address, account) in accounts {
            match decode_record(&account.data) {
                Ok(record) => records.push((address, record)),
                Err(e) => log::warn!("Skipping undecodable account {}: {}", address, e),
            }
        }
        Ok(records)
    }

    /// Token balances of the given vaults; `None` where the account is missing.
    pub async fn vault_balances(&self, vaults: &[Pubkey]) -> Result<Vec<Option<u64>>> {
        let mut balances = Vec::with_capacity(vaults.len());

        for chunk in vaults.chunks(MAX_MULTIPLE_ACCOUNTS) {
            let accounts = self
                .rpc_client
                .get_multiple_accounts_with_commitment(chunk, self.commitment)
                .await?
                .value;

            for account in accounts {
                let balance = match account {
                    Some(account) => Some(token_amount(&account.data)?),
                    None => None,
                };
                balances.push(balance);
            }
        }

        Ok(balances)
    }
}

pub fn decode_record(data: &[u8]) -> Result<DepositRecord> {
    let mut data = data;
    Ok(DepositRecord::try_deserialize(&mut data)?)
}

fn token_amount(data: &[u8]) -> Result<u64> {
    spl_token::state::Account::unpack(data)
        .map(|account| account.amount)
        .map_err(|e| ServiceError::DecodeError(format!("Invalid token account: {}", e)))
}

pub fn parse_lock_seed(kind: LockKind, value: &str) -> Result<[u8; 8]> {
    let invalid = |_| ServiceError::InvalidRequest(format!("Invalid unlock value '{}'", value));
    match kind {
        LockKind::Time => Ok(value.parse::<i64>().map_err(invalid)?.to_le_bytes()),
        LockKind::Amount => Ok(value.parse::<u64>().map_err(invalid)?.to_le_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_lang::AccountSerialize;
    use timelock_wallet::{DepositState, LockCondition};

    fn manager() -> DepositManager {
        let config = Config::from_lookup(|_| None).unwrap();
        let rpc = Arc::new(RpcClient::new(config.solana.rpc_url.clone()));
        DepositManager::new(&config, rpc).unwrap()
    }

    #[test]
    fn decodes_serialized_record() {
        let record = DepositRecord {
            owner: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            vault_address: Pubkey::new_unique(),
            amount: 42,
            lock_condition: LockCondition::ByTime { unlock_timestamp: 99 },
            lock_seed: 99i64.to_le_bytes(),
            state: DepositState::Active,
            created_at: 1,
            bump: 250,
        };
        let mut data = Vec::new();
        record.try_serialize(&mut data).unwrap();

        assert_eq!(decode_record(&data).unwrap(), record);
    }

    #[test]
    fn rejects_foreign_account_data() {
        let err = decode_record(&[7u8; DepositRecord::LEN]).unwrap_err();
        assert!(matches!(err, ServiceError::DecodeError(_)));
    }

    #[test]
    fn lock_seed_parsing() {
        assert_eq!(
            parse_lock_seed(LockKind::Time, "-5").unwrap(),
            (-5i64).to_le_bytes()
        );
        assert_eq!(
            parse_lock_seed(LockKind::Amount, "1500000000").unwrap(),
            1_500_000_000u64.to_le_bytes()
        );
        assert!(matches!(
            parse_lock_seed(LockKind::Amount, "-5"),
            Err(ServiceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn derived_addresses_match_program_derivation() {
        let manager = manager();
        let owner = Pubkey::new_unique();

        let derived = manager
            .derive_addresses(&owner.to_string(), LockKind::Time, "1700000004")
            .unwrap();

        let (deposit, bump) =
            pda::find_deposit_address(&owner, &1_700_000_004i64.to_le_bytes(), &timelock_wallet::ID);
        let (vault, _) = pda::find_vault_address(&deposit, &timelock_wallet::ID);

        assert_eq!(derived.deposit, deposit.to_string());
        assert_eq!(derived.deposit_bump, bump);
        assert_eq!(derived.vault, vault.to_string());
    }

    #[test]
    fn bad_owner_is_rejected() {
        let err = manager()
            .derive_addresses("not-a-key", LockKind::Time, "1")
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidPublicKey(_)));
    }

    #[test]
    fn unparsable_token_account_is_decode_error() {
        assert!(matches!(token_amount(&[0u8; 3]), Err(ServiceError::DecodeError(_))));
    }
}
