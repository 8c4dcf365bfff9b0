use crate::errors::{Result, ServiceError};
use anchor_lang::{InstructionData, ToAccountMetas};
use solana_client::{nonblocking::rpc_client::RpcClient, rpc_config::RpcSimulateTransactionConfig};
use solana_sdk::{
    hash::Hash, instruction::Instruction, message::Message, pubkey::Pubkey, system_program,
    transaction::Transaction,
};
use spl_associated_token_account::get_associated_token_address;
use std::sync::Arc;
use timelock_wallet::{pda, DepositRecord, LockCondition};

/// Builds program instructions and unsigned messages for wallets to sign
pub struct TransactionBuilder {
    rpc_client: Arc<RpcClient>,
    program_id: Pubkey,
}

/// An unsigned message ready to be signed by the deposit owner
pub struct PreparedMessage {
    pub message: String,
    pub recent_blockhash: Hash,
}

impl TransactionBuilder {
    pub fn new(rpc_client: Arc<RpcClient>, program_id: Pubkey) -> Self {
        Self {
            rpc_client,
            program_id,
        }
    }

    /// Returns the new deposit address alongside the instruction.
    pub fn initialize_deposit(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
        amount: u64,
        unlock_timestamp: i64,
    ) -> (Pubkey, Instruction) {
        let lock_condition = LockCondition::ByTime { unlock_timestamp };
        let (deposit, vault) = self.derive(owner, &lock_condition);

        let accounts = timelock_wallet::accounts::InitializeDeposit {
            owner: *owner,
            deposit,
            mint: *mint,
            owner_token_account: get_associated_token_address(owner, mint),
            vault_token_account: vault,
            token_program: spl_token::id(),
            system_program: system_program::id(),
        };
        let data = timelock_wallet::instruction::InitializeDeposit {
            amount,
            unlock_timestamp,
        };

        (deposit, self.instruction(accounts.to_account_metas(None), data.data()))
    }

    pub fn initialize_deposit_by_amount(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
        amount: u64,
        unlock_amount: u64,
    ) -> (Pubkey, Instruction) {
        let lock_condition = LockCondition::ByAmount { unlock_amount };
        let (deposit, vault) = self.derive(owner, &lock_condition);

        let accounts = timelock_wallet::accounts::InitializeDepositByAmount {
            owner: *owner,
            deposit,
            mint: *mint,
            owner_token_account: get_associated_token_address(owner, mint),
            vault_token_account: vault,
            token_program: spl_token::id(),
            system_program: system_program::id(),
        };
        let data = timelock_wallet::instruction::InitializeDepositByAmount {
            amount,
            unlock_amount,
        };

        (deposit, self.instruction(accounts.to_account_metas(None), data.data()))
    }

    pub fn add_funds(
        &self,
        owner: &Pubkey,
        deposit: &Pubkey,
        record: &DepositRecord,
        additional_amount: u64,
    ) -> Instruction {
        let accounts = timelock_wallet::accounts::AddFunds {
            owner: *owner,
            deposit: *deposit,
            mint: record.mint,
            owner_token_account: get_associated_token_address(owner, &record.mint),
            vault_token_account: record.vault_address,
            token_program: spl_token::id(),
        };
        let data = timelock_wallet::instruction::AddFunds { additional_amount };

        self.instruction(accounts.to_account_metas(None), data.data())
    }

    pub fn withdraw(&self, owner: &Pubkey, deposit: &Pubkey, record: &DepositRecord) -> Instruction {
        let accounts = timelock_wallet::accounts::Withdraw {
            owner: *owner,
            deposit: *deposit,
            vault_token_account: record.vault_address,
            owner_token_account: get_associated_token_address(owner, &record.mint),
            token_program: spl_token::id(),
        };

        self.instruction(
            accounts.to_account_metas(None),
            timelock_wallet::instruction::Withdraw {}.data(),
        )
    }

    pub fn close_deposit(&self, owner: &Pubkey, deposit: &Pubkey, record: &DepositRecord) -> Instruction {
        let accounts = timelock_wallet::accounts::CloseDeposit {
            owner: *owner,
            deposit: *deposit,
            vault_token_account: record.vault_address,
            owner_token_account: get_associated_token_address(owner, &record.mint),
            token_program: spl_token::id(),
        };

        self.instruction(
            accounts.to_account_metas(None),
            timelock_wallet::instruction::CloseDeposit {}.data(),
        )
    }

    /// Simulate without signatures, then serialize the message for the payer to sign.
    pub async fn prepare(&self, instructions: &[Instruction], payer: &Pubkey) -> Result<PreparedMessage> {
        let recent_blockhash = self.rpc_client.get_latest_blockhash().await?;
        let message = Message::new_with_blockhash(instructions, Some(payer), &recent_blockhash);

        self.simulate(&message).await?;

        Ok(PreparedMessage {
            message: bs58::encode(message.serialize()).into_string(),
            recent_blockhash,
        })
    }

    async fn simulate(&self, message: &Message) -> Result<()> {
        let transaction = Transaction::new_unsigned(message.clone());
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            ..RpcSimulateTransactionConfig::default()
        };

        let result = self
            .rpc_client
            .simulate_transaction_with_config(&transaction, config)
            .await?;

        if let Some(err) = result.value.err {
            let logs = result.value.logs.unwrap_or_default().join("\n");
            log::debug!("Simulation logs:\n{}", logs);
            return Err(ServiceError::TransactionFailed(format!(
                "Simulation failed: {:?}",
                err
            )));
        }

        log::debug!("Transaction simulation successful");
        Ok(())
    }

    fn derive(&self, owner: &Pubkey, lock_condition: &LockCondition) -> (Pubkey, Pubkey) {
        let (deposit, _) = pda::find_deposit_address_for(owner, lock_condition, &self.program_id);
        let (vault, _) = pda::find_vault_address(&deposit, &self.program_id);
        (deposit, vault)
    }

    fn instruction(&self, accounts: Vec<solana_sdk::instruction::AccountMeta>, data: Vec<u8>) -> Instruction {
        Instruction {
            program_id: self.program_id,
            accounts,
            data,
        }
    }
}
