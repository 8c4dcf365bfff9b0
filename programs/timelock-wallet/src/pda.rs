//! Address derivation for deposit records and their vaults.
//!
//! Record: `["deposit", owner, unlock_value_le]`. Vault: `["vault", record]`.
//! Both are off-curve program addresses, so no private key can sign for them.

use solana_program::pubkey::Pubkey;

use crate::state::LockCondition;

pub const DEPOSIT_SEED: &[u8] = b"deposit";
pub const VAULT_SEED: &[u8] = b"vault";

pub fn find_deposit_address(owner: &Pubkey, lock_seed: &[u8; 8], program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[DEPOSIT_SEED, owner.as_ref(), lock_seed], program_id)
}

pub fn find_deposit_address_for(
    owner: &Pubkey,
    lock_condition: &LockCondition,
    program_id: &Pubkey,
) -> (Pubkey, u8) {
    find_deposit_address(owner, &lock_condition.seed(), program_id)
}

pub fn find_vault_address(deposit: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[VAULT_SEED, deposit.as_ref()], program_id)
}
