use anchor_lang::prelude::*;

#[event]
pub struct DepositCreated {
    pub owner: Pubkey,
    pub amount: u64,
    pub unlock_timestamp: i64,
    pub asset: Pubkey,
}

#[event]
pub struct DepositCreatedByAmount {
    pub owner: Pubkey,
    pub amount: u64,
    pub unlock_amount: u64,
    pub asset: Pubkey,
}

#[event]
pub struct DepositFundsAdded {
    pub owner: Pubkey,
    pub deposit: Pubkey,
    pub additional_amount: u64,
    pub new_total_amount: u64,
}

#[event]
pub struct DepositWithdrawn {
    pub owner: Pubkey,
    pub amount: u64,
    pub asset: Pubkey,
    pub time: i64,
}

#[event]
pub struct DepositClosed {
    pub owner: Pubkey,
    pub deposit: Pubkey,
    /// Tokens found in the vault at close and returned to the owner
    pub residual_amount: u64,
    pub time: i64,
}
