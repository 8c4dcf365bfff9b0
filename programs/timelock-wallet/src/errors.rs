use anchor_lang::prelude::*;

#[error_code]
pub enum TimelockError {
    #[msg("Amount must be non-zero and, for amount locks, below the unlock target")]
    InvalidAmount,

    #[msg("Unlock timestamp must be in the future")]
    InvalidTimestamp,

    #[msg("Deposit is not active")]
    NotActive,

    #[msg("Withdrawal conditions not met")]
    ConditionsNotMet,

    #[msg("Only the deposit owner can perform this operation")]
    Unauthorized,

    #[msg("Overflow in deposit amount")]
    Overflow,

    #[msg("Deposit must be withdrawn before it can be closed")]
    StillActive,

    #[msg("Token account does not match the deposit")]
    VaultMismatch,
}
