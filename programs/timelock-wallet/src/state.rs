use anchor_lang::prelude::*;

use crate::errors::TimelockError;

/// Escrow record for a single deposit (PDA, seeds = [b"deposit", owner, lock_seed])
#[account]
#[derive(Debug, PartialEq, Eq)]
pub struct DepositRecord {
    /// Only signer allowed to top up, withdraw or close
    pub owner: Pubkey,

    /// SPL mint held in the vault
    pub mint: Pubkey,

    /// Vault token account (PDA, seeds = [b"vault", deposit])
    pub vault_address: Pubkey,

    /// Tokens currently held in custody, mirrors the vault balance
    pub amount: u64,

    /// Unlock predicate, fixed at creation
    pub lock_condition: LockCondition,

    /// Little-endian bytes of the unlock value used in the address seeds
    pub lock_seed: [u8; 8],

    pub state: DepositState,

    /// Creation time (unix seconds)
    pub created_at: i64,

    /// PDA bump seed
    pub bump: u8,
}

impl DepositRecord {
    pub const LEN: usize = 8 + // discriminator
        32 + // owner
        32 + // mint
        32 + // vault_address
        8 +  // amount
        LockCondition::LEN + // lock_condition
        8 +  // lock_seed
        1 +  // state
        8 +  // created_at
        1;   // bump

    /// Byte offset of `owner` in the serialized account, used for memcmp filters.
    pub const OWNER_OFFSET: usize = 8;

    pub fn open(
        owner: Pubkey,
        mint: Pubkey,
        vault_address: Pubkey,
        amount: u64,
        lock_condition: LockCondition,
        now: i64,
        bump: u8,
    ) -> Self {
        Self {
            owner,
            mint,
            vault_address,
            amount,
            lock_seed: lock_condition.seed(),
            lock_condition,
            state: DepositState::Active,
            created_at: now,
            bump,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == DepositState::Active
    }

    /// Evaluated fresh on every call: time moves and `amount` grows between attempts.
    pub fn condition_met(&self, now: i64) -> bool {
        self.lock_condition.is_met(self.amount, now)
    }

    /// Adds `additional` to the custodied amount and returns the new total.
    /// Leaves the record untouched on any error.
    pub fn credit(
        &mut self,
        signer: &Pubkey,
        additional: u64,
    ) -> std::result::Result<u64, TimelockError> {
        if additional == 0 {
            return Err(TimelockError::InvalidAmount);
        }
        if !self.is_active() {
            return Err(TimelockError::NotActive);
        }
        if self.owner != *signer {
            return Err(TimelockError::Unauthorized);
        }

        self.amount = self
            .amount
            .checked_add(additional)
            .ok_or(TimelockError::Overflow)?;
        Ok(self.amount)
    }

    /// Moves the record to `Withdrawn` and returns the amount to pay out.
    /// Checks run in order: state, owner, unlock condition.
    pub fn release(
        &mut self,
        signer: &Pubkey,
        now: i64,
    ) -> std::result::Result<u64, TimelockError> {
        if !self.is_active() {
            return Err(TimelockError::NotActive);
        }
        if self.owner != *signer {
            return Err(TimelockError::Unauthorized);
        }
        if !self.condition_met(now) {
            return Err(TimelockError::ConditionsNotMet);
        }

        let amount = self.amount;
        self.amount = 0;
        self.state = DepositState::Withdrawn;
        Ok(amount)
    }

    pub fn ensure_closable(&self, signer: &Pubkey) -> std::result::Result<(), TimelockError> {
        if self.owner != *signer {
            return Err(TimelockError::Unauthorized);
        }
        if self.is_active() {
            return Err(TimelockError::StillActive);
        }
        Ok(())
    }
}

/// Unlock predicate. Exactly one kind per deposit.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockCondition {
    ByTime { unlock_timestamp: i64 },
    ByAmount { unlock_amount: u64 },
}

impl LockCondition {
    pub const LEN: usize = 1 + 8; // tag + payload

    /// Time lock for an initial deposit of `amount`, observed at `now`.
    pub fn by_time(
        amount: u64,
        unlock_timestamp: i64,
        now: i64,
    ) -> std::result::Result<Self, TimelockError> {
        if amount == 0 {
            return Err(TimelockError::InvalidAmount);
        }
        if unlock_timestamp <= now {
            return Err(TimelockError::InvalidTimestamp);
        }
        Ok(Self::ByTime { unlock_timestamp })
    }

    /// Amount lock; a target already reached by the initial deposit is rejected.
    pub fn by_amount(amount: u64, unlock_amount: u64) -> std::result::Result<Self, TimelockError> {
        if amount == 0 || unlock_amount <= amount {
            return Err(TimelockError::InvalidAmount);
        }
        Ok(Self::ByAmount { unlock_amount })
    }

    pub fn seed(&self) -> [u8; 8] {
        match *self {
            Self::ByTime { unlock_timestamp } => unlock_timestamp.to_le_bytes(),
            Self::ByAmount { unlock_amount } => unlock_amount.to_le_bytes(),
        }
    }

    pub fn is_met(&self, amount: u64, now: i64) -> bool {
        match *self {
            Self::ByTime { unlock_timestamp } => now >= unlock_timestamp,
            Self::ByAmount { unlock_amount } => amount >= unlock_amount,
        }
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepositState {
    Active,
    Withdrawn,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_lang::Discriminator;

    const NOW: i64 = 1_700_000_000;

    fn record(amount: u64, lock_condition: LockCondition) -> (Pubkey, DepositRecord) {
        let owner = Pubkey::new_unique();
        let record = DepositRecord::open(
            owner,
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            amount,
            lock_condition,
            NOW,
            254,
        );
        (owner, record)
    }

    #[test]
    fn time_lock_rejects_zero_amount_and_past_deadline() {
        assert!(matches!(
            LockCondition::by_time(0, NOW + 10, NOW),
            Err(TimelockError::InvalidAmount)
        ));
        assert!(matches!(
            LockCondition::by_time(5, NOW, NOW),
            Err(TimelockError::InvalidTimestamp)
        ));
        assert!(matches!(
            LockCondition::by_time(5, NOW - 1, NOW),
            Err(TimelockError::InvalidTimestamp)
        ));
        assert_eq!(
            LockCondition::by_time(5, NOW + 1, NOW).unwrap(),
            LockCondition::ByTime { unlock_timestamp: NOW + 1 }
        );
    }

    #[test]
    fn amount_lock_requires_target_above_initial_deposit() {
        assert!(matches!(
            LockCondition::by_amount(0, 10),
            Err(TimelockError::InvalidAmount)
        ));
        assert!(matches!(
            LockCondition::by_amount(10, 0),
            Err(TimelockError::InvalidAmount)
        ));
        assert!(matches!(
            LockCondition::by_amount(10, 10),
            Err(TimelockError::InvalidAmount)
        ));
        assert!(LockCondition::by_amount(10, 11).is_ok());
    }

    #[test]
    fn time_condition_boundary() {
        let condition = LockCondition::ByTime { unlock_timestamp: NOW + 4 };
        assert!(!condition.is_met(u64::MAX, NOW + 3));
        assert!(condition.is_met(0, NOW + 4));
        assert!(condition.is_met(0, NOW + 100));
    }

    #[test]
    fn amount_condition_boundary() {
        let condition = LockCondition::ByAmount { unlock_amount: 1_500 };
        assert!(!condition.is_met(1_499, i64::MAX));
        assert!(condition.is_met(1_500, 0));
        assert!(condition.is_met(1_501, 0));
    }

    #[test]
    fn seed_is_little_endian_unlock_value() {
        let by_time = LockCondition::ByTime { unlock_timestamp: 0x0102 };
        assert_eq!(by_time.seed(), [0x02, 0x01, 0, 0, 0, 0, 0, 0]);

        let by_amount = LockCondition::ByAmount { unlock_amount: u64::MAX };
        assert_eq!(by_amount.seed(), [0xff; 8]);
    }

    #[test]
    fn open_starts_active_with_seed_copied() {
        let condition = LockCondition::ByTime { unlock_timestamp: NOW + 60 };
        let (owner, record) = record(500, condition);

        assert_eq!(record.owner, owner);
        assert_eq!(record.amount, 500);
        assert_eq!(record.state, DepositState::Active);
        assert_eq!(record.created_at, NOW);
        assert_eq!(record.lock_seed, (NOW + 60).to_le_bytes());
    }

    #[test]
    fn credit_accumulates_and_rejects_overflow() {
        let (owner, mut record) = record(100, LockCondition::ByAmount { unlock_amount: 1_000 });

        assert_eq!(record.credit(&owner, 50).unwrap(), 150);
        assert_eq!(record.credit(&owner, 25).unwrap(), 175);
        assert_eq!(record.amount, 175);

        assert!(matches!(
            record.credit(&owner, u64::MAX),
            Err(TimelockError::Overflow)
        ));
        assert_eq!(record.amount, 175);

        assert!(matches!(
            record.credit(&owner, 0),
            Err(TimelockError::InvalidAmount)
        ));
    }

    #[test]
    fn credit_rejects_strangers() {
        let (_, mut record) = record(100, LockCondition::ByTime { unlock_timestamp: NOW + 1 });
        let stranger = Pubkey::new_unique();

        assert!(matches!(
            record.credit(&stranger, 10),
            Err(TimelockError::Unauthorized)
        ));
        assert_eq!(record.amount, 100);
    }

    #[test]
    fn release_checks_state_then_owner_then_condition() {
        let (owner, mut record) = record(100, LockCondition::ByTime { unlock_timestamp: NOW + 10 });
        let stranger = Pubkey::new_unique();

        // stranger is rejected even once the deadline has passed
        assert!(matches!(
            record.release(&stranger, NOW + 10),
            Err(TimelockError::Unauthorized)
        ));
        assert!(matches!(
            record.release(&owner, NOW + 9),
            Err(TimelockError::ConditionsNotMet)
        ));
        assert!(record.is_active());

        assert_eq!(record.release(&owner, NOW + 10).unwrap(), 100);
        assert_eq!(record.amount, 0);
        assert_eq!(record.state, DepositState::Withdrawn);

        assert!(matches!(
            record.release(&owner, NOW + 10),
            Err(TimelockError::NotActive)
        ));
        // state is checked before owner
        assert!(matches!(
            record.release(&stranger, NOW + 10),
            Err(TimelockError::NotActive)
        ));
    }

    #[test]
    fn withdrawn_record_refuses_top_up() {
        let (owner, mut record) = record(10, LockCondition::ByAmount { unlock_amount: 20 });
        record.credit(&owner, 10).unwrap();
        record.release(&owner, NOW).unwrap();

        assert!(matches!(
            record.credit(&owner, 5),
            Err(TimelockError::NotActive)
        ));
        assert_eq!(record.amount, 0);
    }

    #[test]
    fn close_requires_owner_and_withdrawn_state() {
        let (owner, mut record) = record(10, LockCondition::ByTime { unlock_timestamp: NOW });

        assert!(matches!(
            record.ensure_closable(&owner),
            Err(TimelockError::StillActive)
        ));
        record.release(&owner, NOW).unwrap();

        assert!(matches!(
            record.ensure_closable(&Pubkey::new_unique()),
            Err(TimelockError::Unauthorized)
        ));
        assert!(record.ensure_closable(&owner).is_ok());
    }

    #[test]
    fn serialized_layout_matches_wire_format() {
        let (owner, record) = record(700, LockCondition::ByAmount { unlock_amount: 1_500 });

        let mut data = Vec::new();
        record.try_serialize(&mut data).unwrap();

        assert_eq!(data.len(), DepositRecord::LEN);
        assert_eq!(DepositRecord::LEN, 139);
        assert_eq!(&data[..8], &DepositRecord::discriminator()[..]);
        assert_eq!(&data[8..40], owner.as_ref());
        assert_eq!(&data[40..72], record.mint.as_ref());
        assert_eq!(&data[72..104], record.vault_address.as_ref());
        assert_eq!(&data[104..112], &700u64.to_le_bytes());
        // ByAmount tag followed by its payload
        assert_eq!(data[112], 1);
        assert_eq!(&data[113..121], &1_500u64.to_le_bytes());
        assert_eq!(&data[121..129], &1_500u64.to_le_bytes());
        assert_eq!(data[129], 0);
        assert_eq!(&data[130..138], &NOW.to_le_bytes());
        assert_eq!(data[138], 254);

        let decoded = DepositRecord::try_deserialize(&mut data.as_slice()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn withdrawn_state_is_encoded_as_one() {
        let (owner, mut record) = record(1, LockCondition::ByTime { unlock_timestamp: NOW });
        record.release(&owner, NOW).unwrap();

        let mut data = Vec::new();
        record.try_serialize(&mut data).unwrap();

        assert_eq!(data[112], 0);
        assert_eq!(data[129], 1);
    }
}
