use crate::analytics;
use crate::deposit_manager::decode_record;
use crate::models::{ConditionDocument, DepositDocument, DepositStatus, DepositView};
use anchor_lang::AccountSerialize;
use solana_sdk::pubkey::Pubkey;
use timelock_wallet::pda::{find_deposit_address_for, find_vault_address};
use timelock_wallet::{DepositRecord, LockCondition};

fn on_chain_bytes(owner: Pubkey, amount: u64, lock_condition: LockCondition, now: i64) -> (Pubkey, Vec<u8>) {
    let (deposit, bump) = find_deposit_address_for(&owner, &lock_condition, &timelock_wallet::ID);
    let (vault, _) = find_vault_address(&deposit, &timelock_wallet::ID);
    let record = DepositRecord::open(owner, Pubkey::new_unique(), vault, amount, lock_condition, now, bump);

    let mut data = Vec::new();
    record.try_serialize(&mut data).unwrap();
    (deposit, data)
}

#[test]
fn indexed_deposit_follows_the_record_lifecycle() {
    let owner = Pubkey::new_unique();
    let now = 1_700_000_000;
    let lock_condition = LockCondition::by_amount(400_000_000, 1_500_000_000).unwrap();
    let (address, data) = on_chain_bytes(owner, 400_000_000, lock_condition, now);

    let mut record = decode_record(&data).unwrap();
    let created = DepositDocument::from_record(&address, &record);
    assert_eq!(created.status, DepositStatus::Active);
    assert!(!DepositView::from_document(&created, now).unlockable);

    record.credit(&owner, 1_100_000_000).unwrap();
    let topped_up = DepositDocument::from_record(&address, &record);
    assert!(created.differs_from(&topped_up));
    assert!(DepositView::from_document(&topped_up, now).unlockable);

    record.release(&owner, now).unwrap();
    let withdrawn = DepositDocument::from_record(&address, &record);
    assert_eq!(withdrawn.status, DepositStatus::Withdrawn);
    assert_eq!(withdrawn.amount, 0);
    assert!(!DepositView::from_document(&withdrawn, now).unlockable);
}

#[test]
fn analytics_over_decoded_records() {
    let owner = Pubkey::new_unique();
    let now = 1_700_000_000;

    let docs: Vec<DepositDocument> = [
        (500_000_000, LockCondition::ByTime { unlock_timestamp: now + 4 }),
        (700, LockCondition::ByTime { unlock_timestamp: now + 100 }),
        (400, LockCondition::ByAmount { unlock_amount: 1_500 }),
    ]
    .into_iter()
    .map(|(amount, condition)| {
        let (address, data) = on_chain_bytes(owner, amount, condition, now);
        DepositDocument::from_record(&address, &decode_record(&data).unwrap())
    })
    .collect();

    assert_eq!(
        docs[2].condition,
        ConditionDocument::ByAmount { unlock_amount: 1_500 }
    );

    let stats = analytics::compute(&docs);
    assert_eq!(stats.total_locked, 500_001_100);
    assert_eq!(stats.active_count, 3);
    assert_eq!(stats.locked_by_mint.len(), 3);
    assert_eq!(stats.average_lock_secs, 52.0);
}
