use anchor_lang::prelude::*;
use anchor_spl::token::{self, CloseAccount, Mint, Token, TokenAccount, Transfer};

pub mod errors;
pub mod events;
pub mod pda;
pub mod state;

pub use errors::*;
pub use events::*;
pub use pda::{DEPOSIT_SEED, VAULT_SEED};
pub use state::*;

declare_id!("QN5rQa2SLvLTzcF2ocBYhtjHUwJi6hkWxKbyCAbg92D");

#[program]
pub mod timelock_wallet {
    use super::*;

    /// Lock tokens until `unlock_timestamp`
    pub fn initialize_deposit(
        ctx: Context<InitializeDeposit>,
        amount: u64,
        unlock_timestamp: i64,
    ) -> Result<()> {
        let clock = Clock::get()?;
        let lock_condition = LockCondition::by_time(amount, unlock_timestamp, clock.unix_timestamp)?;

        ctx.accounts.deposit.set_inner(DepositRecord::open(
            ctx.accounts.owner.key(),
            ctx.accounts.mint.key(),
            ctx.accounts.vault_token_account.key(),
            amount,
            lock_condition,
            clock.unix_timestamp,
            ctx.bumps.deposit,
        ));

        fund_vault(
            &ctx.accounts.token_program,
            &ctx.accounts.owner_token_account,
            &ctx.accounts.vault_token_account,
            &ctx.accounts.owner,
            amount,
        )?;

        emit!(DepositCreated {
            owner: ctx.accounts.owner.key(),
            amount,
            unlock_timestamp,
            asset: ctx.accounts.mint.key(),
        });

        msg!("Deposit of {} locked until {}", amount, unlock_timestamp);
        Ok(())
    }

    /// Lock tokens until the deposit balance reaches `unlock_amount`
    pub fn initialize_deposit_by_amount(
        ctx: Context<InitializeDepositByAmount>,
        amount: u64,
        unlock_amount: u64,
    ) -> Result<()> {
        let clock = Clock::get()?;
        let lock_condition = LockCondition::by_amount(amount, unlock_amount)?;

        ctx.accounts.deposit.set_inner(DepositRecord::open(
            ctx.accounts.owner.key(),
            ctx.accounts.mint.key(),
            ctx.accounts.vault_token_account.key(),
            amount,
            lock_condition,
            clock.unix_timestamp,
            ctx.bumps.deposit,
        ));

        fund_vault(
            &ctx.accounts.token_program,
            &ctx.accounts.owner_token_account,
            &ctx.accounts.vault_token_account,
            &ctx.accounts.owner,
            amount,
        )?;

        emit!(DepositCreatedByAmount {
            owner: ctx.accounts.owner.key(),
            amount,
            unlock_amount,
            asset: ctx.accounts.mint.key(),
        });

        msg!("Deposit of {} locked until balance reaches {}", amount, unlock_amount);
        Ok(())
    }

    /// Top up an active deposit. The unlock condition is not evaluated here.
    pub fn add_funds(ctx: Context<AddFunds>, additional_amount: u64) -> Result<()> {
        let owner = ctx.accounts.owner.key();
        let new_total_amount = ctx.accounts.deposit.credit(&owner, additional_amount)?;

        fund_vault(
            &ctx.accounts.token_program,
            &ctx.accounts.owner_token_account,
            &ctx.accounts.vault_token_account,
            &ctx.accounts.owner,
            additional_amount,
        )?;

        emit!(DepositFundsAdded {
            owner,
            deposit: ctx.accounts.deposit.key(),
            additional_amount,
            new_total_amount,
        });

        msg!("Added {} tokens, deposit now holds {}", additional_amount, new_total_amount);
        Ok(())
    }

    /// Release the whole deposit back to its owner once the condition holds
    pub fn withdraw(ctx: Context<Withdraw>) -> Result<()> {
        let clock = Clock::get()?;
        let owner = ctx.accounts.owner.key();

        let deposit = &mut ctx.accounts.deposit;
        let amount = deposit.release(&owner, clock.unix_timestamp)?;

        let owner_key = deposit.owner;
        let lock_seed = deposit.lock_seed;
        let bump = [deposit.bump];
        let signer_seeds: &[&[&[u8]]] = &[&[DEPOSIT_SEED, owner_key.as_ref(), &lock_seed, &bump]];

        token::transfer(
            CpiContext::new_with_signer(
                ctx.accounts.token_program.to_account_info(),
                Transfer {
                    from: ctx.accounts.vault_token_account.to_account_info(),
                    to: ctx.accounts.owner_token_account.to_account_info(),
                    authority: deposit.to_account_info(),
                },
                signer_seeds,
            ),
            amount,
        )?;

        emit!(DepositWithdrawn {
            owner: owner_key,
            amount,
            asset: deposit.mint,
            time: clock.unix_timestamp,
        });

        msg!("Withdrawn {} tokens from deposit {}", amount, deposit.key());
        Ok(())
    }

    /// Reclaim rent from a withdrawn deposit. Anything still sitting in the
    /// vault goes back to the owner before the vault is closed.
    pub fn close_deposit(ctx: Context<CloseDeposit>) -> Result<()> {
        let clock = Clock::get()?;
        let owner = ctx.accounts.owner.key();

        let deposit = &ctx.accounts.deposit;
        deposit.ensure_closable(&owner)?;

        let lock_seed = deposit.lock_seed;
        let bump = [deposit.bump];
        let signer_seeds: &[&[&[u8]]] = &[&[DEPOSIT_SEED, owner.as_ref(), &lock_seed, &bump]];

        let residual_amount = ctx.accounts.vault_token_account.amount;
        if residual_amount > 0 {
            token::transfer(
                CpiContext::new_with_signer(
                    ctx.accounts.token_program.to_account_info(),
                    Transfer {
                        from: ctx.accounts.vault_token_account.to_account_info(),
                        to: ctx.accounts.owner_token_account.to_account_info(),
                        authority: deposit.to_account_info(),
                    },
                    signer_seeds,
                ),
                residual_amount,
            )?;
            msg!("Returned {} stray tokens from vault", residual_amount);
        }

        token::close_account(CpiContext::new_with_signer(
            ctx.accounts.token_program.to_account_info(),
            CloseAccount {
                account: ctx.accounts.vault_token_account.to_account_info(),
                destination: ctx.accounts.owner.to_account_info(),
                authority: deposit.to_account_info(),
            },
            signer_seeds,
        ))?;

        emit!(DepositClosed {
            owner,
            deposit: deposit.key(),
            residual_amount,
            time: clock.unix_timestamp,
        });

        msg!("Deposit {} closed", deposit.key());
        Ok(())
    }
}

fn fund_vault<'info>(
    token_program: &Program<'info, Token>,
    from: &Account<'info, TokenAccount>,
    vault: &Account<'info, TokenAccount>,
    owner: &Signer<'info>,
    amount: u64,
) -> Result<()> {
    token::transfer(
        CpiContext::new(
            token_program.to_account_info(),
            Transfer {
                from: from.to_account_info(),
                to: vault.to_account_info(),
                authority: owner.to_account_info(),
            },
        ),
        amount,
    )
}

// ============ Account Validation Contexts ============

#[derive(Accounts)]
#[instruction(amount: u64, unlock_timestamp: i64)]
pub struct InitializeDeposit<'info> {
    #[account(mut)]
    pub owner: Signer<'info>,

    #[account(
        init,
        payer = owner,
        space = DepositRecord::LEN,
        seeds = [DEPOSIT_SEED, owner.key().as_ref(), &unlock_timestamp.to_le_bytes()],
        bump
    )]
    pub deposit: Account<'info, DepositRecord>,

    pub mint: Account<'info, Mint>,

    #[account(
        mut,
        constraint = owner_token_account.owner == owner.key() @ TimelockError::VaultMismatch,
        constraint = owner_token_account.mint == mint.key() @ TimelockError::VaultMismatch
    )]
    pub owner_token_account: Account<'info, TokenAccount>,

    #[account(
        init,
        payer = owner,
        token::mint = mint,
        token::authority = deposit,
        seeds = [VAULT_SEED, deposit.key().as_ref()],
        bump
    )]
    pub vault_token_account: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
#[instruction(amount: u64, unlock_amount: u64)]
pub struct InitializeDepositByAmount<'info> {
    #[account(mut)]
    pub owner: Signer<'info>,

    #[account(
        init,
        payer = owner,
        space = DepositRecord::LEN,
        seeds = [DEPOSIT_SEED, owner.key().as_ref(), &unlock_amount.to_le_bytes()],
        bump
    )]
    pub deposit: Account<'info, DepositRecord>,

    pub mint: Account<'info, Mint>,

    #[account(
        mut,
        constraint = owner_token_account.owner == owner.key() @ TimelockError::VaultMismatch,
        constraint = owner_token_account.mint == mint.key() @ TimelockError::VaultMismatch
    )]
    pub owner_token_account: Account<'info, TokenAccount>,

    #[account(
        init,
        payer = owner,
        token::mint = mint,
        token::authority = deposit,
        seeds = [VAULT_SEED, deposit.key().as_ref()],
        bump
    )]
    pub vault_token_account: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct AddFunds<'info> {
    #[account(mut)]
    pub owner: Signer<'info>,

    #[account(
        mut,
        seeds = [DEPOSIT_SEED, deposit.owner.as_ref(), &deposit.lock_seed],
        bump = deposit.bump
    )]
    pub deposit: Account<'info, DepositRecord>,

    #[account(address = deposit.mint @ TimelockError::VaultMismatch)]
    pub mint: Account<'info, Mint>,

    #[account(
        mut,
        constraint = owner_token_account.owner == owner.key() @ TimelockError::VaultMismatch,
        constraint = owner_token_account.mint == mint.key() @ TimelockError::VaultMismatch
    )]
    pub owner_token_account: Account<'info, TokenAccount>,

    #[account(
        mut,
        address = deposit.vault_address @ TimelockError::VaultMismatch
    )]
    pub vault_token_account: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct Withdraw<'info> {
    #[account(mut)]
    pub owner: Signer<'info>,

    #[account(
        mut,
        seeds = [DEPOSIT_SEED, deposit.owner.as_ref(), &deposit.lock_seed],
        bump = deposit.bump
    )]
    pub deposit: Account<'info, DepositRecord>,

    #[account(
        mut,
        address = deposit.vault_address @ TimelockError::VaultMismatch,
        constraint = vault_token_account.amount >= deposit.amount @ TimelockError::VaultMismatch
    )]
    pub vault_token_account: Account<'info, TokenAccount>,

    #[account(
        mut,
        constraint = owner_token_account.owner == owner.key() @ TimelockError::VaultMismatch,
        constraint = owner_token_account.mint == deposit.mint @ TimelockError::VaultMismatch
    )]
    pub owner_token_account: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct CloseDeposit<'info> {
    #[account(mut)]
    pub owner: Signer<'info>,

    #[account(
        mut,
        close = owner,
        seeds = [DEPOSIT_SEED, deposit.owner.as_ref(), &deposit.lock_seed],
        bump = deposit.bump
    )]
    pub deposit: Account<'info, DepositRecord>,

    #[account(
        mut,
        address = deposit.vault_address @ TimelockError::VaultMismatch
    )]
    pub vault_token_account: Account<'info, TokenAccount>,

    #[account(
        mut,
        constraint = owner_token_account.owner == owner.key() @ TimelockError::VaultMismatch,
        constraint = owner_token_account.mint == deposit.mint @ TimelockError::VaultMismatch
    )]
    pub owner_token_account: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
}
