//! Migration coordinator
//!
//! Moves each juror's active stake from the old registry into the new one,
//! funding the new registry out of the escrow recovered from the old one.
//! Every migration either lands on both ledgers and the escrow or on none of
//! them: fallible checks run first, and any failure after the first write is
//! undone from snapshots taken before it.

use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    constants::MAX_MIGRATION_BATCH,
    error::MigratorError,
    events::{EscrowFunded, Event, MigrationBatchHalted, MigrationClosed, TokensMigrated},
    ledger::{StakeLedger, TokenLedger, TokenSnapshot},
    state::{Controller, MigrationPhase, MigrationStatus, MigratorState},
};

/// Ledgers a coordinator operation reads and writes
pub struct MigrationContext<'a, L: StakeLedger> {
    pub controller: &'a Controller,
    pub old_registry: &'a mut L,
    pub new_registry: &'a mut L,
    pub tokens: &'a mut TokenLedger,
}

/// Juror that stopped a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchHalt {
    pub index: usize,
    pub juror: Pubkey,
    pub error: ProgramError,
}

/// Result of a batch: jurors migrated in input order, and where it stopped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReceipt {
    pub migrated: Vec<TokensMigrated>,
    pub halted: Option<BatchHalt>,
}

impl BatchReceipt {
    pub fn total_amount(&self) -> u64 {
        self.migrated.iter().map(|event| event.amount).sum()
    }
}

/// State a single migration may touch, saved before its first write
struct Rollback<S> {
    old_registry: S,
    new_registry: S,
    tokens: TokenSnapshot,
}

impl<S> Rollback<S> {
    fn capture<L: StakeLedger<Snapshot = S>>(
        state: &MigratorState,
        ctx: &MigrationContext<'_, L>,
        juror: &Pubkey,
    ) -> Self {
        Self {
            old_registry: ctx.old_registry.snapshot(juror),
            new_registry: ctx.new_registry.snapshot(juror),
            tokens: ctx.tokens.snapshot(&[
                state.address,
                ctx.old_registry.custody(),
                ctx.new_registry.custody(),
            ]),
        }
    }

    fn apply<L: StakeLedger<Snapshot = S>>(self, ctx: &mut MigrationContext<'_, L>) {
        ctx.old_registry.restore(self.old_registry);
        ctx.new_registry.restore(self.new_registry);
        ctx.tokens.restore(self.tokens);
    }
}

pub struct MigrationEngine;

impl MigrationEngine {
    /// Recover the old registry's custody into escrow and open the migration.
    /// Custody recovered out of band before this call is counted too.
    pub fn fund_escrow<L: StakeLedger>(
        state: &mut MigratorState,
        ctx: &mut MigrationContext<'_, L>,
        caller: &Pubkey,
    ) -> Result<EscrowFunded, ProgramError> {
        if state.phase != MigrationPhase::AwaitingFunds {
            return Err(MigratorError::EscrowAlreadyFunded.into());
        }
        Self::ensure_ledgers(state, ctx)?;

        let recovered = ctx
            .old_registry
            .recover_funds(ctx.tokens, ctx.controller, caller, &state.address)?;
        let amount = ctx.tokens.balance_of(&state.address);

        state.total_swept = amount;
        state.phase = MigrationPhase::Open;
        msg!("Escrow funded with {} tokens ({} recovered now)", amount, recovered);

        let event = EscrowFunded { amount };
        event.emit();
        Ok(event)
    }

    /// Move a juror's active stake into the new registry, effective from the
    /// term after the current one
    pub fn migrate_one<L: StakeLedger>(
        state: &mut MigratorState,
        ctx: &mut MigrationContext<'_, L>,
        juror: &Pubkey,
    ) -> Result<TokensMigrated, ProgramError> {
        Self::ensure_open(state)?;
        Self::ensure_ledgers(state, ctx)?;

        let amount = ctx.old_registry.balance_of(juror).active;
        if amount == 0 {
            return Err(MigratorError::NoBalanceToMigrate.into());
        }

        let escrow = ctx.tokens.balance_of(&state.address);
        if escrow < amount {
            msg!("Escrow {} cannot cover {} for juror {}", escrow, amount, juror);
            return Err(MigratorError::InsufficientEscrow.into());
        }

        let total_migrated = state
            .total_migrated
            .checked_add(amount)
            .ok_or(MigratorError::ArithmeticOverflow)?;
        let jurors_migrated = state
            .jurors_migrated
            .checked_add(1)
            .ok_or(MigratorError::ArithmeticOverflow)?;

        let term = ctx.controller.current_term();
        let rollback = Rollback::capture(state, ctx, juror);
        if let Err(err) = Self::move_active_stake(state, ctx, juror, amount, term) {
            msg!("Migration of juror {} aborted: {:?}", juror, err);
            rollback.apply(ctx);
            return Err(err);
        }

        state.total_migrated = total_migrated;
        state.jurors_migrated = jurors_migrated;

        let event = TokensMigrated {
            juror: *juror,
            amount,
        };
        event.emit();
        Ok(event)
    }

    /// Migrate jurors in order, stopping at the first failure. Jurors migrated
    /// before the failure stay migrated.
    pub fn migrate_many<L: StakeLedger>(
        state: &mut MigratorState,
        ctx: &mut MigrationContext<'_, L>,
        jurors: &[Pubkey],
    ) -> Result<BatchReceipt, ProgramError> {
        if jurors.is_empty() {
            return Err(MigratorError::EmptyBatch.into());
        }
        if jurors.len() > MAX_MIGRATION_BATCH {
            return Err(MigratorError::BatchTooLarge.into());
        }

        let mut receipt = BatchReceipt::default();
        for (index, juror) in jurors.iter().enumerate() {
            match Self::migrate_one(state, ctx, juror) {
                Ok(event) => receipt.migrated.push(event),
                Err(error) => {
                    msg!("Batch halted at index {} (juror {})", index, juror);
                    MigrationBatchHalted {
                        juror: *juror,
                        index: index as u16,
                        error_code: u64::from(error.clone()),
                    }
                    .emit();
                    receipt.halted = Some(BatchHalt {
                        index,
                        juror: *juror,
                        error,
                    });
                    break;
                }
            }
        }

        Ok(receipt)
    }

    /// Return the residual escrow to the old registry. Funds governor only.
    pub fn close<L: StakeLedger>(
        state: &mut MigratorState,
        ctx: &mut MigrationContext<'_, L>,
        caller: &Pubkey,
    ) -> Result<MigrationClosed, ProgramError> {
        if *caller != state.funds_governor {
            return Err(MigratorError::Unauthorized.into());
        }
        if state.phase == MigrationPhase::Closed {
            return Err(MigratorError::MigrationClosed.into());
        }
        Self::ensure_ledgers(state, ctx)?;

        let amount = ctx.tokens.balance_of(&state.address);
        let total_returned = state
            .total_returned
            .checked_add(amount)
            .ok_or(MigratorError::ArithmeticOverflow)?;
        ctx.tokens
            .transfer(&state.address, &ctx.old_registry.custody(), amount)?;

        state.total_returned = total_returned;
        state.phase = MigrationPhase::Closed;
        msg!("Migration closed, {} tokens returned to old registry", amount);

        let event = MigrationClosed { amount };
        event.emit();
        Ok(event)
    }

    pub fn escrow_balance(state: &MigratorState, tokens: &TokenLedger) -> u64 {
        tokens.balance_of(&state.address)
    }

    /// Migration standing of a juror, read from the old registry alone
    pub fn migration_status<L: StakeLedger>(old_registry: &L, juror: &Pubkey) -> MigrationStatus {
        let balance = old_registry.balance_of(juror);
        if balance.active > 0 {
            MigrationStatus::Eligible {
                amount: balance.active,
            }
        } else if balance.available > 0 || balance.pending_deactivation > 0 || balance.locked > 0 {
            MigrationStatus::ManualOnly {
                available: balance.available,
                pending_deactivation: balance.pending_deactivation,
                locked: balance.locked,
            }
        } else {
            MigrationStatus::Settled
        }
    }

    fn move_active_stake<L: StakeLedger>(
        state: &MigratorState,
        ctx: &mut MigrationContext<'_, L>,
        juror: &Pubkey,
        amount: u64,
        term: u64,
    ) -> Result<(), ProgramError> {
        ctx.old_registry
            .collect_active(ctx.controller, &state.address, juror, amount, term)?;
        ctx.new_registry
            .stake_and_activate_for(ctx.tokens, &state.address, juror, amount, term)
    }

    fn ensure_open(state: &MigratorState) -> Result<(), ProgramError> {
        match state.phase {
            MigrationPhase::Open => Ok(()),
            MigrationPhase::AwaitingFunds => Err(MigratorError::EscrowNotFunded.into()),
            MigrationPhase::Closed => Err(MigratorError::MigrationClosed.into()),
        }
    }

    fn ensure_ledgers<L: StakeLedger>(
        state: &MigratorState,
        ctx: &MigrationContext<'_, L>,
    ) -> Result<(), ProgramError> {
        if ctx.controller.address != state.controller
            || ctx.old_registry.custody() != state.old_registry
            || ctx.new_registry.custody() != state.new_registry
            || ctx.tokens.address != state.token_ledger
        {
            return Err(MigratorError::AccountMismatch.into());
        }
        Ok(())
    }
}
