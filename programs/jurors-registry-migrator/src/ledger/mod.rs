//! Stake ledgers the coordinator moves value between
//!
//! The coordinator only talks to a registry through [`StakeLedger`]. The
//! [`JurorsRegistry`] here is the reference ledger the program keeps in
//! account data, one header account plus one [`JurorEntry`] per juror;
//! [`TokenLedger`] holds token custody for registries, the coordinator escrow
//! and jurors, one [`TokenBalance`] per holder.

pub mod checkpoints;
pub mod jurors_registry;
pub mod token;

pub use checkpoints::*;
pub use jurors_registry::*;
pub use token::*;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::{error::MigratorError, state::Controller};

/// Balance buckets of a single juror
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JurorBalance {
    pub active: u64,
    pub available: u64,
    pub locked: u64,
    pub pending_deactivation: u64,
}

impl JurorBalance {
    pub fn total(&self) -> Result<u64, ProgramError> {
        self.active
            .checked_add(self.available)
            .and_then(|v| v.checked_add(self.locked))
            .and_then(|v| v.checked_add(self.pending_deactivation))
            .ok_or_else(|| MigratorError::ArithmeticOverflow.into())
    }
}

/// Ledger interface consumed by the migration coordinator
pub trait StakeLedger {
    /// Undo record for one juror's entry plus ledger-wide totals
    type Snapshot;

    /// Address holding this ledger's token custody
    fn custody(&self) -> Pubkey;

    /// Balances with active at its latest scheduled value
    fn balance_of(&self, juror: &Pubkey) -> JurorBalance;

    /// Balances with active as effective at `term`
    fn balance_of_at(&self, juror: &Pubkey, term: u64) -> JurorBalance;

    fn total_active_balance_at(&self, term: u64) -> u64;

    fn total_active_balance_limit(&self) -> u64;

    /// Deduct `amount` from a juror's active balance starting the term after
    /// `term`. Only the controller's dispute-manager module may call this.
    fn collect_active(
        &mut self,
        controller: &Controller,
        caller: &Pubkey,
        juror: &Pubkey,
        amount: u64,
        term: u64,
    ) -> Result<(), ProgramError>;

    /// Pull `amount` tokens from `from` into custody and activate them for
    /// `juror` starting the term after `term`
    fn stake_and_activate_for(
        &mut self,
        tokens: &mut TokenLedger,
        from: &Pubkey,
        juror: &Pubkey,
        amount: u64,
        term: u64,
    ) -> Result<(), ProgramError>;

    /// Sweep the whole custody balance to `recipient`. Funds governor only.
    fn recover_funds(
        &mut self,
        tokens: &mut TokenLedger,
        controller: &Controller,
        caller: &Pubkey,
        recipient: &Pubkey,
    ) -> Result<u64, ProgramError>;

    fn snapshot(&self, juror: &Pubkey) -> Self::Snapshot;

    fn restore(&mut self, snapshot: Self::Snapshot);
}
