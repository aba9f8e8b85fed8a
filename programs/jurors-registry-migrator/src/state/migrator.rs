use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    constants::MIGRATOR_DISCRIMINATOR,
    error::MigratorError,
    events::DisputeCreated,
    ledger::TokenLedger,
    state::{AccountState, Arbitrator, Controller},
};

/// Coordinator lifecycle
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    /// Deployed, old registry funds not yet recovered into escrow
    AwaitingFunds,
    /// Escrow funded, migrations accepted
    Open,
    /// Residual escrow returned to the old registry
    Closed,
}

/// Migration coordinator account
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct MigratorState {
    /// Account discriminator
    pub discriminator: [u8; 8],

    /// Is initialized flag
    pub is_initialized: bool,

    /// Coordinator account key, also its escrow custody address
    pub address: Pubkey,

    /// Controller whose dispute-manager slot the coordinator occupies
    pub controller: Pubkey,

    /// Registry stake is migrated out of
    pub old_registry: Pubkey,

    /// Registry stake is migrated into
    pub new_registry: Pubkey,

    /// Token ledger both registries keep custody in
    pub token_ledger: Pubkey,

    /// Only principal allowed to close the migration
    pub funds_governor: Pubkey,

    pub phase: MigrationPhase,

    /// Escrow recorded when funds were recovered from the old registry
    pub total_swept: u64,

    /// Escrow released to the new registry so far
    pub total_migrated: u64,

    /// Escrow returned to the old registry on close
    pub total_returned: u64,

    pub jurors_migrated: u64,
}

impl MigratorState {
    pub const LEN: usize = 8 + // discriminator
        1 + // is_initialized
        32 + // address
        32 + // controller
        32 + // old_registry
        32 + // new_registry
        32 + // token_ledger
        32 + // funds_governor
        1 + // phase
        8 + // total_swept
        8 + // total_migrated
        8 + // total_returned
        8; // jurors_migrated

    /// Both registry references, the token ledger and the funds governor are
    /// fixed here for the lifetime of the coordinator
    pub fn new(
        address: Pubkey,
        controller: &Controller,
        old_registry: Pubkey,
        new_registry: Pubkey,
        token_ledger: Pubkey,
    ) -> Result<Self, ProgramError> {
        if old_registry == new_registry {
            return Err(MigratorError::AccountMismatch.into());
        }

        Ok(Self {
            discriminator: MIGRATOR_DISCRIMINATOR,
            is_initialized: true,
            address,
            controller: controller.address,
            old_registry,
            new_registry,
            token_ledger,
            funds_governor: controller.funds_governor(),
            phase: MigrationPhase::AwaitingFunds,
            total_swept: 0,
            total_migrated: 0,
            total_returned: 0,
            jurors_migrated: 0,
        })
    }

    pub fn is_open(&self) -> bool {
        self.phase == MigrationPhase::Open
    }

    /// Escrow the coordinator should be holding: swept minus migrated minus returned
    pub fn accounted_escrow(&self) -> Result<u64, ProgramError> {
        self.total_swept
            .checked_sub(self.total_migrated)
            .and_then(|v| v.checked_sub(self.total_returned))
            .ok_or_else(|| MigratorError::EscrowMismatch.into())
    }

    /// Check custody against the counters
    pub fn verify_escrow(&self, tokens: &TokenLedger) -> Result<u64, ProgramError> {
        let accounted = self.accounted_escrow()?;
        let held = tokens.balance_of(&self.address);
        if held != accounted {
            msg!("Escrow mismatch: holding {}, accounted {}", held, accounted);
            return Err(MigratorError::EscrowMismatch.into());
        }
        Ok(held)
    }
}

/// While registered as the dispute manager the coordinator refuses every
/// dispute, since juror stake is being rewritten underneath it
impl Arbitrator for MigratorState {
    fn create_dispute(
        &mut self,
        _subject: &Pubkey,
        _possible_rulings: u8,
        _term: u64,
    ) -> Result<DisputeCreated, ProgramError> {
        msg!("Dispute creation blocked: migration in progress");
        Err(MigratorError::MigrationInProgress.into())
    }
}

impl AccountState for MigratorState {
    fn validate(&self) -> Result<(), ProgramError> {
        if self.discriminator != MIGRATOR_DISCRIMINATOR {
            return Err(MigratorError::InvalidDiscriminator.into());
        }
        if !self.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }
        Ok(())
    }
}

/// Where a juror stands with respect to the old registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStatus {
    /// Active stake the coordinator can still move
    Eligible { amount: u64 },
    /// Nothing active, but stake the owner has to move by hand
    ManualOnly {
        available: u64,
        pending_deactivation: u64,
        locked: u64,
    },
    /// Nothing left in the old registry
    Settled,
}
