use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    constants::CONTROLLER_DISCRIMINATOR,
    error::MigratorError,
    events::{Event, ModuleSet},
    state::AccountState,
};

/// Slots in the controller's module registry
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModuleId {
    DisputeManager,
    JurorsRegistry,
}

/// Principals allowed to administer the court
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Governors {
    /// Moves custodied funds
    pub funds: Pubkey,
    /// Changes court parameters
    pub config: Pubkey,
    /// Repoints module slots
    pub modules: Pubkey,
}

/// Court controller: term clock and module registration point
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Controller {
    pub discriminator: [u8; 8],
    pub is_initialized: bool,
    pub address: Pubkey,
    pub governors: Governors,
    pub current_term: u64,
    modules: BTreeMap<ModuleId, Pubkey>,
}

impl Controller {
    pub const LEN: usize = 8 + // discriminator
        1 + // is_initialized
        32 + // address
        96 + // governors
        8 + // current_term
        4 + 2 * (1 + 32); // modules, one entry per slot

    pub fn new(address: Pubkey, governors: Governors) -> Self {
        Self {
            discriminator: CONTROLLER_DISCRIMINATOR,
            is_initialized: true,
            address,
            governors,
            current_term: 0,
            modules: BTreeMap::new(),
        }
    }

    pub fn current_term(&self) -> u64 {
        self.current_term
    }

    /// Move the clock forward
    pub fn advance_terms(&mut self, terms: u64) -> Result<u64, ProgramError> {
        self.current_term = self
            .current_term
            .checked_add(terms)
            .ok_or(MigratorError::ArithmeticOverflow)?;
        Ok(self.current_term)
    }

    /// Advance the clock on behalf of the config governor
    pub fn heartbeat(&mut self, caller: &Pubkey, terms: u64) -> Result<u64, ProgramError> {
        if *caller != self.governors.config {
            return Err(MigratorError::SenderNotConfigGovernor.into());
        }
        if terms == 0 {
            return Err(MigratorError::InvalidZeroAmount.into());
        }

        let term = self.advance_terms(terms)?;
        msg!("Term advanced to {}", term);
        Ok(term)
    }

    pub fn funds_governor(&self) -> Pubkey {
        self.governors.funds
    }

    pub fn module(&self, id: ModuleId) -> Option<Pubkey> {
        self.modules.get(&id).copied()
    }

    /// Module currently serving dispute creation
    pub fn dispute_manager(&self) -> Result<Pubkey, ProgramError> {
        self.module(ModuleId::DisputeManager)
            .ok_or_else(|| MigratorError::ModuleNotSet.into())
    }

    pub fn jurors_registry(&self) -> Result<Pubkey, ProgramError> {
        self.module(ModuleId::JurorsRegistry)
            .ok_or_else(|| MigratorError::ModuleNotSet.into())
    }

    pub fn set_module(
        &mut self,
        caller: &Pubkey,
        module: ModuleId,
        address: Pubkey,
    ) -> Result<ModuleSet, ProgramError> {
        if *caller != self.governors.modules {
            return Err(MigratorError::SenderNotModulesGovernor.into());
        }

        self.modules.insert(module, address);
        msg!("Module {:?} set to {}", module, address);

        let event = ModuleSet { module, address };
        event.emit();
        Ok(event)
    }
}

impl AccountState for Controller {
    fn validate(&self) -> Result<(), ProgramError> {
        if self.discriminator != CONTROLLER_DISCRIMINATOR {
            return Err(MigratorError::InvalidDiscriminator.into());
        }
        if !self.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }
        Ok(())
    }
}
