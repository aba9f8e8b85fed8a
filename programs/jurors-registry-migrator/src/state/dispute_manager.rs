use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    constants::{DISPUTE_MANAGER_DISCRIMINATOR, MAX_RULING_OPTIONS, MIN_RULING_OPTIONS},
    error::MigratorError,
    events::{DisputeCreated, Event},
    state::{AccountState, Controller},
};

/// Consumer-facing dispute creation entry point
pub trait Arbitrator {
    fn create_dispute(
        &mut self,
        subject: &Pubkey,
        possible_rulings: u8,
        term: u64,
    ) -> Result<DisputeCreated, ProgramError>;
}

/// Create a dispute through whatever module occupies the controller's
/// dispute-manager slot. A module that has been moved out of the slot refuses
/// the same way the coordinator does while it holds it.
pub fn route_dispute(
    controller: &Controller,
    module_key: &Pubkey,
    module: &mut dyn Arbitrator,
    subject: &Pubkey,
    possible_rulings: u8,
) -> Result<DisputeCreated, ProgramError> {
    let slot = controller.dispute_manager()?;
    if slot != *module_key {
        msg!("Dispute creation served by {}, not {}", slot, module_key);
        return Err(MigratorError::MigrationInProgress.into());
    }
    module.create_dispute(subject, possible_rulings, controller.current_term())
}

/// Regular dispute module. Dispute records are only logged.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct DisputeManager {
    pub discriminator: [u8; 8],
    pub is_initialized: bool,
    pub address: Pubkey,
    pub dispute_count: u64,
}

impl DisputeManager {
    pub const LEN: usize = 8 + 1 + 32 + 8;

    pub fn new(address: Pubkey) -> Self {
        Self {
            discriminator: DISPUTE_MANAGER_DISCRIMINATOR,
            is_initialized: true,
            address,
            dispute_count: 0,
        }
    }
}

impl Arbitrator for DisputeManager {
    fn create_dispute(
        &mut self,
        subject: &Pubkey,
        possible_rulings: u8,
        term: u64,
    ) -> Result<DisputeCreated, ProgramError> {
        if !(MIN_RULING_OPTIONS..=MAX_RULING_OPTIONS).contains(&possible_rulings) {
            return Err(MigratorError::InvalidRulingOptions.into());
        }

        let dispute_id = self.dispute_count;
        self.dispute_count = dispute_id
            .checked_add(1)
            .ok_or(MigratorError::ArithmeticOverflow)?;
        msg!("Dispute {} created at term {}", dispute_id, term);

        let event = DisputeCreated {
            dispute_id,
            subject: *subject,
            possible_rulings,
        };
        event.emit();
        Ok(event)
    }
}

impl AccountState for DisputeManager {
    fn validate(&self) -> Result<(), ProgramError> {
        if self.discriminator != DISPUTE_MANAGER_DISCRIMINATOR {
            return Err(MigratorError::InvalidDiscriminator.into());
        }
        if !self.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Governors, ModuleId};

    #[test]
    fn test_route_dispute_requires_registered_module() {
        let modules_governor = Pubkey::new_unique();
        let mut controller = Controller::new(
            Pubkey::new_unique(),
            Governors {
                funds: Pubkey::new_unique(),
                config: Pubkey::new_unique(),
                modules: modules_governor,
            },
        );
        let mut disputes = DisputeManager::new(Pubkey::new_unique());
        let key = disputes.address;
        let subject = Pubkey::new_unique();

        let err = route_dispute(&controller, &key, &mut disputes, &subject, 2).unwrap_err();
        assert_eq!(err, MigratorError::ModuleNotSet.into());

        controller
            .set_module(&modules_governor, ModuleId::DisputeManager, Pubkey::new_unique())
            .unwrap();
        let err = route_dispute(&controller, &key, &mut disputes, &subject, 2).unwrap_err();
        assert_eq!(err, MigratorError::MigrationInProgress.into());
        assert_eq!(disputes.dispute_count, 0);

        controller
            .set_module(&modules_governor, ModuleId::DisputeManager, key)
            .unwrap();
        let first = route_dispute(&controller, &key, &mut disputes, &subject, 2).unwrap();
        let second = route_dispute(&controller, &key, &mut disputes, &subject, 3).unwrap();
        assert_eq!(first.dispute_id, 0);
        assert_eq!(second.dispute_id, 1);
        assert_eq!(disputes.dispute_count, 2);
    }

    #[test]
    fn test_ruling_options_bounds() {
        let mut disputes = DisputeManager::new(Pubkey::new_unique());
        let subject = Pubkey::new_unique();

        for rulings in [0, 1, 4] {
            let err = disputes.create_dispute(&subject, rulings, 0).unwrap_err();
            assert_eq!(err, MigratorError::InvalidRulingOptions.into());
        }
        assert_eq!(disputes.dispute_count, 0);
    }
}
