#![allow(dead_code)]

use jurors_registry_migrator::{
    engine::{BatchReceipt, MigrationContext, MigrationEngine},
    events::{EscrowFunded, MigrationClosed, TokensMigrated},
    ledger::{JurorBalance, JurorsRegistry, RegistryConfig, TokenLedger},
    state::{Controller, DisputeManager, Governors, MigratorState, ModuleId},
};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

pub const DECIMALS: u64 = 1_000_000_000;

pub fn tokens(amount: u64) -> u64 {
    amount * DECIMALS
}

pub const MIN_ACTIVE_BALANCE: u64 = 100 * DECIMALS;
pub const ACTIVE_BALANCE_LIMIT: u64 = 1_000_000 * DECIMALS;

/// A court with an old registry in service and a new registry plus
/// coordinator deployed next to it
pub struct Court {
    pub governors: Governors,
    pub controller: Controller,
    pub dispute_manager: DisputeManager,
    pub old_registry: JurorsRegistry,
    pub new_registry: JurorsRegistry,
    pub tokens: TokenLedger,
    pub migrator: MigratorState,
}

impl Court {
    pub fn deploy() -> Self {
        Self::deploy_with(
            RegistryConfig {
                min_active_balance: MIN_ACTIVE_BALANCE,
                total_active_balance_limit: ACTIVE_BALANCE_LIMIT,
            },
            RegistryConfig {
                min_active_balance: MIN_ACTIVE_BALANCE,
                total_active_balance_limit: ACTIVE_BALANCE_LIMIT,
            },
        )
    }

    pub fn deploy_with(old_config: RegistryConfig, new_config: RegistryConfig) -> Self {
        let governors = Governors {
            funds: Pubkey::new_unique(),
            config: Pubkey::new_unique(),
            modules: Pubkey::new_unique(),
        };
        let mut controller = Controller::new(Pubkey::new_unique(), governors);
        let dispute_manager = DisputeManager::new(Pubkey::new_unique());
        let tokens = TokenLedger::new(Pubkey::new_unique(), Pubkey::new_unique());
        let old_registry =
            JurorsRegistry::new(Pubkey::new_unique(), controller.address, tokens.address, old_config).unwrap();
        let new_registry =
            JurorsRegistry::new(Pubkey::new_unique(), controller.address, tokens.address, new_config).unwrap();

        controller
            .set_module(&governors.modules, ModuleId::DisputeManager, dispute_manager.address)
            .unwrap();
        controller
            .set_module(&governors.modules, ModuleId::JurorsRegistry, old_registry.address)
            .unwrap();

        let migrator = MigratorState::new(
            Pubkey::new_unique(),
            &controller,
            old_registry.address,
            new_registry.address,
            tokens.address,
        )
        .unwrap();

        Self {
            governors,
            controller,
            dispute_manager,
            old_registry,
            new_registry,
            tokens,
            migrator,
        }
    }

    /// Hand the funds role to a key the test can sign with
    pub fn set_funds_governor(&mut self, governor: Pubkey) {
        self.governors.funds = governor;
        self.controller.governors.funds = governor;
        self.migrator.funds_governor = governor;
    }

    pub fn term(&self) -> u64 {
        self.controller.current_term()
    }

    pub fn pass_terms(&mut self, terms: u64) {
        self.controller.advance_terms(terms).unwrap();
    }

    /// Mint `amount` to a fresh juror and activate it on the old registry
    pub fn activate(&mut self, amount: u64) -> Pubkey {
        let juror = Pubkey::new_unique();
        self.tokens.mint(&juror, amount).unwrap();
        let term = self.term();
        self.old_registry
            .stake_for(&mut self.tokens, &juror, &juror, amount, true, term)
            .unwrap();
        juror
    }

    /// Mint `amount` to a fresh juror and leave it staked but inactive
    pub fn stake(&mut self, amount: u64) -> Pubkey {
        let juror = Pubkey::new_unique();
        self.tokens.mint(&juror, amount).unwrap();
        let term = self.term();
        self.old_registry.stake(&mut self.tokens, &juror, amount, term).unwrap();
        juror
    }

    /// Point the registry slot at the new registry and the dispute-manager
    /// slot at the coordinator
    pub fn start_migration(&mut self) {
        let modules = self.governors.modules;
        self.controller
            .set_module(&modules, ModuleId::JurorsRegistry, self.new_registry.address)
            .unwrap();
        self.controller
            .set_module(&modules, ModuleId::DisputeManager, self.migrator.address)
            .unwrap();
    }

    pub fn restore_dispute_manager(&mut self) {
        let modules = self.governors.modules;
        let address = self.dispute_manager.address;
        self.controller
            .set_module(&modules, ModuleId::DisputeManager, address)
            .unwrap();
    }

    pub fn with_engine<T>(
        &mut self,
        f: impl FnOnce(&mut MigratorState, &mut MigrationContext<'_, JurorsRegistry>) -> T,
    ) -> T {
        let mut ctx = MigrationContext {
            controller: &self.controller,
            old_registry: &mut self.old_registry,
            new_registry: &mut self.new_registry,
            tokens: &mut self.tokens,
        };
        f(&mut self.migrator, &mut ctx)
    }

    pub fn fund(&mut self) -> Result<EscrowFunded, ProgramError> {
        let governor = self.governors.funds;
        self.with_engine(|state, ctx| MigrationEngine::fund_escrow(state, ctx, &governor))
    }

    pub fn migrate(&mut self, juror: &Pubkey) -> Result<TokensMigrated, ProgramError> {
        self.with_engine(|state, ctx| MigrationEngine::migrate_one(state, ctx, juror))
    }

    pub fn migrate_many(&mut self, jurors: &[Pubkey]) -> Result<BatchReceipt, ProgramError> {
        self.with_engine(|state, ctx| MigrationEngine::migrate_many(state, ctx, jurors))
    }

    pub fn close(&mut self, caller: &Pubkey) -> Result<MigrationClosed, ProgramError> {
        self.with_engine(|state, ctx| MigrationEngine::close(state, ctx, caller))
    }

    pub fn escrow(&self) -> u64 {
        self.tokens.balance_of(&self.migrator.address)
    }

    pub fn custody(&self, registry: &JurorsRegistry) -> u64 {
        self.tokens.balance_of(&registry.address)
    }
}

pub fn active(amount: u64) -> JurorBalance {
    JurorBalance {
        active: amount,
        ..JurorBalance::default()
    }
}

pub fn available(amount: u64) -> JurorBalance {
    JurorBalance {
        available: amount,
        ..JurorBalance::default()
    }
}
