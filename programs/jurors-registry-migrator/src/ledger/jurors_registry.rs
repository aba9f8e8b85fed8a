use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    constants::{ACTIVATION_DELAY_TERMS, JUROR_ENTRY_DISCRIMINATOR, REGISTRY_DISCRIMINATOR},
    error::MigratorError,
    events::{Event, FundsRecovered},
    ledger::{Checkpoints, JurorBalance, StakeLedger, TokenLedger},
    state::{AccountState, Controller},
};

/// Registry limits
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Smallest non-zero active balance a juror may hold
    pub min_active_balance: u64,

    /// Cap on the sum of all jurors' active balances
    pub total_active_balance_limit: u64,
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<(), ProgramError> {
        if self.total_active_balance_limit == 0
            || self.min_active_balance > self.total_active_balance_limit
        {
            return Err(MigratorError::InvalidRegistryConfig.into());
        }
        Ok(())
    }
}

/// Stake on its way out of the active set
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeactivationRequest {
    pub amount: u64,
    /// First term at which the amount may be moved into `available`
    pub available_term: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct JurorAccount {
    pub active: Checkpoints,
    pub available: u64,
    pub locked: u64,
    pub deactivation: Option<DeactivationRequest>,
}

impl JurorAccount {
    pub const LEN: usize = Checkpoints::LEN + 8 + 8 + (1 + 16);
}

/// Juror entry account, one per registry and juror
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct JurorEntry {
    pub discriminator: [u8; 8],
    pub registry: Pubkey,
    pub juror: Pubkey,
    pub account: JurorAccount,
}

impl JurorEntry {
    pub const LEN: usize = 8 + 32 + 32 + JurorAccount::LEN;

    pub fn new(registry: Pubkey, juror: Pubkey, account: JurorAccount) -> Self {
        Self {
            discriminator: JUROR_ENTRY_DISCRIMINATOR,
            registry,
            juror,
            account,
        }
    }
}

impl AccountState for JurorEntry {
    fn validate(&self) -> Result<(), ProgramError> {
        if self.discriminator != JUROR_ENTRY_DISCRIMINATOR {
            return Err(MigratorError::InvalidDiscriminator.into());
        }
        Ok(())
    }
}

/// Versioned stake registry. The header lives in the registry account; juror
/// entries live in their own accounts and only the ones loaded for the current
/// instruction are held in `jurors`.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct JurorsRegistry {
    pub discriminator: [u8; 8],
    pub is_initialized: bool,

    /// Registry account key, also its token custody holder
    pub address: Pubkey,

    /// Controller this registry answers to
    pub controller: Pubkey,

    /// Token ledger custody is held in
    pub token_ledger: Pubkey,

    pub config: RegistryConfig,
    pub total_active: Checkpoints,

    #[borsh_skip]
    jurors: BTreeMap<Pubkey, JurorAccount>,
}

/// Undo record for one juror plus the active total
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    juror: Pubkey,
    account: Option<JurorAccount>,
    total_active: Checkpoints,
}

/// Juror values computed by an operation before anything is written
#[derive(Debug, Clone, Copy)]
struct Staged {
    active: u64,
    available: u64,
    locked: u64,
    deactivation: Option<DeactivationRequest>,
    total_active: u64,
}

impl JurorsRegistry {
    pub const LEN: usize = 8 + // discriminator
        1 + // is_initialized
        32 + // address
        32 + // controller
        32 + // token_ledger
        16 + // config
        Checkpoints::LEN; // total_active

    pub fn new(
        address: Pubkey,
        controller: Pubkey,
        token_ledger: Pubkey,
        config: RegistryConfig,
    ) -> Result<Self, ProgramError> {
        config.validate()?;

        Ok(Self {
            discriminator: REGISTRY_DISCRIMINATOR,
            is_initialized: true,
            address,
            controller,
            token_ledger,
            config,
            total_active: Checkpoints::default(),
            jurors: BTreeMap::new(),
        })
    }

    /// Hold a juror entry read from its account
    pub fn insert_entry(&mut self, juror: Pubkey, account: JurorAccount) {
        self.jurors.insert(juror, account);
    }

    /// Entry to write back to the juror's account, if the juror has one
    pub fn entry(&self, juror: &Pubkey) -> Option<&JurorAccount> {
        self.jurors.get(juror)
    }

    pub fn balance_of(&self, juror: &Pubkey) -> JurorBalance {
        self.balance_view(juror, |active| active.latest())
    }

    pub fn balance_of_at(&self, juror: &Pubkey, term: u64) -> JurorBalance {
        self.balance_view(juror, |active| active.get(term))
    }

    pub fn total_staked_for(&self, juror: &Pubkey) -> Result<u64, ProgramError> {
        self.balance_of(juror).total()
    }

    /// Jurors whose entries are loaded
    pub fn jurors(&self) -> impl Iterator<Item = &Pubkey> {
        self.jurors.keys()
    }

    /// Deposit `amount` from the juror's own tokens as available stake
    pub fn stake(
        &mut self,
        tokens: &mut TokenLedger,
        juror: &Pubkey,
        amount: u64,
        term: u64,
    ) -> Result<(), ProgramError> {
        self.stake_for(tokens, juror, juror, amount, false, term)
    }

    /// Deposit `amount` pulled from `from` on behalf of `juror`, optionally
    /// activating it for the next term
    pub fn stake_for(
        &mut self,
        tokens: &mut TokenLedger,
        from: &Pubkey,
        juror: &Pubkey,
        amount: u64,
        activate: bool,
        term: u64,
    ) -> Result<(), ProgramError> {
        if amount == 0 {
            return Err(MigratorError::InvalidZeroAmount.into());
        }

        self.writable_term(juror, term)?;
        let mut staged = self.stage(juror, term)?;
        staged.available = staged
            .available
            .checked_add(amount)
            .ok_or(MigratorError::ArithmeticOverflow)?;
        if activate {
            self.stage_activation(&mut staged, amount)?;
        }

        tokens.transfer(from, &self.address, amount)?;
        self.apply(juror, term, staged)
    }

    /// Move `amount` of available stake into the active set from the next term
    pub fn activate(&mut self, juror: &Pubkey, amount: u64, term: u64) -> Result<(), ProgramError> {
        if amount == 0 {
            return Err(MigratorError::InvalidZeroAmount.into());
        }

        self.writable_term(juror, term)?;
        let mut staged = self.stage(juror, term)?;
        self.stage_activation(&mut staged, amount)?;
        self.apply(juror, term, staged)
    }

    /// Request `amount` of active stake to leave the active set. It stops
    /// counting from the next term and becomes withdrawable once processed at
    /// or after that term.
    pub fn deactivate(&mut self, juror: &Pubkey, amount: u64, term: u64) -> Result<(), ProgramError> {
        if amount == 0 {
            return Err(MigratorError::InvalidZeroAmount.into());
        }

        let next = self.writable_term(juror, term)?;
        let mut staged = self.stage(juror, term)?;
        staged.active = staged
            .active
            .checked_sub(amount)
            .ok_or(MigratorError::InsufficientActiveBalance)?;
        if staged.active > 0 && staged.active < self.config.min_active_balance {
            return Err(MigratorError::ActiveBalanceBelowMin.into());
        }
        staged.total_active = staged
            .total_active
            .checked_sub(amount)
            .ok_or(MigratorError::ArithmeticOverflow)?;

        let pending = match staged.deactivation {
            Some(request) => request
                .amount
                .checked_add(amount)
                .ok_or(MigratorError::ArithmeticOverflow)?,
            None => amount,
        };
        staged.deactivation = Some(DeactivationRequest {
            amount: pending,
            available_term: next,
        });

        self.apply(juror, term, staged)
    }

    /// Move a matured deactivation request into `available`
    pub fn process_deactivation(&mut self, juror: &Pubkey, term: u64) -> Result<(), ProgramError> {
        if !self.jurors.contains_key(juror) {
            return Ok(());
        }

        self.writable_term(juror, term)?;
        let staged = self.stage(juror, term)?;
        self.apply(juror, term, staged)
    }

    /// Withdraw `amount` of available stake back to the juror
    pub fn unstake(
        &mut self,
        tokens: &mut TokenLedger,
        juror: &Pubkey,
        amount: u64,
        term: u64,
    ) -> Result<(), ProgramError> {
        if amount == 0 {
            return Err(MigratorError::InvalidZeroAmount.into());
        }

        self.writable_term(juror, term)?;
        let mut staged = self.stage(juror, term)?;
        staged.available = staged
            .available
            .checked_sub(amount)
            .ok_or(MigratorError::InsufficientAvailableBalance)?;

        tokens.transfer(&self.address, juror, amount)?;
        self.apply(juror, term, staged)
    }

    /// Lock active stake as dispute collateral. Dispute manager only.
    pub fn lock_active(
        &mut self,
        controller: &Controller,
        caller: &Pubkey,
        juror: &Pubkey,
        amount: u64,
        term: u64,
    ) -> Result<(), ProgramError> {
        self.ensure_dispute_manager(controller, caller)?;
        if amount == 0 {
            return Err(MigratorError::InvalidZeroAmount.into());
        }

        self.writable_term(juror, term)?;
        let mut staged = self.stage(juror, term)?;
        staged.active = staged
            .active
            .checked_sub(amount)
            .ok_or(MigratorError::InsufficientActiveBalance)?;
        staged.total_active = staged
            .total_active
            .checked_sub(amount)
            .ok_or(MigratorError::ArithmeticOverflow)?;
        staged.locked = staged
            .locked
            .checked_add(amount)
            .ok_or(MigratorError::ArithmeticOverflow)?;

        self.apply(juror, term, staged)
    }

    /// Release locked collateral back into the active set. Dispute manager only.
    pub fn unlock(
        &mut self,
        controller: &Controller,
        caller: &Pubkey,
        juror: &Pubkey,
        amount: u64,
        term: u64,
    ) -> Result<(), ProgramError> {
        self.ensure_dispute_manager(controller, caller)?;
        if amount == 0 {
            return Err(MigratorError::InvalidZeroAmount.into());
        }

        self.writable_term(juror, term)?;
        let mut staged = self.stage(juror, term)?;
        staged.locked = staged
            .locked
            .checked_sub(amount)
            .ok_or(MigratorError::InsufficientLockedBalance)?;
        staged.active = staged
            .active
            .checked_add(amount)
            .ok_or(MigratorError::ArithmeticOverflow)?;
        staged.total_active = staged
            .total_active
            .checked_add(amount)
            .ok_or(MigratorError::ArithmeticOverflow)?;

        self.apply(juror, term, staged)
    }

    pub fn collect_active(
        &mut self,
        controller: &Controller,
        caller: &Pubkey,
        juror: &Pubkey,
        amount: u64,
        term: u64,
    ) -> Result<(), ProgramError> {
        self.ensure_dispute_manager(controller, caller)?;
        if amount == 0 {
            return Err(MigratorError::InvalidZeroAmount.into());
        }

        self.writable_term(juror, term)?;
        let mut staged = self.stage(juror, term)?;
        staged.active = staged
            .active
            .checked_sub(amount)
            .ok_or(MigratorError::InsufficientActiveBalance)?;
        staged.total_active = staged
            .total_active
            .checked_sub(amount)
            .ok_or(MigratorError::ArithmeticOverflow)?;

        self.apply(juror, term, staged)
    }

    pub fn recover_funds(
        &mut self,
        tokens: &mut TokenLedger,
        controller: &Controller,
        caller: &Pubkey,
        recipient: &Pubkey,
    ) -> Result<u64, ProgramError> {
        self.ensure_controller(controller)?;
        if controller.funds_governor() != *caller {
            return Err(MigratorError::Unauthorized.into());
        }

        let amount = tokens.balance_of(&self.address);
        tokens.transfer(&self.address, recipient, amount)?;

        msg!("Registry {} recovered {} tokens to {}", self.address, amount, recipient);
        FundsRecovered {
            recipient: *recipient,
            amount,
        }
        .emit();

        Ok(amount)
    }

    fn balance_view(&self, juror: &Pubkey, active: impl Fn(&Checkpoints) -> u64) -> JurorBalance {
        match self.jurors.get(juror) {
            Some(account) => JurorBalance {
                active: active(&account.active),
                available: account.available,
                locked: account.locked,
                pending_deactivation: account.deactivation.map(|r| r.amount).unwrap_or(0),
            },
            None => JurorBalance::default(),
        }
    }

    fn ensure_controller(&self, controller: &Controller) -> Result<(), ProgramError> {
        if controller.address != self.controller {
            return Err(MigratorError::AccountMismatch.into());
        }
        Ok(())
    }

    fn ensure_dispute_manager(&self, controller: &Controller, caller: &Pubkey) -> Result<(), ProgramError> {
        self.ensure_controller(controller)?;
        if controller.dispute_manager()? != *caller {
            return Err(MigratorError::SenderNotDisputeManager.into());
        }
        Ok(())
    }

    /// Term from which changes requested at `term` take effect, checked
    /// against both balance histories
    fn writable_term(&self, juror: &Pubkey, term: u64) -> Result<u64, ProgramError> {
        let next = term
            .checked_add(ACTIVATION_DELAY_TERMS)
            .ok_or(MigratorError::ArithmeticOverflow)?;

        self.total_active.ensure_writable(next)?;
        if let Some(account) = self.jurors.get(juror) {
            account.active.ensure_writable(next)?;
        }
        Ok(next)
    }

    /// Current juror values with any deactivation matured by `term` settled
    fn stage(&self, juror: &Pubkey, term: u64) -> Result<Staged, ProgramError> {
        let total_active = self.total_active.latest();
        let account = match self.jurors.get(juror) {
            Some(account) => account,
            None => {
                return Ok(Staged {
                    active: 0,
                    available: 0,
                    locked: 0,
                    deactivation: None,
                    total_active,
                })
            }
        };

        let (available, deactivation) = match account.deactivation {
            Some(request) if request.available_term <= term => (
                account
                    .available
                    .checked_add(request.amount)
                    .ok_or(MigratorError::ArithmeticOverflow)?,
                None,
            ),
            other => (account.available, other),
        };

        Ok(Staged {
            active: account.active.latest(),
            available,
            locked: account.locked,
            deactivation,
            total_active,
        })
    }

    fn stage_activation(&self, staged: &mut Staged, amount: u64) -> Result<(), ProgramError> {
        staged.available = staged
            .available
            .checked_sub(amount)
            .ok_or(MigratorError::InsufficientAvailableBalance)?;
        staged.active = staged
            .active
            .checked_add(amount)
            .ok_or(MigratorError::ArithmeticOverflow)?;
        if staged.active < self.config.min_active_balance {
            return Err(MigratorError::ActiveBalanceBelowMin.into());
        }

        staged.total_active = staged
            .total_active
            .checked_add(amount)
            .ok_or(MigratorError::ArithmeticOverflow)?;
        if staged.total_active > self.config.total_active_balance_limit {
            msg!(
                "Activation of {} would exceed total active limit {}",
                amount,
                self.config.total_active_balance_limit
            );
            return Err(MigratorError::TotalActiveBalanceExceeded.into());
        }
        Ok(())
    }

    /// Write staged values effective from the term after `term`, dropping
    /// history no longer reachable from `term`
    fn apply(&mut self, juror: &Pubkey, term: u64, staged: Staged) -> Result<(), ProgramError> {
        let next = term
            .checked_add(ACTIVATION_DELAY_TERMS)
            .ok_or(MigratorError::ArithmeticOverflow)?;

        let account = self.jurors.entry(*juror).or_default();
        account.active.prune(term);
        if account.active.latest() != staged.active {
            account.active.add(next, staged.active)?;
        }
        account.available = staged.available;
        account.locked = staged.locked;
        account.deactivation = staged.deactivation;

        self.total_active.prune(term);
        if self.total_active.latest() != staged.total_active {
            self.total_active.add(next, staged.total_active)?;
        }
        Ok(())
    }
}

impl StakeLedger for JurorsRegistry {
    type Snapshot = RegistrySnapshot;

    fn custody(&self) -> Pubkey {
        self.address
    }

    fn balance_of(&self, juror: &Pubkey) -> JurorBalance {
        JurorsRegistry::balance_of(self, juror)
    }

    fn balance_of_at(&self, juror: &Pubkey, term: u64) -> JurorBalance {
        JurorsRegistry::balance_of_at(self, juror, term)
    }

    fn total_active_balance_at(&self, term: u64) -> u64 {
        self.total_active.get(term)
    }

    fn total_active_balance_limit(&self) -> u64 {
        self.config.total_active_balance_limit
    }

    fn collect_active(
        &mut self,
        controller: &Controller,
        caller: &Pubkey,
        juror: &Pubkey,
        amount: u64,
        term: u64,
    ) -> Result<(), ProgramError> {
        JurorsRegistry::collect_active(self, controller, caller, juror, amount, term)
    }

    fn stake_and_activate_for(
        &mut self,
        tokens: &mut TokenLedger,
        from: &Pubkey,
        juror: &Pubkey,
        amount: u64,
        term: u64,
    ) -> Result<(), ProgramError> {
        self.stake_for(tokens, from, juror, amount, true, term)
    }

    fn recover_funds(
        &mut self,
        tokens: &mut TokenLedger,
        controller: &Controller,
        caller: &Pubkey,
        recipient: &Pubkey,
    ) -> Result<u64, ProgramError> {
        JurorsRegistry::recover_funds(self, tokens, controller, caller, recipient)
    }

    fn snapshot(&self, juror: &Pubkey) -> RegistrySnapshot {
        RegistrySnapshot {
            juror: *juror,
            account: self.jurors.get(juror).cloned(),
            total_active: self.total_active.clone(),
        }
    }

    fn restore(&mut self, snapshot: RegistrySnapshot) {
        self.total_active = snapshot.total_active;
        match snapshot.account {
            Some(saved) => {
                self.jurors.insert(snapshot.juror, saved);
            }
            None => {
                self.jurors.remove(&snapshot.juror);
            }
        }
    }
}

impl AccountState for JurorsRegistry {
    fn validate(&self) -> Result<(), ProgramError> {
        if self.discriminator != REGISTRY_DISCRIMINATOR {
            return Err(MigratorError::InvalidDiscriminator.into());
        }
        if !self.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }
        self.config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Governors, ModuleId};

    const LIMIT: u64 = 1_000_000;
    const MIN_ACTIVE: u64 = 100;

    struct Fixture {
        controller: Controller,
        registry: JurorsRegistry,
        tokens: TokenLedger,
        dispute_manager: Pubkey,
        funds_governor: Pubkey,
    }

    fn fixture() -> Fixture {
        let modules_governor = Pubkey::new_unique();
        let funds_governor = Pubkey::new_unique();
        let dispute_manager = Pubkey::new_unique();
        let mut controller = Controller::new(
            Pubkey::new_unique(),
            Governors {
                funds: funds_governor,
                config: Pubkey::new_unique(),
                modules: modules_governor,
            },
        );
        controller
            .set_module(&modules_governor, ModuleId::DisputeManager, dispute_manager)
            .unwrap();

        let tokens = TokenLedger::new(Pubkey::new_unique(), Pubkey::new_unique());
        let registry = JurorsRegistry::new(
            Pubkey::new_unique(),
            controller.address,
            tokens.address,
            RegistryConfig {
                min_active_balance: MIN_ACTIVE,
                total_active_balance_limit: LIMIT,
            },
        )
        .unwrap();

        Fixture {
            controller,
            registry,
            tokens,
            dispute_manager,
            funds_governor,
        }
    }

    fn funded_juror(f: &mut Fixture, amount: u64) -> Pubkey {
        let juror = Pubkey::new_unique();
        f.tokens.mint(&juror, amount).unwrap();
        juror
    }

    #[test]
    fn test_activation_takes_effect_next_term() {
        let mut f = fixture();
        let juror = funded_juror(&mut f, 5_000);

        f.registry
            .stake_for(&mut f.tokens, &juror, &juror, 5_000, true, 0)
            .unwrap();

        assert_eq!(f.registry.balance_of_at(&juror, 0).active, 0);
        assert_eq!(f.registry.balance_of_at(&juror, 1).active, 5_000);
        assert_eq!(f.registry.balance_of(&juror).active, 5_000);
        assert_eq!(f.registry.total_active.get(1), 5_000);
        assert_eq!(f.tokens.balance_of(&f.registry.address), 5_000);
    }

    #[test]
    fn test_activation_respects_limits() {
        let mut f = fixture();
        let juror = funded_juror(&mut f, LIMIT + 1);

        let err = f
            .registry
            .stake_for(&mut f.tokens, &juror, &juror, LIMIT + 1, true, 0)
            .unwrap_err();
        assert_eq!(err, MigratorError::TotalActiveBalanceExceeded.into());
        assert_eq!(f.tokens.balance_of(&juror), LIMIT + 1);
        assert_eq!(f.registry.balance_of(&juror), JurorBalance::default());

        let err = f
            .registry
            .stake_for(&mut f.tokens, &juror, &juror, MIN_ACTIVE - 1, true, 0)
            .unwrap_err();
        assert_eq!(err, MigratorError::ActiveBalanceBelowMin.into());
    }

    #[test]
    fn test_partial_deactivation_and_withdrawal() {
        let mut f = fixture();
        let juror = funded_juror(&mut f, 10_000);
        f.registry
            .stake_for(&mut f.tokens, &juror, &juror, 10_000, true, 0)
            .unwrap();

        f.registry.deactivate(&juror, 5_000, 1).unwrap();
        let balance = f.registry.balance_of(&juror);
        assert_eq!(balance.active, 5_000);
        assert_eq!(balance.pending_deactivation, 5_000);
        assert_eq!(f.registry.balance_of_at(&juror, 1).active, 10_000);
        assert_eq!(f.registry.balance_of_at(&juror, 2).active, 5_000);

        // Not matured yet
        f.registry.process_deactivation(&juror, 1).unwrap();
        assert_eq!(f.registry.balance_of(&juror).pending_deactivation, 5_000);
        let err = f.registry.unstake(&mut f.tokens, &juror, 1, 1).unwrap_err();
        assert_eq!(err, MigratorError::InsufficientAvailableBalance.into());

        f.registry.unstake(&mut f.tokens, &juror, 5_000, 2).unwrap();
        let balance = f.registry.balance_of(&juror);
        assert_eq!(balance.available, 0);
        assert_eq!(balance.pending_deactivation, 0);
        assert_eq!(f.tokens.balance_of(&juror), 5_000);
    }

    #[test]
    fn test_deactivation_cannot_leave_dust() {
        let mut f = fixture();
        let juror = funded_juror(&mut f, 1_000);
        f.registry
            .stake_for(&mut f.tokens, &juror, &juror, 1_000, true, 0)
            .unwrap();

        let err = f.registry.deactivate(&juror, 950, 1).unwrap_err();
        assert_eq!(err, MigratorError::ActiveBalanceBelowMin.into());

        f.registry.deactivate(&juror, 1_000, 1).unwrap();
        assert_eq!(f.registry.balance_of(&juror).active, 0);
    }

    #[test]
    fn test_collect_requires_dispute_manager() {
        let mut f = fixture();
        let juror = funded_juror(&mut f, 1_000);
        f.registry
            .stake_for(&mut f.tokens, &juror, &juror, 1_000, true, 0)
            .unwrap();

        let stranger = Pubkey::new_unique();
        let err = f
            .registry
            .collect_active(&f.controller, &stranger, &juror, 1_000, 1)
            .unwrap_err();
        assert_eq!(err, MigratorError::SenderNotDisputeManager.into());

        f.registry
            .collect_active(&f.controller, &f.dispute_manager, &juror, 1_000, 1)
            .unwrap();
        assert_eq!(f.registry.balance_of(&juror).active, 0);
        assert_eq!(f.registry.total_active.latest(), 0);
    }

    #[test]
    fn test_lock_and_unlock_move_between_active_and_locked() {
        let mut f = fixture();
        let juror = funded_juror(&mut f, 2_000);
        f.registry
            .stake_for(&mut f.tokens, &juror, &juror, 2_000, true, 0)
            .unwrap();

        f.registry
            .lock_active(&f.controller, &f.dispute_manager, &juror, 500, 1)
            .unwrap();
        let balance = f.registry.balance_of(&juror);
        assert_eq!(balance.active, 1_500);
        assert_eq!(balance.locked, 500);
        assert_eq!(balance.total().unwrap(), 2_000);

        f.registry
            .unlock(&f.controller, &f.dispute_manager, &juror, 500, 1)
            .unwrap();
        assert_eq!(f.registry.balance_of(&juror).active, 2_000);
        assert_eq!(f.registry.balance_of(&juror).locked, 0);
    }

    #[test]
    fn test_recover_funds_is_governor_only() {
        let mut f = fixture();
        let juror = funded_juror(&mut f, 700);
        f.registry.stake(&mut f.tokens, &juror, 700, 0).unwrap();
        let recipient = Pubkey::new_unique();

        let err = f
            .registry
            .recover_funds(&mut f.tokens, &f.controller, &juror, &recipient)
            .unwrap_err();
        assert_eq!(err, MigratorError::Unauthorized.into());

        let governor = f.funds_governor;
        let recovered = f
            .registry
            .recover_funds(&mut f.tokens, &f.controller, &governor, &recipient)
            .unwrap();
        assert_eq!(recovered, 700);
        assert_eq!(f.tokens.balance_of(&recipient), 700);
        assert_eq!(f.tokens.balance_of(&f.registry.address), 0);
        // Bookkeeping is untouched by the sweep
        assert_eq!(f.registry.balance_of(&juror).available, 700);
    }

    #[test]
    fn test_restore_reverts_collect() {
        let mut f = fixture();
        let juror = funded_juror(&mut f, 3_000);
        f.registry
            .stake_for(&mut f.tokens, &juror, &juror, 3_000, true, 0)
            .unwrap();
        let before = f.registry.clone();

        let snapshot = StakeLedger::snapshot(&f.registry, &juror);
        f.registry
            .collect_active(&f.controller, &f.dispute_manager, &juror, 3_000, 1)
            .unwrap();
        StakeLedger::restore(&mut f.registry, snapshot);

        assert_eq!(f.registry, before);
    }

    #[test]
    fn test_restore_removes_juror_created_after_snapshot() {
        let mut f = fixture();
        let juror = funded_juror(&mut f, 3_000);
        let before = f.registry.clone();

        let snapshot = StakeLedger::snapshot(&f.registry, &juror);
        f.registry
            .stake_for(&mut f.tokens, &juror, &juror, 3_000, true, 0)
            .unwrap();
        StakeLedger::restore(&mut f.registry, snapshot);

        assert_eq!(f.registry, before);
    }

    #[test]
    fn test_header_and_entries_are_stored_apart() {
        let mut f = fixture();
        let juror = funded_juror(&mut f, 4_000);
        f.registry
            .stake_for(&mut f.tokens, &juror, &juror, 4_000, true, 0)
            .unwrap();

        // The header account carries no juror entries
        let header = JurorsRegistry::try_from_slice(&f.registry.try_to_vec().unwrap()).unwrap();
        assert_eq!(header.jurors().count(), 0);
        assert_eq!(header.total_active.latest(), 4_000);
        assert!(f.registry.try_to_vec().unwrap().len() <= JurorsRegistry::LEN);

        let entry = JurorEntry::new(f.registry.address, juror, f.registry.entry(&juror).unwrap().clone());
        assert!(entry.try_to_vec().unwrap().len() <= JurorEntry::LEN);

        let mut reloaded = header;
        reloaded.insert_entry(juror, entry.account);
        assert_eq!(reloaded, f.registry);
        assert_eq!(reloaded.balance_of(&juror), f.registry.balance_of(&juror));
    }

    #[test]
    fn test_entry_history_stays_bounded() {
        let mut f = fixture();
        let juror = funded_juror(&mut f, 10_000);
        f.registry
            .stake_for(&mut f.tokens, &juror, &juror, 1_000, true, 0)
            .unwrap();

        for term in 1..20 {
            f.registry.deactivate(&juror, 100, term).unwrap();
            f.registry.activate(&juror, 100, term + 1).unwrap();
            let entry = f.registry.entry(&juror).unwrap();
            assert!(entry.active.len() <= crate::constants::MAX_CHECKPOINTS);
            assert!(f.registry.total_active.len() <= crate::constants::MAX_CHECKPOINTS);
        }
    }
}
