use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program_error::{PrintProgramError, ProgramError},
    pubkey::Pubkey,
};

use crate::{
    constants::{DISPUTE_MANAGER_DISCRIMINATOR, MAX_MIGRATION_BATCH, MIGRATOR_DISCRIMINATOR},
    cpi::create_pda_account,
    engine::{MigrationContext, MigrationEngine},
    error::{classify, MigratorError},
    instruction::MigratorInstruction,
    ledger::{JurorEntry, JurorsRegistry, RegistryConfig, TokenBalance, TokenLedger},
    pda::{seeds, JurorEntryPDA, TokenBalancePDA},
    state::{
        ensure_blank, is_blank, load_state, read_discriminator, route_dispute, store_state,
        Controller, DisputeManager, Governors, MigratorState, ModuleId,
    },
};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    let result = Processor::process(program_id, accounts, instruction_data);
    if let Err(error) = &result {
        msg!("Failed ({:?})", classify(error));
        error.print::<MigratorError>();
    }
    result
}

pub struct Processor;

/// Pays for entry and balance accounts created on first write
struct Funding<'a, 'info> {
    payer: &'a AccountInfo<'info>,
    system_program: &'a AccountInfo<'info>,
}

/// Headers loaded for a coordinator instruction, in account order
struct Loaded<'a, 'info> {
    controller: Controller,
    state: MigratorState,
    old_registry: JurorsRegistry,
    new_registry: JurorsRegistry,
    tokens: TokenLedger,
    migrator_info: &'a AccountInfo<'info>,
    old_info: &'a AccountInfo<'info>,
    new_info: &'a AccountInfo<'info>,
}

impl<'a, 'info> Loaded<'a, 'info> {
    fn load(
        program_id: &Pubkey,
        iter: &mut std::slice::Iter<'a, AccountInfo<'info>>,
    ) -> Result<Self, ProgramError> {
        let controller_info = next_account_info(iter)?;
        let migrator_info = next_account_info(iter)?;
        let old_info = next_account_info(iter)?;
        let new_info = next_account_info(iter)?;
        let tokens_info = next_account_info(iter)?;

        let controller: Controller = load_state(controller_info, program_id)?;
        let state: MigratorState = load_state(migrator_info, program_id)?;
        let old_registry: JurorsRegistry = load_state(old_info, program_id)?;
        let new_registry: JurorsRegistry = load_state(new_info, program_id)?;
        let tokens: TokenLedger = load_state(tokens_info, program_id)?;

        ensure_key(controller_info, &controller.address)?;
        ensure_key(migrator_info, &state.address)?;
        ensure_key(old_info, &old_registry.address)?;
        ensure_key(new_info, &new_registry.address)?;
        ensure_key(tokens_info, &tokens.address)?;

        Ok(Self {
            controller,
            state,
            old_registry,
            new_registry,
            tokens,
            migrator_info,
            old_info,
            new_info,
        })
    }

    /// Run `f` against the loaded ledgers. Nothing is written back here.
    fn run<T>(
        &mut self,
        f: impl FnOnce(
            &mut MigratorState,
            &mut MigrationContext<'_, JurorsRegistry>,
        ) -> Result<T, ProgramError>,
    ) -> Result<T, ProgramError> {
        let mut ctx = MigrationContext {
            controller: &self.controller,
            old_registry: &mut self.old_registry,
            new_registry: &mut self.new_registry,
            tokens: &mut self.tokens,
        };
        f(&mut self.state, &mut ctx)
    }

    fn store_headers(&self) -> ProgramResult {
        store_state(&self.state, self.migrator_info)?;
        store_state(&self.old_registry, self.old_info)?;
        store_state(&self.new_registry, self.new_info)
    }
}

/// Balance accounts a coordinator instruction moves escrow between
struct EscrowAccounts<'a, 'info> {
    escrow_info: &'a AccountInfo<'info>,
    custody_info: &'a AccountInfo<'info>,
    custody: Pubkey,
    funding: Funding<'a, 'info>,
}

impl<'a, 'info> EscrowAccounts<'a, 'info> {
    /// Read the escrow and `custody` balances that follow the headers
    fn load(
        program_id: &Pubkey,
        iter: &mut std::slice::Iter<'a, AccountInfo<'info>>,
        payer: &'a AccountInfo<'info>,
        loaded: &mut Loaded<'a, 'info>,
        custody: Pubkey,
    ) -> Result<Self, ProgramError> {
        let escrow_info = next_account_info(iter)?;
        let custody_info = next_account_info(iter)?;
        let system_program = next_account_info(iter)?;

        let escrow = loaded.state.address;
        load_balance(program_id, &mut loaded.tokens, &escrow, escrow_info)?;
        load_balance(program_id, &mut loaded.tokens, &custody, custody_info)?;

        Ok(Self {
            escrow_info,
            custody_info,
            custody,
            funding: Funding {
                payer,
                system_program,
            },
        })
    }

    fn store(&self, program_id: &Pubkey, loaded: &Loaded<'a, 'info>) -> ProgramResult {
        let escrow = loaded.state.address;
        store_balance(program_id, &loaded.tokens, &escrow, self.escrow_info, Some(&self.funding))?;
        store_balance(
            program_id,
            &loaded.tokens,
            &self.custody,
            self.custody_info,
            Some(&self.funding),
        )
    }
}

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = MigratorInstruction::unpack(instruction_data)?;

        match instruction {
            MigratorInstruction::InitializeMigrator => {
                msg!("Instruction: InitializeMigrator");
                Self::process_initialize_migrator(program_id, accounts)
            }
            MigratorInstruction::FundEscrow => {
                msg!("Instruction: FundEscrow");
                Self::process_fund_escrow(program_id, accounts)
            }
            MigratorInstruction::Migrate { juror } => {
                msg!("Instruction: Migrate");
                Self::process_migrate(program_id, accounts, &juror)
            }
            MigratorInstruction::MigrateMany { jurors } => {
                msg!("Instruction: MigrateMany");
                Self::process_migrate_many(program_id, accounts, &jurors)
            }
            MigratorInstruction::Close => {
                msg!("Instruction: Close");
                Self::process_close(program_id, accounts)
            }
            MigratorInstruction::CreateDispute { possible_rulings } => {
                msg!("Instruction: CreateDispute");
                Self::process_create_dispute(program_id, accounts, possible_rulings)
            }
            MigratorInstruction::InitializeController { governors } => {
                msg!("Instruction: InitializeController");
                Self::process_initialize_controller(program_id, accounts, governors)
            }
            MigratorInstruction::SetModule { module, address } => {
                msg!("Instruction: SetModule");
                Self::process_set_module(program_id, accounts, module, address)
            }
            MigratorInstruction::Heartbeat { terms } => {
                msg!("Instruction: Heartbeat");
                Self::process_heartbeat(program_id, accounts, terms)
            }
            MigratorInstruction::InitializeDisputeManager => {
                msg!("Instruction: InitializeDisputeManager");
                Self::process_initialize_dispute_manager(program_id, accounts)
            }
            MigratorInstruction::InitializeTokenLedger { authority } => {
                msg!("Instruction: InitializeTokenLedger");
                Self::process_initialize_token_ledger(program_id, accounts, authority)
            }
            MigratorInstruction::MintTokens { holder, amount } => {
                msg!("Instruction: MintTokens");
                Self::process_mint_tokens(program_id, accounts, &holder, amount)
            }
            MigratorInstruction::InitializeRegistry { config } => {
                msg!("Instruction: InitializeRegistry");
                Self::process_initialize_registry(program_id, accounts, config)
            }
            MigratorInstruction::Stake { amount, activate } => {
                msg!("Instruction: Stake");
                Self::process_stake(program_id, accounts, amount, activate)
            }
            MigratorInstruction::Activate { amount } => {
                msg!("Instruction: Activate");
                Self::process_activation(program_id, accounts, amount, true)
            }
            MigratorInstruction::Deactivate { amount } => {
                msg!("Instruction: Deactivate");
                Self::process_activation(program_id, accounts, amount, false)
            }
            MigratorInstruction::ProcessDeactivation { juror } => {
                msg!("Instruction: ProcessDeactivation");
                Self::process_deactivation(program_id, accounts, &juror)
            }
            MigratorInstruction::Unstake { amount } => {
                msg!("Instruction: Unstake");
                Self::process_unstake(program_id, accounts, amount)
            }
        }
    }

    fn process_initialize_migrator(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let deployer_info = next_account_info(account_info_iter)?;
        let migrator_info = next_account_info(account_info_iter)?;
        let controller_info = next_account_info(account_info_iter)?;
        let old_info = next_account_info(account_info_iter)?;
        let new_info = next_account_info(account_info_iter)?;

        if !deployer_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        ensure_blank(migrator_info, program_id, MigratorState::LEN)?;

        let (controller, old_registry) = load_registry(program_id, controller_info, old_info)?;
        let (_, new_registry) = load_registry(program_id, controller_info, new_info)?;
        if old_registry.token_ledger != new_registry.token_ledger {
            msg!("Registries custody tokens on different ledgers");
            return Err(MigratorError::AccountMismatch.into());
        }

        let state = MigratorState::new(
            *migrator_info.key,
            &controller,
            *old_info.key,
            *new_info.key,
            old_registry.token_ledger,
        )?;
        store_state(&state, migrator_info)?;

        msg!(
            "Migrator initialized: {} -> {}, funds governor {}",
            old_info.key,
            new_info.key,
            state.funds_governor
        );
        Ok(())
    }

    fn process_fund_escrow(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let governor_info = next_account_info(account_info_iter)?;
        if !governor_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut loaded = Loaded::load(program_id, account_info_iter)?;
        let custody = loaded.old_registry.address;
        let escrow =
            EscrowAccounts::load(program_id, account_info_iter, governor_info, &mut loaded, custody)?;

        loaded.run(|state, ctx| MigrationEngine::fund_escrow(state, ctx, governor_info.key))?;

        store_state(&loaded.state, loaded.migrator_info)?;
        escrow.store(program_id, &loaded)
    }

    fn process_migrate(program_id: &Pubkey, accounts: &[AccountInfo], juror: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let payer_info = next_account_info(account_info_iter)?;
        if !payer_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut loaded = Loaded::load(program_id, account_info_iter)?;
        let custody = loaded.new_registry.address;
        let escrow =
            EscrowAccounts::load(program_id, account_info_iter, payer_info, &mut loaded, custody)?;

        let old_entry_info = next_account_info(account_info_iter)?;
        let new_entry_info = next_account_info(account_info_iter)?;
        load_juror_entry(program_id, &mut loaded.old_registry, juror, old_entry_info)?;
        load_juror_entry(program_id, &mut loaded.new_registry, juror, new_entry_info)?;

        let event = loaded.run(|state, ctx| MigrationEngine::migrate_one(state, ctx, juror))?;
        msg!("Migrated {} tokens for juror {}", event.amount, event.juror);

        loaded.store_headers()?;
        escrow.store(program_id, &loaded)?;
        store_juror_entry(program_id, &loaded.old_registry, juror, old_entry_info, None)?;
        store_juror_entry(
            program_id,
            &loaded.new_registry,
            juror,
            new_entry_info,
            Some(&escrow.funding),
        )
    }

    fn process_migrate_many(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        jurors: &[Pubkey],
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let payer_info = next_account_info(account_info_iter)?;
        if !payer_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut loaded = Loaded::load(program_id, account_info_iter)?;
        let custody = loaded.new_registry.address;
        let escrow =
            EscrowAccounts::load(program_id, account_info_iter, payer_info, &mut loaded, custody)?;

        // Entries past the batch bound are left unread; the engine rejects such batches
        let mut entries = Vec::with_capacity(jurors.len().min(MAX_MIGRATION_BATCH));
        for juror in jurors.iter().take(MAX_MIGRATION_BATCH) {
            let old_entry_info = next_account_info(account_info_iter)?;
            let new_entry_info = next_account_info(account_info_iter)?;
            load_juror_entry(program_id, &mut loaded.old_registry, juror, old_entry_info)?;
            load_juror_entry(program_id, &mut loaded.new_registry, juror, new_entry_info)?;
            entries.push((juror, old_entry_info, new_entry_info));
        }

        let receipt = loaded.run(|state, ctx| MigrationEngine::migrate_many(state, ctx, jurors))?;
        if let Some(halt) = receipt.halted {
            if receipt.migrated.is_empty() {
                return Err(halt.error);
            }
            msg!(
                "Committed {} of {} jurors, halted at {}",
                receipt.migrated.len(),
                jurors.len(),
                halt.juror
            );
        } else {
            msg!("Migrated {} jurors", receipt.migrated.len());
        }

        loaded.store_headers()?;
        escrow.store(program_id, &loaded)?;
        for (juror, old_entry_info, new_entry_info) in entries {
            store_juror_entry(program_id, &loaded.old_registry, juror, old_entry_info, None)?;
            store_juror_entry(
                program_id,
                &loaded.new_registry,
                juror,
                new_entry_info,
                Some(&escrow.funding),
            )?;
        }
        Ok(())
    }

    fn process_close(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let governor_info = next_account_info(account_info_iter)?;
        if !governor_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut loaded = Loaded::load(program_id, account_info_iter)?;
        let custody = loaded.old_registry.address;
        let escrow =
            EscrowAccounts::load(program_id, account_info_iter, governor_info, &mut loaded, custody)?;

        loaded.run(|state, ctx| MigrationEngine::close(state, ctx, governor_info.key))?;

        store_state(&loaded.state, loaded.migrator_info)?;
        escrow.store(program_id, &loaded)
    }

    fn process_create_dispute(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        possible_rulings: u8,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let subject_info = next_account_info(account_info_iter)?;
        let controller_info = next_account_info(account_info_iter)?;
        let module_info = next_account_info(account_info_iter)?;

        if !subject_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let controller: Controller = load_state(controller_info, program_id)?;
        ensure_key(controller_info, &controller.address)?;

        match read_discriminator(module_info)? {
            DISPUTE_MANAGER_DISCRIMINATOR => {
                let mut module: DisputeManager = load_state(module_info, program_id)?;
                ensure_key(module_info, &module.address)?;
                route_dispute(
                    &controller,
                    module_info.key,
                    &mut module,
                    subject_info.key,
                    possible_rulings,
                )?;
                store_state(&module, module_info)
            }
            MIGRATOR_DISCRIMINATOR => {
                let mut module: MigratorState = load_state(module_info, program_id)?;
                ensure_key(module_info, &module.address)?;
                route_dispute(
                    &controller,
                    module_info.key,
                    &mut module,
                    subject_info.key,
                    possible_rulings,
                )?;
                store_state(&module, module_info)
            }
            _ => Err(MigratorError::InvalidDiscriminator.into()),
        }
    }

    fn process_initialize_controller(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        governors: Governors,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let deployer_info = next_account_info(account_info_iter)?;
        let controller_info = next_account_info(account_info_iter)?;

        if !deployer_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        ensure_blank(controller_info, program_id, Controller::LEN)?;

        store_state(&Controller::new(*controller_info.key, governors), controller_info)?;
        msg!("Controller initialized, modules governor {}", governors.modules);
        Ok(())
    }

    fn process_set_module(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        module: ModuleId,
        address: Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let governor_info = next_account_info(account_info_iter)?;
        let controller_info = next_account_info(account_info_iter)?;

        if !governor_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut controller: Controller = load_state(controller_info, program_id)?;
        ensure_key(controller_info, &controller.address)?;
        controller.set_module(governor_info.key, module, address)?;
        store_state(&controller, controller_info)
    }

    fn process_heartbeat(program_id: &Pubkey, accounts: &[AccountInfo], terms: u64) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let governor_info = next_account_info(account_info_iter)?;
        let controller_info = next_account_info(account_info_iter)?;

        if !governor_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut controller: Controller = load_state(controller_info, program_id)?;
        ensure_key(controller_info, &controller.address)?;
        controller.heartbeat(governor_info.key, terms)?;
        store_state(&controller, controller_info)
    }

    fn process_initialize_dispute_manager(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let deployer_info = next_account_info(account_info_iter)?;
        let module_info = next_account_info(account_info_iter)?;

        if !deployer_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        ensure_blank(module_info, program_id, DisputeManager::LEN)?;

        store_state(&DisputeManager::new(*module_info.key), module_info)
    }

    fn process_initialize_token_ledger(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        authority: Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let deployer_info = next_account_info(account_info_iter)?;
        let ledger_info = next_account_info(account_info_iter)?;

        if !deployer_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        ensure_blank(ledger_info, program_id, TokenLedger::LEN)?;

        store_state(&TokenLedger::new(*ledger_info.key, authority), ledger_info)?;
        msg!("Token ledger initialized, mint authority {}", authority);
        Ok(())
    }

    fn process_mint_tokens(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        holder: &Pubkey,
        amount: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let ledger_info = next_account_info(account_info_iter)?;
        let balance_info = next_account_info(account_info_iter)?;
        let system_program = next_account_info(account_info_iter)?;

        if !authority_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut tokens: TokenLedger = load_state(ledger_info, program_id)?;
        ensure_key(ledger_info, &tokens.address)?;
        if tokens.authority != *authority_info.key {
            return Err(MigratorError::SenderNotMintAuthority.into());
        }

        load_balance(program_id, &mut tokens, holder, balance_info)?;
        tokens.mint(holder, amount)?;
        msg!("Minted {} tokens to {}", amount, holder);

        let funding = Funding {
            payer: authority_info,
            system_program,
        };
        store_state(&tokens, ledger_info)?;
        store_balance(program_id, &tokens, holder, balance_info, Some(&funding))
    }

    fn process_initialize_registry(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        config: RegistryConfig,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let deployer_info = next_account_info(account_info_iter)?;
        let registry_info = next_account_info(account_info_iter)?;
        let controller_info = next_account_info(account_info_iter)?;
        let ledger_info = next_account_info(account_info_iter)?;

        if !deployer_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        ensure_blank(registry_info, program_id, JurorsRegistry::LEN)?;

        let controller: Controller = load_state(controller_info, program_id)?;
        ensure_key(controller_info, &controller.address)?;
        let tokens: TokenLedger = load_state(ledger_info, program_id)?;
        ensure_key(ledger_info, &tokens.address)?;

        let registry = JurorsRegistry::new(*registry_info.key, controller.address, tokens.address, config)?;
        store_state(&registry, registry_info)?;

        msg!(
            "Registry {} initialized, total active limit {}",
            registry_info.key,
            config.total_active_balance_limit
        );
        Ok(())
    }

    fn process_stake(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        amount: u64,
        activate: bool,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let juror_info = next_account_info(account_info_iter)?;
        let mut custody = CustodyAccounts::load(program_id, account_info_iter, juror_info)?;

        let juror = *juror_info.key;
        let term = custody.controller.current_term();
        custody
            .registry
            .stake_for(&mut custody.tokens, &juror, &juror, amount, activate, term)?;
        msg!("Juror {} staked {} (activate: {})", juror, amount, activate);

        custody.store(program_id)
    }

    fn process_unstake(program_id: &Pubkey, accounts: &[AccountInfo], amount: u64) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let juror_info = next_account_info(account_info_iter)?;
        let mut custody = CustodyAccounts::load(program_id, account_info_iter, juror_info)?;

        let juror = *juror_info.key;
        let term = custody.controller.current_term();
        custody
            .registry
            .unstake(&mut custody.tokens, &juror, amount, term)?;
        msg!("Juror {} unstaked {}", juror, amount);

        custody.store(program_id)
    }

    fn process_activation(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        amount: u64,
        activate: bool,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let juror_info = next_account_info(account_info_iter)?;
        let controller_info = next_account_info(account_info_iter)?;
        let registry_info = next_account_info(account_info_iter)?;
        let entry_info = next_account_info(account_info_iter)?;

        if !juror_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (controller, mut registry) = load_registry(program_id, controller_info, registry_info)?;
        let juror = juror_info.key;
        load_juror_entry(program_id, &mut registry, juror, entry_info)?;

        let term = controller.current_term();
        if activate {
            registry.activate(juror, amount, term)?;
        } else {
            registry.deactivate(juror, amount, term)?;
        }

        store_state(&registry, registry_info)?;
        store_juror_entry(program_id, &registry, juror, entry_info, None)
    }

    fn process_deactivation(program_id: &Pubkey, accounts: &[AccountInfo], juror: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let controller_info = next_account_info(account_info_iter)?;
        let registry_info = next_account_info(account_info_iter)?;
        let entry_info = next_account_info(account_info_iter)?;

        let (controller, mut registry) = load_registry(program_id, controller_info, registry_info)?;
        load_juror_entry(program_id, &mut registry, juror, entry_info)?;
        registry.process_deactivation(juror, controller.current_term())?;

        store_state(&registry, registry_info)?;
        store_juror_entry(program_id, &registry, juror, entry_info, None)
    }
}

/// Accounts a juror's own stake or unstake moves tokens between
struct CustodyAccounts<'a, 'info> {
    controller: Controller,
    registry: JurorsRegistry,
    tokens: TokenLedger,
    juror: Pubkey,
    registry_info: &'a AccountInfo<'info>,
    juror_balance_info: &'a AccountInfo<'info>,
    custody_info: &'a AccountInfo<'info>,
    entry_info: &'a AccountInfo<'info>,
    funding: Funding<'a, 'info>,
}

impl<'a, 'info> CustodyAccounts<'a, 'info> {
    fn load(
        program_id: &Pubkey,
        iter: &mut std::slice::Iter<'a, AccountInfo<'info>>,
        juror_info: &'a AccountInfo<'info>,
    ) -> Result<Self, ProgramError> {
        let controller_info = next_account_info(iter)?;
        let registry_info = next_account_info(iter)?;
        let ledger_info = next_account_info(iter)?;
        let juror_balance_info = next_account_info(iter)?;
        let custody_info = next_account_info(iter)?;
        let entry_info = next_account_info(iter)?;
        let system_program = next_account_info(iter)?;

        if !juror_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (controller, mut registry) = load_registry(program_id, controller_info, registry_info)?;
        let mut tokens: TokenLedger = load_state(ledger_info, program_id)?;
        ensure_key(ledger_info, &registry.token_ledger)?;

        let juror = *juror_info.key;
        let custody = registry.address;
        load_balance(program_id, &mut tokens, &juror, juror_balance_info)?;
        load_balance(program_id, &mut tokens, &custody, custody_info)?;
        load_juror_entry(program_id, &mut registry, &juror, entry_info)?;

        Ok(Self {
            controller,
            registry,
            tokens,
            juror,
            registry_info,
            juror_balance_info,
            custody_info,
            entry_info,
            funding: Funding {
                payer: juror_info,
                system_program,
            },
        })
    }

    fn store(&self, program_id: &Pubkey) -> ProgramResult {
        let custody = self.registry.address;
        store_state(&self.registry, self.registry_info)?;
        store_balance(
            program_id,
            &self.tokens,
            &self.juror,
            self.juror_balance_info,
            Some(&self.funding),
        )?;
        store_balance(
            program_id,
            &self.tokens,
            &custody,
            self.custody_info,
            Some(&self.funding),
        )?;
        store_juror_entry(
            program_id,
            &self.registry,
            &self.juror,
            self.entry_info,
            Some(&self.funding),
        )
    }
}

/// Load a registry header and the controller it answers to
fn load_registry(
    program_id: &Pubkey,
    controller_info: &AccountInfo,
    registry_info: &AccountInfo,
) -> Result<(Controller, JurorsRegistry), ProgramError> {
    let controller: Controller = load_state(controller_info, program_id)?;
    ensure_key(controller_info, &controller.address)?;
    let registry: JurorsRegistry = load_state(registry_info, program_id)?;
    ensure_key(registry_info, &registry.address)?;

    if registry.controller != controller.address {
        msg!("Registry {} answers to another controller", registry_info.key);
        return Err(MigratorError::AccountMismatch.into());
    }
    Ok((controller, registry))
}

/// Read a juror's entry into the registry working set. A blank entry account
/// means the juror has no entry in this registry yet.
fn load_juror_entry(
    program_id: &Pubkey,
    registry: &mut JurorsRegistry,
    juror: &Pubkey,
    info: &AccountInfo,
) -> ProgramResult {
    let (expected, _) = JurorEntryPDA::derive(program_id, &registry.address, juror);
    ensure_pda(info, &expected)?;
    if is_blank(info, program_id)? {
        return Ok(());
    }

    let entry: JurorEntry = load_state(info, program_id)?;
    if entry.registry != registry.address || entry.juror != *juror {
        return Err(MigratorError::AccountMismatch.into());
    }
    registry.insert_entry(*juror, entry.account);
    Ok(())
}

/// Write a juror's entry back, allocating the account on first write
fn store_juror_entry<'info>(
    program_id: &Pubkey,
    registry: &JurorsRegistry,
    juror: &Pubkey,
    info: &AccountInfo<'info>,
    funding: Option<&Funding<'_, 'info>>,
) -> ProgramResult {
    let account = match registry.entry(juror) {
        Some(account) => account.clone(),
        None => return Ok(()),
    };

    if info.owner != program_id {
        let funding = funding.ok_or(ProgramError::UninitializedAccount)?;
        let (_, bump) = JurorEntryPDA::derive(program_id, &registry.address, juror);
        create_pda_account(
            funding.payer,
            info,
            JurorEntry::LEN,
            program_id,
            funding.system_program,
            &[seeds::JUROR_ENTRY, registry.address.as_ref(), juror.as_ref(), &[bump]],
        )?;
    }
    store_state(&JurorEntry::new(registry.address, *juror, account), info)
}

/// Read a holder's balance into the ledger working set
fn load_balance(
    program_id: &Pubkey,
    tokens: &mut TokenLedger,
    holder: &Pubkey,
    info: &AccountInfo,
) -> ProgramResult {
    let (expected, _) = TokenBalancePDA::derive(program_id, &tokens.address, holder);
    ensure_pda(info, &expected)?;
    if is_blank(info, program_id)? {
        return Ok(());
    }

    let balance: TokenBalance = load_state(info, program_id)?;
    if balance.ledger != tokens.address || balance.holder != *holder {
        return Err(MigratorError::AccountMismatch.into());
    }
    tokens.insert_balance(*holder, balance.amount);
    Ok(())
}

/// Write a holder's balance back, allocating the account on first credit
fn store_balance<'info>(
    program_id: &Pubkey,
    tokens: &TokenLedger,
    holder: &Pubkey,
    info: &AccountInfo<'info>,
    funding: Option<&Funding<'_, 'info>>,
) -> ProgramResult {
    let amount = match tokens.loaded_balance(holder) {
        Some(amount) => amount,
        None => return Ok(()),
    };

    if info.owner != program_id {
        let funding = funding.ok_or(ProgramError::UninitializedAccount)?;
        let (_, bump) = TokenBalancePDA::derive(program_id, &tokens.address, holder);
        create_pda_account(
            funding.payer,
            info,
            TokenBalance::LEN,
            program_id,
            funding.system_program,
            &[seeds::TOKEN_BALANCE, tokens.address.as_ref(), holder.as_ref(), &[bump]],
        )?;
    }
    store_state(&TokenBalance::new(tokens.address, *holder, amount), info)
}

fn ensure_pda(info: &AccountInfo, expected: &Pubkey) -> ProgramResult {
    if info.key != expected {
        msg!("Account {} is not the derived address {}", info.key, expected);
        return Err(MigratorError::InvalidPda.into());
    }
    Ok(())
}

fn ensure_key(info: &AccountInfo, expected: &Pubkey) -> ProgramResult {
    if info.key != expected {
        msg!("Account {} does not match stored key {}", info.key, expected);
        return Err(MigratorError::AccountMismatch.into());
    }
    Ok(())
}
