use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::{
    ledger::RegistryConfig,
    pda::{JurorEntryPDA, TokenBalancePDA},
    state::{Governors, ModuleId},
};

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum MigratorInstruction {
    /// Create the coordinator state in a blank program-owned account
    /// Accounts:
    /// 0. `[signer]` Deployer
    /// 1. `[writable]` Coordinator account (zeroed, owned by this program)
    /// 2. `[]` Controller
    /// 3. `[]` Old jurors registry
    /// 4. `[]` New jurors registry
    InitializeMigrator,

    /// Recover the old registry's custody into the coordinator escrow
    /// Accounts:
    /// 0. `[writable, signer]` Funds governor
    /// 1. `[]` Controller
    /// 2. `[writable]` Coordinator account
    /// 3. `[]` Old jurors registry
    /// 4. `[]` New jurors registry
    /// 5. `[]` Token ledger
    /// 6. `[writable]` Escrow balance PDA
    /// 7. `[writable]` Old registry custody balance PDA
    /// 8. `[]` System program
    FundEscrow,

    /// Migrate one juror's active stake. Anyone may call.
    /// Accounts:
    /// 0. `[writable, signer]` Payer
    /// 1. `[]` Controller
    /// 2. `[writable]` Coordinator account
    /// 3. `[writable]` Old jurors registry
    /// 4. `[writable]` New jurors registry
    /// 5. `[]` Token ledger
    /// 6. `[writable]` Escrow balance PDA
    /// 7. `[writable]` New registry custody balance PDA
    /// 8. `[]` System program
    /// 9. `[writable]` Juror entry PDA in the old registry
    /// 10. `[writable]` Juror entry PDA in the new registry
    Migrate { juror: Pubkey },

    /// Migrate jurors in order, stopping at the first failure
    /// Accounts: 0-8 as `Migrate`, then the old and new entry PDA of each
    /// juror in input order
    MigrateMany { jurors: Vec<Pubkey> },

    /// Return the residual escrow to the old registry
    /// Accounts: same as `FundEscrow`
    Close,

    /// Create a dispute through the module in the dispute-manager slot
    /// Accounts:
    /// 0. `[signer]` Subject
    /// 1. `[]` Controller
    /// 2. `[writable]` Dispute module (dispute manager or coordinator)
    CreateDispute { possible_rulings: u8 },

    /// Accounts:
    /// 0. `[signer]` Deployer
    /// 1. `[writable]` Controller account (zeroed, owned by this program)
    InitializeController { governors: Governors },

    /// Point a controller slot at a module
    /// Accounts:
    /// 0. `[signer]` Modules governor
    /// 1. `[writable]` Controller
    SetModule { module: ModuleId, address: Pubkey },

    /// Advance the court clock
    /// Accounts:
    /// 0. `[signer]` Config governor
    /// 1. `[writable]` Controller
    Heartbeat { terms: u64 },

    /// Accounts:
    /// 0. `[signer]` Deployer
    /// 1. `[writable]` Dispute manager account (zeroed, owned by this program)
    InitializeDisputeManager,

    /// Accounts:
    /// 0. `[signer]` Deployer
    /// 1. `[writable]` Token ledger account (zeroed, owned by this program)
    InitializeTokenLedger { authority: Pubkey },

    /// Accounts:
    /// 0. `[writable, signer]` Mint authority
    /// 1. `[writable]` Token ledger
    /// 2. `[writable]` Holder balance PDA
    /// 3. `[]` System program
    MintTokens { holder: Pubkey, amount: u64 },

    /// Accounts:
    /// 0. `[signer]` Deployer
    /// 1. `[writable]` Registry account (zeroed, owned by this program)
    /// 2. `[]` Controller
    /// 3. `[]` Token ledger
    InitializeRegistry { config: RegistryConfig },

    /// Deposit the juror's tokens into a registry, optionally activating them
    /// Accounts:
    /// 0. `[writable, signer]` Juror
    /// 1. `[]` Controller
    /// 2. `[writable]` Jurors registry
    /// 3. `[]` Token ledger
    /// 4. `[writable]` Juror balance PDA
    /// 5. `[writable]` Registry custody balance PDA
    /// 6. `[writable]` Juror entry PDA
    /// 7. `[]` System program
    Stake { amount: u64, activate: bool },

    /// Accounts:
    /// 0. `[signer]` Juror
    /// 1. `[]` Controller
    /// 2. `[writable]` Jurors registry
    /// 3. `[writable]` Juror entry PDA
    Activate { amount: u64 },

    /// Accounts: same as `Activate`
    Deactivate { amount: u64 },

    /// Release a matured deactivation request. Anyone may call.
    /// Accounts:
    /// 0. `[]` Controller
    /// 1. `[writable]` Jurors registry
    /// 2. `[writable]` Juror entry PDA
    ProcessDeactivation { juror: Pubkey },

    /// Withdraw available stake back to the juror
    /// Accounts: same as `Stake`
    Unstake { amount: u64 },
}

#[derive(BorshSerialize, BorshDeserialize)]
struct JurorPayload {
    juror: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct MigrateManyPayload {
    jurors: Vec<Pubkey>,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct CreateDisputePayload {
    possible_rulings: u8,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct GovernorsPayload {
    governors: Governors,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct SetModulePayload {
    module: ModuleId,
    address: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct AuthorityPayload {
    authority: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct MintPayload {
    holder: Pubkey,
    amount: u64,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct ConfigPayload {
    config: RegistryConfig,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct StakePayload {
    amount: u64,
    activate: bool,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct AmountPayload {
    amount: u64,
}

impl MigratorInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (&variant, rest) = input
            .split_first()
            .ok_or(ProgramError::InvalidInstructionData)?;

        Ok(match variant {
            0 => Self::InitializeMigrator,
            1 => Self::FundEscrow,
            2 => {
                let JurorPayload { juror } = Self::payload(rest)?;
                Self::Migrate { juror }
            }
            3 => {
                let MigrateManyPayload { jurors } = Self::payload(rest)?;
                Self::MigrateMany { jurors }
            }
            4 => Self::Close,
            5 => {
                let CreateDisputePayload { possible_rulings } = Self::payload(rest)?;
                Self::CreateDispute { possible_rulings }
            }
            6 => {
                let GovernorsPayload { governors } = Self::payload(rest)?;
                Self::InitializeController { governors }
            }
            7 => {
                let SetModulePayload { module, address } = Self::payload(rest)?;
                Self::SetModule { module, address }
            }
            8 => {
                let AmountPayload { amount } = Self::payload(rest)?;
                Self::Heartbeat { terms: amount }
            }
            9 => Self::InitializeDisputeManager,
            10 => {
                let AuthorityPayload { authority } = Self::payload(rest)?;
                Self::InitializeTokenLedger { authority }
            }
            11 => {
                let MintPayload { holder, amount } = Self::payload(rest)?;
                Self::MintTokens { holder, amount }
            }
            12 => {
                let ConfigPayload { config } = Self::payload(rest)?;
                Self::InitializeRegistry { config }
            }
            13 => {
                let StakePayload { amount, activate } = Self::payload(rest)?;
                Self::Stake { amount, activate }
            }
            14 => {
                let AmountPayload { amount } = Self::payload(rest)?;
                Self::Activate { amount }
            }
            15 => {
                let AmountPayload { amount } = Self::payload(rest)?;
                Self::Deactivate { amount }
            }
            16 => {
                let JurorPayload { juror } = Self::payload(rest)?;
                Self::ProcessDeactivation { juror }
            }
            17 => {
                let AmountPayload { amount } = Self::payload(rest)?;
                Self::Unstake { amount }
            }
            _ => return Err(ProgramError::InvalidInstructionData),
        })
    }

    pub fn pack(&self) -> Result<Vec<u8>, ProgramError> {
        let mut buf = Vec::with_capacity(1 + 32);
        match self {
            Self::InitializeMigrator => buf.push(0),
            Self::FundEscrow => buf.push(1),
            Self::Migrate { juror } => {
                buf.push(2);
                JurorPayload { juror: *juror }.serialize(&mut buf)?;
            }
            Self::MigrateMany { jurors } => {
                buf.push(3);
                MigrateManyPayload {
                    jurors: jurors.clone(),
                }
                .serialize(&mut buf)?;
            }
            Self::Close => buf.push(4),
            Self::CreateDispute { possible_rulings } => {
                buf.push(5);
                CreateDisputePayload {
                    possible_rulings: *possible_rulings,
                }
                .serialize(&mut buf)?;
            }
            Self::InitializeController { governors } => {
                buf.push(6);
                GovernorsPayload {
                    governors: *governors,
                }
                .serialize(&mut buf)?;
            }
            Self::SetModule { module, address } => {
                buf.push(7);
                SetModulePayload {
                    module: *module,
                    address: *address,
                }
                .serialize(&mut buf)?;
            }
            Self::Heartbeat { terms } => {
                buf.push(8);
                AmountPayload { amount: *terms }.serialize(&mut buf)?;
            }
            Self::InitializeDisputeManager => buf.push(9),
            Self::InitializeTokenLedger { authority } => {
                buf.push(10);
                AuthorityPayload {
                    authority: *authority,
                }
                .serialize(&mut buf)?;
            }
            Self::MintTokens { holder, amount } => {
                buf.push(11);
                MintPayload {
                    holder: *holder,
                    amount: *amount,
                }
                .serialize(&mut buf)?;
            }
            Self::InitializeRegistry { config } => {
                buf.push(12);
                ConfigPayload { config: *config }.serialize(&mut buf)?;
            }
            Self::Stake { amount, activate } => {
                buf.push(13);
                StakePayload {
                    amount: *amount,
                    activate: *activate,
                }
                .serialize(&mut buf)?;
            }
            Self::Activate { amount } => {
                buf.push(14);
                AmountPayload { amount: *amount }.serialize(&mut buf)?;
            }
            Self::Deactivate { amount } => {
                buf.push(15);
                AmountPayload { amount: *amount }.serialize(&mut buf)?;
            }
            Self::ProcessDeactivation { juror } => {
                buf.push(16);
                JurorPayload { juror: *juror }.serialize(&mut buf)?;
            }
            Self::Unstake { amount } => {
                buf.push(17);
                AmountPayload { amount: *amount }.serialize(&mut buf)?;
            }
        }
        Ok(buf)
    }

    fn payload<T: BorshDeserialize>(rest: &[u8]) -> Result<T, ProgramError> {
        T::try_from_slice(rest).map_err(|_| ProgramError::InvalidInstructionData)
    }
}

/// Keys of the ledger accounts every coordinator instruction carries
#[derive(Debug, Clone, Copy)]
pub struct MigrationAccounts {
    pub controller: Pubkey,
    pub migrator: Pubkey,
    pub old_registry: Pubkey,
    pub new_registry: Pubkey,
    pub token_ledger: Pubkey,
}

/// Keys a registry instruction carries
#[derive(Debug, Clone, Copy)]
pub struct RegistryAccounts {
    pub controller: Pubkey,
    pub registry: Pubkey,
    pub token_ledger: Pubkey,
}

pub fn initialize_migrator(
    program_id: &Pubkey,
    deployer: &Pubkey,
    keys: &MigrationAccounts,
) -> Result<Instruction, ProgramError> {
    let accounts = vec![
        AccountMeta::new_readonly(*deployer, true),
        AccountMeta::new(keys.migrator, false),
        AccountMeta::new_readonly(keys.controller, false),
        AccountMeta::new_readonly(keys.old_registry, false),
        AccountMeta::new_readonly(keys.new_registry, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: MigratorInstruction::InitializeMigrator.pack()?,
    })
}

pub fn fund_escrow(
    program_id: &Pubkey,
    funds_governor: &Pubkey,
    keys: &MigrationAccounts,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: governed_accounts(program_id, funds_governor, keys),
        data: MigratorInstruction::FundEscrow.pack()?,
    })
}

pub fn migrate(
    program_id: &Pubkey,
    payer: &Pubkey,
    keys: &MigrationAccounts,
    juror: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let mut accounts = migration_accounts(program_id, payer, keys);
    accounts.extend(entry_pair(program_id, keys, juror));

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: MigratorInstruction::Migrate { juror: *juror }.pack()?,
    })
}

pub fn migrate_many(
    program_id: &Pubkey,
    payer: &Pubkey,
    keys: &MigrationAccounts,
    jurors: Vec<Pubkey>,
) -> Result<Instruction, ProgramError> {
    let mut accounts = migration_accounts(program_id, payer, keys);
    for juror in &jurors {
        accounts.extend(entry_pair(program_id, keys, juror));
    }

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: MigratorInstruction::MigrateMany { jurors }.pack()?,
    })
}

pub fn close(
    program_id: &Pubkey,
    funds_governor: &Pubkey,
    keys: &MigrationAccounts,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: governed_accounts(program_id, funds_governor, keys),
        data: MigratorInstruction::Close.pack()?,
    })
}

pub fn create_dispute(
    program_id: &Pubkey,
    subject: &Pubkey,
    controller: &Pubkey,
    module: &Pubkey,
    possible_rulings: u8,
) -> Result<Instruction, ProgramError> {
    let accounts = vec![
        AccountMeta::new_readonly(*subject, true),
        AccountMeta::new_readonly(*controller, false),
        AccountMeta::new(*module, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: MigratorInstruction::CreateDispute { possible_rulings }.pack()?,
    })
}

pub fn initialize_controller(
    program_id: &Pubkey,
    deployer: &Pubkey,
    controller: &Pubkey,
    governors: Governors,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: signed_pair(deployer, controller),
        data: MigratorInstruction::InitializeController { governors }.pack()?,
    })
}

pub fn set_module(
    program_id: &Pubkey,
    modules_governor: &Pubkey,
    controller: &Pubkey,
    module: ModuleId,
    address: &Pubkey,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: signed_pair(modules_governor, controller),
        data: MigratorInstruction::SetModule {
            module,
            address: *address,
        }
        .pack()?,
    })
}

pub fn heartbeat(
    program_id: &Pubkey,
    config_governor: &Pubkey,
    controller: &Pubkey,
    terms: u64,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: signed_pair(config_governor, controller),
        data: MigratorInstruction::Heartbeat { terms }.pack()?,
    })
}

pub fn initialize_dispute_manager(
    program_id: &Pubkey,
    deployer: &Pubkey,
    dispute_manager: &Pubkey,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: signed_pair(deployer, dispute_manager),
        data: MigratorInstruction::InitializeDisputeManager.pack()?,
    })
}

pub fn initialize_token_ledger(
    program_id: &Pubkey,
    deployer: &Pubkey,
    token_ledger: &Pubkey,
    authority: &Pubkey,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: signed_pair(deployer, token_ledger),
        data: MigratorInstruction::InitializeTokenLedger {
            authority: *authority,
        }
        .pack()?,
    })
}

pub fn mint_tokens(
    program_id: &Pubkey,
    authority: &Pubkey,
    token_ledger: &Pubkey,
    holder: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let (balance, _) = TokenBalancePDA::derive(program_id, token_ledger, holder);
    let accounts = vec![
        AccountMeta::new(*authority, true),
        AccountMeta::new(*token_ledger, false),
        AccountMeta::new(balance, false),
        AccountMeta::new_readonly(system_program::ID, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: MigratorInstruction::MintTokens {
            holder: *holder,
            amount,
        }
        .pack()?,
    })
}

pub fn initialize_registry(
    program_id: &Pubkey,
    deployer: &Pubkey,
    keys: &RegistryAccounts,
    config: RegistryConfig,
) -> Result<Instruction, ProgramError> {
    let accounts = vec![
        AccountMeta::new_readonly(*deployer, true),
        AccountMeta::new(keys.registry, false),
        AccountMeta::new_readonly(keys.controller, false),
        AccountMeta::new_readonly(keys.token_ledger, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: MigratorInstruction::InitializeRegistry { config }.pack()?,
    })
}

pub fn stake(
    program_id: &Pubkey,
    juror: &Pubkey,
    keys: &RegistryAccounts,
    amount: u64,
    activate: bool,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: custody_accounts(program_id, juror, keys),
        data: MigratorInstruction::Stake { amount, activate }.pack()?,
    })
}

pub fn unstake(
    program_id: &Pubkey,
    juror: &Pubkey,
    keys: &RegistryAccounts,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: custody_accounts(program_id, juror, keys),
        data: MigratorInstruction::Unstake { amount }.pack()?,
    })
}

pub fn activate(
    program_id: &Pubkey,
    juror: &Pubkey,
    keys: &RegistryAccounts,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: juror_accounts(program_id, juror, keys),
        data: MigratorInstruction::Activate { amount }.pack()?,
    })
}

pub fn deactivate(
    program_id: &Pubkey,
    juror: &Pubkey,
    keys: &RegistryAccounts,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: juror_accounts(program_id, juror, keys),
        data: MigratorInstruction::Deactivate { amount }.pack()?,
    })
}

pub fn process_deactivation(
    program_id: &Pubkey,
    keys: &RegistryAccounts,
    juror: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let (entry, _) = JurorEntryPDA::derive(program_id, &keys.registry, juror);
    let accounts = vec![
        AccountMeta::new_readonly(keys.controller, false),
        AccountMeta::new(keys.registry, false),
        AccountMeta::new(entry, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: MigratorInstruction::ProcessDeactivation { juror: *juror }.pack()?,
    })
}

fn signed_pair(signer: &Pubkey, account: &Pubkey) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new_readonly(*signer, true),
        AccountMeta::new(*account, false),
    ]
}

fn governed_accounts(
    program_id: &Pubkey,
    funds_governor: &Pubkey,
    keys: &MigrationAccounts,
) -> Vec<AccountMeta> {
    let (escrow, _) = TokenBalancePDA::derive(program_id, &keys.token_ledger, &keys.migrator);
    let (custody, _) = TokenBalancePDA::derive(program_id, &keys.token_ledger, &keys.old_registry);
    vec![
        AccountMeta::new(*funds_governor, true),
        AccountMeta::new_readonly(keys.controller, false),
        AccountMeta::new(keys.migrator, false),
        AccountMeta::new_readonly(keys.old_registry, false),
        AccountMeta::new_readonly(keys.new_registry, false),
        AccountMeta::new_readonly(keys.token_ledger, false),
        AccountMeta::new(escrow, false),
        AccountMeta::new(custody, false),
        AccountMeta::new_readonly(system_program::ID, false),
    ]
}

fn migration_accounts(program_id: &Pubkey, payer: &Pubkey, keys: &MigrationAccounts) -> Vec<AccountMeta> {
    let (escrow, _) = TokenBalancePDA::derive(program_id, &keys.token_ledger, &keys.migrator);
    let (custody, _) = TokenBalancePDA::derive(program_id, &keys.token_ledger, &keys.new_registry);
    vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new_readonly(keys.controller, false),
        AccountMeta::new(keys.migrator, false),
        AccountMeta::new(keys.old_registry, false),
        AccountMeta::new(keys.new_registry, false),
        AccountMeta::new_readonly(keys.token_ledger, false),
        AccountMeta::new(escrow, false),
        AccountMeta::new(custody, false),
        AccountMeta::new_readonly(system_program::ID, false),
    ]
}

fn entry_pair(program_id: &Pubkey, keys: &MigrationAccounts, juror: &Pubkey) -> [AccountMeta; 2] {
    let (old_entry, _) = JurorEntryPDA::derive(program_id, &keys.old_registry, juror);
    let (new_entry, _) = JurorEntryPDA::derive(program_id, &keys.new_registry, juror);
    [AccountMeta::new(old_entry, false), AccountMeta::new(new_entry, false)]
}

fn custody_accounts(program_id: &Pubkey, juror: &Pubkey, keys: &RegistryAccounts) -> Vec<AccountMeta> {
    let (juror_balance, _) = TokenBalancePDA::derive(program_id, &keys.token_ledger, juror);
    let (custody, _) = TokenBalancePDA::derive(program_id, &keys.token_ledger, &keys.registry);
    let (entry, _) = JurorEntryPDA::derive(program_id, &keys.registry, juror);
    vec![
        AccountMeta::new(*juror, true),
        AccountMeta::new_readonly(keys.controller, false),
        AccountMeta::new(keys.registry, false),
        AccountMeta::new_readonly(keys.token_ledger, false),
        AccountMeta::new(juror_balance, false),
        AccountMeta::new(custody, false),
        AccountMeta::new(entry, false),
        AccountMeta::new_readonly(system_program::ID, false),
    ]
}

fn juror_accounts(program_id: &Pubkey, juror: &Pubkey, keys: &RegistryAccounts) -> Vec<AccountMeta> {
    let (entry, _) = JurorEntryPDA::derive(program_id, &keys.registry, juror);
    vec![
        AccountMeta::new_readonly(*juror, true),
        AccountMeta::new_readonly(keys.controller, false),
        AccountMeta::new(keys.registry, false),
        AccountMeta::new(entry, false),
    ]
}
