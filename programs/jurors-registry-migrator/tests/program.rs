mod common;

use borsh::BorshDeserialize;
use common::*;
use jurors_registry_migrator::{
    instruction::{self, MigrationAccounts, RegistryAccounts},
    ledger::{JurorBalance, JurorEntry, JurorsRegistry, RegistryConfig, TokenBalance, TokenLedger},
    pda::{JurorEntryPDA, TokenBalancePDA},
    process_instruction,
    state::{Controller, DisputeManager, Governors, MigrationPhase, MigratorState, ModuleId},
};
use solana_program::{instruction::Instruction, pubkey::Pubkey, rent::Rent, system_program};
use solana_program_test::*;
use solana_sdk::{
    account::Account,
    signature::{Keypair, Signer},
    transaction::Transaction,
};

fn blank_account(program_id: &Pubkey, len: usize) -> Account {
    Account {
        lamports: Rent::default().minimum_balance(len),
        data: vec![0; len],
        owner: *program_id,
        executable: false,
        rent_epoch: 0,
    }
}

fn wallet() -> Account {
    Account {
        lamports: 10_000_000_000,
        data: Vec::new(),
        owner: system_program::ID,
        executable: false,
        rent_epoch: 0,
    }
}

/// Court accounts on a test bank. Headers are pre-allocated; entry and
/// balance accounts are created by the program on first write.
struct Court {
    banks_client: BanksClient,
    payer: Keypair,
    recent_blockhash: solana_sdk::hash::Hash,
    program_id: Pubkey,
    funds: Keypair,
    config: Keypair,
    modules: Keypair,
    keys: MigrationAccounts,
    dispute_manager: Pubkey,
}

impl Court {
    async fn start(wallets: &[Pubkey]) -> Self {
        let program_id = jurors_registry_migrator::id();
        let (funds, config, modules) = (Keypair::new(), Keypair::new(), Keypair::new());
        let keys = MigrationAccounts {
            controller: Pubkey::new_unique(),
            migrator: Pubkey::new_unique(),
            old_registry: Pubkey::new_unique(),
            new_registry: Pubkey::new_unique(),
            token_ledger: Pubkey::new_unique(),
        };
        let dispute_manager = Pubkey::new_unique();

        let mut program_test = ProgramTest::new(
            "jurors_registry_migrator",
            program_id,
            processor!(process_instruction),
        );
        program_test.add_account(keys.controller, blank_account(&program_id, Controller::LEN));
        program_test.add_account(keys.token_ledger, blank_account(&program_id, TokenLedger::LEN));
        program_test.add_account(dispute_manager, blank_account(&program_id, DisputeManager::LEN));
        program_test.add_account(keys.old_registry, blank_account(&program_id, JurorsRegistry::LEN));
        program_test.add_account(keys.new_registry, blank_account(&program_id, JurorsRegistry::LEN));
        program_test.add_account(keys.migrator, blank_account(&program_id, MigratorState::LEN));
        program_test.add_account(funds.pubkey(), wallet());
        for key in wallets {
            program_test.add_account(*key, wallet());
        }

        let (banks_client, payer, recent_blockhash) = program_test.start().await;
        let mut court = Self {
            banks_client,
            payer,
            recent_blockhash,
            program_id,
            funds,
            config,
            modules,
            keys,
            dispute_manager,
        };

        // Step 1: controller, token ledger, dispute manager and both registries
        let governors = Governors {
            funds: court.funds.pubkey(),
            config: court.config.pubkey(),
            modules: court.modules.pubkey(),
        };
        let registry_config = RegistryConfig {
            min_active_balance: MIN_ACTIVE_BALANCE,
            total_active_balance_limit: ACTIVE_BALANCE_LIMIT,
        };
        let deployer = court.payer.pubkey();
        let instructions = vec![
            instruction::initialize_controller(&program_id, &deployer, &keys.controller, governors).unwrap(),
            instruction::initialize_token_ledger(&program_id, &deployer, &keys.token_ledger, &deployer).unwrap(),
            instruction::initialize_dispute_manager(&program_id, &deployer, &dispute_manager).unwrap(),
            instruction::initialize_registry(&program_id, &deployer, &court.registry_keys(keys.old_registry), registry_config)
                .unwrap(),
            instruction::initialize_registry(&program_id, &deployer, &court.registry_keys(keys.new_registry), registry_config)
                .unwrap(),
        ];
        court.send(&instructions, &[]).await.unwrap();

        // Step 2: the old registry and dispute manager are in service
        let modules = court.modules.pubkey();
        let instructions = vec![
            instruction::set_module(&program_id, &modules, &keys.controller, ModuleId::DisputeManager, &dispute_manager)
                .unwrap(),
            instruction::set_module(&program_id, &modules, &keys.controller, ModuleId::JurorsRegistry, &keys.old_registry)
                .unwrap(),
        ];
        let signer = Keypair::from_bytes(&court.modules.to_bytes()).unwrap();
        court.send(&instructions, &[&signer]).await.unwrap();

        court
    }

    fn registry_keys(&self, registry: Pubkey) -> RegistryAccounts {
        RegistryAccounts {
            controller: self.keys.controller,
            registry,
            token_ledger: self.keys.token_ledger,
        }
    }

    async fn send(&mut self, instructions: &[Instruction], signers: &[&Keypair]) -> Result<(), BanksClientError> {
        let mut all_signers = vec![&self.payer];
        all_signers.extend_from_slice(signers);
        let transaction = Transaction::new_signed_with_payer(
            instructions,
            Some(&self.payer.pubkey()),
            &all_signers,
            self.recent_blockhash,
        );
        self.banks_client.process_transaction(transaction).await
    }

    /// Mint to `juror` and stake it on the old registry
    async fn stake(&mut self, juror: &Keypair, amount: u64, activate: bool) {
        let keys = self.registry_keys(self.keys.old_registry);
        let instructions = vec![
            instruction::mint_tokens(&self.program_id, &self.payer.pubkey(), &self.keys.token_ledger, &juror.pubkey(), amount)
                .unwrap(),
            instruction::stake(&self.program_id, &juror.pubkey(), &keys, amount, activate).unwrap(),
        ];
        self.send(&instructions, &[juror]).await.unwrap();
    }

    /// Advance a term, hand both slots over and open the coordinator
    async fn start_migration(&mut self) {
        let config = Keypair::from_bytes(&self.config.to_bytes()).unwrap();
        let modules = Keypair::from_bytes(&self.modules.to_bytes()).unwrap();
        let funds = Keypair::from_bytes(&self.funds.to_bytes()).unwrap();
        let program_id = self.program_id;
        let keys = self.keys;
        let instructions = vec![
            instruction::heartbeat(&program_id, &config.pubkey(), &keys.controller, 1).unwrap(),
            instruction::set_module(&program_id, &modules.pubkey(), &keys.controller, ModuleId::JurorsRegistry, &keys.new_registry)
                .unwrap(),
            instruction::set_module(&program_id, &modules.pubkey(), &keys.controller, ModuleId::DisputeManager, &keys.migrator)
                .unwrap(),
            instruction::initialize_migrator(&program_id, &self.payer.pubkey(), &keys).unwrap(),
            instruction::fund_escrow(&program_id, &funds.pubkey(), &keys).unwrap(),
        ];
        self.send(&instructions, &[&config, &modules, &funds]).await.unwrap();
    }

    async fn load<T: BorshDeserialize>(&mut self, key: Pubkey) -> Option<T> {
        let account = self.banks_client.get_account(key).await.unwrap()?;
        Some(T::deserialize(&mut &account.data[..]).unwrap())
    }

    async fn balance_in(&mut self, registry: Pubkey, juror: &Pubkey, term: u64) -> JurorBalance {
        let mut header: JurorsRegistry = self.load(registry).await.unwrap();
        let (entry, _) = JurorEntryPDA::derive(&self.program_id, &registry, juror);
        if let Some(entry) = self.load::<JurorEntry>(entry).await {
            header.insert_entry(*juror, entry.account);
        }
        header.balance_of_at(juror, term)
    }

    async fn token_balance(&mut self, holder: &Pubkey) -> u64 {
        let (key, _) = TokenBalancePDA::derive(&self.program_id, &self.keys.token_ledger, holder);
        self.load::<TokenBalance>(key)
            .await
            .map(|balance| balance.amount)
            .unwrap_or(0)
    }
}

#[tokio::test]
async fn test_migration_lifecycle_on_bank() {
    let jurors: Vec<Keypair> = (0..3).map(|_| Keypair::new()).collect();
    let juror200 = Keypair::new();
    let amounts = [tokens(10_000), tokens(50_000), tokens(35_123)];

    let wallets: Vec<Pubkey> = jurors.iter().chain([&juror200]).map(|juror| juror.pubkey()).collect();
    let mut court = Court::start(&wallets).await;
    for (juror, amount) in jurors.iter().zip(amounts) {
        court.stake(juror, amount, true).await;
    }
    court.stake(&juror200, tokens(200), false).await;

    court.start_migration().await;
    let keys = court.keys;
    let state: MigratorState = court.load(keys.migrator).await.unwrap();
    assert_eq!(state.phase, MigrationPhase::Open);
    assert_eq!(state.total_swept, tokens(95_323));
    assert_eq!(court.token_balance(&keys.migrator).await, tokens(95_323));

    // Migrate every active juror in one batch
    let program_id = court.program_id;
    let payer = court.payer.pubkey();
    let keys_for_batch: Vec<Pubkey> = jurors.iter().map(|juror| juror.pubkey()).collect();
    let batch = instruction::migrate_many(&program_id, &payer, &keys, keys_for_batch).unwrap();
    court.send(&[batch], &[]).await.unwrap();

    for (juror, amount) in jurors.iter().zip(amounts) {
        let juror = juror.pubkey();
        assert_eq!(court.balance_in(keys.old_registry, &juror, 2).await, JurorBalance::default());
        assert_eq!(court.balance_in(keys.new_registry, &juror, 1).await, JurorBalance::default());
        assert_eq!(court.balance_in(keys.new_registry, &juror, 2).await, active(amount));
    }
    assert_eq!(
        court.balance_in(keys.old_registry, &juror200.pubkey(), 2).await,
        available(tokens(200))
    );

    // Return what is left to the old registry
    let funds = Keypair::from_bytes(&court.funds.to_bytes()).unwrap();
    let close = instruction::close(&program_id, &funds.pubkey(), &keys).unwrap();
    court.send(&[close], &[&funds]).await.unwrap();

    let state: MigratorState = court.load(keys.migrator).await.unwrap();
    assert_eq!(state.phase, MigrationPhase::Closed);
    assert_eq!(court.token_balance(&keys.migrator).await, 0);
    assert_eq!(court.token_balance(&keys.old_registry).await, tokens(200));
    assert_eq!(court.token_balance(&keys.new_registry).await, tokens(95_123));

    // Headers kept the size they were allocated with
    let header = court.banks_client.get_account(keys.new_registry).await.unwrap().unwrap();
    assert_eq!(header.data.len(), JurorsRegistry::LEN);
}

#[tokio::test]
async fn test_close_rejects_wrong_governor() {
    let juror = Keypair::new();
    let mut court = Court::start(&[juror.pubkey()]).await;
    court.stake(&juror, tokens(1_000), true).await;
    court.start_migration().await;

    // Payer is not the funds governor
    let keys = court.keys;
    let close = instruction::close(&court.program_id, &court.payer.pubkey(), &keys).unwrap();
    assert!(court.send(&[close], &[]).await.is_err());

    let state: MigratorState = court.load(keys.migrator).await.unwrap();
    assert_eq!(state.phase, MigrationPhase::Open);

    // Dispute creation stays blocked while the coordinator holds the slot
    let subject = court.payer.pubkey();
    let dispute_manager = court.dispute_manager;
    let dispute = instruction::create_dispute(&court.program_id, &subject, &keys.controller, &dispute_manager, 2).unwrap();
    assert!(court.send(&[dispute], &[]).await.is_err());
}
