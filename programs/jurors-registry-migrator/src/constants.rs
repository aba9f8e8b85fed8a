//! Program-wide constants

/// Account discriminators
pub const MIGRATOR_DISCRIMINATOR: [u8; 8] = *b"JRM_MIGR";
pub const REGISTRY_DISCRIMINATOR: [u8; 8] = *b"JUR_REGY";
pub const JUROR_ENTRY_DISCRIMINATOR: [u8; 8] = *b"JUR_ENTR";
pub const CONTROLLER_DISCRIMINATOR: [u8; 8] = *b"CRT_CTRL";
pub const TOKEN_LEDGER_DISCRIMINATOR: [u8; 8] = *b"TKN_LDGR";
pub const TOKEN_BALANCE_DISCRIMINATOR: [u8; 8] = *b"TKN_BALN";
pub const DISPUTE_MANAGER_DISCRIMINATOR: [u8; 8] = *b"DSP_MNGR";

/// Maximum jurors per `MigrateMany` instruction. Each juror adds two entry
/// accounts and a key in the payload; eight of them plus the fixed accounts
/// fit in a single packet.
pub const MAX_MIGRATION_BATCH: usize = 8;

/// Checkpoints a balance history keeps: the value effective now and the one
/// scheduled for the next term
pub const MAX_CHECKPOINTS: usize = 2;

/// Ruling options accepted when creating a dispute
pub const MIN_RULING_OPTIONS: u8 = 2;
pub const MAX_RULING_OPTIONS: u8 = 3;

/// Activation and deactivation requests take effect this many terms later
pub const ACTIVATION_DELAY_TERMS: u64 = 1;

/// Marker line written before every event payload
pub const EVENT_LOG_MARKER: &str = "JURORS_MIGRATOR_EVENT";
