// Jurors registry migrator
// Native Solana implementation - NO ANCHOR

#[cfg(not(target_os = "solana"))]
pub mod audit;
pub mod constants;
pub mod cpi;
pub mod engine;
pub mod error;
pub mod events;
pub mod instruction;
pub mod ledger;
pub mod pda;
pub mod processor;
pub mod state;

pub use processor::process_instruction;

solana_program::declare_id!("JRMigrator111111111111111111111111111111111");

#[cfg(not(feature = "no-entrypoint"))]
solana_program::entrypoint!(process_instruction);
