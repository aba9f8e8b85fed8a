//! Program derived addresses
//!
//! Juror entries and token balances each live in their own account so that an
//! instruction only loads the entries it touches.

use solana_program::pubkey::Pubkey;

/// PDA seed constants
pub mod seeds {
    pub const JUROR_ENTRY: &[u8] = b"juror_entry";
    pub const TOKEN_BALANCE: &[u8] = b"token_balance";
}

/// One juror's balances within one registry
pub struct JurorEntryPDA;

impl JurorEntryPDA {
    pub fn derive(program_id: &Pubkey, registry: &Pubkey, juror: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[seeds::JUROR_ENTRY, registry.as_ref(), juror.as_ref()],
            program_id,
        )
    }
}

/// One holder's balance within one token ledger
pub struct TokenBalancePDA;

impl TokenBalancePDA {
    pub fn derive(program_id: &Pubkey, ledger: &Pubkey, holder: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[seeds::TOKEN_BALANCE, ledger.as_ref(), holder.as_ref()],
            program_id,
        )
    }
}
