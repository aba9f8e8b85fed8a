pub mod controller;
pub mod dispute_manager;
pub mod migrator;

pub use controller::*;
pub use dispute_manager::*;
pub use migrator::*;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::error::MigratorError;

/// Persistent account layout with a discriminator check
pub trait AccountState: BorshSerialize + BorshDeserialize {
    fn validate(&self) -> Result<(), ProgramError>;
}

/// Deserialize program-owned state. Trailing padding in the account is ignored.
pub fn load_state<T: AccountState>(info: &AccountInfo, program_id: &Pubkey) -> Result<T, ProgramError> {
    if info.owner != program_id {
        return Err(ProgramError::IncorrectProgramId);
    }

    let data = info.try_borrow_data()?;
    let state = T::deserialize(&mut &data[..])?;
    state.validate()?;
    Ok(state)
}

pub fn store_state<T: AccountState>(state: &T, info: &AccountInfo) -> ProgramResult {
    if !info.is_writable {
        return Err(ProgramError::InvalidArgument);
    }

    state.serialize(&mut &mut info.try_borrow_mut_data()?[..])?;
    Ok(())
}

/// First eight bytes of an account's data
pub fn read_discriminator(info: &AccountInfo) -> Result<[u8; 8], ProgramError> {
    let data = info.try_borrow_data()?;
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(data.get(..8).ok_or(ProgramError::AccountDataTooSmall)?);
    Ok(discriminator)
}

/// Check a program-owned account is large enough and not yet initialized
pub fn ensure_blank(info: &AccountInfo, program_id: &Pubkey, len: usize) -> ProgramResult {
    if info.owner != program_id {
        return Err(ProgramError::IncorrectProgramId);
    }
    if info.data_len() < len {
        return Err(ProgramError::AccountDataTooSmall);
    }
    if read_discriminator(info)? != [0u8; 8] {
        return Err(MigratorError::AlreadyInitialized.into());
    }
    Ok(())
}

/// No state stored yet: either not allocated by this program or still zeroed
pub fn is_blank(info: &AccountInfo, program_id: &Pubkey) -> Result<bool, ProgramError> {
    if info.owner != program_id {
        return Ok(true);
    }
    Ok(info.data_is_empty() || read_discriminator(info)? == [0u8; 8])
}
