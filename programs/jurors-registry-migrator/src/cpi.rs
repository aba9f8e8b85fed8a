//! System program CPI helpers

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    program::invoke_signed,
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    system_program,
    sysvar::Sysvar,
};

/// Create a rent-exempt PDA owned by `owner`
pub fn create_pda_account<'a>(
    payer: &AccountInfo<'a>,
    pda_account: &AccountInfo<'a>,
    space: usize,
    owner: &Pubkey,
    system_program: &AccountInfo<'a>,
    signer_seeds: &[&[u8]],
) -> ProgramResult {
    if system_program.key != &system_program::ID {
        return Err(ProgramError::IncorrectProgramId);
    }
    if !payer.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    let lamports = Rent::get()?.minimum_balance(space);
    invoke_signed(
        &system_instruction::create_account(payer.key, pda_account.key, lamports, space as u64, owner),
        &[payer.clone(), pda_account.clone(), system_program.clone()],
        &[signer_seeds],
    )
}
