use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::{
    constants::{TOKEN_BALANCE_DISCRIMINATOR, TOKEN_LEDGER_DISCRIMINATOR},
    error::MigratorError,
    state::AccountState,
};

/// Token custody. The ledger account holds supply and mint authority; each
/// holder's balance lives in its own account and only the balances loaded for
/// the current instruction are held in `balances`.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenLedger {
    pub discriminator: [u8; 8],
    pub is_initialized: bool,
    pub address: Pubkey,

    /// Only key allowed to mint
    pub authority: Pubkey,
    pub total_supply: u64,

    #[borsh_skip]
    balances: BTreeMap<Pubkey, u64>,
}

/// Holder balance account, one per ledger and holder
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    pub discriminator: [u8; 8],
    pub ledger: Pubkey,
    pub holder: Pubkey,
    pub amount: u64,
}

impl TokenBalance {
    pub const LEN: usize = 8 + 32 + 32 + 8;

    pub fn new(ledger: Pubkey, holder: Pubkey, amount: u64) -> Self {
        Self {
            discriminator: TOKEN_BALANCE_DISCRIMINATOR,
            ledger,
            holder,
            amount,
        }
    }
}

impl AccountState for TokenBalance {
    fn validate(&self) -> Result<(), ProgramError> {
        if self.discriminator != TOKEN_BALANCE_DISCRIMINATOR {
            return Err(MigratorError::InvalidDiscriminator.into());
        }
        Ok(())
    }
}

/// Saved balances of a fixed set of holders
#[derive(Debug, Clone)]
pub struct TokenSnapshot {
    balances: Vec<(Pubkey, Option<u64>)>,
}

impl TokenLedger {
    pub const LEN: usize = 8 + 1 + 32 + 32 + 8;

    pub fn new(address: Pubkey, authority: Pubkey) -> Self {
        Self {
            discriminator: TOKEN_LEDGER_DISCRIMINATOR,
            is_initialized: true,
            address,
            authority,
            total_supply: 0,
            balances: BTreeMap::new(),
        }
    }

    /// Hold a balance read from its account
    pub fn insert_balance(&mut self, holder: Pubkey, amount: u64) {
        self.balances.insert(holder, amount);
    }

    /// Balance held in the working set, if the holder was loaded or credited
    pub fn loaded_balance(&self, holder: &Pubkey) -> Option<u64> {
        self.balances.get(holder).copied()
    }

    pub fn balance_of(&self, holder: &Pubkey) -> u64 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    pub fn mint(&mut self, to: &Pubkey, amount: u64) -> Result<(), ProgramError> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(MigratorError::ArithmeticOverflow)?;
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(MigratorError::ArithmeticOverflow)?;

        self.total_supply = supply;
        self.balances.insert(*to, balance);
        Ok(())
    }

    pub fn transfer(&mut self, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<(), ProgramError> {
        if amount == 0 || from == to {
            return Ok(());
        }

        let from_balance = self
            .balance_of(from)
            .checked_sub(amount)
            .ok_or(MigratorError::InsufficientTokenBalance)?;
        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(MigratorError::ArithmeticOverflow)?;

        self.balances.insert(*from, from_balance);
        self.balances.insert(*to, to_balance);
        Ok(())
    }

    pub fn snapshot(&self, holders: &[Pubkey]) -> TokenSnapshot {
        TokenSnapshot {
            balances: holders
                .iter()
                .map(|holder| (*holder, self.balances.get(holder).copied()))
                .collect(),
        }
    }

    pub fn restore(&mut self, snapshot: TokenSnapshot) {
        for (holder, balance) in snapshot.balances {
            match balance {
                Some(amount) => self.balances.insert(holder, amount),
                None => self.balances.remove(&holder),
            };
        }
    }
}

impl AccountState for TokenLedger {
    fn validate(&self) -> Result<(), ProgramError> {
        if self.discriminator != TOKEN_LEDGER_DISCRIMINATOR {
            return Err(MigratorError::InvalidDiscriminator.into());
        }
        if !self.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }
        Ok(())
    }
}
