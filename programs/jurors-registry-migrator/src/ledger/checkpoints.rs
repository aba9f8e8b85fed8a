use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::program_error::ProgramError;

use crate::{constants::MAX_CHECKPOINTS, error::MigratorError};

/// Value recorded as effective from `term` onward
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub term: u64,
    pub value: u64,
}

/// Term-indexed value history. Terms are strictly increasing. Values that
/// stopped being effective before the current term are dropped on write, so
/// lookups are exact from the current term onward.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoints {
    history: Vec<Checkpoint>,
}

impl Checkpoints {
    /// Serialized size at full capacity
    pub const LEN: usize = 4 + MAX_CHECKPOINTS * (8 + 8);

    /// Most recently scheduled value, including values effective in future terms
    pub fn latest(&self) -> u64 {
        self.history.last().map(|c| c.value).unwrap_or(0)
    }

    /// Value effective at `term`
    pub fn get(&self, term: u64) -> u64 {
        let idx = self.history.partition_point(|c| c.term <= term);
        if idx == 0 {
            0
        } else {
            self.history[idx - 1].value
        }
    }

    /// Record `value` as effective from `term`. Overwrites a checkpoint for the
    /// same term; rejects terms older than the last checkpoint.
    pub fn add(&mut self, term: u64, value: u64) -> Result<(), ProgramError> {
        match self.history.last_mut() {
            Some(last) if last.term == term => last.value = value,
            Some(last) if last.term > term => {
                return Err(MigratorError::CannotRewriteTermHistory.into());
            }
            _ => self.history.push(Checkpoint { term, value }),
        }
        Ok(())
    }

    /// Fails if `add(term, _)` would be rejected
    pub fn ensure_writable(&self, term: u64) -> Result<(), ProgramError> {
        match self.history.last() {
            Some(last) if last.term > term => Err(MigratorError::CannotRewriteTermHistory.into()),
            _ => Ok(()),
        }
    }

    /// Drop checkpoints superseded at or before `current_term`
    pub fn prune(&mut self, current_term: u64) {
        let superseded = self
            .history
            .windows(2)
            .take_while(|pair| pair[1].term <= current_term)
            .count();
        self.history.drain(..superseded);
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
