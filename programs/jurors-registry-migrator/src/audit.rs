//! Offline balance reconciliation
//!
//! Compares a registry against an exported juror snapshot. Snapshot amounts
//! are decimal strings and juror ids base58 keys, as produced by the court
//! subgraph export:
//!
//! ```json
//! {"data":{"jurors":[{"id":"...","activeBalance":"100","availableBalance":"0",
//!   "lockedBalance":"0","deactivationBalance":"0"}]}}
//! ```

use std::{fmt, str::FromStr};

use serde::Deserialize;
use solana_program::{msg, pubkey::Pubkey};
use thiserror::Error;

use crate::ledger::{JurorBalance, StakeLedger};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(#[from] serde_json::Error),

    #[error("Invalid juror id {0}")]
    InvalidJurorId(String),

    #[error("Invalid {field} amount {value:?} for juror {juror}")]
    InvalidAmount {
        juror: String,
        field: &'static str,
        value: String,
    },

    #[error("Snapshot totals overflow")]
    Overflow,
}

#[derive(Deserialize)]
struct SnapshotFile {
    data: SnapshotData,
}

#[derive(Deserialize)]
struct SnapshotData {
    jurors: Vec<RawJuror>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawJuror {
    id: String,
    active_balance: String,
    available_balance: String,
    locked_balance: String,
    deactivation_balance: String,
}

/// One juror as recorded in an exported snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotJuror {
    pub id: Pubkey,
    pub balance: JurorBalance,
}

pub fn parse_snapshot(json: &str) -> Result<Vec<SnapshotJuror>, AuditError> {
    let file: SnapshotFile = serde_json::from_str(json)?;

    file.data
        .jurors
        .into_iter()
        .map(|raw| -> Result<SnapshotJuror, AuditError> {
            let id = Pubkey::from_str(&raw.id).map_err(|_| AuditError::InvalidJurorId(raw.id.clone()))?;
            let amount = |field: &'static str, value: &str| {
                value.parse::<u64>().map_err(|_| AuditError::InvalidAmount {
                    juror: raw.id.clone(),
                    field,
                    value: value.to_string(),
                })
            };

            Ok(SnapshotJuror {
                id,
                balance: JurorBalance {
                    active: amount("active", &raw.active_balance)?,
                    available: amount("available", &raw.available_balance)?,
                    locked: amount("locked", &raw.locked_balance)?,
                    pending_deactivation: amount("deactivation", &raw.deactivation_balance)?,
                },
            })
        })
        .collect()
}

/// Sums of each balance bucket over a set of jurors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerTotals {
    pub active: u64,
    pub available: u64,
    pub locked: u64,
    pub pending_deactivation: u64,
}

impl LedgerTotals {
    /// Totals as the registry reports them for `jurors`
    pub fn tally<'a, L: StakeLedger>(
        registry: &L,
        jurors: impl IntoIterator<Item = &'a Pubkey>,
    ) -> Result<Self, AuditError> {
        jurors
            .into_iter()
            .try_fold(Self::default(), |totals, juror| totals.add(&registry.balance_of(juror)))
    }

    /// Totals as recorded in a snapshot
    pub fn from_snapshot(snapshot: &[SnapshotJuror]) -> Result<Self, AuditError> {
        snapshot
            .iter()
            .try_fold(Self::default(), |totals, juror| totals.add(&juror.balance))
    }

    fn add(self, balance: &JurorBalance) -> Result<Self, AuditError> {
        Ok(Self {
            active: self.active.checked_add(balance.active).ok_or(AuditError::Overflow)?,
            available: self
                .available
                .checked_add(balance.available)
                .ok_or(AuditError::Overflow)?,
            locked: self.locked.checked_add(balance.locked).ok_or(AuditError::Overflow)?,
            pending_deactivation: self
                .pending_deactivation
                .checked_add(balance.pending_deactivation)
                .ok_or(AuditError::Overflow)?,
        })
    }
}

impl fmt::Display for LedgerTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "active: {}, available: {}, locked: {}, deactivation: {}",
            self.active, self.available, self.locked, self.pending_deactivation
        )
    }
}

/// Snapshot and registry disagree on a juror
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceMismatch {
    pub juror: Pubkey,
    pub expected: JurorBalance,
    pub actual: JurorBalance,
}

impl BalanceMismatch {
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.expected.active != self.actual.active {
            fields.push("active");
        }
        if self.expected.available != self.actual.available {
            fields.push("available");
        }
        if self.expected.locked != self.actual.locked {
            fields.push("locked");
        }
        if self.expected.pending_deactivation != self.actual.pending_deactivation {
            fields.push("deactivation");
        }
        fields
    }
}

/// Check every snapshot juror against the registry, logging one line per juror
pub fn verify_snapshot<L: StakeLedger>(registry: &L, snapshot: &[SnapshotJuror]) -> Vec<BalanceMismatch> {
    let mut mismatches = Vec::new();

    for entry in snapshot {
        let actual = registry.balance_of(&entry.id);
        if actual == entry.balance {
            msg!("Juror {}: fine", entry.id);
            continue;
        }

        let mismatch = BalanceMismatch {
            juror: entry.id,
            expected: entry.balance,
            actual,
        };
        msg!("Juror {}: {} do not match", entry.id, mismatch.fields().join(", "));
        mismatches.push(mismatch);
    }

    mismatches
}
