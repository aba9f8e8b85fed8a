//! Error types for the jurors registry migrator

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use solana_program::{
    decode_error::DecodeError,
    msg,
    program_error::{PrintProgramError, ProgramError},
};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, Error, FromPrimitive, PartialEq)]
pub enum MigratorError {
    // Coordinator errors (0-99)
    #[error("Balance to migrate is zero")]
    NoBalanceToMigrate = 0,

    #[error("Sender is not the funds governor")]
    Unauthorized = 1,

    #[error("Migration in progress")]
    MigrationInProgress = 2,

    #[error("Escrow balance cannot cover the migration")]
    InsufficientEscrow = 3,

    #[error("Migration already closed")]
    MigrationClosed = 4,

    #[error("Escrow has not been funded")]
    EscrowNotFunded = 5,

    #[error("Escrow already funded")]
    EscrowAlreadyFunded = 6,

    #[error("Empty migration batch")]
    EmptyBatch = 7,

    #[error("Migration batch too large")]
    BatchTooLarge = 8,

    #[error("Escrow custody does not match accounted balance")]
    EscrowMismatch = 9,

    // Registry errors (100-199)
    #[error("Total active balance limit exceeded")]
    TotalActiveBalanceExceeded = 100,

    #[error("Active balance below minimum")]
    ActiveBalanceBelowMin = 101,

    #[error("Insufficient available balance")]
    InsufficientAvailableBalance = 102,

    #[error("Insufficient active balance")]
    InsufficientActiveBalance = 103,

    #[error("Amount must be greater than zero")]
    InvalidZeroAmount = 104,

    #[error("Sender is not the dispute manager")]
    SenderNotDisputeManager = 105,

    #[error("Cannot write balance history for a past term")]
    CannotRewriteTermHistory = 106,

    #[error("Invalid registry configuration")]
    InvalidRegistryConfig = 107,

    #[error("Insufficient locked balance")]
    InsufficientLockedBalance = 108,

    // Token errors (200-299)
    #[error("Insufficient token balance")]
    InsufficientTokenBalance = 200,

    #[error("Sender is not the mint authority")]
    SenderNotMintAuthority = 201,

    // Controller errors (300-399)
    #[error("Sender is not the modules governor")]
    SenderNotModulesGovernor = 300,

    #[error("Module not set")]
    ModuleNotSet = 301,

    #[error("Invalid number of ruling options")]
    InvalidRulingOptions = 303,

    #[error("Sender is not the config governor")]
    SenderNotConfigGovernor = 304,

    // Account errors (400-499)
    #[error("Invalid account discriminator")]
    InvalidDiscriminator = 400,

    #[error("Account already initialized")]
    AlreadyInitialized = 401,

    #[error("Account does not match configured key")]
    AccountMismatch = 402,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow = 403,

    #[error("Account is not the expected program address")]
    InvalidPda = 404,
}

/// How a caller should read a failed operation
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureClass {
    /// The juror has nothing left to migrate. Expected on a repeat attempt.
    AlreadyMigrated,
    /// The caller lacks the role the operation requires.
    Unauthorized,
    /// A ledger capacity limit was hit; may succeed once capacity frees up.
    LimitExceeded,
    /// Any other rejection.
    Rejected,
}

impl MigratorError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::NoBalanceToMigrate => FailureClass::AlreadyMigrated,
            Self::Unauthorized
            | Self::SenderNotModulesGovernor
            | Self::SenderNotConfigGovernor
            | Self::SenderNotMintAuthority
            | Self::SenderNotDisputeManager => FailureClass::Unauthorized,
            Self::TotalActiveBalanceExceeded => FailureClass::LimitExceeded,
            _ => FailureClass::Rejected,
        }
    }
}

/// Classify an error coming back from any program operation
pub fn classify(error: &ProgramError) -> FailureClass {
    match error {
        ProgramError::Custom(code) => MigratorError::from_u32(*code)
            .map(|e| e.class())
            .unwrap_or(FailureClass::Rejected),
        _ => FailureClass::Rejected,
    }
}

impl PrintProgramError for MigratorError {
    fn print<E>(&self) {
        msg!("Jurors Registry Migrator Error: {}", self);
    }
}

impl From<MigratorError> for ProgramError {
    fn from(e: MigratorError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for MigratorError {
    fn type_of() -> &'static str {
        "MigratorError"
    }
}
