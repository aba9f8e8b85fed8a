//! Event logging for the migrator
//!
//! Events are borsh payloads written to the program log. Each one is emitted
//! at the point its state change commits and handed back to the caller.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{msg, pubkey::Pubkey};

use crate::{constants::EVENT_LOG_MARKER, state::ModuleId};

/// Event type discriminator
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    // Coordinator events
    TokensMigrated = 1,
    MigrationClosed = 2,
    EscrowFunded = 3,
    MigrationBatchHalted = 4,

    // Ledger events
    FundsRecovered = 10,

    // Controller events
    ModuleSet = 20,
    DisputeCreated = 21,
}

/// Base event trait
pub trait Event: BorshSerialize {
    fn event_type() -> EventType;

    fn emit(&self) {
        msg!("{}", EVENT_LOG_MARKER);
        msg!("TYPE:{:?}", Self::event_type());

        if let Ok(data) = self.try_to_vec() {
            msg!("DATA:{}", bs58::encode(&data).into_string());
        }
    }
}

/// Decode the `DATA:` line of an emitted event
pub fn decode_event_data<T: BorshDeserialize>(line: &str) -> Option<T> {
    let encoded = line.strip_prefix("DATA:")?;
    let bytes = bs58::decode(encoded).into_vec().ok()?;
    T::try_from_slice(&bytes).ok()
}

#[macro_export]
macro_rules! define_event {
    ($name:ident { $($field:ident: $type:ty),* $(,)? }) => {
        #[derive(::borsh::BorshSerialize, ::borsh::BorshDeserialize, Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            $(pub $field: $type,)*
        }

        impl $crate::events::Event for $name {
            fn event_type() -> $crate::events::EventType {
                $crate::events::EventType::$name
            }
        }
    };
}

// === Coordinator Events ===

define_event!(TokensMigrated {
    juror: Pubkey,
    amount: u64,
});

define_event!(MigrationClosed {
    amount: u64,
});

define_event!(EscrowFunded {
    amount: u64,
});

define_event!(MigrationBatchHalted {
    juror: Pubkey,
    index: u16,
    error_code: u64,
});

// === Ledger Events ===

define_event!(FundsRecovered {
    recipient: Pubkey,
    amount: u64,
});

// === Controller Events ===

define_event!(ModuleSet {
    module: ModuleId,
    address: Pubkey,
});

define_event!(DisputeCreated {
    dispute_id: u64,
    subject: Pubkey,
    possible_rulings: u8,
});
