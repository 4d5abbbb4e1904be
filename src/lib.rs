//! slotbank — per-scope credit ledger with a slot-machine payout engine.
//!
//! The ledger tracks an integer credit balance per (scope, owner) pair with
//! strict atomicity and non-negativity guarantees; the game engine spins
//! three reels over a fixed cyclic symbol wheel and settles the bet against
//! the ledger. Persistence is two JSON documents behind small store traits.
//! The chat/command dispatcher is an external collaborator; the `slotbank`
//! binary is a minimal local stand-in.

pub mod bank;
pub mod cooldown;
pub mod economy;
pub mod errors;
pub mod models;
pub mod settings;
pub mod slots;
pub mod storage;

pub use bank::Bank;
pub use cooldown::{CooldownStatus, CooldownTracker};
pub use economy::{Economy, Payday};
pub use errors::{BankError, EconomyError};
pub use models::{Account, ScopeSettings, SettingKey};
pub use settings::SettingsStore;
pub use slots::{SlotMachine, SpinOutcome, Symbol, PAYOUT_RULES};
pub use storage::{
    JsonFileLedger, JsonFileSettings, LedgerStore, MemoryLedger, MemorySettings, SettingsBackend,
    StorageError,
};
