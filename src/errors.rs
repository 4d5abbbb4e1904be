//! Error taxonomy for the ledger and the game engine.
//!
//! Every variant here is recoverable per call — the calling layer branches on
//! the kind to pick a response. Nothing is retried or swallowed internally;
//! storage failures abort the mutation and surface as `BankError::Storage`,
//! kept distinct from business-rule violations.

use std::time::Duration;

use crate::storage::StorageError;

/// Ledger (bank) operation failures.
#[derive(Debug, Clone)]
pub enum BankError {
    /// No account exists for the (scope, owner) key.
    NoAccount,
    /// An account already exists for the (scope, owner) key.
    AccountAlreadyExists,
    /// The account balance cannot cover the requested amount.
    InsufficientBalance,
    /// A negative amount was passed to an operation that requires >= 0.
    NegativeValue,
    /// Transfer where sender and receiver are the same account.
    SameSenderAndReceiver,
    /// Persistence failed; the mutation was rolled back, nothing committed.
    Storage(StorageError),
}

impl std::fmt::Display for BankError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAccount => write!(f, "no account exists for that owner in this scope"),
            Self::AccountAlreadyExists => write!(f, "an account already exists for that owner"),
            Self::InsufficientBalance => write!(f, "insufficient balance"),
            Self::NegativeValue => write!(f, "amount must not be negative"),
            Self::SameSenderAndReceiver => write!(f, "sender and receiver are the same account"),
            Self::Storage(e) => write!(f, "storage unavailable: {}", e),
        }
    }
}

impl std::error::Error for BankError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for BankError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

/// Game-layer failures (slot plays and paydays), wrapping bank failures.
#[derive(Debug, Clone)]
pub enum EconomyError {
    /// Bid outside the scope's [SLOT_MIN, SLOT_MAX] range.
    InvalidBid { min: i64, max: i64 },
    /// The throttled action was used too recently.
    OnCooldown { remaining: Duration },
    /// Underlying ledger failure.
    Bank(BankError),
}

impl std::fmt::Display for EconomyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBid { min, max } => {
                write!(f, "bid must be between {} and {}", min, max)
            }
            Self::OnCooldown { remaining } => {
                write!(f, "on cooldown for another {}s", remaining.as_secs())
            }
            Self::Bank(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EconomyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bank(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BankError> for EconomyError {
    fn from(e: BankError) -> Self {
        Self::Bank(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[test]
    fn test_display_messages() {
        assert!(BankError::NoAccount.to_string().contains("no account"));
        let e = EconomyError::InvalidBid { min: 5, max: 100 };
        assert!(e.to_string().contains("between 5 and 100"));
        let e = EconomyError::OnCooldown {
            remaining: Duration::from_secs(42),
        };
        assert!(e.to_string().contains("42"));
    }

    #[test]
    fn test_storage_error_is_distinct_kind() {
        let e = BankError::from(StorageError::Unavailable("save failed".into()));
        assert!(matches!(e, BankError::Storage(_)));
        assert!(e.to_string().contains("storage unavailable"));
    }
}
