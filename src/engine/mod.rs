//! Pure computation engine(s) for the expense ledger.

use crate::domain::ValidationError;
use crate::storage::StorageError;
use thiserror::Error;

pub mod ledger;
pub mod settlement;

pub use ledger::Ledger;
pub use settlement::SettlementEngine;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Not found: {0}")]
    NotFound(String),
    /// Balances do not sum to zero. Always an upstream bug.
    #[error("Unbalanced ledger: {0}")]
    Unbalanced(String),
    #[error("Ledger inconsistency: {0}")]
    Consistency(String),
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StorageError),
    #[error("Command cannot {action} while {state}")]
    InvalidCommandState {
        action: &'static str,
        state: &'static str,
    },
}

impl LedgerError {
    pub fn is_consistency(&self) -> bool {
        matches!(self, LedgerError::Unbalanced(_) | LedgerError::Consistency(_))
    }
}
