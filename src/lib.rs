pub mod api;
pub mod command;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod notify;
pub mod service;
pub mod storage;

pub use command::{Command, CommandHistory, UndoOutcome};
pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Currency, Debt, Event, EventId, Expense, ExpenseDraft, ExpenseId, Money, Participant,
    ParticipantId, SplitStrategy, TimeMs,
};
pub use engine::{Ledger, LedgerError, SettlementEngine};
pub use error::AppError;
pub use notify::{BroadcastNotifier, ChangeNotice, Notifier};
pub use service::{LedgerService, LedgerSettings};
pub use storage::{MemoryStorage, Storage, StorageError};
