//! Undoable ledger mutations.
//!
//! Each command touches storage first and the in-memory ledger second, so a
//! failed storage call leaves the ledger exactly as it was.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;

use crate::domain::{Expense, ExpenseDraft, ExpenseId};
use crate::engine::{Ledger, LedgerError};
use crate::notify::ChangeNotice;
use crate::storage::Storage;

/// What a command operates on: the working ledger and the storage it persists to.
pub struct CommandContext<'a> {
    pub ledger: &'a mut Ledger,
    pub storage: &'a dyn Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Created,
    Executed,
    Undone,
}

impl CommandState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandState::Created => "created",
            CommandState::Executed => "executed",
            CommandState::Undone => "undone",
        }
    }
}

fn expect_state(
    actual: CommandState,
    expected: CommandState,
    action: &'static str,
) -> Result<(), LedgerError> {
    if actual != expected {
        return Err(LedgerError::InvalidCommandState {
            action,
            state: actual.as_str(),
        });
    }
    Ok(())
}

#[async_trait]
pub trait Command: Send + Sync + fmt::Debug {
    /// `Created -> Executed`.
    async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), LedgerError>;

    /// `Executed -> Undone`. Reverses exactly what `execute` did.
    async fn undo(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), LedgerError>;

    fn state(&self) -> CommandState;

    /// The expense this command created, removed or edited, once executed.
    fn expense_id(&self) -> Option<ExpenseId>;

    fn notice(&self) -> Option<ChangeNotice>;

    fn undo_notice(&self) -> Option<ChangeNotice>;

    fn describe(&self) -> String;
}

#[derive(Debug)]
pub struct AddExpense {
    draft: ExpenseDraft,
    state: CommandState,
    added: Option<Expense>,
}

impl AddExpense {
    pub fn new(draft: ExpenseDraft) -> Self {
        Self {
            draft,
            state: CommandState::Created,
            added: None,
        }
    }

    pub fn expense(&self) -> Option<&Expense> {
        self.added.as_ref()
    }
}

#[async_trait]
impl Command for AddExpense {
    async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), LedgerError> {
        expect_state(self.state, CommandState::Created, "execute")?;
        ctx.ledger.validate(&self.draft)?;

        let expense = ctx
            .storage
            .save_expense(ctx.ledger.event_id(), &self.draft)
            .await?;
        if let Err(e) = ctx.ledger.insert_entry(expense.clone()) {
            tracing::error!(expense_id = %expense.id, error = %e, "saved expense rejected by ledger");
            ctx.storage.delete_expense(expense.id).await?;
            return Err(e);
        }

        self.added = Some(expense);
        self.state = CommandState::Executed;
        Ok(())
    }

    async fn undo(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), LedgerError> {
        expect_state(self.state, CommandState::Executed, "undo")?;
        let id = match &self.added {
            Some(expense) => expense.id,
            None => return Err(LedgerError::Consistency("executed add has no expense".into())),
        };

        ctx.storage.delete_expense(id).await?;
        ctx.ledger.remove_entry(id)?;
        self.state = CommandState::Undone;
        Ok(())
    }

    fn state(&self) -> CommandState {
        self.state
    }

    fn expense_id(&self) -> Option<ExpenseId> {
        self.added.as_ref().map(|e| e.id)
    }

    fn notice(&self) -> Option<ChangeNotice> {
        self.expense_id()
            .map(|expense| ChangeNotice::EntryAdded { expense })
    }

    fn undo_notice(&self) -> Option<ChangeNotice> {
        self.expense_id()
            .map(|expense| ChangeNotice::EntryRemoved { expense })
    }

    fn describe(&self) -> String {
        format!("add expense \"{}\"", self.draft.title)
    }
}

#[derive(Debug)]
pub struct RemoveExpense {
    id: ExpenseId,
    state: CommandState,
    removed: Option<(usize, Expense)>,
}

impl RemoveExpense {
    pub fn new(id: ExpenseId) -> Self {
        Self {
            id,
            state: CommandState::Created,
            removed: None,
        }
    }
}

#[async_trait]
impl Command for RemoveExpense {
    async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), LedgerError> {
        expect_state(self.state, CommandState::Created, "execute")?;
        if ctx.ledger.get(self.id).is_none() {
            return Err(LedgerError::NotFound(format!("expense {}", self.id)));
        }

        if !ctx.storage.delete_expense(self.id).await? {
            tracing::warn!(expense_id = %self.id, "expense missing from storage during removal");
        }
        self.removed = Some(ctx.ledger.remove_entry(self.id)?);
        self.state = CommandState::Executed;
        Ok(())
    }

    async fn undo(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), LedgerError> {
        expect_state(self.state, CommandState::Executed, "undo")?;
        let (position, expense) = match &self.removed {
            Some((position, expense)) => (*position, expense.clone()),
            None => {
                return Err(LedgerError::Consistency(
                    "executed removal has no expense".into(),
                ))
            }
        };

        // Members may have changed since the removal.
        ctx.ledger.check_restore(&expense)?;
        ctx.storage.restore_expense(&expense).await?;
        ctx.ledger.restore_entry(position, expense)?;
        self.state = CommandState::Undone;
        Ok(())
    }

    fn state(&self) -> CommandState {
        self.state
    }

    fn expense_id(&self) -> Option<ExpenseId> {
        Some(self.id)
    }

    fn notice(&self) -> Option<ChangeNotice> {
        Some(ChangeNotice::EntryRemoved { expense: self.id })
    }

    fn undo_notice(&self) -> Option<ChangeNotice> {
        Some(ChangeNotice::EntryAdded { expense: self.id })
    }

    fn describe(&self) -> String {
        match &self.removed {
            Some((_, expense)) => format!("remove expense \"{}\"", expense.title),
            None => format!("remove expense {}", self.id),
        }
    }
}

#[derive(Debug)]
pub struct EditExpense {
    id: ExpenseId,
    draft: ExpenseDraft,
    state: CommandState,
    previous: Option<Expense>,
}

impl EditExpense {
    pub fn new(id: ExpenseId, draft: ExpenseDraft) -> Self {
        Self {
            id,
            draft,
            state: CommandState::Created,
            previous: None,
        }
    }
}

#[async_trait]
impl Command for EditExpense {
    async fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), LedgerError> {
        expect_state(self.state, CommandState::Created, "execute")?;
        let previous = ctx
            .ledger
            .get(self.id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("expense {}", self.id)))?;
        ctx.ledger.validate(&self.draft)?;

        let updated = self.draft.clone().into_expense(self.id, ctx.ledger.event_id());
        ctx.storage.update_expense(&updated).await?;
        ctx.ledger.replace_entry(updated)?;

        self.previous = Some(previous);
        self.state = CommandState::Executed;
        Ok(())
    }

    async fn undo(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), LedgerError> {
        expect_state(self.state, CommandState::Executed, "undo")?;
        let previous = self
            .previous
            .clone()
            .ok_or_else(|| LedgerError::Consistency("executed edit has no previous value".into()))?;

        ctx.ledger.check_replace(&previous)?;
        ctx.storage.update_expense(&previous).await?;
        ctx.ledger.replace_entry(previous)?;
        self.state = CommandState::Undone;
        Ok(())
    }

    fn state(&self) -> CommandState {
        self.state
    }

    fn expense_id(&self) -> Option<ExpenseId> {
        Some(self.id)
    }

    fn notice(&self) -> Option<ChangeNotice> {
        Some(ChangeNotice::EntryEdited { expense: self.id })
    }

    fn undo_notice(&self) -> Option<ChangeNotice> {
        Some(ChangeNotice::EntryEdited { expense: self.id })
    }

    fn describe(&self) -> String {
        format!("edit expense \"{}\"", self.draft.title)
    }
}

/// Summary of a command that just executed or was undone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport {
    pub description: String,
    pub expense: Option<ExpenseId>,
    pub notice: Option<ChangeNotice>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    Undone(CommandReport),
    /// Nothing to undo.
    Empty,
}

/// Stack of executed commands, bounded to `limit` entries.
#[derive(Debug)]
pub struct CommandHistory {
    stack: VecDeque<Box<dyn Command>>,
    limit: usize,
}

impl CommandHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            stack: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Execute `command`; it is recorded only if execution succeeds and the
    /// ledger still balances. An unbalanced result is rolled back.
    pub async fn run(
        &mut self,
        mut command: Box<dyn Command>,
        ctx: &mut CommandContext<'_>,
    ) -> Result<CommandReport, LedgerError> {
        command.execute(ctx).await?;
        if let Err(e) = ctx.ledger.check_zero_sum() {
            tracing::error!(command = %command.describe(), error = %e, "command unbalanced the ledger");
            if let Err(rollback) = command.undo(ctx).await {
                tracing::error!(command = %command.describe(), error = %rollback, "rollback failed");
            }
            return Err(e);
        }

        let report = CommandReport {
            description: command.describe(),
            expense: command.expense_id(),
            notice: command.notice(),
        };
        if self.stack.len() == self.limit {
            self.stack.pop_front();
        }
        self.stack.push_back(command);
        Ok(report)
    }

    /// Undo the most recent command. A failed undo stays on the stack.
    ///
    /// `Unbalanced` means the undo reached storage but left the ledger
    /// unbalanced; the command is dropped and the caller must reload.
    pub async fn undo_last(
        &mut self,
        ctx: &mut CommandContext<'_>,
    ) -> Result<UndoOutcome, LedgerError> {
        let Some(mut command) = self.stack.pop_back() else {
            return Ok(UndoOutcome::Empty);
        };

        if let Err(e) = command.undo(ctx).await {
            self.stack.push_back(command);
            return Err(e);
        }
        ctx.ledger.check_zero_sum().inspect_err(|e| {
            tracing::error!(command = %command.describe(), error = %e, "undo unbalanced the ledger");
        })?;
        Ok(UndoOutcome::Undone(CommandReport {
            description: command.describe(),
            expense: command.expense_id(),
            notice: command.undo_notice(),
        }))
    }
}
