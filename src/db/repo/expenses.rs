//! Expense queries. Split strategy and sharer list are stored as JSON text.

use crate::domain::{
    Currency, EventId, Expense, ExpenseDraft, ExpenseId, Money, ParticipantId, SplitStrategy,
    TimeMs,
};
use crate::storage::StorageError;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::warn;

use super::{conflict_or_db, Repository};

/// JSON columns of an expense row.
struct EncodedSplit {
    split_json: String,
    sharers_json: String,
}

fn encode_split(
    split: &SplitStrategy,
    sharers: &[ParticipantId],
) -> Result<EncodedSplit, StorageError> {
    let encode_err = |e: serde_json::Error| StorageError::Corrupt(format!("encode split: {}", e));
    Ok(EncodedSplit {
        split_json: serde_json::to_string(split).map_err(encode_err)?,
        sharers_json: serde_json::to_string(sharers).map_err(encode_err)?,
    })
}

impl Repository {
    pub(super) async fn insert_expense(
        &self,
        event_id: EventId,
        draft: &ExpenseDraft,
    ) -> Result<Expense, StorageError> {
        self.ensure_event(event_id).await?;
        let encoded = encode_split(&draft.split, &draft.sharers)?;

        let result = sqlx::query(
            r#"
            INSERT INTO expenses (
                event_id, title, payer_id, amount_minor, currency, date_ms, tag,
                split_json, sharers_json
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event_id.as_i64())
        .bind(&draft.title)
        .bind(draft.payer.as_i64())
        .bind(draft.amount.minor())
        .bind(draft.amount.currency().code())
        .bind(draft.date.as_ms())
        .bind(&draft.tag)
        .bind(&encoded.split_json)
        .bind(&encoded.sharers_json)
        .execute(&self.pool)
        .await?;

        Ok(draft
            .clone()
            .into_expense(ExpenseId(result.last_insert_rowid()), event_id))
    }

    /// Insert with an explicit id. `Conflict` if the id is still taken.
    pub(super) async fn reinsert_expense(&self, expense: &Expense) -> Result<(), StorageError> {
        self.ensure_event(expense.event_id).await?;
        let taken: Option<(i64,)> = sqlx::query_as("SELECT id FROM expenses WHERE id = ?")
            .bind(expense.id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        if taken.is_some() {
            return Err(StorageError::Conflict(format!("expense {}", expense.id)));
        }
        let encoded = encode_split(&expense.split, &expense.sharers)?;

        sqlx::query(
            r#"
            INSERT INTO expenses (
                id, event_id, title, payer_id, amount_minor, currency, date_ms, tag,
                split_json, sharers_json
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(expense.id.as_i64())
        .bind(expense.event_id.as_i64())
        .bind(&expense.title)
        .bind(expense.payer.as_i64())
        .bind(expense.amount.minor())
        .bind(expense.amount.currency().code())
        .bind(expense.date.as_ms())
        .bind(&expense.tag)
        .bind(&encoded.split_json)
        .bind(&encoded.sharers_json)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, || format!("expense {}", expense.id)))?;

        Ok(())
    }

    pub(super) async fn write_expense(&self, expense: &Expense) -> Result<(), StorageError> {
        let encoded = encode_split(&expense.split, &expense.sharers)?;

        let result = sqlx::query(
            r#"
            UPDATE expenses
            SET title = ?, payer_id = ?, amount_minor = ?, currency = ?, date_ms = ?,
                tag = ?, split_json = ?, sharers_json = ?
            WHERE id = ? AND event_id = ?
            "#,
        )
        .bind(&expense.title)
        .bind(expense.payer.as_i64())
        .bind(expense.amount.minor())
        .bind(expense.amount.currency().code())
        .bind(expense.date.as_ms())
        .bind(&expense.tag)
        .bind(&encoded.split_json)
        .bind(&encoded.sharers_json)
        .bind(expense.id.as_i64())
        .bind(expense.event_id.as_i64())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("expense {}", expense.id)));
        }
        Ok(())
    }

    pub(super) async fn remove_expense(&self, id: ExpenseId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ?")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub(super) async fn select_expenses(
        &self,
        event_id: EventId,
    ) -> Result<Vec<Expense>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_id, title, payer_id, amount_minor, currency, date_ms, tag,
                   split_json, sharers_json
            FROM expenses
            WHERE event_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(event_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(expense_from_row).collect()
    }
}

fn expense_from_row(row: &SqliteRow) -> Result<Expense, StorageError> {
    let id = ExpenseId(row.try_get("id")?);

    let currency_str: String = row.try_get("currency")?;
    let currency = Currency::parse(&currency_str).map_err(|e| {
        warn!(expense_id = %id, currency = %currency_str, error = %e, "invalid currency in expenses row");
        StorageError::Corrupt(format!("expense {} currency {:?}", id, currency_str))
    })?;

    let split_json: String = row.try_get("split_json")?;
    let split: SplitStrategy = serde_json::from_str(&split_json).map_err(|e| {
        warn!(expense_id = %id, error = %e, "invalid split_json in expenses row");
        StorageError::Corrupt(format!("expense {} split: {}", id, e))
    })?;

    let sharers_json: String = row.try_get("sharers_json")?;
    let sharers: Vec<ParticipantId> = serde_json::from_str(&sharers_json).map_err(|e| {
        warn!(expense_id = %id, error = %e, "invalid sharers_json in expenses row");
        StorageError::Corrupt(format!("expense {} sharers: {}", id, e))
    })?;

    Ok(Expense {
        id,
        event_id: EventId(row.try_get("event_id")?),
        title: row.try_get("title")?,
        payer: ParticipantId(row.try_get("payer_id")?),
        amount: Money::new(row.try_get("amount_minor")?, currency),
        date: TimeMs::new(row.try_get("date_ms")?),
        tag: row.try_get("tag")?,
        split,
        sharers,
    })
}
