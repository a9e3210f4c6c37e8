//! Participant, event and membership queries.

use crate::domain::{
    Currency, Event, EventId, NewEvent, Participant, ParticipantId, ParticipantProfile, TimeMs,
};
use crate::storage::StorageError;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::warn;

use super::{conflict_or_db, Repository};

/// Lookup key for a single event row.
#[derive(Debug, Clone, Copy)]
pub(super) enum EventKey<'a> {
    Id(EventId),
    InviteCode(&'a str),
}

impl Repository {
    pub(super) async fn insert_participant(
        &self,
        profile: &ParticipantProfile,
    ) -> Result<Participant, StorageError> {
        // Normalize first so the stored row matches what callers get back.
        let pending = profile.clone().into_participant(ParticipantId(0));

        let result = sqlx::query(
            r#"
            INSERT INTO participants (username, display_name, email, iban, bic, language)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&pending.username)
        .bind(&pending.display_name)
        .bind(&pending.email)
        .bind(&pending.iban)
        .bind(&pending.bic)
        .bind(&pending.language)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, || format!("username {}", pending.username)))?;

        Ok(Participant {
            id: ParticipantId(result.last_insert_rowid()),
            ..pending
        })
    }

    pub(super) async fn select_participant(
        &self,
        id: ParticipantId,
    ) -> Result<Option<Participant>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, display_name, email, iban, bic, language
            FROM participants
            WHERE id = ?
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| participant_from_row(&r)).transpose()
    }

    pub(super) async fn write_participant(
        &self,
        participant: &Participant,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE participants
            SET username = ?, display_name = ?, email = ?, iban = ?, bic = ?, language = ?
            WHERE id = ?
            "#,
        )
        .bind(&participant.username)
        .bind(&participant.display_name)
        .bind(&participant.email)
        .bind(&participant.iban)
        .bind(&participant.bic)
        .bind(&participant.language)
        .bind(participant.id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, || format!("username {}", participant.username)))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "participant {}",
                participant.id
            )));
        }
        Ok(())
    }

    pub(super) async fn insert_event(&self, event: &NewEvent) -> Result<Event, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO events (title, invite_code, currency, created_at, last_activity)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.title)
        .bind(&event.invite_code)
        .bind(event.currency.code())
        .bind(event.created_at.as_ms())
        .bind(event.created_at.as_ms())
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, || format!("invite code {}", event.invite_code)))?;

        Ok(Event {
            id: EventId(result.last_insert_rowid()),
            title: event.title.clone(),
            invite_code: event.invite_code.clone(),
            currency: event.currency,
            members: Vec::new(),
            created_at: event.created_at,
            last_activity: event.created_at,
        })
    }

    pub(super) async fn select_event(
        &self,
        key: EventKey<'_>,
    ) -> Result<Option<Event>, StorageError> {
        let query = match key {
            EventKey::Id(id) => sqlx::query(
                r#"
                SELECT id, title, invite_code, currency, created_at, last_activity
                FROM events
                WHERE id = ?
                "#,
            )
            .bind(id.as_i64()),
            EventKey::InviteCode(code) => sqlx::query(
                r#"
                SELECT id, title, invite_code, currency, created_at, last_activity
                FROM events
                WHERE invite_code = ?
                "#,
            )
            .bind(code),
        };

        let Some(row) = query.fetch_optional(&self.pool).await? else {
            return Ok(None);
        };

        let mut event = event_from_row(&row)?;
        event.members = self.select_members(event.id).await?;
        Ok(Some(event))
    }

    /// Members in join order.
    async fn select_members(&self, event_id: EventId) -> Result<Vec<ParticipantId>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT participant_id
            FROM event_members
            WHERE event_id = ?
            ORDER BY rowid ASC
            "#,
        )
        .bind(event_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let mut members = Vec::with_capacity(rows.len());
        for row in &rows {
            members.push(ParticipantId(row.try_get("participant_id")?));
        }
        Ok(members)
    }

    /// Deletes the event, its memberships and its expenses in one transaction.
    pub(super) async fn remove_event(&self, id: EventId) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM expenses WHERE event_id = ?")
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM event_members WHERE event_id = ?")
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub(super) async fn insert_member(
        &self,
        event_id: EventId,
        participant: ParticipantId,
    ) -> Result<(), StorageError> {
        self.ensure_event(event_id).await?;
        let known: Option<(i64,)> = sqlx::query_as("SELECT id FROM participants WHERE id = ?")
            .bind(participant.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        if known.is_none() {
            return Err(StorageError::NotFound(format!("participant {}", participant)));
        }

        sqlx::query(
            r#"
            INSERT INTO event_members (event_id, participant_id)
            VALUES (?, ?)
            ON CONFLICT(event_id, participant_id) DO NOTHING
            "#,
        )
        .bind(event_id.as_i64())
        .bind(participant.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub(super) async fn delete_member(
        &self,
        event_id: EventId,
        participant: ParticipantId,
    ) -> Result<(), StorageError> {
        self.ensure_event(event_id).await?;
        sqlx::query("DELETE FROM event_members WHERE event_id = ? AND participant_id = ?")
            .bind(event_id.as_i64())
            .bind(participant.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub(super) async fn set_last_activity(
        &self,
        event_id: EventId,
        at: TimeMs,
    ) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE events SET last_activity = ? WHERE id = ?")
            .bind(at.as_ms())
            .bind(event_id.as_i64())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("event {}", event_id)));
        }
        Ok(())
    }

    /// `NotFound` unless the event row exists.
    pub(super) async fn ensure_event(&self, event_id: EventId) -> Result<(), StorageError> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM events WHERE id = ?")
            .bind(event_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        match found {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(format!("event {}", event_id))),
        }
    }
}

fn participant_from_row(row: &SqliteRow) -> Result<Participant, StorageError> {
    Ok(Participant {
        id: ParticipantId(row.try_get("id")?),
        username: row.try_get("username")?,
        display_name: row.try_get("display_name")?,
        email: row.try_get("email")?,
        iban: row.try_get("iban")?,
        bic: row.try_get("bic")?,
        language: row.try_get("language")?,
    })
}

/// Decode an event row. Members are loaded separately.
fn event_from_row(row: &SqliteRow) -> Result<Event, StorageError> {
    let id = EventId(row.try_get("id")?);
    let currency_str: String = row.try_get("currency")?;
    let currency = Currency::parse(&currency_str).map_err(|e| {
        warn!(event_id = %id, currency = %currency_str, error = %e, "invalid currency in events row");
        StorageError::Corrupt(format!("event {} currency {:?}", id, currency_str))
    })?;

    Ok(Event {
        id,
        title: row.try_get("title")?,
        invite_code: row.try_get("invite_code")?,
        currency,
        members: Vec::new(),
        created_at: TimeMs::new(row.try_get("created_at")?),
        last_activity: TimeMs::new(row.try_get("last_activity")?),
    })
}
