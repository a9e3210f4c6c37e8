//! Event: a named group of participants sharing one ledger.

use serde::{Deserialize, Serialize};

use super::primitives::{Currency, EventId, ParticipantId, TimeMs};

/// Length of generated invite codes.
pub const INVITE_CODE_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub invite_code: String,
    pub currency: Currency,
    /// Members in join order.
    pub members: Vec<ParticipantId>,
    pub created_at: TimeMs,
    pub last_activity: TimeMs,
}

impl Event {
    pub fn is_member(&self, participant: ParticipantId) -> bool {
        self.members.contains(&participant)
    }
}

/// Fields needed to create an event; storage assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub invite_code: String,
    pub currency: Currency,
    pub created_at: TimeMs,
}

/// Generate a fresh invite code from a v4 UUID.
pub fn generate_invite_code() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..INVITE_CODE_LEN].to_ascii_uppercase()
}

/// Canonical form used for invite code lookups.
pub fn normalize_invite_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
