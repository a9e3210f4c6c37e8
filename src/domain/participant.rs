//! Registered participant profile.

use serde::{Deserialize, Serialize};

use super::primitives::ParticipantId;

pub const DEFAULT_LANGUAGE: &str = "en";

/// A registered participant. Referenced by id from events, expenses and debts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub username: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iban: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bic: Option<String>,
    pub language: String,
}

/// Profile fields supplied on registration or edit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantProfile {
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub bic: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl ParticipantProfile {
    /// Attach a storage-assigned id.
    pub fn into_participant(self, id: ParticipantId) -> Participant {
        Participant {
            id,
            username: self.username.trim().to_string(),
            display_name: self.display_name.trim().to_string(),
            email: non_blank(self.email),
            iban: non_blank(self.iban),
            bic: non_blank(self.bic),
            language: non_blank(self.language).unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
