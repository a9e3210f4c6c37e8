//! Derived point-to-point debts.

use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::money::Money;
use super::primitives::ParticipantId;

/// `debtor` owes `lender` `amount`. Never stored; always derived from a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    debtor: ParticipantId,
    lender: ParticipantId,
    amount: Money,
    collective: bool,
    description: String,
}

impl Debt {
    /// # Errors
    /// Rejects zero and negative amounts.
    pub fn new(
        debtor: ParticipantId,
        lender: ParticipantId,
        amount: Money,
        collective: bool,
        description: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        if !amount.is_positive() {
            return Err(ValidationError::NegativeDebt);
        }
        Ok(Debt {
            debtor,
            lender,
            amount,
            collective,
            description: description.into(),
        })
    }

    pub fn debtor(&self) -> ParticipantId {
        self.debtor
    }

    pub fn lender(&self) -> ParticipantId {
        self.lender
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn is_collective(&self) -> bool {
        self.collective
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

// Deserialization goes through `Debt::new` so a negative amount can't sneak in.
impl<'de> Deserialize<'de> for Debt {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Raw {
            debtor: ParticipantId,
            lender: ParticipantId,
            amount: Money,
            #[serde(default)]
            collective: bool,
            #[serde(default)]
            description: String,
        }

        let raw = Raw::deserialize(deserializer)?;
        Debt::new(
            raw.debtor,
            raw.lender,
            raw.amount,
            raw.collective,
            raw.description,
        )
        .map_err(serde::de::Error::custom)
    }
}
