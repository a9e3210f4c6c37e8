use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::command::UndoOutcome;
use crate::domain::EventId;
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDto {
    pub participant_id: i64,
    /// Positive: is owed money. Negative: owes money.
    pub amount: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancesResponse {
    pub currency: String,
    pub total_spent: String,
    pub balances: Vec<BalanceDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtDto {
    pub debtor_id: i64,
    pub lender_id: i64,
    pub amount: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResponse {
    pub currency: String,
    pub debts: Vec<DebtDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoResponse {
    pub undone: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expense_id: Option<i64>,
}

pub async fn get_balances(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<BalancesResponse>, AppError> {
    let ledger = state.service.snapshot(EventId(id)).await?;
    let balances = ledger
        .balances()?
        .into_iter()
        .map(|(participant, amount)| BalanceDto {
            participant_id: participant.as_i64(),
            amount: amount.to_canonical_string(),
        })
        .collect();

    Ok(Json(BalancesResponse {
        currency: ledger.currency().code().to_string(),
        total_spent: ledger.total_spent()?.to_canonical_string(),
        balances,
    }))
}

pub async fn get_settlement(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<SettlementResponse>, AppError> {
    let event_id = EventId(id);
    let currency = state.service.snapshot(event_id).await?.currency();
    let debts = state
        .service
        .get_settlement(event_id)
        .await?
        .iter()
        .map(|d| DebtDto {
            debtor_id: d.debtor().as_i64(),
            lender_id: d.lender().as_i64(),
            amount: d.amount().to_canonical_string(),
            description: d.description().to_string(),
        })
        .collect();

    Ok(Json(SettlementResponse {
        currency: currency.code().to_string(),
        debts,
    }))
}

pub async fn undo_last(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<UndoResponse>, AppError> {
    let response = match state.service.undo_last(EventId(id)).await? {
        UndoOutcome::Undone(report) => UndoResponse {
            undone: true,
            description: Some(report.description),
            expense_id: report.expense.map(|e| e.as_i64()),
        },
        UndoOutcome::Empty => UndoResponse {
            undone: false,
            description: None,
            expense_id: None,
        },
    };
    Ok(Json(response))
}
