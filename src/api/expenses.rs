use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{parse_amount, parse_currency, AppState};
use crate::domain::{
    Currency, EventId, ExactShare, Expense, ExpenseDraft, ExpenseId, Money, ParticipantId,
    PercentShare, SplitStrategy, TimeMs,
};
use crate::error::AppError;

/// Split rule as it crosses the API. Exact shares are decimal strings in
/// major units, percentages are decimal strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SplitDto {
    #[default]
    Equal,
    Exact {
        shares: Vec<ShareDto>,
    },
    Percentage {
        percentages: Vec<PercentDto>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareDto {
    pub participant_id: i64,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentDto {
    pub participant_id: i64,
    pub percent: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRequest {
    pub title: String,
    pub payer_id: i64,
    pub amount: String,
    /// Defaults to the event currency.
    pub currency: Option<String>,
    /// Milliseconds since the epoch; defaults to now.
    pub date: Option<i64>,
    pub tag: Option<String>,
    #[serde(default)]
    pub split: SplitDto,
    pub sharers: Vec<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseDto {
    pub id: i64,
    pub event_id: i64,
    pub title: String,
    pub payer_id: i64,
    pub amount: String,
    pub currency: String,
    pub date: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub split: SplitDto,
    pub sharers: Vec<i64>,
    /// Resolved per-sharer amounts.
    pub shares: Vec<ShareDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpensesResponse {
    pub expenses: Vec<ExpenseDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseCreatedResponse {
    pub id: i64,
}

impl ExpenseRequest {
    fn into_draft(self, event_currency: Currency) -> Result<ExpenseDraft, AppError> {
        let currency = parse_currency(self.currency.as_deref())?.unwrap_or(event_currency);
        let amount = parse_amount(&self.amount, currency)?;
        let split = split_from_dto(self.split, currency)?;

        let mut draft = ExpenseDraft::equal(
            self.title,
            ParticipantId(self.payer_id),
            amount,
            self.sharers.into_iter().map(ParticipantId).collect(),
        )
        .with_split(split);
        if let Some(date) = self.date {
            draft = draft.with_date(TimeMs::new(date));
        }
        if let Some(tag) = self.tag.filter(|t| !t.trim().is_empty()) {
            draft = draft.with_tag(tag.trim());
        }
        Ok(draft)
    }
}

fn split_from_dto(dto: SplitDto, currency: Currency) -> Result<SplitStrategy, AppError> {
    Ok(match dto {
        SplitDto::Equal => SplitStrategy::Equal,
        SplitDto::Exact { shares } => SplitStrategy::Exact {
            shares: shares
                .into_iter()
                .map(|s| -> Result<ExactShare, AppError> {
                    Ok(ExactShare {
                        participant: ParticipantId(s.participant_id),
                        minor: parse_amount(&s.amount, currency)?.minor(),
                    })
                })
                .collect::<Result<_, AppError>>()?,
        },
        SplitDto::Percentage { percentages } => SplitStrategy::Percentage {
            percentages: percentages
                .into_iter()
                .map(|p| -> Result<PercentShare, AppError> {
                    let percent = p.percent.trim().parse::<Decimal>().map_err(|_| {
                        AppError::BadRequest(format!("invalid percentage: {}", p.percent))
                    })?;
                    Ok(PercentShare {
                        participant: ParticipantId(p.participant_id),
                        percent,
                    })
                })
                .collect::<Result<_, AppError>>()?,
        },
    })
}

fn split_to_dto(split: &SplitStrategy, currency: Currency) -> SplitDto {
    match split {
        SplitStrategy::Equal => SplitDto::Equal,
        SplitStrategy::Exact { shares } => SplitDto::Exact {
            shares: shares
                .iter()
                .map(|s| ShareDto {
                    participant_id: s.participant.as_i64(),
                    amount: Money::new(s.minor, currency).to_canonical_string(),
                })
                .collect(),
        },
        SplitStrategy::Percentage { percentages } => SplitDto::Percentage {
            percentages: percentages
                .iter()
                .map(|p| PercentDto {
                    participant_id: p.participant.as_i64(),
                    percent: p.percent.normalize().to_string(),
                })
                .collect(),
        },
    }
}

impl TryFrom<Expense> for ExpenseDto {
    type Error = AppError;

    fn try_from(expense: Expense) -> Result<Self, Self::Error> {
        let currency = expense.amount.currency();
        let shares = expense
            .shares()
            .map_err(|e| AppError::Internal(format!("expense {}: {}", expense.id, e)))?
            .into_iter()
            .map(|(participant, share)| ShareDto {
                participant_id: participant.as_i64(),
                amount: share.to_canonical_string(),
            })
            .collect();

        Ok(ExpenseDto {
            id: expense.id.as_i64(),
            event_id: expense.event_id.as_i64(),
            title: expense.title,
            payer_id: expense.payer.as_i64(),
            amount: expense.amount.to_canonical_string(),
            currency: currency.code().to_string(),
            date: expense.date.as_ms(),
            tag: expense.tag,
            split: split_to_dto(&expense.split, currency),
            sharers: expense.sharers.iter().map(|s| s.as_i64()).collect(),
            shares,
        })
    }
}

pub async fn list_expenses(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<ExpensesResponse>, AppError> {
    let expenses = state
        .service
        .list_expenses(EventId(id))
        .await?
        .into_iter()
        .map(ExpenseDto::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(ExpensesResponse { expenses }))
}

pub async fn add_expense(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(req): Json<ExpenseRequest>,
) -> Result<(StatusCode, Json<ExpenseCreatedResponse>), AppError> {
    let event_id = EventId(id);
    let currency = state.service.snapshot(event_id).await?.currency();
    let draft = req.into_draft(currency)?;
    let expense_id = state.service.add_expense(event_id, draft).await?;
    Ok((
        StatusCode::CREATED,
        Json(ExpenseCreatedResponse {
            id: expense_id.as_i64(),
        }),
    ))
}

pub async fn edit_expense(
    Path((id, eid)): Path<(i64, i64)>,
    State(state): State<AppState>,
    Json(req): Json<ExpenseRequest>,
) -> Result<Json<ExpenseDto>, AppError> {
    let event_id = EventId(id);
    let currency = state.service.snapshot(event_id).await?.currency();
    let draft = req.into_draft(currency)?;
    let expense = state
        .service
        .edit_expense(event_id, ExpenseId(eid), draft)
        .await?;
    Ok(Json(expense.try_into()?))
}

pub async fn remove_expense(
    Path((id, eid)): Path<(i64, i64)>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state
        .service
        .remove_expense(EventId(id), ExpenseId(eid))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
