pub mod balances;
pub mod events;
pub mod expenses;
pub mod health;
pub mod participants;

use crate::config::Config;
use crate::domain::{Currency, Money};
use crate::error::AppError;
use crate::service::LedgerService;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LedgerService>,
    pub config: Config,
}

impl AppState {
    pub fn new(service: Arc<LedgerService>, config: Config) -> Self {
        Self { service, config }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/participants", post(participants::register_participant))
        .route(
            "/v1/participants/:id",
            get(participants::get_participant).put(participants::update_participant),
        )
        .route("/v1/events", post(events::create_event))
        .route("/v1/events/join", post(events::join_event))
        .route(
            "/v1/events/:id",
            get(events::get_event).delete(events::delete_event),
        )
        .route(
            "/v1/events/:id/participants/:pid",
            delete(events::leave_event),
        )
        .route(
            "/v1/events/:id/expenses",
            get(expenses::list_expenses).post(expenses::add_expense),
        )
        .route(
            "/v1/events/:id/expenses/:eid",
            put(expenses::edit_expense).delete(expenses::remove_expense),
        )
        .route("/v1/events/:id/balances", get(balances::get_balances))
        .route("/v1/events/:id/settlement", get(balances::get_settlement))
        .route("/v1/events/:id/undo", post(balances::undo_last))
        .layer(cors)
        .with_state(state)
}

/// Parse an optional currency code, rejecting malformed ones.
pub(crate) fn parse_currency(code: Option<&str>) -> Result<Option<Currency>, AppError> {
    match code.map(str::trim) {
        None | Some("") => Ok(None),
        Some(c) => Currency::parse(c)
            .map(Some)
            .map_err(|e| AppError::BadRequest(e.to_string())),
    }
}

/// Parse a decimal string in major units, e.g. `"12.50"`.
pub(crate) fn parse_amount(amount: &str, currency: Currency) -> Result<Money, AppError> {
    Money::parse(amount, currency).map_err(|e| AppError::BadRequest(e.to_string()))
}
