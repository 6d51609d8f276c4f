use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::models::{LedgerTransaction, NewTransaction, TransactionFilter, TransactionType};
use crate::startup::AppState;

/// Manual ledger entry. `amount` is the unsigned magnitude.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransactionRequest {
    pub brand_id: Uuid,
    pub transaction_type: TransactionType,
    pub transaction_date: NaiveDate,
    pub amount: Decimal,
    #[validate(length(min = 1, max = 500, message = "Description must be 1 to 500 characters"))]
    pub description: String,
    #[validate(length(max = 200))]
    pub reference: Option<String>,
    #[validate(length(max = 100))]
    pub channel: Option<String>,
}

#[tracing::instrument(skip(state, request))]
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<LedgerTransaction>), AppError> {
    request.validate()?;
    let txn = state
        .ledger
        .append(NewTransaction {
            brand_id: request.brand_id,
            transaction_type: request.transaction_type,
            transaction_date: request.transaction_date,
            magnitude: request.amount,
            description: request.description,
            reference: request.reference,
            channel: request.channel,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(txn)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAdjustmentRequest {
    pub brand_id: Uuid,
    pub transaction_date: NaiveDate,
    pub amount: Decimal,
    #[validate(length(min = 1, max = 500, message = "Description must be 1 to 500 characters"))]
    pub description: String,
    #[validate(length(max = 200))]
    pub reference: Option<String>,
}

#[tracing::instrument(skip(state, request))]
pub async fn create_adjustment(
    State(state): State<AppState>,
    Json(request): Json<CreateAdjustmentRequest>,
) -> Result<(StatusCode, Json<LedgerTransaction>), AppError> {
    request.validate()?;
    let txn = state
        .ledger
        .record_adjustment(
            request.brand_id,
            request.transaction_date,
            request.amount,
            request.description,
            request.reference,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(txn)))
}

#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    pub brand_id: Uuid,
    pub year: Option<i32>,
    pub month: Option<u32>,
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[tracing::instrument(skip(state))]
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<Vec<LedgerTransaction>>, AppError> {
    let filter = TransactionFilter {
        brand_id: query.brand_id,
        period_year: query.year,
        period_month: query.month,
        transaction_type: query.transaction_type,
        start_date: query.start_date,
        end_date: query.end_date,
    };
    Ok(Json(state.ledger.list(&filter).await?))
}
