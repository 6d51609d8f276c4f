use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::models::{DutyCategory, DutyRate, RateInput, RateType};
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RateRequest {
    pub category: DutyCategory,
    #[validate(length(max = 100, message = "Subcategory must be at most 100 characters"))]
    pub subcategory: Option<String>,
    pub min_abv: Option<Decimal>,
    pub max_abv: Option<Decimal>,
    pub rate_amount: Decimal,
    pub rate_type: RateType,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

impl From<RateRequest> for RateInput {
    fn from(request: RateRequest) -> Self {
        RateInput {
            category: request.category,
            subcategory: request.subcategory,
            min_abv: request.min_abv,
            max_abv: request.max_abv,
            rate_amount: request.rate_amount,
            rate_type: request.rate_type,
            effective_from: request.effective_from,
            effective_to: request.effective_to,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListRatesQuery {
    pub category: Option<DutyCategory>,
}

#[tracing::instrument(skip(state))]
pub async fn list_rates(
    State(state): State<AppState>,
    Query(query): Query<ListRatesQuery>,
) -> Result<Json<Vec<DutyRate>>, AppError> {
    Ok(Json(state.rates.list(query.category).await?))
}

#[tracing::instrument(skip(state, request))]
pub async fn create_rate(
    State(state): State<AppState>,
    Json(request): Json<RateRequest>,
) -> Result<(StatusCode, Json<DutyRate>), AppError> {
    request.validate()?;
    let rate = state.rates.create(&request.into()).await?;
    Ok((StatusCode::CREATED, Json(rate)))
}

#[tracing::instrument(skip(state))]
pub async fn get_rate(
    State(state): State<AppState>,
    Path(rate_id): Path<Uuid>,
) -> Result<Json<DutyRate>, AppError> {
    Ok(Json(state.rates.get(rate_id).await?))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_rate(
    State(state): State<AppState>,
    Path(rate_id): Path<Uuid>,
    Json(request): Json<RateRequest>,
) -> Result<Json<DutyRate>, AppError> {
    request.validate()?;
    Ok(Json(state.rates.update(rate_id, &request.into()).await?))
}

#[tracing::instrument(skip(state))]
pub async fn delete_rate(
    State(state): State<AppState>,
    Path(rate_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.rates.delete(rate_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
