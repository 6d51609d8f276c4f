use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::date_bounds;
use crate::models::{
    CreateDutyEntry, DutyCategory, DutyEntry, DutyEntryFilter, DutyRate, DutyStatus,
};
use crate::services::{DutyQuantities, Posted};
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SuggestDutyRequest {
    pub category: DutyCategory,
    #[validate(length(max = 100))]
    pub subcategory: Option<String>,
    pub abv: Decimal,
    pub volume_litres: Option<Decimal>,
    #[validate(range(min = 0))]
    pub quantity_units: Option<i64>,
    /// Defaults to today.
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct SuggestDutyResponse {
    pub rate: Option<DutyRate>,
    pub amount: Option<Decimal>,
    /// No rate applies; the operator has to enter duty by hand.
    pub manual_entry_required: bool,
}

#[tracing::instrument(skip(state, request))]
pub async fn suggest_duty(
    State(state): State<AppState>,
    Json(request): Json<SuggestDutyRequest>,
) -> Result<Json<SuggestDutyResponse>, AppError> {
    request.validate()?;
    let as_of = request.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let suggestion = state
        .rates
        .suggest(
            request.category,
            request.subcategory.as_deref(),
            as_of,
            DutyQuantities {
                volume_litres: request.volume_litres,
                abv: Some(request.abv),
                quantity_units: request.quantity_units,
            },
        )
        .await?;

    Ok(Json(match suggestion {
        Some(s) => SuggestDutyResponse {
            rate: Some(s.rate),
            amount: Some(s.amount),
            manual_entry_required: false,
        },
        None => SuggestDutyResponse {
            rate: None,
            amount: None,
            manual_entry_required: true,
        },
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDutyEntryRequest {
    pub brand_id: Uuid,
    pub entry_date: NaiveDate,
    pub category: Option<DutyCategory>,
    #[validate(length(max = 100))]
    pub subcategory: Option<String>,
    pub abv: Option<Decimal>,
    pub volume_litres: Option<Decimal>,
    pub quantity_units: Option<i64>,
    pub total_duty_amount: Option<Decimal>,
    #[validate(length(max = 100, message = "HMRC payment reference must be at most 100 characters"))]
    pub hmrc_payment_reference: Option<String>,
    pub status: Option<DutyStatus>,
    pub linked_inbound_shipment_id: Option<Uuid>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl From<CreateDutyEntryRequest> for CreateDutyEntry {
    fn from(r: CreateDutyEntryRequest) -> Self {
        CreateDutyEntry {
            brand_id: r.brand_id,
            entry_date: r.entry_date,
            category: r.category,
            subcategory: r.subcategory,
            abv: r.abv,
            volume_litres: r.volume_litres,
            quantity_units: r.quantity_units,
            total_duty_amount: r.total_duty_amount,
            hmrc_payment_reference: r.hmrc_payment_reference,
            status: r.status,
            linked_inbound_shipment_id: r.linked_inbound_shipment_id,
            notes: r.notes,
        }
    }
}

/// 201 even when posting failed; the warning names the unposted record.
#[tracing::instrument(skip(state, request))]
pub async fn create_duty_entry(
    State(state): State<AppState>,
    Json(request): Json<CreateDutyEntryRequest>,
) -> Result<(StatusCode, Json<Posted<DutyEntry>>), AppError> {
    request.validate()?;
    let posted = state.posting.create_duty_entry(request.into()).await?;
    Ok((StatusCode::CREATED, Json(posted)))
}

#[derive(Debug, Deserialize)]
pub struct ListDutyEntriesQuery {
    pub brand_id: Option<Uuid>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub status: Option<DutyStatus>,
}

#[tracing::instrument(skip(state))]
pub async fn list_duty_entries(
    State(state): State<AppState>,
    Query(query): Query<ListDutyEntriesQuery>,
) -> Result<Json<Vec<DutyEntry>>, AppError> {
    let (start_date, end_date) = date_bounds(query.year, query.month)?;
    let filter = DutyEntryFilter {
        brand_id: query.brand_id,
        start_date,
        end_date,
        status: query.status,
    };
    Ok(Json(state.posting.list_duty_entries(&filter).await?))
}

#[tracing::instrument(skip(state))]
pub async fn get_duty_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<DutyEntry>, AppError> {
    Ok(Json(state.posting.get_duty_entry(entry_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DutyStatus,
}

#[tracing::instrument(skip(state))]
pub async fn update_duty_entry_status(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<DutyEntry>, AppError> {
    Ok(Json(
        state
            .posting
            .update_duty_entry_status(entry_id, request.status)
            .await?,
    ))
}
