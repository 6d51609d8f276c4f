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

use super::date_bounds;
use crate::models::{CreateOutboundShipment, OutboundShipment, ShipmentFilter};
use crate::services::Posted;
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateShipmentRequest {
    pub brand_id: Uuid,
    #[validate(length(min = 1, max = 100, message = "Shipment reference must be 1 to 100 characters"))]
    pub shipment_reference: String,
    pub ship_date: NaiveDate,
    #[serde(default)]
    pub shipping_cost: Decimal,
    #[serde(default)]
    pub handling_fee: Decimal,
    #[serde(default)]
    pub packaging_cost: Decimal,
    #[validate(length(max = 100))]
    pub channel: Option<String>,
}

#[tracing::instrument(skip(state, request))]
pub async fn create_outbound_shipment(
    State(state): State<AppState>,
    Json(request): Json<CreateShipmentRequest>,
) -> Result<(StatusCode, Json<Posted<OutboundShipment>>), AppError> {
    request.validate()?;
    let posted = state
        .posting
        .create_outbound_shipment(CreateOutboundShipment {
            brand_id: request.brand_id,
            shipment_reference: request.shipment_reference,
            ship_date: request.ship_date,
            shipping_cost: request.shipping_cost,
            handling_fee: request.handling_fee,
            packaging_cost: request.packaging_cost,
            channel: request.channel,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(posted)))
}

#[derive(Debug, Deserialize)]
pub struct ListShipmentsQuery {
    pub brand_id: Option<Uuid>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[tracing::instrument(skip(state))]
pub async fn list_outbound_shipments(
    State(state): State<AppState>,
    Query(query): Query<ListShipmentsQuery>,
) -> Result<Json<Vec<OutboundShipment>>, AppError> {
    let (start_date, end_date) = date_bounds(query.year, query.month)?;
    let filter = ShipmentFilter {
        brand_id: query.brand_id,
        start_date,
        end_date,
    };
    Ok(Json(state.posting.list_outbound_shipments(&filter).await?))
}
