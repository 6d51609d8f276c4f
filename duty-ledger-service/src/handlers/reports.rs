use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;

use super::requested_period;
use crate::models::{BrandPnlReport, PlatformRollup, ReportWindow};
use crate::startup::AppState;

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// Current and prior month, YTD and the 12-month chart series.
#[tracing::instrument(skip(state))]
pub async fn brand_pnl(
    State(state): State<AppState>,
    Path(brand_id): Path<Uuid>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<BrandPnlReport>, AppError> {
    let period = requested_period(query.year, query.month)?;
    Ok(Json(state.reports.brand_report(brand_id, period).await?))
}

/// Month omitted means year to date.
#[tracing::instrument(skip(state))]
pub async fn platform_report(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<PlatformRollup>, AppError> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let window = match query.month {
        Some(month) => ReportWindow::Month { year, month },
        None => ReportWindow::YearToDate { year },
    };
    Ok(Json(state.reports.platform_rollup(window).await?))
}
