//! HTTP handlers for duty-ledger-service.

pub mod duty;
pub mod health;
pub mod rates;
pub mod reconciliation;
pub mod reports;
pub mod shipments;
pub mod transactions;

use chrono::{Datelike, NaiveDate, Utc};
use service_core::error::AppError;

use crate::models::Period;

pub use health::{health_check, metrics_handler, readiness_check};

/// Period named by `year`/`month` query parameters, defaulting to the
/// current month.
pub(crate) fn requested_period(year: Option<i32>, month: Option<u32>) -> Result<Period, AppError> {
    let today = Utc::now().date_naive();
    let year = year.unwrap_or(today.year());
    let month = month.unwrap_or(today.month());
    Period::new(year, month)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("month must be between 1 and 12")))
}

/// Inclusive date bounds for optional `year`/`month` list filters.
pub(crate) fn date_bounds(
    year: Option<i32>,
    month: Option<u32>,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), AppError> {
    let invalid = || AppError::BadRequest(anyhow::anyhow!("invalid year or month"));
    match (year, month) {
        (None, None) => Ok((None, None)),
        (None, Some(_)) => Err(AppError::BadRequest(anyhow::anyhow!(
            "month requires year"
        ))),
        (Some(year), None) => Ok((
            Some(NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?),
            Some(NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(invalid)?),
        )),
        (Some(year), Some(month)) => {
            let period = Period::new(year, month).ok_or_else(invalid)?;
            Ok((
                Some(period.first_day().ok_or_else(invalid)?),
                Some(period.last_day().ok_or_else(invalid)?),
            ))
        }
    }
}
