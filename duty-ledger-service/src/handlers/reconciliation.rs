use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;

use crate::services::ReconciliationReport;
use crate::startup::AppState;

#[derive(Debug, Deserialize)]
pub struct ReconcileQuery {
    pub brand_id: Option<Uuid>,
}

#[tracing::instrument(skip(state))]
pub async fn run_reconciliation(
    State(state): State<AppState>,
    Query(query): Query<ReconcileQuery>,
) -> Result<Json<ReconciliationReport>, AppError> {
    Ok(Json(state.posting.reconcile(query.brand_id).await?))
}
