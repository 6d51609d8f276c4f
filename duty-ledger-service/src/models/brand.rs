//! Brand reference data (owned by the onboarding screens, read-only here).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub brand_id: Uuid,
    pub name: String,
    pub created_utc: DateTime<Utc>,
}
