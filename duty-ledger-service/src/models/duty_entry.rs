//! Duty entry model: duty recorded when stock leaves bond.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::duty_rate::DutyCategory;

/// Duty lifecycle: recorded, paid to HMRC, passed on to the brand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DutyStatus {
    Pending,
    Paid,
    Charged,
}

impl DutyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Charged => "charged",
        }
    }
}

impl FromStr for DutyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "charged" => Ok(Self::Charged),
            other => Err(format!("unknown duty status '{}'", other)),
        }
    }
}

impl std::fmt::Display for DutyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DutyEntry {
    pub entry_id: Uuid,
    pub brand_id: Uuid,
    pub reference_number: String,
    pub entry_date: NaiveDate,
    pub category: Option<DutyCategory>,
    pub subcategory: Option<String>,
    pub abv: Option<Decimal>,
    pub volume_litres: Option<Decimal>,
    pub quantity_units: Option<i64>,
    /// Authoritative amount; may differ from the resolver's suggestion.
    pub total_duty_amount: Decimal,
    pub hmrc_payment_reference: Option<String>,
    pub status: DutyStatus,
    pub linked_inbound_shipment_id: Option<Uuid>,
    pub notes: Option<String>,
    pub posted: bool,
    pub ledger_transaction_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

impl DutyEntry {
    /// Reference written onto the ledger row this entry posts.
    pub fn ledger_reference(&self) -> String {
        format!("duty_entry:{}", self.entry_id)
    }

    /// One-line summary of category, volume and ABV for the ledger row.
    pub fn ledger_description(&self) -> String {
        let mut parts = vec![format!("Duty {}", self.reference_number)];
        if let Some(category) = self.category {
            match &self.subcategory {
                Some(sub) => parts.push(format!("{} ({})", category, sub)),
                None => parts.push(category.to_string()),
            }
        }
        if let Some(volume) = self.volume_litres {
            parts.push(format!("{}L", volume.normalize()));
        }
        if let Some(abv) = self.abv {
            parts.push(format!("{}% ABV", abv.normalize()));
        }
        if let Some(units) = self.quantity_units {
            parts.push(format!("{} units", units));
        }
        parts.join(" - ")
    }
}

/// Operator input for recording duty. `total_duty_amount` may be omitted,
/// in which case the resolver's suggestion is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateDutyEntry {
    pub brand_id: Uuid,
    pub entry_date: NaiveDate,
    #[serde(default)]
    pub category: Option<DutyCategory>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub abv: Option<Decimal>,
    #[serde(default)]
    pub volume_litres: Option<Decimal>,
    #[serde(default)]
    pub quantity_units: Option<i64>,
    #[serde(default)]
    pub total_duty_amount: Option<Decimal>,
    #[serde(default)]
    pub hmrc_payment_reference: Option<String>,
    #[serde(default)]
    pub status: Option<DutyStatus>,
    #[serde(default)]
    pub linked_inbound_shipment_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Filter for listing duty entries.
#[derive(Debug, Clone, Default)]
pub struct DutyEntryFilter {
    pub brand_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<DutyStatus>,
}

impl DutyEntryFilter {
    pub fn matches(&self, entry: &DutyEntry) -> bool {
        self.brand_id.is_none_or(|b| entry.brand_id == b)
            && self.start_date.is_none_or(|d| entry.entry_date >= d)
            && self.end_date.is_none_or(|d| entry.entry_date <= d)
            && self.status.is_none_or(|s| entry.status == s)
    }
}

/// Reference number in the `DUTY-YYYYMMDD-NNNN` format.
pub fn format_reference_number(entry_date: NaiveDate, sequence: u32) -> String {
    format!("DUTY-{}-{:04}", entry_date.format("%Y%m%d"), sequence)
}
