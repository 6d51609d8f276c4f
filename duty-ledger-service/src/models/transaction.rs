//! Brand ledger transaction model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::period::Period;

/// Kind of monetary movement recorded against a brand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Sale,
    Commission,
    Fulfilment,
    Duty,
    PromotionFunding,
    Storage,
    Refund,
    InboundShipping,
    Adjustment,
}

impl TransactionType {
    pub const ALL: [TransactionType; 9] = [
        Self::Sale,
        Self::Commission,
        Self::Fulfilment,
        Self::Duty,
        Self::PromotionFunding,
        Self::Storage,
        Self::Refund,
        Self::InboundShipping,
        Self::Adjustment,
    ];

    /// Credits are stored positive, everything else negative.
    pub fn is_credit(self) -> bool {
        matches!(self, Self::Sale | Self::Adjustment)
    }

    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::Commission => "commission",
            Self::Fulfilment => "fulfilment",
            Self::Duty => "duty",
            Self::PromotionFunding => "promotion_funding",
            Self::Storage => "storage",
            Self::Refund => "refund",
            Self::InboundShipping => "inbound_shipping",
            Self::Adjustment => "adjustment",
        }
    }

    /// Apply the ledger sign convention to an unsigned magnitude.
    pub fn signed(self, magnitude: Decimal) -> Decimal {
        if self.is_credit() {
            magnitude
        } else {
            -magnitude
        }
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(Self::Sale),
            "commission" => Ok(Self::Commission),
            "fulfilment" => Ok(Self::Fulfilment),
            "duty" => Ok(Self::Duty),
            "promotion_funding" => Ok(Self::PromotionFunding),
            "storage" => Ok(Self::Storage),
            "refund" => Ok(Self::Refund),
            "inbound_shipping" => Ok(Self::InboundShipping),
            "adjustment" => Ok(Self::Adjustment),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A posted, immutable ledger row. `amount` is already signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub transaction_id: Uuid,
    pub brand_id: Uuid,
    pub transaction_type: TransactionType,
    pub transaction_date: NaiveDate,
    pub amount: Decimal,
    pub period_year: i32,
    pub period_month: u32,
    pub description: String,
    pub reference: Option<String>,
    pub channel: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl LedgerTransaction {
    /// Reporting period stamped at write time.
    pub fn period(&self) -> Period {
        Period {
            year: self.period_year,
            month: self.period_month,
        }
    }
}

/// Input for appending a transaction. Callers pass a magnitude; the ledger
/// decides the stored sign from the transaction type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub brand_id: Uuid,
    pub transaction_type: TransactionType,
    pub transaction_date: NaiveDate,
    pub magnitude: Decimal,
    pub description: String,
    pub reference: Option<String>,
    pub channel: Option<String>,
}

/// Filter for transaction queries. `brand_id` is always required: there are
/// no cross-brand reads at this level.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub brand_id: Uuid,
    pub period_year: Option<i32>,
    pub period_month: Option<u32>,
    pub transaction_type: Option<TransactionType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl TransactionFilter {
    pub fn for_brand(brand_id: Uuid) -> Self {
        Self {
            brand_id,
            ..Default::default()
        }
    }

    pub fn in_period(mut self, period: Period) -> Self {
        self.period_year = Some(period.year);
        self.period_month = Some(period.month);
        self
    }

    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    /// Whether a transaction satisfies every set criterion.
    pub fn matches(&self, txn: &LedgerTransaction) -> bool {
        txn.brand_id == self.brand_id
            && self.period_year.is_none_or(|y| txn.period_year == y)
            && self.period_month.is_none_or(|m| txn.period_month == m)
            && self
                .transaction_type
                .is_none_or(|t| txn.transaction_type == t)
            && self.start_date.is_none_or(|d| txn.transaction_date >= d)
            && self.end_date.is_none_or(|d| txn.transaction_date <= d)
    }
}
