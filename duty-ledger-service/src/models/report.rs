//! P&L report shapes returned to dashboards.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::period::Period;

/// Net over revenue, or `Undefined` when there was no revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Margin {
    Ratio { value: Decimal },
    Undefined,
}

/// Percentage change against a prior value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PeriodChange {
    Percent { value: Decimal },
    NoPriorBaseline,
}

/// Aggregated figures for one set of transactions.
///
/// Cost buckets are positive; `adjustments` keeps its stored sign and only
/// flows into `net`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub revenue: Decimal,
    pub commission: Decimal,
    pub fulfilment: Decimal,
    pub duties: Decimal,
    pub promotions: Decimal,
    pub storage: Decimal,
    pub refunds: Decimal,
    pub inbound_shipping: Decimal,
    pub adjustments: Decimal,
    pub total_costs: Decimal,
    pub net: Decimal,
    pub margin: Margin,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsComparison {
    pub revenue: PeriodChange,
    pub commission: PeriodChange,
    pub fulfilment: PeriodChange,
    pub duties: PeriodChange,
    pub promotions: PeriodChange,
    pub storage: PeriodChange,
    pub refunds: PeriodChange,
    pub total_costs: PeriodChange,
    pub net: PeriodChange,
}

/// One month of the dashboard chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub year: i32,
    pub month: u32,
    pub revenue: Decimal,
    pub costs: Decimal,
    pub net: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandPnlReport {
    pub brand_id: Uuid,
    pub period: Period,
    pub current_month: Metrics,
    pub previous_month: Metrics,
    pub month_over_month: MetricsComparison,
    pub year_to_date: Metrics,
    pub monthly_series: Vec<SeriesPoint>,
}

/// Cost sub-components read straight from the shipment records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipmentCostTotals {
    pub shipping: Decimal,
    pub handling: Decimal,
    pub packaging: Decimal,
    pub total: Decimal,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DutyTotals {
    pub total: Decimal,
    pub pending: Decimal,
    pub paid: Decimal,
    pub charged: Decimal,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandRollup {
    pub brand_id: Uuid,
    pub brand_name: String,
    pub metrics: Metrics,
    pub shipment_costs: ShipmentCostTotals,
    pub duty_totals: DutyTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformRollup {
    pub window: ReportWindow,
    pub brands: Vec<BrandRollup>,
    pub totals: Metrics,
    pub shipment_costs: ShipmentCostTotals,
    pub duty_totals: DutyTotals,
}

/// Reporting window for rollups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportWindow {
    Month { year: i32, month: u32 },
    YearToDate { year: i32 },
}
