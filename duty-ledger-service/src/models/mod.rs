//! Domain models for duty-ledger-service.

mod brand;
mod duty_entry;
mod duty_rate;
mod period;
mod report;
mod shipment;
mod transaction;

pub use brand::Brand;
pub use duty_entry::{
    format_reference_number, CreateDutyEntry, DutyEntry, DutyEntryFilter, DutyStatus,
};
pub use duty_rate::{DutyCategory, DutyRate, RateInput, RateType};
pub use period::Period;
pub use report::{
    BrandPnlReport, BrandRollup, DutyTotals, Margin, Metrics, MetricsComparison, PeriodChange,
    PlatformRollup, ReportWindow, SeriesPoint, ShipmentCostTotals,
};
pub use shipment::{CreateOutboundShipment, OutboundShipment, ShipmentFilter};
pub use transaction::{LedgerTransaction, NewTransaction, TransactionFilter, TransactionType};
