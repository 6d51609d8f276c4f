//! Storage capabilities the calculation services depend on.
//!
//! The services only ever see these traits, so the same logic runs against
//! PostgreSQL in production and the in-memory store in tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{
    Brand, DutyCategory, DutyEntry, DutyEntryFilter, DutyRate, DutyStatus, LedgerTransaction,
    OutboundShipment, ShipmentFilter, TransactionFilter,
};
use crate::services::error::LedgerError;

#[async_trait]
pub trait BrandStore: Send + Sync {
    async fn brand_exists(&self, brand_id: Uuid) -> Result<bool, LedgerError>;

    async fn list_brands(&self) -> Result<Vec<Brand>, LedgerError>;
}

#[async_trait]
pub trait RateStore: Send + Sync {
    /// Rates for one category, or the whole table.
    async fn load_rates(&self, category: Option<DutyCategory>)
        -> Result<Vec<DutyRate>, LedgerError>;

    async fn get_rate(&self, rate_id: Uuid) -> Result<Option<DutyRate>, LedgerError>;

    async fn insert_rate(&self, rate: &DutyRate) -> Result<(), LedgerError>;

    /// Replace a rate. Returns false when it does not exist.
    async fn replace_rate(&self, rate: &DutyRate) -> Result<bool, LedgerError>;

    /// Returns false when it does not exist.
    async fn delete_rate(&self, rate_id: Uuid) -> Result<bool, LedgerError>;
}

#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn insert_duty_entry(&self, entry: &DutyEntry) -> Result<(), LedgerError>;

    async fn get_duty_entry(&self, entry_id: Uuid) -> Result<Option<DutyEntry>, LedgerError>;

    async fn list_duty_entries(
        &self,
        filter: &DutyEntryFilter,
    ) -> Result<Vec<DutyEntry>, LedgerError>;

    /// Number of entries already recorded for `entry_date`, across brands.
    async fn count_duty_entries_on(&self, entry_date: NaiveDate) -> Result<u32, LedgerError>;

    async fn update_duty_entry_status(
        &self,
        entry_id: Uuid,
        status: DutyStatus,
    ) -> Result<Option<DutyEntry>, LedgerError>;

    async fn mark_duty_entry_posted(
        &self,
        entry_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<(), LedgerError>;

    async fn list_unposted_duty_entries(
        &self,
        brand_id: Option<Uuid>,
    ) -> Result<Vec<DutyEntry>, LedgerError>;

    async fn insert_outbound_shipment(&self, shipment: &OutboundShipment)
        -> Result<(), LedgerError>;

    async fn list_outbound_shipments(
        &self,
        filter: &ShipmentFilter,
    ) -> Result<Vec<OutboundShipment>, LedgerError>;

    /// `transaction_id` is `None` for shipments with nothing to post.
    async fn mark_shipment_posted(
        &self,
        shipment_id: Uuid,
        transaction_id: Option<Uuid>,
    ) -> Result<(), LedgerError>;

    async fn list_unposted_shipments(
        &self,
        brand_id: Option<Uuid>,
    ) -> Result<Vec<OutboundShipment>, LedgerError>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert an already-signed, period-stamped row.
    async fn append_transaction(&self, txn: &LedgerTransaction) -> Result<(), LedgerError>;

    /// Rows matching the filter, ordered by date then creation time.
    async fn query_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<LedgerTransaction>, LedgerError>;

    async fn find_transaction_by_reference(
        &self,
        brand_id: Uuid,
        reference: &str,
    ) -> Result<Option<LedgerTransaction>, LedgerError>;
}

/// Every capability together.
pub trait Store: BrandStore + RateStore + SourceStore + LedgerStore {}

impl<T> Store for T where T: BrandStore + RateStore + SourceStore + LedgerStore {}
