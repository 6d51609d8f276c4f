//! In-process store backing tests and local runs without PostgreSQL.
//!
//! Locks are `parking_lot` and never held across an `.await`.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::models::{
    Brand, DutyCategory, DutyEntry, DutyEntryFilter, DutyRate, DutyStatus, LedgerTransaction,
    OutboundShipment, ShipmentFilter, TransactionFilter,
};
use crate::services::error::LedgerError;
use crate::services::store::{BrandStore, LedgerStore, RateStore, SourceStore};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    brands: RwLock<HashMap<Uuid, Brand>>,
    rates: RwLock<Vec<DutyRate>>,
    duty_entries: RwLock<Vec<DutyEntry>>,
    shipments: RwLock<Vec<OutboundShipment>>,
    transactions: RwLock<Vec<LedgerTransaction>>,
    fail_appends: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a brand and return its id.
    pub fn add_brand(&self, name: &str) -> Uuid {
        let brand = Brand {
            brand_id: Uuid::new_v4(),
            name: name.to_string(),
            created_utc: Utc::now(),
        };
        let id = brand.brand_id;
        self.brands.write().insert(id, brand);
        id
    }

    /// Make every subsequent ledger append fail with a storage error.
    pub fn fail_ledger_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.read().len()
    }
}

#[async_trait]
impl BrandStore for InMemoryStore {
    async fn brand_exists(&self, brand_id: Uuid) -> Result<bool, LedgerError> {
        Ok(self.brands.read().contains_key(&brand_id))
    }

    async fn list_brands(&self) -> Result<Vec<Brand>, LedgerError> {
        let mut brands: Vec<Brand> = self.brands.read().values().cloned().collect();
        brands.sort_by(|a, b| a.name.cmp(&b.name).then(a.brand_id.cmp(&b.brand_id)));
        Ok(brands)
    }
}

#[async_trait]
impl RateStore for InMemoryStore {
    async fn load_rates(
        &self,
        category: Option<DutyCategory>,
    ) -> Result<Vec<DutyRate>, LedgerError> {
        Ok(self
            .rates
            .read()
            .iter()
            .filter(|r| category.is_none_or(|c| r.category == c))
            .cloned()
            .collect())
    }

    async fn get_rate(&self, rate_id: Uuid) -> Result<Option<DutyRate>, LedgerError> {
        Ok(self
            .rates
            .read()
            .iter()
            .find(|r| r.rate_id == rate_id)
            .cloned())
    }

    async fn insert_rate(&self, rate: &DutyRate) -> Result<(), LedgerError> {
        self.rates.write().push(rate.clone());
        Ok(())
    }

    async fn replace_rate(&self, rate: &DutyRate) -> Result<bool, LedgerError> {
        let mut rates = self.rates.write();
        match rates.iter_mut().find(|r| r.rate_id == rate.rate_id) {
            Some(existing) => {
                *existing = rate.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_rate(&self, rate_id: Uuid) -> Result<bool, LedgerError> {
        let mut rates = self.rates.write();
        let before = rates.len();
        rates.retain(|r| r.rate_id != rate_id);
        Ok(rates.len() != before)
    }
}

#[async_trait]
impl SourceStore for InMemoryStore {
    async fn insert_duty_entry(&self, entry: &DutyEntry) -> Result<(), LedgerError> {
        let mut entries = self.duty_entries.write();
        if entries
            .iter()
            .any(|e| e.reference_number == entry.reference_number)
        {
            return Err(LedgerError::Conflict(format!(
                "reference number {} already exists",
                entry.reference_number
            )));
        }
        entries.push(entry.clone());
        Ok(())
    }

    async fn get_duty_entry(&self, entry_id: Uuid) -> Result<Option<DutyEntry>, LedgerError> {
        Ok(self
            .duty_entries
            .read()
            .iter()
            .find(|e| e.entry_id == entry_id)
            .cloned())
    }

    async fn list_duty_entries(
        &self,
        filter: &DutyEntryFilter,
    ) -> Result<Vec<DutyEntry>, LedgerError> {
        let mut entries: Vec<DutyEntry> = self
            .duty_entries
            .read()
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.entry_date.cmp(&a.entry_date).then(b.created_utc.cmp(&a.created_utc)));
        Ok(entries)
    }

    async fn count_duty_entries_on(&self, entry_date: NaiveDate) -> Result<u32, LedgerError> {
        let count = self
            .duty_entries
            .read()
            .iter()
            .filter(|e| e.entry_date == entry_date)
            .count();
        Ok(count as u32)
    }

    async fn update_duty_entry_status(
        &self,
        entry_id: Uuid,
        status: DutyStatus,
    ) -> Result<Option<DutyEntry>, LedgerError> {
        let mut entries = self.duty_entries.write();
        Ok(entries
            .iter_mut()
            .find(|e| e.entry_id == entry_id)
            .map(|e| {
                e.status = status;
                e.clone()
            }))
    }

    async fn mark_duty_entry_posted(
        &self,
        entry_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<(), LedgerError> {
        let mut entries = self.duty_entries.write();
        let entry = entries
            .iter_mut()
            .find(|e| e.entry_id == entry_id)
            .ok_or_else(|| LedgerError::NotFound(format!("Duty entry {}", entry_id)))?;
        entry.posted = true;
        entry.ledger_transaction_id = Some(transaction_id);
        Ok(())
    }

    async fn list_unposted_duty_entries(
        &self,
        brand_id: Option<Uuid>,
    ) -> Result<Vec<DutyEntry>, LedgerError> {
        Ok(self
            .duty_entries
            .read()
            .iter()
            .filter(|e| !e.posted && brand_id.is_none_or(|b| e.brand_id == b))
            .cloned()
            .collect())
    }

    async fn insert_outbound_shipment(
        &self,
        shipment: &OutboundShipment,
    ) -> Result<(), LedgerError> {
        self.shipments.write().push(shipment.clone());
        Ok(())
    }

    async fn list_outbound_shipments(
        &self,
        filter: &ShipmentFilter,
    ) -> Result<Vec<OutboundShipment>, LedgerError> {
        let mut shipments: Vec<OutboundShipment> = self
            .shipments
            .read()
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        shipments.sort_by(|a, b| b.ship_date.cmp(&a.ship_date).then(b.created_utc.cmp(&a.created_utc)));
        Ok(shipments)
    }

    async fn mark_shipment_posted(
        &self,
        shipment_id: Uuid,
        transaction_id: Option<Uuid>,
    ) -> Result<(), LedgerError> {
        let mut shipments = self.shipments.write();
        let shipment = shipments
            .iter_mut()
            .find(|s| s.shipment_id == shipment_id)
            .ok_or_else(|| LedgerError::NotFound(format!("Outbound shipment {}", shipment_id)))?;
        shipment.posted = true;
        shipment.ledger_transaction_id = transaction_id;
        Ok(())
    }

    async fn list_unposted_shipments(
        &self,
        brand_id: Option<Uuid>,
    ) -> Result<Vec<OutboundShipment>, LedgerError> {
        Ok(self
            .shipments
            .read()
            .iter()
            .filter(|s| !s.posted && brand_id.is_none_or(|b| s.brand_id == b))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn append_transaction(&self, txn: &LedgerTransaction) -> Result<(), LedgerError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(LedgerError::Storage(anyhow::anyhow!(
                "ledger unavailable"
            )));
        }
        self.transactions.write().push(txn.clone());
        Ok(())
    }

    async fn query_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        let mut rows: Vec<LedgerTransaction> = self
            .transactions
            .read()
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.transaction_date
                .cmp(&b.transaction_date)
                .then(a.created_utc.cmp(&b.created_utc))
        });
        Ok(rows)
    }

    async fn find_transaction_by_reference(
        &self,
        brand_id: Uuid,
        reference: &str,
    ) -> Result<Option<LedgerTransaction>, LedgerError> {
        Ok(self
            .transactions
            .read()
            .iter()
            .find(|t| t.brand_id == brand_id && t.reference.as_deref() == Some(reference))
            .cloned())
    }
}
