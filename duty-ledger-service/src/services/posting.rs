//! Posting adapters: record a duty entry or outbound shipment, then append
//! the matching ledger transaction.
//!
//! The source record is always written first. A failed ledger append never
//! rolls it back; the caller gets the record plus a warning, and the record
//! stays `posted = false` until reconciliation picks it up.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{
    format_reference_number, CreateDutyEntry, CreateOutboundShipment, DutyEntry, DutyEntryFilter,
    DutyStatus, LedgerTransaction, NewTransaction, OutboundShipment, ShipmentFilter,
    TransactionType,
};
use crate::services::error::LedgerError;
use crate::services::ledger::{validate_magnitude, Ledger};
use crate::services::metrics::{record_error, record_posting};
use crate::services::rate_table::RateTable;
use crate::services::resolver::DutyQuantities;
use crate::services::store::Store;

const MAX_REFERENCE_ATTEMPTS: u32 = 3;
const MAX_SHIPMENT_REFERENCE_LEN: usize = 100;
const MAX_CHANNEL_LEN: usize = 100;

pub(crate) const DUTY_SOURCE: &str = "duty_entry";
pub(crate) const SHIPMENT_SOURCE: &str = "outbound_shipment";

/// A created source record and the outcome of posting it.
#[derive(Debug, Clone, Serialize)]
pub struct Posted<T> {
    pub record: T,
    pub transaction: Option<LedgerTransaction>,
    /// Set when the record was saved but the ledger side did not complete.
    pub warning: Option<String>,
}

#[derive(Clone)]
pub struct PostingService {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) ledger: Ledger,
    rates: RateTable,
}

impl PostingService {
    pub fn new(store: Arc<dyn Store>, ledger: Ledger, rates: RateTable) -> Self {
        Self {
            store,
            ledger,
            rates,
        }
    }

    // -------------------------------------------------------------------------
    // Duty entries
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(brand_id = %input.brand_id))]
    pub async fn create_duty_entry(
        &self,
        input: CreateDutyEntry,
    ) -> Result<Posted<DutyEntry>, LedgerError> {
        let input = self.validate_duty_entry(input).await?;
        let total_duty_amount = match input.total_duty_amount {
            Some(amount) => amount,
            None => self.suggested_amount(&input).await?,
        };

        let mut entry = DutyEntry {
            entry_id: Uuid::new_v4(),
            brand_id: input.brand_id,
            reference_number: String::new(),
            entry_date: input.entry_date,
            category: input.category,
            subcategory: input.subcategory,
            abv: input.abv,
            volume_litres: input.volume_litres,
            quantity_units: input.quantity_units,
            total_duty_amount,
            hmrc_payment_reference: input.hmrc_payment_reference,
            status: input.status.unwrap_or(DutyStatus::Pending),
            linked_inbound_shipment_id: input.linked_inbound_shipment_id,
            notes: input.notes,
            posted: false,
            ledger_transaction_id: None,
            created_utc: Utc::now(),
        };

        // Another request may take the same sequence number between count and insert.
        let mut attempt = 0;
        loop {
            attempt += 1;
            let sequence = self.store.count_duty_entries_on(entry.entry_date).await? + attempt;
            entry.reference_number = format_reference_number(entry.entry_date, sequence);
            match self.store.insert_duty_entry(&entry).await {
                Ok(()) => break,
                Err(LedgerError::Conflict(_)) if attempt < MAX_REFERENCE_ATTEMPTS => continue,
                Err(e) => return Err(e),
            }
        }

        info!(
            entry_id = %entry.entry_id,
            reference_number = %entry.reference_number,
            total_duty_amount = %entry.total_duty_amount,
            "Duty entry recorded"
        );

        let posting = self.post_duty_entry(&entry).await;
        Ok(self.settle_duty_entry(entry, posting).await)
    }

    async fn validate_duty_entry(
        &self,
        mut input: CreateDutyEntry,
    ) -> Result<CreateDutyEntry, LedgerError> {
        if let Some(amount) = input.total_duty_amount {
            validate_magnitude("total_duty_amount", amount)?;
        }
        DutyQuantities {
            volume_litres: input.volume_litres,
            abv: input.abv,
            quantity_units: input.quantity_units,
        }
        .validate()?;
        input.subcategory = input
            .subcategory
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        if !self.store.brand_exists(input.brand_id).await? {
            return Err(LedgerError::UnknownBrand(input.brand_id));
        }
        Ok(input)
    }

    /// Fill an omitted amount from the rate table.
    async fn suggested_amount(&self, input: &CreateDutyEntry) -> Result<Decimal, LedgerError> {
        let manual = || {
            LedgerError::validation(
                "total_duty_amount",
                "no applicable duty rate; duty must be entered manually",
            )
        };
        let (Some(category), Some(abv)) = (input.category, input.abv) else {
            return Err(manual());
        };

        let suggestion = self
            .rates
            .suggest(
                category,
                input.subcategory.as_deref(),
                input.entry_date,
                DutyQuantities {
                    volume_litres: input.volume_litres,
                    abv: Some(abv),
                    quantity_units: input.quantity_units,
                },
            )
            .await?
            .ok_or_else(manual)?;

        info!(
            rate_id = %suggestion.rate.rate_id,
            amount = %suggestion.amount,
            "Duty amount filled from rate table"
        );
        Ok(suggestion.amount)
    }

    /// Append the `duty` transaction for an entry. Does not touch the entry.
    pub async fn post_duty_entry(&self, entry: &DutyEntry) -> Result<LedgerTransaction, LedgerError> {
        self.ledger
            .append(NewTransaction {
                brand_id: entry.brand_id,
                transaction_type: TransactionType::Duty,
                transaction_date: entry.entry_date,
                magnitude: entry.total_duty_amount,
                description: entry.ledger_description(),
                reference: Some(entry.ledger_reference()),
                channel: None,
            })
            .await
    }

    async fn settle_duty_entry(
        &self,
        mut entry: DutyEntry,
        posting: Result<LedgerTransaction, LedgerError>,
    ) -> Posted<DutyEntry> {
        let txn = match posting {
            Ok(txn) => txn,
            Err(e) => {
                warn!(
                    entry_id = %entry.entry_id,
                    reference_number = %entry.reference_number,
                    error = %e,
                    "Duty entry saved but ledger posting failed"
                );
                record_posting(DUTY_SOURCE, "failed");
                record_error(e.kind());
                let warning = format!(
                    "Duty entry {} was saved but could not be posted to the ledger: {}",
                    entry.reference_number, e
                );
                return Posted {
                    record: entry,
                    transaction: None,
                    warning: Some(warning),
                };
            }
        };

        let warning = match self
            .store
            .mark_duty_entry_posted(entry.entry_id, txn.transaction_id)
            .await
        {
            Ok(()) => {
                entry.posted = true;
                entry.ledger_transaction_id = Some(txn.transaction_id);
                record_posting(DUTY_SOURCE, "posted");
                None
            }
            Err(e) => {
                warn!(
                    entry_id = %entry.entry_id,
                    transaction_id = %txn.transaction_id,
                    error = %e,
                    "Duty entry posted but posted flag not saved"
                );
                record_posting(DUTY_SOURCE, "unflagged");
                Some(format!(
                    "Duty entry {} was posted as transaction {} but is not yet marked posted: {}",
                    entry.reference_number, txn.transaction_id, e
                ))
            }
        };

        Posted {
            record: entry,
            transaction: Some(txn),
            warning,
        }
    }

    #[instrument(skip(self), fields(entry_id = %entry_id))]
    pub async fn get_duty_entry(&self, entry_id: Uuid) -> Result<DutyEntry, LedgerError> {
        self.store
            .get_duty_entry(entry_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Duty entry {}", entry_id)))
    }

    pub async fn list_duty_entries(
        &self,
        filter: &DutyEntryFilter,
    ) -> Result<Vec<DutyEntry>, LedgerError> {
        self.store.list_duty_entries(filter).await
    }

    /// Set any status. Never touches the ledger.
    #[instrument(skip(self), fields(entry_id = %entry_id, status = %status))]
    pub async fn update_duty_entry_status(
        &self,
        entry_id: Uuid,
        status: DutyStatus,
    ) -> Result<DutyEntry, LedgerError> {
        let entry = self
            .store
            .update_duty_entry_status(entry_id, status)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Duty entry {}", entry_id)))?;
        info!(reference_number = %entry.reference_number, "Duty entry status updated");
        Ok(entry)
    }

    // -------------------------------------------------------------------------
    // Outbound shipments
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(brand_id = %input.brand_id))]
    pub async fn create_outbound_shipment(
        &self,
        input: CreateOutboundShipment,
    ) -> Result<Posted<OutboundShipment>, LedgerError> {
        validate_magnitude("shipping_cost", input.shipping_cost)?;
        validate_magnitude("handling_fee", input.handling_fee)?;
        validate_magnitude("packaging_cost", input.packaging_cost)?;

        let shipment_reference = input.shipment_reference.trim().to_string();
        if shipment_reference.is_empty() || shipment_reference.len() > MAX_SHIPMENT_REFERENCE_LEN {
            return Err(LedgerError::validation(
                "shipment_reference",
                format!("must be 1 to {} characters", MAX_SHIPMENT_REFERENCE_LEN),
            ));
        }
        if input.channel.as_ref().is_some_and(|c| c.len() > MAX_CHANNEL_LEN) {
            return Err(LedgerError::validation(
                "channel",
                format!("must be at most {} characters", MAX_CHANNEL_LEN),
            ));
        }
        if !self.store.brand_exists(input.brand_id).await? {
            return Err(LedgerError::UnknownBrand(input.brand_id));
        }

        let mut shipment = OutboundShipment {
            shipment_id: Uuid::new_v4(),
            brand_id: input.brand_id,
            shipment_reference,
            ship_date: input.ship_date,
            shipping_cost: input.shipping_cost,
            handling_fee: input.handling_fee,
            packaging_cost: input.packaging_cost,
            channel: input.channel,
            posted: false,
            ledger_transaction_id: None,
            created_utc: Utc::now(),
        };
        self.store.insert_outbound_shipment(&shipment).await?;

        info!(
            shipment_id = %shipment.shipment_id,
            total_cost = %shipment.total_cost(),
            "Outbound shipment recorded"
        );

        if shipment.total_cost().is_zero() {
            // Nothing to post.
            let warning = match self
                .store
                .mark_shipment_posted(shipment.shipment_id, None)
                .await
            {
                Ok(()) => {
                    shipment.posted = true;
                    record_posting(SHIPMENT_SOURCE, "skipped");
                    None
                }
                Err(e) => Some(format!(
                    "Shipment {} has no cost but could not be marked posted: {}",
                    shipment.shipment_reference, e
                )),
            };
            return Ok(Posted {
                record: shipment,
                transaction: None,
                warning,
            });
        }

        let posting = self.post_outbound_shipment(&shipment).await;
        Ok(self.settle_shipment(shipment, posting).await)
    }

    /// Append the `fulfilment` transaction for a shipment's summed costs.
    /// Returns `Ok(None)` when the total is zero.
    pub async fn post_outbound_shipment(
        &self,
        shipment: &OutboundShipment,
    ) -> Result<Option<LedgerTransaction>, LedgerError> {
        let total = shipment.total_cost();
        if total <= Decimal::ZERO {
            return Ok(None);
        }
        self.ledger
            .append(NewTransaction {
                brand_id: shipment.brand_id,
                transaction_type: TransactionType::Fulfilment,
                transaction_date: shipment.ship_date,
                magnitude: total,
                description: shipment.ledger_description(),
                reference: Some(shipment.ledger_reference()),
                channel: shipment.channel.clone(),
            })
            .await
            .map(Some)
    }

    async fn settle_shipment(
        &self,
        mut shipment: OutboundShipment,
        posting: Result<Option<LedgerTransaction>, LedgerError>,
    ) -> Posted<OutboundShipment> {
        let txn = match posting {
            Ok(txn) => txn,
            Err(e) => {
                warn!(
                    shipment_id = %shipment.shipment_id,
                    shipment_reference = %shipment.shipment_reference,
                    error = %e,
                    "Shipment saved but ledger posting failed"
                );
                record_posting(SHIPMENT_SOURCE, "failed");
                record_error(e.kind());
                let warning = format!(
                    "Shipment {} was saved but could not be posted to the ledger: {}",
                    shipment.shipment_reference, e
                );
                return Posted {
                    record: shipment,
                    transaction: None,
                    warning: Some(warning),
                };
            }
        };

        let transaction_id = txn.as_ref().map(|t| t.transaction_id);
        let warning = match self
            .store
            .mark_shipment_posted(shipment.shipment_id, transaction_id)
            .await
        {
            Ok(()) => {
                shipment.posted = true;
                shipment.ledger_transaction_id = transaction_id;
                record_posting(SHIPMENT_SOURCE, "posted");
                None
            }
            Err(e) => {
                warn!(
                    shipment_id = %shipment.shipment_id,
                    error = %e,
                    "Shipment posted but posted flag not saved"
                );
                record_posting(SHIPMENT_SOURCE, "unflagged");
                Some(format!(
                    "Shipment {} was posted but is not yet marked posted: {}",
                    shipment.shipment_reference, e
                ))
            }
        };

        Posted {
            record: shipment,
            transaction: txn,
            warning,
        }
    }

    pub async fn list_outbound_shipments(
        &self,
        filter: &ShipmentFilter,
    ) -> Result<Vec<OutboundShipment>, LedgerError> {
        self.store.list_outbound_shipments(filter).await
    }
}
