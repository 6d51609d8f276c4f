//! Posting reconciliation sweep.
//!
//! Finds source records still flagged `posted = false` and brings them in
//! line with the ledger. A record whose ledger row already exists (append
//! succeeded, flag update did not) is relinked rather than posted twice, so
//! the sweep can be run any number of times.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{DutyEntry, OutboundShipment};
use crate::services::error::LedgerError;
use crate::services::metrics::{record_posting, record_reconciliation};
use crate::services::posting::{PostingService, DUTY_SOURCE, SHIPMENT_SOURCE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationFailure {
    /// Duty reference number or shipment reference.
    pub reference: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub examined: usize,
    pub reposted: usize,
    pub relinked: usize,
    pub failed: Vec<ReconciliationFailure>,
}

enum Outcome {
    Reposted,
    Relinked,
    /// Zero-cost shipment flagged without a ledger row.
    Settled,
}

impl ReconciliationReport {
    fn record(&mut self, reference: &str, outcome: Result<Outcome, LedgerError>) {
        self.examined += 1;
        match outcome {
            Ok(Outcome::Reposted) => {
                self.reposted += 1;
                record_reconciliation("reposted");
            }
            Ok(Outcome::Relinked) => {
                self.relinked += 1;
                record_reconciliation("relinked");
            }
            Ok(Outcome::Settled) => record_reconciliation("settled"),
            Err(e) => {
                warn!(reference = %reference, error = %e, "Reconciliation could not post record");
                record_reconciliation("failed");
                self.failed.push(ReconciliationFailure {
                    reference: reference.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
}

impl PostingService {
    /// Post or relink every unposted duty entry and shipment, optionally for
    /// one brand only.
    #[instrument(skip(self))]
    pub async fn reconcile(
        &self,
        brand_id: Option<Uuid>,
    ) -> Result<ReconciliationReport, LedgerError> {
        if let Some(brand_id) = brand_id {
            if !self.store.brand_exists(brand_id).await? {
                return Err(LedgerError::UnknownBrand(brand_id));
            }
        }

        let mut report = ReconciliationReport::default();

        for entry in self.store.list_unposted_duty_entries(brand_id).await? {
            let outcome = self.reconcile_duty_entry(&entry).await;
            report.record(&entry.reference_number, outcome);
        }
        for shipment in self.store.list_unposted_shipments(brand_id).await? {
            let outcome = self.reconcile_shipment(&shipment).await;
            report.record(&shipment.shipment_reference, outcome);
        }

        info!(
            examined = report.examined,
            reposted = report.reposted,
            relinked = report.relinked,
            failed = report.failed.len(),
            "Reconciliation sweep finished"
        );
        Ok(report)
    }

    async fn reconcile_duty_entry(&self, entry: &DutyEntry) -> Result<Outcome, LedgerError> {
        let existing = self
            .store
            .find_transaction_by_reference(entry.brand_id, &entry.ledger_reference())
            .await?;

        let (txn, outcome) = match existing {
            Some(txn) => (txn, Outcome::Relinked),
            None => (self.post_duty_entry(entry).await?, Outcome::Reposted),
        };
        self.store
            .mark_duty_entry_posted(entry.entry_id, txn.transaction_id)
            .await?;
        record_posting(DUTY_SOURCE, "posted");
        Ok(outcome)
    }

    async fn reconcile_shipment(&self, shipment: &OutboundShipment) -> Result<Outcome, LedgerError> {
        let existing = self
            .store
            .find_transaction_by_reference(shipment.brand_id, &shipment.ledger_reference())
            .await?;

        let (transaction_id, outcome) = match existing {
            Some(txn) => (Some(txn.transaction_id), Outcome::Relinked),
            None => match self.post_outbound_shipment(shipment).await? {
                Some(txn) => (Some(txn.transaction_id), Outcome::Reposted),
                None => (None, Outcome::Settled),
            },
        };
        self.store
            .mark_shipment_posted(shipment.shipment_id, transaction_id)
            .await?;
        record_posting(SHIPMENT_SOURCE, "posted");
        Ok(outcome)
    }
}
