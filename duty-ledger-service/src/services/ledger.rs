//! Append-only brand ledger.
//!
//! This is the only place a transaction's stored sign is decided.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{LedgerTransaction, NewTransaction, Period, TransactionFilter, TransactionType};
use crate::services::error::LedgerError;
use crate::services::metrics::{record_ledger_append, DB_QUERY_DURATION};
use crate::services::store::Store;

const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_REFERENCE_LEN: usize = 200;
const MAX_CHANNEL_LEN: usize = 100;

/// Check an unsigned money input: non-negative, at most two decimal places.
pub fn validate_magnitude(field: &'static str, amount: Decimal) -> Result<(), LedgerError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(LedgerError::validation(field, "must not be negative"));
    }
    if amount.normalize().scale() > 2 {
        return Err(LedgerError::validation(
            field,
            "must have at most two decimal places",
        ));
    }
    Ok(())
}

/// Build the stored row: signed amount, period stamped from the date.
pub fn build_transaction(input: NewTransaction) -> LedgerTransaction {
    let period = Period::of(input.transaction_date);
    LedgerTransaction {
        transaction_id: Uuid::new_v4(),
        brand_id: input.brand_id,
        transaction_type: input.transaction_type,
        transaction_date: input.transaction_date,
        amount: input.transaction_type.signed(input.magnitude.abs()),
        period_year: period.year,
        period_month: period.month,
        description: input.description,
        reference: input.reference,
        channel: input.channel,
        created_utc: Utc::now(),
    }
}

#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Validate, sign and append one transaction.
    #[instrument(
        skip(self, input),
        fields(brand_id = %input.brand_id, transaction_type = %input.transaction_type)
    )]
    pub async fn append(&self, input: NewTransaction) -> Result<LedgerTransaction, LedgerError> {
        let result = self.append_inner(input).await;
        match &result {
            Ok(txn) => record_ledger_append(txn.transaction_type.as_str(), "ok"),
            Err(e) => record_ledger_append("unknown", e.kind()),
        }
        result
    }

    async fn append_inner(&self, input: NewTransaction) -> Result<LedgerTransaction, LedgerError> {
        validate_magnitude("amount", input.magnitude)?;

        let description = input.description.trim().to_string();
        if description.is_empty() {
            return Err(LedgerError::validation("description", "must not be empty"));
        }
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(LedgerError::validation(
                "description",
                format!("must be at most {} characters", MAX_DESCRIPTION_LEN),
            ));
        }
        if input
            .reference
            .as_ref()
            .is_some_and(|r| r.len() > MAX_REFERENCE_LEN)
        {
            return Err(LedgerError::validation(
                "reference",
                format!("must be at most {} characters", MAX_REFERENCE_LEN),
            ));
        }
        if input
            .channel
            .as_ref()
            .is_some_and(|c| c.len() > MAX_CHANNEL_LEN)
        {
            return Err(LedgerError::validation(
                "channel",
                format!("must be at most {} characters", MAX_CHANNEL_LEN),
            ));
        }

        if !self.store.brand_exists(input.brand_id).await? {
            warn!(brand_id = %input.brand_id, "Rejected transaction for unknown brand");
            return Err(LedgerError::UnknownBrand(input.brand_id));
        }

        let txn = build_transaction(NewTransaction {
            description,
            ..input
        });

        let timer = DB_QUERY_DURATION
            .with_label_values(&["append_transaction"])
            .start_timer();
        self.store.append_transaction(&txn).await?;
        timer.observe_duration();

        info!(
            transaction_id = %txn.transaction_id,
            amount = %txn.amount,
            period_year = txn.period_year,
            period_month = txn.period_month,
            "Transaction appended"
        );

        Ok(txn)
    }

    /// Post a correction. Adjustments are the only way to change history.
    pub async fn record_adjustment(
        &self,
        brand_id: Uuid,
        transaction_date: NaiveDate,
        magnitude: Decimal,
        description: String,
        reference: Option<String>,
    ) -> Result<LedgerTransaction, LedgerError> {
        self.append(NewTransaction {
            brand_id,
            transaction_type: TransactionType::Adjustment,
            transaction_date,
            magnitude,
            description,
            reference,
            channel: None,
        })
        .await
    }

    #[instrument(skip(self, filter), fields(brand_id = %filter.brand_id))]
    pub async fn list(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        if let Some(month) = filter.period_month {
            if !(1..=12).contains(&month) {
                return Err(LedgerError::validation("month", "must be between 1 and 12"));
            }
        }
        self.store.query_transactions(filter).await
    }
}
