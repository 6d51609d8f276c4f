//! Operator-maintained duty rate table.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{DutyCategory, DutyRate, RateInput};
use crate::services::error::LedgerError;
use crate::services::metrics::record_resolution;
use crate::services::resolver::{
    check_scale, resolve_rate, suggest_duty, validate_abv, DutyQuantities, DutyQuery,
    DutySuggestion, Resolution, RATE_AMOUNT_SCALE,
};
use crate::services::store::Store;

/// Normalise and validate operator input.
pub fn validate_rate_input(input: &RateInput) -> Result<RateInput, LedgerError> {
    let mut input = input.clone();
    input.subcategory = input
        .subcategory
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    if input.rate_amount.is_sign_negative() && !input.rate_amount.is_zero() {
        return Err(LedgerError::validation("rate_amount", "must not be negative"));
    }
    check_scale("rate_amount", input.rate_amount, RATE_AMOUNT_SCALE)?;
    for (field, bound) in [("min_abv", input.min_abv), ("max_abv", input.max_abv)] {
        if let Some(abv) = bound {
            validate_abv(field, abv)?;
        }
    }
    if let (Some(min), Some(max)) = (input.min_abv, input.max_abv) {
        if min > max {
            return Err(LedgerError::validation(
                "max_abv",
                "must not be lower than min_abv",
            ));
        }
    }
    if let Some(to) = input.effective_to {
        if to <= input.effective_from {
            return Err(LedgerError::validation(
                "effective_to",
                "must be after effective_from",
            ));
        }
    }
    Ok(input)
}

/// A rate that can never be ranked against `input`: same category and
/// subcategory, same ABV band, overlapping effective window.
fn find_unrankable<'a>(
    input: &RateInput,
    existing: &'a [DutyRate],
    ignore: Option<Uuid>,
) -> Option<&'a DutyRate> {
    existing.iter().find(|rate| {
        Some(rate.rate_id) != ignore
            && rate.category == input.category
            && rate.subcategory == input.subcategory
            && rate.min_abv == input.min_abv
            && rate.max_abv == input.max_abv
            && rate.window_overlaps(input.effective_from, input.effective_to)
    })
}

#[derive(Clone)]
pub struct RateTable {
    store: Arc<dyn Store>,
}

impl RateTable {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, category: Option<DutyCategory>) -> Result<Vec<DutyRate>, LedgerError> {
        self.store.load_rates(category).await
    }

    #[instrument(skip(self), fields(rate_id = %rate_id))]
    pub async fn get(&self, rate_id: Uuid) -> Result<DutyRate, LedgerError> {
        self.store
            .get_rate(rate_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Duty rate {}", rate_id)))
    }

    #[instrument(skip(self, input), fields(category = %input.category))]
    pub async fn create(&self, input: &RateInput) -> Result<DutyRate, LedgerError> {
        let input = validate_rate_input(input)?;
        let existing = self.store.load_rates(Some(input.category)).await?;
        if let Some(clash) = find_unrankable(&input, &existing, None) {
            return Err(LedgerError::Conflict(format!(
                "rate {} already covers the same band and window",
                clash.rate_id
            )));
        }

        let now = Utc::now();
        let rate = DutyRate {
            rate_id: Uuid::new_v4(),
            category: input.category,
            subcategory: input.subcategory,
            min_abv: input.min_abv,
            max_abv: input.max_abv,
            rate_amount: input.rate_amount,
            rate_type: input.rate_type,
            effective_from: input.effective_from,
            effective_to: input.effective_to,
            created_utc: now,
            updated_utc: now,
        };
        self.store.insert_rate(&rate).await?;

        info!(rate_id = %rate.rate_id, rate_type = %rate.rate_type, "Duty rate created");
        Ok(rate)
    }

    /// Replace a rate. Already-posted duty entries keep their own amounts.
    #[instrument(skip(self, input), fields(rate_id = %rate_id))]
    pub async fn update(&self, rate_id: Uuid, input: &RateInput) -> Result<DutyRate, LedgerError> {
        let current = self.get(rate_id).await?;
        let input = validate_rate_input(input)?;
        let existing = self.store.load_rates(Some(input.category)).await?;
        if let Some(clash) = find_unrankable(&input, &existing, Some(rate_id)) {
            return Err(LedgerError::Conflict(format!(
                "rate {} already covers the same band and window",
                clash.rate_id
            )));
        }

        let rate = DutyRate {
            rate_id,
            category: input.category,
            subcategory: input.subcategory,
            min_abv: input.min_abv,
            max_abv: input.max_abv,
            rate_amount: input.rate_amount,
            rate_type: input.rate_type,
            effective_from: input.effective_from,
            effective_to: input.effective_to,
            created_utc: current.created_utc,
            updated_utc: Utc::now(),
        };
        if !self.store.replace_rate(&rate).await? {
            return Err(LedgerError::NotFound(format!("Duty rate {}", rate_id)));
        }

        info!("Duty rate updated");
        Ok(rate)
    }

    #[instrument(skip(self), fields(rate_id = %rate_id))]
    pub async fn delete(&self, rate_id: Uuid) -> Result<(), LedgerError> {
        if !self.store.delete_rate(rate_id).await? {
            return Err(LedgerError::NotFound(format!("Duty rate {}", rate_id)));
        }
        info!("Duty rate deleted");
        Ok(())
    }

    /// Resolve against the current table.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        category: DutyCategory,
        subcategory: Option<&str>,
        abv: Decimal,
        as_of: NaiveDate,
    ) -> Result<Option<DutyRate>, LedgerError> {
        validate_abv("abv", abv)?;
        let rates = self.store.load_rates(Some(category)).await?;
        let query = DutyQuery {
            category,
            subcategory,
            abv,
            as_of,
        };
        let resolved = match resolve_rate(&query, &rates) {
            Resolution::Matched(rate) => Some(rate.clone()),
            Resolution::NotFound => None,
        };
        record_resolution(
            category.as_str(),
            if resolved.is_some() { "matched" } else { "not_found" },
        );
        Ok(resolved)
    }

    /// Resolve and price. `Ok(None)` tells the operator to enter duty by hand.
    #[instrument(skip(self, quantities))]
    pub async fn suggest(
        &self,
        category: DutyCategory,
        subcategory: Option<&str>,
        as_of: NaiveDate,
        quantities: DutyQuantities,
    ) -> Result<Option<DutySuggestion>, LedgerError> {
        let abv = quantities
            .abv
            .ok_or_else(|| LedgerError::validation("abv", "required to resolve a rate"))?;
        let rates = self.store.load_rates(Some(category)).await?;
        let query = DutyQuery {
            category,
            subcategory,
            abv,
            as_of,
        };
        let suggestion = suggest_duty(&query, &rates, quantities)?;
        record_resolution(
            category.as_str(),
            if suggestion.is_some() { "matched" } else { "not_found" },
        );
        Ok(suggestion)
    }
}
