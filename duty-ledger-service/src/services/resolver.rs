//! Duty rate resolution and duty computation.
//!
//! Everything here is pure: the caller loads the rate table and passes it in.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::cmp::Ordering;

use crate::models::{DutyCategory, DutyRate, RateType};
use crate::services::error::LedgerError;

/// What the resolver is asked to price.
#[derive(Debug, Clone, Copy)]
pub struct DutyQuery<'a> {
    pub category: DutyCategory,
    pub subcategory: Option<&'a str>,
    pub abv: Decimal,
    pub as_of: NaiveDate,
}

/// Outcome of a resolution. `NotFound` means duty must be entered by hand.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    Matched(&'a DutyRate),
    NotFound,
}

/// Quantities a duty amount can be computed from.
#[derive(Debug, Clone, Copy, Default)]
pub struct DutyQuantities {
    pub volume_litres: Option<Decimal>,
    pub abv: Option<Decimal>,
    pub quantity_units: Option<i64>,
}

/// Decimal places kept by the stored ABV, volume and rate columns.
pub const ABV_SCALE: u32 = 2;
pub const VOLUME_SCALE: u32 = 3;
pub const RATE_AMOUNT_SCALE: u32 = 4;

/// Reject a value carrying more decimal places than its column keeps.
pub fn check_scale(field: &'static str, value: Decimal, places: u32) -> Result<(), LedgerError> {
    if value.normalize().scale() > places {
        return Err(LedgerError::validation(
            field,
            format!("must have at most {} decimal places", places),
        ));
    }
    Ok(())
}

/// A percentage between 0 and 100.
pub fn validate_abv(field: &'static str, abv: Decimal) -> Result<(), LedgerError> {
    if abv < Decimal::ZERO || abv > Decimal::ONE_HUNDRED {
        return Err(LedgerError::validation(field, "must be between 0 and 100"));
    }
    check_scale(field, abv, ABV_SCALE)
}

impl DutyQuantities {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if let Some(abv) = self.abv {
            validate_abv("abv", abv)?;
        }
        if let Some(volume) = self.volume_litres {
            if volume < Decimal::ZERO {
                return Err(LedgerError::validation("volume_litres", "must not be negative"));
            }
            check_scale("volume_litres", volume, VOLUME_SCALE)?;
        }
        if self.quantity_units.is_some_and(|u| u < 0) {
            return Err(LedgerError::validation("quantity_units", "must not be negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DutySuggestion {
    pub rate: DutyRate,
    pub amount: Decimal,
}

/// Round half-up (away from zero) to pence.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Ordering used when several rates match:
/// subcategory-specific first, then narrowest ABV band, then the most recent
/// `effective_from`, then lowest id.
pub fn rank_candidates(a: &DutyRate, b: &DutyRate) -> Ordering {
    b.subcategory
        .is_some()
        .cmp(&a.subcategory.is_some())
        .then_with(|| a.band_width().cmp(&b.band_width()))
        .then_with(|| b.effective_from.cmp(&a.effective_from))
        .then_with(|| a.rate_id.cmp(&b.rate_id))
}

/// Every rate applicable to the query, best first.
pub fn candidate_rates<'a>(query: &DutyQuery<'_>, rates: &'a [DutyRate]) -> Vec<&'a DutyRate> {
    let mut candidates: Vec<&DutyRate> = rates
        .iter()
        .filter(|r| r.category == query.category)
        .filter(|r| r.matches_subcategory(query.subcategory))
        .filter(|r| r.covers_abv(query.abv))
        .filter(|r| r.is_effective_on(query.as_of))
        .collect();
    candidates.sort_by(|a, b| rank_candidates(a, b));
    candidates
}

/// Select the single applicable rate.
///
/// The result does not depend on the order of `rates`.
pub fn resolve_rate<'a>(query: &DutyQuery<'_>, rates: &'a [DutyRate]) -> Resolution<'a> {
    match candidate_rates(query, rates).into_iter().next() {
        Some(rate) => Resolution::Matched(rate),
        None => Resolution::NotFound,
    }
}

/// Duty owed under `rate`, rounded to pence.
///
/// Fixed-per-unit rates default to one unit when no quantity is given.
pub fn compute_duty(rate: &DutyRate, quantities: DutyQuantities) -> Result<Decimal, LedgerError> {
    quantities.validate()?;
    let raw = match rate.rate_type {
        RateType::PerLitreOfPureAlcohol => {
            let volume = require_volume(quantities.volume_litres)?;
            let abv = quantities
                .abv
                .ok_or_else(|| LedgerError::validation("abv", "required for a per-LPA rate"))?;
            volume * (abv / Decimal::ONE_HUNDRED) * rate.rate_amount
        }
        RateType::PerHectolitreOfProduct => {
            let volume = require_volume(quantities.volume_litres)?;
            (volume / Decimal::ONE_HUNDRED) * rate.rate_amount
        }
        RateType::FixedPerUnit => {
            let units = quantities.quantity_units.unwrap_or(1);
            if units < 0 {
                return Err(LedgerError::validation(
                    "quantity_units",
                    "must not be negative",
                ));
            }
            Decimal::from(units) * rate.rate_amount
        }
    };
    Ok(round_money(raw))
}

fn require_volume(volume: Option<Decimal>) -> Result<Decimal, LedgerError> {
    let volume = volume.ok_or_else(|| {
        LedgerError::validation("volume_litres", "required for a volume-based rate")
    })?;
    if volume.is_sign_negative() {
        return Err(LedgerError::validation("volume_litres", "must not be negative"));
    }
    Ok(volume)
}

/// Resolve and compute in one step. `Ok(None)` when no rate applies.
pub fn suggest_duty(
    query: &DutyQuery<'_>,
    rates: &[DutyRate],
    quantities: DutyQuantities,
) -> Result<Option<DutySuggestion>, LedgerError> {
    validate_abv("abv", query.abv)?;
    quantities.validate()?;
    match resolve_rate(query, rates) {
        Resolution::Matched(rate) => {
            let amount = compute_duty(rate, quantities)?;
            Ok(Some(DutySuggestion {
                rate: rate.clone(),
                amount,
            }))
        }
        Resolution::NotFound => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;
    use uuid::Uuid;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn rate(
        category: DutyCategory,
        rate_type: RateType,
        amount: &str,
        band: (Option<&str>, Option<&str>),
    ) -> DutyRate {
        DutyRate {
            rate_id: Uuid::new_v4(),
            category,
            subcategory: None,
            min_abv: band.0.map(d),
            max_abv: band.1.map(d),
            rate_amount: d(amount),
            rate_type,
            effective_from: date(2023, 8, 1),
            effective_to: None,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    fn query(category: DutyCategory, abv: &str) -> DutyQuery<'static> {
        DutyQuery {
            category,
            subcategory: None,
            abv: d(abv),
            as_of: date(2026, 1, 15),
        }
    }

    #[test]
    fn test_spirits_per_lpa() {
        let r = rate(
            DutyCategory::Spirits,
            RateType::PerLitreOfPureAlcohol,
            "31.64",
            (None, None),
        );
        let duty = compute_duty(
            &r,
            DutyQuantities {
                volume_litres: Some(d("1000")),
                abv: Some(d("40")),
                quantity_units: None,
            },
        )
        .unwrap();
        assert_eq!(duty, d("12656.00"));
    }

    #[test]
    fn test_per_hectolitre() {
        let r = rate(
            DutyCategory::Beer,
            RateType::PerHectolitreOfProduct,
            "90.00",
            (None, None),
        );
        let duty = compute_duty(
            &r,
            DutyQuantities {
                volume_litres: Some(d("500")),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(duty, d("450.00"));
    }

    #[test]
    fn test_fixed_per_unit() {
        let r = rate(
            DutyCategory::ReadyToDrink,
            RateType::FixedPerUnit,
            "0.50",
            (None, None),
        );
        let duty = compute_duty(
            &r,
            DutyQuantities {
                quantity_units: Some(2000),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(duty, d("1000.00"));
    }

    #[test]
    fn test_fixed_per_unit_defaults_to_one_unit() {
        let r = rate(
            DutyCategory::ReadyToDrink,
            RateType::FixedPerUnit,
            "0.50",
            (None, None),
        );
        let duty = compute_duty(&r, DutyQuantities::default()).unwrap();
        assert_eq!(duty, d("0.50"));
    }

    #[test]
    fn test_rounding_is_half_up_and_idempotent() {
        let r = rate(
            DutyCategory::Wine,
            RateType::PerHectolitreOfProduct,
            "0.25",
            (None, None),
        );
        // 2 litres -> 0.005, rounds up to 0.01
        let quantities = DutyQuantities {
            volume_litres: Some(d("2")),
            ..Default::default()
        };
        let duty = compute_duty(&r, quantities).unwrap();
        assert_eq!(duty, d("0.01"));
        assert_eq!(round_money(duty), duty);
    }

    #[test]
    fn test_out_of_range_abv_is_rejected_before_resolution() {
        let rates = vec![rate(
            DutyCategory::Spirits,
            RateType::PerLitreOfPureAlcohol,
            "31.64",
            (None, None),
        )];
        for abv in ["-40", "100.5"] {
            let query = DutyQuery {
                category: DutyCategory::Spirits,
                subcategory: None,
                abv: d(abv),
                as_of: date(2026, 3, 1),
            };
            let quantities = DutyQuantities {
                volume_litres: Some(d("1000")),
                abv: Some(d(abv)),
                quantity_units: None,
            };
            assert!(matches!(
                suggest_duty(&query, &rates, quantities),
                Err(LedgerError::Validation { field: "abv", .. })
            ));
        }
    }

    #[test]
    fn test_quantities_finer_than_storage_are_rejected() {
        let too_fine_abv = DutyQuantities {
            abv: Some(d("40.125")),
            ..Default::default()
        };
        assert!(matches!(
            too_fine_abv.validate(),
            Err(LedgerError::Validation { field: "abv", .. })
        ));

        let too_fine_volume = DutyQuantities {
            volume_litres: Some(d("1.0005")),
            ..Default::default()
        };
        assert!(too_fine_volume.validate().is_err());

        // Trailing zeros do not count.
        let padded = DutyQuantities {
            abv: Some(d("40.500")),
            volume_litres: Some(d("70.0000")),
            quantity_units: Some(6),
        };
        assert!(padded.validate().is_ok());
    }

    #[test]
    fn test_volume_required_for_lpa() {
        let r = rate(
            DutyCategory::Spirits,
            RateType::PerLitreOfPureAlcohol,
            "31.64",
            (None, None),
        );
        let err = compute_duty(
            &r,
            DutyQuantities {
                abv: Some(d("40")),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation {
                field: "volume_litres",
                ..
            }
        ));
    }

    #[test]
    fn test_no_rates_for_category_is_not_found() {
        let rates = vec![rate(
            DutyCategory::Beer,
            RateType::PerLitreOfPureAlcohol,
            "21.01",
            (None, None),
        )];
        assert_eq!(
            resolve_rate(&query(DutyCategory::Cider, "5"), &rates),
            Resolution::NotFound
        );
        assert_eq!(
            resolve_rate(&query(DutyCategory::Cider, "5"), &[]),
            Resolution::NotFound
        );
    }

    #[test]
    fn test_abv_bounds_are_inclusive() {
        let rates = vec![rate(
            DutyCategory::Beer,
            RateType::PerLitreOfPureAlcohol,
            "21.01",
            (Some("3.5"), Some("8.4")),
        )];
        assert!(matches!(
            resolve_rate(&query(DutyCategory::Beer, "3.5"), &rates),
            Resolution::Matched(_)
        ));
        assert!(matches!(
            resolve_rate(&query(DutyCategory::Beer, "8.4"), &rates),
            Resolution::Matched(_)
        ));
        assert_eq!(
            resolve_rate(&query(DutyCategory::Beer, "8.5"), &rates),
            Resolution::NotFound
        );
    }

    #[test]
    fn test_effective_to_is_exclusive() {
        let mut r = rate(
            DutyCategory::Wine,
            RateType::PerLitreOfPureAlcohol,
            "28.74",
            (None, None),
        );
        r.effective_to = Some(date(2026, 1, 15));
        let rates = vec![r];
        assert_eq!(
            resolve_rate(&query(DutyCategory::Wine, "12"), &rates),
            Resolution::NotFound
        );
    }

    #[test]
    fn test_narrowest_band_wins_regardless_of_order() {
        let wide = rate(
            DutyCategory::Spirits,
            RateType::PerLitreOfPureAlcohol,
            "31.64",
            (Some("8.5"), None),
        );
        let narrow = rate(
            DutyCategory::Spirits,
            RateType::PerLitreOfPureAlcohol,
            "28.50",
            (Some("8.5"), Some("22")),
        );

        let forward = vec![wide.clone(), narrow.clone()];
        let backward = vec![narrow.clone(), wide.clone()];

        let q = query(DutyCategory::Spirits, "15");
        assert_eq!(resolve_rate(&q, &forward), Resolution::Matched(&forward[1]));
        assert_eq!(
            resolve_rate(&q, &backward),
            Resolution::Matched(&backward[0])
        );
    }

    #[test]
    fn test_subcategory_specific_rate_preferred() {
        let generic = rate(
            DutyCategory::Wine,
            RateType::PerLitreOfPureAlcohol,
            "28.74",
            (Some("8.5"), Some("22")),
        );
        let mut sparkling = generic.clone();
        sparkling.rate_id = Uuid::new_v4();
        sparkling.subcategory = Some("sparkling".to_string());
        sparkling.rate_amount = d("29.10");
        let rates = vec![generic, sparkling];

        let mut q = query(DutyCategory::Wine, "12");
        q.subcategory = Some("Sparkling");
        match resolve_rate(&q, &rates) {
            Resolution::Matched(r) => assert_eq!(r.rate_amount, d("29.10")),
            Resolution::NotFound => panic!("expected a match"),
        }

        q.subcategory = Some("still");
        match resolve_rate(&q, &rates) {
            Resolution::Matched(r) => assert_eq!(r.rate_amount, d("28.74")),
            Resolution::NotFound => panic!("expected a match"),
        }
    }

    #[test]
    fn test_suggest_duty_returns_none_without_rate() {
        let suggestion = suggest_duty(
            &query(DutyCategory::Cider, "4.5"),
            &[],
            DutyQuantities::default(),
        )
        .unwrap();
        assert!(suggestion.is_none());
    }
}
