//! Duty rate table model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Excise product category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DutyCategory {
    Beer,
    Cider,
    Wine,
    Spirits,
    ReadyToDrink,
}

impl DutyCategory {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beer => "beer",
            Self::Cider => "cider",
            Self::Wine => "wine",
            Self::Spirits => "spirits",
            Self::ReadyToDrink => "ready_to_drink",
        }
    }
}

impl FromStr for DutyCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beer" => Ok(Self::Beer),
            "cider" => Ok(Self::Cider),
            "wine" => Ok(Self::Wine),
            "spirits" => Ok(Self::Spirits),
            "ready_to_drink" => Ok(Self::ReadyToDrink),
            other => Err(format!("unknown duty category '{}'", other)),
        }
    }
}

impl std::fmt::Display for DutyCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a rate's amount applies to a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateType {
    /// Currency per litre of pure alcohol.
    PerLitreOfPureAlcohol,
    /// Currency per hectolitre of finished product.
    PerHectolitreOfProduct,
    /// Currency per unit shipped.
    FixedPerUnit,
}

impl RateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerLitreOfPureAlcohol => "per_litre_of_pure_alcohol",
            Self::PerHectolitreOfProduct => "per_hectolitre_of_product",
            Self::FixedPerUnit => "fixed_per_unit",
        }
    }
}

impl FromStr for RateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per_litre_of_pure_alcohol" => Ok(Self::PerLitreOfPureAlcohol),
            "per_hectolitre_of_product" => Ok(Self::PerHectolitreOfProduct),
            "fixed_per_unit" => Ok(Self::FixedPerUnit),
            other => Err(format!("unknown rate type '{}'", other)),
        }
    }
}

impl std::fmt::Display for RateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A row of the duty rate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DutyRate {
    pub rate_id: Uuid,
    pub category: DutyCategory,
    pub subcategory: Option<String>,
    pub min_abv: Option<Decimal>,
    pub max_abv: Option<Decimal>,
    pub rate_amount: Decimal,
    pub rate_type: RateType,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl DutyRate {
    /// Inclusive ABV band check; an absent bound is open on that side.
    pub fn covers_abv(&self, abv: Decimal) -> bool {
        self.min_abv.is_none_or(|min| abv >= min) && self.max_abv.is_none_or(|max| abv <= max)
    }

    /// Half-open window `[effective_from, effective_to)`.
    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        date >= self.effective_from && self.effective_to.is_none_or(|to| date < to)
    }

    /// A generic rate (no subcategory) matches any request; a specific one
    /// only matches the same subcategory, compared case-insensitively.
    pub fn matches_subcategory(&self, requested: Option<&str>) -> bool {
        match (&self.subcategory, requested) {
            (None, _) => true,
            (Some(own), Some(req)) => own.eq_ignore_ascii_case(req.trim()),
            (Some(_), None) => false,
        }
    }

    /// Width of the ABV band with open bounds clamped to 0 and 100.
    pub fn band_width(&self) -> Decimal {
        let min = self.min_abv.unwrap_or(Decimal::ZERO);
        let max = self.max_abv.unwrap_or(Decimal::ONE_HUNDRED);
        max - min
    }

    /// Whether two effective windows share at least one day.
    pub fn window_overlaps(
        &self,
        effective_from: NaiveDate,
        effective_to: Option<NaiveDate>,
    ) -> bool {
        let starts_before_other_ends = effective_to.is_none_or(|to| self.effective_from < to);
        let other_starts_before_self_ends = self.effective_to.is_none_or(|to| effective_from < to);
        starts_before_other_ends && other_starts_before_self_ends
    }
}

/// Operator input for creating or replacing a rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateInput {
    pub category: DutyCategory,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub min_abv: Option<Decimal>,
    #[serde(default)]
    pub max_abv: Option<Decimal>,
    pub rate_amount: Decimal,
    pub rate_type: RateType,
    pub effective_from: NaiveDate,
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,
}
