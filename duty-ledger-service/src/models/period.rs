//! Calendar-month reporting periods.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A calendar month used as the ledger's reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    /// Build a period, rejecting months outside 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Period a date falls in.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn last_day(self) -> Option<NaiveDate> {
        self.next().first_day().and_then(|d| d.pred_opt())
    }

    /// The `count` periods ending at (and including) `self`, oldest first.
    pub fn trailing(self, count: usize) -> Vec<Period> {
        let mut periods = Vec::with_capacity(count);
        let mut current = self;
        for _ in 0..count {
            periods.push(current);
            current = current.previous();
        }
        periods.reverse();
        periods
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_previous_wraps_year() {
        let jan = Period::new(2026, 1).unwrap();
        assert_eq!(jan.previous(), Period::new(2025, 12).unwrap());
        assert_eq!(jan.previous().next(), jan);
    }

    #[test]
    fn test_month_bounds() {
        assert!(Period::new(2026, 0).is_none());
        assert!(Period::new(2026, 13).is_none());
    }

    #[test]
    fn test_last_day_handles_february() {
        let feb = Period::new(2028, 2).unwrap();
        assert_eq!(feb.last_day(), NaiveDate::from_ymd_opt(2028, 2, 29));
        let dec = Period::new(2026, 12).unwrap();
        assert_eq!(dec.last_day(), NaiveDate::from_ymd_opt(2026, 12, 31));
    }

    #[test]
    fn test_trailing_is_oldest_first() {
        let periods = Period::new(2026, 3).unwrap().trailing(12);
        assert_eq!(periods.len(), 12);
        assert_eq!(periods[0], Period::new(2025, 4).unwrap());
        assert_eq!(periods[11], Period::new(2026, 3).unwrap());
    }
}
