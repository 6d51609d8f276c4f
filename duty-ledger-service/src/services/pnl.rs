//! Profit-and-loss aggregation over ledger transactions.
//!
//! Aggregation always recomputes from the stored rows; there is no running
//! balance to keep in sync.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::models::{
    BrandPnlReport, BrandRollup, DutyEntry, DutyEntryFilter, DutyStatus, DutyTotals,
    LedgerTransaction, Margin, Metrics, MetricsComparison, OutboundShipment, Period,
    PeriodChange, PlatformRollup, ReportWindow, SeriesPoint, ShipmentCostTotals, ShipmentFilter,
    TransactionFilter, TransactionType,
};
use crate::services::error::LedgerError;
use crate::services::store::Store;

const SERIES_LENGTH: usize = 12;

/// Group transactions by type and net them.
pub fn aggregate<'a, I>(transactions: I) -> Metrics
where
    I: IntoIterator<Item = &'a LedgerTransaction>,
{
    let mut sums = [Decimal::ZERO; TransactionType::ALL.len()];
    let mut net = Decimal::ZERO;
    let mut count = 0;

    for txn in transactions {
        sums[type_index(txn.transaction_type)] += txn.amount;
        net += txn.amount;
        count += 1;
    }

    let bucket = |t: TransactionType| sums[type_index(t)].abs();

    let revenue = sums[type_index(TransactionType::Sale)];
    let commission = bucket(TransactionType::Commission);
    let fulfilment = bucket(TransactionType::Fulfilment);
    let duties = bucket(TransactionType::Duty);
    let promotions = bucket(TransactionType::PromotionFunding);
    let storage = bucket(TransactionType::Storage);
    let refunds = bucket(TransactionType::Refund);
    let inbound_shipping = bucket(TransactionType::InboundShipping);
    let adjustments = sums[type_index(TransactionType::Adjustment)];

    Metrics {
        revenue,
        commission,
        fulfilment,
        duties,
        promotions,
        storage,
        refunds,
        inbound_shipping,
        adjustments,
        total_costs: commission + fulfilment + duties + promotions + storage + refunds
            + inbound_shipping,
        net,
        margin: margin(net, revenue),
        transaction_count: count,
    }
}

fn type_index(t: TransactionType) -> usize {
    match t {
        TransactionType::Sale => 0,
        TransactionType::Commission => 1,
        TransactionType::Fulfilment => 2,
        TransactionType::Duty => 3,
        TransactionType::PromotionFunding => 4,
        TransactionType::Storage => 5,
        TransactionType::Refund => 6,
        TransactionType::InboundShipping => 7,
        TransactionType::Adjustment => 8,
    }
}

/// `net / revenue` to four places; undefined without revenue.
pub fn margin(net: Decimal, revenue: Decimal) -> Margin {
    if revenue > Decimal::ZERO {
        Margin::Ratio {
            value: (net / revenue).round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero),
        }
    } else {
        Margin::Undefined
    }
}

/// `(current - previous) / |previous| * 100`, or no baseline when previous is zero.
pub fn percent_change(current: Decimal, previous: Decimal) -> PeriodChange {
    if previous.is_zero() {
        return PeriodChange::NoPriorBaseline;
    }
    let value = (current - previous) / previous.abs() * Decimal::ONE_HUNDRED;
    PeriodChange::Percent {
        value: value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
    }
}

pub fn compare(current: &Metrics, previous: &Metrics) -> MetricsComparison {
    MetricsComparison {
        revenue: percent_change(current.revenue, previous.revenue),
        commission: percent_change(current.commission, previous.commission),
        fulfilment: percent_change(current.fulfilment, previous.fulfilment),
        duties: percent_change(current.duties, previous.duties),
        promotions: percent_change(current.promotions, previous.promotions),
        storage: percent_change(current.storage, previous.storage),
        refunds: percent_change(current.refunds, previous.refunds),
        total_costs: percent_change(current.total_costs, previous.total_costs),
        net: percent_change(current.net, previous.net),
    }
}

/// Aggregate the rows stamped with `period`.
pub fn aggregate_period(transactions: &[LedgerTransaction], period: Period) -> Metrics {
    aggregate(transactions.iter().filter(|t| t.period() == period))
}

/// Aggregate every row stamped with `year`, whatever the month.
pub fn aggregate_year(transactions: &[LedgerTransaction], year: i32) -> Metrics {
    aggregate(transactions.iter().filter(|t| t.period_year == year))
}

/// Twelve monthly points ending at `end`, oldest first.
pub fn monthly_series(transactions: &[LedgerTransaction], end: Period) -> Vec<SeriesPoint> {
    end.trailing(SERIES_LENGTH)
        .into_iter()
        .map(|period| {
            let metrics = aggregate_period(transactions, period);
            SeriesPoint {
                year: period.year,
                month: period.month,
                revenue: metrics.revenue,
                costs: metrics.total_costs,
                net: metrics.net,
            }
        })
        .collect()
}

pub fn shipment_totals<'a, I>(shipments: I) -> ShipmentCostTotals
where
    I: IntoIterator<Item = &'a OutboundShipment>,
{
    shipments
        .into_iter()
        .fold(ShipmentCostTotals::default(), |mut acc, s| {
            acc.shipping += s.shipping_cost;
            acc.handling += s.handling_fee;
            acc.packaging += s.packaging_cost;
            acc.total += s.total_cost();
            acc.count += 1;
            acc
        })
}

pub fn duty_totals<'a, I>(entries: I) -> DutyTotals
where
    I: IntoIterator<Item = &'a DutyEntry>,
{
    entries.into_iter().fold(DutyTotals::default(), |mut acc, e| {
        acc.total += e.total_duty_amount;
        match e.status {
            DutyStatus::Pending => acc.pending += e.total_duty_amount,
            DutyStatus::Paid => acc.paid += e.total_duty_amount,
            DutyStatus::Charged => acc.charged += e.total_duty_amount,
        }
        acc.count += 1;
        acc
    })
}

fn merge_shipment_totals(a: &mut ShipmentCostTotals, b: &ShipmentCostTotals) {
    a.shipping += b.shipping;
    a.handling += b.handling;
    a.packaging += b.packaging;
    a.total += b.total;
    a.count += b.count;
}

fn merge_duty_totals(a: &mut DutyTotals, b: &DutyTotals) {
    a.total += b.total;
    a.pending += b.pending;
    a.paid += b.paid;
    a.charged += b.charged;
    a.count += b.count;
}

fn period_bounds(period: Period) -> Result<(NaiveDate, NaiveDate), LedgerError> {
    match (period.first_day(), period.last_day()) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(LedgerError::validation("period", format!("{} is not a valid month", period))),
    }
}

impl ReportWindow {
    /// Inclusive date range the window covers.
    pub fn date_range(&self) -> Result<(NaiveDate, NaiveDate), LedgerError> {
        match *self {
            ReportWindow::Month { year, month } => {
                let period = Period::new(year, month)
                    .ok_or_else(|| LedgerError::validation("month", "must be between 1 and 12"))?;
                period_bounds(period)
            }
            ReportWindow::YearToDate { year } => {
                let start = NaiveDate::from_ymd_opt(year, 1, 1)
                    .ok_or_else(|| LedgerError::validation("year", "out of range"))?;
                let end = NaiveDate::from_ymd_opt(year, 12, 31)
                    .ok_or_else(|| LedgerError::validation("year", "out of range"))?;
                Ok((start, end))
            }
        }
    }

    /// Transaction filter selecting this window by stored period fields.
    pub fn filter_for(&self, brand_id: Uuid) -> TransactionFilter {
        let filter = TransactionFilter::for_brand(brand_id);
        match *self {
            ReportWindow::Month { year, month } => filter.in_period(Period { year, month }),
            ReportWindow::YearToDate { year } => TransactionFilter {
                period_year: Some(year),
                ..filter
            },
        }
    }
}

/// Reads the ledger and source tables to build brand and platform reports.
#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn Store>,
}

impl ReportService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Current month, prior month, month-over-month change, YTD and a
    /// 12-month series for one brand.
    #[instrument(skip(self), fields(brand_id = %brand_id, period = %period))]
    pub async fn brand_report(
        &self,
        brand_id: Uuid,
        period: Period,
    ) -> Result<BrandPnlReport, LedgerError> {
        if !self.store.brand_exists(brand_id).await? {
            return Err(LedgerError::UnknownBrand(brand_id));
        }

        let series_start = period.trailing(SERIES_LENGTH)[0];
        let year_start = Period {
            year: period.year,
            month: 1,
        };
        let year_end = Period {
            year: period.year,
            month: 12,
        };
        let (start, _) = period_bounds(series_start.min(year_start))?;
        let (_, end) = period_bounds(year_end)?;

        // Period fields are authoritative for grouping; the date range only
        // narrows the read.
        let transactions = self
            .store
            .query_transactions(&TransactionFilter::for_brand(brand_id).between(start, end))
            .await?;

        let current_month = aggregate_period(&transactions, period);
        let previous_month = aggregate_period(&transactions, period.previous());
        let month_over_month = compare(&current_month, &previous_month);
        let year_to_date = aggregate_year(&transactions, period.year);

        Ok(BrandPnlReport {
            brand_id,
            period,
            month_over_month,
            monthly_series: monthly_series(&transactions, period),
            current_month,
            previous_month,
            year_to_date,
        })
    }

    /// Per-brand metrics plus cost breakdowns read from the source tables.
    #[instrument(skip(self))]
    pub async fn platform_rollup(&self, window: ReportWindow) -> Result<PlatformRollup, LedgerError> {
        let (start, end) = window.date_range()?;
        let brands = self.store.list_brands().await?;

        let mut all_transactions = Vec::new();
        let mut rollups = Vec::with_capacity(brands.len());
        let mut shipment_costs = ShipmentCostTotals::default();
        let mut duty_sum = DutyTotals::default();

        for brand in brands {
            let transactions = self
                .store
                .query_transactions(&window.filter_for(brand.brand_id))
                .await?;
            let shipments = self
                .store
                .list_outbound_shipments(&ShipmentFilter {
                    brand_id: Some(brand.brand_id),
                    start_date: Some(start),
                    end_date: Some(end),
                })
                .await?;
            let entries = self
                .store
                .list_duty_entries(&DutyEntryFilter {
                    brand_id: Some(brand.brand_id),
                    start_date: Some(start),
                    end_date: Some(end),
                    status: None,
                })
                .await?;

            let brand_shipments = shipment_totals(&shipments);
            let brand_duties = duty_totals(&entries);
            merge_shipment_totals(&mut shipment_costs, &brand_shipments);
            merge_duty_totals(&mut duty_sum, &brand_duties);

            rollups.push(BrandRollup {
                brand_id: brand.brand_id,
                brand_name: brand.name,
                metrics: aggregate(&transactions),
                shipment_costs: brand_shipments,
                duty_totals: brand_duties,
            });
            all_transactions.extend(transactions);
        }

        Ok(PlatformRollup {
            window,
            totals: aggregate(&all_transactions),
            brands: rollups,
            shipment_costs,
            duty_totals: duty_sum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn txn(t: TransactionType, magnitude: &str, year: i32, month: u32) -> LedgerTransaction {
        LedgerTransaction {
            transaction_id: Uuid::new_v4(),
            brand_id: Uuid::nil(),
            transaction_type: t,
            transaction_date: NaiveDate::from_ymd_opt(year, month, 10).unwrap(),
            amount: t.signed(d(magnitude)),
            period_year: year,
            period_month: month,
            description: "test".to_string(),
            reference: None,
            channel: None,
            created_utc: Utc::now(),
        }
    }

    #[test]
    fn test_aggregate_buckets_and_net() {
        let rows = vec![
            txn(TransactionType::Sale, "1000.00", 2026, 1),
            txn(TransactionType::Commission, "150.00", 2026, 1),
            txn(TransactionType::Fulfilment, "80.00", 2026, 1),
            txn(TransactionType::Duty, "120.00", 2026, 1),
            txn(TransactionType::Refund, "50.00", 2026, 1),
            txn(TransactionType::Adjustment, "10.00", 2026, 1),
        ];
        let m = aggregate(&rows);
        assert_eq!(m.revenue, d("1000.00"));
        assert_eq!(m.commission, d("150.00"));
        assert_eq!(m.duties, d("120.00"));
        assert_eq!(m.adjustments, d("10.00"));
        assert_eq!(m.total_costs, d("400.00"));
        assert_eq!(m.net, d("610.00"));
        assert_eq!(m.margin, Margin::Ratio { value: d("0.61") });
        assert_eq!(m.transaction_count, 6);
    }

    #[test]
    fn test_margin_undefined_without_revenue() {
        let rows = vec![txn(TransactionType::Storage, "25.00", 2026, 1)];
        assert_eq!(aggregate(&rows).margin, Margin::Undefined);
        assert_eq!(aggregate(std::iter::empty()).margin, Margin::Undefined);
    }

    #[test]
    fn test_percent_change_zero_baseline() {
        assert_eq!(
            percent_change(d("500"), Decimal::ZERO),
            PeriodChange::NoPriorBaseline
        );
    }

    #[test]
    fn test_percent_change_uses_absolute_previous() {
        assert_eq!(
            percent_change(d("150"), d("100")),
            PeriodChange::Percent { value: d("50") }
        );
        // Loss of 100 improving to profit of 50 is +150%.
        assert_eq!(
            percent_change(d("50"), d("-100")),
            PeriodChange::Percent { value: d("150") }
        );
    }

    #[test]
    fn test_year_aggregation_ignores_month() {
        let rows = vec![
            txn(TransactionType::Sale, "100.00", 2026, 1),
            txn(TransactionType::Sale, "200.00", 2026, 7),
            txn(TransactionType::Sale, "400.00", 2025, 12),
        ];
        assert_eq!(aggregate_year(&rows, 2026).revenue, d("300.00"));
    }

    #[test]
    fn test_monthly_series_has_twelve_points() {
        let rows = vec![
            txn(TransactionType::Sale, "100.00", 2025, 4),
            txn(TransactionType::Sale, "100.00", 2025, 3),
            txn(TransactionType::Storage, "30.00", 2026, 3),
        ];
        let series = monthly_series(&rows, Period::new(2026, 3).unwrap());
        assert_eq!(series.len(), 12);
        assert_eq!((series[0].year, series[0].month), (2025, 4));
        assert_eq!(series[0].revenue, d("100.00"));
        assert_eq!(series[11].costs, d("30.00"));
        assert_eq!(series[11].net, d("-30.00"));
    }

    #[test]
    fn test_report_window_ranges() {
        let (start, end) = ReportWindow::Month {
            year: 2026,
            month: 2,
        }
        .date_range()
        .unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());

        assert!(ReportWindow::Month {
            year: 2026,
            month: 13
        }
        .date_range()
        .is_err());
    }
}
