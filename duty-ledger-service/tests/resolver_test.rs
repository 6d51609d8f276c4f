//! Duty rate resolution and computation against the rate table.

mod common;

use chrono::Utc;
use common::{date, dec, rate_input, seed_spirits_rate, spawn_app};
use duty_ledger_service::models::{DutyCategory, DutyRate, RateType};
use duty_ledger_service::services::resolver::{
    rank_candidates, resolve_rate, DutyQuery, Resolution,
};
use duty_ledger_service::services::{DutyQuantities, LedgerError};
use proptest::prelude::*;
use uuid::Uuid;

#[tokio::test]
async fn spirits_lpa_duty_matches_worked_example() {
    let app = spawn_app();
    seed_spirits_rate(&app).await;

    let suggestion = app
        .state
        .rates
        .suggest(
            DutyCategory::Spirits,
            None,
            date(2026, 3, 1),
            DutyQuantities {
                volume_litres: Some(dec("1000")),
                abv: Some(dec("40")),
                quantity_units: None,
            },
        )
        .await
        .unwrap()
        .expect("rate should match");

    assert_eq!(suggestion.amount, dec("12656.00"));
}

#[tokio::test]
async fn hectolitre_and_unit_rates() {
    let app = spawn_app();
    app.state
        .rates
        .create(&rate_input(
            DutyCategory::Beer,
            RateType::PerHectolitreOfProduct,
            "90.00",
        ))
        .await
        .unwrap();
    app.state
        .rates
        .create(&rate_input(
            DutyCategory::ReadyToDrink,
            RateType::FixedPerUnit,
            "0.50",
        ))
        .await
        .unwrap();

    let beer = app
        .state
        .rates
        .suggest(
            DutyCategory::Beer,
            None,
            date(2026, 1, 10),
            DutyQuantities {
                volume_litres: Some(dec("500")),
                abv: Some(dec("4.5")),
                quantity_units: None,
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(beer.amount, dec("450.00"));

    let rtd = app
        .state
        .rates
        .suggest(
            DutyCategory::ReadyToDrink,
            None,
            date(2026, 1, 10),
            DutyQuantities {
                volume_litres: None,
                abv: Some(dec("5")),
                quantity_units: Some(2000),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rtd.amount, dec("1000.00"));
}

#[tokio::test]
async fn category_without_rates_is_not_found() {
    let app = spawn_app();
    seed_spirits_rate(&app).await;

    let resolved = app
        .state
        .rates
        .resolve(DutyCategory::Cider, None, dec("5"), date(2026, 1, 1))
        .await
        .unwrap();
    assert!(resolved.is_none());
}

#[tokio::test]
async fn rate_outside_effective_window_is_ignored() {
    let app = spawn_app();
    seed_spirits_rate(&app).await;

    let resolved = app
        .state
        .rates
        .resolve(DutyCategory::Spirits, None, dec("40"), date(2025, 1, 31))
        .await
        .unwrap();
    assert!(resolved.is_none());
}

#[tokio::test]
async fn identical_band_with_overlapping_window_is_rejected() {
    let app = spawn_app();
    seed_spirits_rate(&app).await;

    let mut clash = rate_input(
        DutyCategory::Spirits,
        RateType::PerLitreOfPureAlcohol,
        "32.00",
    );
    clash.min_abv = Some(dec("8.5"));
    clash.effective_from = date(2026, 2, 1);

    let err = app.state.rates.create(&clash).await.unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(_)));

    // A narrower band inside the existing one is rankable.
    clash.max_abv = Some(dec("22"));
    assert!(app.state.rates.create(&clash).await.is_ok());
}

#[tokio::test]
async fn narrowest_band_wins_over_wider_band() {
    let app = spawn_app();
    seed_spirits_rate(&app).await;

    let mut narrow = rate_input(DutyCategory::Spirits, RateType::PerLitreOfPureAlcohol, "20.00");
    narrow.min_abv = Some(dec("35"));
    narrow.max_abv = Some(dec("45"));
    let narrow = app.state.rates.create(&narrow).await.unwrap();

    let resolved = app
        .state
        .rates
        .resolve(DutyCategory::Spirits, None, dec("40"), date(2026, 1, 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.rate_id, narrow.rate_id);
}

#[tokio::test]
async fn updating_a_rate_keeps_its_creation_time() {
    let app = spawn_app();
    let rate = seed_spirits_rate(&app).await;

    let mut input = rate_input(DutyCategory::Spirits, RateType::PerLitreOfPureAlcohol, "33.00");
    input.min_abv = Some(dec("8.5"));
    let updated = app.state.rates.update(rate.rate_id, &input).await.unwrap();

    assert_eq!(updated.created_utc, rate.created_utc);
    assert_eq!(updated.rate_amount, dec("33.00"));

    app.state.rates.delete(rate.rate_id).await.unwrap();
    assert!(matches!(
        app.state.rates.get(rate.rate_id).await,
        Err(LedgerError::NotFound(_))
    ));
}

fn band_rate(min: Option<u32>, max: Option<u32>, from_day: u32, subcategory: bool) -> DutyRate {
    let now = Utc::now();
    DutyRate {
        rate_id: Uuid::new_v4(),
        category: DutyCategory::Wine,
        subcategory: subcategory.then(|| "still".to_string()),
        min_abv: min.map(Into::into),
        max_abv: max.map(Into::into),
        rate_amount: dec("28.74"),
        rate_type: RateType::PerLitreOfPureAlcohol,
        effective_from: date(2025, 1, from_day),
        effective_to: None,
        created_utc: now,
        updated_utc: now,
    }
}

fn rate_strategy() -> impl Strategy<Value = DutyRate> {
    (
        proptest::option::of(0u32..30),
        proptest::option::of(30u32..100),
        1u32..28,
        any::<bool>(),
    )
        .prop_map(|(min, max, day, sub)| band_rate(min, max, day, sub))
}

proptest! {
    /// Same query, same table, same answer, whatever the storage order.
    #[test]
    fn resolution_is_deterministic_and_order_independent(
        rates in proptest::collection::vec(rate_strategy(), 1..12),
        abv in 0u32..100,
        shift in 0usize..12,
    ) {
        let query = DutyQuery {
            category: DutyCategory::Wine,
            subcategory: Some("still"),
            abv: abv.into(),
            as_of: date(2026, 1, 1),
        };

        let first = match resolve_rate(&query, &rates) {
            Resolution::Matched(rate) => Some(rate.rate_id),
            Resolution::NotFound => None,
        };
        let again = match resolve_rate(&query, &rates) {
            Resolution::Matched(rate) => Some(rate.rate_id),
            Resolution::NotFound => None,
        };
        prop_assert_eq!(first, again);

        let mut rotated = rates.clone();
        rotated.rotate_left(shift % rates.len());
        let rotated_pick = match resolve_rate(&query, &rotated) {
            Resolution::Matched(rate) => Some(rate.rate_id),
            Resolution::NotFound => None,
        };
        prop_assert_eq!(first, rotated_pick);
    }

    /// The ranking is a total order: no two distinct rates compare equal.
    #[test]
    fn ranking_never_ties_distinct_rates(a in rate_strategy(), b in rate_strategy()) {
        prop_assert_ne!(rank_candidates(&a, &b), std::cmp::Ordering::Equal);
        prop_assert_eq!(rank_candidates(&a, &b), rank_candidates(&b, &a).reverse());
    }
}
