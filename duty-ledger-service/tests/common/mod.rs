//! Common test utilities for duty-ledger-service integration tests.
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use duty_ledger_service::models::{DutyCategory, DutyRate, RateInput, RateType};
use duty_ledger_service::services::{InMemoryStore, Store};
use duty_ledger_service::startup::{build_router, AppState};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::sync::{Arc, Once};
use tower::ServiceExt;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,duty_ledger_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Services wired over a fresh in-memory store with one brand.
pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub state: AppState,
    pub brand_id: Uuid,
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn add_brand(&self, name: &str) -> Uuid {
        self.store.add_brand(name)
    }
}

pub fn spawn_app() -> TestApp {
    init_tracing();

    let store = Arc::new(InMemoryStore::new());
    let brand_id = store.add_brand("Highland Spirits Co");
    let shared: Arc<dyn Store> = store.clone();

    TestApp {
        state: AppState::new(shared),
        store,
        brand_id,
    }
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).expect("valid decimal literal")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn rate_input(category: DutyCategory, rate_type: RateType, amount: &str) -> RateInput {
    RateInput {
        category,
        subcategory: None,
        min_abv: None,
        max_abv: None,
        rate_amount: dec(amount),
        rate_type,
        effective_from: date(2025, 2, 1),
        effective_to: None,
    }
}

/// Spirits at 31.64 per litre of pure alcohol, 8.5%+ ABV.
pub async fn seed_spirits_rate(app: &TestApp) -> DutyRate {
    let mut input = rate_input(
        DutyCategory::Spirits,
        RateType::PerLitreOfPureAlcohol,
        "31.64",
    );
    input.min_abv = Some(dec("8.5"));
    app.state
        .rates
        .create(&input)
        .await
        .expect("Failed to create spirits rate")
}

/// Send a request through the router and decode the JSON body (Null when empty).
pub async fn send(
    router: Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("Failed to build request");

    let response = router.oneshot(request).await.expect("Request failed");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, json)
}

/// Read a decimal that may have been serialized as a string or a number.
pub fn json_dec(value: &Value) -> Decimal {
    match value {
        Value::String(s) => dec(s),
        Value::Number(n) => dec(&n.to_string()),
        other => panic!("not a decimal: {other}"),
    }
}
