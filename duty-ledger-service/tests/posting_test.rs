//! Posting duty entries and shipments to the ledger, and the reconciliation sweep.

mod common;

use common::{date, dec, seed_spirits_rate, spawn_app, TestApp};
use duty_ledger_service::models::{
    CreateDutyEntry, CreateOutboundShipment, DutyCategory, DutyEntryFilter, DutyStatus,
    NewTransaction, TransactionFilter, TransactionType,
};
use duty_ledger_service::services::{LedgerError, ReconciliationReport};
use uuid::Uuid;

fn spirits_entry(app: &TestApp, amount: Option<&str>) -> CreateDutyEntry {
    CreateDutyEntry {
        brand_id: app.brand_id,
        entry_date: date(2026, 3, 10),
        category: Some(DutyCategory::Spirits),
        abv: Some(dec("40")),
        volume_litres: Some(dec("1000")),
        total_duty_amount: amount.map(dec),
        hmrc_payment_reference: Some("XMDT00012345".to_string()),
        ..Default::default()
    }
}

fn shipment(app: &TestApp, reference: &str, costs: [&str; 3]) -> CreateOutboundShipment {
    CreateOutboundShipment {
        brand_id: app.brand_id,
        shipment_reference: reference.to_string(),
        ship_date: date(2026, 3, 12),
        shipping_cost: dec(costs[0]),
        handling_fee: dec(costs[1]),
        packaging_cost: dec(costs[2]),
        channel: Some("shopify".to_string()),
    }
}

async fn brand_transactions(app: &TestApp) -> Vec<duty_ledger_service::models::LedgerTransaction> {
    app.state
        .ledger
        .list(&TransactionFilter::for_brand(app.brand_id))
        .await
        .unwrap()
}

#[tokio::test]
async fn duty_entry_posts_one_duty_debit() {
    let app = spawn_app();

    let posted = app
        .state
        .posting
        .create_duty_entry(spirits_entry(&app, Some("12656.00")))
        .await
        .unwrap();

    assert!(posted.warning.is_none());
    assert!(posted.record.posted);
    assert_eq!(posted.record.status, DutyStatus::Pending);

    let txns = brand_transactions(&app).await;
    assert_eq!(txns.len(), 1);
    let txn = &txns[0];
    assert_eq!(txn.transaction_type, TransactionType::Duty);
    assert_eq!(txn.amount, dec("-12656.00"));
    assert_eq!(txn.reference.as_deref(), Some(posted.record.ledger_reference().as_str()));
    assert_eq!(posted.record.ledger_transaction_id, Some(txn.transaction_id));
}

#[tokio::test]
async fn omitted_amount_is_filled_from_rate_table() {
    let app = spawn_app();
    seed_spirits_rate(&app).await;

    let posted = app
        .state
        .posting
        .create_duty_entry(spirits_entry(&app, None))
        .await
        .unwrap();

    assert_eq!(posted.record.total_duty_amount, dec("12656.00"));
    assert_eq!(posted.transaction.unwrap().amount, dec("-12656.00"));
}

#[tokio::test]
async fn omitted_amount_without_rate_requires_manual_entry() {
    let app = spawn_app();

    let err = app
        .state
        .posting
        .create_duty_entry(spirits_entry(&app, None))
        .await
        .unwrap_err();

    match err {
        LedgerError::Validation { field, message } => {
            assert_eq!(field, "total_duty_amount");
            assert!(message.contains("entered manually"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(app.store.transaction_count(), 0);
}

#[tokio::test]
async fn invalid_duty_inputs_are_rejected() {
    let app = spawn_app();

    let mut bad_abv = spirits_entry(&app, Some("1.00"));
    bad_abv.abv = Some(dec("101"));
    assert!(app.state.posting.create_duty_entry(bad_abv).await.is_err());

    let mut unknown = spirits_entry(&app, Some("1.00"));
    unknown.brand_id = Uuid::new_v4();
    let err = app.state.posting.create_duty_entry(unknown).await.unwrap_err();
    assert!(matches!(err, LedgerError::UnknownBrand(_)));

    let entries = app
        .state
        .posting
        .list_duty_entries(&DutyEntryFilter::default())
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn quantities_finer_than_storage_are_rejected() {
    let app = spawn_app();

    let mut fine_abv = spirits_entry(&app, Some("10.00"));
    fine_abv.abv = Some(dec("40.125"));
    let err = app.state.posting.create_duty_entry(fine_abv).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation { field: "abv", .. }));

    let mut fine_volume = spirits_entry(&app, Some("10.00"));
    fine_volume.volume_litres = Some(dec("0.7005"));
    let err = app.state.posting.create_duty_entry(fine_volume).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation { field: "volume_litres", .. }));

    assert_eq!(app.store.transaction_count(), 0);
}

#[tokio::test]
async fn linked_inbound_shipment_is_a_weak_reference() {
    let app = spawn_app();
    let unknown_shipment = Uuid::new_v4();

    let posted = app
        .state
        .posting
        .create_duty_entry(CreateDutyEntry {
            linked_inbound_shipment_id: Some(unknown_shipment),
            ..spirits_entry(&app, Some("10.00"))
        })
        .await
        .unwrap();

    assert_eq!(posted.record.linked_inbound_shipment_id, Some(unknown_shipment));
    assert!(posted.record.posted);
}

#[tokio::test]
async fn reference_numbers_are_sequential_per_day() {
    let app = spawn_app();

    let first = app
        .state
        .posting
        .create_duty_entry(spirits_entry(&app, Some("10.00")))
        .await
        .unwrap();
    let second = app
        .state
        .posting
        .create_duty_entry(spirits_entry(&app, Some("20.00")))
        .await
        .unwrap();
    let other_day = app
        .state
        .posting
        .create_duty_entry(CreateDutyEntry {
            entry_date: date(2026, 3, 11),
            ..spirits_entry(&app, Some("5.00"))
        })
        .await
        .unwrap();

    assert_eq!(first.record.reference_number, "DUTY-20260310-0001");
    assert_eq!(second.record.reference_number, "DUTY-20260310-0002");
    assert_eq!(other_day.record.reference_number, "DUTY-20260311-0001");
}

#[tokio::test]
async fn status_change_never_touches_ledger() {
    let app = spawn_app();
    let posted = app
        .state
        .posting
        .create_duty_entry(spirits_entry(&app, Some("99.99")))
        .await
        .unwrap();

    let paid = app
        .state
        .posting
        .update_duty_entry_status(posted.record.entry_id, DutyStatus::Paid)
        .await
        .unwrap();
    assert_eq!(paid.status, DutyStatus::Paid);

    // Any transition is allowed, including back to pending.
    let reverted = app
        .state
        .posting
        .update_duty_entry_status(posted.record.entry_id, DutyStatus::Pending)
        .await
        .unwrap();
    assert_eq!(reverted.status, DutyStatus::Pending);
    assert_eq!(app.store.transaction_count(), 1);

    let missing = app
        .state
        .posting
        .update_duty_entry_status(Uuid::new_v4(), DutyStatus::Paid)
        .await
        .unwrap_err();
    assert!(matches!(missing, LedgerError::NotFound(_)));
}

#[tokio::test]
async fn failed_posting_keeps_entry_and_reconcile_reposts_it() {
    let app = spawn_app();
    app.store.fail_ledger_appends(true);

    let posted = app
        .state
        .posting
        .create_duty_entry(spirits_entry(&app, Some("450.00")))
        .await
        .unwrap();

    assert!(posted.transaction.is_none());
    assert!(!posted.record.posted);
    assert!(posted.warning.as_deref().unwrap().contains("could not be posted"));
    assert_eq!(app.store.transaction_count(), 0);

    // Still failing: the sweep reports it without giving up on the entry.
    let report = app.state.posting.reconcile(None).await.unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].reference, posted.record.reference_number);

    app.store.fail_ledger_appends(false);
    let report = app.state.posting.reconcile(Some(app.brand_id)).await.unwrap();
    assert_eq!(report.reposted, 1);
    assert!(report.failed.is_empty());

    let entry = app
        .state
        .posting
        .get_duty_entry(posted.record.entry_id)
        .await
        .unwrap();
    assert!(entry.posted);
    let txns = brand_transactions(&app).await;
    assert_eq!(txns.len(), 1);
    assert_eq!(entry.ledger_transaction_id, Some(txns[0].transaction_id));
}

#[tokio::test]
async fn reconcile_relinks_existing_ledger_row() {
    let app = spawn_app();
    app.store.fail_ledger_appends(true);
    let posted = app
        .state
        .posting
        .create_duty_entry(spirits_entry(&app, Some("75.00")))
        .await
        .unwrap();
    app.store.fail_ledger_appends(false);

    // The append landed earlier but the flag never did.
    let existing = app
        .state
        .ledger
        .append(NewTransaction {
            brand_id: app.brand_id,
            transaction_type: TransactionType::Duty,
            transaction_date: posted.record.entry_date,
            magnitude: posted.record.total_duty_amount,
            description: posted.record.ledger_description(),
            reference: Some(posted.record.ledger_reference()),
            channel: None,
        })
        .await
        .unwrap();

    let report = app.state.posting.reconcile(None).await.unwrap();
    assert_eq!(
        report,
        ReconciliationReport {
            examined: 1,
            reposted: 0,
            relinked: 1,
            failed: vec![],
        }
    );
    assert_eq!(app.store.transaction_count(), 1);

    let entry = app
        .state
        .posting
        .get_duty_entry(posted.record.entry_id)
        .await
        .unwrap();
    assert_eq!(entry.ledger_transaction_id, Some(existing.transaction_id));
}

#[tokio::test]
async fn reconcile_is_idempotent() {
    let app = spawn_app();
    app.state
        .posting
        .create_duty_entry(spirits_entry(&app, Some("10.00")))
        .await
        .unwrap();
    app.state
        .posting
        .create_outbound_shipment(shipment(&app, "OUT-7", ["4.00", "1.00", "0.50"]))
        .await
        .unwrap();

    let first = app.state.posting.reconcile(None).await.unwrap();
    let second = app.state.posting.reconcile(None).await.unwrap();

    assert_eq!(first, ReconciliationReport::default());
    assert_eq!(second, ReconciliationReport::default());
    assert_eq!(app.store.transaction_count(), 2);
}

#[tokio::test]
async fn reconcile_for_unknown_brand_fails() {
    let app = spawn_app();
    let err = app.state.posting.reconcile(Some(Uuid::new_v4())).await.unwrap_err();
    assert!(matches!(err, LedgerError::UnknownBrand(_)));
}

#[tokio::test]
async fn shipment_posts_total_cost_as_fulfilment() {
    let app = spawn_app();

    let posted = app
        .state
        .posting
        .create_outbound_shipment(shipment(&app, "OUT-1001", ["12.00", "3.50", "1.25"]))
        .await
        .unwrap();

    assert!(posted.record.posted);
    let txn = posted.transaction.unwrap();
    assert_eq!(txn.transaction_type, TransactionType::Fulfilment);
    assert_eq!(txn.amount, dec("-16.75"));
    assert_eq!(txn.channel.as_deref(), Some("shopify"));
    assert_eq!(txn.reference.as_deref(), Some(posted.record.ledger_reference().as_str()));
}

#[tokio::test]
async fn zero_cost_shipment_is_settled_without_transaction() {
    let app = spawn_app();

    let posted = app
        .state
        .posting
        .create_outbound_shipment(shipment(&app, "OUT-FREE", ["0", "0", "0"]))
        .await
        .unwrap();

    assert!(posted.transaction.is_none());
    assert!(posted.warning.is_none());
    assert!(posted.record.posted);
    assert_eq!(app.store.transaction_count(), 0);

    let report = app.state.posting.reconcile(None).await.unwrap();
    assert_eq!(report.examined, 0);
}

#[tokio::test]
async fn shipment_validation_rejects_before_insert() {
    let app = spawn_app();

    let negative = app
        .state
        .posting
        .create_outbound_shipment(shipment(&app, "OUT-2", ["-1.00", "0", "0"]))
        .await
        .unwrap_err();
    assert!(matches!(negative, LedgerError::Validation { field: "shipping_cost", .. }));

    let blank = app
        .state
        .posting
        .create_outbound_shipment(shipment(&app, "   ", ["1.00", "0", "0"]))
        .await
        .unwrap_err();
    assert!(matches!(blank, LedgerError::Validation { .. }));

    let listed = app
        .state
        .posting
        .list_outbound_shipments(&Default::default())
        .await
        .unwrap();
    assert!(listed.is_empty());
}
