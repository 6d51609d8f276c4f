//! Outbound fulfilment shipment costs.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundShipment {
    pub shipment_id: Uuid,
    pub brand_id: Uuid,
    pub shipment_reference: String,
    pub ship_date: NaiveDate,
    pub shipping_cost: Decimal,
    pub handling_fee: Decimal,
    pub packaging_cost: Decimal,
    pub channel: Option<String>,
    pub posted: bool,
    pub ledger_transaction_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

impl OutboundShipment {
    /// Shipping + handling + packaging.
    pub fn total_cost(&self) -> Decimal {
        self.shipping_cost + self.handling_fee + self.packaging_cost
    }

    pub fn ledger_reference(&self) -> String {
        format!("outbound_shipment:{}", self.shipment_id)
    }

    pub fn ledger_description(&self) -> String {
        format!(
            "Fulfilment {} (shipping {}, handling {}, packaging {})",
            self.shipment_reference, self.shipping_cost, self.handling_fee, self.packaging_cost
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOutboundShipment {
    pub brand_id: Uuid,
    pub shipment_reference: String,
    pub ship_date: NaiveDate,
    #[serde(default)]
    pub shipping_cost: Decimal,
    #[serde(default)]
    pub handling_fee: Decimal,
    #[serde(default)]
    pub packaging_cost: Decimal,
    #[serde(default)]
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ShipmentFilter {
    pub brand_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl ShipmentFilter {
    pub fn matches(&self, shipment: &OutboundShipment) -> bool {
        self.brand_id.is_none_or(|b| shipment.brand_id == b)
            && self.start_date.is_none_or(|d| shipment.ship_date >= d)
            && self.end_date.is_none_or(|d| shipment.ship_date <= d)
    }
}
