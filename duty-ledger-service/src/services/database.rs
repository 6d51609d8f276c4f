//! PostgreSQL store for duty-ledger-service.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{
    Brand, DutyCategory, DutyEntry, DutyEntryFilter, DutyRate, DutyStatus, LedgerTransaction,
    OutboundShipment, RateType, ShipmentFilter, TransactionFilter, TransactionType,
};
use crate::services::error::LedgerError;
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{BrandStore, LedgerStore, RateStore, SourceStore};

const RATE_COLUMNS: &str = "rate_id, category, subcategory, min_abv, max_abv, rate_amount, \
     rate_type, effective_from, effective_to, created_utc, updated_utc";

const ENTRY_COLUMNS: &str = "entry_id, brand_id, reference_number, entry_date, category, \
     subcategory, abv, volume_litres, quantity_units, total_duty_amount, hmrc_payment_reference, \
     status, linked_inbound_shipment_id, notes, posted, ledger_transaction_id, created_utc";

const SHIPMENT_COLUMNS: &str = "shipment_id, brand_id, shipment_reference, ship_date, \
     shipping_cost, handling_fee, packaging_cost, channel, posted, ledger_transaction_id, \
     created_utc";

const TRANSACTION_COLUMNS: &str = "transaction_id, brand_id, transaction_type, \
     transaction_date, amount, period_year, period_month, description, reference, channel, \
     created_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    #[instrument(skip(database_url), fields(service = "duty-ledger-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

fn db_error(operation: &'static str) -> impl Fn(sqlx::Error) -> LedgerError {
    move |e| LedgerError::Storage(anyhow::anyhow!("Failed to {}: {}", operation, e))
}

fn decode<T: FromStr<Err = String>>(value: &str) -> Result<T, LedgerError> {
    value
        .parse()
        .map_err(|e: String| LedgerError::Storage(anyhow::anyhow!(e)))
}

#[derive(sqlx::FromRow)]
struct BrandRow {
    brand_id: Uuid,
    name: String,
    created_utc: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct RateRow {
    rate_id: Uuid,
    category: String,
    subcategory: Option<String>,
    min_abv: Option<Decimal>,
    max_abv: Option<Decimal>,
    rate_amount: Decimal,
    rate_type: String,
    effective_from: NaiveDate,
    effective_to: Option<NaiveDate>,
    created_utc: DateTime<Utc>,
    updated_utc: DateTime<Utc>,
}

impl TryFrom<RateRow> for DutyRate {
    type Error = LedgerError;

    fn try_from(row: RateRow) -> Result<Self, Self::Error> {
        Ok(DutyRate {
            rate_id: row.rate_id,
            category: decode::<DutyCategory>(&row.category)?,
            subcategory: row.subcategory,
            min_abv: row.min_abv,
            max_abv: row.max_abv,
            rate_amount: row.rate_amount,
            rate_type: decode::<RateType>(&row.rate_type)?,
            effective_from: row.effective_from,
            effective_to: row.effective_to,
            created_utc: row.created_utc,
            updated_utc: row.updated_utc,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    entry_id: Uuid,
    brand_id: Uuid,
    reference_number: String,
    entry_date: NaiveDate,
    category: Option<String>,
    subcategory: Option<String>,
    abv: Option<Decimal>,
    volume_litres: Option<Decimal>,
    quantity_units: Option<i64>,
    total_duty_amount: Decimal,
    hmrc_payment_reference: Option<String>,
    status: String,
    linked_inbound_shipment_id: Option<Uuid>,
    notes: Option<String>,
    posted: bool,
    ledger_transaction_id: Option<Uuid>,
    created_utc: DateTime<Utc>,
}

impl TryFrom<EntryRow> for DutyEntry {
    type Error = LedgerError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(DutyEntry {
            entry_id: row.entry_id,
            brand_id: row.brand_id,
            reference_number: row.reference_number,
            entry_date: row.entry_date,
            category: row
                .category
                .as_deref()
                .map(decode::<DutyCategory>)
                .transpose()?,
            subcategory: row.subcategory,
            abv: row.abv,
            volume_litres: row.volume_litres,
            quantity_units: row.quantity_units,
            total_duty_amount: row.total_duty_amount,
            hmrc_payment_reference: row.hmrc_payment_reference,
            status: decode::<DutyStatus>(&row.status)?,
            linked_inbound_shipment_id: row.linked_inbound_shipment_id,
            notes: row.notes,
            posted: row.posted,
            ledger_transaction_id: row.ledger_transaction_id,
            created_utc: row.created_utc,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ShipmentRow {
    shipment_id: Uuid,
    brand_id: Uuid,
    shipment_reference: String,
    ship_date: NaiveDate,
    shipping_cost: Decimal,
    handling_fee: Decimal,
    packaging_cost: Decimal,
    channel: Option<String>,
    posted: bool,
    ledger_transaction_id: Option<Uuid>,
    created_utc: DateTime<Utc>,
}

impl From<ShipmentRow> for OutboundShipment {
    fn from(row: ShipmentRow) -> Self {
        OutboundShipment {
            shipment_id: row.shipment_id,
            brand_id: row.brand_id,
            shipment_reference: row.shipment_reference,
            ship_date: row.ship_date,
            shipping_cost: row.shipping_cost,
            handling_fee: row.handling_fee,
            packaging_cost: row.packaging_cost,
            channel: row.channel,
            posted: row.posted,
            ledger_transaction_id: row.ledger_transaction_id,
            created_utc: row.created_utc,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    transaction_id: Uuid,
    brand_id: Uuid,
    transaction_type: String,
    transaction_date: NaiveDate,
    amount: Decimal,
    period_year: i32,
    period_month: i32,
    description: String,
    reference: Option<String>,
    channel: Option<String>,
    created_utc: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for LedgerTransaction {
    type Error = LedgerError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(LedgerTransaction {
            transaction_id: row.transaction_id,
            brand_id: row.brand_id,
            transaction_type: decode::<TransactionType>(&row.transaction_type)?,
            transaction_date: row.transaction_date,
            amount: row.amount,
            period_year: row.period_year,
            period_month: row.period_month as u32,
            description: row.description,
            reference: row.reference,
            channel: row.channel,
            created_utc: row.created_utc,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, LedgerError>
where
    T: TryFrom<R, Error = LedgerError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl BrandStore for Database {
    #[instrument(skip(self), fields(brand_id = %brand_id))]
    async fn brand_exists(&self, brand_id: Uuid) -> Result<bool, LedgerError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM brands WHERE brand_id = $1)")
            .bind(brand_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("check brand"))
    }

    #[instrument(skip(self))]
    async fn list_brands(&self) -> Result<Vec<Brand>, LedgerError> {
        let rows = sqlx::query_as::<_, BrandRow>(
            "SELECT brand_id, name, created_utc FROM brands ORDER BY name, brand_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list brands"))?;

        Ok(rows
            .into_iter()
            .map(|r| Brand {
                brand_id: r.brand_id,
                name: r.name,
                created_utc: r.created_utc,
            })
            .collect())
    }
}

#[async_trait]
impl RateStore for Database {
    #[instrument(skip(self))]
    async fn load_rates(
        &self,
        category: Option<DutyCategory>,
    ) -> Result<Vec<DutyRate>, LedgerError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["load_rates"])
            .start_timer();

        let rows = sqlx::query_as::<_, RateRow>(&format!(
            r#"
            SELECT {RATE_COLUMNS}
            FROM duty_rates
            WHERE ($1::varchar IS NULL OR category = $1)
            ORDER BY category, effective_from DESC, rate_id
            "#
        ))
        .bind(category.map(|c| c.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("load rates"))?;

        timer.observe_duration();
        convert_all(rows)
    }

    #[instrument(skip(self), fields(rate_id = %rate_id))]
    async fn get_rate(&self, rate_id: Uuid) -> Result<Option<DutyRate>, LedgerError> {
        sqlx::query_as::<_, RateRow>(&format!(
            "SELECT {RATE_COLUMNS} FROM duty_rates WHERE rate_id = $1"
        ))
        .bind(rate_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get rate"))?
        .map(DutyRate::try_from)
        .transpose()
    }

    #[instrument(skip(self, rate), fields(rate_id = %rate.rate_id))]
    async fn insert_rate(&self, rate: &DutyRate) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO duty_rates (rate_id, category, subcategory, min_abv, max_abv, rate_amount,
                                    rate_type, effective_from, effective_to, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(rate.rate_id)
        .bind(rate.category.as_str())
        .bind(&rate.subcategory)
        .bind(rate.min_abv)
        .bind(rate.max_abv)
        .bind(rate.rate_amount)
        .bind(rate.rate_type.as_str())
        .bind(rate.effective_from)
        .bind(rate.effective_to)
        .bind(rate.created_utc)
        .bind(rate.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(db_error("insert rate"))?;
        Ok(())
    }

    #[instrument(skip(self, rate), fields(rate_id = %rate.rate_id))]
    async fn replace_rate(&self, rate: &DutyRate) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE duty_rates
            SET category = $2, subcategory = $3, min_abv = $4, max_abv = $5, rate_amount = $6,
                rate_type = $7, effective_from = $8, effective_to = $9, updated_utc = $10
            WHERE rate_id = $1
            "#,
        )
        .bind(rate.rate_id)
        .bind(rate.category.as_str())
        .bind(&rate.subcategory)
        .bind(rate.min_abv)
        .bind(rate.max_abv)
        .bind(rate.rate_amount)
        .bind(rate.rate_type.as_str())
        .bind(rate.effective_from)
        .bind(rate.effective_to)
        .bind(rate.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(db_error("update rate"))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(rate_id = %rate_id))]
    async fn delete_rate(&self, rate_id: Uuid) -> Result<bool, LedgerError> {
        let result = sqlx::query("DELETE FROM duty_rates WHERE rate_id = $1")
            .bind(rate_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete rate"))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SourceStore for Database {
    #[instrument(skip(self, entry), fields(entry_id = %entry.entry_id, brand_id = %entry.brand_id))]
    async fn insert_duty_entry(&self, entry: &DutyEntry) -> Result<(), LedgerError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_duty_entry"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO duty_entries (entry_id, brand_id, reference_number, entry_date, category,
                                      subcategory, abv, volume_litres, quantity_units,
                                      total_duty_amount, hmrc_payment_reference, status,
                                      linked_inbound_shipment_id, notes, posted,
                                      ledger_transaction_id, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(entry.entry_id)
        .bind(entry.brand_id)
        .bind(&entry.reference_number)
        .bind(entry.entry_date)
        .bind(entry.category.map(|c| c.as_str()))
        .bind(&entry.subcategory)
        .bind(entry.abv)
        .bind(entry.volume_litres)
        .bind(entry.quantity_units)
        .bind(entry.total_duty_amount)
        .bind(&entry.hmrc_payment_reference)
        .bind(entry.status.as_str())
        .bind(entry.linked_inbound_shipment_id)
        .bind(&entry.notes)
        .bind(entry.posted)
        .bind(entry.ledger_transaction_id)
        .bind(entry.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                LedgerError::Conflict(format!(
                    "reference number {} already exists",
                    entry.reference_number
                ))
            }
            _ => db_error("insert duty entry")(e),
        })?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self), fields(entry_id = %entry_id))]
    async fn get_duty_entry(&self, entry_id: Uuid) -> Result<Option<DutyEntry>, LedgerError> {
        sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM duty_entries WHERE entry_id = $1"
        ))
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get duty entry"))?
        .map(DutyEntry::try_from)
        .transpose()
    }

    #[instrument(skip(self, filter))]
    async fn list_duty_entries(
        &self,
        filter: &DutyEntryFilter,
    ) -> Result<Vec<DutyEntry>, LedgerError> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM duty_entries
            WHERE ($1::uuid IS NULL OR brand_id = $1)
              AND ($2::date IS NULL OR entry_date >= $2)
              AND ($3::date IS NULL OR entry_date <= $3)
              AND ($4::varchar IS NULL OR status = $4)
            ORDER BY entry_date DESC, created_utc DESC
            "#
        ))
        .bind(filter.brand_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list duty entries"))?;

        convert_all(rows)
    }

    async fn count_duty_entries_on(&self, entry_date: NaiveDate) -> Result<u32, LedgerError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM duty_entries WHERE entry_date = $1")
                .bind(entry_date)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("count duty entries"))?;
        Ok(count as u32)
    }

    #[instrument(skip(self), fields(entry_id = %entry_id, status = %status))]
    async fn update_duty_entry_status(
        &self,
        entry_id: Uuid,
        status: DutyStatus,
    ) -> Result<Option<DutyEntry>, LedgerError> {
        sqlx::query_as::<_, EntryRow>(&format!(
            "UPDATE duty_entries SET status = $2 WHERE entry_id = $1 RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(entry_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update duty entry status"))?
        .map(DutyEntry::try_from)
        .transpose()
    }

    #[instrument(skip(self), fields(entry_id = %entry_id))]
    async fn mark_duty_entry_posted(
        &self,
        entry_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE duty_entries SET posted = TRUE, ledger_transaction_id = $2 WHERE entry_id = $1",
        )
        .bind(entry_id)
        .bind(transaction_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("mark duty entry posted"))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(format!("Duty entry {}", entry_id)));
        }
        Ok(())
    }

    async fn list_unposted_duty_entries(
        &self,
        brand_id: Option<Uuid>,
    ) -> Result<Vec<DutyEntry>, LedgerError> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM duty_entries
            WHERE NOT posted AND ($1::uuid IS NULL OR brand_id = $1)
            ORDER BY entry_date, created_utc
            "#
        ))
        .bind(brand_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list unposted duty entries"))?;

        convert_all(rows)
    }

    #[instrument(skip(self, shipment), fields(shipment_id = %shipment.shipment_id))]
    async fn insert_outbound_shipment(
        &self,
        shipment: &OutboundShipment,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO outbound_shipments (shipment_id, brand_id, shipment_reference, ship_date,
                                            shipping_cost, handling_fee, packaging_cost, channel,
                                            posted, ledger_transaction_id, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(shipment.shipment_id)
        .bind(shipment.brand_id)
        .bind(&shipment.shipment_reference)
        .bind(shipment.ship_date)
        .bind(shipment.shipping_cost)
        .bind(shipment.handling_fee)
        .bind(shipment.packaging_cost)
        .bind(&shipment.channel)
        .bind(shipment.posted)
        .bind(shipment.ledger_transaction_id)
        .bind(shipment.created_utc)
        .execute(&self.pool)
        .await
        .map_err(db_error("insert outbound shipment"))?;
        Ok(())
    }

    #[instrument(skip(self, filter))]
    async fn list_outbound_shipments(
        &self,
        filter: &ShipmentFilter,
    ) -> Result<Vec<OutboundShipment>, LedgerError> {
        let rows = sqlx::query_as::<_, ShipmentRow>(&format!(
            r#"
            SELECT {SHIPMENT_COLUMNS}
            FROM outbound_shipments
            WHERE ($1::uuid IS NULL OR brand_id = $1)
              AND ($2::date IS NULL OR ship_date >= $2)
              AND ($3::date IS NULL OR ship_date <= $3)
            ORDER BY ship_date DESC, created_utc DESC
            "#
        ))
        .bind(filter.brand_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list outbound shipments"))?;

        Ok(rows.into_iter().map(OutboundShipment::from).collect())
    }

    #[instrument(skip(self), fields(shipment_id = %shipment_id))]
    async fn mark_shipment_posted(
        &self,
        shipment_id: Uuid,
        transaction_id: Option<Uuid>,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE outbound_shipments SET posted = TRUE, ledger_transaction_id = $2 \
             WHERE shipment_id = $1",
        )
        .bind(shipment_id)
        .bind(transaction_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("mark shipment posted"))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(format!(
                "Outbound shipment {}",
                shipment_id
            )));
        }
        Ok(())
    }

    async fn list_unposted_shipments(
        &self,
        brand_id: Option<Uuid>,
    ) -> Result<Vec<OutboundShipment>, LedgerError> {
        let rows = sqlx::query_as::<_, ShipmentRow>(&format!(
            r#"
            SELECT {SHIPMENT_COLUMNS}
            FROM outbound_shipments
            WHERE NOT posted AND ($1::uuid IS NULL OR brand_id = $1)
            ORDER BY ship_date, created_utc
            "#
        ))
        .bind(brand_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list unposted shipments"))?;

        Ok(rows.into_iter().map(OutboundShipment::from).collect())
    }
}

#[async_trait]
impl LedgerStore for Database {
    #[instrument(skip(self, txn), fields(transaction_id = %txn.transaction_id))]
    async fn append_transaction(&self, txn: &LedgerTransaction) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO brand_transactions (transaction_id, brand_id, transaction_type,
                                            transaction_date, amount, period_year, period_month,
                                            description, reference, channel, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(txn.transaction_id)
        .bind(txn.brand_id)
        .bind(txn.transaction_type.as_str())
        .bind(txn.transaction_date)
        .bind(txn.amount)
        .bind(txn.period_year)
        .bind(txn.period_month as i32)
        .bind(&txn.description)
        .bind(&txn.reference)
        .bind(&txn.channel)
        .bind(txn.created_utc)
        .execute(&self.pool)
        .await
        .map_err(db_error("append transaction"))?;
        Ok(())
    }

    #[instrument(skip(self, filter), fields(brand_id = %filter.brand_id))]
    async fn query_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["query_transactions"])
            .start_timer();

        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM brand_transactions
            WHERE brand_id = $1
              AND ($2::int IS NULL OR period_year = $2)
              AND ($3::int IS NULL OR period_month = $3)
              AND ($4::varchar IS NULL OR transaction_type = $4)
              AND ($5::date IS NULL OR transaction_date >= $5)
              AND ($6::date IS NULL OR transaction_date <= $6)
            ORDER BY transaction_date, created_utc
            "#
        ))
        .bind(filter.brand_id)
        .bind(filter.period_year)
        .bind(filter.period_month.map(|m| m as i32))
        .bind(filter.transaction_type.map(|t| t.as_str()))
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("query transactions"))?;

        timer.observe_duration();
        convert_all(rows)
    }

    #[instrument(skip(self), fields(brand_id = %brand_id))]
    async fn find_transaction_by_reference(
        &self,
        brand_id: Uuid,
        reference: &str,
    ) -> Result<Option<LedgerTransaction>, LedgerError> {
        sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM brand_transactions
            WHERE brand_id = $1 AND reference = $2
            ORDER BY created_utc
            LIMIT 1
            "#
        ))
        .bind(brand_id)
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find transaction by reference"))?
        .map(LedgerTransaction::try_from)
        .transpose()
    }
}
