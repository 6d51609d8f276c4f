//! Application startup and lifecycle management.

use crate::config::DutyLedgerConfig;
use crate::handlers::{
    duty, health_check, metrics_handler, rates, readiness_check, reconciliation, reports,
    shipments, transactions,
};
use crate::services::{
    init_metrics, Database, Ledger, PostingService, RateTable, ReportService, Store,
};
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub rates: RateTable,
    pub ledger: Ledger,
    pub posting: PostingService,
    pub reports: ReportService,
    /// Present when backed by PostgreSQL; probed by the health endpoints.
    pub db: Option<Arc<Database>>,
}

impl AppState {
    /// Wire every service over one store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        let rates = RateTable::new(store.clone());
        let ledger = Ledger::new(store.clone());
        let posting = PostingService::new(store.clone(), ledger.clone(), rates.clone());
        let reports = ReportService::new(store.clone());
        Self {
            store,
            rates,
            ledger,
            posting,
            reports,
            db: None,
        }
    }

    pub fn with_database(db: Arc<Database>) -> Self {
        let store: Arc<dyn Store> = db.clone();
        Self {
            db: Some(db),
            ..Self::new(store)
        }
    }

    pub async fn check_storage(&self) -> Result<(), AppError> {
        match &self.db {
            Some(db) => db.health_check().await,
            None => Ok(()),
        }
    }
}

/// The full HTTP surface over `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .route("/rates", get(rates::list_rates).post(rates::create_rate))
        .route(
            "/rates/:id",
            get(rates::get_rate)
                .put(rates::update_rate)
                .delete(rates::delete_rate),
        )
        .route("/duty/suggest", post(duty::suggest_duty))
        .route(
            "/duty-entries",
            get(duty::list_duty_entries).post(duty::create_duty_entry),
        )
        .route("/duty-entries/:id", get(duty::get_duty_entry))
        .route(
            "/duty-entries/:id/status",
            patch(duty::update_duty_entry_status),
        )
        .route(
            "/outbound-shipments",
            get(shipments::list_outbound_shipments).post(shipments::create_outbound_shipment),
        )
        .route(
            "/transactions",
            get(transactions::list_transactions).post(transactions::create_transaction),
        )
        .route(
            "/transactions/adjustments",
            post(transactions::create_adjustment),
        )
        .route("/brands/:id/pnl", get(reports::brand_pnl))
        .route("/reports/platform", get(reports::platform_report))
        .route(
            "/reconciliation/run",
            post(reconciliation::run_reconciliation),
        )
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    pub async fn build(config: DutyLedgerConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build without running migrations, for harnesses that apply them.
    pub async fn build_without_migrations(config: DutyLedgerConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(
        config: DutyLedgerConfig,
        run_migrations: bool,
    ) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        if run_migrations {
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        let state = AppState::with_database(Arc::new(db));

        if config.reconcile_on_startup {
            match state.posting.reconcile(None).await {
                Ok(report) => tracing::info!(
                    examined = report.examined,
                    reposted = report.reposted,
                    relinked = report.relinked,
                    failed = report.failed.len(),
                    "Startup reconciliation complete"
                ),
                Err(e) => tracing::error!(error = %e, "Startup reconciliation failed"),
            }
        }

        Self::bind(config.common.port, state).await
    }

    /// Serve `state` on `port` (0 picks a free port).
    pub async fn bind(port: u16, state: AppState) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Duty ledger service listener bound");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(
            service = "duty-ledger-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await
    }
}
