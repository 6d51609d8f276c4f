//! Services module for duty-ledger-service.

pub mod database;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod metrics;
pub mod pnl;
pub mod posting;
pub mod rate_table;
pub mod reconciliation;
pub mod resolver;
pub mod store;

pub use database::Database;
pub use error::LedgerError;
pub use ledger::Ledger;
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics, record_error};
pub use pnl::ReportService;
pub use posting::{Posted, PostingService};
pub use rate_table::RateTable;
pub use reconciliation::{ReconciliationFailure, ReconciliationReport};
pub use resolver::{DutyQuantities, DutySuggestion};
pub use store::Store;
