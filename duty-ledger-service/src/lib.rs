//! Duty Ledger Service - alcohol duty calculation and per-brand P&L ledger.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
