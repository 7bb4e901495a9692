//! BankLedger Service
//!
//! The single entry point callers use: user, account and check CRUD, the
//! ledger operations, list queries and journal access, all over one
//! explicitly opened store.

pub mod config;
pub mod metrics;
pub mod service;
pub mod state;

pub use config::ServiceConfig;
pub use metrics::{MetricsSnapshot, ServiceMetrics};
pub use service::BankService;
pub use state::ServiceState;
