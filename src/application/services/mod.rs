pub mod drain_service;
pub mod reconcile_service;

pub use drain_service::{backoff_delay, DrainOutcome, DrainService, DrainStatus};
pub use reconcile_service::ReconcileService;
