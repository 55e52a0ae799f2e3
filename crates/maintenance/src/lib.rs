//! Background upkeep of the reputation store.
//!
//! Two independent periodic tasks share the store with the request path:
//! eviction of stale records and export of aggregate metrics to a
//! Prometheus Pushgateway. See [`MaintenanceScheduler`].

pub mod exposition;
pub mod pushgateway;
pub mod scheduler;

pub use exposition::{aggregate, render, Aggregate};
pub use pushgateway::{PushError, PushgatewayExporter};
pub use scheduler::{MaintenanceHandle, MaintenanceScheduler};

#[cfg(test)]
pub(crate) mod test_support;
