//! Dashboard data reconciliation for the AeroNyx node monitor.
//!
//! Merges the REST nodes overview and the monitoring socket's push updates
//! into one `DashboardView`:
//! - `normalize`: both node shapes into `NodeRecord`
//! - `state`: source slots and the freshness/priority policy
//! - `stats`: statistics recomputed from records
//! - `reconciler`: the actor that owns the slots and publishes views

pub mod bridge;
pub mod config;
pub mod error;
pub mod normalize;
pub mod reconciler;
pub mod source;
pub mod state;
pub mod stats;
pub mod view;

pub use bridge::spawn_ws_bridge;
pub use config::ReconcilerConfig;
pub use error::{SyncError, SyncResult};
pub use reconciler::{
    spawn_reconciler, ReconcilerHandle, ReconcilerMsg, ReconcilerTask, DASHBOARD_NAMESPACE,
};
pub use source::{RestSnapshotSource, SnapshotSource};
pub use state::{Authority, ReconcilerState, Snapshot};
pub use stats::DashboardStats;
pub use view::DashboardView;
