#![forbid(unsafe_code)]

pub mod api;
pub mod apply;
pub mod config;
pub mod reconcile;
pub mod time;
pub mod window;

pub use api::{
    ApiError, CheckIds, HttpMaintenanceClient, MaintenanceApi, MaintenanceRequest,
    MaintenanceSummary, MaintenanceWindow,
};
pub use apply::{plan, Action, ApplyError, ApplyReport, StateEntry, StateError, StateFile};
pub use config::{resolve_token, ClientConfig, ConfigError, TOKEN_ENV_VAR};
pub use reconcile::{Operation, ReconcileError, Reconciler};
pub use time::{normalize, normalize_at, ParseError, NOW};
pub use window::{RecurrenceType, ResolvedWindow, WindowId, WindowSpec, WindowState};
