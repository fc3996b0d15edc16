mod http;

pub use http::HttpMaintenanceClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::window::{RecurrenceType, WindowId};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error {status} from {url}: {message}")]
    Http {
        url: String,
        status: u16,
        message: String,
    },
    #[error("Network error calling {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("Timeout calling {url}")]
    Timeout { url: String },
    #[error("Unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Body of a create or update call. Unset fields are left out of the payload,
/// so an update only touches what it carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effectiveto: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrencetype: Option<RecurrenceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeatevery: Option<u32>,
    /// Comma-separated uptime check ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptimeids: Option<String>,
    /// Comma-separated transaction check ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmsids: Option<String>,
}

impl MaintenanceRequest {
    /// Collapses a window onto an instant in the past without erasing it.
    pub fn soft_delete() -> Self {
        Self {
            to: Some(1),
            effectiveto: Some(1),
            ..Self::default()
        }
    }
}

/// Entry of the maintenance listing. Only the fields needed for existence checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceSummary {
    pub id: u64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckIds {
    #[serde(default)]
    pub uptime: Vec<u64>,
    #[serde(default)]
    pub tms: Vec<u64>,
}

/// Full remote record of a maintenance window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    pub id: u64,
    #[serde(default)]
    pub description: String,
    pub from: i64,
    pub to: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effectiveto: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrencetype: Option<RecurrenceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeatevery: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checks: Option<CheckIds>,
}

/// Remote maintenance window API.
///
/// Each method issues exactly one remote call and never retries.
/// The trait is object-safe and Send + Sync so a reconciler can hold it behind an `Arc`.
#[async_trait]
pub trait MaintenanceApi: Send + Sync {
    async fn list(&self) -> Result<Vec<MaintenanceSummary>, ApiError>;

    async fn get(&self, id: WindowId) -> Result<MaintenanceWindow, ApiError>;

    async fn create(&self, request: &MaintenanceRequest) -> Result<WindowId, ApiError>;

    async fn update(&self, id: WindowId, request: &MaintenanceRequest) -> Result<(), ApiError>;
}
