//! Maintenance window lifecycle.
//!
//! The [`Reconciler`] maps a declared [`WindowSpec`] onto one remote window.
//! Each operation normalizes times before touching the network, issues a
//! single remote call (Read issues a list then a fetch), and only returns a
//! new [`WindowState`] when the remote side accepted the change.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiError, MaintenanceApi, MaintenanceRequest};
use crate::time::ParseError;
use crate::window::{WindowId, WindowSpec, WindowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Read => write!(f, "read"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{operation} maintenance window: {source}")]
    Parse {
        operation: Operation,
        #[source]
        source: ParseError,
    },
    #[error("{operation} maintenance window: invalid resource identifier: {message}")]
    InvalidState { operation: Operation, message: String },
    #[error("{operation} maintenance window{}: {source}", id_suffix(.id))]
    Remote {
        operation: Operation,
        id: Option<WindowId>,
        #[source]
        source: ApiError,
    },
}

impl ReconcileError {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Parse { operation, .. }
            | Self::InvalidState { operation, .. }
            | Self::Remote { operation, .. } => *operation,
        }
    }
}

fn id_suffix(id: &Option<WindowId>) -> String {
    match id {
        Some(id) => format!(" {}", id),
        None => String::new(),
    }
}

pub struct Reconciler {
    api: Arc<dyn MaintenanceApi>,
}

impl Reconciler {
    pub fn new(api: Arc<dyn MaintenanceApi>) -> Self {
        Self { api }
    }

    pub async fn create(&self, spec: &WindowSpec) -> Result<WindowState, ReconcileError> {
        let operation = Operation::Create;
        let resolved = spec
            .resolve()
            .map_err(|source| ReconcileError::Parse { operation, source })?;
        let request = MaintenanceRequest::from(&resolved);
        debug!(?request, "Maintenance create configuration");

        let id = self
            .api
            .create(&request)
            .await
            .map_err(|source| ReconcileError::Remote {
                operation,
                id: None,
                source,
            })?;

        info!(%id, description = %resolved.description, "Maintenance window created");
        Ok(resolved.into_state(id))
    }

    /// Refresh the managed state from the remote record.
    ///
    /// Returns `Ok(None)` when the window no longer exists remotely; the host
    /// should drop its identifier so the next pass recreates the window.
    pub async fn read(&self, id: Option<&str>) -> Result<Option<WindowState>, ReconcileError> {
        let operation = Operation::Read;
        let id = parse_id(operation, id)?;

        if !self.exists(id).await? {
            warn!(%id, "Maintenance window missing remotely, clearing identifier");
            return Ok(None);
        }

        let remote = self
            .api
            .get(id)
            .await
            .map_err(|source| ReconcileError::Remote {
                operation,
                id: Some(id),
                source,
            })?;

        let mut state = WindowState::from(remote);
        state.id = id;
        debug!(%id, ?state, "Maintenance window read");
        Ok(Some(state))
    }

    /// Whether the listing contains `id`. The single-item fetch has no
    /// distinct not-found signal, so existence is decided here.
    pub async fn exists(&self, id: WindowId) -> Result<bool, ReconcileError> {
        let listed = self
            .api
            .list()
            .await
            .map_err(|source| ReconcileError::Remote {
                operation: Operation::Read,
                id: Some(id),
                source,
            })?;
        Ok(listed.iter().any(|summary| summary.id == id.0))
    }

    pub async fn update(&self, id: Option<&str>, spec: &WindowSpec) -> Result<WindowState, ReconcileError> {
        let operation = Operation::Update;
        let id = parse_id(operation, id)?;
        let resolved = spec
            .resolve()
            .map_err(|source| ReconcileError::Parse { operation, source })?;
        let request = MaintenanceRequest::from(&resolved);
        debug!(%id, ?request, "Maintenance update configuration");

        self.api
            .update(id, &request)
            .await
            .map_err(|source| ReconcileError::Remote {
                operation,
                id: Some(id),
                source,
            })?;

        info!(%id, "Maintenance window updated");
        Ok(resolved.into_state(id))
    }

    /// Neutralize the window by moving its end into the past. The remote
    /// record is kept.
    pub async fn delete(&self, id: Option<&str>) -> Result<(), ReconcileError> {
        let operation = Operation::Delete;
        let id = parse_id(operation, id)?;
        debug!(%id, "Maintenance delete configuration");

        self.api
            .update(id, &MaintenanceRequest::soft_delete())
            .await
            .map_err(|source| ReconcileError::Remote {
                operation,
                id: Some(id),
                source,
            })?;

        info!(%id, "Maintenance window soft-deleted");
        Ok(())
    }
}

fn parse_id(operation: Operation, id: Option<&str>) -> Result<WindowId, ReconcileError> {
    let raw = id
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| ReconcileError::InvalidState {
            operation,
            message: "identifier is not set".into(),
        })?;
    raw.parse().map_err(|e| ReconcileError::InvalidState {
        operation,
        message: format!("'{}' is not a numeric id ({})", raw, e),
    })
}
