//! Declarative plan/apply over a set of named maintenance windows.
//!
//! The [`StateFile`] remembers, per window name, the remote id, the spec that
//! was last applied, and the remote snapshot. Planning compares declared specs
//! with the last applied ones and with the refreshed remote snapshot; applying
//! drives the [`Reconciler`] and records each success in the state before
//! moving on.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::reconcile::{ReconcileError, Reconciler};
use crate::window::{WindowId, WindowSpec, WindowState};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse state file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub id: WindowId,
    pub applied: WindowSpec,
    pub remote: WindowState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub windows: BTreeMap<String, StateEntry>,
}

impl StateFile {
    /// Load from `path`. A missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(StateError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&content).map_err(|source| StateError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let content = serde_json::to_string_pretty(self).map_err(|source| StateError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, content)
            .and_then(|()| std::fs::rename(&tmp, path))
            .map_err(|source| StateError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create { name: String },
    Update { name: String, id: WindowId },
    Delete { name: String, id: WindowId },
    Unchanged { name: String },
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Self::Create { name }
            | Self::Update { name, .. }
            | Self::Delete { name, .. }
            | Self::Unchanged { name } => name,
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { name } => write!(f, "+ {}", name),
            Self::Update { name, id } => write!(f, "~ {} (id {})", name, id),
            Self::Delete { name, id } => write!(f, "- {} (id {})", name, id),
            Self::Unchanged { name } => write!(f, "  {}", name),
        }
    }
}

/// Compute the actions converging `state` onto `declared`.
///
/// A window is updated when its declaration changed since the last apply or
/// when the remote snapshot (as of the last refresh) drifted from it.
/// Declared windows come first in name order, followed by deletions.
pub fn plan(declared: &BTreeMap<String, WindowSpec>, state: &StateFile) -> Vec<Action> {
    let mut actions = Vec::with_capacity(declared.len());

    for (name, spec) in declared {
        let action = match state.windows.get(name) {
            None => Action::Create { name: name.clone() },
            Some(entry) if entry.applied == *spec && spec.matches_remote(&entry.remote) => {
                Action::Unchanged { name: name.clone() }
            }
            Some(entry) => Action::Update {
                name: name.clone(),
                id: entry.id,
            },
        };
        actions.push(action);
    }

    for (name, entry) in &state.windows {
        if !declared.contains_key(name) {
            actions.push(Action::Delete {
                name: name.clone(),
                id: entry.id,
            });
        }
    }

    actions
}

#[derive(Debug, Error)]
#[error("{name}: {source}")]
pub struct ApplyError {
    pub name: String,
    #[source]
    pub source: ReconcileError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

impl Reconciler {
    /// Read every entry in `state`, replacing its remote snapshot.
    ///
    /// Entries whose window vanished remotely are dropped and their names
    /// returned, so the next plan recreates them.
    pub async fn refresh(&self, state: &mut StateFile) -> Result<Vec<String>, ApplyError> {
        let mut dropped = Vec::new();

        for (name, entry) in state.windows.iter_mut() {
            let id = entry.id.to_string();
            match self.read(Some(&id)).await {
                Ok(Some(remote)) => entry.remote = remote,
                Ok(None) => dropped.push(name.clone()),
                Err(source) => {
                    return Err(ApplyError {
                        name: name.clone(),
                        source,
                    })
                }
            }
        }

        for name in &dropped {
            warn!(name = %name, "Maintenance window gone remotely, removed from state");
            state.windows.remove(name);
        }

        Ok(dropped)
    }

    /// Execute `plan(declared, state)`, recording each success in `state`.
    ///
    /// Stops at the first failure; work completed before it stays recorded.
    pub async fn apply(
        &self,
        declared: &BTreeMap<String, WindowSpec>,
        state: &mut StateFile,
    ) -> Result<ApplyReport, ApplyError> {
        let mut report = ApplyReport::default();

        for action in plan(declared, state) {
            let name = action.name().to_string();
            let wrap = |source| ApplyError {
                name: name.clone(),
                source,
            };

            match action {
                Action::Unchanged { .. } => report.unchanged += 1,
                Action::Create { .. } => {
                    let spec = &declared[&name];
                    let remote = self.create(spec).await.map_err(wrap)?;
                    state.windows.insert(
                        name.clone(),
                        StateEntry {
                            id: remote.id,
                            applied: spec.clone(),
                            remote,
                        },
                    );
                    report.created += 1;
                }
                Action::Update { id, .. } => {
                    let spec = &declared[&name];
                    let remote = self
                        .update(Some(&id.to_string()), spec)
                        .await
                        .map_err(wrap)?;
                    state.windows.insert(
                        name.clone(),
                        StateEntry {
                            id,
                            applied: spec.clone(),
                            remote,
                        },
                    );
                    report.updated += 1;
                }
                Action::Delete { id, .. } => {
                    self.delete(Some(&id.to_string())).await.map_err(wrap)?;
                    state.windows.remove(&name);
                    report.deleted += 1;
                }
            }
        }

        info!(
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            unchanged = report.unchanged,
            "Apply complete"
        );
        Ok(report)
    }

    /// Soft-delete one named window and forget it. Returns `false` if `name`
    /// is not in the state.
    pub async fn destroy(&self, name: &str, state: &mut StateFile) -> Result<bool, ApplyError> {
        let Some(entry) = state.windows.get(name) else {
            return Ok(false);
        };
        self.delete(Some(&entry.id.to_string()))
            .await
            .map_err(|source| ApplyError {
                name: name.to_string(),
                source,
            })?;
        state.windows.remove(name);
        Ok(true)
    }
}
