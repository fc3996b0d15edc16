use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{MaintenanceRequest, MaintenanceWindow};
use crate::time::{normalize_at, ParseError, NOW};

/// Recurrence cadence of a maintenance window, using the remote vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceType {
    None,
    #[serde(alias = "daily")]
    Day,
    #[serde(alias = "weekly")]
    Week,
    #[serde(alias = "monthly")]
    Month,
}

impl RecurrenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote-assigned identifier of a maintenance window.
///
/// Persisted by the host as a string-encoded integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WindowId(pub u64);

impl FromStr for WindowId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(WindowId)
    }
}

impl TryFrom<String> for WindowId {
    type Error = std::num::ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WindowId> for String {
    fn from(id: WindowId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Declared state of a maintenance window, as written by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub description: String,
    /// Start of the window: RFC 3339 date-time or `"now"`.
    pub from: String,
    /// End of the window: RFC 3339 date-time or `"now"`.
    pub to: String,
    /// Bound on recurrence, same format as `from`/`to`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_type: Option<RecurrenceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_every: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub uptime_check_ids: BTreeSet<u64>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub transaction_check_ids: BTreeSet<u64>,
}

impl WindowSpec {
    pub fn new(description: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            from: from.into(),
            to: to.into(),
            recurrence_end: None,
            recurrence_type: None,
            repeat_every: None,
            uptime_check_ids: BTreeSet::new(),
            transaction_check_ids: BTreeSet::new(),
        }
    }

    pub fn with_recurrence(mut self, recurrence_type: RecurrenceType, repeat_every: u32) -> Self {
        self.recurrence_type = Some(recurrence_type);
        self.repeat_every = Some(repeat_every);
        self
    }

    pub fn with_recurrence_end(mut self, recurrence_end: impl Into<String>) -> Self {
        self.recurrence_end = Some(recurrence_end.into());
        self
    }

    pub fn with_uptime_checks(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.uptime_check_ids.extend(ids);
        self
    }

    pub fn with_transaction_checks(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.transaction_check_ids.extend(ids);
        self
    }

    /// Normalize every time field against the current wall clock.
    pub fn resolve(&self) -> Result<ResolvedWindow, ParseError> {
        self.resolve_at(Utc::now())
    }

    /// Normalize every time field, using a single `now` for all `"now"` markers.
    pub fn resolve_at(&self, now: DateTime<Utc>) -> Result<ResolvedWindow, ParseError> {
        let from = normalize_at(&self.from, now)?;
        let to = normalize_at(&self.to, now)?;
        let recurrence_end = self
            .recurrence_end
            .as_deref()
            .map(|spec| normalize_at(spec, now))
            .transpose()?;

        Ok(ResolvedWindow {
            description: self.description.clone(),
            from,
            to,
            recurrence_end,
            recurrence_type: self.recurrence_type,
            repeat_every: self.repeat_every,
            uptime_check_ids: self.uptime_check_ids.clone(),
            transaction_check_ids: self.transaction_check_ids.clone(),
        })
    }

    /// Whether `remote` still holds what this spec declares.
    ///
    /// Time fields declared as `"now"` always match, as does any recurrence
    /// field left unset (the remote fills in its own default). A time field
    /// that no longer parses never matches.
    pub fn matches_remote(&self, remote: &WindowState) -> bool {
        let now = Utc::now();
        let time_matches = |spec: &str, actual: Option<i64>| {
            spec == NOW || normalize_at(spec, now).ok() == actual
        };

        self.description == remote.description
            && time_matches(&self.from, Some(remote.from))
            && time_matches(&self.to, Some(remote.to))
            && self
                .recurrence_end
                .as_deref()
                .map_or(true, |spec| time_matches(spec, remote.recurrence_end))
            && self
                .recurrence_type
                .map_or(true, |declared| remote.recurrence_type == Some(declared))
            && self
                .repeat_every
                .map_or(true, |declared| remote.repeat_every == Some(declared))
            && self.uptime_check_ids == remote.uptime_check_ids
            && self.transaction_check_ids == remote.transaction_check_ids
    }
}

/// A [`WindowSpec`] whose times are epoch seconds, ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub description: String,
    pub from: i64,
    pub to: i64,
    pub recurrence_end: Option<i64>,
    pub recurrence_type: Option<RecurrenceType>,
    pub repeat_every: Option<u32>,
    pub uptime_check_ids: BTreeSet<u64>,
    pub transaction_check_ids: BTreeSet<u64>,
}

impl ResolvedWindow {
    pub fn into_state(self, id: WindowId) -> WindowState {
        WindowState {
            id,
            description: self.description,
            from: self.from,
            to: self.to,
            recurrence_end: self.recurrence_end,
            recurrence_type: self.recurrence_type,
            repeat_every: self.repeat_every,
            uptime_check_ids: self.uptime_check_ids,
            transaction_check_ids: self.transaction_check_ids,
        }
    }
}

impl From<&ResolvedWindow> for MaintenanceRequest {
    fn from(window: &ResolvedWindow) -> Self {
        Self {
            description: Some(window.description.clone()),
            from: Some(window.from),
            to: Some(window.to),
            effectiveto: window.recurrence_end,
            recurrencetype: window.recurrence_type,
            // Passed through as declared; the remote ignores it without a recurrence type.
            repeatevery: window.repeat_every,
            uptimeids: join_ids(&window.uptime_check_ids),
            tmsids: join_ids(&window.transaction_check_ids),
        }
    }
}

fn join_ids(ids: &BTreeSet<u64>) -> Option<String> {
    if ids.is_empty() {
        return None;
    }
    Some(
        ids.iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// Managed snapshot of a maintenance window, holding remote-normalized values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowState {
    pub id: WindowId,
    pub description: String,
    pub from: i64,
    pub to: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_end: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_type: Option<RecurrenceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_every: Option<u32>,
    #[serde(default)]
    pub uptime_check_ids: BTreeSet<u64>,
    #[serde(default)]
    pub transaction_check_ids: BTreeSet<u64>,
}

impl From<MaintenanceWindow> for WindowState {
    fn from(remote: MaintenanceWindow) -> Self {
        let checks = remote.checks.unwrap_or_default();
        Self {
            id: WindowId(remote.id),
            description: remote.description,
            from: remote.from,
            to: remote.to,
            recurrence_end: remote.effectiveto,
            recurrence_type: remote.recurrencetype,
            repeat_every: remote.repeatevery,
            uptime_check_ids: checks.uptime.into_iter().collect(),
            transaction_check_ids: checks.tms.into_iter().collect(),
        }
    }
}
