//! Time specification normalization.
//!
//! Every time field of a maintenance window is declared either as an RFC 3339
//! date-time (`2020-07-16T12:00:00Z`, any offset) or as the literal [`NOW`].
//! Both resolve to Unix epoch seconds, the only time representation the remote
//! API understands.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Marker resolving to the wall-clock time of the call. Matched case-sensitively.
pub const NOW: &str = "now";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid time specification '{input}': expected RFC 3339 date-time or \"now\"")]
pub struct ParseError {
    pub input: String,
}

/// Resolve a time specification against the current wall clock.
pub fn normalize(spec: &str) -> Result<i64, ParseError> {
    normalize_at(spec, Utc::now())
}

/// Resolve a time specification, using `now` for the [`NOW`] marker.
pub fn normalize_at(spec: &str, now: DateTime<Utc>) -> Result<i64, ParseError> {
    if spec == NOW {
        return Ok(now.timestamp());
    }

    DateTime::parse_from_rfc3339(spec)
        .map(|instant| instant.timestamp())
        .map_err(|_| ParseError {
            input: spec.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn utc_timestamp_resolves_to_epoch_seconds() {
        assert_eq!(normalize("2020-07-16T12:00:00Z").unwrap(), 1_594_900_800);
        assert_eq!(normalize("2020-07-16T13:00:00Z").unwrap(), 1_594_904_400);
    }

    #[test]
    fn offset_is_applied() {
        assert_eq!(
            normalize("2020-07-16T15:00:00+03:00").unwrap(),
            normalize("2020-07-16T12:00:00Z").unwrap()
        );
    }

    #[test]
    fn epoch_origin_is_zero() {
        assert_eq!(normalize("1970-01-01T00:00:00Z").unwrap(), 0);
    }

    #[test]
    fn fractional_seconds_truncate() {
        assert_eq!(normalize("2020-07-16T12:00:00.750Z").unwrap(), 1_594_900_800);
    }

    #[test]
    fn now_uses_injected_clock() {
        let clock = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        assert_eq!(normalize_at(NOW, clock).unwrap(), clock.timestamp());
    }

    #[test]
    fn now_is_close_to_wall_clock() {
        let before = Utc::now().timestamp();
        let resolved = normalize(NOW).unwrap();
        let after = Utc::now().timestamp();
        assert!(resolved >= before - 2 && resolved <= after + 2);
    }

    #[test]
    fn now_marker_is_case_sensitive() {
        assert!(normalize("NOW").is_err());
        assert!(normalize("Now").is_err());
        assert!(normalize(" now").is_err());
    }

    #[test]
    fn malformed_input_reports_offending_string() {
        for input in [
            "",
            "tomorrow",
            "2020-07-16:12:00:00",
            "16-07-2020 12:00:00",
            "2020-07-16",
            "2020-13-01T00:00:00Z",
            "1594900800",
        ] {
            let err = normalize(input).unwrap_err();
            assert_eq!(err.input, input);
        }
    }
}
