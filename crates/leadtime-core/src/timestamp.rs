// Copyright (C) 2026  Leadtime Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//! Normalization of heterogeneous date strings into UTC instants

use chrono::{DateTime, Utc};

use crate::error::ResolutionError;

/// Default format for commit dates written by OpenShift builds,
/// e.g. `Mon Aug 8 13:13:58 2022 -0600`
pub const DEFAULT_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %Y %z";

/// Number of leading digits read as epoch seconds
const EPOCH_DIGITS: usize = 10;

/// Parse a raw timestamp into a UTC instant.
///
/// A value made only of ASCII digits and at least ten characters long is read
/// as Unix epoch seconds using its first ten digits, so millisecond and
/// microsecond epochs collapse to second precision. Anything else is parsed
/// with `format`, which must carry a UTC offset (`%z`).
///
/// # Known ambiguity
///
/// The digit check runs before the format. A format whose rendering is ten or
/// more bare digits (for example `%Y%m%d%H%M`) can therefore never match, and
/// an epoch before September 2001 (nine digits) is rejected.
pub fn parse_timestamp(raw: &str, format: &str) -> Result<DateTime<Utc>, ResolutionError> {
    let value = raw.trim();

    if value.len() >= EPOCH_DIGITS && value.bytes().all(|b| b.is_ascii_digit()) {
        let secs: i64 = value[..EPOCH_DIGITS]
            .parse()
            .map_err(|_| ResolutionError::malformed(raw, format))?;
        return DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| ResolutionError::malformed(raw, format));
    }

    DateTime::parse_from_str(value, format)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ResolutionError::malformed(raw, format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_epoch_seconds() {
        let ts = parse_timestamp("1663770655", DEFAULT_DATE_FORMAT).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2022, 9, 21, 14, 30, 55).unwrap());
    }

    #[test]
    fn test_epoch_millis_truncated() {
        let ts = parse_timestamp("1663770655123", DEFAULT_DATE_FORMAT).unwrap();
        assert_eq!(ts.timestamp(), 1_663_770_655);
    }

    #[test]
    fn test_formatted_date_with_offset() {
        let ts = parse_timestamp("Mon Aug 8 13:13:58 2022 -0600", DEFAULT_DATE_FORMAT).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2022, 8, 8, 19, 13, 58).unwrap());
    }

    #[test]
    fn test_surrounding_whitespace() {
        let ts = parse_timestamp("  1663770655\n", DEFAULT_DATE_FORMAT).unwrap();
        assert_eq!(ts.timestamp(), 1_663_770_655);
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = parse_timestamp("not-a-date", DEFAULT_DATE_FORMAT).unwrap_err();
        assert!(matches!(err, ResolutionError::MalformedTimestamp { .. }));
    }

    #[test]
    fn test_short_epoch_is_malformed() {
        assert!(parse_timestamp("999999999", DEFAULT_DATE_FORMAT).is_err());
    }

    #[test]
    fn test_format_without_offset_is_malformed() {
        // A naive date cannot be placed on the UTC timeline
        assert!(parse_timestamp("2022-08-08 13:13:58", "%Y-%m-%d %H:%M:%S").is_err());
    }

    #[test]
    fn test_custom_format() {
        let ts = parse_timestamp("2022-08-08T13:13:58+02:00", "%Y-%m-%dT%H:%M:%S%:z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2022, 8, 8, 11, 13, 58).unwrap());
    }

    proptest! {
        #[test]
        fn prop_trailing_digits_ignored(
            secs in 1_000_000_000i64..9_999_999_999i64,
            extra in "[0-9]{0,6}",
        ) {
            let raw = format!("{}{}", secs, extra);
            let ts = parse_timestamp(&raw, DEFAULT_DATE_FORMAT).unwrap();
            prop_assert_eq!(ts.timestamp(), secs);
        }
    }
}
