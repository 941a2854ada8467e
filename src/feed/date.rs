//! Best-effort normalization of feed publish dates.
//!
//! Feeds rarely follow RFC 822 to the letter, so a date is tried against an
//! ordered list of layouts and the first one that parses wins. Every result
//! is converted to a UTC instant.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

/// Why a single layout rejected its input
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("{0}")]
    Chrono(#[from] chrono::ParseError),
    #[error("missing weekday prefix")]
    MissingWeekday,
    #[error("missing time zone")]
    MissingZone,
    #[error("unknown time zone {0:?}")]
    UnknownZone(String),
    #[error("local time does not exist in zone")]
    InvalidLocalTime,
}

/// No known layout matched the date string
#[derive(Debug, Clone, PartialEq, Error)]
#[error("could not parse date {input:?}: {source}")]
pub struct DateParseError {
    pub input: String,
    /// The error from the last layout tried
    #[source]
    pub source: LayoutError,
}

/// A supported publish-date layout, written as an example of the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLayout {
    /// `Mon, 02 Jan 2006 15:04:05 -0700`
    Rfc1123Z,
    /// `Mon, 02 Jan 2006 15:04:05 MST`
    Rfc1123,
    /// `2006-01-02T15:04:05+07:00`
    Rfc3339,
    /// `02 Jan 06 15:04 MST`
    Rfc822,
    /// `02 Jan 06 15:04 -0700`
    Rfc822Z,
    /// `2006-01-02T15:04:05Z`
    IsoUtc,
    /// `2006-01-02T15:04:05-07:00`
    IsoOffset,
    /// `2006-01-02 15:04:05`, assumed UTC
    DateTimeUtc,
    /// `Mon, 2 Jan 2006 15:04:05 MST`
    Rfc1123ShortDay,
    /// `2 Jan 2006 15:04:05 -0700`
    DayMonthYearZ,
}

/// Layouts in the order they are tried
pub const LAYOUTS: [DateLayout; 10] = [
    DateLayout::Rfc1123Z,
    DateLayout::Rfc1123,
    DateLayout::Rfc3339,
    DateLayout::Rfc822,
    DateLayout::Rfc822Z,
    DateLayout::IsoUtc,
    DateLayout::IsoOffset,
    DateLayout::DateTimeUtc,
    DateLayout::Rfc1123ShortDay,
    DateLayout::DayMonthYearZ,
];

impl DateLayout {
    pub fn parse(self, s: &str) -> Result<DateTime<FixedOffset>, LayoutError> {
        match self {
            DateLayout::Rfc1123Z => {
                let rest = strip_weekday(s).ok_or(LayoutError::MissingWeekday)?;
                Ok(DateTime::parse_from_str(rest, "%d %b %Y %H:%M:%S %z")?)
            }
            DateLayout::Rfc1123 | DateLayout::Rfc1123ShortDay => {
                let rest = strip_weekday(s).ok_or(LayoutError::MissingWeekday)?;
                parse_named_zone(rest, "%d %b %Y %H:%M:%S")
            }
            DateLayout::Rfc3339 => Ok(DateTime::parse_from_rfc3339(s)?),
            DateLayout::Rfc822 => parse_named_zone(s, "%d %b %y %H:%M"),
            DateLayout::Rfc822Z => Ok(DateTime::parse_from_str(s, "%d %b %y %H:%M %z")?),
            DateLayout::IsoUtc => {
                let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ")?;
                Ok(naive.and_utc().fixed_offset())
            }
            DateLayout::IsoOffset => Ok(DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%:z")?),
            DateLayout::DateTimeUtc => {
                let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")?;
                Ok(naive.and_utc().fixed_offset())
            }
            DateLayout::DayMonthYearZ => Ok(DateTime::parse_from_str(s, "%d %b %Y %H:%M:%S %z")?),
        }
    }
}

/// Parse a raw publish date into a UTC instant.
///
/// Surrounding whitespace is ignored. Fails with the error of the last
/// layout tried when none match.
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, DateParseError> {
    let trimmed = raw.trim();
    let mut last_error = LayoutError::MissingZone;

    for layout in LAYOUTS {
        match layout.parse(trimmed) {
            Ok(parsed) => return Ok(parsed.with_timezone(&Utc)),
            Err(e) => last_error = e,
        }
    }

    Err(DateParseError {
        input: raw.to_string(),
        source: last_error,
    })
}

/// Drop a leading `Mon, ` style weekday.
///
/// The weekday is not checked against the date: feeds get it wrong often
/// enough that rejecting the whole date would lose otherwise valid items.
fn strip_weekday(s: &str) -> Option<&str> {
    let (day, rest) = s.split_once(',')?;
    if day.len() >= 3 && day.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(rest.trim_start())
    } else {
        None
    }
}

fn parse_named_zone(s: &str, fmt: &str) -> Result<DateTime<FixedOffset>, LayoutError> {
    let (local, zone) = s.rsplit_once(' ').ok_or(LayoutError::MissingZone)?;
    let offset = zone_offset(zone).ok_or_else(|| LayoutError::UnknownZone(zone.to_string()))?;
    let naive = NaiveDateTime::parse_from_str(local, fmt)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or(LayoutError::InvalidLocalTime)
}

/// Offset for an RFC 822 zone abbreviation.
///
/// Unrecognized alphabetic abbreviations are read as UTC rather than
/// rejected.
fn zone_offset(zone: &str) -> Option<FixedOffset> {
    let hours = match zone {
        "UT" | "UTC" | "GMT" | "Z" => 0,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        other if (2..=5).contains(&other.len()) && other.chars().all(|c| c.is_ascii_uppercase()) => {
            tracing::debug!(zone = %other, "Unknown zone abbreviation, assuming UTC");
            0
        }
        _ => return None,
    };
    FixedOffset::east_opt(hours * 3600)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap()
    }

    /// One sample per layout, all naming 2024-03-05 14:30:00 UTC
    const SAMPLES: [(DateLayout, &str); 10] = [
        (DateLayout::Rfc1123Z, "Tue, 05 Mar 2024 09:30:00 -0500"),
        (DateLayout::Rfc1123, "Tue, 05 Mar 2024 14:30:00 GMT"),
        (DateLayout::Rfc3339, "2024-03-05T16:30:00+02:00"),
        (DateLayout::Rfc822, "05 Mar 24 06:30 PST"),
        (DateLayout::Rfc822Z, "05 Mar 24 14:30 +0000"),
        (DateLayout::IsoUtc, "2024-03-05T14:30:00Z"),
        (DateLayout::IsoOffset, "2024-03-05T20:00:00+05:30"),
        (DateLayout::DateTimeUtc, "2024-03-05 14:30:00"),
        (DateLayout::Rfc1123ShortDay, "Tue, 5 Mar 2024 10:30:00 EDT"),
        (DateLayout::DayMonthYearZ, "5 Mar 2024 15:30:00 +0100"),
    ];

    #[test]
    fn test_every_layout_parses_its_sample() {
        for (layout, sample) in SAMPLES {
            let parsed = layout
                .parse(sample)
                .unwrap_or_else(|e| panic!("{layout:?} rejected {sample:?}: {e}"));
            assert_eq!(parsed.with_timezone(&Utc), instant(), "{layout:?}");
        }
    }

    #[test]
    fn test_samples_normalize_to_same_instant() {
        for (_, sample) in SAMPLES {
            assert_eq!(parse_date(sample).unwrap(), instant(), "{sample}");
        }
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        assert_eq!(
            parse_date("\n   Tue, 05 Mar 2024 14:30:00 GMT  \n").unwrap(),
            instant()
        );
    }

    #[test]
    fn test_wrong_weekday_tolerated() {
        assert_eq!(
            parse_date("Fri, 05 Mar 2024 14:30:00 +0000").unwrap(),
            instant()
        );
    }

    #[test]
    fn test_unknown_abbreviation_read_as_utc() {
        assert_eq!(
            parse_date("Tue, 05 Mar 2024 14:30:00 XYZ").unwrap(),
            instant()
        );
    }

    #[test]
    fn test_garbage_reports_input_and_last_error() {
        let err = parse_date("not-a-date").unwrap_err();
        assert_eq!(err.input, "not-a-date");
        assert!(matches!(err.source, LayoutError::Chrono(_)));
        assert!(err.to_string().contains("not-a-date"));
    }

    #[test]
    fn test_empty_string_fails() {
        let err = parse_date("").unwrap_err();
        assert_eq!(err.input, "");
    }

    #[test]
    fn test_rfc1123z_without_weekday_falls_through() {
        assert_eq!(
            DateLayout::Rfc1123Z.parse("05 Mar 2024 14:30:00 +0000"),
            Err(LayoutError::MissingWeekday)
        );
        assert!(parse_date("05 Mar 2024 14:30:00 +0000").is_ok());
    }

    fn render(layout: DateLayout, at: DateTime<FixedOffset>) -> String {
        let utc = at.with_timezone(&Utc);
        match layout {
            DateLayout::Rfc1123Z => at.format("%a, %d %b %Y %H:%M:%S %z").to_string(),
            DateLayout::Rfc1123 => utc.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            DateLayout::Rfc3339 => at.to_rfc3339(),
            DateLayout::Rfc822 => utc.format("%d %b %y %H:%M UT").to_string(),
            DateLayout::Rfc822Z => at.format("%d %b %y %H:%M %z").to_string(),
            DateLayout::IsoUtc => utc.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            DateLayout::IsoOffset => at.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            DateLayout::DateTimeUtc => utc.format("%Y-%m-%d %H:%M:%S").to_string(),
            DateLayout::Rfc1123ShortDay => utc.format("%a, %-d %b %Y %H:%M:%S UTC").to_string(),
            DateLayout::DayMonthYearZ => at.format("%-d %b %Y %H:%M:%S %z").to_string(),
        }
    }

    proptest! {
        #[test]
        fn prop_all_layouts_agree_on_instant(
            // 2000-01-01 .. 2060-01-01 in whole minutes, inside the two-digit-year window
            minutes in 15_778_080i64..47_335_680,
            quarter_hours in -48i32..=56,
        ) {
            let utc = DateTime::from_timestamp(minutes * 60, 0).unwrap();
            let offset = FixedOffset::east_opt(quarter_hours * 15 * 60).unwrap();
            let at = utc.with_timezone(&offset);

            for layout in LAYOUTS {
                let text = render(layout, at);
                let parsed = parse_date(&text);
                prop_assert_eq!(parsed, Ok(utc), "{:?} rendered {:?}", layout, text);
            }
        }
    }
}
