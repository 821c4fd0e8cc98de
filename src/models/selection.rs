// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct ParseSelectionError {
    kind: &'static str,
    value: String,
    expected: &'static str,
}

/// Trailing window applied to the history before aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1h")]
    LastHour,
    #[serde(rename = "24h")]
    Last24Hours,
    #[serde(rename = "1w")]
    LastWeek,
    #[default]
    #[serde(rename = "all")]
    AllTime,
}

impl TimeRange {
    pub const ALL: [TimeRange; 4] = [
        TimeRange::LastHour,
        TimeRange::Last24Hours,
        TimeRange::LastWeek,
        TimeRange::AllTime,
    ];

    /// Width of the trailing window, `None` for all-time
    pub fn window(self) -> Option<Duration> {
        match self {
            TimeRange::LastHour => Some(Duration::hours(1)),
            TimeRange::Last24Hours => Some(Duration::hours(24)),
            TimeRange::LastWeek => Some(Duration::days(7)),
            TimeRange::AllTime => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::LastHour => "1h",
            TimeRange::Last24Hours => "24h",
            TimeRange::LastWeek => "1w",
            TimeRange::AllTime => "all",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeRange::LastHour => "Last Hour",
            TimeRange::Last24Hours => "Last 24 Hours",
            TimeRange::LastWeek => "Last Week",
            TimeRange::AllTime => "All",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = ParseSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1h" => Ok(TimeRange::LastHour),
            "24h" => Ok(TimeRange::Last24Hours),
            "1w" => Ok(TimeRange::LastWeek),
            "all" => Ok(TimeRange::AllTime),
            _ => Err(ParseSelectionError {
                kind: "time range",
                value: s.to_string(),
                expected: "1h, 24h, 1w, all",
            }),
        }
    }
}

/// Granularity the filtered history is bucketed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    #[default]
    Minute,
    Hour,
    Day,
}

impl Interval {
    pub const ALL: [Interval; 3] = [Interval::Minute, Interval::Hour, Interval::Day];

    pub fn as_str(self) -> &'static str {
        match self {
            Interval::Minute => "minute",
            Interval::Hour => "hour",
            Interval::Day => "day",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Interval::Minute => "Per Minute",
            Interval::Hour => "Per Hour",
            Interval::Day => "Per Day",
        }
    }

    /// Drop everything finer than this interval
    pub fn truncate(self, dt: NaiveDateTime) -> NaiveDateTime {
        let date = dt.date();
        let time = match self {
            Interval::Minute => dt.time().with_second(0).and_then(|t| t.with_nanosecond(0)),
            Interval::Hour => dt
                .time()
                .with_minute(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0)),
            Interval::Day => None,
        };
        match time {
            Some(time) => date.and_time(time),
            None => date.and_hms_opt(0, 0, 0).unwrap_or(dt),
        }
    }

    /// strftime pattern used for bucket keys
    pub fn key_format(self) -> &'static str {
        match self {
            Interval::Minute => "%Y-%m-%d %H:%M",
            Interval::Hour => "%Y-%m-%d %H:00",
            Interval::Day => "%Y-%m-%d",
        }
    }

    /// strftime pattern used for chart labels
    pub fn label_format(self) -> &'static str {
        match self {
            Interval::Minute => "%d %b %H:%M",
            Interval::Hour => "%d %b %H:00",
            Interval::Day => "%d %b %Y",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Interval::Minute => Interval::Hour,
            Interval::Hour => Interval::Day,
            Interval::Day => Interval::Minute,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            Interval::Minute => Interval::Day,
            Interval::Hour => Interval::Minute,
            Interval::Day => Interval::Hour,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = ParseSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minute" | "m" => Ok(Interval::Minute),
            "hour" | "h" => Ok(Interval::Hour),
            "day" | "d" => Ok(Interval::Day),
            _ => Err(ParseSelectionError {
                kind: "interval",
                value: s.to_string(),
                expected: "minute, hour, day",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 10, 1)
            .unwrap()
            .and_hms_milli_opt(h, m, s, 500)
            .unwrap()
    }

    #[test]
    fn test_truncate() {
        assert_eq!(Interval::Minute.truncate(at(10, 7, 45)), at(10, 7, 0).with_nanosecond(0).unwrap());
        assert_eq!(Interval::Hour.truncate(at(10, 7, 45)), at(10, 0, 0).with_nanosecond(0).unwrap());
        assert_eq!(Interval::Day.truncate(at(10, 7, 45)), at(0, 0, 0).with_nanosecond(0).unwrap());
    }

    #[test]
    fn test_parse_round_trip_through_display() {
        for range in TimeRange::ALL {
            assert_eq!(range.to_string().parse::<TimeRange>().unwrap(), range);
        }
        for interval in Interval::ALL {
            assert_eq!(interval.to_string().parse::<Interval>().unwrap(), interval);
        }
        assert!("fortnight".parse::<TimeRange>().is_err());
        assert!("second".parse::<Interval>().is_err());
    }

    #[test]
    fn test_interval_names_are_not_ranges() {
        for name in ["hour", "day", "week"] {
            assert!(name.parse::<TimeRange>().is_err(), "{} parsed as a range", name);
        }
        assert_eq!("day".parse::<Interval>().unwrap(), Interval::Day);
        assert_eq!(" 24H ".parse::<TimeRange>().unwrap(), TimeRange::Last24Hours);
    }

    #[test]
    fn test_interval_cycles() {
        for interval in Interval::ALL {
            assert_eq!(interval.next().previous(), interval);
        }
        assert_eq!(Interval::Day.next(), Interval::Minute);
    }

    #[test]
    fn test_windows() {
        assert_eq!(TimeRange::LastHour.window(), Some(Duration::hours(1)));
        assert_eq!(TimeRange::LastWeek.window(), Some(Duration::hours(168)));
        assert_eq!(TimeRange::AllTime.window(), None);
    }
}
