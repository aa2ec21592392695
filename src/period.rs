use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::{AppError, Result};

/// Named time range the daywise chart can be switched to.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum Period {
    #[default]
    CurrentMonth,
    LastMonth,
    #[strum(serialize = "last7Days")]
    #[serde(rename = "last7Days")]
    Last7Days,
    #[strum(serialize = "last30Days")]
    #[serde(rename = "last30Days")]
    Last30Days,
}

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBounds {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateBounds {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn start_iso(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_iso(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for DateBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start_iso(), self.end_iso())
    }
}

impl Period {
    /// Parses a selector key such as `last7Days`.
    pub fn parse(selector: &str) -> Result<Self> {
        Self::from_str(selector).map_err(|_| {
            AppError::InvalidArgument(format!("unknown period selector '{}'", selector))
        })
    }

    /// Resolves the period against `now` in its own time zone.
    ///
    /// The rolling periods subtract whole 24 hour spans from the instant
    /// and take the calendar date of the result, so across a DST change
    /// the start date depends on the time of day `now` falls on.
    pub fn resolve<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateBounds {
        let today = now.date_naive();

        match self {
            Period::CurrentMonth => month_bounds(today.year(), today.month()),
            Period::LastMonth => {
                let (year, month) = if today.month() == 1 {
                    (today.year() - 1, 12)
                } else {
                    (today.year(), today.month() - 1)
                };
                month_bounds(year, month)
            }
            Period::Last7Days => DateBounds {
                start: (now.clone() - Duration::hours(7 * 24)).date_naive(),
                end: today,
            },
            Period::Last30Days => DateBounds {
                start: (now.clone() - Duration::hours(30 * 24)).date_naive(),
                end: today,
            },
        }
    }

    pub fn resolve_now(&self) -> DateBounds {
        self.resolve(&Local::now())
    }

    pub fn title(&self) -> &str {
        match self {
            Period::CurrentMonth => "Current Month",
            Period::LastMonth => "Last Month",
            Period::Last7Days => "Last 7 Days",
            Period::Last30Days => "Last 30 Days",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Period::Last7Days => Period::CurrentMonth,
            Period::CurrentMonth => Period::LastMonth,
            Period::LastMonth => Period::Last30Days,
            Period::Last30Days => Period::Last7Days,
        }
    }
}

fn month_bounds(year: i32, month: u32) -> DateBounds {
    // Day 1 always exists, so these only fail outside chrono's year range.
    let start = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN);
    let next_month_start = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let end = next_month_start
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX);

    DateBounds { start, end }
}
