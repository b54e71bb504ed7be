//! Period buckets derived from intake dates.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::CpkError;
use crate::schema::{granularity, output};

/// Time granularity used to bucket records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    Month,
    Quarter,
    Year,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Month => granularity::MONTH,
            Self::Quarter => granularity::QUARTER,
            Self::Year => granularity::YEAR,
        }
    }
}

impl FromStr for Granularity {
    type Err = CpkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            granularity::MONTH => Ok(Self::Month),
            granularity::QUARTER => Ok(Self::Quarter),
            granularity::YEAR => Ok(Self::Year),
            other => Err(CpkError::Config(format!(
                "Invalid granularity: '{}'. Must be 'month', 'quarter' or 'year'",
                other
            ))),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A period bucket. Ordering is chronological within one granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Period {
    /// Single synthetic bucket for records without an intake-date column.
    Overall,
    Year(i32),
    Quarter { year: i32, quarter: u32 },
    Month { year: i32, month: u32 },
}

impl Period {
    pub fn of(date: NaiveDateTime, granularity: Granularity) -> Self {
        let year = date.year();
        match granularity {
            Granularity::Month => Self::Month {
                year,
                month: date.month(),
            },
            Granularity::Quarter => Self::Quarter {
                year,
                quarter: (date.month() - 1) / 3 + 1,
            },
            Granularity::Year => Self::Year(year),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overall => f.write_str(output::OVERALL_PERIOD),
            Self::Year(year) => write!(f, "{year}"),
            Self::Quarter { year, quarter } => write!(f, "{year}Q{quarter}"),
            Self::Month { year, month } => write!(f, "{year}-{month:02}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap()
    }

    #[test]
    fn buckets_by_granularity() {
        let date = at(2024, 8, 14);
        assert_eq!(Period::of(date, Granularity::Month).to_string(), "2024-08");
        assert_eq!(Period::of(date, Granularity::Quarter).to_string(), "2024Q3");
        assert_eq!(Period::of(date, Granularity::Year).to_string(), "2024");
    }

    #[test]
    fn quarter_edges() {
        assert_eq!(
            Period::of(at(2024, 3, 31), Granularity::Quarter),
            Period::Quarter { year: 2024, quarter: 1 }
        );
        assert_eq!(
            Period::of(at(2024, 4, 1), Granularity::Quarter),
            Period::Quarter { year: 2024, quarter: 2 }
        );
        assert_eq!(
            Period::of(at(2024, 12, 31), Granularity::Quarter),
            Period::Quarter { year: 2024, quarter: 4 }
        );
    }

    #[test]
    fn months_sort_chronologically() {
        let mut periods = vec![
            Period::of(at(2024, 11, 1), Granularity::Month),
            Period::of(at(2023, 12, 1), Granularity::Month),
            Period::of(at(2024, 2, 1), Granularity::Month),
        ];
        periods.sort();
        let labels: Vec<String> = periods.iter().map(|p| p.to_string()).collect();
        assert_eq!(labels, vec!["2023-12", "2024-02", "2024-11"]);
    }

    #[test]
    fn parses_granularity_names() {
        assert_eq!("Quarter".parse::<Granularity>().unwrap(), Granularity::Quarter);
        assert!("week".parse::<Granularity>().is_err());
    }
}
