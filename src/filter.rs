//! Hierarchical categorical and date-range filtering.
//!
//! Selectors compose as AND across dimensions and OR within one dimension.
//! An empty selector places no restriction, and neither does a selector on
//! a column the record set never had.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CpkError;
use crate::record::{Field, PresentColumns, Record, RecordSet};

/// Inclusive calendar-day range on intake date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CpkError> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    /// Rejects ranges that end before they start. Deserialized ranges bypass
    /// [`DateRange::new`], so settings call this explicitly.
    pub fn validate(&self) -> Result<(), CpkError> {
        if self.start > self.end {
            return Err(CpkError::Config(format!(
                "date range start {} is after end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    /// True when `at` falls between `start 00:00:00` and `end 23:59:59`.
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        let lower = self.start.and_time(chrono::NaiveTime::MIN);
        let upper = self
            .end
            .and_hms_opt(23, 59, 59)
            .unwrap_or_else(|| self.end.and_time(chrono::NaiveTime::MIN));
        lower <= at && at <= upper
    }
}

/// Accepted values per dimension plus an optional intake-date range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selectors {
    pub regions: BTreeSet<String>,
    pub sub_regions: BTreeSet<String>,
    pub localities: BTreeSet<String>,
    pub farms: BTreeSet<String>,
    pub date_range: Option<DateRange>,
}

impl Selectors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_regions<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_sub_regions<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_regions.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_localities<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.localities.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_farms<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.farms.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// True when no selector restricts anything.
    pub fn is_unrestricted(&self) -> bool {
        self.regions.is_empty()
            && self.sub_regions.is_empty()
            && self.localities.is_empty()
            && self.farms.is_empty()
            && self.date_range.is_none()
    }

    fn categorical(&self) -> [(Field, &BTreeSet<String>); 4] {
        [
            (Field::Region, &self.regions),
            (Field::SubRegion, &self.sub_regions),
            (Field::Locality, &self.localities),
            (Field::FarmName, &self.farms),
        ]
    }

    fn accepts(&self, record: &Record, columns: &PresentColumns) -> bool {
        let categorical_ok = self.categorical().iter().all(|(field, accepted)| {
            if accepted.is_empty() || !columns.has_field(*field) {
                return true;
            }
            field
                .value(record)
                .is_some_and(|value| accepted.contains(value))
        });
        if !categorical_ok {
            return false;
        }
        match (&self.date_range, columns.intake_date) {
            (Some(range), true) => record.intake_date.is_some_and(|at| range.contains(at)),
            _ => true,
        }
    }
}

/// Records of `records` accepted by `selectors`, as a new set.
pub fn filter(records: &RecordSet, selectors: &Selectors) -> RecordSet {
    if selectors.is_unrestricted() {
        return records.clone();
    }
    let columns = records.columns();
    let kept: Vec<Record> = records
        .iter()
        .filter(|r| selectors.accepts(r, columns))
        .cloned()
        .collect();
    debug!(
        input = records.len(),
        kept = kept.len(),
        "applied record filter"
    );
    records.derive(kept)
}

/// Restrict a set to an intake-date range only.
pub fn within(records: &RecordSet, range: Option<DateRange>) -> RecordSet {
    match range {
        Some(range) => filter(records, &Selectors::new().with_date_range(range)),
        None => records.clone(),
    }
}
