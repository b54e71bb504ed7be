//! Summary and per-group detail tables.
//!
//! Both tables run every trait sample through [`stats::compute`]; they only
//! differ in how records are grouped before the call and how results are
//! laid out afterwards.

use std::collections::BTreeMap;

use polars::prelude::*;
use tracing::debug;

use crate::config::CoefficientConfig;
use crate::error::CpkError;
use crate::period::{Granularity, Period};
use crate::record::{trait_sample, Field, PresentColumns, Record, RecordSet, Trait};
use crate::schema::{output, placeholder};
use crate::stats::{self, Statistic, TraitResult};

// ── Shared helpers ──────────────────────────────────────────────────────────

/// Capability results of every trait over one group of records.
pub(crate) fn trait_results(
    group: &[&Record],
    columns: &PresentColumns,
    config: &CoefficientConfig,
) -> [TraitResult; 5] {
    Trait::ALL.map(|t| {
        if !columns.has_trait(t) {
            return TraitResult::NoData;
        }
        let sample = trait_sample(group.iter().copied(), t);
        stats::compute(t, &sample, config)
    })
}

/// Partition records by a key. Records for which `key` yields `None` are
/// left out of every group.
pub(crate) fn partition<'a, K, F>(records: &'a [Record], key: F) -> BTreeMap<K, Vec<&'a Record>>
where
    K: Ord,
    F: Fn(&Record) -> Option<K>,
{
    let mut groups: BTreeMap<K, Vec<&Record>> = BTreeMap::new();
    let mut excluded = 0usize;
    for record in records {
        match key(record) {
            Some(k) => groups.entry(k).or_default().push(record),
            None => excluded += 1,
        }
    }
    if excluded > 0 {
        debug!(excluded, groups = groups.len(), "records without a group key");
    }
    groups
}

/// Group-key component for a categorical field. An absent column yields the
/// placeholder for every record; a missing value in a present column
/// excludes the record.
pub(crate) fn key_part(record: &Record, field: Field, columns: &PresentColumns) -> Option<String> {
    if columns.has_field(field) {
        field.value(record).map(str::to_string)
    } else {
        Some(placeholder::ABSENT.to_string())
    }
}

/// Period bucket of a record, or [`Period::Overall`] when the set has no
/// intake-date column.
pub(crate) fn period_of(
    record: &Record,
    columns: &PresentColumns,
    granularity: Granularity,
) -> Option<Period> {
    if columns.intake_date {
        record.intake_date.map(|at| Period::of(at, granularity))
    } else {
        Some(Period::Overall)
    }
}

// ── Summary (pivoted) ───────────────────────────────────────────────────────

/// One column per trait, one row per statistic.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    pub record_count: usize,
    results: [TraitResult; 5],
}

impl SummaryTable {
    pub fn result(&self, t: Trait) -> &TraitResult {
        &self.results[t.index()]
    }

    pub fn results(&self) -> impl Iterator<Item = (Trait, &TraitResult)> {
        Trait::ALL.into_iter().zip(self.results.iter())
    }

    pub fn to_frame(&self) -> Result<DataFrame, CpkError> {
        let labels: Vec<&str> = Statistic::ALL.iter().map(|s| s.label()).collect();
        let mut columns = vec![Column::new(output::ANALYSIS.into(), &labels)];
        for (t, result) in self.results() {
            let cells: Vec<String> = Statistic::ALL.iter().map(|s| result.cell(*s)).collect();
            columns.push(Column::new(t.column().into(), &cells));
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Summarise a whole record set.
pub fn summarize(records: &RecordSet, config: &CoefficientConfig) -> SummaryTable {
    let group: Vec<&Record> = records.iter().collect();
    summarize_group(&group, records.columns(), config)
}

pub(crate) fn summarize_group(
    group: &[&Record],
    columns: &PresentColumns,
    config: &CoefficientConfig,
) -> SummaryTable {
    SummaryTable {
        record_count: group.len(),
        results: trait_results(group, columns, config),
    }
}

// ── Detail (per group) ──────────────────────────────────────────────────────

/// Identity of a detail group. Field order is the output sort order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub period: Period,
    pub sub_region: String,
    pub farm: String,
    pub locality: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailRow {
    pub key: GroupKey,
    pub record_count: usize,
    results: [TraitResult; 5],
}

impl DetailRow {
    pub fn result(&self, t: Trait) -> &TraitResult {
        &self.results[t.index()]
    }

    /// Results of every trait, in [`Trait::ALL`] order.
    pub fn results(&self) -> &[TraitResult; 5] {
        &self.results
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailTable {
    pub rows: Vec<DetailRow>,
}

impl DetailTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_frame(&self) -> Result<DataFrame, CpkError> {
        let n = self.rows.len();
        let mut periods = Vec::with_capacity(n);
        let mut sub_regions = Vec::with_capacity(n);
        let mut localities = Vec::with_capacity(n);
        let mut farms = Vec::with_capacity(n);
        let mut counts: Vec<u64> = Vec::with_capacity(n);
        for row in &self.rows {
            periods.push(row.key.period.to_string());
            sub_regions.push(row.key.sub_region.clone());
            localities.push(row.key.locality.clone());
            farms.push(row.key.farm.clone());
            counts.push(row.record_count as u64);
        }

        let mut columns = vec![
            Column::new(output::PERIOD.into(), &periods),
            Column::new(output::SUB_REGION.into(), &sub_regions),
            Column::new(output::LOCALITY.into(), &localities),
            Column::new(output::FARM.into(), &farms),
            Column::new(output::RECORD_COUNT.into(), &counts),
        ];
        for t in Trait::ALL {
            for stat in Statistic::ALL {
                let cells: Vec<String> = self.rows.iter().map(|r| r.result(t).cell(stat)).collect();
                columns.push(Column::new(stat.column(t).into(), &cells));
            }
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Per-group statistics, grouped by (period, farm, sub-region, locality)
/// and sorted by (period, sub-region, farm).
pub fn detail(
    records: &RecordSet,
    config: &CoefficientConfig,
    granularity: Granularity,
) -> DetailTable {
    let columns = records.columns();
    let groups = partition(records.records(), |r| {
        Some(GroupKey {
            period: period_of(r, columns, granularity)?,
            sub_region: key_part(r, Field::SubRegion, columns)?,
            farm: key_part(r, Field::FarmName, columns)?,
            locality: key_part(r, Field::Locality, columns)?,
        })
    });

    let rows: Vec<DetailRow> = groups
        .into_iter()
        .map(|(key, group)| DetailRow {
            record_count: group.len(),
            results: trait_results(&group, columns, config),
            key,
        })
        .collect();

    debug!(groups = rows.len(), %granularity, "computed detail table");
    DetailTable { rows }
}
