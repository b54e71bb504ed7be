//! CPK abnormality classification and the full-dataset scan.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregation::{self, key_part, partition, summarize_group, DetailRow, GroupKey};
use crate::config::{CoefficientConfig, ScanSettings};
use crate::error::CpkError;
use crate::filter;
use crate::period::{Granularity, Period};
use crate::record::{Dimension, Field, RecordSet, Trait};
use crate::schema::{output, placeholder, status};
use crate::stats::{Statistic, TraitResult};

// ── Classification rule ─────────────────────────────────────────────────────

/// Acceptance rule for CPK values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassificationRule {
    /// Abnormal when CPK < threshold.
    Below { threshold: f64 },
    /// Abnormal when CPK lies outside `[min, max]`.
    Outside { min: f64, max: f64 },
}

impl Default for ClassificationRule {
    fn default() -> Self {
        Self::Below { threshold: 1.0 }
    }
}

impl ClassificationRule {
    pub fn below(threshold: f64) -> Self {
        Self::Below { threshold }
    }

    pub fn outside(min: f64, max: f64) -> Result<Self, CpkError> {
        let rule = Self::Outside { min, max };
        rule.validate()?;
        Ok(rule)
    }

    pub fn validate(&self) -> Result<(), CpkError> {
        match *self {
            Self::Below { threshold } if threshold.is_nan() => Err(CpkError::Config(
                "CPK threshold must be a number".to_string(),
            )),
            Self::Outside { min, max } if min.is_nan() || max.is_nan() || min > max => {
                Err(CpkError::Config(format!(
                    "CPK band [{min}, {max}] is not a valid interval"
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn is_abnormal(&self, cpk: f64) -> bool {
        match *self {
            Self::Below { threshold } => cpk < threshold,
            Self::Outside { min, max } => cpk < min || cpk > max,
        }
    }

    /// Verdict for one trait result, judged on its reported CPK.
    pub fn classify(&self, result: &TraitResult) -> Verdict {
        match result.reported_cpk() {
            Some(cpk) if self.is_abnormal(cpk) => Verdict::Abnormal,
            Some(_) => Verdict::Normal,
            None => Verdict::Unclassified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Normal,
    Abnormal,
    /// CPK is absent or not computable.
    Unclassified,
}

impl Verdict {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Normal => status::NORMAL,
            Self::Abnormal => status::ABNORMAL,
            Self::Unclassified => placeholder::ABSENT,
        }
    }
}

// ── Scan output ─────────────────────────────────────────────────────────────

/// One (period, dimension value) cell of the scan.
#[derive(Debug, Clone, PartialEq)]
pub struct AbnormalityRow {
    pub period: Period,
    pub value: String,
    /// Set for farm scans only.
    pub sub_region: Option<String>,
    /// Set for farm scans only.
    pub locality: Option<String>,
    pub record_count: usize,
    results: [TraitResult; 5],
    verdicts: [Verdict; 5],
}

impl AbnormalityRow {
    fn new(
        period: Period,
        value: String,
        record_count: usize,
        results: [TraitResult; 5],
        rule: &ClassificationRule,
    ) -> Self {
        let verdicts = results.map(|r| rule.classify(&r));
        Self {
            period,
            value,
            sub_region: None,
            locality: None,
            record_count,
            results,
            verdicts,
        }
    }

    /// Farm cell built from a detail row, keeping its sub-region and locality.
    fn from_detail(row: DetailRow, rule: &ClassificationRule) -> Self {
        let results = *row.results();
        let GroupKey {
            period,
            sub_region,
            farm,
            locality,
        } = row.key;
        Self {
            sub_region: Some(sub_region),
            locality: Some(locality),
            ..Self::new(period, farm, row.record_count, results, rule)
        }
    }

    pub fn verdict(&self, t: Trait) -> Verdict {
        self.verdicts[t.index()]
    }

    pub fn cpk(&self, t: Trait) -> Option<f64> {
        self.results[t.index()].reported_cpk()
    }

    /// A cell is abnormal when any of its traits is.
    pub fn is_abnormal(&self) -> bool {
        self.verdicts.contains(&Verdict::Abnormal)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbnormalityTable {
    pub dimension: Dimension,
    pub granularity: Granularity,
    /// Number of cells examined, abnormal or not.
    pub cells_scanned: usize,
    pub rows: Vec<AbnormalityRow>,
}

impl AbnormalityTable {
    fn empty(settings: &ScanSettings) -> Self {
        Self {
            dimension: settings.dimension,
            granularity: settings.granularity,
            cells_scanned: 0,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_frame(&self) -> Result<DataFrame, CpkError> {
        let periods: Vec<String> = self.rows.iter().map(|r| r.period.to_string()).collect();
        let values: Vec<String> = self.rows.iter().map(|r| r.value.clone()).collect();
        let counts: Vec<u64> = self.rows.iter().map(|r| r.record_count as u64).collect();

        let mut columns = vec![
            Column::new(output::PERIOD.into(), &periods),
            Column::new(self.dimension.as_str().into(), &values),
        ];
        if self.dimension == Dimension::Farm {
            let label = |v: &Option<String>| v.clone().unwrap_or_else(|| placeholder::ABSENT.into());
            let subs: Vec<String> = self.rows.iter().map(|r| label(&r.sub_region)).collect();
            let locs: Vec<String> = self.rows.iter().map(|r| label(&r.locality)).collect();
            columns.push(Column::new(output::SUB_REGION.into(), &subs));
            columns.push(Column::new(output::LOCALITY.into(), &locs));
        }
        columns.push(Column::new(output::RECORD_COUNT.into(), &counts));

        for t in Trait::ALL {
            let cpks: Vec<String> = self
                .rows
                .iter()
                .map(|r| r.results[t.index()].cell(Statistic::Cpk))
                .collect();
            let tags: Vec<&str> = self.rows.iter().map(|r| r.verdict(t).tag()).collect();
            columns.push(Column::new(Statistic::Cpk.column(t).into(), &cpks));
            columns.push(Column::new(
                format!("{}_{}", t.column(), output::STATUS_SUFFIX).into(),
                &tags,
            ));
        }
        Ok(DataFrame::new(columns)?)
    }
}

// ── Scan ────────────────────────────────────────────────────────────────────

/// Scan `records` for abnormal (period, dimension value) cells.
///
/// `records` should be the complete data set; the scan applies only its own
/// date range, never an interactive selection.
pub fn scan(
    records: &RecordSet,
    config: &CoefficientConfig,
    rule: &ClassificationRule,
    settings: &ScanSettings,
) -> AbnormalityTable {
    let columns = records.columns();
    if !columns.intake_date {
        warn!("scan skipped: records have no intake date column");
        return AbnormalityTable::empty(settings);
    }
    let field = settings.dimension.field();
    if !columns.has_field(field) {
        warn!(column = field.column(), "scan skipped: dimension column missing");
        return AbnormalityTable::empty(settings);
    }

    let in_range = filter::within(records, settings.date_range);
    let candidates = match settings.dimension {
        Dimension::Farm => farm_cells(&in_range, config, rule, settings.granularity),
        Dimension::Region | Dimension::SubRegion => {
            dimension_cells(&in_range, config, rule, settings.granularity, field)
        }
    };

    let cells_scanned = candidates.len();
    let rows: Vec<AbnormalityRow> = candidates.into_iter().filter(|r| r.is_abnormal()).collect();
    info!(
        dimension = %settings.dimension,
        granularity = %settings.granularity,
        records = in_range.len(),
        cells = cells_scanned,
        abnormal = rows.len(),
        "abnormality scan finished"
    );

    AbnormalityTable {
        dimension: settings.dimension,
        granularity: settings.granularity,
        cells_scanned,
        rows,
    }
}

fn dimension_cells(
    records: &RecordSet,
    config: &CoefficientConfig,
    rule: &ClassificationRule,
    granularity: Granularity,
    field: Field,
) -> Vec<AbnormalityRow> {
    let columns = records.columns();
    let groups = partition(records.records(), |r| {
        let period = Period::of(r.intake_date?, granularity);
        Some((period, key_part(r, field, columns)?))
    });

    groups
        .into_iter()
        .map(|((period, value), group)| {
            let summary = summarize_group(&group, columns, config);
            let results = Trait::ALL.map(|t| *summary.result(t));
            AbnormalityRow::new(period, value, summary.record_count, results, rule)
        })
        .collect()
}

fn farm_cells(
    records: &RecordSet,
    config: &CoefficientConfig,
    rule: &ClassificationRule,
    granularity: Granularity,
) -> Vec<AbnormalityRow> {
    aggregation::detail(records, config, granularity)
        .rows
        .into_iter()
        .map(|row| AbnormalityRow::from_detail(row, rule))
        .collect()
}
