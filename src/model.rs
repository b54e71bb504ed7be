use std::collections::HashMap;
use std::path::PathBuf;

use polars::prelude::DataFrame;
use tracing::info;

use crate::abnormality::{self, AbnormalityTable, ClassificationRule};
use crate::aggregation::{self, DetailTable, SummaryTable};
use crate::config::{AnalysisSettings, CoefficientConfig, ScanSettings, Season};
use crate::error::CpkError;
use crate::filter::{self, Selectors};
use crate::loader;
use crate::period::Granularity;
use crate::record::RecordSet;

/// Analysis session: one loaded data set, the current settings and the
/// interactive selection.
///
/// The overall report follows the selection; the abnormality scan always
/// runs over the complete data set.
#[derive(Debug, Clone, Default)]
pub struct CpkModel {
    base_path: PathBuf,
    records: Option<RecordSet>,
    settings: AnalysisSettings,
    selection: Selectors,
}

/// Summary and detail tables of one overall report.
#[derive(Debug, Clone, PartialEq)]
pub struct OverallReport {
    pub summary: SummaryTable,
    pub detail: DetailTable,
}

impl CpkModel {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    // ── Data loading ────────────────────────────────────────────────────────

    /// Load a CSV file, resolved against the base path.
    pub fn load_csv(
        &mut self,
        filename: &str,
        rename: Option<&HashMap<String, String>>,
    ) -> Result<&RecordSet, CpkError> {
        let path = self.base_path.join(filename);
        let records = loader::load_csv(path, rename)?;
        Ok(self.install(records))
    }

    pub fn load_frame(
        &mut self,
        df: DataFrame,
        rename: Option<&HashMap<String, String>>,
    ) -> Result<&RecordSet, CpkError> {
        let records = loader::records_from_frame(df, rename)?;
        Ok(self.install(records))
    }

    pub fn load_records(&mut self, records: RecordSet) -> Result<&RecordSet, CpkError> {
        if records.is_empty() {
            return Err(CpkError::EmptyInput);
        }
        Ok(self.install(records))
    }

    fn install(&mut self, records: RecordSet) -> &RecordSet {
        info!(rows = records.len(), "data set installed");
        self.selection = Selectors::default();
        self.records.insert(records)
    }

    pub fn records(&self) -> Result<&RecordSet, CpkError> {
        self.records
            .as_ref()
            .ok_or_else(|| CpkError::NotLoaded("records".into()))
    }

    // ── Settings ────────────────────────────────────────────────────────────

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: AnalysisSettings) -> Result<(), CpkError> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    pub fn set_coefficients(&mut self, coefficients: CoefficientConfig) -> Result<(), CpkError> {
        coefficients.validate()?;
        self.settings.coefficients = coefficients;
        Ok(())
    }

    pub fn set_season(&mut self, season: Season) {
        self.settings.coefficients = CoefficientConfig::for_season(season);
    }

    pub fn set_rule(&mut self, rule: ClassificationRule) -> Result<(), CpkError> {
        rule.validate()?;
        self.settings.rule = rule;
        Ok(())
    }

    pub fn set_scan(&mut self, scan: ScanSettings) -> Result<(), CpkError> {
        scan.validate()?;
        self.settings.scan = scan;
        Ok(())
    }

    // ── Selection ───────────────────────────────────────────────────────────

    pub fn selection(&self) -> &Selectors {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selectors) {
        self.selection = selection;
    }

    /// Records matching the current selection.
    pub fn filtered(&self) -> Result<RecordSet, CpkError> {
        Ok(filter::filter(self.records()?, &self.selection))
    }

    // ── Reports ─────────────────────────────────────────────────────────────

    pub fn summary(&self) -> Result<SummaryTable, CpkError> {
        let filtered = self.filtered()?;
        Ok(aggregation::summarize(&filtered, &self.settings.coefficients))
    }

    pub fn detail(&self, granularity: Granularity) -> Result<DetailTable, CpkError> {
        let filtered = self.filtered()?;
        Ok(aggregation::detail(
            &filtered,
            &self.settings.coefficients,
            granularity,
        ))
    }

    /// Summary and month-level detail over the current selection.
    pub fn overall_report(&self) -> Result<OverallReport, CpkError> {
        let filtered = self.filtered()?;
        let coefficients = &self.settings.coefficients;
        info!(
            selected = filtered.len(),
            total = self.records()?.len(),
            "computing overall report"
        );
        Ok(OverallReport {
            summary: aggregation::summarize(&filtered, coefficients),
            detail: aggregation::detail(&filtered, coefficients, Granularity::Month),
        })
    }

    /// Abnormality scan over the complete data set, ignoring the selection.
    pub fn scan(&self) -> Result<AbnormalityTable, CpkError> {
        Ok(abnormality::scan(
            self.records()?,
            &self.settings.coefficients,
            &self.settings.rule,
            &self.settings.scan,
        ))
    }
}
