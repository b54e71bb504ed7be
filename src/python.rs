//! Python bindings for [`CpkModel`].

use std::collections::HashMap;

use chrono::NaiveDate;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3_polars::PyDataFrame;

use crate::abnormality::ClassificationRule;
use crate::config::{CoefficientConfig, ScanSettings, Season};
use crate::error::CpkError;
use crate::filter::{DateRange, Selectors};
use crate::model::CpkModel;
use crate::period::Granularity;
use crate::record::Dimension;

#[pyclass(name = "CpkModel")]
pub struct PyCpkModel {
    inner: CpkModel,
}

#[pymethods]
impl PyCpkModel {
    #[new]
    fn new(base_path: String) -> Self {
        Self {
            inner: CpkModel::new(base_path),
        }
    }

    // ── Data loading ────────────────────────────────────────────────────────

    /// Load a CSV export of quality records. Returns the row count.
    #[pyo3(signature = (filename, rename=None))]
    fn load_csv(
        &mut self,
        filename: &str,
        rename: Option<HashMap<String, String>>,
    ) -> PyResult<usize> {
        let records = self.inner.load_csv(filename, rename.as_ref())?;
        Ok(records.len())
    }

    /// Load records from a polars DataFrame. Returns the row count.
    #[pyo3(signature = (df, rename=None))]
    fn load_frame(
        &mut self,
        df: PyDataFrame,
        rename: Option<HashMap<String, String>>,
    ) -> PyResult<usize> {
        let records = self.inner.load_frame(df.0, rename.as_ref())?;
        Ok(records.len())
    }

    // ── Settings ────────────────────────────────────────────────────────────

    #[pyo3(signature = (
        fat = 3.2,
        protein = 2.9,
        dry_matter = 11.8,
        somatic_cell = 20.0,
        acidity_min = 12.0,
        acidity_max = 17.5,
        acidity_tolerance = 5.5,
    ))]
    fn set_coefficients(
        &mut self,
        fat: f64,
        protein: f64,
        dry_matter: f64,
        somatic_cell: f64,
        acidity_min: f64,
        acidity_max: f64,
        acidity_tolerance: f64,
    ) -> PyResult<()> {
        self.inner.set_coefficients(CoefficientConfig {
            fat,
            protein,
            dry_matter,
            somatic_cell,
            acidity_min,
            acidity_max,
            acidity_tolerance,
        })?;
        Ok(())
    }

    fn set_season(&mut self, season: &str) -> PyResult<()> {
        let season: Season = season.parse()?;
        self.inner.set_season(season);
        Ok(())
    }

    /// Set the interactive selection used by `summary` and `detail`.
    #[pyo3(signature = (regions=None, sub_regions=None, localities=None, farms=None, start=None, end=None))]
    fn set_selection(
        &mut self,
        regions: Option<Vec<String>>,
        sub_regions: Option<Vec<String>>,
        localities: Option<Vec<String>>,
        farms: Option<Vec<String>>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> PyResult<()> {
        let mut selection = Selectors::new()
            .with_regions(regions.unwrap_or_default())
            .with_sub_regions(sub_regions.unwrap_or_default())
            .with_localities(localities.unwrap_or_default())
            .with_farms(farms.unwrap_or_default());
        if let Some(range) = date_range(start, end)? {
            selection = selection.with_date_range(range);
        }
        self.inner.set_selection(selection);
        Ok(())
    }

    // ── Reports ─────────────────────────────────────────────────────────────

    fn summary(&self) -> PyResult<PyDataFrame> {
        let df = self.inner.summary()?.to_frame()?;
        Ok(PyDataFrame(df))
    }

    #[pyo3(signature = (granularity="month"))]
    fn detail(&self, granularity: &str) -> PyResult<PyDataFrame> {
        let granularity: Granularity = granularity.parse()?;
        let df = self.inner.detail(granularity)?.to_frame()?;
        Ok(PyDataFrame(df))
    }

    /// Scan the complete data set for abnormal CPK cells.
    ///
    /// Pass either `threshold` (abnormal when CPK < threshold) or
    /// `band=(min, max)` (abnormal outside the band). Without either, the
    /// current rule is kept.
    #[pyo3(signature = (
        dimension = "sub_region",
        granularity = "month",
        threshold = None,
        band = None,
        start = None,
        end = None,
    ))]
    fn scan(
        &mut self,
        dimension: &str,
        granularity: &str,
        threshold: Option<f64>,
        band: Option<(f64, f64)>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> PyResult<PyDataFrame> {
        let rule = match (threshold, band) {
            (Some(_), Some(_)) => {
                return Err(PyValueError::new_err(
                    "Pass either threshold or band, not both",
                ))
            }
            (Some(t), None) => Some(ClassificationRule::below(t)),
            (None, Some((min, max))) => Some(ClassificationRule::outside(min, max)?),
            (None, None) => None,
        };
        if let Some(rule) = rule {
            self.inner.set_rule(rule)?;
        }
        self.inner.set_scan(ScanSettings {
            granularity: granularity.parse()?,
            dimension: dimension.parse::<Dimension>()?,
            date_range: date_range(start, end)?,
        })?;
        let df = self.inner.scan()?.to_frame()?;
        Ok(PyDataFrame(df))
    }

    #[getter]
    fn row_count(&self) -> PyResult<usize> {
        Ok(self.inner.records()?.len())
    }
}

fn date_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Option<DateRange>, CpkError> {
    match (start, end) {
        (Some(start), Some(end)) => Ok(Some(DateRange::new(start, end)?)),
        (None, None) => Ok(None),
        _ => Err(CpkError::Config(
            "date range needs both start and end".to_string(),
        )),
    }
}
