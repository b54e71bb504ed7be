//! Process capability (CPK/CP) analysis of dairy-farm quality records.
//!
//! Records are loaded into a [`RecordSet`], optionally narrowed with
//! [`filter::filter`], and summarised per trait with [`aggregation`].
//! [`abnormality::scan`] flags (period, region / sub-region / farm) cells
//! whose CPK falls outside the configured acceptance rule.

pub mod abnormality;
pub mod aggregation;
pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod model;
pub mod period;
pub mod record;
pub mod schema;
pub mod stats;

#[cfg(feature = "python")]
mod python;

pub use abnormality::{AbnormalityTable, ClassificationRule, Verdict};
pub use aggregation::{DetailTable, SummaryTable};
pub use config::{AnalysisSettings, CoefficientConfig, ScanSettings, Season};
pub use error::CpkError;
pub use filter::{DateRange, Selectors};
pub use model::CpkModel;
pub use period::{Granularity, Period};
pub use record::{Dimension, Field, Record, RecordSet, Trait};
pub use stats::{CapabilityRow, Statistic, TraitResult};

#[cfg(feature = "python")]
use pyo3::prelude::*;
#[cfg(feature = "python")]
use pyo3::types::PyModule;

/// Export schema constants as Python submodules
#[cfg(feature = "python")]
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Record columns
    let record = PyModule::new(m.py(), "record")?;
    record.add("REGION", schema::record::REGION)?;
    record.add("SUB_REGION", schema::record::SUB_REGION)?;
    record.add("LOCALITY", schema::record::LOCALITY)?;
    record.add("FARM_CODE", schema::record::FARM_CODE)?;
    record.add("FARM_NAME", schema::record::FARM_NAME)?;
    record.add("INTAKE_DATE", schema::record::INTAKE_DATE)?;
    record.add("TAG_DATE", schema::record::TAG_DATE)?;
    record.add("TRAITS", schema::record::TRAITS.to_vec())?;
    m.add_submodule(&record)?;

    // Statistic labels
    let statistic = PyModule::new(m.py(), "statistic")?;
    statistic.add("SIGMA", schema::statistic::SIGMA)?;
    statistic.add("MEAN", schema::statistic::MEAN)?;
    statistic.add("PROCESS_DIFF", schema::statistic::PROCESS_DIFF)?;
    statistic.add("SIX_SIGMA", schema::statistic::SIX_SIGMA)?;
    statistic.add("THREE_SIGMA", schema::statistic::THREE_SIGMA)?;
    statistic.add("CPK", schema::statistic::CPK)?;
    statistic.add("TOLERANCE", schema::statistic::TOLERANCE)?;
    statistic.add("CP", schema::statistic::CP)?;
    m.add_submodule(&statistic)?;

    // Output columns
    let output = PyModule::new(m.py(), "output")?;
    output.add("ANALYSIS", schema::output::ANALYSIS)?;
    output.add("PERIOD", schema::output::PERIOD)?;
    output.add("SUB_REGION", schema::output::SUB_REGION)?;
    output.add("LOCALITY", schema::output::LOCALITY)?;
    output.add("FARM", schema::output::FARM)?;
    output.add("RECORD_COUNT", schema::output::RECORD_COUNT)?;
    m.add_submodule(&output)?;

    // Placeholders and status tags
    let placeholder = PyModule::new(m.py(), "placeholder")?;
    placeholder.add("ABSENT", schema::placeholder::ABSENT)?;
    placeholder.add("NOT_APPLICABLE", schema::placeholder::NOT_APPLICABLE)?;
    placeholder.add("NORMAL", schema::status::NORMAL)?;
    placeholder.add("ABNORMAL", schema::status::ABNORMAL)?;
    m.add_submodule(&placeholder)?;

    // Dimensions
    let dimension = PyModule::new(m.py(), "dimension")?;
    dimension.add("REGION", schema::dimension::REGION)?;
    dimension.add("SUB_REGION", schema::dimension::SUB_REGION)?;
    dimension.add("FARM", schema::dimension::FARM)?;
    m.add_submodule(&dimension)?;

    // Granularity
    let granularity = PyModule::new(m.py(), "granularity")?;
    granularity.add("MONTH", schema::granularity::MONTH)?;
    granularity.add("QUARTER", schema::granularity::QUARTER)?;
    granularity.add("YEAR", schema::granularity::YEAR)?;
    m.add_submodule(&granularity)?;

    Ok(())
}

#[cfg(feature = "python")]
#[pymodule]
fn dairy_cpk(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyCpkModel>()?;
    add_schema_exports(m)?;
    Ok(())
}
