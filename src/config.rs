//! Analysis settings: trait coefficients, classification rule and scan
//! controls.
//!
//! Settings are plain values built per run and passed by reference into
//! the engine. They can be read from a JSON file; every field has a
//! default, so a file only needs the values it overrides.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::abnormality::ClassificationRule;
use crate::error::CpkError;
use crate::filter::DateRange;
use crate::period::Granularity;
use crate::record::{Dimension, Trait};
use crate::schema::season;

// ── Seasons ─────────────────────────────────────────────────────────────────

/// Seasonal coefficient preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    #[default]
    Summer,
    Winter,
}

impl FromStr for Season {
    type Err = CpkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            season::SUMMER => Ok(Self::Summer),
            season::WINTER => Ok(Self::Winter),
            other => Err(CpkError::Config(format!(
                "Invalid season: '{}'. Must be 'summer' or 'winter'",
                other
            ))),
        }
    }
}

// ── Coefficients ────────────────────────────────────────────────────────────

/// Per-trait targets and the acidity acceptance band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoefficientConfig {
    pub fat: f64,
    pub protein: f64,
    pub dry_matter: f64,
    pub somatic_cell: f64,
    pub acidity_min: f64,
    pub acidity_max: f64,
    pub acidity_tolerance: f64,
}

impl Default for CoefficientConfig {
    fn default() -> Self {
        Self::for_season(Season::Summer)
    }
}

impl CoefficientConfig {
    pub fn for_season(season: Season) -> Self {
        let (fat, protein, dry_matter) = match season {
            Season::Summer => (3.2, 2.9, 11.8),
            Season::Winter => (3.4, 3.0, 11.9),
        };
        Self {
            fat,
            protein,
            dry_matter,
            somatic_cell: 20.0,
            acidity_min: 12.0,
            acidity_max: 17.5,
            acidity_tolerance: 5.5,
        }
    }

    /// Target coefficient for a trait. Acidity is measured against its band
    /// instead and has no single target.
    pub fn target(&self, t: Trait) -> Option<f64> {
        match t {
            Trait::Fat => Some(self.fat),
            Trait::Protein => Some(self.protein),
            Trait::DryMatter => Some(self.dry_matter),
            Trait::SomaticCell => Some(self.somatic_cell),
            Trait::Acidity => None,
        }
    }

    pub fn validate(&self) -> Result<(), CpkError> {
        let values = [
            ("fat", self.fat),
            ("protein", self.protein),
            ("dry_matter", self.dry_matter),
            ("somatic_cell", self.somatic_cell),
            ("acidity_min", self.acidity_min),
            ("acidity_max", self.acidity_max),
            ("acidity_tolerance", self.acidity_tolerance),
        ];
        if let Some((name, _)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(CpkError::Config(format!("{name} must be a finite number")));
        }
        if self.acidity_min >= self.acidity_max {
            return Err(CpkError::Config(format!(
                "acidity_min ({}) must be below acidity_max ({})",
                self.acidity_min, self.acidity_max
            )));
        }
        if self.acidity_tolerance < 0.0 {
            return Err(CpkError::Config(
                "acidity_tolerance must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

// ── Scan controls ───────────────────────────────────────────────────────────

/// Grouping controls for the full-dataset abnormality scan.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub granularity: Granularity,
    pub dimension: Dimension,
    pub date_range: Option<DateRange>,
}

impl ScanSettings {
    pub fn validate(&self) -> Result<(), CpkError> {
        match &self.date_range {
            Some(range) => range.validate(),
            None => Ok(()),
        }
    }
}

// ── Settings bundle ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub coefficients: CoefficientConfig,
    pub rule: ClassificationRule,
    pub scan: ScanSettings,
}

impl AnalysisSettings {
    pub fn from_json_str(json: &str) -> Result<Self, CpkError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CpkError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), CpkError> {
        self.coefficients.validate()?;
        self.rule.validate()?;
        self.scan.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_presets() {
        let summer = CoefficientConfig::for_season(Season::Summer);
        let winter = CoefficientConfig::for_season(Season::Winter);
        assert_eq!(summer.target(Trait::Fat), Some(3.2));
        assert_eq!(winter.target(Trait::Fat), Some(3.4));
        assert_eq!(winter.target(Trait::DryMatter), Some(11.9));
        assert_eq!(summer.target(Trait::Acidity), None);
        assert_eq!(summer.acidity_tolerance, 5.5);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{
            "coefficients": { "fat": 3.5 },
            "rule": { "kind": "outside", "min": 1.0, "max": 2.0 },
            "scan": { "granularity": "quarter", "dimension": "farm" }
        }"#;
        let settings = AnalysisSettings::from_json_str(json).unwrap();
        assert_eq!(settings.coefficients.fat, 3.5);
        assert_eq!(settings.coefficients.protein, 2.9);
        assert_eq!(
            settings.rule,
            ClassificationRule::Outside { min: 1.0, max: 2.0 }
        );
        assert_eq!(settings.scan.granularity, Granularity::Quarter);
        assert_eq!(settings.scan.dimension, Dimension::Farm);
        assert!(settings.scan.date_range.is_none());
    }

    #[test]
    fn rejects_inverted_acidity_band() {
        let json = r#"{ "coefficients": { "acidity_min": 18.0 } }"#;
        let err = AnalysisSettings::from_json_str(json).unwrap_err();
        assert!(matches!(err, CpkError::Config(_)));
    }

    #[test]
    fn rejects_inverted_scan_range() {
        let json = r#"{
            "scan": { "date_range": { "start": "2024-06-01", "end": "2024-05-01" } }
        }"#;
        let err = AnalysisSettings::from_json_str(json).unwrap_err();
        assert!(matches!(err, CpkError::Config(_)));

        let json = r#"{
            "scan": { "date_range": { "start": "2024-05-01", "end": "2024-05-01" } }
        }"#;
        let settings = AnalysisSettings::from_json_str(json).unwrap();
        assert!(settings.scan.date_range.is_some());
    }

    #[test]
    fn rejects_non_finite_target() {
        let config = CoefficientConfig {
            protein: f64::NAN,
            ..CoefficientConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
