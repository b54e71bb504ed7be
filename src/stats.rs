//! Per-trait process capability computation.
//!
//! [`compute`] is the single formula shared by the summary and detail
//! tables. All values are kept at full precision; rounding only happens
//! when a cell is rendered.

use crate::config::CoefficientConfig;
use crate::record::Trait;
use crate::schema::{placeholder, statistic};

/// Decimal places for rendered statistics.
pub const DECIMALS: usize = 3;
/// Decimal places for the rendered tolerance.
pub const TOLERANCE_DECIMALS: usize = 1;

// ── Statistics ──────────────────────────────────────────────────────────────

/// The eight statistics reported per (trait, group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    Sigma,
    Mean,
    ProcessDiff,
    SixSigma,
    ThreeSigma,
    Cpk,
    Tolerance,
    Cp,
}

impl Statistic {
    pub const ALL: [Statistic; 8] = [
        Statistic::Sigma,
        Statistic::Mean,
        Statistic::ProcessDiff,
        Statistic::SixSigma,
        Statistic::ThreeSigma,
        Statistic::Cpk,
        Statistic::Tolerance,
        Statistic::Cp,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Sigma => statistic::SIGMA,
            Self::Mean => statistic::MEAN,
            Self::ProcessDiff => statistic::PROCESS_DIFF,
            Self::SixSigma => statistic::SIX_SIGMA,
            Self::ThreeSigma => statistic::THREE_SIGMA,
            Self::Cpk => statistic::CPK,
            Self::Tolerance => statistic::TOLERANCE,
            Self::Cp => statistic::CP,
        }
    }

    /// Output column name for this statistic of `t`, e.g. `fat_cpk`.
    pub fn column(self, t: Trait) -> String {
        format!("{}_{}", t.column(), self.label())
    }

    fn decimals(self) -> usize {
        match self {
            Self::Tolerance => TOLERANCE_DECIMALS,
            _ => DECIMALS,
        }
    }
}

/// Conventional CPK grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpkGrade {
    /// CPK >= 1.33
    Excellent,
    /// 1.0 <= CPK < 1.33
    Acceptable,
    /// CPK < 1.0
    NeedsImprovement,
}

impl CpkGrade {
    pub fn of(cpk: f64) -> Self {
        if cpk >= 1.33 {
            Self::Excellent
        } else if cpk >= 1.0 {
            Self::Acceptable
        } else {
            Self::NeedsImprovement
        }
    }
}

// ── Capability row ──────────────────────────────────────────────────────────

/// Full-precision capability statistics of one trait sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapabilityRow {
    pub n: usize,
    pub sigma: f64,
    pub mean: f64,
    pub process_diff: f64,
    pub six_sigma: f64,
    pub three_sigma: f64,
    pub cpk: f64,
    pub tolerance: Option<f64>,
    pub cp: Option<f64>,
}

impl CapabilityRow {
    pub fn get(&self, stat: Statistic) -> Option<f64> {
        match stat {
            Statistic::Sigma => Some(self.sigma),
            Statistic::Mean => Some(self.mean),
            Statistic::ProcessDiff => Some(self.process_diff),
            Statistic::SixSigma => Some(self.six_sigma),
            Statistic::ThreeSigma => Some(self.three_sigma),
            Statistic::Cpk => Some(self.cpk),
            Statistic::Tolerance => self.tolerance,
            Statistic::Cp => self.cp,
        }
    }

    pub fn grade(&self) -> CpkGrade {
        CpkGrade::of(self.cpk)
    }

    fn is_finite(&self) -> bool {
        [
            self.sigma,
            self.mean,
            self.process_diff,
            self.six_sigma,
            self.three_sigma,
            self.cpk,
        ]
        .iter()
        .chain(self.tolerance.iter())
        .chain(self.cp.iter())
        .all(|v| v.is_finite())
    }
}

/// Outcome of the capability computation for one (trait, group).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraitResult {
    /// Fewer than two values: the n-1 estimator is undefined.
    NoData,
    /// The inputs produced a non-finite statistic.
    NotComputable,
    Computed(CapabilityRow),
}

impl TraitResult {
    pub fn row(&self) -> Option<&CapabilityRow> {
        match self {
            Self::Computed(row) => Some(row),
            _ => None,
        }
    }

    /// CPK as it is reported, rounded to [`DECIMALS`] places.
    pub fn reported_cpk(&self) -> Option<f64> {
        self.row().map(|row| reported(row.cpk, DECIMALS))
    }

    /// Rendered cell for one statistic.
    pub fn cell(&self, stat: Statistic) -> String {
        match self {
            Self::Computed(row) => match row.get(stat) {
                Some(value) => format_value(value, stat.decimals()),
                None => placeholder::NOT_APPLICABLE.to_string(),
            },
            Self::NoData | Self::NotComputable => placeholder::ABSENT.to_string(),
        }
    }
}

// ── Computation ─────────────────────────────────────────────────────────────

/// Capability statistics for the non-missing `sample` of trait `t`.
pub fn compute(t: Trait, sample: &[f64], config: &CoefficientConfig) -> TraitResult {
    let n = sample.len();
    if n < 2 {
        return TraitResult::NoData;
    }

    let first = sample[0];
    let (mean, sigma) = if sample.iter().all(|v| *v == first) {
        // constant sample: exact zero spread, no summation residue
        (first, 0.0)
    } else {
        let mean = sample.iter().sum::<f64>() / n as f64;
        let sum_sq: f64 = sample.iter().map(|v| (v - mean) * (v - mean)).sum();
        (mean, (sum_sq / (n - 1) as f64).sqrt())
    };

    let (process_diff, tolerance) = match config.target(t) {
        Some(target) => ((mean - target).abs(), None),
        None => (
            (mean - config.acidity_min).min(config.acidity_max - mean),
            Some(config.acidity_tolerance).filter(|tol| *tol != 0.0),
        ),
    };

    let six_sigma = sigma * 6.0;
    let three_sigma = sigma * 3.0;
    let cpk = if three_sigma > 0.0 {
        process_diff / three_sigma
    } else {
        0.0
    };
    let cp = match tolerance {
        Some(tol) if six_sigma > 0.0 => Some(tol / six_sigma),
        _ => None,
    };

    let row = CapabilityRow {
        n,
        sigma,
        mean,
        process_diff,
        six_sigma,
        three_sigma,
        cpk,
        tolerance,
        cp,
    };
    if row.is_finite() {
        TraitResult::Computed(row)
    } else {
        TraitResult::NotComputable
    }
}

pub fn format_value(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}")
}

/// The value a reader sees after rendering with `decimals` places.
pub fn reported(value: f64, decimals: usize) -> f64 {
    format_value(value, decimals).parse().unwrap_or(value)
}
