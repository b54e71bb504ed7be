/// Column-name constants for dairy-cpk tables.
/// Single source of truth - shared by the loader, the output tables and the
/// Python exports.

// ── Record columns (canonical) ──────────────────────────────────────────────
pub mod record {
    pub const REGION: &str = "region";
    pub const SUB_REGION: &str = "sub_region";
    pub const LOCALITY: &str = "locality";
    pub const FARM_CODE: &str = "farm_code";
    pub const FARM_NAME: &str = "farm_name";
    pub const INTAKE_DATE: &str = "intake_date";
    pub const TAG_DATE: &str = "tag_date";

    pub const FAT: &str = "fat";
    pub const PROTEIN: &str = "protein";
    pub const DRY_MATTER: &str = "dry_matter";
    pub const ACIDITY: &str = "acidity";
    pub const SOMATIC_CELL: &str = "somatic_cell";

    pub const CATEGORICAL: [&str; 5] = [REGION, SUB_REGION, LOCALITY, FARM_CODE, FARM_NAME];
    pub const DATES: [&str; 2] = [INTAKE_DATE, TAG_DATE];
    pub const TRAITS: [&str; 5] = [FAT, PROTEIN, DRY_MATTER, ACIDITY, SOMATIC_CELL];
}

// ── Spreadsheet header aliases ──────────────────────────────────────────────
/// Headers used by the farm quality spreadsheet exports, mapped onto the
/// canonical record columns.
pub mod aliases {
    use super::record;

    pub const ALL: [(&str, &str); 12] = [
        ("大区", record::REGION),
        ("区域", record::SUB_REGION),
        ("地区", record::LOCALITY),
        ("奶源地编码", record::FARM_CODE),
        ("奶源地名称", record::FARM_NAME),
        ("入库日期", record::INTAKE_DATE),
        ("上号日期", record::TAG_DATE),
        ("脂肪", record::FAT),
        ("蛋白", record::PROTEIN),
        ("干物质", record::DRY_MATTER),
        ("酸度", record::ACIDITY),
        ("体细胞", record::SOMATIC_CELL),
    ];

    /// Canonical name for a header, if it is a known alias.
    pub fn canonical(header: &str) -> Option<&'static str> {
        ALL.iter()
            .find(|(alias, _)| *alias == header)
            .map(|(_, canonical)| *canonical)
    }
}

// ── Statistic labels ────────────────────────────────────────────────────────
pub mod statistic {
    pub const SIGMA: &str = "σ";
    pub const MEAN: &str = "mean";
    pub const PROCESS_DIFF: &str = "process_diff";
    pub const SIX_SIGMA: &str = "6σ";
    pub const THREE_SIGMA: &str = "3σ";
    pub const CPK: &str = "cpk";
    pub const TOLERANCE: &str = "tolerance";
    pub const CP: &str = "cp";

    pub const ALL: [&str; 8] = [
        SIGMA,
        MEAN,
        PROCESS_DIFF,
        SIX_SIGMA,
        THREE_SIGMA,
        CPK,
        TOLERANCE,
        CP,
    ];
}

// ── Output table columns ────────────────────────────────────────────────────
pub mod output {
    pub const ANALYSIS: &str = "analysis";
    pub const PERIOD: &str = "period";
    pub const SUB_REGION: &str = "sub_region";
    pub const LOCALITY: &str = "locality";
    pub const FARM: &str = "farm";
    pub const RECORD_COUNT: &str = "record_count";
    pub const STATUS_SUFFIX: &str = "status";

    /// Synthetic period label used when the records carry no intake date.
    pub const OVERALL_PERIOD: &str = "overall";
}

// ── Cell placeholders and verdict tags ──────────────────────────────────────
pub mod placeholder {
    /// No input data, or the value could not be computed.
    pub const ABSENT: &str = "-";
    /// The metric does not apply to this trait.
    pub const NOT_APPLICABLE: &str = "/";
}

pub mod status {
    pub const NORMAL: &str = "normal";
    pub const ABNORMAL: &str = "abnormal";
}

// ── Selector values ─────────────────────────────────────────────────────────
pub mod granularity {
    pub const MONTH: &str = "month";
    pub const QUARTER: &str = "quarter";
    pub const YEAR: &str = "year";
}

pub mod dimension {
    pub const REGION: &str = "region";
    pub const SUB_REGION: &str = "sub_region";
    pub const FARM: &str = "farm";
}

pub mod season {
    pub const SUMMER: &str = "summer";
    pub const WINTER: &str = "winter";
}
