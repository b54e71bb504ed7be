use std::fs;

use approx::assert_relative_eq;
use chrono::NaiveDate;
use polars::prelude::*;
use tempfile::TempDir;

use dairy_cpk::{
    AnalysisSettings, ClassificationRule, CpkModel, DateRange, Dimension, Granularity, Period,
    ScanSettings, Selectors, Statistic, Trait, TraitResult, Verdict,
};

const QUALITY_CSV: &str = "\
大区,区域,地区,奶源地名称,入库日期,脂肪,蛋白
North,N1,Vale,Alder,2024-01-05 08:00:00,3.0,3.5
North,N1,Vale,Alder,2024-01-12 08:00:00,3.4,3.6
North,N1,Vale,Alder,2024-02-03 08:00:00,3.9,3.5
North,N1,Vale,Alder,2024-02-10 08:00:00,4.1,3.6
South,S1,Hill,Birch,2024-01-06 08:00:00,4.0,3.5
South,S1,Hill,Birch,2024-01-13 08:00:00,4.2,3.6
South,S1,Hill,Birch,2024-01-20 08:00:00,4.4,3.7
";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn loaded_model() -> (TempDir, CpkModel) {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("quality.csv"), QUALITY_CSV).unwrap();
    let mut model = CpkModel::new(dir.path());
    let rows = model.load_csv("quality.csv", None).unwrap().len();
    assert_eq!(rows, 7);
    (dir, model)
}

fn region_scan(granularity: Granularity) -> ScanSettings {
    ScanSettings {
        granularity,
        dimension: Dimension::Region,
        date_range: None,
    }
}

#[test]
fn summary_over_complete_data_set() {
    let (_dir, model) = loaded_model();
    let summary = model.summary().unwrap();
    assert_eq!(summary.record_count, 7);

    let fat = summary.result(Trait::Fat).row().unwrap();
    assert_eq!(fat.n, 7);
    assert_relative_eq!(fat.mean, 3.857_142_857, epsilon = 1e-8);
    assert_eq!(summary.result(Trait::DryMatter), &TraitResult::NoData);

    let df = summary.to_frame().unwrap();
    assert_eq!(df.shape(), (8, 6));
    let dry = df.column("dry_matter").unwrap();
    assert_eq!(dry.str().unwrap().get(0), Some("-"));
    let tolerance_row = Statistic::ALL
        .iter()
        .position(|s| *s == Statistic::Tolerance)
        .unwrap();
    let protein = df.column("protein").unwrap();
    assert_eq!(protein.str().unwrap().get(tolerance_row), Some("/"));
}

#[test]
fn selection_narrows_the_report() {
    let (_dir, mut model) = loaded_model();
    model.set_selection(Selectors::new().with_regions(["North"]));
    let summary = model.summary().unwrap();
    assert_eq!(summary.record_count, 4);

    model.set_selection(
        Selectors::new()
            .with_regions(["North"])
            .with_date_range(DateRange::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap()),
    );
    let summary = model.summary().unwrap();
    assert_eq!(summary.record_count, 2);
    assert_eq!(summary.result(Trait::Fat).reported_cpk(), Some(0.0));
}

#[test]
fn detail_rows_are_sorted_by_period_then_sub_region() {
    let (_dir, model) = loaded_model();
    let detail = model.detail(Granularity::Month).unwrap();
    assert_eq!(detail.len(), 3);

    let keys: Vec<(String, &str, &str)> = detail
        .rows
        .iter()
        .map(|r| (r.key.period.to_string(), r.key.sub_region.as_str(), r.key.farm.as_str()))
        .collect();
    assert_eq!(
        keys,
        vec![
            ("2024-01".to_string(), "N1", "Alder"),
            ("2024-01".to_string(), "S1", "Birch"),
            ("2024-02".to_string(), "N1", "Alder"),
        ]
    );
    assert_eq!(detail.rows[1].record_count, 3);

    let df = detail.to_frame().unwrap();
    assert_eq!(df.shape(), (3, 5 + 5 * 8));
    let cpk = df.column("fat_cpk").unwrap();
    assert_eq!(cpk.str().unwrap().get(1), Some("1.667"));
}

#[test]
fn quarter_detail_merges_months() {
    let (_dir, model) = loaded_model();
    let detail = model.detail(Granularity::Quarter).unwrap();
    assert_eq!(detail.len(), 2);
    assert_eq!(
        detail.rows[0].key.period,
        Period::Quarter {
            year: 2024,
            quarter: 1
        }
    );
    assert_eq!(detail.rows[0].record_count, 4);
}

#[test]
fn region_scan_flags_low_cpk_cells() {
    let (_dir, mut model) = loaded_model();
    model.set_scan(region_scan(Granularity::Month)).unwrap();
    let table = model.scan().unwrap();
    assert_eq!(table.cells_scanned, 3);
    assert_eq!(table.len(), 1);

    let row = &table.rows[0];
    assert_eq!(row.value, "North");
    assert_eq!(row.period.to_string(), "2024-01");
    assert_eq!(row.verdict(Trait::Fat), Verdict::Abnormal);
    assert_eq!(row.verdict(Trait::Protein), Verdict::Normal);
    assert_eq!(row.verdict(Trait::Acidity), Verdict::Unclassified);

    let df = table.to_frame().unwrap();
    assert_eq!(df.shape(), (1, 3 + 10));
    let status = df.column("fat_status").unwrap();
    assert_eq!(status.str().unwrap().get(0), Some("abnormal"));
    let acidity = df.column("acidity_cpk").unwrap();
    assert_eq!(acidity.str().unwrap().get(0), Some("-"));
}

#[test]
fn quarter_scan_pools_the_region() {
    let (_dir, mut model) = loaded_model();
    model.set_scan(region_scan(Granularity::Quarter)).unwrap();
    let table = model.scan().unwrap();
    assert_eq!(table.cells_scanned, 2);
    assert_eq!(table.len(), 1);
    assert_eq!(table.rows[0].value, "North");
    assert_eq!(table.rows[0].cpk(Trait::Fat), Some(0.268));
}

#[test]
fn scan_ignores_the_interactive_selection() {
    let (_dir, mut model) = loaded_model();
    model.set_scan(region_scan(Granularity::Month)).unwrap();
    let unrestricted = model.scan().unwrap();

    model.set_selection(Selectors::new().with_regions(["South"]));
    assert_eq!(model.summary().unwrap().record_count, 3);
    let selected = model.scan().unwrap();

    assert_eq!(unrestricted, selected);
}

#[test]
fn scan_date_range_limits_the_cells() {
    let (_dir, mut model) = loaded_model();
    model.set_scan(ScanSettings {
        date_range: Some(DateRange::new(date(2024, 2, 1), date(2024, 2, 29)).unwrap()),
        ..region_scan(Granularity::Month)
    })
    .unwrap();
    let table = model.scan().unwrap();
    assert_eq!(table.cells_scanned, 1);
    assert!(table.is_empty());
}

#[test]
fn default_scan_groups_by_sub_region() {
    let (_dir, model) = loaded_model();
    assert_eq!(model.settings().scan.dimension, Dimension::SubRegion);
    let table = model.scan().unwrap();
    assert_eq!(table.dimension, Dimension::SubRegion);
    assert_eq!(table.cells_scanned, 3);
    assert_eq!(table.len(), 1);

    let row = &table.rows[0];
    assert_eq!(row.value, "N1");
    assert_eq!(row.period.to_string(), "2024-01");
    assert_eq!(row.record_count, 2);
    assert_eq!(row.verdict(Trait::Fat), Verdict::Abnormal);
    assert!(row.sub_region.is_none());

    let df = table.to_frame().unwrap();
    let names: Vec<&str> = df
        .get_column_names_str()
        .into_iter()
        .take(4)
        .collect();
    assert_eq!(names, vec!["period", "sub_region", "record_count", "fat_cpk"]);
    let sub_regions = df.column("sub_region").unwrap();
    assert_eq!(sub_regions.str().unwrap().get(0), Some("N1"));
}

#[test]
fn farm_scan_carries_sub_region_and_locality() {
    let (_dir, mut model) = loaded_model();
    model.set_scan(ScanSettings {
        granularity: Granularity::Month,
        dimension: Dimension::Farm,
        date_range: None,
    })
    .unwrap();
    let table = model.scan().unwrap();
    assert_eq!(table.len(), 1);
    let row = &table.rows[0];
    assert_eq!(row.value, "Alder");
    assert_eq!(row.sub_region.as_deref(), Some("N1"));
    assert_eq!(row.locality.as_deref(), Some("Vale"));

    let df = table.to_frame().unwrap();
    let names: Vec<&str> = df
        .get_column_names_str()
        .into_iter()
        .take(5)
        .collect();
    assert_eq!(
        names,
        vec!["period", "farm", "sub_region", "locality", "record_count"]
    );
}

#[test]
fn band_rule_flags_high_cpk_as_well() {
    let (_dir, mut model) = loaded_model();
    model.set_scan(region_scan(Granularity::Month)).unwrap();
    model
        .set_rule(ClassificationRule::outside(0.5, 1.5).unwrap())
        .unwrap();
    let table = model.scan().unwrap();
    // North-01 is below the band, the other cells exceed it.
    assert_eq!(table.len(), 3);
}

#[test]
fn settings_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(
        &path,
        r#"{ "coefficients": { "fat": 3.4 }, "rule": { "kind": "below", "threshold": 2.0 } }"#,
    )
    .unwrap();

    let settings = AnalysisSettings::from_json_file(&path).unwrap();
    assert_eq!(settings.coefficients.fat, 3.4);
    assert_eq!(settings.rule, ClassificationRule::below(2.0));
    assert_eq!(settings.scan.dimension, Dimension::SubRegion);
}

#[test]
fn sigma_matches_polars_sample_std() {
    let values = [3.0, 3.4, 3.9, 4.1, 4.0, 4.2, 4.4];
    let expected = Series::new("fat".into(), &values)
        .f64()
        .unwrap()
        .std(1)
        .unwrap();

    let (_dir, model) = loaded_model();
    let summary = model.summary().unwrap();
    let fat = summary.result(Trait::Fat).row().unwrap();
    assert_relative_eq!(fat.sigma, expected, epsilon = 1e-12);
}
