//! Table ingest: CSV files and polars frames into a [`RecordSet`].
//!
//! Everything is read as text first. Header names are trimmed, mapped
//! through the caller's rename map and then through the spreadsheet header
//! aliases in [`schema::aliases`]. Trait columns are parsed to `Float64`
//! with non-numeric text becoming null, never zero. Date columns are parsed
//! column-wise against the accepted formats; unmatched text becomes null.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use tracing::{debug, info};

use crate::error::CpkError;
use crate::record::{Field, PresentColumns, Record, RecordSet, Trait};
use crate::schema::{self, record};

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

// ── Entry points ────────────────────────────────────────────────────────────

/// Load a CSV file of quality records.
pub fn load_csv(
    path: impl AsRef<Path>,
    rename: Option<&HashMap<String, String>>,
) -> Result<RecordSet, CpkError> {
    let df = read_csv_as_strings(path.as_ref())?;
    let records = records_from_frame(df, rename)?;
    info!(
        path = %path.as_ref().display(),
        rows = records.len(),
        "loaded quality records"
    );
    Ok(records)
}

/// Convert a frame with record columns into a [`RecordSet`].
///
/// Accepts string-typed columns as well as already typed ones (numeric
/// traits, `Date` / `Datetime` dates).
pub fn records_from_frame(
    df: DataFrame,
    rename: Option<&HashMap<String, String>>,
) -> Result<RecordSet, CpkError> {
    if df.height() == 0 {
        return Err(CpkError::EmptyInput);
    }
    let df = canonicalize_headers(df, rename)?;
    let df = parse_trait_columns(df)?;
    let df = parse_date_columns(df)?;
    let has = |name: &str| df.column(name).is_ok();

    let mut columns = PresentColumns::default();
    for field in Field::ALL {
        columns.set_field(field, has(field.column()));
    }
    for t in Trait::ALL {
        columns.set_trait(t, has(t.column()));
    }
    columns.intake_date = has(record::INTAKE_DATE);
    columns.tag_date = has(record::TAG_DATE);

    let n = df.height();
    let mut records = vec![Record::default(); n];

    for field in Field::ALL {
        if let Some(values) = text_values(&df, field.column())? {
            for (record, value) in records.iter_mut().zip(values) {
                record.set_field(field, value);
            }
        }
    }
    for t in Trait::ALL {
        if columns.has_trait(t) {
            let values = df.column(t.column())?.f64()?;
            for (i, record) in records.iter_mut().enumerate() {
                record.set_trait(t, values.get(i).filter(|v| !v.is_nan()));
            }
        }
    }
    if let Some(dates) = datetime_values(&df, record::INTAKE_DATE)? {
        for (record, date) in records.iter_mut().zip(dates) {
            record.intake_date = date;
        }
    }
    if let Some(dates) = datetime_values(&df, record::TAG_DATE)? {
        for (record, date) in records.iter_mut().zip(dates) {
            record.tag_date = date;
        }
    }

    debug!(?columns, rows = n, "converted frame to records");
    Ok(RecordSet::new(records, columns))
}

// ── Frame preparation ───────────────────────────────────────────────────────

/// Read a CSV file with all columns as String dtype.
pub fn read_csv_as_strings(path: &Path) -> Result<DataFrame, CpkError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Trim header whitespace, apply the caller's rename map, then resolve
/// spreadsheet header aliases to canonical column names.
pub fn canonicalize_headers(
    mut df: DataFrame,
    rename: Option<&HashMap<String, String>>,
) -> Result<DataFrame, CpkError> {
    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();

    if let Some(map) = rename {
        if let Some(missing) = map.keys().find(|k| !trimmed.contains(k)) {
            return Err(CpkError::MissingColumn(missing.clone()));
        }
    }

    let canonical: Vec<String> = trimmed
        .into_iter()
        .map(|name| {
            let name = rename
                .and_then(|map| map.get(&name).cloned())
                .unwrap_or(name);
            match schema::aliases::canonical(&name) {
                Some(c) => c.to_string(),
                None => name,
            }
        })
        .collect();
    df.set_column_names(canonical.as_slice())?;
    Ok(df)
}

/// Parse every present trait column to Float64. Unparseable text becomes
/// null.
pub fn parse_trait_columns(df: DataFrame) -> Result<DataFrame, CpkError> {
    let mut exprs = Vec::new();
    for name in record::TRAITS {
        let Ok(column) = df.column(name) else {
            continue;
        };
        let expr = if column.dtype() == &DataType::String {
            col(name)
                .str()
                .strip_chars(lit(" \t\r\n"))
                .cast(DataType::Float64)
        } else {
            col(name).cast(DataType::Float64)
        };
        exprs.push(expr);
    }
    if exprs.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().with_columns(exprs).collect()?)
}

/// Parse every present date column to `Datetime`. Each accepted format is
/// tried in turn; text matching none of them becomes null.
pub fn parse_date_columns(df: DataFrame) -> Result<DataFrame, CpkError> {
    let mut exprs = Vec::new();
    for name in record::DATES {
        let Ok(column) = df.column(name) else {
            continue;
        };
        if matches!(column.dtype(), DataType::Datetime(..) | DataType::Date) {
            continue;
        }
        exprs.push(parse_datetime(name));
    }
    if exprs.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().with_columns(exprs).collect()?)
}

fn parse_datetime(name: &str) -> Expr {
    let text = || {
        col(name)
            .cast(DataType::String)
            .str()
            .strip_chars(lit(" \t\r\n"))
    };
    let timestamp = |format: &str| {
        text().str().to_datetime(
            Some(TimeUnit::Microseconds),
            None,
            lenient(format),
            lit("raise"),
        )
    };
    let date = |format: &str| {
        text()
            .str()
            .to_date(lenient(format))
            .cast(DataType::Datetime(TimeUnit::Microseconds, None))
    };

    let first = timestamp(DATETIME_FORMATS[0]);
    DATETIME_FORMATS[1..]
        .iter()
        .map(|f| timestamp(f))
        .chain(DATE_FORMATS.iter().map(|f| date(f)))
        .fold(first, |parsed, next| parsed.fill_null(next))
        .alias(name)
}

fn lenient(format: &str) -> StrptimeOptions {
    StrptimeOptions {
        format: Some(format.into()),
        strict: false,
        ..Default::default()
    }
}

// ── Column extraction ───────────────────────────────────────────────────────

fn text_values(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<String>>>, CpkError> {
    let Ok(column) = df.column(name) else {
        return Ok(None);
    };
    let casted = column.cast(&DataType::String)?;
    let values = casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string))
        .collect();
    Ok(Some(values))
}

fn datetime_values(
    df: &DataFrame,
    name: &str,
) -> Result<Option<Vec<Option<NaiveDateTime>>>, CpkError> {
    let Ok(column) = df.column(name) else {
        return Ok(None);
    };
    let micros = column
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
        .cast(&DataType::Int64)?;
    let values = micros
        .i64()?
        .into_iter()
        .map(|v| {
            v.and_then(DateTime::from_timestamp_micros)
                .map(|dt| dt.naive_utc())
        })
        .collect();
    Ok(Some(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDate;

    #[test]
    fn parses_common_timestamp_shapes() {
        let df = DataFrame::new(vec![Column::new(
            "intake_date".into(),
            &[
                "2024-03-05 07:45:00",
                " 2024/03/05 07:45:00 ",
                "2024-03-05",
                "not a date",
                "",
            ],
        )])
        .unwrap();
        let set = records_from_frame(df, None).unwrap();
        let dates: Vec<_> = set.iter().map(|r| r.intake_date).collect();

        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let expected = day.and_hms_opt(7, 45, 0);
        assert_eq!(
            dates,
            vec![expected, expected, day.and_hms_opt(0, 0, 0), None, None]
        );
    }

    #[test]
    fn typed_date_columns_pass_through() {
        let day = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let at = day.and_hms_opt(6, 30, 0).unwrap();
        let df = DataFrame::new(vec![
            Column::new("intake_date".into(), &[at]),
            Column::new("tag_date".into(), &[day]),
        ])
        .unwrap();
        let set = records_from_frame(df, None).unwrap();
        assert_eq!(set.records()[0].intake_date, Some(at));
        assert_eq!(set.records()[0].tag_date, day.and_hms_opt(0, 0, 0));
    }

    #[test]
    fn frame_with_aliases_and_bad_numbers() {
        let df = DataFrame::new(vec![
            Column::new("大区".into(), &["North", "North", "South"]),
            Column::new(" 奶源地名称 ".into(), &["Alder", "Alder", "Cedar"]),
            Column::new("入库日期".into(), &["2024-01-02 08:00:00", "bad", "2024-01-05"]),
            Column::new("脂肪".into(), &["3.1", "abc", " 3.4 "]),
        ])
        .unwrap();

        let set = records_from_frame(df, None).unwrap();
        let columns = set.columns();
        assert!(columns.has_field(Field::Region));
        assert!(columns.has_field(Field::FarmName));
        assert!(!columns.has_field(Field::SubRegion));
        assert!(columns.has_trait(Trait::Fat));
        assert!(!columns.has_trait(Trait::Acidity));
        assert!(columns.intake_date);

        let records = set.records();
        assert_eq!(records[0].trait_value(Trait::Fat), Some(3.1));
        assert_eq!(records[1].trait_value(Trait::Fat), None);
        assert_eq!(records[2].trait_value(Trait::Fat), Some(3.4));
        assert!(records[1].intake_date.is_none());
        assert_eq!(records[2].farm_name.as_deref(), Some("Cedar"));
    }

    #[test]
    fn typed_numeric_columns_pass_through() {
        let df = DataFrame::new(vec![
            Column::new("farm_name".into(), &["Alder", "Birch"]),
            Column::new("acidity".into(), &[Some(14.0f64), None]),
        ])
        .unwrap();
        let set = records_from_frame(df, None).unwrap();
        assert_eq!(set.records()[0].trait_value(Trait::Acidity), Some(14.0));
        assert_eq!(set.records()[1].trait_value(Trait::Acidity), None);
    }

    #[test]
    fn rename_map_must_name_existing_headers() {
        let df = DataFrame::new(vec![Column::new("Fat %".into(), &["3.2"])]).unwrap();
        let mut rename = HashMap::new();
        rename.insert("Fat %".to_string(), "fat".to_string());
        let set = records_from_frame(df.clone(), Some(&rename)).unwrap();
        assert_eq!(set.records()[0].trait_value(Trait::Fat), Some(3.2));

        let mut wrong = HashMap::new();
        wrong.insert("Protein %".to_string(), "protein".to_string());
        assert!(matches!(
            records_from_frame(df, Some(&wrong)),
            Err(CpkError::MissingColumn(_))
        ));
    }

    #[test]
    fn empty_frame_is_rejected() {
        let df = DataFrame::new(vec![Column::new("fat".into(), Vec::<String>::new())]).unwrap();
        assert!(matches!(records_from_frame(df, None), Err(CpkError::EmptyInput)));
    }
}
