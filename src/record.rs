//! Typed quality records and the record set they are loaded into.
//!
//! Every column of the source table is optional. Which columns existed is
//! captured once, at load time, in [`PresentColumns`]; grouping and
//! aggregation branch on that set rather than probing individual rows.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::CpkError;
use crate::schema::{dimension, record};

// ── Traits ──────────────────────────────────────────────────────────────────

/// A measured milk quality trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Trait {
    Fat,
    Protein,
    DryMatter,
    Acidity,
    SomaticCell,
}

impl Trait {
    /// All traits in report column order.
    pub const ALL: [Trait; 5] = [
        Trait::Fat,
        Trait::Protein,
        Trait::DryMatter,
        Trait::Acidity,
        Trait::SomaticCell,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::Fat => 0,
            Self::Protein => 1,
            Self::DryMatter => 2,
            Self::Acidity => 3,
            Self::SomaticCell => 4,
        }
    }

    /// Column name, used both for input records and output tables.
    pub fn column(self) -> &'static str {
        record::TRAITS[self.index()]
    }
}

impl fmt::Display for Trait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

// ── Categorical fields ──────────────────────────────────────────────────────

/// A categorical record attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Region,
    SubRegion,
    Locality,
    FarmCode,
    FarmName,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Region,
        Field::SubRegion,
        Field::Locality,
        Field::FarmCode,
        Field::FarmName,
    ];

    fn index(self) -> usize {
        match self {
            Self::Region => 0,
            Self::SubRegion => 1,
            Self::Locality => 2,
            Self::FarmCode => 3,
            Self::FarmName => 4,
        }
    }

    pub fn column(self) -> &'static str {
        record::CATEGORICAL[self.index()]
    }

    pub fn value(self, record: &Record) -> Option<&str> {
        let value = match self {
            Self::Region => &record.region,
            Self::SubRegion => &record.sub_region,
            Self::Locality => &record.locality,
            Self::FarmCode => &record.farm_code,
            Self::FarmName => &record.farm_name,
        };
        value.as_deref()
    }
}

/// Grouping dimension of the abnormality scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Region,
    #[default]
    SubRegion,
    Farm,
}

impl Dimension {
    pub fn field(self) -> Field {
        match self {
            Self::Region => Field::Region,
            Self::SubRegion => Field::SubRegion,
            Self::Farm => Field::FarmName,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Region => dimension::REGION,
            Self::SubRegion => dimension::SUB_REGION,
            Self::Farm => dimension::FARM,
        }
    }
}

impl FromStr for Dimension {
    type Err = CpkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            dimension::REGION => Ok(Self::Region),
            dimension::SUB_REGION => Ok(Self::SubRegion),
            dimension::FARM => Ok(Self::Farm),
            other => Err(CpkError::Config(format!(
                "Invalid dimension: '{}'. Must be 'region', 'sub_region' or 'farm'",
                other
            ))),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Record ──────────────────────────────────────────────────────────────────

/// One milk quality sample.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub region: Option<String>,
    pub sub_region: Option<String>,
    pub locality: Option<String>,
    pub farm_code: Option<String>,
    pub farm_name: Option<String>,
    pub intake_date: Option<NaiveDateTime>,
    pub tag_date: Option<NaiveDateTime>,
    traits: [Option<f64>; 5],
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trait_value(&self, t: Trait) -> Option<f64> {
        self.traits[t.index()]
    }

    pub fn set_trait(&mut self, t: Trait, value: Option<f64>) {
        self.traits[t.index()] = value;
    }

    pub fn set_field(&mut self, field: Field, value: Option<String>) {
        let slot = match field {
            Field::Region => &mut self.region,
            Field::SubRegion => &mut self.sub_region,
            Field::Locality => &mut self.locality,
            Field::FarmCode => &mut self.farm_code,
            Field::FarmName => &mut self.farm_name,
        };
        *slot = value;
    }

    pub fn with_field(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set_field(field, Some(value.into()));
        self
    }

    pub fn with_trait(mut self, t: Trait, value: f64) -> Self {
        self.set_trait(t, Some(value));
        self
    }

    pub fn with_intake_date(mut self, date: NaiveDateTime) -> Self {
        self.intake_date = Some(date);
        self
    }
}

/// Non-missing values of one trait across a group of records.
pub fn trait_sample<'a, I>(records: I, t: Trait) -> Vec<f64>
where
    I: IntoIterator<Item = &'a Record>,
{
    records
        .into_iter()
        .filter_map(|r| r.trait_value(t))
        .collect()
}

// ── Column presence ─────────────────────────────────────────────────────────

/// The set of columns that existed in the loaded table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PresentColumns {
    fields: [bool; 5],
    traits: [bool; 5],
    pub intake_date: bool,
    pub tag_date: bool,
}

impl PresentColumns {
    pub fn all() -> Self {
        Self {
            fields: [true; 5],
            traits: [true; 5],
            intake_date: true,
            tag_date: true,
        }
    }

    /// Presence inferred from records: a column counts as present when at
    /// least one record carries a value for it.
    pub fn infer(records: &[Record]) -> Self {
        let mut present = Self::default();
        for r in records {
            for field in Field::ALL {
                present.fields[field.index()] |= field.value(r).is_some();
            }
            for t in Trait::ALL {
                present.traits[t.index()] |= r.trait_value(t).is_some();
            }
            present.intake_date |= r.intake_date.is_some();
            present.tag_date |= r.tag_date.is_some();
        }
        present
    }

    pub fn has_field(&self, field: Field) -> bool {
        self.fields[field.index()]
    }

    pub fn has_trait(&self, t: Trait) -> bool {
        self.traits[t.index()]
    }

    pub fn set_field(&mut self, field: Field, present: bool) {
        self.fields[field.index()] = present;
    }

    pub fn set_trait(&mut self, t: Trait, present: bool) {
        self.traits[t.index()] = present;
    }
}

// ── Record set ──────────────────────────────────────────────────────────────

/// An immutable table of records together with its column presence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSet {
    records: Vec<Record>,
    columns: PresentColumns,
}

impl RecordSet {
    pub fn new(records: Vec<Record>, columns: PresentColumns) -> Self {
        Self { records, columns }
    }

    /// Build a set whose column presence is inferred from the records.
    pub fn from_records(records: Vec<Record>) -> Self {
        let columns = PresentColumns::infer(&records);
        Self { records, columns }
    }

    /// A new set over `records` that keeps this set's column presence.
    pub fn derive(&self, records: Vec<Record>) -> Self {
        Self {
            records,
            columns: self.columns,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn columns(&self) -> &PresentColumns {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_presence_from_any_record() {
        let records = vec![
            Record::new().with_field(Field::Region, "North"),
            Record::new().with_trait(Trait::Acidity, 14.2),
        ];
        let columns = PresentColumns::infer(&records);
        assert!(columns.has_field(Field::Region));
        assert!(!columns.has_field(Field::SubRegion));
        assert!(columns.has_trait(Trait::Acidity));
        assert!(!columns.has_trait(Trait::Fat));
        assert!(!columns.intake_date);
    }

    #[test]
    fn sample_skips_missing_values() {
        let records = vec![
            Record::new().with_trait(Trait::Fat, 3.1),
            Record::new(),
            Record::new().with_trait(Trait::Fat, 3.3),
        ];
        assert_eq!(trait_sample(&records, Trait::Fat), vec![3.1, 3.3]);
        assert!(trait_sample(&records, Trait::Protein).is_empty());
    }

    #[test]
    fn farm_dimension_groups_on_farm_name() {
        assert_eq!(Dimension::Farm.field(), Field::FarmName);
        assert_eq!("sub-region".parse::<Dimension>().unwrap(), Dimension::SubRegion);
    }
}
