//! Row adapters: turn fetched survey tables into typed, normalized submissions.

pub mod address;
pub mod normalize;
pub mod quantity;
pub mod similarity;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use vrec_core::{
    Cell, ColumnMapping, Dataset, EveningSubmission, MorningSubmission, NormalizedText, Row,
    StockField,
};

pub use address::{AddressCatalog, AddressMatcher};
pub use normalize::{NormalizerVocabulary, TextNormalizer};
pub use quantity::{QuantityError, QuantityExtractor, QuantityRuleSet, QuantityRuleSpec};

pub const CRATE_NAME: &str = "vrec-adapters";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid vocabulary pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Accepted spellings of the date and timestamp columns, tried in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    pub date_formats: Vec<String>,
    pub timestamp_formats: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            date_formats: vec!["%m/%d/%Y".into(), "%Y-%m-%d".into(), "%d.%m.%Y".into()],
            timestamp_formats: vec![
                "%m/%d/%Y %H:%M:%S".into(),
                "%Y-%m-%d %H:%M:%S".into(),
                "%Y-%m-%dT%H:%M:%S".into(),
                "%d.%m.%Y %H:%M:%S".into(),
            ],
        }
    }
}

impl ParseOptions {
    pub fn parse_date(&self, cell: &Cell) -> Option<NaiveDate> {
        let text = cell.to_text()?;
        let text = text.trim();
        self.date_formats
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
            .or_else(|| self.parse_timestamp_text(text).map(|ts| ts.date()))
    }

    pub fn parse_timestamp(&self, cell: &Cell) -> Option<NaiveDateTime> {
        let text = cell.to_text()?;
        let text = text.trim();
        self.parse_timestamp_text(text).or_else(|| {
            self.date_formats
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
    }

    fn parse_timestamp_text(&self, text: &str) -> Option<NaiveDateTime> {
        self.timestamp_formats
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
    }
}

/// A source row left out of matching, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRejection {
    pub row: usize,
    pub column: String,
    pub value: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch<T> {
    pub accepted: Vec<T>,
    pub rejected: Vec<RowRejection>,
}

/// Reads morning and evening tables through a column mapping.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionAdapter<'a> {
    mapping: &'a ColumnMapping,
    normalizer: &'a TextNormalizer,
    options: &'a ParseOptions,
}

impl<'a> SubmissionAdapter<'a> {
    pub fn new(
        mapping: &'a ColumnMapping,
        normalizer: &'a TextNormalizer,
        options: &'a ParseOptions,
    ) -> Self {
        Self {
            mapping,
            normalizer,
            options,
        }
    }

    pub fn morning(&self, dataset: &Dataset) -> RowBatch<MorningSubmission> {
        let cols = &self.mapping.morning;
        let mut batch = RowBatch {
            accepted: Vec::with_capacity(dataset.len()),
            rejected: Vec::new(),
        };
        for (idx, row) in dataset.iter().enumerate() {
            let date = match self.row_date(idx, row, &cols.date) {
                Ok(date) => date,
                Err(rejection) => {
                    batch.rejected.push(rejection);
                    continue;
                }
            };
            let employee = text_of(row, &cols.employee_name);
            let address = text_of(row, &cols.address);
            batch.accepted.push(MorningSubmission {
                row: idx,
                date,
                timestamp: row.get(&cols.timestamp).and_then(|c| self.options.parse_timestamp(c)),
                employee: NormalizedText {
                    normalized: self.normalizer.employee(&employee),
                    raw: employee,
                },
                city: text_of(row, &cols.city),
                network: text_of(row, &cols.network_name),
                address: NormalizedText {
                    normalized: self.normalizer.address(&address),
                    raw: address,
                },
                start_stock: self
                    .mapping
                    .products
                    .iter()
                    .map(|p| stock_field(row, &p.name, &p.morning_start))
                    .collect(),
            });
        }
        batch
    }

    pub fn evening(&self, dataset: &Dataset) -> RowBatch<EveningSubmission> {
        let cols = &self.mapping.evening;
        let mut batch = RowBatch {
            accepted: Vec::with_capacity(dataset.len()),
            rejected: Vec::new(),
        };
        for (idx, row) in dataset.iter().enumerate() {
            let date = match self.row_date(idx, row, &cols.date) {
                Ok(date) => date,
                Err(rejection) => {
                    batch.rejected.push(rejection);
                    continue;
                }
            };
            let employee = text_of(row, &cols.employee_name);
            let address = text_of(row, &cols.address);
            batch.accepted.push(EveningSubmission {
                row: idx,
                date,
                timestamp: row.get(&cols.timestamp).and_then(|c| self.options.parse_timestamp(c)),
                employee: NormalizedText {
                    normalized: self.normalizer.employee(&employee),
                    raw: employee,
                },
                city: text_of(row, &cols.city),
                network: text_of(row, &cols.network_name),
                address: NormalizedText {
                    normalized: self.normalizer.address(&address),
                    raw: address,
                },
                visitors: row.get(&cols.visitors).cloned(),
                end_stock: self
                    .mapping
                    .products
                    .iter()
                    .map(|p| stock_field(row, &p.name, &p.evening_end))
                    .collect(),
            });
        }
        batch
    }

    fn row_date(&self, idx: usize, row: &Row, column: &str) -> Result<NaiveDate, RowRejection> {
        let cell = row.get(column);
        cell.and_then(|c| self.options.parse_date(c))
            .ok_or_else(|| RowRejection {
                row: idx,
                column: column.to_string(),
                value: cell.and_then(Cell::to_text),
                reason: "unparseable date".to_string(),
            })
    }
}

fn text_of(row: &Row, column: &str) -> String {
    row.get(column)
        .and_then(Cell::to_text)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// A stock column missing from the row reads as an empty cell.
fn stock_field(row: &Row, product: &str, column: &str) -> StockField {
    StockField {
        product: product.to_string(),
        value: row.get(column).cloned().unwrap_or_default(),
    }
}

/// Rows whose timestamp parses and is strictly later than `since`.
pub fn rows_since(
    dataset: &Dataset,
    timestamp_column: &str,
    since: NaiveDateTime,
    options: &ParseOptions,
) -> Dataset {
    dataset
        .iter()
        .filter(|row| {
            row.get(timestamp_column)
                .and_then(|c| options.parse_timestamp(c))
                .is_some_and(|ts| ts > since)
        })
        .cloned()
        .collect::<Vec<_>>()
        .into()
}

/// Number of rows whose date column parses to `date`.
pub fn count_rows_on(dataset: &Dataset, date_column: &str, date: NaiveDate, options: &ParseOptions) -> usize {
    dataset
        .iter()
        .filter(|row| row.get(date_column).and_then(|c| options.parse_date(c)) == Some(date))
        .count()
}

/// Locale vocabulary for the normalizer, quantity chain and address catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Vocabulary {
    pub normalizer: NormalizerVocabulary,
    pub quantity: QuantityRuleSet,
    pub addresses: AddressCatalog,
}

impl Vocabulary {
    /// Load `rules/{normalizer,quantity,addresses}.yaml`; a missing file keeps the built-in default.
    pub fn from_workspace_root(root: &Path) -> Result<Self> {
        let rules_dir = root.join("rules");
        Ok(Self {
            normalizer: read_yaml_or_default(&rules_dir.join("normalizer.yaml"))?,
            quantity: read_yaml_or_default(&rules_dir.join("quantity.yaml"))?,
            addresses: read_yaml_or_default(&rules_dir.join("addresses.yaml"))?,
        })
    }
}

fn read_yaml_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    read_yaml_file(path)
}

fn read_yaml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

pub fn load_column_mapping(path: impl AsRef<Path>) -> Result<ColumnMapping> {
    read_yaml_file(path.as_ref())
}

/// A dataset stored as a JSON array of row objects.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_dataset(&data).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_dataset(json: &str) -> Result<Dataset> {
    Ok(serde_json::from_str(json)?)
}
