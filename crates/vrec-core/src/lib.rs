//! Core domain model for VREC: tabular inputs, column mapping, submissions and reports.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "vrec-core";

/// A single spreadsheet cell as handed over by the fetching collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Number(n) => n.is_nan(),
            Self::Text(s) => s.trim().is_empty(),
        }
    }

    /// Render the cell as text; integral numbers print without a fractional part.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Number(n) if n.is_nan() => None,
            Self::Number(n) if n.is_finite() && n.fract() == 0.0 => Some(format!("{}", *n as i64)),
            Self::Number(n) => Some(n.to_string()),
            Self::Text(s) => Some(s.clone()),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

/// One record of a tabular dataset, keyed by column header.
pub type Row = BTreeMap<String, Cell>;

/// A homogeneous, already-fetched table (one survey feed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Dataset {
    pub rows: Vec<Row>,
}

impl Dataset {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }
}

impl From<Vec<Row>> for Dataset {
    fn from(rows: Vec<Row>) -> Self {
        Self::new(rows)
    }
}

fn default_timestamp_column() -> String {
    "Timestamp".to_string()
}

/// Caller-supplied mapping from logical fields to column headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub morning: MorningColumns,
    pub evening: EveningColumns,
    #[serde(default)]
    pub products: Vec<ProductColumns>,
}

impl ColumnMapping {
    pub fn product_names(&self) -> Vec<String> {
        self.products.iter().map(|p| p.name.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorningColumns {
    #[serde(default = "default_timestamp_column")]
    pub timestamp: String,
    pub employee_name: String,
    pub city: String,
    pub network_name: String,
    pub address: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EveningColumns {
    #[serde(default = "default_timestamp_column")]
    pub timestamp: String,
    pub employee_name: String,
    pub city: String,
    pub network_name: String,
    pub address: String,
    pub date: String,
    pub visitors: String,
}

/// Start-of-day and end-of-day stock columns for one tracked product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductColumns {
    pub name: String,
    pub morning_start: String,
    pub evening_end: String,
}

/// Raw free text alongside its normalized, comparable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NormalizedText {
    pub raw: String,
    pub normalized: String,
}

/// Raw stock cell for one tracked product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockField {
    pub product: String,
    pub value: Cell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorningSubmission {
    pub row: usize,
    pub date: NaiveDate,
    pub timestamp: Option<NaiveDateTime>,
    pub employee: NormalizedText,
    pub city: String,
    pub network: String,
    pub address: NormalizedText,
    pub start_stock: Vec<StockField>,
}

impl MorningSubmission {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(self.date, &self.employee.normalized, &self.address.normalized)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EveningSubmission {
    pub row: usize,
    pub date: NaiveDate,
    pub timestamp: Option<NaiveDateTime>,
    pub employee: NormalizedText,
    pub city: String,
    pub network: String,
    pub address: NormalizedText,
    /// `None` when the visitor column is missing from the row altogether.
    pub visitors: Option<Cell>,
    pub end_stock: Vec<StockField>,
}

/// Dedup identity of a visit: date + normalized employee + normalized address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn new(date: NaiveDate, employee: &str, address: &str) -> Self {
        Self(format!("{date}_{employee}_{address}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSales {
    pub product: String,
    pub start: u32,
    pub end: u32,
    pub sold: u32,
}

impl ProductSales {
    /// `sold` is clamped at zero when more stock is left than was counted in the morning.
    pub fn new(product: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            product: product.into(),
            start,
            end,
            sold: start.saturating_sub(end),
        }
    }
}

/// One reconciled visit: an accepted morning/evening pair turned into sales metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedReport {
    pub identity_key: IdentityKey,
    pub date: NaiveDate,
    pub city: String,
    pub network: String,
    pub employee: String,
    pub address: String,
    pub normalized_address: String,
    pub visitors: u32,
    pub products: Vec<ProductSales>,
    pub total_sold: u64,
    pub conversion: f64,
    pub stock_factor: f64,
    pub efficiency: f64,
    pub match_score: f64,
    pub morning_row: usize,
    pub evening_row: usize,
}

/// Winner of one leaderboard dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leader {
    pub name: String,
    pub total_sold: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionStats {
    pub name: String,
    pub stores: usize,
    pub total_sold: u64,
    pub visitors: u64,
    pub average_efficiency: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTotal {
    pub product: String,
    pub sold: u64,
}

/// Roll-up of many matched reports, typically one reporting day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub best_city: Leader,
    pub best_network: Leader,
    pub best_employee: Leader,
    pub best_product: Option<Leader>,
    pub total_stores: usize,
    pub expected_reports: usize,
    pub actual_reports: usize,
    pub missing_reports: i64,
    pub total_sold: u64,
    pub total_visitors: u64,
    pub average_efficiency: f64,
    pub cities: Vec<DimensionStats>,
    pub networks: Vec<DimensionStats>,
    pub products: Vec<ProductTotal>,
}

/// Round half away from zero to one decimal place.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sold_never_goes_negative() {
        assert_eq!(ProductSales::new("a", 10, 2).sold, 8);
        assert_eq!(ProductSales::new("a", 3, 7).sold, 0);
        assert_eq!(ProductSales::new("a", 0, 0).sold, 0);
    }

    #[test]
    fn identity_key_joins_fingerprint_parts() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 31).unwrap();
        let key = IdentityKey::new(date, "анна иванова", "10 ленина москва");
        assert_eq!(key.as_str(), "2025-10-31_анна иванова_10 ленина москва");
    }

    #[test]
    fn cells_deserialize_from_sheet_json() {
        let rows: Dataset = serde_json::from_str(
            r#"[{"a": "text", "b": 12, "c": null, "d": 2.5}]"#,
        )
        .unwrap();
        let row = &rows.rows[0];
        assert_eq!(row["a"], Cell::text("text"));
        assert_eq!(row["b"], Cell::Number(12.0));
        assert_eq!(row["c"], Cell::Empty);
        assert_eq!(row["d"].to_text().as_deref(), Some("2.5"));
        assert_eq!(row["b"].to_text().as_deref(), Some("12"));
    }

    #[test]
    fn blank_cells() {
        assert!(Cell::Empty.is_blank());
        assert!(Cell::text("   ").is_blank());
        assert!(Cell::Number(f64::NAN).is_blank());
        assert!(!Cell::Number(0.0).is_blank());
    }

    #[test]
    fn rounding_to_tenth() {
        assert_eq!(round_to_tenth(180.0), 180.0);
        assert_eq!(round_to_tenth(33.333), 33.3);
        assert_eq!(round_to_tenth(66.66), 66.7);
    }
}
