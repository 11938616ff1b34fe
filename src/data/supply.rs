use serde::Serialize;

use super::html::HtmlTable;
use crate::error::{Error, Result};

/// Supply table columns read by the analysis.
pub const SITE_ID_COLUMN: &str = "Credit Site ID";
pub const GHU_COLUMN: &str = "GHU";
pub const LT_COLUMN: &str = "LT";

/// A single supply table cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Parses scraped cell text, treating `1,204.5` and `$12.00` as numbers.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        let numeric: String = trimmed
            .chars()
            .filter(|c| *c != ',' && *c != '$')
            .collect();
        match numeric.parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(trimmed.to_string()),
        }
    }

    /// Numeric value, or `None` for text and empty cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(t) => match Cell::parse(t) {
                Cell::Number(n) => Some(n),
                _ => None,
            },
            Cell::Empty => None,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) => n.to_string(),
            Cell::Text(t) => t.clone(),
        }
    }
}

/// Credit supply listed on the register for one CMA.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SupplyTable {
    pub cma: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl SupplyTable {
    pub fn new(cma: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            cma: cma.into(),
            headers,
            rows,
        }
    }

    /// Converts scraped cell text, parsing numbers with `Cell::parse`.
    pub fn from_html(cma: &str, table: HtmlTable) -> Self {
        let rows = table
            .rows
            .iter()
            .map(|r| r.iter().map(|c| Cell::parse(c)).collect())
            .collect();
        Self::new(cma, table.headers, rows)
    }

    fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::MissingColumn {
                table: self.cma.clone(),
                column: name.to_string(),
            })
    }

    /// Sum of a numeric column. Non-numeric cells count as zero.
    ///
    /// An empty table has nothing to sum and yields zero even when the
    /// column is absent.
    pub fn column_sum(&self, name: &str) -> Result<f64> {
        if self.rows.is_empty() {
            return Ok(0.0);
        }
        let idx = self.column(name)?;
        Ok(self
            .rows
            .iter()
            .filter_map(|r| r.get(idx).and_then(Cell::as_f64))
            .sum())
    }

    /// Sum of `value_col` over rows whose `key_col` (trimmed) is in `keys`.
    pub fn sum_where(&self, value_col: &str, key_col: &str, keys: &[String]) -> Result<f64> {
        if self.rows.is_empty() || keys.is_empty() {
            return Ok(0.0);
        }
        let value_idx = self.column(value_col)?;
        let key_idx = self.column(key_col)?;
        Ok(self
            .rows
            .iter()
            .filter(|r| {
                r.get(key_idx)
                    .map(|k| {
                        let k = k.as_text();
                        keys.iter().any(|want| want.trim() == k.trim())
                    })
                    .unwrap_or(false)
            })
            .filter_map(|r| r.get(value_idx).and_then(Cell::as_f64))
            .sum())
    }
}

/// Supply tables for every CMA, in the order they were collected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupplyBook {
    pub tables: Vec<SupplyTable>,
}

impl SupplyBook {
    /// The table for `cma`, matched by exact name.
    pub fn get(&self, cma: &str) -> Option<&SupplyTable> {
        self.tables.iter().find(|t| t.cma == cma)
    }

    pub fn push(&mut self, table: SupplyTable) {
        self.tables.push(table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SupplyTable {
        SupplyTable::new(
            "West Gippsland",
            vec!["Credit Site ID".into(), "GHU".into(), "LT".into()],
            vec![
                vec![Cell::parse("BBA-3049"), Cell::parse("10.5"), Cell::parse("2")],
                vec![Cell::parse("BBA-9999"), Cell::parse("1,000"), Cell::parse("")],
                vec![Cell::parse("BBA-2845 "), Cell::parse("4"), Cell::parse("1")],
            ],
        )
    }

    #[test]
    fn test_cell_parse() {
        assert_eq!(Cell::parse("  "), Cell::Empty);
        assert_eq!(Cell::parse("$1,250.50"), Cell::Number(1250.5));
        assert_eq!(Cell::parse("BBA-0277"), Cell::Text("BBA-0277".into()));
        assert_eq!(Cell::parse("NaN"), Cell::Text("NaN".into()));
    }

    #[test]
    fn test_column_sums() {
        let t = table();
        assert_eq!(t.column_sum("GHU").unwrap(), 1014.5);
        assert_eq!(t.column_sum("lt").unwrap(), 3.0);
        assert!(matches!(
            t.column_sum("SBV"),
            Err(Error::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_sum_where_compares_trimmed_ids() {
        let t = table();
        let sites = vec!["BBA-3049".to_string(), "BBA-2845".to_string()];
        assert_eq!(t.sum_where("GHU", SITE_ID_COLUMN, &sites).unwrap(), 14.5);
        assert_eq!(t.sum_where("GHU", SITE_ID_COLUMN, &[]).unwrap(), 0.0);
    }

    #[test]
    fn test_empty_table_has_no_supply() {
        let t = SupplyTable::new("Mallee", vec![], vec![]);
        assert_eq!(t.column_sum("GHU").unwrap(), 0.0);
        assert_eq!(
            t.sum_where("GHU", SITE_ID_COLUMN, &["X".to_string()]).unwrap(),
            0.0
        );
    }
}
