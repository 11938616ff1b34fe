pub mod analysis;
pub mod export;
pub mod restyle;
pub mod styles;
pub mod supply;

pub use analysis::write_analysis_workbook;
pub use export::{write_hu_csv, write_shu_csv};
pub use restyle::restyle_workbook;
pub use styles::Styles;
pub use supply::{write_supply_csv, write_supply_workbook};

use chrono::{Datelike, NaiveDate};
use rust_xlsxwriter::{ExcelDateTime, Format, Table, TableColumn, TableStyle, Worksheet};

use crate::error::Result;

/// Excel's limit on sheet name length.
const MAX_SHEET_NAME: usize = 31;

/// Makes `raw` usable as a sheet name.
pub fn sheet_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .take(MAX_SHEET_NAME)
        .collect();
    let cleaned = cleaned.trim_matches('\'').to_string();
    if cleaned.is_empty() {
        "Unassigned".to_string()
    } else {
        cleaned
    }
}

pub(crate) fn write_date(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    date: NaiveDate,
    format: &Format,
) -> Result<()> {
    let dt = ExcelDateTime::from_ymd(date.year() as u16, date.month() as u8, date.day() as u8)?;
    ws.write_datetime_with_format(row, col, &dt, format)?;
    Ok(())
}

/// Writes a number, or a blank cell when the value is undefined.
pub(crate) fn write_value(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    value: Option<f64>,
    format: &Format,
) -> Result<()> {
    match value {
        Some(v) if v.is_finite() => ws.write_number_with_format(row, col, v, format)?,
        _ => ws.write_blank(row, col, format)?,
    };
    Ok(())
}

/// Wraps `rows` data rows under a header row at (`row`, `col`) in a banded
/// table. With no data rows only the header line is written, since a table
/// needs at least one body row.
pub(crate) fn data_table(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    headers: &[&str],
    rows: usize,
    autofilter: bool,
    header_format: &Format,
) -> Result<()> {
    if rows == 0 {
        for (i, h) in headers.iter().enumerate() {
            ws.write_string_with_format(row, col + i as u16, *h, header_format)?;
        }
        return Ok(());
    }

    let columns: Vec<TableColumn> = headers
        .iter()
        .map(|h| {
            TableColumn::new()
                .set_header(*h)
                .set_header_format(header_format.clone())
        })
        .collect();
    let table = Table::new()
        .set_columns(&columns)
        .set_style(TableStyle::Light11)
        .set_banded_columns(true)
        .set_autofilter(autofilter);

    ws.add_table(
        row,
        col,
        row + rows as u32,
        col + headers.len() as u16 - 1,
        &table,
    )?;
    Ok(())
}

/// Headerless two-column table with the first column emphasised.
pub(crate) fn label_table(ws: &mut Worksheet, row: u32, col: u16, rows: usize) -> Result<()> {
    if rows == 0 {
        return Ok(());
    }
    let table = Table::new()
        .set_style(TableStyle::Light18)
        .set_header_row(false)
        .set_autofilter(false)
        .set_first_column(true);
    ws.add_table(row, col, row + rows as u32 - 1, col + 1, &table)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_name_cleaning() {
        assert_eq!(sheet_name("North Central"), "North Central");
        assert_eq!(sheet_name("  "), "Unassigned");
        assert_eq!(sheet_name("A/B: C?"), "A_B_ C_");
        assert_eq!(sheet_name(&"x".repeat(40)).len(), 31);
    }
}
