use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::supply::{Cell, SupplyBook, SupplyTable};
use crate::error::{Error, Result};

/// Sheet in the published workbook that lists every GHU and SHU trade.
pub const TRADE_SHEET: &str = "Trade Prices by HU";

/// Columns read from the trade sheet. Anything past these is padding.
const TRADE_COLUMNS: usize = 12;

/// One row of the trade sheet, before GHU and SHU trades are separated.
///
/// Numeric cells that are blank or unparseable are read as zero. `lt` is kept
/// optional because SHU rows leave it blank and the distinction is reported.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub cma: String,
    pub sbv: f64,
    pub ghu: f64,
    pub lt: Option<f64>,
    pub sbu: f64,
    pub ghu_price: f64,
    pub shu_price: f64,
    pub species: Option<String>,
    pub price_in_gst: f64,
    pub price_ex_gst: f64,
}

type XlsxBook = Xlsx<Cursor<Vec<u8>>>;

fn open(bytes: Vec<u8>) -> Result<XlsxBook> {
    Ok(Xlsx::new(Cursor::new(bytes))?)
}

fn sheet(book: &mut XlsxBook, name: &str) -> Result<Range<Data>> {
    if !book.sheet_names().iter().any(|s| s == name) {
        return Err(Error::MissingSheet(name.to_string()));
    }
    Ok(book.worksheet_range(name)?)
}

/// Converts an Excel serial day number (1900 date system) to a date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    for fmt in ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return Some(d);
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Reads a date from any of the shapes the register has used.
pub fn cell_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()),
        Data::Float(f) => excel_serial_to_date(*f),
        Data::Int(i) => excel_serial_to_date(*i as f64),
        Data::String(s) | Data::DateTimeIso(s) => parse_date_text(s),
        _ => None,
    }
}

/// Numeric value of a cell, coercing unparseable content to `None`.
pub fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) if f.is_finite() => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Data::String(s) => Cell::parse(s).as_f64(),
        _ => None,
    }
}

/// Text value of a cell, `None` when blank.
pub fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn is_blank(row: &[Data]) -> bool {
    row.iter().all(|c| matches!(c, Data::Empty))
}

/// Parses the published trade workbook.
///
/// The header row is skipped and columns are taken by position, because the
/// header labels have changed between releases while the order has not.
///
/// # Errors
/// `MissingSheet` when the trade sheet is absent, or a read error when the
/// bytes are not an xlsx file.
pub fn read_trade_workbook(bytes: Vec<u8>) -> Result<Vec<TradeRecord>> {
    let mut book = open(bytes)?;
    let range = sheet(&mut book, TRADE_SHEET)?;

    let empty = Data::Empty;
    let mut records = Vec::new();
    let mut undated = 0usize;

    for (i, row) in range.rows().enumerate().skip(1) {
        if is_blank(row) {
            continue;
        }
        let col = |n: usize| {
            if n < TRADE_COLUMNS {
                row.get(n).unwrap_or(&empty)
            } else {
                &empty
            }
        };
        let num = |n: usize| cell_number(col(n)).unwrap_or(0.0);

        let Some(date) = cell_date(col(0)) else {
            debug!(row = i + 1, value = %col(0), "skipping trade without a date");
            undated += 1;
            continue;
        };

        records.push(TradeRecord {
            date,
            cma: cell_text(col(1)).unwrap_or_default(),
            sbv: num(2),
            ghu: num(3),
            lt: cell_number(col(4)),
            sbu: num(5),
            ghu_price: num(6),
            shu_price: num(7),
            species: cell_text(col(8)),
            price_in_gst: num(9),
            price_ex_gst: num(10),
        });
    }

    if undated > 0 {
        warn!(undated, "trade rows without a usable date were dropped");
    }
    info!(trades = records.len(), "trade workbook parsed");
    Ok(records)
}

fn data_to_cell(d: &Data) -> Cell {
    match d {
        Data::Empty => Cell::Empty,
        Data::Float(f) if f.is_finite() => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::String(s) => Cell::parse(s),
        other => cell_text(other).map(Cell::Text).unwrap_or(Cell::Empty),
    }
}

/// Reads a supply workbook written by the `supply` step (one sheet per CMA).
///
/// CMAs without a sheet get an empty table so they report zero supply.
pub fn read_supply_workbook(bytes: Vec<u8>, cmas: &[String]) -> Result<SupplyBook> {
    let mut book = open(bytes)?;
    let names = book.sheet_names();
    let mut supply = SupplyBook::default();

    for cma in cmas {
        if !names.iter().any(|n| n == cma) {
            warn!(cma = %cma, "no supply sheet, treating supply as zero");
            supply.push(SupplyTable::new(cma.clone(), vec![], vec![]));
            continue;
        }
        let range = book.worksheet_range(cma)?;
        let mut rows = range.rows();
        let headers = rows
            .next()
            .map(|r| r.iter().map(|c| cell_text(c).unwrap_or_default()).collect())
            .unwrap_or_default();
        let body: Vec<Vec<Cell>> = rows
            .filter(|r| !is_blank(r))
            .map(|r| r.iter().map(data_to_cell).collect())
            .collect();
        debug!(cma = %cma, rows = body.len(), "supply sheet read");
        supply.push(SupplyTable::new(cma.clone(), headers, body));
    }

    Ok(supply)
}
