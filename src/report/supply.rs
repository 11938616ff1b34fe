use std::io::Write;

use chrono::NaiveDate;
use rust_xlsxwriter::Workbook;

use super::{data_table, sheet_name, Styles};
use crate::data::supply::{Cell, SupplyBook};
use crate::error::Result;

/// One sheet per CMA holding its supply table as scraped.
pub fn write_supply_workbook(book: &SupplyBook, styles: &Styles) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    for table in &book.tables {
        let ws = workbook.add_worksheet();
        ws.set_name(sheet_name(&table.cma))?;

        for (r, row) in table.rows.iter().enumerate() {
            let r = r as u32 + 1;
            for (c, cell) in row.iter().enumerate() {
                let c = c as u16;
                match cell {
                    Cell::Empty => ws.write_blank(r, c, &styles.base)?,
                    Cell::Number(n) => ws.write_number_with_format(r, c, *n, &styles.base)?,
                    Cell::Text(t) => ws.write_string_with_format(r, c, t, &styles.base)?,
                };
            }
        }

        let headers: Vec<&str> = table.headers.iter().map(String::as_str).collect();
        if !headers.is_empty() {
            data_table(ws, 0, 0, &headers, table.rows.len(), true, &styles.base)?;
        }
        ws.autofit();
    }

    if book.tables.is_empty() {
        workbook.add_worksheet();
    }
    Ok(workbook.save_to_buffer()?)
}

/// Every CMA's supply rows in one CSV, tagged with the CMA and scrape date.
///
/// Columns are the union of all table headers in first-seen order, followed
/// by `CMA` and `Date`.
pub fn write_supply_csv<W: Write>(book: &SupplyBook, date: NaiveDate, writer: W) -> Result<()> {
    let mut columns: Vec<&str> = Vec::new();
    for table in &book.tables {
        for h in &table.headers {
            if !columns.contains(&h.as_str()) {
                columns.push(h.as_str());
            }
        }
    }

    let mut wtr = csv::Writer::from_writer(writer);
    let mut header: Vec<&str> = columns.clone();
    header.extend(["CMA", "Date"]);
    wtr.write_record(&header)?;

    let date = date.format("%Y-%m-%d").to_string();
    for table in &book.tables {
        for row in &table.rows {
            let mut record: Vec<String> = columns
                .iter()
                .map(|col| {
                    table
                        .headers
                        .iter()
                        .position(|h| h == col)
                        .and_then(|i| row.get(i))
                        .map(Cell::as_text)
                        .unwrap_or_default()
                })
                .collect();
            record.push(table.cma.clone());
            record.push(date.clone());
            wtr.write_record(&record)?;
        }
    }
    wtr.flush()?;
    Ok(())
}
