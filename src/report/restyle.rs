use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use rust_xlsxwriter::{Workbook, Worksheet};
use tracing::{debug, info};

use super::analysis::is_currency_cell;
use super::Styles;
use crate::error::Result;

fn write_cell(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Data,
    currency: bool,
    styles: &Styles,
) -> Result<()> {
    let number = styles.number(currency);
    match cell {
        Data::Empty => {}
        Data::Float(f) => {
            ws.write_number_with_format(row, col, *f, number)?;
        }
        Data::Int(i) => {
            ws.write_number_with_format(row, col, *i as f64, number)?;
        }
        Data::Bool(b) => {
            ws.write_boolean_with_format(row, col, *b, &styles.base)?;
        }
        Data::DateTime(dt) => {
            ws.write_number_with_format(row, col, dt.as_f64(), &styles.date)?;
        }
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            ws.write_string_with_format(row, col, s, &styles.base)?;
        }
        Data::Error(e) => {
            ws.write_string_with_format(row, col, e.to_string(), &styles.base)?;
        }
    }
    Ok(())
}

/// Rewrites a workbook with the house font on every cell.
///
/// Money cells get the currency format again: the price columns of the data
/// and overview sheets, the SHU summary values, and the money rows of each
/// sheet named after a CMA. Values and sheet order are kept. Tables and any
/// other styling are not.
///
/// # Arguments
/// * `bytes`: the xlsx file to restyle
/// * `cmas`: sheet names to treat as per-CMA summary sheets
/// * `styles`: fonts and number formats to apply
///
/// # Errors
/// Returns an error if `bytes` is not a readable workbook or the copy cannot
/// be written
pub fn restyle_workbook(bytes: Vec<u8>, cmas: &[String], styles: &Styles) -> Result<Vec<u8>> {
    let mut source: Xlsx<Cursor<Vec<u8>>> = Xlsx::new(Cursor::new(bytes))?;
    let mut out = Workbook::new();

    for name in source.sheet_names() {
        let range = source.worksheet_range(&name)?;
        let is_cma = cmas.iter().any(|c| *c == name);
        let ws = out.add_worksheet();
        ws.set_name(&name)?;

        let (row0, col0) = range.start().unwrap_or((0, 0));
        for (r, c, cell) in range.cells() {
            let row = row0 + r as u32;
            let col = (col0 + c as u32) as u16;
            let currency = is_currency_cell(&name, is_cma, row, col);
            write_cell(ws, row, col, cell, currency, styles)?;
        }
        ws.autofit();
        debug!(sheet = %name, cma = is_cma, "sheet restyled");
    }

    if source.sheet_names().is_empty() {
        out.add_worksheet();
    }
    info!("workbook restyled");
    Ok(out.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::analysis::HU_SHEET;
    use rust_xlsxwriter::Workbook;
    use std::io::Read;

    fn source() -> Vec<u8> {
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        ws.set_name("HU Summary").unwrap();
        ws.write_string(0, 0, "CMA").unwrap();
        ws.write_string(1, 0, "Mallee").unwrap();
        ws.write_number(1, 1, 12.0).unwrap();

        let ws = wb.add_worksheet();
        ws.set_name("Mallee").unwrap();
        ws.write_string(0, 0, "Metric").unwrap();
        ws.write_string(0, 1, "Value").unwrap();
        for r in 1..=16u32 {
            ws.write_string(r, 0, format!("metric {r}")).unwrap();
            ws.write_number(r, 1, r as f64 * 1000.0).unwrap();
        }
        wb.save_to_buffer().unwrap()
    }

    #[test]
    fn test_restyle_keeps_sheets_and_values() {
        let cmas = vec!["Mallee".to_string()];
        let bytes = restyle_workbook(source(), &cmas, &Styles::default()).unwrap();

        let mut book: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).unwrap();
        assert_eq!(book.sheet_names(), vec!["HU Summary", "Mallee"]);

        let summary = book.worksheet_range("HU Summary").unwrap();
        assert_eq!(summary.get_value((1, 1)), Some(&Data::Float(12.0)));

        let mallee = book.worksheet_range("Mallee").unwrap();
        assert_eq!(mallee.get_size(), (17, 2));
        assert_eq!(mallee.get_value((2, 1)), Some(&Data::Float(2000.0)));
        assert_eq!(
            mallee.get_value((16, 0)),
            Some(&Data::String("metric 16".into()))
        );
    }

    fn styles_xml(bytes: &[u8]) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut xml = String::new();
        archive
            .by_name("xl/styles.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        xml
    }

    #[test]
    fn test_report_sheets_keep_currency() {
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        ws.set_name(HU_SHEET).unwrap();
        ws.write_string(0, 5, "GHU Price").unwrap();
        ws.write_number(1, 5, 210000.0).unwrap();
        let plain = wb.save_to_buffer().unwrap();
        assert!(!styles_xml(&plain).contains("$#,##0.00"));

        let bytes = restyle_workbook(plain, &[], &Styles::default()).unwrap();
        assert!(styles_xml(&bytes).contains("$#,##0.00"));
    }

    #[test]
    fn test_other_sheets_get_no_currency() {
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        ws.set_name("Notes").unwrap();
        ws.write_number(2, 1, 5.0).unwrap();
        let bytes = restyle_workbook(wb.save_to_buffer().unwrap(), &[], &Styles::default()).unwrap();
        assert!(!styles_xml(&bytes).contains("$#,##0.00"));
    }

    #[test]
    fn test_garbage_input_is_an_error() {
        assert!(restyle_workbook(b"nope".to_vec(), &[], &Styles::default()).is_err());
    }
}
