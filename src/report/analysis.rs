use rust_xlsxwriter::{Workbook, Worksheet};
use tracing::info;

use super::{data_table, label_table, sheet_name, write_date, write_value, Styles};
use crate::analysis::{AnalysisReport, Metric};
use crate::error::Result;

pub const HU_SHEET: &str = "HU Data";
pub const SHU_SHEET: &str = "SHU Data";
pub const OVERVIEW_SHEET: &str = "HU Summary";

const HU_HEADERS: [&str; 8] = [
    "Date",
    "CMA",
    "SBV",
    "GHU",
    "LT",
    "GHU Price",
    "Price (in GST)",
    "Price (ex GST)",
];

const SHU_HEADERS: [&str; 7] = [
    "Date",
    "LT",
    "SHUs",
    "SHU Price",
    "Species",
    "Price (in GST)",
    "Price (ex GST)",
];

const OVERVIEW_HEADERS: [&str; 11] = [
    "CMA",
    "GHUs",
    "LTs",
    "Total Value",
    "GHU Floor Price",
    "GHU Ceiling Price",
    "GHU Mean",
    "GHU Median",
    "GHU Weighted Average",
    "Available GHUs",
    "Available LTs",
];

/// Column where the SHU summaries start on the SHU sheet (column I).
const SHU_SUMMARY_COL: u16 = 8;

const HU_CURRENCY_COLS: [u16; 3] = [5, 6, 7];
const SHU_CURRENCY_COLS: [u16; 3] = [3, 5, 6];
const OVERVIEW_CURRENCY_COLS: [u16; 6] = [3, 4, 5, 6, 7, 8];

/// Rows in one SHU summary block.
const SHU_SUMMARY_LEN: u32 = 7;
/// Money rows within an SHU summary block.
const SHU_SUMMARY_CURRENCY: [u32; 5] = [2, 3, 4, 5, 6];
/// Money rows within a CMA sheet's metric list.
const CMA_CURRENCY: [u32; 8] = [1, 2, 3, 5, 6, 7, 8, 10];

/// Whether a numeric cell of the analysis workbook is a money value.
///
/// # Arguments
/// * `sheet`: sheet name
/// * `cma_sheet`: true for the per-CMA sheets, whose names depend on the data
/// * `row`, `col`: zero-based cell position
///
/// # Returns
/// `true` for the cells the analysis step writes with the currency format
pub(crate) fn is_currency_cell(sheet: &str, cma_sheet: bool, row: u32, col: u16) -> bool {
    if row == 0 {
        return false;
    }
    match sheet {
        HU_SHEET => HU_CURRENCY_COLS.contains(&col),
        SHU_SHEET if col == SHU_SUMMARY_COL + 1 => {
            let second = SHU_SUMMARY_LEN + 3;
            let offset = if row <= SHU_SUMMARY_LEN {
                row - 1
            } else if row >= second {
                row - second
            } else {
                return false;
            };
            SHU_SUMMARY_CURRENCY.contains(&offset)
        }
        SHU_SHEET => SHU_CURRENCY_COLS.contains(&col),
        OVERVIEW_SHEET => OVERVIEW_CURRENCY_COLS.contains(&col),
        _ if cma_sheet => col == 1 && CMA_CURRENCY.contains(&(row - 1)),
        _ => false,
    }
}

/// Builds the analysis workbook and returns it as xlsx bytes.
pub fn write_analysis_workbook(report: &AnalysisReport, styles: &Styles) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    write_hu_sheet(workbook.add_worksheet(), report, styles)?;
    write_shu_sheet(workbook.add_worksheet(), report, styles)?;
    write_overview_sheet(workbook.add_worksheet(), report, styles)?;

    for summary in &report.cmas {
        let ws = workbook.add_worksheet();
        ws.set_name(sheet_name(&summary.cma))?;
        let metrics = summary.metrics();
        write_metrics(ws, 1, 0, &metrics, styles)?;
        data_table(ws, 0, 0, &["Metric", "Value"], metrics.len(), false, &styles.base)?;
        ws.autofit();
    }

    info!(sheets = 3 + report.cmas.len(), "analysis workbook built");
    Ok(workbook.save_to_buffer()?)
}

fn write_hu_sheet(ws: &mut Worksheet, report: &AnalysisReport, styles: &Styles) -> Result<()> {
    ws.set_name(HU_SHEET)?;

    for (i, t) in report.hu_trades.iter().enumerate() {
        let row = i as u32 + 1;
        write_date(ws, row, 0, t.date, &styles.date)?;
        ws.write_string_with_format(row, 1, &t.cma, &styles.base)?;
        let values = [
            t.sbv,
            t.ghu,
            t.lt as f64,
            t.ghu_price,
            t.price_in_gst,
            t.price_ex_gst,
        ];
        for (col, v) in (2u16..).zip(values) {
            let format = styles.number(HU_CURRENCY_COLS.contains(&col));
            ws.write_number_with_format(row, col, v, format)?;
        }
    }

    data_table(ws, 0, 0, &HU_HEADERS, report.hu_trades.len(), true, &styles.base)?;
    ws.autofit();
    Ok(())
}

fn write_shu_sheet(ws: &mut Worksheet, report: &AnalysisReport, styles: &Styles) -> Result<()> {
    ws.set_name(SHU_SHEET)?;

    for (i, t) in report.shu_trades.iter().enumerate() {
        let row = i as u32 + 1;
        write_date(ws, row, 0, t.date, &styles.date)?;
        ws.write_string_with_format(row, 4, &t.species, &styles.base)?;
        let values = [
            (1, t.lt as f64),
            (2, t.sbu),
            (3, t.shu_price),
            (5, t.price_in_gst),
            (6, t.price_ex_gst),
        ];
        for (col, v) in values {
            let format = styles.number(SHU_CURRENCY_COLS.contains(&col));
            ws.write_number_with_format(row, col, v, format)?;
        }
    }
    data_table(ws, 0, 0, &SHU_HEADERS, report.shu_trades.len(), true, &styles.base)?;

    let three = report.shu_three_year.metrics();
    let one = report.shu_one_year.metrics();
    let second_heading = three.len() as u32 + 2;

    ws.write_string_with_format(0, SHU_SUMMARY_COL, "3 Year SHU Summary", &styles.heading)?;
    write_metrics(ws, 1, SHU_SUMMARY_COL, &three, styles)?;
    label_table(ws, 1, SHU_SUMMARY_COL, three.len())?;

    ws.write_string_with_format(
        second_heading,
        SHU_SUMMARY_COL,
        "1 Year SHU Summary",
        &styles.heading,
    )?;
    write_metrics(ws, second_heading + 1, SHU_SUMMARY_COL, &one, styles)?;
    label_table(ws, second_heading + 1, SHU_SUMMARY_COL, one.len())?;

    ws.autofit();
    Ok(())
}

fn write_overview_sheet(
    ws: &mut Worksheet,
    report: &AnalysisReport,
    styles: &Styles,
) -> Result<()> {
    ws.set_name(OVERVIEW_SHEET)?;

    for (i, r) in report.overview.iter().enumerate() {
        let row = i as u32 + 1;
        ws.write_string_with_format(row, 0, &r.cma, &styles.base)?;
        let values = [
            Some(r.ghus),
            Some(r.lts as f64),
            Some(r.total_value),
            r.floor_price,
            r.ceiling_price,
            r.mean_price,
            r.median_price,
            r.weighted_average,
            Some(r.available_ghus),
            Some(r.available_lts),
        ];
        for (col, v) in (1u16..).zip(values) {
            let format = styles.number(OVERVIEW_CURRENCY_COLS.contains(&col));
            write_value(ws, row, col, v, format)?;
        }
    }

    data_table(
        ws,
        0,
        0,
        &OVERVIEW_HEADERS,
        report.overview.len(),
        true,
        &styles.base,
    )?;
    ws.autofit();
    Ok(())
}

/// Writes label/value pairs downwards from (`row`, `col`).
fn write_metrics(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    metrics: &[Metric],
    styles: &Styles,
) -> Result<()> {
    for (i, m) in metrics.iter().enumerate() {
        let r = row + i as u32;
        ws.write_string_with_format(r, col, m.label, &styles.base)?;
        write_value(ws, r, col + 1, m.value, styles.number(m.currency))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisReport;
    use crate::config::Settings;
    use crate::data::processing::{ReportingWindow, TradeSplit};
    use crate::data::supply::{Cell, SupplyBook, SupplyTable};
    use crate::data::{HuTrade, ShuTrade};
    use calamine::{Data, Reader, Xlsx};
    use chrono::NaiveDate;
    use std::io::Cursor;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn report() -> AnalysisReport {
        let hu = |cma: &str, ghu: f64, lt: i64, price: f64| HuTrade {
            date: date(2023, 11, 20),
            cma: cma.to_string(),
            sbv: 0.6,
            ghu,
            lt,
            ghu_price: price,
            price_in_gst: ghu * price * 1.1,
            price_ex_gst: ghu * price,
        };
        let split = TradeSplit {
            hu: vec![
                hu("North East", 1.0, 0, 100000.0),
                hu("North East", 2.0, 1, 150000.0),
                hu("Wimmera", 0.5, 0, 60000.0),
            ],
            shu: vec![ShuTrade {
                date: date(2023, 12, 5),
                lt: 0,
                sbu: 0.25,
                shu_price: 40000.0,
                species: "Swift Parrot".into(),
                price_in_gst: 11000.0,
                price_ex_gst: 10000.0,
            }],
        };
        let mut supply = SupplyBook::default();
        supply.push(SupplyTable::new(
            "North East",
            vec!["Credit Site ID".into(), "GHU".into(), "LT".into()],
            vec![vec![
                Cell::Text("BBA-7".into()),
                Cell::Number(9.0),
                Cell::Number(2.0),
            ]],
        ));
        let window = ReportingWindow::new(date(2023, 3, 1), date(2024, 2, 29));
        AnalysisReport::build(window, &split, &supply, &Settings::default()).unwrap()
    }

    fn open(bytes: Vec<u8>) -> Xlsx<Cursor<Vec<u8>>> {
        Xlsx::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn test_sheet_order() {
        let bytes = write_analysis_workbook(&report(), &Styles::default()).unwrap();
        let book = open(bytes);
        assert_eq!(
            book.sheet_names(),
            vec!["HU Data", "SHU Data", "HU Summary", "North East", "Wimmera"]
        );
    }

    #[test]
    fn test_hu_data_rows() {
        let bytes = write_analysis_workbook(&report(), &Styles::default()).unwrap();
        let mut book = open(bytes);
        let range = book.worksheet_range(HU_SHEET).unwrap();
        assert_eq!(range.get_size(), (4, 8));
        assert_eq!(
            range.get_value((0, 7)),
            Some(&Data::String("Price (ex GST)".into()))
        );
        assert_eq!(
            range.get_value((1, 1)),
            Some(&Data::String("North East".into()))
        );
        assert_eq!(range.get_value((2, 3)), Some(&Data::Float(2.0)));
    }

    #[test]
    fn test_cma_sheet_metrics() {
        let bytes = write_analysis_workbook(&report(), &Styles::default()).unwrap();
        let mut book = open(bytes);
        let range = book.worksheet_range("North East").unwrap();
        assert_eq!(range.get_size(), (17, 2));
        assert_eq!(
            range.get_value((1, 0)),
            Some(&Data::String("Total GHUs traded".into()))
        );
        assert_eq!(range.get_value((1, 1)), Some(&Data::Float(3.0)));
        assert_eq!(range.get_value((12, 1)), Some(&Data::Float(9.0)));
        assert_eq!(range.get_value((13, 1)), Some(&Data::Float(3.0)));

        // Wimmera has no LTs, so the LT value is blank
        let range = book.worksheet_range("Wimmera").unwrap();
        assert_eq!(
            range.get_value((11, 0)),
            Some(&Data::String("Average LT value".into()))
        );
        assert!(matches!(range.get_value((11, 1)), None | Some(Data::Empty)));
    }

    #[test]
    fn test_shu_summaries_placement() {
        let bytes = write_analysis_workbook(&report(), &Styles::default()).unwrap();
        let mut book = open(bytes);
        let range = book.worksheet_range(SHU_SHEET).unwrap();
        let cell = |r: u32, c: u32| range.get_value((r, c)).cloned();

        assert_eq!(cell(0, 8), Some(Data::String("3 Year SHU Summary".into())));
        assert_eq!(cell(1, 8), Some(Data::String("Number of SHU trades".into())));
        assert_eq!(cell(1, 9), Some(Data::Float(1.0)));
        assert_eq!(cell(9, 8), Some(Data::String("1 Year SHU Summary".into())));
        assert_eq!(cell(16, 8), Some(Data::String("SHU median price".into())));
        assert_eq!(cell(16, 9), Some(Data::Float(40000.0)));
    }

    #[test]
    fn test_currency_cells_follow_metric_flags() {
        let report = report();
        for (i, m) in report.shu_three_year.metrics().iter().enumerate() {
            let row = 1 + i as u32;
            assert_eq!(is_currency_cell(SHU_SHEET, false, row, 9), m.currency, "{}", m.label);
        }
        for (i, m) in report.shu_one_year.metrics().iter().enumerate() {
            let row = 10 + i as u32;
            assert_eq!(is_currency_cell(SHU_SHEET, false, row, 9), m.currency, "{}", m.label);
        }
        for (i, m) in report.cmas[0].metrics().iter().enumerate() {
            let row = 1 + i as u32;
            assert_eq!(is_currency_cell("North East", true, row, 1), m.currency, "{}", m.label);
            assert!(!is_currency_cell("North East", false, row, 1));
        }
    }

    #[test]
    fn test_currency_columns_on_data_sheets() {
        assert!(is_currency_cell(HU_SHEET, false, 3, 5));
        assert!(!is_currency_cell(HU_SHEET, false, 3, 3));
        assert!(!is_currency_cell(HU_SHEET, false, 0, 5));
        assert!(is_currency_cell(SHU_SHEET, false, 2, 3));
        assert!(!is_currency_cell(SHU_SHEET, false, 2, 4));
        assert!(!is_currency_cell(SHU_SHEET, false, 8, 9));
        assert!(is_currency_cell(OVERVIEW_SHEET, false, 1, 8));
        assert!(!is_currency_cell(OVERVIEW_SHEET, false, 1, 9));
    }

    #[test]
    fn test_overview_rows() {
        let bytes = write_analysis_workbook(&report(), &Styles::default()).unwrap();
        let mut book = open(bytes);
        let range = book.worksheet_range(OVERVIEW_SHEET).unwrap();
        assert_eq!(range.get_size(), (3, 11));
        assert_eq!(
            range.get_value((0, 8)),
            Some(&Data::String("GHU Weighted Average".into()))
        );
        assert_eq!(range.get_value((2, 0)), Some(&Data::String("Wimmera".into())));
        assert_eq!(range.get_value((1, 9)), Some(&Data::Float(9.0)));
    }
}
