use std::io::Write;

use crate::data::{HuTrade, ShuTrade};
use crate::error::Result;

/// Field names of `HuTrade`, in declaration order.
const HU_COLUMNS: [&str; 8] = [
    "date",
    "cma",
    "sbv",
    "ghu",
    "lt",
    "ghu_price",
    "price_in_gst",
    "price_ex_gst",
];

/// Field names of `ShuTrade`, in declaration order.
const SHU_COLUMNS: [&str; 7] = [
    "date",
    "lt",
    "sbu",
    "shu_price",
    "species",
    "price_in_gst",
    "price_ex_gst",
];

// The header is written up front so an empty export still has one.
fn write_rows<W: Write, T: serde::Serialize>(
    header: &[&str],
    rows: &[T],
    writer: W,
) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(header)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Clean GHU trades as CSV, one header row and ISO dates.
pub fn write_hu_csv<W: Write>(trades: &[HuTrade], writer: W) -> Result<()> {
    write_rows(&HU_COLUMNS, trades, writer)
}

/// Clean SHU trades as CSV.
pub fn write_shu_csv<W: Write>(trades: &[ShuTrade], writer: W) -> Result<()> {
    write_rows(&SHU_COLUMNS, trades, writer)
}
