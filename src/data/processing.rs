use super::cma::CmaMatcher;
use super::workbook::TradeRecord;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A general habitat unit trade with its CMA reconciled.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HuTrade {
    pub date: NaiveDate,
    pub cma: String,
    pub sbv: f64,
    pub ghu: f64,
    pub lt: i64,
    pub ghu_price: f64,
    pub price_in_gst: f64,
    pub price_ex_gst: f64,
}

impl HuTrade {
    /// Whether the trade carried no large trees.
    pub fn without_trees(&self) -> bool {
        self.lt == 0
    }
}

/// A species habitat unit trade.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ShuTrade {
    pub date: NaiveDate,
    pub lt: i64,
    pub sbu: f64,
    pub shu_price: f64,
    pub species: String,
    pub price_in_gst: f64,
    pub price_ex_gst: f64,
}

/// Trades separated by unit type.
#[derive(Debug, Clone, Default)]
pub struct TradeSplit {
    pub hu: Vec<HuTrade>,
    pub shu: Vec<ShuTrade>,
}

/// Turns raw register rows into typed GHU and SHU trades.
///
/// Rows naming a species are SHU trades; everything else is a GHU trade. GHU
/// trades have their CMA label reconciled and blank LT counts read as zero.
pub struct TradeProcessor {
    matcher: CmaMatcher,
}

impl Default for TradeProcessor {
    fn default() -> Self {
        Self::new(CmaMatcher::default())
    }
}

impl TradeProcessor {
    /// Creates a processor that normalises CMA labels with `matcher`.
    pub fn new(matcher: CmaMatcher) -> Self {
        Self { matcher }
    }

    /// Classifies a single record.
    pub fn process_record(&self, record: TradeRecord) -> Trade {
        let lt = record.lt.unwrap_or(0.0).trunc() as i64;
        match record.species {
            Some(species) => Trade::Shu(ShuTrade {
                date: record.date,
                lt,
                sbu: record.sbu,
                shu_price: record.shu_price,
                species,
                price_in_gst: record.price_in_gst,
                price_ex_gst: record.price_ex_gst,
            }),
            None => Trade::Hu(HuTrade {
                date: record.date,
                cma: self.matcher.normalise(&record.cma),
                sbv: record.sbv,
                ghu: record.ghu,
                lt,
                ghu_price: record.ghu_price,
                price_in_gst: record.price_in_gst,
                price_ex_gst: record.price_ex_gst,
            }),
        }
    }

    /// Classifies a batch of records, keeping their order within each kind.
    pub fn process_batch(&self, records: Vec<TradeRecord>) -> TradeSplit {
        let mut split = TradeSplit::default();
        for record in records {
            match self.process_record(record) {
                Trade::Hu(t) => split.hu.push(t),
                Trade::Shu(t) => split.shu.push(t),
            }
        }
        info!(hu = split.hu.len(), shu = split.shu.len(), "trades classified");
        split
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Trade {
    Hu(HuTrade),
    Shu(ShuTrade),
}

/// Inclusive date range a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportingWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The twelve months to the end of the month before `today`.
    ///
    /// The end is the last day of the previous month and the start is 365
    /// days before it.
    pub fn default_for(today: NaiveDate) -> Self {
        let first = today.with_day(1).unwrap_or(today);
        let end = first - Duration::days(1);
        Self::new(end - Duration::days(365), end)
    }

    /// Applies explicit start/end dates on top of the default window.
    pub fn with_overrides(self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self::new(start.unwrap_or(self.start), end.unwrap_or(self.end))
    }

    /// Whether `date` falls in the window, both ends included.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// One year back from the end date.
    pub fn one_year(&self) -> Self {
        Self::new(self.end - Duration::days(365), self.end)
    }

    /// Three years back from the end date.
    pub fn three_year(&self) -> Self {
        Self::new(self.end - Duration::days(1095), self.end)
    }
}

/// GHU trades dated inside `window`, in their original order.
pub fn filter_hu(trades: &[HuTrade], window: ReportingWindow) -> Vec<HuTrade> {
    trades
        .iter()
        .filter(|t| window.contains(t.date))
        .cloned()
        .collect()
}

/// SHU trades dated inside `window`.
pub fn filter_shu(trades: &[ShuTrade], window: ReportingWindow) -> Vec<ShuTrade> {
    trades
        .iter()
        .filter(|t| window.contains(t.date))
        .cloned()
        .collect()
}
