use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{info, warn};

use super::stats;
use crate::config::Settings;
use crate::data::processing::{filter_hu, filter_shu, ReportingWindow, TradeSplit};
use crate::data::supply::{SupplyBook, GHU_COLUMN, LT_COLUMN, SITE_ID_COLUMN};
use crate::data::{HuTrade, ShuTrade};
use crate::error::Result;

/// A labelled value on a summary sheet. `None` is written as a blank cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub label: &'static str,
    pub value: Option<f64>,
    pub currency: bool,
}

impl Metric {
    fn plain(label: &'static str, value: impl Into<Option<f64>>) -> Self {
        Self {
            label,
            value: value.into(),
            currency: false,
        }
    }

    fn money(label: &'static str, value: impl Into<Option<f64>>) -> Self {
        Self {
            label,
            value: value.into(),
            currency: true,
        }
    }
}

/// GHU market and supply figures for one CMA over the reporting window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CmaSummary {
    pub cma: String,
    pub total_ghus: f64,
    pub total_value: f64,
    pub average_price: Option<f64>,
    pub median_price: Option<f64>,
    pub ghus_without_trees: f64,
    pub value_without_trees: f64,
    pub average_without_trees: Option<f64>,
    pub median_without_trees: Option<f64>,
    pub floor_price: Option<f64>,
    pub total_lts: i64,
    pub average_lt_value: Option<f64>,
    pub supply: f64,
    pub years_of_supply: Option<f64>,
    pub lt_supply: f64,
    pub wa_supply: f64,
    pub years_without_wa: Option<f64>,
}

impl CmaSummary {
    /// Computes the summary for one CMA's trades.
    ///
    /// # Arguments
    /// * `cma`: canonical CMA name
    /// * `trades`: the CMA's GHU trades inside the reporting window
    /// * `supply`: the CMA's supply table, if one was collected
    /// * `wa_sites`: credit sites held by water authorities
    ///
    /// # Errors
    /// `MissingColumn` when a non-empty supply table lacks the `GHU`, `LT` or
    /// `Credit Site ID` column
    pub fn compute(
        cma: &str,
        trades: &[HuTrade],
        supply: Option<&crate::data::SupplyTable>,
        wa_sites: &[String],
    ) -> Result<Self> {
        let ghus: Vec<f64> = trades.iter().map(|t| t.ghu).collect();
        let values: Vec<f64> = trades.iter().map(|t| t.price_ex_gst).collect();
        let prices: Vec<f64> = trades.iter().map(|t| t.ghu_price).collect();

        let no_trees: Vec<&HuTrade> = trades.iter().filter(|t| t.without_trees()).collect();
        let nt_ghus: Vec<f64> = no_trees.iter().map(|t| t.ghu).collect();
        let nt_values: Vec<f64> = no_trees.iter().map(|t| t.price_ex_gst).collect();
        let nt_prices: Vec<f64> = no_trees.iter().map(|t| t.ghu_price).collect();

        let total_ghus = stats::sum(&ghus);
        let total_value = stats::sum(&values);
        let ghus_without_trees = stats::sum(&nt_ghus);
        let value_without_trees = stats::sum(&nt_values);
        let average_without_trees = stats::ratio(value_without_trees, ghus_without_trees);
        let total_lts: i64 = trades.iter().map(|t| t.lt).sum();

        // What the trees added on top of the no-tree rate, per tree
        let average_lt_value = average_without_trees.and_then(|avg| {
            let tree_premium =
                total_value - (total_ghus - ghus_without_trees) * avg - value_without_trees;
            stats::ratio(tree_premium, total_lts as f64)
        });

        let (supply_ghu, lt_supply, wa_supply) = match supply {
            Some(table) => (
                table.column_sum(GHU_COLUMN)?,
                table.column_sum(LT_COLUMN)?,
                table.sum_where(GHU_COLUMN, SITE_ID_COLUMN, wa_sites)?,
            ),
            None => {
                warn!(cma, "no supply collected for CMA");
                (0.0, 0.0, 0.0)
            }
        };

        Ok(Self {
            cma: cma.to_string(),
            total_ghus,
            total_value,
            average_price: stats::ratio(total_value, total_ghus),
            median_price: stats::median(&prices),
            ghus_without_trees,
            value_without_trees,
            average_without_trees,
            median_without_trees: stats::median(&nt_prices),
            floor_price: stats::min(&prices),
            total_lts,
            average_lt_value,
            supply: supply_ghu,
            years_of_supply: stats::ratio(supply_ghu, total_ghus),
            lt_supply,
            wa_supply,
            years_without_wa: stats::ratio(supply_ghu - wa_supply, total_ghus),
        })
    }

    /// The sixteen rows of a CMA sheet, in sheet order.
    pub fn metrics(&self) -> Vec<Metric> {
        vec![
            Metric::plain("Total GHUs traded", self.total_ghus),
            Metric::money("Total market value", self.total_value),
            Metric::money("Average price per GHU", self.average_price),
            Metric::money("Median price per GHU", self.median_price),
            Metric::plain("Total GHUs without trees", self.ghus_without_trees),
            Metric::money("Total value without trees", self.value_without_trees),
            Metric::money("Average price without trees", self.average_without_trees),
            Metric::money("Median price without trees", self.median_without_trees),
            Metric::money("Floor price", self.floor_price),
            Metric::plain("Total LTs traded", self.total_lts as f64),
            Metric::money("Average LT value", self.average_lt_value),
            Metric::plain("Supply of Credits", self.supply),
            Metric::plain("Years of Supply", self.years_of_supply),
            Metric::plain("LT Supply", self.lt_supply),
            Metric::plain("Water Authority Supply (WA)", self.wa_supply),
            Metric::plain("Years of Supply without WA", self.years_without_wa),
        ]
    }
}

/// SHU market figures over one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShuSummary {
    pub trades: usize,
    pub total_shus: f64,
    pub total_value: f64,
    pub average_price: Option<f64>,
    pub floor_price: Option<f64>,
    pub ceiling_price: Option<f64>,
    pub median_price: Option<f64>,
}

impl ShuSummary {
    /// Summarises SHU trades.
    ///
    /// A multi-species purchase is listed once per species with the same date
    /// and price, so trades are counted as distinct (date, price) pairs and
    /// the median is taken over distinct prices.
    pub fn compute(trades: &[ShuTrade]) -> Self {
        let prices: Vec<f64> = trades.iter().map(|t| t.shu_price).collect();
        let total_shus: f64 = trades.iter().map(|t| t.sbu).sum();
        let total_value: f64 = trades.iter().map(|t| t.price_ex_gst).sum();
        let distinct: BTreeSet<(chrono::NaiveDate, u64)> = trades
            .iter()
            .map(|t| (t.date, t.shu_price.to_bits()))
            .collect();

        Self {
            trades: distinct.len(),
            total_shus,
            total_value,
            average_price: stats::ratio(total_value, total_shus),
            floor_price: stats::min(&prices),
            ceiling_price: stats::max(&prices),
            median_price: stats::median(&stats::unique_sorted(&prices)),
        }
    }

    pub fn metrics(&self) -> Vec<Metric> {
        vec![
            Metric::plain("Number of SHU trades", self.trades as f64),
            Metric::plain("Total SHUs traded", self.total_shus),
            Metric::money("Total Value of SHU trades", self.total_value),
            Metric::money("Average Price per SHU", self.average_price),
            Metric::money("SHU Floor Price", self.floor_price),
            Metric::money("SHU Ceiling Price", self.ceiling_price),
            Metric::money("SHU median price", self.median_price),
        ]
    }
}

/// One row of the cross-CMA overview sheet.
///
/// Floor, ceiling, mean and median are over trades without trees, so the
/// price reflects bare GHUs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HuOverviewRow {
    pub cma: String,
    pub ghus: f64,
    pub lts: i64,
    pub total_value: f64,
    pub floor_price: Option<f64>,
    pub ceiling_price: Option<f64>,
    pub mean_price: Option<f64>,
    pub median_price: Option<f64>,
    pub weighted_average: Option<f64>,
    pub available_ghus: f64,
    pub available_lts: f64,
}

impl HuOverviewRow {
    /// Overview row for one CMA.
    ///
    /// # Arguments
    /// * `trades`: the CMA's GHU trades inside the window
    /// * `summary`: the CMA's summary, for totals and supply
    pub fn compute(trades: &[HuTrade], summary: &CmaSummary) -> Self {
        let nt_prices: Vec<f64> = trades
            .iter()
            .filter(|t| t.without_trees())
            .map(|t| t.ghu_price)
            .collect();

        Self {
            cma: summary.cma.clone(),
            ghus: summary.total_ghus,
            lts: summary.total_lts,
            total_value: summary.total_value,
            floor_price: stats::min(&nt_prices),
            ceiling_price: stats::max(&nt_prices),
            mean_price: stats::mean(&nt_prices),
            median_price: stats::median(&nt_prices),
            weighted_average: summary.average_price,
            available_ghus: summary.supply,
            available_lts: summary.lt_supply,
        }
    }
}

/// Everything the analysis workbook and JSON dump are built from.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub window: ReportingWindow,
    pub cmas: Vec<CmaSummary>,
    pub overview: Vec<HuOverviewRow>,
    pub shu_one_year: ShuSummary,
    pub shu_three_year: ShuSummary,
    /// GHU trades inside the window.
    #[serde(skip)]
    pub hu_trades: Vec<HuTrade>,
    /// Every SHU trade on the register.
    #[serde(skip)]
    pub shu_trades: Vec<ShuTrade>,
}

impl AnalysisReport {
    /// Runs the full analysis.
    ///
    /// GHU figures cover `window`. SHU figures cover one and three years back
    /// from the window's end, whatever its start. CMAs come out in name order.
    ///
    /// # Errors
    /// Propagates `MissingColumn` from a malformed supply table
    pub fn build(
        window: ReportingWindow,
        trades: &TradeSplit,
        supply: &SupplyBook,
        settings: &Settings,
    ) -> Result<Self> {
        let hu_trades = filter_hu(&trades.hu, window);

        let mut by_cma: BTreeMap<String, Vec<HuTrade>> = BTreeMap::new();
        for t in &hu_trades {
            by_cma.entry(t.cma.clone()).or_default().push(t.clone());
        }

        let mut cmas = Vec::with_capacity(by_cma.len());
        let mut overview = Vec::with_capacity(by_cma.len());
        for (cma, group) in &by_cma {
            info!(cma = %cma, trades = group.len(), "crunching CMA");
            let sites = settings.water_authority_sites(cma);
            let summary = CmaSummary::compute(cma, group, supply.get(cma), sites)?;
            overview.push(HuOverviewRow::compute(group, &summary));
            cmas.push(summary);
        }

        Ok(Self {
            window,
            shu_one_year: ShuSummary::compute(&filter_shu(&trades.shu, window.one_year())),
            shu_three_year: ShuSummary::compute(&filter_shu(&trades.shu, window.three_year())),
            cmas,
            overview,
            hu_trades,
            shu_trades: trades.shu.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::supply::{Cell, SupplyTable};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn hu(cma: &str, ghu: f64, lt: i64, price: f64, value: f64) -> HuTrade {
        HuTrade {
            date: date(2023, 10, 1),
            cma: cma.to_string(),
            sbv: 0.5,
            ghu,
            lt,
            ghu_price: price,
            price_in_gst: value * 1.1,
            price_ex_gst: value,
        }
    }

    fn shu(d: NaiveDate, sbu: f64, price: f64, species: &str) -> ShuTrade {
        ShuTrade {
            date: d,
            lt: 0,
            sbu,
            shu_price: price,
            species: species.to_string(),
            price_in_gst: sbu * price * 1.1,
            price_ex_gst: sbu * price,
        }
    }

    fn supply_table(cma: &str) -> SupplyTable {
        SupplyTable::new(
            cma,
            vec!["Credit Site ID".into(), "GHU".into(), "LT".into()],
            vec![
                vec![Cell::Text("BBA-0277".into()), Cell::Number(6.0), Cell::Number(1.0)],
                vec![Cell::Text("BBA-5555".into()), Cell::Number(14.0), Cell::Number(4.0)],
            ],
        )
    }

    fn trades() -> Vec<HuTrade> {
        vec![
            hu("Melbourne Water", 2.0, 0, 100000.0, 200000.0),
            hu("Melbourne Water", 1.0, 0, 120000.0, 120000.0),
            hu("Melbourne Water", 2.0, 4, 180000.0, 360000.0),
        ]
    }

    #[test]
    fn test_cma_summary_figures() {
        let table = supply_table("Melbourne Water");
        let sites = vec!["BBA-0277".to_string()];
        let s = CmaSummary::compute("Melbourne Water", &trades(), Some(&table), &sites).unwrap();

        assert_eq!(s.total_ghus, 5.0);
        assert_eq!(s.total_value, 680000.0);
        assert_eq!(s.average_price, Some(136000.0));
        assert_eq!(s.median_price, Some(120000.0));
        assert_eq!(s.ghus_without_trees, 3.0);
        assert_eq!(s.value_without_trees, 320000.0);
        assert_eq!(s.median_without_trees, Some(110000.0));
        assert_eq!(s.floor_price, Some(100000.0));
        assert_eq!(s.total_lts, 4);
        assert_eq!(s.supply, 20.0);
        assert_eq!(s.lt_supply, 5.0);
        assert_eq!(s.wa_supply, 6.0);
        assert_eq!(s.years_of_supply, Some(4.0));
        assert_eq!(s.years_without_wa, Some(2.8));

        // 680000 - 2 * (320000 / 3) - 320000 over 4 trees
        let avg_nt = 320000.0 / 3.0;
        let want = (680000.0 - 2.0 * avg_nt - 320000.0) / 4.0;
        assert!((s.average_lt_value.unwrap() - want).abs() < 1e-6);
    }

    #[test]
    fn test_cma_summary_without_supply_or_trees() {
        let all_trees = vec![hu("Mallee", 1.0, 2, 90000.0, 90000.0)];
        let s = CmaSummary::compute("Mallee", &all_trees, None, &[]).unwrap();
        assert_eq!(s.ghus_without_trees, 0.0);
        assert_eq!(s.average_without_trees, None);
        assert_eq!(s.median_without_trees, None);
        assert_eq!(s.average_lt_value, None);
        assert_eq!(s.supply, 0.0);
        assert_eq!(s.years_of_supply, Some(0.0));
    }

    #[test]
    fn test_metric_rows_and_currency_flags() {
        let s = CmaSummary::compute("Melbourne Water", &trades(), None, &[]).unwrap();
        let metrics = s.metrics();
        assert_eq!(metrics.len(), 16);
        assert_eq!(metrics[0].label, "Total GHUs traded");
        assert_eq!(metrics[15].label, "Years of Supply without WA");

        let currency: Vec<usize> = metrics
            .iter()
            .enumerate()
            .filter(|(_, m)| m.currency)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(currency, vec![1, 2, 3, 5, 6, 7, 8, 10]);
    }

    #[test]
    fn test_shu_summary_counts_distinct_trades() {
        let d1 = date(2024, 1, 10);
        let d2 = date(2024, 2, 5);
        let trades = vec![
            shu(d1, 0.1, 50000.0, "Southern Brown Bandicoot"),
            shu(d1, 0.2, 50000.0, "Growling Grass Frog"),
            shu(d2, 0.5, 70000.0, "Growling Grass Frog"),
            shu(d2, 0.2, 90000.0, "Swift Parrot"),
        ];
        let s = ShuSummary::compute(&trades);
        assert_eq!(s.trades, 3);
        assert!((s.total_shus - 1.0).abs() < 1e-9);
        assert!((s.total_value - 68000.0).abs() < 1e-6);
        assert!((s.average_price.unwrap() - 68000.0).abs() < 1e-6);
        assert_eq!(s.floor_price, Some(50000.0));
        assert_eq!(s.ceiling_price, Some(90000.0));
        assert_eq!(s.median_price, Some(70000.0));
    }

    #[test]
    fn test_empty_shu_summary() {
        let s = ShuSummary::compute(&[]);
        assert_eq!(s.trades, 0);
        assert_eq!(s.average_price, None);
        assert_eq!(s.median_price, None);
        assert_eq!(s.metrics().len(), 7);
    }

    #[test]
    fn test_overview_uses_trades_without_trees() {
        let s = CmaSummary::compute("Melbourne Water", &trades(), None, &[]).unwrap();
        let row = HuOverviewRow::compute(&trades(), &s);
        assert_eq!(row.floor_price, Some(100000.0));
        assert_eq!(row.ceiling_price, Some(120000.0));
        assert_eq!(row.mean_price, Some(110000.0));
        assert_eq!(row.weighted_average, Some(136000.0));
        assert_eq!(row.lts, 4);
    }

    #[test]
    fn test_build_report_groups_and_windows() {
        let mut split = TradeSplit::default();
        split.hu = trades();
        split.hu.push(hu("Corangamite", 1.0, 0, 80000.0, 80000.0));
        let mut old = hu("Corangamite", 9.0, 0, 1.0, 9.0);
        old.date = date(2019, 1, 1);
        split.hu.push(old);
        split.shu = vec![
            shu(date(2023, 12, 1), 0.1, 60000.0, "Swift Parrot"),
            shu(date(2022, 1, 1), 0.1, 40000.0, "Swift Parrot"),
            shu(date(2019, 1, 1), 0.1, 10000.0, "Swift Parrot"),
        ];

        let mut supply = SupplyBook::default();
        supply.push(supply_table("Melbourne Water"));

        let mut settings = Settings::default();
        settings.water_authorities.clear();
        settings
            .water_authorities
            .insert("Melbourne Water".to_string(), vec!["BBA-0277".to_string()]);

        let window = ReportingWindow::new(date(2023, 3, 1), date(2024, 2, 29));
        let report = AnalysisReport::build(window, &split, &supply, &settings).unwrap();

        let names: Vec<&str> = report.cmas.iter().map(|c| c.cma.as_str()).collect();
        assert_eq!(names, vec!["Corangamite", "Melbourne Water"]);
        assert_eq!(report.hu_trades.len(), 4);
        assert_eq!(report.cmas[0].total_ghus, 1.0);
        assert_eq!(report.cmas[0].supply, 0.0);
        assert_eq!(report.cmas[1].wa_supply, 6.0);
        assert_eq!(report.overview.len(), 2);

        assert_eq!(report.shu_one_year.trades, 1);
        assert_eq!(report.shu_three_year.trades, 2);
        assert_eq!(report.shu_trades.len(), 3);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["cmas"][1]["cma"], "Melbourne Water");
        assert!(json.get("hu_trades").is_none());
    }
}
