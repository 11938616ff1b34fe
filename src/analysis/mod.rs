pub mod stats;
pub mod summary;

pub use summary::{AnalysisReport, CmaSummary, HuOverviewRow, Metric, ShuSummary};
