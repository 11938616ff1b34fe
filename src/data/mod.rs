pub mod cma;
pub mod html;
pub mod ingestion;
pub mod processing;
pub mod sources;
pub mod supply;
pub mod workbook;

pub use cma::CmaMatcher;
pub use ingestion::NvcrClient;
pub use processing::{HuTrade, ReportingWindow, ShuTrade, TradeProcessor, TradeSplit};
pub use sources::{SupplyFile, SupplyPortal, SupplySource, TradeFile, TradePortal, TradeSource};
pub use supply::{SupplyBook, SupplyTable};
pub use workbook::TradeRecord;
