use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use super::ingestion::NvcrClient;
use super::supply::SupplyBook;
use super::workbook::{read_supply_workbook, read_trade_workbook, TradeRecord};
use crate::error::Result;

/// Where trade records come from.
#[async_trait]
pub trait TradeSource: Send + Sync {
    async fn load(&self) -> Result<Vec<TradeRecord>>;

    fn describe(&self) -> String;
}

/// Where per-CMA supply comes from.
#[async_trait]
pub trait SupplySource: Send + Sync {
    async fn load(&self, cmas: &[String]) -> Result<SupplyBook>;

    fn describe(&self) -> String;
}

/// A trade workbook already on disk.
pub struct TradeFile(pub PathBuf);

/// The latest trade workbook from the register.
pub struct TradePortal(pub NvcrClient);

/// A supply workbook written by an earlier `supply` run.
pub struct SupplyFile(pub PathBuf);

/// Live supply scraped from the register's search portal.
pub struct SupplyPortal(pub NvcrClient);

#[async_trait]
impl TradeSource for TradeFile {
    async fn load(&self) -> Result<Vec<TradeRecord>> {
        info!(path = %self.0.display(), "loading trade workbook");
        let bytes = tokio::fs::read(&self.0).await?;
        read_trade_workbook(bytes)
    }

    fn describe(&self) -> String {
        format!("trade data from {}", self.0.display())
    }
}

#[async_trait]
impl TradeSource for TradePortal {
    async fn load(&self) -> Result<Vec<TradeRecord>> {
        let bytes = self.0.fetch_trade_workbook().await?;
        read_trade_workbook(bytes)
    }

    fn describe(&self) -> String {
        format!("NVCR trade data from {}", self.0.settings().trade_page_url)
    }
}

#[async_trait]
impl SupplySource for SupplyFile {
    async fn load(&self, cmas: &[String]) -> Result<SupplyBook> {
        info!(path = %self.0.display(), "loading supply workbook");
        let bytes = tokio::fs::read(&self.0).await?;
        read_supply_workbook(bytes, cmas)
    }

    fn describe(&self) -> String {
        format!("supply data from {}", self.0.display())
    }
}

#[async_trait]
impl SupplySource for SupplyPortal {
    async fn load(&self, cmas: &[String]) -> Result<SupplyBook> {
        self.0.fetch_all_supply(cmas).await
    }

    fn describe(&self) -> String {
        format!("supply data from {}", self.0.settings().supply_url)
    }
}
