use std::future::Future;
use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use tracing::{debug, info, warn};

use super::html;
use super::supply::{SupplyBook, SupplyTable};
use crate::config::Settings;
use crate::error::{Error, Result};

/// Zip local file header; every xlsx starts with it.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Fetches trade and supply data from the Native Vegetation Credit Register.
///
/// One HTTP client with a cookie store is shared by all requests, so the
/// session cookie set by the supply portal's search page is sent back with
/// the search itself.
#[derive(Clone)]
pub struct NvcrClient {
    settings: Settings,
    client: reqwest::Client,
}

impl NvcrClient {
    /// Creates a client using the timeout and user agent from `settings`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(settings: Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(settings.http_timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self { settings, client })
    }

    /// Settings the client was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// configured attempts are used up.
    async fn with_retries<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.settings.retries.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(what, attempt, error = %e, "request failed, retrying");
                    tokio::time::sleep(Duration::from_millis(self.settings.retry_delay_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.with_retries(url, || async move {
            let body = self
                .client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;
            Ok::<_, Error>(body)
        })
        .await
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.with_retries(url, || async move {
            let body = self
                .client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            Ok::<_, Error>(body.to_vec())
        })
        .await
    }

    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<String> {
        self.with_retries(url, || async move {
            let body = self
                .client
                .post(url)
                .form(form)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;
            Ok::<_, Error>(body)
        })
        .await
    }

    /// Finds the trade price workbook link on the regulations page.
    ///
    /// # Errors
    /// `LinkNotFound` if no link carries the configured text
    pub async fn find_trade_download(&self) -> Result<Url> {
        let page_url = &self.settings.trade_page_url;
        let page = self.get_text(page_url).await?;
        let href = html::find_link(&page, &self.settings.trade_link_text)?
            .ok_or_else(|| Error::LinkNotFound(self.settings.trade_link_text.clone()))?;

        let base = Url::parse(page_url)
            .map_err(|e| Error::Config(format!("bad trade page URL {page_url:?}: {e}")))?;
        let url = base
            .join(&href)
            .map_err(|e| Error::Parse(format!("bad download link {href:?}: {e}")))?;
        info!(%url, "download link found");
        Ok(url)
    }

    /// Downloads the latest trade price workbook.
    ///
    /// # Errors
    /// `NotAWorkbook` when the link serves something other than an xlsx file
    pub async fn fetch_trade_workbook(&self) -> Result<Vec<u8>> {
        let url = self.find_trade_download().await?;
        let bytes = self.get_bytes(url.as_str()).await?;
        if !bytes.starts_with(ZIP_MAGIC) {
            return Err(Error::NotAWorkbook(url.to_string()));
        }
        info!(bytes = bytes.len(), "trade workbook downloaded");
        Ok(bytes)
    }

    /// Downloads the trade workbook and writes it to `path` untouched.
    pub async fn save_trade_workbook(&self, path: &Path) -> Result<()> {
        let bytes = self.fetch_trade_workbook().await?;
        tokio::fs::write(path, bytes).await?;
        info!(path = %path.display(), "trade workbook saved");
        Ok(())
    }

    /// Searches the supply portal for all GHUs listed in one CMA.
    ///
    /// The search is for any listing with at least 0.001 GHU and 0.001 SBV
    /// (by default), so every site with credits on offer is returned.
    ///
    /// # Errors
    /// `SupplyTableNotFound` if the results page has too few tables
    pub async fn fetch_supply(&self, cma: &str) -> Result<SupplyTable> {
        let url = &self.settings.supply_url;
        let search_page = self.get_text(url).await?;

        let form = supply_search_form(&search_page, cma, &self.settings)?;
        debug!(cma, fields = form.len(), "submitting supply search");

        let results = self.post_form(url, &form).await?;
        let table = supply_table_from_results(&results, cma, &self.settings)?;
        info!(cma, sites = table.rows.len(), "supply scraped");
        Ok(table)
    }

    /// Scrapes supply for each CMA in turn.
    pub async fn fetch_all_supply(&self, cmas: &[String]) -> Result<SupplyBook> {
        let mut book = SupplyBook::default();
        for cma in cmas {
            println!("Scraping supply data for: {cma} ...");
            book.push(self.fetch_supply(cma).await?);
        }
        Ok(book)
    }
}

/// Builds the supply search submission for one CMA.
///
/// # Arguments
/// * `search_page`: HTML of the search page, carrying the form's hidden state
/// * `cma`: CMA to restrict the search to
/// * `settings`: form selector and search field names
///
/// # Returns
/// The hidden inputs of the search form followed by the search fields
pub fn supply_search_form(
    search_page: &str,
    cma: &str,
    settings: &Settings,
) -> Result<Vec<(String, String)>> {
    let mut form = html::hidden_inputs(search_page, &settings.supply_form_selector)?;
    form.extend(settings.supply_search.form_for(cma));
    Ok(form)
}

/// Picks the supply table out of a search results page.
///
/// The results page carries several tables with the same class. The listing
/// is the one at `settings.supply_table_index`.
///
/// # Errors
/// `SupplyTableNotFound` if the page has too few tables
pub fn supply_table_from_results(
    page: &str,
    cma: &str,
    settings: &Settings,
) -> Result<SupplyTable> {
    let tables = html::extract_tables(page, &settings.supply_table_selector)?;
    let found = tables.len();
    let index = settings.supply_table_index;
    let table = tables
        .into_iter()
        .nth(index)
        .ok_or_else(|| Error::SupplyTableNotFound {
            cma: cma.to_string(),
            index,
            found,
        })?;
    Ok(SupplyTable::from_html(cma, table))
}
