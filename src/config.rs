use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const TRADE_PAGE_URL: &str =
    "https://www.environment.vic.gov.au/native-vegetation/native-vegetation-removal-regulations";
const TRADE_LINK_TEXT: &str = "Traded credits information";
const SUPPLY_URL: &str = "https://nvcr.delwp.vic.gov.au/Search/GHU";

/// CMAs reported on, in reporting order.
pub const DEFAULT_CMAS: [&str; 10] = [
    "Corangamite",
    "Melbourne Water",
    "Wimmera",
    "Glenelg Hopkins",
    "Goulburn Broken",
    "West Gippsland",
    "East Gippsland",
    "Mallee",
    "North Central",
    "North East",
];

const DEFAULT_WATER_AUTHORITIES: [(&str, &[&str]); 4] = [
    ("Corangamite", &["BBA-2252"]),
    ("Glenelg Hopkins", &["TFN-C0228"]),
    (
        "Melbourne Water",
        &["BBA-0277", "BBA-0670", "BBA-0677", "BBA-0678"],
    ),
    (
        "West Gippsland",
        &[
            "BBA-3049", "BBA-2845", "BBA-2839", "BBA-2790", "BBA-2789", "BBA-2751", "BBA-2766",
            "BBA-2623",
        ],
    ),
];

/// Field names and values submitted to the GHU supply search form.
#[derive(Debug, Clone)]
pub struct SupplySearch {
    pub ghu_field: String,
    pub sbv_field: String,
    pub lt_field: String,
    pub cma_field: String,
    pub min_ghu: String,
    pub min_sbv: String,
    pub min_lt: String,
}

impl SupplySearch {
    /// Form pairs for a search restricted to one CMA.
    pub fn form_for(&self, cma: &str) -> Vec<(String, String)> {
        vec![
            (self.ghu_field.clone(), self.min_ghu.clone()),
            (self.sbv_field.clone(), self.min_sbv.clone()),
            (self.lt_field.clone(), self.min_lt.clone()),
            (self.cma_field.clone(), cma.to_string()),
        ]
    }
}

/// Runtime settings, read from the environment (and `.env`) with defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub trade_page_url: String,
    pub trade_link_text: String,
    pub supply_url: String,
    pub supply_form_selector: String,
    pub supply_table_selector: String,
    pub supply_table_index: usize,
    pub supply_search: SupplySearch,
    pub cmas: Vec<String>,
    pub water_authorities: BTreeMap<String, Vec<String>>,
    pub http_timeout_secs: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub user_agent: String,
    pub output_dir: PathBuf,
    pub font_name: String,
    pub font_size: f64,
    pub currency_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trade_page_url: TRADE_PAGE_URL.to_string(),
            trade_link_text: TRADE_LINK_TEXT.to_string(),
            supply_url: SUPPLY_URL.to_string(),
            supply_form_selector: "#GeneralGuidelineSearch".to_string(),
            supply_table_selector: "table.table".to_string(),
            supply_table_index: 4,
            supply_search: SupplySearch {
                ghu_field: "GHU".to_string(),
                sbv_field: "SBV".to_string(),
                lt_field: "LT".to_string(),
                cma_field: "CMA".to_string(),
                min_ghu: "0.001".to_string(),
                min_sbv: "0.001".to_string(),
                min_lt: "0".to_string(),
            },
            cmas: DEFAULT_CMAS.iter().map(|s| s.to_string()).collect(),
            water_authorities: DEFAULT_WATER_AUTHORITIES
                .iter()
                .map(|(cma, sites)| {
                    (
                        cma.to_string(),
                        sites.iter().map(|s| s.to_string()).collect(),
                    )
                })
                .collect(),
            http_timeout_secs: 60,
            retries: 3,
            retry_delay_ms: 2000,
            user_agent: concat!("nvcr-trade/", env!("CARGO_PKG_VERSION")).to_string(),
            output_dir: PathBuf::from("."),
            font_name: "Rubik Light".to_string(),
            font_size: 10.0,
            currency_format: "$#,##0.00".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from `NVCR_*` environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    ///
    /// # Errors
    /// Returns `Error::Config` when a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut s = Self::default();

        if let Some(v) = lookup("NVCR_TRADE_PAGE_URL") {
            s.trade_page_url = v;
        }
        if let Some(v) = lookup("NVCR_TRADE_LINK_TEXT") {
            s.trade_link_text = v;
        }
        if let Some(v) = lookup("NVCR_SUPPLY_URL") {
            s.supply_url = v;
        }
        if let Some(v) = lookup("NVCR_SUPPLY_FORM_SELECTOR") {
            s.supply_form_selector = v;
        }
        if let Some(v) = lookup("NVCR_SUPPLY_TABLE_SELECTOR") {
            s.supply_table_selector = v;
        }
        if let Some(v) = lookup("NVCR_SUPPLY_TABLE_INDEX") {
            s.supply_table_index = parse_var("NVCR_SUPPLY_TABLE_INDEX", &v)?;
        }
        if let Some(v) = lookup("NVCR_SUPPLY_CMA_FIELD") {
            s.supply_search.cma_field = v;
        }
        if let Some(v) = lookup("NVCR_SUPPLY_GHU_FIELD") {
            s.supply_search.ghu_field = v;
        }
        if let Some(v) = lookup("NVCR_SUPPLY_SBV_FIELD") {
            s.supply_search.sbv_field = v;
        }
        if let Some(v) = lookup("NVCR_SUPPLY_LT_FIELD") {
            s.supply_search.lt_field = v;
        }
        if let Some(v) = lookup("NVCR_CMAS") {
            s.cmas = v
                .split(';')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
            if s.cmas.is_empty() {
                return Err(Error::Config("NVCR_CMAS lists no CMAs".into()));
            }
        }
        if let Some(v) = lookup("NVCR_WATER_AUTHORITIES") {
            s.water_authorities = parse_water_authorities(&v)?;
        }
        if let Some(v) = lookup("NVCR_HTTP_TIMEOUT_SECS") {
            s.http_timeout_secs = parse_var("NVCR_HTTP_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("NVCR_RETRIES") {
            s.retries = parse_var("NVCR_RETRIES", &v)?;
        }
        if let Some(v) = lookup("NVCR_RETRY_DELAY_MS") {
            s.retry_delay_ms = parse_var("NVCR_RETRY_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("NVCR_USER_AGENT") {
            s.user_agent = v;
        }
        if let Some(v) = lookup("NVCR_OUTPUT_DIR") {
            s.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("NVCR_FONT_NAME") {
            s.font_name = v;
        }
        if let Some(v) = lookup("NVCR_FONT_SIZE") {
            s.font_size = parse_var("NVCR_FONT_SIZE", &v)?;
        }
        if let Some(v) = lookup("NVCR_CURRENCY_FORMAT") {
            s.currency_format = v;
        }

        Ok(s)
    }

    /// Water authority credit sites for a CMA (empty if none are known).
    pub fn water_authority_sites(&self, cma: &str) -> &[String] {
        self.water_authorities
            .get(cma)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} has invalid value {value:?}")))
}

/// Parses `CMA=SITE,SITE;CMA=SITE` into a map.
fn parse_water_authorities(value: &str) -> Result<BTreeMap<String, Vec<String>>> {
    let mut out = BTreeMap::new();
    for entry in value.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (cma, sites) = entry.split_once('=').ok_or_else(|| {
            Error::Config(format!("water authority entry {entry:?} is missing '='"))
        })?;
        let sites: Vec<String> = sites
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        out.insert(cma.trim().to_string(), sites);
    }
    Ok(out)
}
