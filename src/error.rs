use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while collecting, parsing or reporting NVCR data.
///
/// `main` wraps these in `anyhow` with the step that failed.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Workbook could not be opened or read
    #[error("Failed to read workbook: {0}")]
    WorkbookRead(#[from] calamine::XlsxError),

    /// Workbook could not be written
    #[error("Failed to write workbook: {0}")]
    WorkbookWrite(#[from] rust_xlsxwriter::XlsxError),

    /// CSV output failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The trade page no longer carries the expected download link
    #[error("No link containing {0:?} found on the trade page")]
    LinkNotFound(String),

    /// A download did not produce an xlsx file
    #[error("Response from {0} is not an xlsx workbook")]
    NotAWorkbook(String),

    /// A required sheet is absent
    #[error("Sheet {0:?} not found in workbook")]
    MissingSheet(String),

    /// A required column is absent from a sheet or table
    #[error("Column {column:?} not found in {table}")]
    MissingColumn { table: String, column: String },

    /// The supply search returned fewer tables than expected
    #[error("Supply table #{index} not found for {cma} ({found} tables on page)")]
    SupplyTableNotFound {
        cma: String,
        index: usize,
        found: usize,
    },

    /// Data parsing error
    #[error("Failed to parse data: {0}")]
    Parse(String),
}

impl Error {
    /// Check if the error is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map_or(false, |s| s.is_server_error())
            }
            _ => false,
        }
    }
}
