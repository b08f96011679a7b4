use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("WebDriver error ({error}): {message}")]
    WebDriver { error: String, message: String },

    #[error("Timed out after {seconds}s waiting for {what}")]
    ElementTimeout { what: String, seconds: u64 },

    #[error("Failed to connect to proxy: {0}")]
    ProxyConnection(String),

    #[error("Invalid proxy '{0}', expected scheme://host:port")]
    InvalidProxy(String),

    #[error("{0} not installed or not in $PATH: https://github.com/mozilla/geckodriver/releases")]
    DriverNotFound(String),

    #[error("WebDriver failed to start: {0}")]
    DriverStartup(String),

    #[error("Gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        source: Box<ScanError>,
    },

    #[error("Other error: {0}")]
    Other(String),
}

impl ScanError {
    /// Errors worth another full lookup attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScanError::ElementTimeout { .. })
    }

    /// Errors that make every further lookup pointless.
    pub fn is_fatal(&self) -> bool {
        match self {
            ScanError::ProxyConnection(_)
            | ScanError::InvalidProxy(_)
            | ScanError::DriverNotFound(_)
            | ScanError::DriverStartup(_) => true,
            ScanError::RetriesExhausted { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    /// The WebDriver error code, if this came back from the driver.
    pub fn webdriver_code(&self) -> Option<&str> {
        match self {
            ScanError::WebDriver { error, .. } => Some(error.as_str()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
