//! Error types for crawl and cleaning operations.

use chromiumoxide::error::CdpError;

/// Errors that abort a crawl or cleaning run.
///
/// Transient page faults (element never appears, navigation timeout,
/// unparseable dates) are handled locally by the discovery and extraction
/// code and never surface here; these variants cover environment-level
/// failures only.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// The browser configuration was rejected before launch.
    #[error("browser config error: {0}")]
    BrowserConfig(String),

    /// The browser process could not be launched or produced no page.
    #[error("browser launch failed: {0}")]
    BrowserLaunch(#[source] CdpError),

    /// A renderer command failed at the session level.
    #[error("renderer command failed: {0}")]
    Renderer(#[source] CdpError),

    /// Reading or writing a dataset artifact failed.
    #[error("dataset io error: {0}")]
    Io(#[from] std::io::Error),

    /// A dataset artifact could not be encoded or decoded.
    #[error("dataset encoding error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for crawl and cleaning operations.
pub type Result<T> = std::result::Result<T, CrawlError>;
