//! The errors that can occur.

use thiserror::Error;

/// A type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// The possible errors that can occur.
#[derive(Debug, Error)]
pub enum Error {
    /// The input is neither a known URL shape nor a bare identifier.
    #[error("Not a valid video reference: {0}")]
    InvalidReference(String),
    /// The watch page (or player script) could not be fetched.
    #[error("Failed to fetch the page: {0}")]
    FetchFailed(String),
    /// The page was fetched but the player configuration could not be located or parsed.
    #[error("Player configuration not found in page: {0}")]
    ManifestNotFound(String),
    /// The manifest was parsed but no format entry could be resolved.
    #[error("No resolvable formats for video {0}")]
    NoResolvableFormats(String),

    /// The stream is wrapped in a signature cipher that must be descrambled externally.
    #[error("Format {itag} is signature-protected and needs descrambling (player script: {})", .player_script.as_deref().unwrap_or("unknown"))]
    DescramblingRequired {
        itag: u32,
        player_script: Option<String>,
    },
    /// The requested option does not exist in the bundle.
    #[error("No option labelled {0}")]
    OptionNotFound(String),
    /// The configuration file is malformed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// An error occurred while interacting with the file system.
    #[error("An IO error occurred: {0}")]
    Io(#[from] std::io::Error),
    /// An error occurred while transferring stream bytes.
    #[error("An error occurred while fetching: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether this error is one of the kinds surfaced by the resolution pipeline itself.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidReference(_)
                | Error::FetchFailed(_)
                | Error::ManifestNotFound(_)
                | Error::NoResolvableFormats(_)
        )
    }
}
