use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to send the HTTP request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Exchange returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Unknown trading symbol: {0}")]
    UnknownSymbol(String),

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),

    #[error("Invalid data format from API: {0}")]
    InvalidData(String),

    #[error("No network available for {0}")]
    NoNetwork(String),

    #[error("Exchange call '{0}' timed out")]
    Timeout(String),
}

impl ApiError {
    /// True when the exchange does not list the requested market.
    pub fn is_unknown_symbol(&self) -> bool {
        matches!(self, ApiError::UnknownSymbol(_))
    }
}
