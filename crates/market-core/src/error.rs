use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum MarketDataError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Provider not configured: {0}")]
    Unconfigured(String),

    #[error("Provider {provider} error: {message}")]
    Provider { provider: String, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Operation not supported by {0}")]
    Unsupported(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type MarketDataResult<T> = Result<T, MarketDataError>;
