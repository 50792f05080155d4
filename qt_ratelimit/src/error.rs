use thiserror::Error;

/// Result type for admission operations
pub type Result<T> = std::result::Result<T, LimitError>;

/// Errors that can occur while configuring or consulting a limiter
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitError {
    /// Non-blocking probe found insufficient budget
    #[error("rate limit budget exhausted")]
    Exhausted,

    /// Caller deadline elapsed before the full weight was admitted
    #[error("deadline elapsed before admission")]
    DeadlineExceeded,

    /// Invalid limiter configuration, reported at construction
    #[error("invalid rate limit configuration: {0}")]
    InvalidConfig(&'static str),
}
