mod bucket;
pub mod error;
pub mod exchanges;
pub mod limiter;
mod registry;
mod time;

pub use error::LimitError;
pub use error::Result;
pub use limiter::Limiter;
pub use limiter::LimiterBuilder;
