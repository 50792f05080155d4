//! Pre-wired admission limiters for cryptocurrency exchanges
//!
//! Each submodule encodes one exchange's published cost schedule: a closed
//! selector enum for its rate-cost classes, resolver functions turning call
//! parameters into selectors, and a factory function assembling the buckets
//! and routes into a [`Limiter`](crate::Limiter).
//!
//! # Supported Exchanges
//!
//! - **Binance**: Spot request-weight and order budgets

pub mod binance;
