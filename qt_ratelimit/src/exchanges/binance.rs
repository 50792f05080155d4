//! Binance Spot rate-limit schedule
//!
//! Binance budgets REST calls in two independent pools:
//! - **REQUEST_WEIGHT**: 1200 weight per minute, with per-endpoint weights
//!   that also depend on call parameters (orderbook depth, symbol omitted)
//! - **ORDERS**: 100 order-endpoint calls per 10 seconds
//!
//! Reference: https://binance-docs.github.io/apidocs/spot/en/#limits

use std::time::Duration;

use crate::error::Result;
use crate::limiter::Limiter;

/// Request-weight bucket name
pub const SPOT_WEIGHT_BUCKET: &str = "spot-weight";

/// Order-endpoint bucket name
pub const SPOT_ORDERS_BUCKET: &str = "spot-orders";

/// Request weight replenished per minute
const SPOT_WEIGHT_CAPACITY: u32 = 1200;

/// Order calls replenished per ten seconds
const SPOT_ORDERS_CAPACITY: u32 = 100;

/// One rate-cost class of Binance Spot call
///
/// Values are compared, not inspected: the schedule lives in
/// [`EndpointLimit::rate_definition`]. The enum is closed so the compiler
/// guarantees every class has exactly one table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointLimit {
    SpotDefault,
    SpotExchangeInfo,
    SpotHistoricalTrades,
    SpotOrderbookDepth500,
    SpotOrderbookDepth1000,
    SpotOrderbookDepth5000,
    SpotOrderbookTickerAll,
    SpotSymbolPriceAll,
    SpotPriceChangeAll,
    SpotAccountInformation,
    SpotOrder,
    SpotOrderQuery,
    SpotOpenOrdersSpecific,
    SpotOpenOrdersAll,
    SpotAllOrders,
}

impl EndpointLimit {
    /// Every cost class, in schedule order; [`spot_limiter`] routes them all
    pub const ALL: [EndpointLimit; 15] = [
        EndpointLimit::SpotDefault,
        EndpointLimit::SpotExchangeInfo,
        EndpointLimit::SpotHistoricalTrades,
        EndpointLimit::SpotOrderbookDepth500,
        EndpointLimit::SpotOrderbookDepth1000,
        EndpointLimit::SpotOrderbookDepth5000,
        EndpointLimit::SpotOrderbookTickerAll,
        EndpointLimit::SpotSymbolPriceAll,
        EndpointLimit::SpotPriceChangeAll,
        EndpointLimit::SpotAccountInformation,
        EndpointLimit::SpotOrder,
        EndpointLimit::SpotOrderQuery,
        EndpointLimit::SpotOpenOrdersSpecific,
        EndpointLimit::SpotOpenOrdersAll,
        EndpointLimit::SpotAllOrders,
    ];

    /// The published cost of this class: `(bucket name, weight)`
    pub const fn rate_definition(self) -> (&'static str, u32) {
        match self {
            EndpointLimit::SpotDefault => (SPOT_WEIGHT_BUCKET, 1),
            EndpointLimit::SpotOrderbookTickerAll | EndpointLimit::SpotSymbolPriceAll => (SPOT_WEIGHT_BUCKET, 2),
            EndpointLimit::SpotHistoricalTrades | EndpointLimit::SpotOrderbookDepth500 => (SPOT_WEIGHT_BUCKET, 5),
            EndpointLimit::SpotExchangeInfo | EndpointLimit::SpotOrderbookDepth1000 | EndpointLimit::SpotAccountInformation => (SPOT_WEIGHT_BUCKET, 10),
            EndpointLimit::SpotPriceChangeAll => (SPOT_WEIGHT_BUCKET, 40),
            EndpointLimit::SpotOrderbookDepth5000 => (SPOT_WEIGHT_BUCKET, 50),
            EndpointLimit::SpotOrder => (SPOT_ORDERS_BUCKET, 1),
            EndpointLimit::SpotOrderQuery => (SPOT_ORDERS_BUCKET, 2),
            EndpointLimit::SpotOpenOrdersSpecific => (SPOT_ORDERS_BUCKET, 3),
            EndpointLimit::SpotAllOrders => (SPOT_ORDERS_BUCKET, 10),
            EndpointLimit::SpotOpenOrdersAll => (SPOT_ORDERS_BUCKET, 40),
        }
    }
}

/// Classify a best-price (book ticker) query
///
/// Omitting the symbol asks for every symbol's ticker, which Binance charges
/// at a higher weight than a single-symbol lookup.
pub const fn best_price_limit(symbol: Option<&str>) -> EndpointLimit {
    match symbol {
        Some(_) => EndpointLimit::SpotDefault,
        None => EndpointLimit::SpotOrderbookTickerAll,
    }
}

/// Classify an open-orders query by symbol presence, as for best price
pub const fn open_orders_limit(symbol: Option<&str>) -> EndpointLimit {
    match symbol {
        Some(_) => EndpointLimit::SpotOpenOrdersSpecific,
        None => EndpointLimit::SpotOpenOrdersAll,
    }
}

/// Classify an orderbook snapshot query by requested depth
///
/// Tier upper bounds are inclusive and follow the published schedule: depths
/// through 100 cost the default weight, then 500, 1000 and 5000 step up.
/// Depths outside Binance's enumerated set still map through the same
/// boundaries; validating the set is the call site's concern.
pub const fn orderbook_limit(depth: u32) -> EndpointLimit {
    match depth {
        0..=100 => EndpointLimit::SpotDefault,
        101..=500 => EndpointLimit::SpotOrderbookDepth500,
        501..=1000 => EndpointLimit::SpotOrderbookDepth1000,
        _ => EndpointLimit::SpotOrderbookDepth5000,
    }
}

/// Assemble the Spot admission limiter for one client instance
///
/// Wires both budget buckets and routes every [`EndpointLimit`] variant, so a
/// selector without a table entry cannot exist past this point. Cheap enough
/// to call once per client construction.
pub fn spot_limiter() -> Result<Limiter<EndpointLimit>> {
    let mut builder = Limiter::builder()
        .bucket(SPOT_WEIGHT_BUCKET, SPOT_WEIGHT_CAPACITY, Duration::from_secs(60))
        .bucket(SPOT_ORDERS_BUCKET, SPOT_ORDERS_CAPACITY, Duration::from_secs(10));

    for limit in EndpointLimit::ALL {
        let (bucket, weight) = limit.rate_definition();
        builder = builder.route(limit, bucket, weight);
    }

    builder.build()
}
