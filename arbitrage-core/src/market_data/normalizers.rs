//! Field-level normalisation shared by the venue decoders

use crate::exchanges::{ExchangeError, ExchangeResult, Side};

/// Parse a decimal price string; only finite positive prices are accepted
pub fn parse_price(raw: &str) -> ExchangeResult<f64> {
    let price: f64 = raw.trim().parse()?;
    check_price(price)
}

pub fn check_price(price: f64) -> ExchangeResult<f64> {
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(ExchangeError::parse(format!("price out of range: {}", price)))
    }
}

/// Best bid and ask from the first level of each side, as `[price, qty, ..]` rows
pub fn top_of_book(bids: &[Vec<String>], asks: &[Vec<String>]) -> ExchangeResult<Option<(f64, f64)>> {
    let (Some(bid), Some(ask)) = (bids.first(), asks.first()) else {
        return Ok(None);
    };
    let bid = bid
        .first()
        .ok_or_else(|| ExchangeError::parse("empty bid level"))?;
    let ask = ask
        .first()
        .ok_or_else(|| ExchangeError::parse("empty ask level"))?;
    Ok(Some((parse_price(bid)?, parse_price(ask)?)))
}

/// `buy` / `sell` in any letter case
pub fn parse_side(token: &str) -> Option<Side> {
    if token.eq_ignore_ascii_case("buy") {
        Some(Side::Buy)
    } else if token.eq_ignore_ascii_case("sell") {
        Some(Side::Sell)
    } else {
        None
    }
}

/// A print where the buyer was the resting order was initiated by a seller
pub fn side_from_buyer_maker(is_buyer_maker: bool) -> Side {
    if is_buyer_maker {
        Side::Sell
    } else {
        Side::Buy
    }
}

/// Fixed-point oracle price: `mantissa * 10^expo`
pub fn scaled_price(mantissa: &str, expo: i32) -> ExchangeResult<f64> {
    let mantissa: i64 = mantissa
        .trim()
        .parse()
        .map_err(|e| ExchangeError::parse(format!("bad price mantissa {:?}: {}", mantissa, e)))?;
    check_price(mantissa as f64 * 10f64.powi(expo))
}

/// Shortest decimal form that round-trips, for venues that send numeric sizes
pub fn format_quantity(quantity: f64) -> String {
    format!("{}", quantity)
}

/// Millisecond timestamps sent as strings
pub fn parse_millis(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

/// Epoch seconds to milliseconds, `None` when the product overflows
pub fn seconds_to_millis(secs: i64) -> Option<i64> {
    secs.checked_mul(1000)
}

/// Millisecond timestamps sent as JSON floats; `None` unless finite and in `i64` range
pub fn float_millis(millis: f64) -> Option<i64> {
    if millis.is_finite() && millis >= 0.0 && millis < i64::MAX as f64 {
        Some(millis as i64)
    } else {
        None
    }
}
