//! American odds accounting.
//!
//! Odds arrive as posted strings (`"-150"`, `"+130"`, `"EVEN"`). Every
//! function here is total: a string that cannot be read as non-zero American
//! odds yields `0.0`, which callers treat as "no information".

/// Parse an American odds string: an optional sign followed by whole
/// digits, or `EVEN`. Returns `None` for blank, malformed or zero odds.
pub fn parse_american_odds(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("EVEN") {
        return Some(100.0);
    }
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'+') => (1.0, &s[1..]),
        Some(b'-') => (-1.0, &s[1..]),
        _ => (1.0, s),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let magnitude = digits.parse::<u32>().ok()?;
    if magnitude == 0 {
        return None;
    }
    Some(sign * magnitude as f64)
}

/// Profit won on a winning stake of `units` at the given odds.
///
/// Positive odds (e.g. +130): profit = units * odds / 100
/// Negative odds (e.g. -150): profit = units * 100 / |odds|
pub fn profit_per_unit(odds: &str, units: f64) -> f64 {
    match parse_american_odds(odds) {
        Some(o) if o > 0.0 => units * o / 100.0,
        Some(o) => units * 100.0 / o.abs(),
        None => 0.0,
    }
}

/// Profit for a winning pick, falling back to even money when the posted
/// odds are missing or unreadable.
pub fn settled_profit(odds: Option<&str>, units: f64) -> f64 {
    let profit = odds.map(|o| profit_per_unit(o, units)).unwrap_or(0.0);
    if profit == 0.0 {
        units
    } else {
        profit
    }
}

/// Convert American odds to implied probability (0-1).
/// Positive odds (e.g., +150): prob = 100 / (odds + 100)
/// Negative odds (e.g., -150): prob = |odds| / (|odds| + 100)
pub fn implied_probability(odds: &str) -> f64 {
    match parse_american_odds(odds) {
        Some(o) if o > 0.0 => 100.0 / (o + 100.0),
        Some(o) => {
            let abs = o.abs();
            abs / (abs + 100.0)
        }
        None => 0.0,
    }
}
