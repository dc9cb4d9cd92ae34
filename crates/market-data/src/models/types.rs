use std::borrow::Cow;

/// Provider identifier - mostly static constants
pub type ProviderId = Cow<'static, str>;

/// Ticker symbol as requested by the caller (upper-cased)
pub type Symbol = String;

/// Normalize a caller-supplied ticker so cache keys agree across call sites.
pub fn normalize_symbol(symbol: &str) -> Symbol {
    symbol.trim().to_ascii_uppercase()
}
