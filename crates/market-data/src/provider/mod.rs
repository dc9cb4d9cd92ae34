//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Provider capabilities
//! - The rate-limited HTTP transport and authentication shared by all clients
//! - Concrete providers (Tradier, Schwab, Alpaca, Yahoo, Finnhub)
//!
//! Each provider value owns its own transport, limiter and token cache.
//! Nothing is shared between instances, so tests can build isolated clients
//! against a mock server.

mod auth;
mod capabilities;
mod client;
mod traits;

pub mod alpaca;
pub mod finnhub;
pub mod schwab;
pub mod tradier;
pub mod yahoo;

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};

pub use auth::{AccessToken, Auth, TokenCache, TokenSource, REFRESH_MARGIN};
pub use capabilities::ProviderCapabilities;
pub use client::ProviderClient;
pub use traits::MarketDataProvider;

/// Expirations loaded when a chain is requested without an explicit expiry.
const CHAIN_HORIZON_DAYS: i64 = 60;
const MAX_CHAIN_EXPIRATIONS: usize = 8;
/// Days out of the expiry a recommendation aims for.
const CHAIN_TARGET_DAYS: i64 = 30;

/// Date range covered by an unfiltered chain request.
pub(crate) fn chain_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today, today + Duration::days(CHAIN_HORIZON_DAYS))
}

/// Pick the expirations to load for an unfiltered chain request.
///
/// Dates inside the horizon are kept as is while they fit under the cap.
/// Past the cap (daily listings), the expiry nearest `today + 30` and its
/// neighbours are always kept and the remaining slots are spread evenly
/// across the horizon. Falls back to the first listed expiry beyond the
/// horizon so the chain is never empty by choice.
pub(crate) fn select_expirations(mut dates: Vec<NaiveDate>, today: NaiveDate) -> Vec<NaiveDate> {
    dates.sort_unstable();
    dates.dedup();
    let (from, to) = chain_window(today);

    let in_window: Vec<NaiveDate> = dates
        .iter()
        .copied()
        .filter(|d| *d >= from && *d <= to)
        .collect();

    if in_window.is_empty() {
        return dates.into_iter().find(|d| *d >= from).into_iter().collect();
    }
    if in_window.len() <= MAX_CHAIN_EXPIRATIONS {
        return in_window;
    }

    let target = today + Duration::days(CHAIN_TARGET_DAYS);
    let last = in_window.len() - 1;
    let anchor = in_window
        .iter()
        .enumerate()
        .min_by_key(|(_, d)| ((**d - target).num_days().abs(), **d))
        .map(|(i, _)| i)
        .unwrap_or(0);

    let mut picked: BTreeSet<usize> = BTreeSet::new();
    picked.insert(anchor.saturating_sub(1));
    picked.insert(anchor);
    picked.insert((anchor + 1).min(last));
    picked.insert(0);
    picked.insert(last);

    let slots = MAX_CHAIN_EXPIRATIONS - 1;
    for step in 0..=slots {
        if picked.len() >= MAX_CHAIN_EXPIRATIONS {
            break;
        }
        picked.insert(step * last / slots);
    }

    picked.into_iter().map(|i| in_window[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_select_expirations_within_horizon() {
        let today = date(2024, 3, 1);
        let dates = vec![
            date(2024, 5, 17),
            date(2024, 2, 23),
            date(2024, 3, 8),
            date(2024, 3, 15),
            date(2024, 3, 8),
        ];
        assert_eq!(
            select_expirations(dates, today),
            vec![date(2024, 3, 8), date(2024, 3, 15)]
        );
    }

    #[test]
    fn test_select_expirations_falls_back_to_next_listed() {
        let today = date(2024, 3, 1);
        let dates = vec![date(2025, 1, 17), date(2024, 12, 20)];
        assert_eq!(select_expirations(dates, today), vec![date(2024, 12, 20)]);
        assert!(select_expirations(vec![], today).is_empty());
    }

    #[test]
    fn test_select_expirations_is_capped() {
        let today = date(2024, 3, 1);
        let dates: Vec<NaiveDate> = (0..20).map(|i| today + Duration::days(i * 2)).collect();
        assert_eq!(select_expirations(dates, today).len(), MAX_CHAIN_EXPIRATIONS);
    }

    #[test]
    fn test_select_expirations_daily_listing_reaches_target() {
        let today = date(2024, 3, 1);
        let dates: Vec<NaiveDate> = (0..90).map(|i| today + Duration::days(i)).collect();
        let selected = select_expirations(dates, today);

        assert_eq!(selected.len(), MAX_CHAIN_EXPIRATIONS);
        assert!(selected.windows(2).all(|w| w[0] < w[1]));
        for expected in [date(2024, 3, 30), date(2024, 3, 31), date(2024, 4, 1)] {
            assert!(selected.contains(&expected), "missing {expected}");
        }
        assert_eq!(selected.first(), Some(&today));
        assert_eq!(selected.last(), Some(&date(2024, 4, 30)));
    }
}
