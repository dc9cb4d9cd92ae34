/// Listed strike spacing for an underlying trading at `price`.
pub fn strike_increment(price: f64) -> f64 {
    if price < 50.0 {
        1.0
    } else if price <= 200.0 {
        5.0
    } else {
        10.0
    }
}

/// Nearest realistic strike to `price`. Never below 1.
pub fn round_to_strike(price: f64) -> f64 {
    let increment = strike_increment(price);
    ((price / increment).round() * increment).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_round_to_strike_bands() {
        assert_eq!(round_to_strike(23.4), 23.0);
        assert_eq!(round_to_strike(49.6), 50.0);
        assert_eq!(round_to_strike(187.3), 185.0);
        assert_eq!(round_to_strike(189.3), 190.0);
        assert_eq!(round_to_strike(200.0), 200.0);
        assert_eq!(round_to_strike(436.0), 440.0);
        assert_eq!(round_to_strike(0.2), 1.0);
    }

    proptest! {
        #[test]
        fn prop_round_to_strike_is_idempotent(x in 0.01f64..10_000.0) {
            let once = round_to_strike(x);
            prop_assert_eq!(round_to_strike(once), once);
        }
    }
}
