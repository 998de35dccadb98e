use proptest::prelude::*;

use chrono::{Duration, TimeZone, Utc};
use common::{Bar, Direction, SignalKind, TradingConfig};
use risk::PositionManager;

fn bar(i: usize, close: f64, spread: f64) -> Bar {
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    Bar {
        timestamp: start + Duration::hours(i as i64),
        open: close,
        high: close + spread,
        low: close - spread,
        close,
        volume: 10.0,
    }
}

proptest! {
    /// The lifecycle never panics on extreme price inputs, and a close of
    /// any kind always frees the manager for the next entry.
    #[test]
    fn never_panics_on_extreme_prices(
        entry_price in 0.0001f64..1_000_000.0,
        atr in 0.0001f64..50_000.0,
        closes in proptest::collection::vec(0.0001f64..1_000_000.0, 1..40),
    ) {
        let cfg = TradingConfig { quantity: 1.0, ..TradingConfig::default() };
        let mut pm = PositionManager::new(cfg);
        pm.open_position(SignalKind::Buy, &bar(0, entry_price, entry_price * 0.01), atr, 0);

        let mut bar_index = 0;
        for close in &closes {
            bar_index += 1;
            let trades = pm.on_bar(&bar(bar_index, *close, close * 0.01), Some(atr), false, bar_index);
            prop_assert!(trades.len() <= 1);
            if !pm.is_open() {
                break;
            }
        }
        if pm.is_open() {
            prop_assert!(pm.force_close(&bar(bar_index + 1, closes[closes.len() - 1], 0.0), bar_index + 1).is_some());
        }
        prop_assert!(!pm.is_open());
    }

    /// Once set, a long trailing stop never decreases and a short trailing
    /// stop never increases across any close path.
    #[test]
    fn trailing_stop_only_tightens(
        long in any::<bool>(),
        closes in proptest::collection::vec(50.0f64..150.0, 1..60),
    ) {
        // Wide stop/target levels so only the trailing logic moves.
        let cfg = TradingConfig {
            quantity: 1.0,
            stop_loss_multiplier: 1.0,
            take_profit_1_multiplier: 50.0,
            take_profit_2_multiplier: 100.0,
            trailing_tightness: 1.0,
            ..TradingConfig::default()
        };
        let kind = if long { SignalKind::Buy } else { SignalKind::Sell };
        let mut pm = PositionManager::new(cfg);
        pm.open_position(kind, &bar(0, 100.0, 0.0), 100.0, 0);

        let mut last_trail: Option<f64> = None;
        for (i, close) in closes.iter().enumerate() {
            // Zero-spread bars keep the stop and targets out of play; a
            // trail breach just ends the path early.
            pm.on_bar(&bar(i + 1, *close, 0.0), Some(1.0), false, i + 1);
            let Some(position) = pm.current() else { break };
            if let (Some(prev), Some(now)) = (last_trail, position.trailing_stop) {
                match position.direction {
                    Direction::Long => prop_assert!(now >= prev - 1e-9),
                    Direction::Short => prop_assert!(now <= prev + 1e-9),
                }
            }
            prop_assert!(last_trail.is_none() || position.trailing_stop.is_some());
            last_trail = position.trailing_stop;
        }
    }

    /// At most one position exists no matter how entries are attempted.
    #[test]
    fn single_position_invariant(
        attempts in proptest::collection::vec(any::<bool>(), 1..30),
    ) {
        let cfg = TradingConfig { quantity: 1.0, ..TradingConfig::default() };
        let mut pm = PositionManager::new(cfg);
        let mut opened = 0usize;
        for (i, buy) in attempts.iter().enumerate() {
            let kind = if *buy { SignalKind::Buy } else { SignalKind::Sell };
            if pm.open_position(kind, &bar(i, 100.0, 1.0), 2.0, i).is_some() {
                opened += 1;
            }
        }
        // Only the first attempt can open; everything after is refused.
        prop_assert_eq!(opened, 1);
        prop_assert!(pm.is_open());
    }
}
