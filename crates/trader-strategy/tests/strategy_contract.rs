//! Strategy trait 계약 테스트.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trader_core::{Bar, MarketDataSet, SeriesKey, Timeframe};
use trader_strategy::{MaCrossConfig, MovingAverageCrossStrategy, ScriptedStrategy, Strategy};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn series(step_hours: i64, prices: &[u32]) -> Vec<Bar> {
    prices
        .iter()
        .enumerate()
        .map(|(i, p)| Bar::flat(start() + Duration::hours(i as i64 * step_hours), Decimal::from(*p), dec!(1)))
        .collect()
}

fn drive(strategy: &mut dyn Strategy, data: &MarketDataSet) -> usize {
    let mut count = 0;
    for t in data.timeline() {
        let view = data.view_at(t);
        strategy.calculate_indicators(&view).unwrap();
        count += strategy.generate_signals(&view).unwrap().len();
    }
    count
}

#[test]
fn test_boxed_strategy_dispatch() {
    let data = MarketDataSet::new().with_series(
        SeriesKey::new("BTC", Timeframe::H1),
        series(1, &[10, 9, 8, 7, 12, 13, 5, 4, 15]),
    );
    let mut boxed: Box<dyn Strategy> = Box::new(
        MovingAverageCrossStrategy::new(MaCrossConfig::default().with_periods(2, 3)).unwrap(),
    );

    assert_eq!(boxed.name(), "ma_cross");
    assert!(drive(boxed.as_mut(), &data) > 0);
    assert!(boxed.get_state().get("indicators").is_some());
}

#[test]
fn test_signals_only_for_symbols_in_view() {
    // ETH 데이터는 BTC보다 늦게 시작
    let data = MarketDataSet::new()
        .with_series(SeriesKey::new("BTC", Timeframe::H1), series(1, &[10, 9, 8, 7, 12, 13]))
        .with_series(
            SeriesKey::new("ETH", Timeframe::H1),
            series(1, &[20, 19, 18, 17, 30, 31])
                .into_iter()
                .map(|mut b| {
                    b.timestamp += Duration::hours(3);
                    b
                })
                .collect(),
        );
    let mut strategy =
        MovingAverageCrossStrategy::new(MaCrossConfig::default().with_periods(2, 3)).unwrap();

    for t in data.timeline() {
        let view = data.view_at(t);
        strategy.calculate_indicators(&view).unwrap();
        for signal in strategy.generate_signals(&view).unwrap() {
            assert!(view.contains(&signal.symbol), "{} not in view at {t}", signal.symbol);
        }
    }
}

proptest! {
    #[test]
    fn prop_views_never_expose_future_bars(
        fast in proptest::collection::vec(1u32..1000, 1..40),
        slow in proptest::collection::vec(1u32..1000, 1..15),
    ) {
        let data = MarketDataSet::new()
            .with_series(SeriesKey::new("BTC", Timeframe::H1), series(1, &fast))
            .with_series(SeriesKey::new("BTC", Timeframe::H4), series(4, &slow))
            .with_series(SeriesKey::new("ETH", Timeframe::H4), series(4, &slow));
        let mut strategy = ScriptedStrategy::new("observer");

        drive(&mut strategy, &data);

        prop_assert_eq!(strategy.observations().len(), data.timeline().len());
        for obs in strategy.observations() {
            prop_assert!(obs.latest_bar.is_some());
            prop_assert!(obs.latest_bar.unwrap() <= obs.view_timestamp);
        }
    }
}
