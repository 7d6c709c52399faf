//! StrategyVariant 레지스트리와 전략 공통 성질 테스트.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trader_core::{Candle, ParameterSet, Signal};
use trader_strategy::{Strategy, StrategyError, StrategyVariant};

fn candles_from_closes(closes: &[Decimal]) -> Vec<Candle> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            Candle::new(
                base + Duration::hours(i as i64),
                *close,
                *close + dec!(0.5),
                *close - dec!(0.5),
                *close,
                dec!(10),
            )
        })
        .collect()
}

fn random_walk(steps: &[i8]) -> Vec<Decimal> {
    let mut price = dec!(1000);
    steps
        .iter()
        .map(|step| {
            price += Decimal::from(*step);
            price
        })
        .collect()
}

// ================================================================================================
// 레지스트리
// ================================================================================================

#[test]
fn test_all_registered_names_build_with_defaults() {
    for name in StrategyVariant::NAMES {
        let strategy = StrategyVariant::from_params(&ParameterSet::for_strategy(*name)).unwrap();
        assert_eq!(strategy.name(), *name);
        assert!(strategy.warmup_period() > 0);
    }
}

#[test]
fn test_unknown_strategy() {
    let err = StrategyVariant::from_params(&ParameterSet::for_strategy("martingale")).unwrap_err();
    assert_eq!(err, StrategyError::UnknownStrategy("martingale".to_string()));
}

#[test]
fn test_missing_strategy_name() {
    let err = StrategyVariant::from_params(&ParameterSet::new().with("fast_period", 5)).unwrap_err();
    assert_eq!(err, StrategyError::MissingStrategy);
}

#[test]
fn test_invalid_parameters_are_errors() {
    let inverted = ParameterSet::for_strategy("ma_cross")
        .with("fast_period", 30)
        .with("slow_period", 10);
    assert!(matches!(
        StrategyVariant::from_params(&inverted),
        Err(StrategyError::InvalidParameter { .. })
    ));

    let zero = ParameterSet::for_strategy("channel_breakout").with("channel_period", 0);
    assert!(matches!(
        StrategyVariant::from_params(&zero),
        Err(StrategyError::InvalidParameter { .. })
    ));

    let typo = ParameterSet::for_strategy("macd_cross").with("signal", 9);
    assert!(matches!(
        StrategyVariant::from_params(&typo),
        Err(StrategyError::InvalidParameter { .. })
    ));

    let bad_type = ParameterSet::for_strategy("ma_cross").with("ma_type", "wma");
    assert!(StrategyVariant::from_params(&bad_type).is_err());
}

#[test]
fn test_engine_overrides_do_not_break_strategy_parsing() {
    let params = ParameterSet::for_strategy("rsi_reversion")
        .with("rsi_period", 10)
        .with("stop_loss_pct", dec!(0.02))
        .with("trailing_stop_pct", dec!(0.01))
        .with("leverage", 2);
    assert!(StrategyVariant::from_params(&params).is_ok());
}

// ================================================================================================
// 전략별 신호
// ================================================================================================

#[test]
fn test_ma_cross_single_golden_cross_on_v_shape() {
    let mut closes: Vec<Decimal> = (0..30).map(|i| dec!(200) - Decimal::from(i)).collect();
    closes.extend((0..30).map(|i| dec!(171) + Decimal::from(i)));
    let candles = candles_from_closes(&closes);

    let params = ParameterSet::for_strategy("ma_cross")
        .with("fast_period", 3)
        .with("slow_period", 8);
    let signals = StrategyVariant::from_params(&params)
        .unwrap()
        .generate_signals(&candles)
        .unwrap();

    let longs = signals.iter().filter(|s| **s == Signal::LongEntry).count();
    let shorts = signals.iter().filter(|s| **s == Signal::ShortEntry).count();
    assert_eq!(longs, 1);
    assert_eq!(shorts, 0);
    let cross = signals.iter().position(|s| *s == Signal::LongEntry).unwrap();
    assert!(cross > 30, "골든 크로스는 반등 이후에만 발생: {cross}");
}

#[test]
fn test_breakout_on_channel_high() {
    let mut closes = vec![dec!(100); 25];
    closes.push(dec!(110));
    closes.push(dec!(110));
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let candles: Vec<Candle> = closes
        .iter()
        .enumerate()
        .map(|(i, c)| Candle::flat(base + Duration::days(i as i64), *c))
        .collect();

    let strategy = StrategyVariant::from_params(&ParameterSet::for_strategy("channel_breakout"))
        .unwrap();
    let signals = strategy.generate_signals(&candles).unwrap();

    assert!(signals[..25].iter().all(|s| *s == Signal::Hold));
    assert_eq!(signals[25], Signal::LongEntry);
    // 다음 캔들의 채널 상단은 이미 110
    assert_eq!(signals[26], Signal::Hold);
}

#[test]
fn test_trend_filtered_holds_during_warmup() {
    let closes: Vec<Decimal> = (0..30).map(|i| dec!(100) + Decimal::from(i % 5)).collect();
    let strategy =
        StrategyVariant::from_params(&ParameterSet::for_strategy("trend_filtered")).unwrap();
    let signals = strategy.generate_signals(&candles_from_closes(&closes)).unwrap();
    assert!(signals.iter().all(|s| *s == Signal::Hold));
}

#[test]
fn test_short_series_is_all_hold_not_error() {
    let candles = candles_from_closes(&[dec!(100), dec!(101), dec!(102)]);
    for name in StrategyVariant::NAMES {
        let strategy = StrategyVariant::from_params(&ParameterSet::for_strategy(*name)).unwrap();
        let signals = strategy.generate_signals(&candles).unwrap();
        assert!(signals.iter().all(|s| *s == Signal::Hold), "{name}");
    }
}

// ================================================================================================
// 미래 참조 없음: 접두 구간의 신호는 전체 구간 신호와 같아야 함
// ================================================================================================

fn small_param_sets() -> Vec<ParameterSet> {
    vec![
        ParameterSet::for_strategy("rsi_reversion")
            .with("rsi_period", 4)
            .with("use_stochastic", true)
            .with("stoch_k_period", 4),
        ParameterSet::for_strategy("channel_breakout")
            .with("channel_period", 5)
            .with("min_atr_pct", dec!(0.0001)),
        ParameterSet::for_strategy("ma_cross")
            .with("fast_period", 3)
            .with("slow_period", 7)
            .with("ma_type", "ema"),
        ParameterSet::for_strategy("macd_cross")
            .with("fast_period", 3)
            .with("slow_period", 6)
            .with("signal_period", 3),
        ParameterSet::for_strategy("trend_filtered")
            .with("rsi_period", 4)
            .with("trend_period", 10)
            .with("adx_period", 4)
            .with("adx_threshold", dec!(10)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_signals_have_no_look_ahead(
        steps in prop::collection::vec(-20i8..=20, 40..80),
        cut in 10usize..40,
    ) {
        let candles = candles_from_closes(&random_walk(&steps));
        for params in small_param_sets() {
            let strategy = StrategyVariant::from_params(&params).unwrap();
            let full = strategy.generate_signals(&candles).unwrap();
            let prefix = strategy.generate_signals(&candles[..cut]).unwrap();
            prop_assert_eq!(&full[..cut], &prefix[..], "{}", params);
        }
    }

    #[test]
    fn prop_signals_are_deterministic(steps in prop::collection::vec(-20i8..=20, 30..60)) {
        let candles = candles_from_closes(&random_walk(&steps));
        for params in small_param_sets() {
            let strategy = StrategyVariant::from_params(&params).unwrap();
            prop_assert_eq!(
                strategy.generate_signals(&candles).unwrap(),
                strategy.generate_signals(&candles).unwrap()
            );
        }
    }
}
