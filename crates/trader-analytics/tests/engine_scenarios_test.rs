//! 시뮬레이션 엔진 시나리오 테스트.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trader_analytics::{
    evaluate, simulate, BacktestConfig, BacktestEngine, ExitReason, SimulationResult,
};
use trader_core::{Candle, Side, Signal, TradeMode};

fn base_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// 시가=고가=저가=종가인 캔들 시계열
fn create_flat_candles(closes: &[Decimal]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| Candle::flat(base_time() + Duration::days(i as i64), *close))
        .collect()
}

fn signals_at(len: usize, entries: &[(usize, Signal)]) -> Vec<Signal> {
    let mut signals = vec![Signal::Hold; len];
    for (index, signal) in entries {
        signals[*index] = *signal;
    }
    signals
}

fn assert_trade_invariants(candles: &[Candle], result: &SimulationResult) {
    assert_eq!(result.equity.len(), candles.len());
    for (point, candle) in result.equity.iter().zip(candles) {
        assert_eq!(point.timestamp, candle.timestamp);
        assert!(point.account_value >= Decimal::ZERO);
    }
    for trade in &result.trades {
        assert!(trade.exit_time > trade.entry_time);
        let entry = candles
            .iter()
            .find(|c| c.timestamp == trade.entry_time)
            .unwrap();
        let exit = candles
            .iter()
            .find(|c| c.timestamp == trade.exit_time)
            .unwrap();
        // 진입은 종가, 청산은 청산 캔들 범위 안의 가격
        assert_eq!(trade.entry_price, entry.close);
        assert!(trade.exit_price >= exit.low && trade.exit_price <= exit.high);
    }
}

// ================================================================================================
// 시나리오
// ================================================================================================

#[test]
fn test_flat_series_has_no_trades() {
    let candles = create_flat_candles(&[dec!(100); 100]);
    let signals = vec![Signal::Hold; 100];
    let config = BacktestConfig::new(dec!(10000));

    let result = simulate(&candles, &signals, &config).unwrap();
    let summary = evaluate(&result.trades, &result.equity, config.periods_per_year);

    assert!(result.trades.is_empty());
    assert_eq!(result.final_balance, dec!(10000));
    assert!(result.equity.iter().all(|p| p.account_value == dec!(10000)));
    assert_eq!(summary.num_trades, 0);
    assert_eq!(summary.total_return_pct, 0.0);
    assert_eq!(summary.max_drawdown_pct, 0.0);
}

#[test]
fn test_single_profitable_long() {
    let mut closes = vec![dec!(100); 10];
    closes.push(dec!(110));
    let candles = create_flat_candles(&closes);
    let signals = signals_at(11, &[(0, Signal::LongEntry), (10, Signal::Exit)]);
    let config = BacktestConfig::new(dec!(10000)).with_fee_rate(dec!(0.001));

    let result = simulate(&candles, &signals, &config).unwrap();
    assert_trade_invariants(&candles, &result);
    assert_eq!(result.trades.len(), 1);

    let trade = &result.trades[0];
    assert_eq!(trade.side, Side::Long);
    assert_eq!(trade.exit_reason, ExitReason::Signal);
    assert_eq!(trade.size, dec!(100));
    assert_eq!(trade.pnl, (dec!(110) * dec!(0.999) - dec!(100) * dec!(1.001)) * trade.size);
    assert_eq!(trade.fee_paid, dec!(21));
    assert_eq!(result.final_balance, dec!(10979));

    let summary = evaluate(&result.trades, &result.equity, config.periods_per_year);
    assert_eq!(summary.num_trades, 1);
    assert_eq!(summary.win_rate_pct, 100.0);
    assert!(summary.has_infinite_profit_factor());
}

#[test]
fn test_round_trip_at_fixed_price_costs_two_fees() {
    let candles = create_flat_candles(&[dec!(100); 5]);
    let signals = signals_at(5, &[(1, Signal::LongEntry), (3, Signal::Exit)]);
    let fee_rate = dec!(0.0015);
    let config = BacktestConfig::new(dec!(5000)).with_fee_rate(fee_rate);

    let result = simulate(&candles, &signals, &config).unwrap();
    let trade = &result.trades[0];
    assert_eq!(trade.pnl, -dec!(2) * fee_rate * trade.notional);
    assert_eq!(result.final_balance, dec!(5000) + trade.pnl);
}

#[test]
fn test_stop_loss_triggers_before_signal_exit() {
    let mut candles = create_flat_candles(&[dec!(100); 8]);
    let t3 = candles[3].timestamp;
    candles[3] = Candle::new(t3, dec!(99), dec!(100), dec!(97), dec!(99), dec!(1));
    let signals = signals_at(8, &[(0, Signal::LongEntry), (6, Signal::Exit)]);
    let config = BacktestConfig::new(dec!(10000)).with_stop_loss(dec!(0.02));

    let result = simulate(&candles, &signals, &config).unwrap();
    assert_trade_invariants(&candles, &result);
    assert_eq!(result.trades.len(), 1);

    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    assert_eq!(trade.exit_time, t3);
    assert_eq!(trade.exit_price, dec!(98));
    assert!(result.open_positions.is_empty());
}

#[test]
fn test_trailing_stop_follows_high_water_mark() {
    let closes = [dec!(100), dec!(105), dec!(110), dec!(108), dec!(100)];
    let base = base_time();
    let candles: Vec<Candle> = closes
        .iter()
        .enumerate()
        .map(|(i, c)| {
            Candle::new(base + Duration::days(i as i64), *c, *c + dec!(1), *c - dec!(1), *c, dec!(1))
        })
        .collect();
    let signals = signals_at(5, &[(0, Signal::LongEntry)]);
    let config = BacktestConfig::new(dec!(10000))
        .with_fee_rate(Decimal::ZERO)
        .with_trailing_stop(dec!(0.05));

    let mut engine = BacktestEngine::new(&candles, &signals, &config).unwrap();
    // 진입 캔들에서는 기준가 = 진입가
    engine.step().unwrap();
    assert_eq!(engine.positions()[0].trailing_anchor, dec!(100));
    engine.step().unwrap();
    assert_eq!(engine.positions()[0].trailing_anchor, dec!(106));
    engine.step().unwrap();
    assert_eq!(engine.positions()[0].trailing_anchor, dec!(111));
    // 캔들 3: 저가 107 > 스탑 105.45, 기준가 유지
    engine.step().unwrap();
    assert_eq!(engine.positions()[0].trailing_anchor, dec!(111));
    // 캔들 4: 시가 100으로 갭 하락 → 시가 체결
    engine.step().unwrap();
    let result = engine.finish();
    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].exit_reason, ExitReason::TrailingStop);
    assert_eq!(result.trades[0].exit_price, dec!(100));
}

#[test]
fn test_open_position_reported_not_closed() {
    let closes = [dec!(100), dec!(102), dec!(104)];
    let candles = create_flat_candles(&closes);
    let signals = signals_at(3, &[(0, Signal::LongEntry)]);
    let config = BacktestConfig::new(dec!(1000)).with_fee_rate(Decimal::ZERO);

    let result = simulate(&candles, &signals, &config).unwrap();
    assert!(result.trades.is_empty());
    assert_eq!(result.open_positions.len(), 1);
    assert_eq!(result.open_positions[0].unrealized_pnl, dec!(40));
    assert_eq!(result.equity.last().unwrap().account_value, dec!(1040));
    assert_eq!(result.final_balance, dec!(1000));
}

#[test]
fn test_leverage_scales_pnl() {
    let candles = create_flat_candles(&[dec!(100), dec!(110)]);
    let signals = signals_at(2, &[(0, Signal::LongEntry), (1, Signal::Exit)]);
    let config = BacktestConfig::new(dec!(1000))
        .with_fee_rate(Decimal::ZERO)
        .with_leverage(dec!(3));

    let result = simulate(&candles, &signals, &config).unwrap();
    assert_eq!(result.trades[0].pnl, dec!(300));
    // 명목 금액은 증거금 비율을 넘지 않음
    assert_eq!(result.trades[0].notional, dec!(1000));
}

#[test]
fn test_short_only_mode_ignores_long_signals() {
    let candles = create_flat_candles(&[dec!(100), dec!(90), dec!(95), dec!(80)]);
    let signals = vec![
        Signal::LongEntry,
        Signal::ShortEntry,
        Signal::Hold,
        Signal::Exit,
    ];
    let config = BacktestConfig::new(dec!(900))
        .with_fee_rate(Decimal::ZERO)
        .with_trade_mode(TradeMode::ShortOnly);

    let result = simulate(&candles, &signals, &config).unwrap();
    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].side, Side::Short);
    // 900 / 90 = 10개, (80 - 90) × 10 × -1
    assert_eq!(result.trades[0].pnl, dec!(100));
}

// ================================================================================================
// 속성 테스트
// ================================================================================================

fn build_candles(steps: &[(i8, u8, u8)]) -> (Vec<Candle>, Vec<Signal>) {
    let mut price = dec!(1000);
    let mut candles = Vec::with_capacity(steps.len());
    let mut signals = Vec::with_capacity(steps.len());
    for (i, (step, wiggle, signal)) in steps.iter().enumerate() {
        let open = price;
        price += Decimal::from(*step);
        let close = price;
        let wiggle = Decimal::from(*wiggle);
        candles.push(Candle::new(
            base_time() + Duration::hours(i as i64),
            open,
            open.max(close) + wiggle,
            open.min(close) - wiggle,
            close,
            dec!(1),
        ));
        signals.push(match signal % 4 {
            0 => Signal::Hold,
            1 => Signal::LongEntry,
            2 => Signal::ShortEntry,
            _ => Signal::Exit,
        });
    }
    (candles, signals)
}

fn config_strategy() -> impl Strategy<Value = BacktestConfig> {
    (
        prop::option::of(prop_oneof![Just(dec!(0.01)), Just(dec!(0.03))]),
        prop::option::of(prop_oneof![Just(dec!(0.02)), Just(dec!(0.05))]),
        prop::option::of(prop_oneof![Just(dec!(0.015)), Just(dec!(0.04))]),
        1usize..=3,
        1i64..=3,
    )
        .prop_map(|(stop_loss, take_profit, trailing, slots, leverage)| {
            let mut config = BacktestConfig::new(dec!(10000))
                .with_trade_mode(TradeMode::LongAndShort)
                .with_max_slots(slots)
                .with_leverage(Decimal::from(leverage));
            config.stop_loss_pct = stop_loss;
            config.take_profit_pct = take_profit;
            config.trailing_stop_pct = trailing;
            config
        })
}

proptest! {
    #[test]
    fn prop_simulation_is_deterministic(
        steps in prop::collection::vec((-3i8..=3, 0u8..3, 0u8..4), 1..120),
        config in config_strategy(),
    ) {
        let (candles, signals) = build_candles(&steps);
        let first = simulate(&candles, &signals, &config).unwrap();
        let second = simulate(&candles, &signals, &config).unwrap();
        prop_assert_eq!(&first, &second);
        assert_trade_invariants(&candles, &first);
    }

    #[test]
    fn prop_trailing_anchor_never_retreats(
        steps in prop::collection::vec((-3i8..=3, 0u8..3, 0u8..4), 1..120),
        config in config_strategy(),
    ) {
        let (candles, signals) = build_candles(&steps);
        let mut engine = BacktestEngine::new(&candles, &signals, &config).unwrap();
        let mut previous: Vec<(usize, Side, Decimal)> = Vec::new();

        while engine.step().unwrap() {
            for position in engine.positions() {
                if let Some((_, side, anchor)) =
                    previous.iter().find(|(index, _, _)| *index == position.entry_index)
                {
                    match side {
                        Side::Long => prop_assert!(position.trailing_anchor >= *anchor),
                        Side::Short => prop_assert!(position.trailing_anchor <= *anchor),
                    }
                }
            }
            previous = engine
                .positions()
                .iter()
                .map(|p| (p.entry_index, p.side, p.trailing_anchor))
                .collect();
        }
    }

    #[test]
    fn prop_drawdown_is_bounded(
        steps in prop::collection::vec((-3i8..=3, 0u8..3, 0u8..4), 1..120),
        config in config_strategy(),
    ) {
        let (candles, signals) = build_candles(&steps);
        let result = simulate(&candles, &signals, &config).unwrap();
        let summary = evaluate(&result.trades, &result.equity, config.periods_per_year);
        prop_assert!(summary.max_drawdown_pct >= 0.0);
        prop_assert!(summary.max_drawdown_pct <= 100.0);
        prop_assert!(summary.sharpe_ratio.is_finite());
    }
}
