//! 추세 강도 지표 (ADX).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trader_core::Candle;

use super::{ensure_period, true_range, Series};
use crate::error::IndicatorResult;

/// ADX (Average Directional Index, Wilder).
///
/// +DM/-DM과 TR을 Wilder 방식으로 누적 평활하여 DX를 구하고,
/// DX를 다시 `period`로 평활합니다. 인덱스 `2 * period - 1`부터 정의됩니다.
pub fn adx(candles: &[Candle], period: usize) -> IndicatorResult<Series> {
    ensure_period("ADX", period)?;

    let n = candles.len();
    let mut out = vec![None; n];
    if n < 2 * period {
        return Ok(out);
    }

    let tr = true_range(candles);
    let mut plus_dm = vec![Decimal::ZERO; n];
    let mut minus_dm = vec![Decimal::ZERO; n];
    for i in 1..n {
        let up = candles[i].high - candles[i - 1].high;
        let down = candles[i - 1].low - candles[i].low;
        if up > down && up > Decimal::ZERO {
            plus_dm[i] = up;
        }
        if down > up && down > Decimal::ZERO {
            minus_dm[i] = down;
        }
    }

    let p = Decimal::from(period);
    let mut smooth_tr: Decimal = tr[1..=period].iter().sum();
    let mut smooth_plus: Decimal = plus_dm[1..=period].iter().sum();
    let mut smooth_minus: Decimal = minus_dm[1..=period].iter().sum();

    let mut dx = vec![Decimal::ZERO; n];
    dx[period] = directional_index(smooth_tr, smooth_plus, smooth_minus);
    for i in period + 1..n {
        smooth_tr = smooth_tr - smooth_tr / p + tr[i];
        smooth_plus = smooth_plus - smooth_plus / p + plus_dm[i];
        smooth_minus = smooth_minus - smooth_minus / p + minus_dm[i];
        dx[i] = directional_index(smooth_tr, smooth_plus, smooth_minus);
    }

    let first = 2 * period - 1;
    let mut prev = dx[period..=first].iter().sum::<Decimal>() / p;
    out[first] = Some(prev);
    for i in first + 1..n {
        prev = (prev * (p - Decimal::ONE) + dx[i]) / p;
        out[i] = Some(prev);
    }
    Ok(out)
}

fn directional_index(tr: Decimal, plus_dm: Decimal, minus_dm: Decimal) -> Decimal {
    if tr.is_zero() {
        return Decimal::ZERO;
    }
    let plus_di = plus_dm / tr * dec!(100);
    let minus_di = minus_dm / tr * dec!(100);
    let sum = plus_di + minus_di;
    if sum.is_zero() {
        Decimal::ZERO
    } else {
        (plus_di - minus_di).abs() / sum * dec!(100)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn trending(count: usize, step: Decimal) -> Vec<Candle> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..count)
            .map(|i| {
                let price = dec!(100) + step * Decimal::from(i);
                Candle::new(
                    base + Duration::days(i as i64),
                    price,
                    price + dec!(1),
                    price - dec!(1),
                    price,
                    dec!(1),
                )
            })
            .collect()
    }

    #[test]
    fn test_adx_warmup() {
        let out = adx(&trending(30, dec!(1)), 5).unwrap();
        assert!(out[8].is_none());
        assert!(out[9].is_some());
    }

    #[test]
    fn test_adx_strong_trend_is_high() {
        let out = adx(&trending(40, dec!(2)), 5).unwrap();
        // 하락 DM이 전혀 없는 일방향 추세 → DX = 100
        assert_eq!(out[39], Some(dec!(100)));
    }

    #[test]
    fn test_adx_flat_is_zero() {
        let out = adx(&trending(20, Decimal::ZERO), 5).unwrap();
        assert_eq!(out[19], Some(Decimal::ZERO));
    }

    #[test]
    fn test_adx_insufficient_data() {
        let out = adx(&trending(9, dec!(1)), 5).unwrap();
        assert!(out.iter().all(Option::is_none));
    }
}
