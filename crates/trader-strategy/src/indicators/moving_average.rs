//! 이동평균 (SMA, EMA).

use rust_decimal::Decimal;

use super::{ensure_period, Series};
use crate::error::IndicatorResult;

/// 단순 이동평균.
///
/// 인덱스 `period - 1`부터 값이 정의됩니다.
pub fn sma(values: &[Decimal], period: usize) -> IndicatorResult<Series> {
    ensure_period("SMA", period)?;

    let divisor = Decimal::from(period);
    let mut out = vec![None; values.len()];
    let mut sum = Decimal::ZERO;
    for (i, value) in values.iter().enumerate() {
        sum += *value;
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            out[i] = Some(sum / divisor);
        }
    }
    Ok(out)
}

/// 지수 이동평균.
///
/// 첫 `period`개 값의 SMA로 시작하고 이후 `alpha = 2 / (period + 1)`로 평활합니다.
pub fn ema(values: &[Decimal], period: usize) -> IndicatorResult<Series> {
    ensure_period("EMA", period)?;

    let mut out = vec![None; values.len()];
    if values.len() < period {
        return Ok(out);
    }

    let alpha = Decimal::TWO / Decimal::from(period + 1);
    let seed: Decimal = values[..period].iter().sum::<Decimal>() / Decimal::from(period);
    let mut prev = seed;
    out[period - 1] = Some(seed);
    for i in period..values.len() {
        prev = alpha * values[i] + (Decimal::ONE - alpha) * prev;
        out[i] = Some(prev);
    }
    Ok(out)
}

/// 워밍업 구간(`None`)이 앞에 붙은 시계열의 SMA.
pub fn sma_of(series: &[Option<Decimal>], period: usize) -> IndicatorResult<Series> {
    apply_to_defined(series, period, sma)
}

/// 워밍업 구간(`None`)이 앞에 붙은 시계열의 EMA.
pub fn ema_of(series: &[Option<Decimal>], period: usize) -> IndicatorResult<Series> {
    apply_to_defined(series, period, ema)
}

/// 첫 정의 구간에만 `f`를 적용하고 원래 인덱스에 맞춰 되돌립니다.
fn apply_to_defined(
    series: &[Option<Decimal>],
    period: usize,
    f: fn(&[Decimal], usize) -> IndicatorResult<Series>,
) -> IndicatorResult<Series> {
    ensure_period("이동평균", period)?;

    let mut out = vec![None; series.len()];
    let Some(start) = series.iter().position(Option::is_some) else {
        return Ok(out);
    };
    let dense: Vec<Decimal> = series[start..].iter().map_while(|v| *v).collect();
    for (offset, value) in f(&dense, period)?.into_iter().enumerate() {
        out[start + offset] = value;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_sma_warmup_and_values() {
        let values = [dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)];
        let result = sma(&values, 3).unwrap();
        assert_eq!(result, vec![None, None, Some(dec!(2)), Some(dec!(3)), Some(dec!(4))]);
    }

    #[test]
    fn test_zero_period_is_error() {
        assert!(sma(&[dec!(1)], 0).is_err());
        assert!(ema(&[dec!(1)], 0).is_err());
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let values = [dec!(2), dec!(4), dec!(6), dec!(8)];
        let result = ema(&values, 3).unwrap();
        assert_eq!(result[1], None);
        assert_eq!(result[2], Some(dec!(4)));
        // alpha = 0.5 → 0.5 * 8 + 0.5 * 4
        assert_eq!(result[3], Some(dec!(6)));
    }

    #[test]
    fn test_short_input_is_all_none() {
        let result = ema(&[dec!(1), dec!(2)], 5).unwrap();
        assert!(result.iter().all(Option::is_none));
    }

    #[test]
    fn test_sma_of_keeps_offset() {
        let series = vec![None, None, Some(dec!(2)), Some(dec!(4)), Some(dec!(6))];
        let result = sma_of(&series, 2).unwrap();
        assert_eq!(result, vec![None, None, None, Some(dec!(3)), Some(dec!(5))]);
    }
}
