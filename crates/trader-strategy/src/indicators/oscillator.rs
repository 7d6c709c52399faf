//! 오실레이터 (RSI, 스토캐스틱, MACD).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trader_core::Candle;

use super::{ema, ema_of, ensure_period, sma_of, Series};
use crate::error::{IndicatorError, IndicatorResult};

/// RSI (Relative Strength Index).
///
/// 최근 `period`개 종가 변화의 평균 상승/하락폭으로 계산합니다.
/// 인덱스 `period`부터 값이 정의됩니다. 변화가 전혀 없으면 50, 하락이 없으면 100입니다.
pub fn rsi(closes: &[Decimal], period: usize) -> IndicatorResult<Series> {
    ensure_period("RSI", period)?;

    let mut out = vec![None; closes.len()];
    if closes.len() <= period {
        return Ok(out);
    }

    let changes: Vec<Decimal> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let divisor = Decimal::from(period);
    let mut gain_sum = Decimal::ZERO;
    let mut loss_sum = Decimal::ZERO;

    for (j, change) in changes.iter().enumerate() {
        gain_sum += (*change).max(Decimal::ZERO);
        loss_sum += (-*change).max(Decimal::ZERO);
        if j >= period {
            let old = changes[j - period];
            gain_sum -= old.max(Decimal::ZERO);
            loss_sum -= (-old).max(Decimal::ZERO);
        }
        if j + 1 < period {
            continue;
        }

        let avg_gain = gain_sum / divisor;
        let avg_loss = loss_sum / divisor;
        let value = if avg_gain.is_zero() && avg_loss.is_zero() {
            dec!(50)
        } else if avg_loss.is_zero() {
            dec!(100)
        } else {
            let rs = avg_gain / avg_loss;
            dec!(100) - dec!(100) / (Decimal::ONE + rs)
        };
        // changes[j]는 closes[j + 1]에서 끝나는 변화
        out[j + 1] = Some(value);
    }
    Ok(out)
}

/// 스토캐스틱 파라미터
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StochasticParams {
    /// %K 기간
    pub k_period: usize,
    /// %D 평활 기간
    pub d_period: usize,
}

impl Default for StochasticParams {
    fn default() -> Self {
        Self {
            k_period: 14,
            d_period: 3,
        }
    }
}

/// 스토캐스틱 결과
#[derive(Debug, Clone, PartialEq)]
pub struct StochasticOutput {
    pub k: Series,
    pub d: Series,
}

/// 스토캐스틱 %K/%D.
///
/// `%K = (close - LL) / (HH - LL) * 100`, 고저가 같으면 50.
pub fn stochastic(candles: &[Candle], params: StochasticParams) -> IndicatorResult<StochasticOutput> {
    ensure_period("스토캐스틱 %K", params.k_period)?;
    ensure_period("스토캐스틱 %D", params.d_period)?;

    let mut k = vec![None; candles.len()];
    for i in params.k_period.saturating_sub(1)..candles.len() {
        let window = &candles[i + 1 - params.k_period..=i];
        let highest = window.iter().map(|c| c.high).max().unwrap_or_default();
        let lowest = window.iter().map(|c| c.low).min().unwrap_or_default();
        let range = highest - lowest;
        k[i] = Some(if range.is_zero() {
            dec!(50)
        } else {
            (candles[i].close - lowest) / range * dec!(100)
        });
    }

    let d = sma_of(&k, params.d_period)?;
    Ok(StochasticOutput { k, d })
}

/// MACD 파라미터
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacdParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

/// MACD 결과
#[derive(Debug, Clone, PartialEq)]
pub struct MacdOutput {
    pub macd: Series,
    pub signal: Series,
    pub histogram: Series,
}

/// MACD (빠른 EMA - 느린 EMA)와 시그널선.
pub fn macd(closes: &[Decimal], params: MacdParams) -> IndicatorResult<MacdOutput> {
    if params.fast_period >= params.slow_period {
        return Err(IndicatorError::InvalidParameter(format!(
            "MACD 빠른 기간({})은 느린 기간({})보다 작아야 합니다",
            params.fast_period, params.slow_period
        )));
    }
    ensure_period("MACD 시그널", params.signal_period)?;

    let fast = ema(closes, params.fast_period)?;
    let slow = ema(closes, params.slow_period)?;
    let macd: Series = fast
        .iter()
        .zip(&slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal = ema_of(&macd, params.signal_period)?;
    let histogram = macd
        .iter()
        .zip(&signal)
        .map(|(m, s)| Some((*m)? - (*s)?))
        .collect();

    Ok(MacdOutput {
        macd,
        signal,
        histogram,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn closes(values: &[i64]) -> Vec<Decimal> {
        values.iter().map(|v| Decimal::from(*v)).collect()
    }

    #[test]
    fn test_rsi_warmup_length() {
        let result = rsi(&closes(&[1, 2, 3, 4, 5, 6]), 3).unwrap();
        assert!(result[..3].iter().all(Option::is_none));
        assert!(result[3..].iter().all(Option::is_some));
    }

    #[test]
    fn test_rsi_extremes() {
        let rising = rsi(&closes(&[1, 2, 3, 4, 5]), 3).unwrap();
        assert_eq!(rising[4], Some(dec!(100)));

        let falling = rsi(&closes(&[5, 4, 3, 2, 1]), 3).unwrap();
        assert_eq!(falling[4], Some(dec!(0)));

        let flat = rsi(&closes(&[7, 7, 7, 7, 7]), 3).unwrap();
        assert_eq!(flat[4], Some(dec!(50)));
    }

    #[test]
    fn test_rsi_balanced_moves() {
        // +2, -2 반복 → 평균 상승 = 평균 하락 → 50
        let result = rsi(&closes(&[10, 12, 10, 12, 10]), 4).unwrap();
        assert_eq!(result[4], Some(dec!(50)));
    }

    #[test]
    fn test_stochastic_range() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles: Vec<Candle> = (0..10)
            .map(|i| {
                let price = Decimal::from(100 + i);
                Candle::new(
                    base + Duration::hours(i),
                    price,
                    price + dec!(1),
                    price - dec!(1),
                    price,
                    dec!(10),
                )
            })
            .collect();

        let out = stochastic(&candles, StochasticParams { k_period: 3, d_period: 2 }).unwrap();
        assert!(out.k[1].is_none());
        assert!(out.d[2].is_none());
        for value in out.k.iter().flatten().chain(out.d.iter().flatten()) {
            assert!(*value >= Decimal::ZERO && *value <= dec!(100));
        }
        // 상승 추세에서 종가는 범위 상단 근처
        assert!(out.k[9].unwrap() > dec!(50));
    }

    #[test]
    fn test_macd_rejects_inverted_periods() {
        let params = MacdParams {
            fast_period: 26,
            slow_period: 12,
            signal_period: 9,
        };
        assert!(macd(&closes(&[1, 2, 3]), params).is_err());
    }

    #[test]
    fn test_macd_defined_after_slow_plus_signal() {
        let values: Vec<Decimal> = (0..40).map(Decimal::from).collect();
        let params = MacdParams {
            fast_period: 3,
            slow_period: 6,
            signal_period: 4,
        };
        let out = macd(&values, params).unwrap();
        assert!(out.macd[4].is_none());
        assert!(out.macd[5].is_some());
        assert!(out.signal[7].is_none());
        assert!(out.signal[8].is_some());
        assert!(out.histogram[8].is_some());
    }
}
