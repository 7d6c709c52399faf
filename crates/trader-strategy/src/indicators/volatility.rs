//! 변동성 지표 (True Range, ATR, 돈치안 채널).

use rust_decimal::Decimal;
use trader_core::Candle;

use super::{ensure_period, Series};
use crate::error::IndicatorResult;

/// True Range. 첫 캔들은 고가 - 저가.
pub fn true_range(candles: &[Candle]) -> Vec<Decimal> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let range = c.high - c.low;
            match i.checked_sub(1).map(|p| candles[p].close) {
                Some(prev_close) => range
                    .max((c.high - prev_close).abs())
                    .max((c.low - prev_close).abs()),
                None => range,
            }
        })
        .collect()
}

/// ATR (Wilder 평활).
///
/// 인덱스 `period - 1`에서 처음 `period`개 TR의 평균으로 시작합니다.
pub fn atr(candles: &[Candle], period: usize) -> IndicatorResult<Series> {
    ensure_period("ATR", period)?;

    let tr = true_range(candles);
    let mut out = vec![None; candles.len()];
    if tr.len() < period {
        return Ok(out);
    }

    let p = Decimal::from(period);
    let mut prev = tr[..period].iter().sum::<Decimal>() / p;
    out[period - 1] = Some(prev);
    for i in period..tr.len() {
        prev = (prev * (p - Decimal::ONE) + tr[i]) / p;
        out[i] = Some(prev);
    }
    Ok(out)
}

/// 돈치안 채널
#[derive(Debug, Clone, PartialEq)]
pub struct DonchianOutput {
    pub upper: Series,
    pub lower: Series,
}

/// 돈치안 채널.
///
/// 인덱스 `i`의 채널은 직전 `period`개 캔들(현재 캔들 제외)의 최고가/최저가이므로
/// 현재 종가와 비교해 돌파를 판단할 수 있습니다. 인덱스 `period`부터 정의됩니다.
pub fn donchian(candles: &[Candle], period: usize) -> IndicatorResult<DonchianOutput> {
    ensure_period("돈치안 채널", period)?;

    let mut upper = vec![None; candles.len()];
    let mut lower = vec![None; candles.len()];
    for i in period..candles.len() {
        let window = &candles[i - period..i];
        upper[i] = window.iter().map(|c| c.high).max();
        lower[i] = window.iter().map(|c| c.low).min();
    }
    Ok(DonchianOutput { upper, lower })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;

    fn candle(i: i64, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Candle::new(base + Duration::days(i), close, high, low, close, dec!(1))
    }

    #[test]
    fn test_true_range_uses_previous_close() {
        let candles = vec![
            candle(0, dec!(11), dec!(9), dec!(10)),
            // 갭 상승: 고가-전일종가가 가장 큼
            candle(1, dec!(15), dec!(14), dec!(14)),
        ];
        let tr = true_range(&candles);
        assert_eq!(tr, vec![dec!(2), dec!(5)]);
    }

    #[test]
    fn test_atr_constant_range() {
        let candles: Vec<Candle> = (0..6)
            .map(|i| candle(i, dec!(102), dec!(98), dec!(100)))
            .collect();
        let out = atr(&candles, 3).unwrap();
        assert!(out[1].is_none());
        assert_eq!(out[2], Some(dec!(4)));
        assert_eq!(out[5], Some(dec!(4)));
    }

    #[test]
    fn test_donchian_excludes_current_candle() {
        let candles = vec![
            candle(0, dec!(10), dec!(8), dec!(9)),
            candle(1, dec!(12), dec!(9), dec!(11)),
            candle(2, dec!(20), dec!(5), dec!(19)),
        ];
        let out = donchian(&candles, 2).unwrap();
        assert_eq!(out.upper[1], None);
        assert_eq!(out.upper[2], Some(dec!(12)));
        assert_eq!(out.lower[2], Some(dec!(8)));
    }
}
