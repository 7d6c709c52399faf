//! OHLCV 캔들과 불변 캔들 시계열.
//!
//! [`CandleFeed`]는 한 번 검증된 캔들 배열을 `Arc`로 공유합니다.
//! 슬라이스는 같은 버퍼를 가리키는 뷰이므로 워커 간 복사 없이 전달됩니다.

use std::{ops::Range, sync::Arc};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// 단일 구간의 OHLCV 레코드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// 구간 시작 시각
    pub timestamp: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
}

impl Candle {
    /// 새 캔들을 생성합니다.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 시가=고가=저가=종가인 캔들 (테스트/플랫 시계열용).
    pub fn flat(timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self::new(timestamp, price, price, price, price, Decimal::ZERO)
    }

    fn check(&self, index: usize) -> CoreResult<()> {
        if self.low > self.high {
            return Err(CoreError::MalformedCandle {
                index,
                reason: format!("저가({})가 고가({})보다 큽니다", self.low, self.high),
            });
        }
        if self.low < Decimal::ZERO || self.volume < Decimal::ZERO {
            return Err(CoreError::MalformedCandle {
                index,
                reason: "가격/거래량은 음수일 수 없습니다".to_string(),
            });
        }
        Ok(())
    }
}

/// 타임스탬프가 엄격하게 증가하는지 확인합니다.
pub fn ensure_monotonic(candles: &[Candle]) -> CoreResult<()> {
    for (i, pair) in candles.windows(2).enumerate() {
        if pair[0].timestamp >= pair[1].timestamp {
            return Err(CoreError::NonMonotonic {
                index: i + 1,
                previous: pair[0].timestamp,
                current: pair[1].timestamp,
            });
        }
    }
    Ok(())
}

/// 검증된 읽기 전용 캔들 시계열.
///
/// 클론과 슬라이스는 내부 버퍼를 공유합니다. 생성 후에는 절대 변경되지 않습니다.
#[derive(Debug, Clone)]
pub struct CandleFeed {
    candles: Arc<[Candle]>,
    start: usize,
    end: usize,
}

impl CandleFeed {
    /// 캔들 배열을 검증하여 피드를 생성합니다.
    ///
    /// 비어 있거나, 타임스탬프가 엄격하게 증가하지 않거나,
    /// OHLC 값이 일관되지 않으면 오류를 반환합니다.
    pub fn new(candles: Vec<Candle>) -> CoreResult<Self> {
        if candles.is_empty() {
            return Err(CoreError::EmptyFeed);
        }
        ensure_monotonic(&candles)?;
        for (i, candle) in candles.iter().enumerate() {
            candle.check(i)?;
        }

        let end = candles.len();
        Ok(Self {
            candles: candles.into(),
            start: 0,
            end,
        })
    }

    /// 캔들 슬라이스
    pub fn as_slice(&self) -> &[Candle] {
        &self.candles[self.start..self.end]
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.as_slice().get(index)
    }

    pub fn first(&self) -> Option<&Candle> {
        self.as_slice().first()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.as_slice().last()
    }

    /// 인덱스 범위 뷰. 범위는 피드 길이로 잘립니다.
    pub fn slice(&self, range: Range<usize>) -> CandleFeed {
        let len = self.len();
        let lo = range.start.min(len);
        let hi = range.end.clamp(lo, len);
        CandleFeed {
            candles: Arc::clone(&self.candles),
            start: self.start + lo,
            end: self.start + hi,
        }
    }

    /// `[from, to)` 시간 범위에 해당하는 인덱스 범위.
    pub fn index_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Range<usize> {
        let candles = self.as_slice();
        let lo = candles.partition_point(|c| c.timestamp < from);
        let hi = candles.partition_point(|c| c.timestamp < to).max(lo);
        lo..hi
    }

    /// `[from, to)` 시간 범위 뷰.
    pub fn range_by_time(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> CandleFeed {
        self.slice(self.index_range(from, to))
    }

    /// 종가 배열 (지표 계산용)
    pub fn closes(&self) -> Vec<Decimal> {
        self.as_slice().iter().map(|c| c.close).collect()
    }
}

impl AsRef<[Candle]> for CandleFeed {
    fn as_ref(&self) -> &[Candle] {
        self.as_slice()
    }
}
