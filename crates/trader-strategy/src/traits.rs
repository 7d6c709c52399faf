//! Strategy trait 정의.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use trader_core::{Candle, Signal};

use crate::{
    error::{IndicatorResult, StrategyResult},
    indicators::Series,
};

/// 전략이 계산한 이름별 지표 시계열.
///
/// 모든 시계열은 입력 캔들과 같은 길이이며 워밍업 구간은 `None`입니다.
#[derive(Debug, Clone, Default)]
pub struct IndicatorFrame {
    series: BTreeMap<&'static str, Series>,
}

impl IndicatorFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// 시계열을 추가한 프레임을 반환합니다.
    pub fn with(mut self, name: &'static str, series: Series) -> Self {
        self.series.insert(name, series);
        self
    }

    /// 인덱스 `index`의 지표 값. 워밍업 구간이거나 없는 지표면 `None`.
    pub fn at(&self, name: &str, index: usize) -> Option<Decimal> {
        self.series.get(name)?.get(index).copied().flatten()
    }

    /// 직전 인덱스의 지표 값.
    pub fn prev(&self, name: &str, index: usize) -> Option<Decimal> {
        self.at(name, index.checked_sub(1)?)
    }

    pub fn series(&self, name: &str) -> Option<&Series> {
        self.series.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.series.keys().copied()
    }
}

/// 파라미터화된 트레이딩 전략.
///
/// 전략은 무상태입니다. 캔들 전체로 지표를 한 번 계산한 뒤, 각 인덱스의 신호를
/// 그 인덱스 이하의 데이터만으로 결정합니다.
pub trait Strategy: Send + Sync {
    /// 전략 이름 (레지스트리 이름과 동일).
    fn name(&self) -> &'static str;

    /// 모든 지표가 정의되기까지 필요한 캔들 수.
    fn warmup_period(&self) -> usize;

    /// 캔들 시계열에서 전략이 쓰는 지표를 계산합니다.
    fn compute_indicators(&self, candles: &[Candle]) -> IndicatorResult<IndicatorFrame>;

    /// 인덱스 `index`의 신호를 결정합니다.
    ///
    /// 지표가 아직 정의되지 않은 워밍업 구간에서는 `Signal::Hold`를 반환해야 합니다.
    fn generate_signal(&self, frame: &IndicatorFrame, candles: &[Candle], index: usize) -> Signal;

    /// 캔들 전체에 대한 신호 시계열.
    fn generate_signals(&self, candles: &[Candle]) -> StrategyResult<Vec<Signal>> {
        let frame = self.compute_indicators(candles)?;
        Ok((0..candles.len())
            .map(|i| self.generate_signal(&frame, candles, i))
            .collect())
    }
}
