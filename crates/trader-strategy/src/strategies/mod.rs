//! 내장 트레이딩 전략.
//!
//! 전략은 닫힌 변형 집합([`StrategyVariant`])으로 제공됩니다.
//! 새 전략은 새 변형으로 추가합니다.
//!
//! | 이름               | 구현                      | 계열                  |
//! |--------------------|---------------------------|-----------------------|
//! | `rsi_reversion`    | [`MeanReversionStrategy`] | 평균회귀              |
//! | `channel_breakout` | [`BreakoutStrategy`]      | 채널 돌파             |
//! | `ma_cross`         | [`MaCrossStrategy`]       | 추세추종 (이동평균)   |
//! | `macd_cross`       | [`MacdCrossStrategy`]     | 추세추종 (MACD)       |
//! | `trend_filtered`   | [`TrendFilteredStrategy`] | 추세 필터 + 평균회귀  |

pub mod breakout;
pub mod common;
pub mod mean_reversion;
pub mod trend_filtered;
pub mod trend_following;

pub use breakout::{BreakoutStrategy, ChannelBreakoutConfig};
pub use common::{ParamReader, TrendFilter};
pub use mean_reversion::{MeanReversionStrategy, RsiReversionConfig};
pub use trend_filtered::{TrendFilteredConfig, TrendFilteredStrategy};
pub use trend_following::{
    MaCrossConfig, MaCrossStrategy, MaType, MacdCrossConfig, MacdCrossStrategy,
};

use trader_core::{Candle, ParameterSet, Signal};

use crate::{
    error::{IndicatorResult, StrategyError, StrategyResult},
    traits::{IndicatorFrame, Strategy},
};

/// 등록된 전략 변형.
#[derive(Debug, Clone)]
pub enum StrategyVariant {
    RsiReversion(MeanReversionStrategy),
    ChannelBreakout(BreakoutStrategy),
    MaCross(MaCrossStrategy),
    MacdCross(MacdCrossStrategy),
    TrendFiltered(TrendFilteredStrategy),
}

impl StrategyVariant {
    /// 등록된 전략 이름
    pub const NAMES: &'static [&'static str] = &[
        MeanReversionStrategy::NAME,
        BreakoutStrategy::NAME,
        MaCrossStrategy::NAME,
        MacdCrossStrategy::NAME,
        TrendFilteredStrategy::NAME,
    ];

    /// ParameterSet의 `strategy` 값과 파라미터로 전략을 생성합니다.
    ///
    /// 알 수 없는 전략/파라미터와 잘못된 값은 `StrategyError`입니다.
    pub fn from_params(params: &ParameterSet) -> StrategyResult<Self> {
        let name = params.strategy().ok_or(StrategyError::MissingStrategy)?;
        let variant = match name {
            MeanReversionStrategy::NAME => StrategyVariant::RsiReversion(
                MeanReversionStrategy::new(RsiReversionConfig::from_params(params)?),
            ),
            BreakoutStrategy::NAME => StrategyVariant::ChannelBreakout(BreakoutStrategy::new(
                ChannelBreakoutConfig::from_params(params)?,
            )),
            MaCrossStrategy::NAME => {
                StrategyVariant::MaCross(MaCrossStrategy::new(MaCrossConfig::from_params(params)?))
            }
            MacdCrossStrategy::NAME => StrategyVariant::MacdCross(MacdCrossStrategy::new(
                MacdCrossConfig::from_params(params)?,
            )),
            TrendFilteredStrategy::NAME => StrategyVariant::TrendFiltered(
                TrendFilteredStrategy::new(TrendFilteredConfig::from_params(params)?),
            ),
            other => return Err(StrategyError::UnknownStrategy(other.to_string())),
        };
        tracing::debug!(strategy = name, params = %params, "전략 생성");
        Ok(variant)
    }

    fn inner(&self) -> &dyn Strategy {
        match self {
            StrategyVariant::RsiReversion(s) => s,
            StrategyVariant::ChannelBreakout(s) => s,
            StrategyVariant::MaCross(s) => s,
            StrategyVariant::MacdCross(s) => s,
            StrategyVariant::TrendFiltered(s) => s,
        }
    }
}

impl Strategy for StrategyVariant {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn warmup_period(&self) -> usize {
        self.inner().warmup_period()
    }

    fn compute_indicators(&self, candles: &[Candle]) -> IndicatorResult<IndicatorFrame> {
        self.inner().compute_indicators(candles)
    }

    fn generate_signal(&self, frame: &IndicatorFrame, candles: &[Candle], index: usize) -> Signal {
        self.inner().generate_signal(frame, candles, index)
    }
}
