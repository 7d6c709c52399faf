//! 돈치안 채널 돌파 전략
//!
//! 종가가 직전 N개 캔들의 최고가를 넘으면 롱, 최저가를 깨면 숏 진입합니다.
//! 별도 청산 신호는 없으며, 반대 방향 돌파와 엔진의 손절/익절/트레일링 스탑으로 청산됩니다.
//! `min_atr_pct`가 0보다 크면 ATR/종가가 그 값 이상인 변동성 구간에서만 진입합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trader_core::{Candle, ParameterSet, Signal};

use crate::{
    error::{IndicatorResult, StrategyError, StrategyResult},
    indicators::{atr, donchian},
    strategies::common::{resolve_signal, ParamReader},
    traits::{IndicatorFrame, Strategy},
};

/// 채널 돌파 전략 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelBreakoutConfig {
    /// 채널 기간
    #[serde(default = "default_channel_period")]
    pub channel_period: usize,

    /// 변동성 필터 ATR 기간
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,

    /// 최소 ATR/종가 비율 (0 = 필터 비활성)
    #[serde(default)]
    pub min_atr_pct: Decimal,
}

fn default_channel_period() -> usize {
    20
}
fn default_atr_period() -> usize {
    14
}

impl Default for ChannelBreakoutConfig {
    fn default() -> Self {
        Self {
            channel_period: default_channel_period(),
            atr_period: default_atr_period(),
            min_atr_pct: Decimal::ZERO,
        }
    }
}

impl ChannelBreakoutConfig {
    pub const PARAMS: &'static [&'static str] = &["channel_period", "atr_period", "min_atr_pct"];

    pub fn from_params(params: &ParameterSet) -> StrategyResult<Self> {
        let r = ParamReader::new(params, Self::PARAMS)?;
        let config = Self {
            channel_period: r.period("channel_period", default_channel_period())?,
            atr_period: r.period("atr_period", default_atr_period())?,
            min_atr_pct: r.decimal("min_atr_pct", Decimal::ZERO)?,
        };
        if config.min_atr_pct < Decimal::ZERO {
            return Err(StrategyError::invalid("min_atr_pct", "0 이상이어야 합니다"));
        }
        Ok(config)
    }

    fn volatility_filter_enabled(&self) -> bool {
        self.min_atr_pct > Decimal::ZERO
    }
}

/// 채널 돌파 전략
#[derive(Debug, Clone, Default)]
pub struct BreakoutStrategy {
    config: ChannelBreakoutConfig,
}

impl BreakoutStrategy {
    pub const NAME: &'static str = "channel_breakout";

    pub fn new(config: ChannelBreakoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChannelBreakoutConfig {
        &self.config
    }
}

impl Strategy for BreakoutStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn warmup_period(&self) -> usize {
        let channel = self.config.channel_period + 1;
        if self.config.volatility_filter_enabled() {
            channel.max(self.config.atr_period)
        } else {
            channel
        }
    }

    fn compute_indicators(&self, candles: &[Candle]) -> IndicatorResult<IndicatorFrame> {
        let channel = donchian(candles, self.config.channel_period)?;
        let mut frame = IndicatorFrame::new()
            .with("upper", channel.upper)
            .with("lower", channel.lower);
        if self.config.volatility_filter_enabled() {
            frame = frame.with("atr", atr(candles, self.config.atr_period)?);
        }
        Ok(frame)
    }

    fn generate_signal(&self, frame: &IndicatorFrame, candles: &[Candle], index: usize) -> Signal {
        let (Some(upper), Some(lower), Some(candle)) = (
            frame.at("upper", index),
            frame.at("lower", index),
            candles.get(index),
        ) else {
            return Signal::Hold;
        };

        if self.config.volatility_filter_enabled() {
            let volatile = frame
                .at("atr", index)
                .filter(|_| !candle.close.is_zero())
                .is_some_and(|value| value / candle.close >= self.config.min_atr_pct);
            if !volatile {
                return Signal::Hold;
            }
        }

        resolve_signal(candle.close > upper, candle.close < lower, false)
    }
}
