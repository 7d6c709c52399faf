//! 추세 필터 결합 평균회귀 전략
//!
//! RSI 평균회귀 진입을 추세 방향으로만 허용합니다.
//! 종가가 추세 이동평균 위이고 ADX가 임계값 이상일 때 RSI 과매도 눌림목에서 롱,
//! 반대 조건에서 RSI 과매수 반등 구간에서 숏 진입합니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use trader_core::{Candle, ParameterSet, Signal};

use crate::{
    error::{IndicatorResult, StrategyError, StrategyResult},
    indicators::{adx, rsi, sma},
    strategies::{
        common::{resolve_signal, ParamReader, TrendFilter},
        mean_reversion::{rsi_crossed_level, validate_band},
    },
    traits::{IndicatorFrame, Strategy},
};

/// 추세 필터 전략 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendFilteredConfig {
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default = "default_oversold")]
    pub oversold: Decimal,
    #[serde(default = "default_overbought")]
    pub overbought: Decimal,
    #[serde(default = "default_exit_level")]
    pub exit_level: Decimal,
    /// 추세 판단 이동평균 기간
    #[serde(default = "default_trend_period")]
    pub trend_period: usize,
    #[serde(default = "default_adx_period")]
    pub adx_period: usize,
    /// 최소 ADX (추세 강도)
    #[serde(default = "default_adx_threshold")]
    pub adx_threshold: Decimal,
}

fn default_rsi_period() -> usize {
    14
}
fn default_oversold() -> Decimal {
    dec!(35)
}
fn default_overbought() -> Decimal {
    dec!(65)
}
fn default_exit_level() -> Decimal {
    dec!(50)
}
fn default_trend_period() -> usize {
    50
}
fn default_adx_period() -> usize {
    14
}
fn default_adx_threshold() -> Decimal {
    dec!(20)
}

impl Default for TrendFilteredConfig {
    fn default() -> Self {
        Self {
            rsi_period: default_rsi_period(),
            oversold: default_oversold(),
            overbought: default_overbought(),
            exit_level: default_exit_level(),
            trend_period: default_trend_period(),
            adx_period: default_adx_period(),
            adx_threshold: default_adx_threshold(),
        }
    }
}

impl TrendFilteredConfig {
    pub const PARAMS: &'static [&'static str] = &[
        "rsi_period",
        "oversold",
        "overbought",
        "exit_level",
        "trend_period",
        "adx_period",
        "adx_threshold",
    ];

    pub fn from_params(params: &ParameterSet) -> StrategyResult<Self> {
        let r = ParamReader::new(params, Self::PARAMS)?;
        let config = Self {
            rsi_period: r.period("rsi_period", default_rsi_period())?,
            oversold: r.decimal("oversold", default_oversold())?,
            overbought: r.decimal("overbought", default_overbought())?,
            exit_level: r.decimal("exit_level", default_exit_level())?,
            trend_period: r.period("trend_period", default_trend_period())?,
            adx_period: r.period("adx_period", default_adx_period())?,
            adx_threshold: r.decimal("adx_threshold", default_adx_threshold())?,
        };
        validate_band("oversold", config.oversold, config.exit_level, config.overbought)?;
        if config.adx_threshold < Decimal::ZERO || config.adx_threshold > dec!(100) {
            return Err(StrategyError::invalid(
                "adx_threshold",
                "ADX 임계값은 0과 100 사이여야 합니다",
            ));
        }
        Ok(config)
    }
}

/// 추세 필터 결합 평균회귀 전략
#[derive(Debug, Clone, Default)]
pub struct TrendFilteredStrategy {
    config: TrendFilteredConfig,
}

impl TrendFilteredStrategy {
    pub const NAME: &'static str = "trend_filtered";

    pub fn new(config: TrendFilteredConfig) -> Self {
        Self { config }
    }

    fn filter(&self) -> TrendFilter {
        TrendFilter {
            adx_threshold: self.config.adx_threshold,
        }
    }
}

impl Strategy for TrendFilteredStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn warmup_period(&self) -> usize {
        (self.config.rsi_period + 1)
            .max(self.config.trend_period)
            .max(2 * self.config.adx_period)
    }

    fn compute_indicators(&self, candles: &[Candle]) -> IndicatorResult<IndicatorFrame> {
        let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
        Ok(IndicatorFrame::new()
            .with("rsi", rsi(&closes, self.config.rsi_period)?)
            .with("trend_ma", sma(&closes, self.config.trend_period)?)
            .with("adx", adx(candles, self.config.adx_period)?))
    }

    fn generate_signal(&self, frame: &IndicatorFrame, candles: &[Candle], index: usize) -> Signal {
        let (Some(current), Some(trend_ma), Some(strength), Some(candle)) = (
            frame.at("rsi", index),
            frame.at("trend_ma", index),
            frame.at("adx", index),
            candles.get(index),
        ) else {
            return Signal::Hold;
        };

        let filter = self.filter();
        let long = current < self.config.oversold
            && filter.allows_long(candle.close, trend_ma, strength);
        let short = current > self.config.overbought
            && filter.allows_short(candle.close, trend_ma, strength);
        let exit = rsi_crossed_level(frame.prev("rsi", index), current, self.config.exit_level);

        resolve_signal(long, short, exit)
    }
}
