//! 추세추종 전략 그룹
//!
//! # 지원 변형
//!
//! - `ma_cross`: 빠른/느린 이동평균(SMA 또는 EMA) 골든/데드 크로스
//! - `macd_cross`: MACD선과 시그널선 교차
//!
//! 상향 교차는 롱, 하향 교차는 숏 진입 신호입니다. 롱 전용 모드에서는
//! 하향 교차가 반대 신호 청산으로 동작합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trader_core::{Candle, ParameterSet, Signal};

use crate::{
    error::{IndicatorResult, StrategyError, StrategyResult},
    indicators::{ema, macd, sma, MacdParams},
    strategies::common::{crossed_above, crossed_below, resolve_signal, ParamReader},
    traits::{IndicatorFrame, Strategy},
};

/// 이동평균 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaType {
    #[default]
    Sma,
    Ema,
}

impl MaType {
    fn parse(value: &str) -> StrategyResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "sma" => Ok(MaType::Sma),
            "ema" => Ok(MaType::Ema),
            other => Err(StrategyError::invalid(
                "ma_type",
                format!("sma 또는 ema만 지원합니다 (입력: {other})"),
            )),
        }
    }

    fn compute(self, values: &[Decimal], period: usize) -> IndicatorResult<Vec<Option<Decimal>>> {
        match self {
            MaType::Sma => sma(values, period),
            MaType::Ema => ema(values, period),
        }
    }
}

/// 두 시계열의 교차를 신호로 변환합니다.
fn cross_signal(frame: &IndicatorFrame, fast: &str, slow: &str, index: usize) -> Signal {
    let (Some(pf), Some(ps), Some(f), Some(s)) = (
        frame.prev(fast, index),
        frame.prev(slow, index),
        frame.at(fast, index),
        frame.at(slow, index),
    ) else {
        return Signal::Hold;
    };
    resolve_signal(crossed_above(pf, ps, f, s), crossed_below(pf, ps, f, s), false)
}

fn closes(candles: &[Candle]) -> Vec<Decimal> {
    candles.iter().map(|c| c.close).collect()
}

// ================================================================================================
// 이동평균 교차
// ================================================================================================

/// 이동평균 교차 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaCrossConfig {
    #[serde(default = "default_fast_period")]
    pub fast_period: usize,
    #[serde(default = "default_slow_period")]
    pub slow_period: usize,
    #[serde(default)]
    pub ma_type: MaType,
}

fn default_fast_period() -> usize {
    10
}
fn default_slow_period() -> usize {
    30
}

impl Default for MaCrossConfig {
    fn default() -> Self {
        Self {
            fast_period: default_fast_period(),
            slow_period: default_slow_period(),
            ma_type: MaType::Sma,
        }
    }
}

impl MaCrossConfig {
    pub const PARAMS: &'static [&'static str] = &["fast_period", "slow_period", "ma_type"];

    pub fn from_params(params: &ParameterSet) -> StrategyResult<Self> {
        let r = ParamReader::new(params, Self::PARAMS)?;
        let config = Self {
            fast_period: r.period("fast_period", default_fast_period())?,
            slow_period: r.period("slow_period", default_slow_period())?,
            ma_type: MaType::parse(&r.text("ma_type", "sma")?)?,
        };
        if config.fast_period >= config.slow_period {
            return Err(StrategyError::invalid(
                "fast_period",
                format!(
                    "빠른 기간({})은 느린 기간({})보다 작아야 합니다",
                    config.fast_period, config.slow_period
                ),
            ));
        }
        Ok(config)
    }
}

/// 이동평균 교차 전략
#[derive(Debug, Clone, Default)]
pub struct MaCrossStrategy {
    config: MaCrossConfig,
}

impl MaCrossStrategy {
    pub const NAME: &'static str = "ma_cross";

    pub fn new(config: MaCrossConfig) -> Self {
        Self { config }
    }
}

impl Strategy for MaCrossStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn warmup_period(&self) -> usize {
        // 교차 판단에 직전 값이 필요
        self.config.slow_period + 1
    }

    fn compute_indicators(&self, candles: &[Candle]) -> IndicatorResult<IndicatorFrame> {
        let closes = closes(candles);
        Ok(IndicatorFrame::new()
            .with("fast_ma", self.config.ma_type.compute(&closes, self.config.fast_period)?)
            .with("slow_ma", self.config.ma_type.compute(&closes, self.config.slow_period)?))
    }

    fn generate_signal(&self, frame: &IndicatorFrame, _candles: &[Candle], index: usize) -> Signal {
        cross_signal(frame, "fast_ma", "slow_ma", index)
    }
}

// ================================================================================================
// MACD 교차
// ================================================================================================

/// MACD 교차 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdCrossConfig {
    #[serde(default = "default_macd_fast")]
    pub fast_period: usize,
    #[serde(default = "default_macd_slow")]
    pub slow_period: usize,
    #[serde(default = "default_macd_signal")]
    pub signal_period: usize,
}

fn default_macd_fast() -> usize {
    12
}
fn default_macd_slow() -> usize {
    26
}
fn default_macd_signal() -> usize {
    9
}

impl Default for MacdCrossConfig {
    fn default() -> Self {
        Self {
            fast_period: default_macd_fast(),
            slow_period: default_macd_slow(),
            signal_period: default_macd_signal(),
        }
    }
}

impl MacdCrossConfig {
    pub const PARAMS: &'static [&'static str] = &["fast_period", "slow_period", "signal_period"];

    pub fn from_params(params: &ParameterSet) -> StrategyResult<Self> {
        let r = ParamReader::new(params, Self::PARAMS)?;
        let config = Self {
            fast_period: r.period("fast_period", default_macd_fast())?,
            slow_period: r.period("slow_period", default_macd_slow())?,
            signal_period: r.period("signal_period", default_macd_signal())?,
        };
        if config.fast_period >= config.slow_period {
            return Err(StrategyError::invalid(
                "fast_period",
                "MACD 빠른 기간은 느린 기간보다 작아야 합니다",
            ));
        }
        Ok(config)
    }

    fn macd_params(&self) -> MacdParams {
        MacdParams {
            fast_period: self.fast_period,
            slow_period: self.slow_period,
            signal_period: self.signal_period,
        }
    }
}

/// MACD 교차 전략
#[derive(Debug, Clone, Default)]
pub struct MacdCrossStrategy {
    config: MacdCrossConfig,
}

impl MacdCrossStrategy {
    pub const NAME: &'static str = "macd_cross";

    pub fn new(config: MacdCrossConfig) -> Self {
        Self { config }
    }
}

impl Strategy for MacdCrossStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn warmup_period(&self) -> usize {
        self.config.slow_period + self.config.signal_period
    }

    fn compute_indicators(&self, candles: &[Candle]) -> IndicatorResult<IndicatorFrame> {
        let out = macd(&closes(candles), self.config.macd_params())?;
        Ok(IndicatorFrame::new()
            .with("macd", out.macd)
            .with("macd_signal", out.signal)
            .with("macd_histogram", out.histogram))
    }

    fn generate_signal(&self, frame: &IndicatorFrame, _candles: &[Candle], index: usize) -> Signal {
        cross_signal(frame, "macd", "macd_signal", index)
    }
}
