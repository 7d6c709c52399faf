//! RSI 평균회귀 전략
//!
//! 가격이 평균으로 돌아올 것을 기대하는 전략입니다.
//!
//! - RSI가 과매도 구간이면 롱, 과매수 구간이면 숏 진입
//! - 스토캐스틱 확인(선택): %K가 극단 구간에서 %D를 되돌려 넘을 때만 진입
//! - RSI가 청산 기준선(기본 50)을 통과하면 청산

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use trader_core::{Candle, ParameterSet, Signal};

use crate::{
    error::{IndicatorResult, StrategyError, StrategyResult},
    indicators::{rsi, stochastic, StochasticParams},
    strategies::common::{resolve_signal, ParamReader},
    traits::{IndicatorFrame, Strategy},
};

// ================================================================================================
// 설정 타입
// ================================================================================================

/// RSI 평균회귀 전략 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiReversionConfig {
    /// RSI 기간
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    /// 과매도 임계값
    #[serde(default = "default_oversold")]
    pub oversold: Decimal,

    /// 과매수 임계값
    #[serde(default = "default_overbought")]
    pub overbought: Decimal,

    /// 청산 기준선
    #[serde(default = "default_exit_level")]
    pub exit_level: Decimal,

    /// 스토캐스틱 확인 사용 여부
    #[serde(default)]
    pub use_stochastic: bool,

    /// 스토캐스틱 %K 기간
    #[serde(default = "default_stoch_k_period")]
    pub stoch_k_period: usize,

    /// 스토캐스틱 %D 기간
    #[serde(default = "default_stoch_d_period")]
    pub stoch_d_period: usize,

    /// 스토캐스틱 과매도
    #[serde(default = "default_stoch_oversold")]
    pub stoch_oversold: Decimal,

    /// 스토캐스틱 과매수
    #[serde(default = "default_stoch_overbought")]
    pub stoch_overbought: Decimal,
}

fn default_rsi_period() -> usize {
    14
}
fn default_oversold() -> Decimal {
    dec!(30)
}
fn default_overbought() -> Decimal {
    dec!(70)
}
fn default_exit_level() -> Decimal {
    dec!(50)
}
fn default_stoch_k_period() -> usize {
    14
}
fn default_stoch_d_period() -> usize {
    3
}
fn default_stoch_oversold() -> Decimal {
    dec!(20)
}
fn default_stoch_overbought() -> Decimal {
    dec!(80)
}

impl Default for RsiReversionConfig {
    fn default() -> Self {
        Self {
            rsi_period: default_rsi_period(),
            oversold: default_oversold(),
            overbought: default_overbought(),
            exit_level: default_exit_level(),
            use_stochastic: false,
            stoch_k_period: default_stoch_k_period(),
            stoch_d_period: default_stoch_d_period(),
            stoch_oversold: default_stoch_oversold(),
            stoch_overbought: default_stoch_overbought(),
        }
    }
}

impl RsiReversionConfig {
    /// 인식하는 파라미터 이름
    pub const PARAMS: &'static [&'static str] = &[
        "rsi_period",
        "oversold",
        "overbought",
        "exit_level",
        "use_stochastic",
        "stoch_k_period",
        "stoch_d_period",
        "stoch_oversold",
        "stoch_overbought",
    ];

    /// ParameterSet에서 설정을 읽습니다. 없는 값은 기본값을 씁니다.
    pub fn from_params(params: &ParameterSet) -> StrategyResult<Self> {
        let r = ParamReader::new(params, Self::PARAMS)?;
        let config = Self {
            rsi_period: r.period("rsi_period", default_rsi_period())?,
            oversold: r.decimal("oversold", default_oversold())?,
            overbought: r.decimal("overbought", default_overbought())?,
            exit_level: r.decimal("exit_level", default_exit_level())?,
            use_stochastic: r.bool("use_stochastic", false)?,
            stoch_k_period: r.period("stoch_k_period", default_stoch_k_period())?,
            stoch_d_period: r.period("stoch_d_period", default_stoch_d_period())?,
            stoch_oversold: r.decimal("stoch_oversold", default_stoch_oversold())?,
            stoch_overbought: r.decimal("stoch_overbought", default_stoch_overbought())?,
        };
        config.validate()?;
        Ok(config)
    }

    /// 설정 검증
    pub fn validate(&self) -> StrategyResult<()> {
        validate_band("oversold", self.oversold, self.exit_level, self.overbought)?;
        if self.stoch_oversold >= self.stoch_overbought {
            return Err(StrategyError::invalid(
                "stoch_oversold",
                "스토캐스틱 과매도는 과매수보다 작아야 합니다",
            ));
        }
        Ok(())
    }
}

/// `0 < lower ≤ mid ≤ upper < 100` 확인 (RSI 구간 공용).
pub(crate) fn validate_band(
    name: &str,
    lower: Decimal,
    mid: Decimal,
    upper: Decimal,
) -> StrategyResult<()> {
    if lower <= Decimal::ZERO || upper >= dec!(100) {
        return Err(StrategyError::invalid(name, "임계값은 0과 100 사이여야 합니다"));
    }
    if !(lower < upper && lower <= mid && mid <= upper) {
        return Err(StrategyError::invalid(
            name,
            format!("과매도({lower}) ≤ 청산 기준({mid}) ≤ 과매수({upper}) 순서여야 합니다"),
        ));
    }
    Ok(())
}

/// RSI가 청산 기준선을 어느 방향으로든 통과했는지.
pub(crate) fn rsi_crossed_level(prev: Option<Decimal>, current: Decimal, level: Decimal) -> bool {
    match prev {
        Some(prev) => (prev < level && current >= level) || (prev > level && current <= level),
        None => false,
    }
}

// ================================================================================================
// 전략 구현
// ================================================================================================

/// RSI 평균회귀 전략
#[derive(Debug, Clone, Default)]
pub struct MeanReversionStrategy {
    config: RsiReversionConfig,
}

impl MeanReversionStrategy {
    pub const NAME: &'static str = "rsi_reversion";

    pub fn new(config: RsiReversionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RsiReversionConfig {
        &self.config
    }

    fn stochastic_confirms(&self, frame: &IndicatorFrame, index: usize, long: bool) -> bool {
        if !self.config.use_stochastic {
            return true;
        }
        let (Some(k), Some(d)) = (frame.at("stoch_k", index), frame.at("stoch_d", index)) else {
            return false;
        };
        if long {
            k < self.config.stoch_oversold && k > d
        } else {
            k > self.config.stoch_overbought && k < d
        }
    }
}

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn warmup_period(&self) -> usize {
        let rsi_warmup = self.config.rsi_period + 1;
        if self.config.use_stochastic {
            rsi_warmup.max(self.config.stoch_k_period + self.config.stoch_d_period - 1)
        } else {
            rsi_warmup
        }
    }

    fn compute_indicators(&self, candles: &[Candle]) -> IndicatorResult<IndicatorFrame> {
        let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
        let mut frame = IndicatorFrame::new().with("rsi", rsi(&closes, self.config.rsi_period)?);

        if self.config.use_stochastic {
            let stoch = stochastic(
                candles,
                StochasticParams {
                    k_period: self.config.stoch_k_period,
                    d_period: self.config.stoch_d_period,
                },
            )?;
            frame = frame.with("stoch_k", stoch.k).with("stoch_d", stoch.d);
        }
        Ok(frame)
    }

    fn generate_signal(&self, frame: &IndicatorFrame, _candles: &[Candle], index: usize) -> Signal {
        let Some(current) = frame.at("rsi", index) else {
            return Signal::Hold;
        };

        let long = current < self.config.oversold && self.stochastic_confirms(frame, index, true);
        let short =
            current > self.config.overbought && self.stochastic_confirms(frame, index, false);
        let exit = rsi_crossed_level(frame.prev("rsi", index), current, self.config.exit_level);

        resolve_signal(long, short, exit)
    }
}
