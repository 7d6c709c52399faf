//! 지표 계층과 파라미터화된 트레이딩 전략.
//!
//! - [`indicators`]: 캔들 → 지표 시계열 순수 함수 (SMA, EMA, RSI, ADX, MACD, 스토캐스틱, ATR, 돈치안)
//! - [`Strategy`]: `compute_indicators` + `generate_signal` 인터페이스
//! - [`StrategyVariant`]: ParameterSet으로 생성되는 닫힌 전략 집합

pub mod error;
pub mod indicators;
pub mod strategies;
pub mod traits;

pub use error::{IndicatorError, IndicatorResult, StrategyError, StrategyResult};
pub use strategies::StrategyVariant;
pub use traits::{IndicatorFrame, Strategy};
