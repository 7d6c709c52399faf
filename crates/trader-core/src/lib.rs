//! 백테스트/최적화 엔진의 핵심 도메인 타입.
//!
//! - [`Candle`], [`CandleFeed`]: 시간순으로 검증된 불변 OHLCV 시계열
//! - [`Signal`], [`Side`], [`TradeMode`]: 전략 신호와 포지션 방향
//! - [`ParamValue`], [`ParameterSet`]: 파라미터 조합과 안정적인 키

pub mod domain;
pub mod error;

pub use domain::*;
pub use error::{CoreError, CoreResult};
