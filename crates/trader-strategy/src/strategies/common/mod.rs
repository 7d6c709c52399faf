//! 전략 공통 유틸리티.
//!
//! - `params`: ParameterSet 읽기 및 알 수 없는 파라미터 검출
//! - `signal_filters`: 신호 결합 규칙과 추세 필터

pub mod params;
pub mod signal_filters;

pub use params::ParamReader;
pub use signal_filters::{crossed_above, crossed_below, resolve_signal, TrendFilter};
