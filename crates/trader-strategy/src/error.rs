//! 지표/전략 오류 타입.

use thiserror::Error;
use trader_core::CoreError;

/// 지표 계산 오류
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IndicatorError {
    /// 잘못된 지표 파라미터 (기간 0 등)
    #[error("잘못된 지표 파라미터: {0}")]
    InvalidParameter(String),
}

/// 지표 결과 타입
pub type IndicatorResult<T> = Result<T, IndicatorError>;

/// 전략 생성/실행 오류
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StrategyError {
    /// ParameterSet에 전략 이름이 없음
    #[error("파라미터에 전략 이름(strategy)이 없습니다")]
    MissingStrategy,

    /// 등록되지 않은 전략
    #[error("알 수 없는 전략: {0}")]
    UnknownStrategy(String),

    /// 파라미터 값 오류
    #[error("잘못된 전략 파라미터 '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// 지표 계산 오류
    #[error(transparent)]
    Indicator(#[from] IndicatorError),
}

impl StrategyError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        StrategyError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<CoreError> for StrategyError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidParameter { name, reason } => {
                StrategyError::InvalidParameter { name, reason }
            }
            other => StrategyError::InvalidParameter {
                name: "params".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// 전략 결과 타입
pub type StrategyResult<T> = Result<T, StrategyError>;
