//! 핵심 도메인 오류 타입.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// 도메인 타입 생성/검증 오류.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoreError {
    /// 빈 캔들 시계열
    #[error("캔들 데이터가 비어있습니다")]
    EmptyFeed,

    /// 타임스탬프가 엄격하게 증가하지 않음
    #[error(
        "캔들 데이터가 시간순으로 정렬되어 있지 않습니다: index={index}, 이전={previous}, 현재={current}"
    )]
    NonMonotonic {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    /// OHLC 값이 일관되지 않음
    #[error("잘못된 캔들 데이터 (index={index}): {reason}")]
    MalformedCandle { index: usize, reason: String },

    /// 파라미터 값 오류
    #[error("잘못된 파라미터 '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
}

/// 핵심 도메인 결과 타입
pub type CoreResult<T> = Result<T, CoreError>;
