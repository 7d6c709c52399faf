//! 파라미터 그리드 최적화
//!
//! 전략 파라미터의 카테시안 곱을 병렬 워커로 백테스트하고 결과에 순위를 매깁니다.
//! 진행 상황은 체크포인트로 저장되어 중단 후 재실행하면 남은 작업만 수행합니다.
//!
//! # 주요 구성요소
//!
//! - [`GridSpec`], [`expand_grid`]: 그리드 정의와 전개
//! - [`GridOptimizer`]: 워커 풀 + 단일 수집기 실행기
//! - [`CheckpointStore`]: 완료 키와 결과 저장소 ([`FileCheckpointStore`], [`MemoryCheckpointStore`])
//! - [`rank_results`]: 순위 기준별 정렬
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! let store = Arc::new(FileCheckpointStore::new("./checkpoints"));
//! let optimizer = GridOptimizer::new(OptimizerConfig::new("btc-ma"), store);
//! let report = optimizer.optimize(feed, &grid, &BacktestConfig::default()).await?;
//! println!("{}", report.summary());
//! ```

pub mod checkpoint;
pub mod grid;
pub mod ranking;
pub mod retry;
pub mod runner;

pub use checkpoint::{
    write_atomic, CheckpointError, CheckpointResult, CheckpointState, CheckpointStore,
    FileCheckpointStore, JobOutcome, JobRecord, MemoryCheckpointStore, Progress,
};
pub use grid::{expand_grid, GridSpec, StrategyGrid};
pub use ranking::{rank_results, RankMetric, RankedResult};
pub use retry::{with_retry, with_retry_if, RetryConfig};
pub use runner::{FailedJob, GridOptimizer, OptimizationReport, OptimizerConfig, WorkerContext};

use thiserror::Error;

use crate::backtest::BacktestError;

/// 최적화 오류 (실행 전체를 중단시키는 오류만 포함)
#[derive(Debug, Error)]
pub enum OptimizerError {
    /// 최적화 설정 오류
    #[error("최적화 설정 오류: {0}")]
    Config(String),

    /// 그리드 정의 오류
    #[error("그리드 정의 오류: {0}")]
    InvalidGrid(String),

    /// 기본 백테스트 설정 오류
    #[error(transparent)]
    Backtest(#[from] BacktestError),

    /// 체크포인트 로드 실패
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// 워커 태스크 실패
    #[error("워커 실행 오류: {0}")]
    Worker(String),
}

/// 최적화 결과 타입
pub type OptimizerResult<T> = Result<T, OptimizerError>;
