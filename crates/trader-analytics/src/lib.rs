//! 백테스트, 성과 평가, 파라미터 최적화, 워크포워드 검증.
//!
//! 데이터 흐름:
//!
//! ```text
//! CandleFeed → Strategy(신호) → backtest::simulate → performance::evaluate
//!                                    └─ optimizer::GridOptimizer (ParameterSet마다 반복)
//!                                          └─ walk_forward::WalkForwardValidator (창마다 반복)
//! ```

pub mod backtest;
pub mod optimizer;
pub mod performance;
pub mod walk_forward;

pub use backtest::{
    backtest_params, run_backtest, simulate, BacktestConfig, BacktestEngine, BacktestError,
    BacktestReport, BacktestResult, EquityPoint, ExitReason, Position, SimulationResult, Trade,
    TrailingStopMode,
};
pub use optimizer::{
    expand_grid, CheckpointStore, FileCheckpointStore, GridOptimizer, GridSpec,
    MemoryCheckpointStore, OptimizationReport, OptimizerConfig, OptimizerError, RankMetric,
    RetryConfig,
};
pub use performance::{evaluate, PerformanceSummary};
pub use walk_forward::{
    OosAggregate, WalkForwardConfig, WalkForwardError, WalkForwardReport, WalkForwardValidator,
    WalkForwardWindow,
};
