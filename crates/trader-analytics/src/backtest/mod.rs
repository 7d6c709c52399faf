//! 백테스팅 모듈
//!
//! 과거 데이터로 트레이딩 전략을 시뮬레이션합니다.
//!
//! # 주요 구성요소
//!
//! - [`BacktestConfig`]: 백테스트 설정 (초기 잔고, 수수료, 레버리지, 손절/익절, 트레일링 스탑)
//! - [`BacktestEngine`]: 캔들 단위 시뮬레이션 엔진
//! - [`simulate`]: 신호 시계열 → 거래 + 자산 곡선
//! - [`BacktestReport`]: 전략 단위 실행 결과 리포트

pub mod engine;
pub mod trade;

pub use engine::{
    backtest_params, run_backtest, simulate, BacktestConfig, BacktestEngine, BacktestError,
    BacktestReport, BacktestResult, TrailingStopMode,
};
pub use trade::{EquityPoint, ExitReason, Position, SimulationResult, Trade};
