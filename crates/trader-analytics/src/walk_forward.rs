//! 워크포워드 검증
//!
//! (학습 구간, 검증 구간) 쌍을 시간순으로 밀면서 학습 구간에서 그리드 최적화를 수행하고,
//! 1위 파라미터를 바로 다음 검증 구간에서 한 번 실행합니다.
//!
//! ```text
//! 시간 ───────────────────────────────────────────────────────────▶
//! 창 0: [ 학습 ──────────── )[ 검증 ── )
//! 창 1:        [ 학습 ──────────── )[ 검증 ── )
//! 창 2:               [ 학습 ──────────── )[ 검증 ── )
//!       └ step ┘
//! ```
//!
//! 모든 구간은 반열림 `[start, end)`입니다. 표본 외(OOS) 집계는 검증 구간 결과로만 계산합니다.

use std::{ops::Range, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use trader_core::{CandleFeed, ParameterSet};
use trader_strategy::{Strategy, StrategyVariant};

use crate::{
    backtest::{simulate, BacktestConfig, BacktestError},
    optimizer::{CheckpointStore, GridOptimizer, GridSpec, OptimizerConfig, OptimizerError},
    performance::{evaluate, PerformanceSummary},
};

/// 워크포워드 오류
#[derive(Debug, Error)]
pub enum WalkForwardError {
    /// 설정 오류
    #[error("워크포워드 설정 오류: {0}")]
    Config(String),

    /// 학습 구간 최적화 오류
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),

    /// 검증 구간 백테스트 오류
    #[error(transparent)]
    Backtest(#[from] BacktestError),
}

/// 워크포워드 결과 타입
pub type WalkForwardResult<T> = Result<T, WalkForwardError>;

/// 워크포워드 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    /// 학습 구간 (일)
    #[serde(default = "default_train_days")]
    pub train_days: i64,
    /// 검증 구간 (일)
    #[serde(default = "default_test_days")]
    pub test_days: i64,
    /// 창 이동 간격 (일)
    #[serde(default = "default_step_days")]
    pub step_days: i64,
    /// 검증 구간 신호 계산 시 학습 구간을 지표 워밍업 이력으로 사용
    #[serde(default = "default_use_warmup_history")]
    pub use_warmup_history: bool,
}

fn default_train_days() -> i64 {
    90
}
fn default_test_days() -> i64 {
    30
}
fn default_step_days() -> i64 {
    30
}
fn default_use_warmup_history() -> bool {
    true
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_days: default_train_days(),
            test_days: default_test_days(),
            step_days: default_step_days(),
            use_warmup_history: default_use_warmup_history(),
        }
    }
}

impl WalkForwardConfig {
    pub fn new(train_days: i64, test_days: i64, step_days: i64) -> Self {
        Self {
            train_days,
            test_days,
            step_days,
            ..Default::default()
        }
    }

    pub fn with_warmup_history(mut self, enabled: bool) -> Self {
        self.use_warmup_history = enabled;
        self
    }

    /// 설정 검증
    pub fn validate(&self) -> WalkForwardResult<()> {
        for (name, days) in [
            ("train_days", self.train_days),
            ("test_days", self.test_days),
            ("step_days", self.step_days),
        ] {
            if days <= 0 {
                return Err(WalkForwardError::Config(format!(
                    "{name}는 1 이상이어야 합니다 (입력: {days})"
                )));
            }
        }
        Ok(())
    }
}

/// 창 하나의 시간 경계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub index: usize,
    pub train_start: DateTime<Utc>,
    pub train_end: DateTime<Utc>,
    pub test_start: DateTime<Utc>,
    pub test_end: DateTime<Utc>,
}

/// 피드 기간 안에 들어가는 창 목록.
///
/// `test_end ≤ last`인 동안 `train_start`를 `step_days`씩 이동합니다.
pub fn plan_windows(
    first: DateTime<Utc>,
    last: DateTime<Utc>,
    config: &WalkForwardConfig,
) -> Vec<WindowBounds> {
    let train = Duration::days(config.train_days);
    let test = Duration::days(config.test_days);
    let step = Duration::days(config.step_days);

    let mut windows = Vec::new();
    let mut train_start = first;
    loop {
        let train_end = train_start + train;
        let test_end = train_end + test;
        if test_end > last {
            break;
        }
        windows.push(WindowBounds {
            index: windows.len(),
            train_start,
            train_end,
            test_start: train_end,
            test_end,
        });
        train_start += step;
    }
    windows
}

/// 완료된 창 하나의 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardWindow {
    #[serde(flatten)]
    pub bounds: WindowBounds,
    /// 학습 구간 1위 파라미터
    pub chosen_params: ParameterSet,
    /// 학습 구간 성과 (선택 근거)
    pub in_sample: PerformanceSummary,
    /// 검증 구간 성과
    pub out_of_sample: PerformanceSummary,
    /// 검증 구간 종료 시 미청산 포지션 수
    pub oos_open_positions: usize,
}

/// 표본 외 집계 (검증 구간 결과만 사용)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OosAggregate {
    pub windows: usize,
    pub mean_return_pct: f64,
    pub mean_drawdown_pct: f64,
    pub total_trades: usize,
    /// 창별 수익률을 연속 복리로 적용한 누적 수익률
    pub compounded_return_pct: f64,
    /// 수익률 > 0인 창 수
    pub profitable_windows: usize,
}

impl OosAggregate {
    pub fn from_windows(windows: &[WalkForwardWindow]) -> Self {
        if windows.is_empty() {
            return Self::default();
        }
        let n = windows.len() as f64;
        let oos = || windows.iter().map(|w| &w.out_of_sample);

        Self {
            windows: windows.len(),
            mean_return_pct: oos().map(|s| s.total_return_pct).sum::<f64>() / n,
            mean_drawdown_pct: oos().map(|s| s.max_drawdown_pct).sum::<f64>() / n,
            total_trades: oos().map(|s| s.num_trades).sum(),
            compounded_return_pct: (oos()
                .map(|s| 1.0 + s.total_return_pct / 100.0)
                .product::<f64>()
                - 1.0)
                * 100.0,
            profitable_windows: oos().filter(|s| s.total_return_pct > 0.0).count(),
        }
    }
}

/// 워크포워드 리포트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardReport {
    pub run_id: String,
    pub config: WalkForwardConfig,
    /// 계획된 창 수
    pub planned_windows: usize,
    pub windows: Vec<WalkForwardWindow>,
    /// 빈 구간 또는 학습 결과 없음으로 건너뛴 창 수
    pub skipped_windows: usize,
    /// 취소 또는 작업 수 제한으로 중간에 멈췄는지
    pub interrupted: bool,
    pub oos: OosAggregate,
}

impl WalkForwardReport {
    /// 요약 문자열 반환
    pub fn summary(&self) -> String {
        let mut out = format!(
            "워크포워드 검증 결과 [{}]\n\
             ═══════════════════════════════════════\n\
             학습/검증/이동: {}/{}/{} 일\n\
             창: {} 완료, {} 건너뜀 (계획 {}){}\n\
             ───────────────────────────────────────\n",
            self.run_id,
            self.config.train_days,
            self.config.test_days,
            self.config.step_days,
            self.windows.len(),
            self.skipped_windows,
            self.planned_windows,
            if self.interrupted { ", 중단됨" } else { "" },
        );
        for window in &self.windows {
            out.push_str(&format!(
                "#{:<3} {} → {} | IS {:>7.2}% | OOS {:>7.2}% (낙폭 {:.2}%, 거래 {}) | {}\n",
                window.bounds.index,
                window.bounds.test_start.format("%Y-%m-%d"),
                window.bounds.test_end.format("%Y-%m-%d"),
                window.in_sample.total_return_pct,
                window.out_of_sample.total_return_pct,
                window.out_of_sample.max_drawdown_pct,
                window.out_of_sample.num_trades,
                window.chosen_params,
            ));
        }
        out.push_str(&format!(
            "───────────────────────────────────────\n\
             OOS 평균 수익률: {:.2}%\n\
             OOS 평균 낙폭: {:.2}%\n\
             OOS 누적 수익률: {:.2}%\n\
             OOS 총 거래: {}\n\
             수익 창: {}/{}\n\
             ═══════════════════════════════════════",
            self.oos.mean_return_pct,
            self.oos.mean_drawdown_pct,
            self.oos.compounded_return_pct,
            self.oos.total_trades,
            self.oos.profitable_windows,
            self.oos.windows,
        ));
        out
    }
}

/// 워크포워드 검증기
pub struct WalkForwardValidator {
    config: WalkForwardConfig,
    optimizer_config: OptimizerConfig,
    store: Arc<dyn CheckpointStore>,
    cancel: CancellationToken,
}

impl WalkForwardValidator {
    /// `optimizer_config.run_id`는 창별 실행 ID `<run_id>-wf<index>`의 접두어로 쓰입니다.
    pub fn new(
        config: WalkForwardConfig,
        optimizer_config: OptimizerConfig,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            config,
            optimizer_config,
            store,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 전체 창을 순서대로 실행합니다.
    pub async fn run(
        &self,
        feed: Arc<CandleFeed>,
        grid: &[GridSpec],
        base_config: &BacktestConfig,
    ) -> WalkForwardResult<WalkForwardReport> {
        self.config.validate()?;
        self.optimizer_config.validate()?;
        base_config.validate()?;

        let base_run_id = self.optimizer_config.run_id.clone();
        let plan = match (feed.first(), feed.last()) {
            (Some(first), Some(last)) => {
                plan_windows(first.timestamp, last.timestamp, &self.config)
            }
            _ => Vec::new(),
        };

        info!(
            run_id = %base_run_id,
            windows = plan.len(),
            train_days = self.config.train_days,
            test_days = self.config.test_days,
            step_days = self.config.step_days,
            "워크포워드 검증 시작"
        );

        let mut windows = Vec::with_capacity(plan.len());
        let mut skipped = 0usize;
        let mut interrupted = false;

        for bounds in &plan {
            if self.cancel.is_cancelled() {
                interrupted = true;
                break;
            }

            let train = feed.index_range(bounds.train_start, bounds.train_end);
            let test = feed.index_range(bounds.test_start, bounds.test_end);
            if train.is_empty() || test.is_empty() {
                warn!(window = bounds.index, "빈 학습/검증 구간, 창 건너뜀");
                skipped += 1;
                continue;
            }

            let optimizer = GridOptimizer::new(
                self.optimizer_config
                    .clone()
                    .with_run_id(format!("{base_run_id}-wf{}", bounds.index)),
                Arc::clone(&self.store),
            )
            .with_cancellation(self.cancel.clone());

            let in_sample = optimizer
                .optimize(Arc::new(feed.slice(train.clone())), grid, base_config)
                .await?;
            if in_sample.interrupted {
                interrupted = true;
                break;
            }

            let Some(best) = in_sample.best() else {
                warn!(
                    window = bounds.index,
                    failed = in_sample.failed,
                    "학습 구간에 순위 결과 없음, 창 건너뜀"
                );
                skipped += 1;
                continue;
            };

            let (out_of_sample, open_positions) =
                self.evaluate_out_of_sample(&feed, train, test, &best.params, base_config)?;

            info!(
                window = bounds.index,
                params = %best.params,
                is_return = best.summary.total_return_pct,
                oos_return = out_of_sample.total_return_pct,
                oos_trades = out_of_sample.num_trades,
                "창 완료"
            );

            windows.push(WalkForwardWindow {
                bounds: *bounds,
                chosen_params: best.params.clone(),
                in_sample: best.summary.clone(),
                out_of_sample,
                oos_open_positions: open_positions,
            });
        }

        let oos = OosAggregate::from_windows(&windows);
        info!(
            run_id = %base_run_id,
            completed = windows.len(),
            skipped,
            interrupted,
            mean_oos_return = oos.mean_return_pct,
            "워크포워드 검증 완료"
        );

        Ok(WalkForwardReport {
            run_id: base_run_id,
            config: self.config.clone(),
            planned_windows: plan.len(),
            windows,
            skipped_windows: skipped,
            interrupted,
            oos,
        })
    }

    /// 선택된 파라미터로 검증 구간을 한 번 실행합니다.
    ///
    /// 워밍업 이력을 쓰면 신호는 `[train_start, test_end)`에서 계산하고 검증 캔들만
    /// 시뮬레이션합니다. 인덱스 i의 지표는 i 이하 캔들에만 의존하므로 미래 데이터는 섞이지 않습니다.
    fn evaluate_out_of_sample(
        &self,
        feed: &CandleFeed,
        train: Range<usize>,
        test: Range<usize>,
        params: &ParameterSet,
        base_config: &BacktestConfig,
    ) -> WalkForwardResult<(PerformanceSummary, usize)> {
        let strategy = StrategyVariant::from_params(params).map_err(BacktestError::from)?;
        let config = base_config.with_overrides(params)?;
        let candles = feed.as_slice();
        let test_candles = &candles[test.clone()];

        let signals = if self.config.use_warmup_history {
            let history = &candles[train.start..test.end];
            let all = strategy
                .generate_signals(history)
                .map_err(BacktestError::from)?;
            all[test.start - train.start..].to_vec()
        } else {
            strategy
                .generate_signals(test_candles)
                .map_err(BacktestError::from)?
        };

        let result = simulate(test_candles, &signals, &config)?;
        let summary = evaluate(&result.trades, &result.equity, config.periods_per_year);
        Ok((summary, result.open_positions.len()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    #[test]
    fn test_plan_windows() {
        let config = WalkForwardConfig::new(30, 10, 10);
        let windows = plan_windows(day(0), day(99), &config);

        // test_end: 40, 50, ..., 90 (100 > 99에서 종료)
        assert_eq!(windows.len(), 6);
        assert_eq!(windows[0].train_start, day(0));
        assert_eq!(windows[0].test_start, day(30));
        assert_eq!(windows[0].test_end, day(40));
        assert_eq!(windows[5].test_end, day(90));
        for pair in windows.windows(2) {
            assert_eq!(pair[1].train_start - pair[0].train_start, Duration::days(10));
        }
    }

    #[test]
    fn test_plan_windows_too_short() {
        let config = WalkForwardConfig::new(30, 10, 10);
        assert!(plan_windows(day(0), day(39), &config).is_empty());
        assert_eq!(plan_windows(day(0), day(40), &config).len(), 1);
    }

    #[test]
    fn test_config_validation() {
        assert!(WalkForwardConfig::default().validate().is_ok());
        assert!(WalkForwardConfig::new(0, 10, 10).validate().is_err());
        assert!(WalkForwardConfig::new(30, 10, -1).validate().is_err());
    }

    #[test]
    fn test_oos_aggregate() {
        let window = |ret: f64, dd: f64, trades: usize| WalkForwardWindow {
            bounds: WindowBounds {
                index: 0,
                train_start: day(0),
                train_end: day(1),
                test_start: day(1),
                test_end: day(2),
            },
            chosen_params: ParameterSet::for_strategy("ma_cross"),
            // 학습 구간 값은 집계에 쓰이지 않아야 함
            in_sample: PerformanceSummary {
                total_return_pct: 1000.0,
                ..Default::default()
            },
            out_of_sample: PerformanceSummary {
                total_return_pct: ret,
                max_drawdown_pct: dd,
                num_trades: trades,
                ..Default::default()
            },
            oos_open_positions: 0,
        };

        let agg = OosAggregate::from_windows(&[window(10.0, 4.0, 3), window(-5.0, 8.0, 2)]);
        assert_eq!(agg.windows, 2);
        assert!((agg.mean_return_pct - 2.5).abs() < 1e-9);
        assert!((agg.mean_drawdown_pct - 6.0).abs() < 1e-9);
        assert_eq!(agg.total_trades, 5);
        assert!((agg.compounded_return_pct - 4.5).abs() < 1e-9);
        assert_eq!(agg.profitable_windows, 1);

        assert_eq!(OosAggregate::from_windows(&[]), OosAggregate::default());
    }
}
