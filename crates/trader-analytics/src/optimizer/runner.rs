//! 그리드 최적화 실행기.
//!
//! 전개된 ParameterSet을 블로킹 워커 풀에 분배하고, 단일 수집기가 결과를 받아
//! 주기적으로 체크포인트에 저장합니다.
//!
//! ```text
//!  ┌──────────┐  pop   ┌──────────┐  mpsc   ┌───────────┐  flush  ┌────────────────┐
//!  │ 작업 큐   │ ─────▶ │ 워커 × N │ ──────▶ │ 수집기     │ ──────▶ │ CheckpointStore │
//!  └──────────┘        └──────────┘         └───────────┘         └────────────────┘
//! ```
//!
//! 워커는 불변 캔들 피드(`Arc<CandleFeed>`)를 공유하고 작업마다 다시 읽지 않습니다.
//! 체크포인트 쓰기는 수집기 하나만 수행합니다.

use std::{
    any::Any,
    collections::{BTreeMap, VecDeque},
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{mpsc, Mutex},
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use trader_core::{CandleFeed, ParameterSet};

use super::{
    checkpoint::{CheckpointError, CheckpointStore, JobOutcome, JobRecord},
    grid::{expand_grid, GridSpec},
    ranking::{rank_results, RankMetric, RankedResult},
    retry::{with_retry_if, RetryConfig},
    OptimizerError, OptimizerResult,
};
use crate::backtest::{backtest_params, BacktestConfig};

// ================================================================================================
// 설정
// ================================================================================================

/// 그리드 최적화 설정
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// 실행 ID (체크포인트 키)
    pub run_id: String,
    /// 최대 워커 수. 실제 워커 수는 `min(가용 병렬성 - 1, concurrency_cap)`, 최소 1.
    pub concurrency_cap: usize,
    /// 이 개수만큼 결과가 모이면 저장
    pub flush_every: usize,
    /// 결과가 남아 있으면 이 간격마다 저장
    pub flush_interval: Duration,
    /// 순위 기준
    pub rank_metric: RankMetric,
    /// 순위에 포함할 최소 거래 수
    pub min_trades: usize,
    /// 리포트에 남길 상위 결과 수 (`None`이면 전체)
    pub top_n: Option<usize>,
    /// 한 번의 실행에서 처리할 최대 작업 수 (`None`이면 제한 없음)
    pub max_jobs_per_run: Option<usize>,
    /// 체크포인트 저장 재시도 설정
    pub retry: RetryConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            run_id: "default".to_string(),
            concurrency_cap: 8,
            flush_every: 50,
            flush_interval: Duration::from_secs(5),
            rank_metric: RankMetric::default(),
            min_trades: 0,
            top_n: None,
            max_jobs_per_run: None,
            retry: RetryConfig::default(),
        }
    }
}

impl OptimizerConfig {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Default::default()
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_concurrency_cap(mut self, cap: usize) -> Self {
        self.concurrency_cap = cap;
        self
    }

    pub fn with_flush_every(mut self, count: usize) -> Self {
        self.flush_every = count;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_rank_metric(mut self, metric: RankMetric) -> Self {
        self.rank_metric = metric;
        self
    }

    pub fn with_min_trades(mut self, min_trades: usize) -> Self {
        self.min_trades = min_trades;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = Some(top_n);
        self
    }

    pub fn with_max_jobs_per_run(mut self, max_jobs: usize) -> Self {
        self.max_jobs_per_run = Some(max_jobs);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// 설정 검증
    pub fn validate(&self) -> OptimizerResult<()> {
        let valid_id = !self.run_id.is_empty()
            && self
                .run_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid_id || self.run_id.starts_with('.') {
            return Err(OptimizerError::Config(format!(
                "실행 ID는 영문/숫자/-/_/. 만 사용할 수 있습니다: '{}'",
                self.run_id
            )));
        }
        if self.concurrency_cap == 0 {
            return Err(OptimizerError::Config(
                "concurrency_cap은 1 이상이어야 합니다".to_string(),
            ));
        }
        if self.flush_every == 0 {
            return Err(OptimizerError::Config(
                "flush_every는 1 이상이어야 합니다".to_string(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(OptimizerError::Config(
                "flush_interval은 0보다 커야 합니다".to_string(),
            ));
        }
        Ok(())
    }

    /// 워커 수: `min(가용 병렬성 - 1, concurrency_cap)`, 최소 1.
    pub fn worker_count(&self) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        available
            .saturating_sub(1)
            .min(self.concurrency_cap)
            .max(1)
    }
}

// ================================================================================================
// 리포트
// ================================================================================================

/// 실패한 작업
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedJob {
    pub key: String,
    pub error: String,
}

/// 최적화 결과 리포트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub run_id: String,
    /// 순위 기준
    pub metric: RankMetric,
    /// 그리드의 고유 ParameterSet 수
    pub total: usize,
    /// 이번 실행에서 처리한 작업 수
    pub executed: usize,
    /// 체크포인트에서 불러온 완료 작업 수
    pub resumed: usize,
    /// 실패로 완료된 작업 수 (불러온 작업 포함)
    pub failed: usize,
    /// 실패 목록
    pub failures: Vec<FailedJob>,
    /// 순위표
    pub ranked: Vec<RankedResult>,
    /// 남은 작업이 있는 채로 끝났는지 (취소 또는 작업 수 제한)
    pub interrupted: bool,
    /// 체크포인트 저장이 한 번 이상 최종 실패했는지
    pub checkpoint_degraded: bool,
    pub finished_at: DateTime<Utc>,
}

impl OptimizationReport {
    /// 완료된 작업 수
    pub fn completed(&self) -> usize {
        self.resumed + self.executed
    }

    /// 1위 결과
    pub fn best(&self) -> Option<&RankedResult> {
        self.ranked.first()
    }

    /// 요약 문자열 반환
    pub fn summary(&self) -> String {
        let mut out = format!(
            "그리드 최적화 결과 [{}]\n\
             ═══════════════════════════════════════\n\
             조합: {} (이번 실행 {}, 재개 {}, 실패 {})\n\
             순위 기준: {}{}{}\n\
             ───────────────────────────────────────\n",
            self.run_id,
            self.total,
            self.executed,
            self.resumed,
            self.failed,
            self.metric,
            if self.interrupted { " / 중단됨" } else { "" },
            if self.checkpoint_degraded {
                " / 체크포인트 저장 실패"
            } else {
                ""
            },
        );
        out.push_str(" 순위 |   수익률 |   낙폭 |  샤프 | 거래 | 파라미터\n");
        for result in &self.ranked {
            out.push_str(&format!(
                "{:>5} | {:>7.2}% | {:>5.2}% | {:>5.2} | {:>4} | {}\n",
                result.rank,
                result.summary.total_return_pct,
                result.summary.max_drawdown_pct,
                result.summary.sharpe_ratio,
                result.summary.num_trades,
                result.key,
            ));
        }
        out.push_str("═══════════════════════════════════════");
        out
    }
}

// ================================================================================================
// 워커
// ================================================================================================

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("알 수 없는 패닉")
}

/// 워커 하나가 생성 시 받는 불변 컨텍스트.
pub struct WorkerContext {
    worker_id: usize,
    feed: Arc<CandleFeed>,
    base_config: Arc<BacktestConfig>,
}

impl WorkerContext {
    pub fn new(worker_id: usize, feed: Arc<CandleFeed>, base_config: Arc<BacktestConfig>) -> Self {
        Self {
            worker_id,
            feed,
            base_config,
        }
    }

    /// 작업 하나 실행. 실패도 레코드로 반환합니다.
    ///
    /// 백테스트 중 패닉이 나도 워커는 살아남고 해당 키만 실패로 기록됩니다.
    pub fn run_job(&self, params: &ParameterSet) -> JobRecord {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            backtest_params(self.feed.as_slice(), params, &self.base_config)
        }));
        let result = match outcome {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(payload) => Err(format!("작업 패닉: {}", panic_message(payload.as_ref()))),
        };

        match result {
            Ok(report) => {
                debug!(
                    worker = self.worker_id,
                    key = %params,
                    return_pct = report.summary.total_return_pct,
                    trades = report.summary.num_trades,
                    "작업 완료"
                );
                JobRecord::completed(params.clone(), report.summary)
            }
            Err(e) => {
                error!(worker = self.worker_id, key = %params, error = %e, "작업 실패");
                JobRecord::failed(params.clone(), e)
            }
        }
    }

    /// 큐가 비거나 취소될 때까지 작업을 처리합니다. 처리한 작업 수를 반환합니다.
    fn run(
        self,
        queue: Arc<Mutex<VecDeque<ParameterSet>>>,
        results: mpsc::Sender<JobRecord>,
        cancel: CancellationToken,
    ) -> usize {
        let mut processed = 0;
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let Some(params) = queue.blocking_lock().pop_front() else {
                break;
            };
            let record = self.run_job(&params);
            // 취소 중 끝난 작업은 버리고 다음 실행에서 다시 수행
            if cancel.is_cancelled() || results.blocking_send(record).is_err() {
                break;
            }
            processed += 1;
        }
        debug!(worker = self.worker_id, processed, "워커 종료");
        processed
    }
}

// ================================================================================================
// 최적화기
// ================================================================================================

/// 그리드 최적화기
pub struct GridOptimizer {
    config: OptimizerConfig,
    store: Arc<dyn CheckpointStore>,
    cancel: CancellationToken,
}

impl GridOptimizer {
    pub fn new(config: OptimizerConfig, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            config,
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// 외부 취소 토큰 연결
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// 그리드 전체를 실행하고 순위 리포트를 반환합니다.
    ///
    /// 설정/그리드 오류와 체크포인트 로드 실패는 작업 시작 전에 오류로 반환됩니다.
    /// 개별 작업 실패는 실패 레코드로 남고 실행은 계속됩니다.
    pub async fn optimize(
        &self,
        feed: Arc<CandleFeed>,
        grid: &[GridSpec],
        base_config: &BacktestConfig,
    ) -> OptimizerResult<OptimizationReport> {
        self.config.validate()?;
        base_config.validate()?;
        let sets = expand_grid(grid)?;
        let total = sets.len();
        let run_id = self.config.run_id.as_str();

        let state = with_retry_if(
            &self.config.retry,
            "체크포인트 로드",
            || self.store.load(run_id),
            CheckpointError::is_retryable,
        )
        .await?;

        let mut records: BTreeMap<String, JobRecord> = BTreeMap::new();
        let mut pending: VecDeque<ParameterSet> = VecDeque::new();
        for set in sets {
            let key = set.key();
            match state.records.get(&key) {
                Some(record) => {
                    records.insert(key, record.clone());
                }
                None => pending.push_back(set),
            }
        }
        let resumed = records.len();
        if let Some(max_jobs) = self.config.max_jobs_per_run {
            pending.truncate(max_jobs);
        }
        let scheduled = pending.len();
        let workers = self.config.worker_count().min(scheduled.max(1));

        info!(
            run_id,
            total,
            resumed,
            scheduled,
            workers,
            candles = feed.len(),
            "그리드 최적화 시작"
        );
        let started = Instant::now();

        let queue = Arc::new(Mutex::new(pending));
        let base_config = Arc::new(base_config.clone());
        let (tx, mut rx) = mpsc::channel::<JobRecord>(workers * 2);

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let context = WorkerContext::new(worker_id, Arc::clone(&feed), Arc::clone(&base_config));
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let cancel = self.cancel.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                context.run(queue, tx, cancel)
            }));
        }
        drop(tx);

        // 수집기: 유일한 체크포인트 작성자
        let mut batch: Vec<JobRecord> = Vec::with_capacity(self.config.flush_every);
        let mut executed = 0usize;
        let mut degraded = false;
        let mut ticker = tokio::time::interval(self.config.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(record) => {
                        executed += 1;
                        records.insert(record.key.clone(), record.clone());
                        batch.push(record);
                        if batch.len() >= self.config.flush_every {
                            self.flush_batch(&mut batch, &mut degraded).await;
                        }
                        if executed % 100 == 0 {
                            info!(run_id, executed, scheduled, "최적화 진행 중");
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    self.flush_batch(&mut batch, &mut degraded).await;
                }
            }
        }
        self.flush_batch(&mut batch, &mut degraded).await;

        for handle in handles {
            handle
                .await
                .map_err(|e| OptimizerError::Worker(e.to_string()))?;
        }

        let failures: Vec<FailedJob> = records
            .values()
            .filter_map(|record| match &record.outcome {
                JobOutcome::Failed { error } => Some(FailedJob {
                    key: record.key.clone(),
                    error: error.clone(),
                }),
                JobOutcome::Completed { .. } => None,
            })
            .collect();

        let mut ranked = rank_results(
            records.values(),
            self.config.rank_metric,
            self.config.min_trades,
        );
        if let Some(top_n) = self.config.top_n {
            ranked.truncate(top_n);
        }

        let interrupted = records.len() < total;
        let mut report = OptimizationReport {
            run_id: run_id.to_string(),
            metric: self.config.rank_metric,
            total,
            executed,
            resumed,
            failed: failures.len(),
            failures,
            ranked,
            interrupted,
            checkpoint_degraded: degraded,
            finished_at: Utc::now(),
        };

        if interrupted {
            warn!(
                run_id,
                completed = report.completed(),
                total,
                cancelled = self.cancel.is_cancelled(),
                "남은 작업이 있는 채로 최적화 종료 (다음 실행에서 재개)"
            );
        } else if let Err(e) = with_retry_if(
            &self.config.retry,
            "리포트 저장",
            || self.store.write_report(run_id, &report),
            CheckpointError::is_retryable,
        )
        .await
        {
            warn!(run_id, error = %e, "최종 리포트 저장 실패");
            report.checkpoint_degraded = true;
        }

        info!(
            run_id,
            executed,
            failed = report.failed,
            ranked = report.ranked.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "그리드 최적화 완료"
        );
        Ok(report)
    }

    /// 배치를 저장합니다. 재시도 후에도 실패하면 배치를 유지하고 degraded로 표시합니다.
    async fn flush_batch(&self, batch: &mut Vec<JobRecord>, degraded: &mut bool) {
        if batch.is_empty() {
            return;
        }
        let run_id = self.config.run_id.as_str();
        let records: &[JobRecord] = batch;
        let result = with_retry_if(
            &self.config.retry,
            "체크포인트 저장",
            || self.store.flush(run_id, records),
            CheckpointError::is_retryable,
        )
        .await;

        match result {
            Ok(()) => {
                debug!(run_id, count = batch.len(), "체크포인트 저장");
                batch.clear();
            }
            Err(e) => {
                warn!(
                    run_id,
                    error = %e,
                    pending = batch.len(),
                    "체크포인트 저장 실패, 결과는 메모리에 유지"
                );
                *degraded = true;
            }
        }
    }
}
