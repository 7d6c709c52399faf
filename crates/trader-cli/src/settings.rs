//! 실행 파일(TOML) 설정 모듈.
//!
//! ```toml
//! [backtest]
//! initial_balance = 10000000
//! fee_rate = 0.001
//! trade_mode = "long_and_short"
//!
//! [optimizer]
//! concurrency_cap = 8
//! flush_every = 50
//! rank_metric = "sharpe"
//!
//! [walk_forward]
//! train_days = 90
//! test_days = 30
//! step_days = 30
//!
//! [[grid]]
//! strategy = "ma_cross"
//!
//! [grid.params]
//! fast_period = [5, 10]
//! slow_period = [20, 30]
//! ```
//!
//! 파일 값은 `TRADER__OPTIMIZER__CONCURRENCY_CAP=4` 같은 환경변수로 덮어쓸 수 있습니다.

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use trader_analytics::{
    optimizer::StrategyGrid, BacktestConfig, OptimizerConfig, RankMetric, RetryConfig,
    WalkForwardConfig,
};

/// 환경변수 접두어
const ENV_PREFIX: &str = "TRADER";

/// 실행 파일 전체
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunFile {
    #[serde(default)]
    pub backtest: BacktestConfig,
    #[serde(default)]
    pub optimizer: OptimizerSection,
    #[serde(default)]
    pub walk_forward: WalkForwardConfig,
    #[serde(default)]
    pub grid: StrategyGrid,
}

/// `[optimizer]` 섹션
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerSection {
    /// 실행 ID (생략 시 명령행 값 또는 UUID)
    #[serde(default)]
    pub run_id: Option<String>,
    /// 체크포인트 루트 디렉토리
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: String,
    #[serde(default = "default_concurrency_cap")]
    pub concurrency_cap: usize,
    #[serde(default = "default_flush_every")]
    pub flush_every: usize,
    /// 주기 저장 간격 (밀리초)
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default)]
    pub rank_metric: RankMetric,
    #[serde(default)]
    pub min_trades: usize,
    #[serde(default)]
    pub top_n: Option<usize>,
    #[serde(default)]
    pub max_jobs_per_run: Option<usize>,
    #[serde(default)]
    pub retry: RetrySection,
}

fn default_checkpoint_dir() -> String {
    "checkpoints".to_string()
}
fn default_concurrency_cap() -> usize {
    8
}
fn default_flush_every() -> usize {
    50
}
fn default_flush_interval_ms() -> u64 {
    5_000
}

impl Default for OptimizerSection {
    fn default() -> Self {
        Self {
            run_id: None,
            checkpoint_dir: default_checkpoint_dir(),
            concurrency_cap: default_concurrency_cap(),
            flush_every: default_flush_every(),
            flush_interval_ms: default_flush_interval_ms(),
            rank_metric: RankMetric::default(),
            min_trades: 0,
            top_n: None,
            max_jobs_per_run: None,
            retry: RetrySection::default(),
        }
    }
}

impl OptimizerSection {
    /// 주어진 실행 ID로 최적화 설정을 만듭니다.
    pub fn to_optimizer_config(&self, run_id: &str) -> OptimizerConfig {
        let mut config = OptimizerConfig::new(run_id)
            .with_concurrency_cap(self.concurrency_cap)
            .with_flush_every(self.flush_every)
            .with_flush_interval(Duration::from_millis(self.flush_interval_ms))
            .with_rank_metric(self.rank_metric)
            .with_min_trades(self.min_trades)
            .with_retry(self.retry.to_retry_config());
        if let Some(top_n) = self.top_n {
            config = config.with_top_n(top_n);
        }
        if let Some(max_jobs) = self.max_jobs_per_run {
            config = config.with_max_jobs_per_run(max_jobs);
        }
        config
    }
}

/// `[optimizer.retry]` 섹션
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    200
}
fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetrySection {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            ..Default::default()
        }
    }
}

/// 실행 파일을 읽고 환경변수 덮어쓰기를 적용합니다.
pub fn load_run_file(path: &Path) -> Result<RunFile> {
    let run_file: RunFile = Config::builder()
        .add_source(File::from(path).format(FileFormat::Toml))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("설정 파일 로드 실패: {}", path.display()))?
        .try_deserialize()
        .with_context(|| format!("설정 파일 형식 오류: {}", path.display()))?;

    run_file
        .backtest
        .validate()
        .context("[backtest] 설정 검증 실패")?;
    run_file
        .walk_forward
        .validate()
        .context("[walk_forward] 설정 검증 실패")?;
    Ok(run_file)
}
