//! 워크포워드 검증 명령어.
//!
//! ```bash
//! trader-opt walk-forward -d data/btc_1d.csv -c runs/btc.toml --train-days 120
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use trader_analytics::{FileCheckpointStore, WalkForwardReport, WalkForwardValidator};

use super::{optimize::resolve_run_id, save_json, shutdown_signal};
use crate::{data::load_candles, settings::load_run_file};

/// 워크포워드 CLI 설정
#[derive(Debug, Clone, Default)]
pub struct WalkForwardCliConfig {
    pub data_path: PathBuf,
    pub config_path: PathBuf,
    pub run_id: Option<String>,
    pub checkpoint_dir: Option<PathBuf>,
    /// 학습 구간 (일, 실행 파일 값보다 우선)
    pub train_days: Option<i64>,
    /// 검증 구간 (일)
    pub test_days: Option<i64>,
    /// 이동 간격 (일)
    pub step_days: Option<i64>,
    pub output_path: Option<PathBuf>,
}

/// 워크포워드 검증 실행
pub async fn run_walk_forward(config: WalkForwardCliConfig) -> Result<WalkForwardReport> {
    let run_file = load_run_file(&config.config_path)?;
    if run_file.grid.is_empty() {
        bail!("{}: [[grid]] 정의가 없습니다", config.config_path.display());
    }

    let mut wf_config = run_file.walk_forward.clone();
    if let Some(days) = config.train_days {
        wf_config.train_days = days;
    }
    if let Some(days) = config.test_days {
        wf_config.test_days = days;
    }
    if let Some(days) = config.step_days {
        wf_config.step_days = days;
    }

    let feed = Arc::new(load_candles(&config.data_path, None, None)?);
    let run_id = resolve_run_id(config.run_id.as_deref(), run_file.optimizer.run_id.as_deref());
    let checkpoint_dir = config
        .checkpoint_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&run_file.optimizer.checkpoint_dir));
    let store = Arc::new(FileCheckpointStore::new(&checkpoint_dir));

    let shutdown = CancellationToken::new();
    let signal_task = tokio::spawn(shutdown_signal(shutdown.clone()));

    info!(
        run_id = %run_id,
        train_days = wf_config.train_days,
        test_days = wf_config.test_days,
        step_days = wf_config.step_days,
        "워크포워드 실행"
    );
    let validator = WalkForwardValidator::new(
        wf_config,
        run_file.optimizer.to_optimizer_config(&run_id),
        store,
    )
    .with_cancellation(shutdown.clone());
    let result = validator
        .run(feed, &run_file.grid, &run_file.backtest)
        .await;

    shutdown.cancel();
    let _ = signal_task.await;

    let report = result.with_context(|| format!("워크포워드 검증 실패 [{run_id}]"))?;
    println!("\n{}", report.summary());

    if report.interrupted {
        warn!(run_id = %run_id, completed = report.windows.len(), "워크포워드 중단됨");
        println!("\n남은 창이 있습니다. 재개: --run-id {run_id}");
    }
    if let Some(path) = &config.output_path {
        save_json(path, &report)?;
        println!("\n결과 저장됨: {}", path.display());
    }
    Ok(report)
}
