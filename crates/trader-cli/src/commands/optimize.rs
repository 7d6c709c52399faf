//! 그리드 최적화 명령어.
//!
//! # 사용 예시
//!
//! ```bash
//! # 실행 파일의 [[grid]] 전체를 최적화 (실행 ID 자동 생성)
//! trader-opt optimize -d data/btc_1h.csv -c runs/btc.toml
//!
//! # 중단된 실행 재개: 같은 실행 ID로 다시 실행
//! trader-opt optimize -d data/btc_1h.csv -c runs/btc.toml --run-id btc-ma
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use trader_analytics::{FileCheckpointStore, GridOptimizer, OptimizationReport};

use super::{save_json, shutdown_signal};
use crate::{data::load_candles, settings::load_run_file};

/// 최적화 CLI 설정
#[derive(Debug, Clone, Default)]
pub struct OptimizeCliConfig {
    /// 캔들 CSV 경로
    pub data_path: PathBuf,
    /// 실행 파일 경로
    pub config_path: PathBuf,
    /// 실행 ID (실행 파일 값보다 우선)
    pub run_id: Option<String>,
    /// 체크포인트 디렉토리 (실행 파일 값보다 우선)
    pub checkpoint_dir: Option<PathBuf>,
    /// 이번 실행의 최대 작업 수
    pub max_jobs: Option<usize>,
    /// 결과 저장 경로
    pub output_path: Option<PathBuf>,
}

/// 실행 ID 결정: 명령행 → 실행 파일 → 새 UUID
pub fn resolve_run_id(cli: Option<&str>, file: Option<&str>) -> String {
    cli.or(file)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// 그리드 최적화 실행
pub async fn run_optimize(config: OptimizeCliConfig) -> Result<OptimizationReport> {
    let run_file = load_run_file(&config.config_path)?;
    if run_file.grid.is_empty() {
        bail!("{}: [[grid]] 정의가 없습니다", config.config_path.display());
    }
    let feed = Arc::new(load_candles(&config.data_path, None, None)?);

    let run_id = resolve_run_id(config.run_id.as_deref(), run_file.optimizer.run_id.as_deref());
    let mut optimizer_config = run_file.optimizer.to_optimizer_config(&run_id);
    if let Some(max_jobs) = config.max_jobs {
        optimizer_config = optimizer_config.with_max_jobs_per_run(max_jobs);
    }
    let checkpoint_dir = config
        .checkpoint_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&run_file.optimizer.checkpoint_dir));
    let store = Arc::new(FileCheckpointStore::new(&checkpoint_dir));

    let shutdown = CancellationToken::new();
    let signal_task = tokio::spawn(shutdown_signal(shutdown.clone()));

    info!(
        run_id = %run_id,
        checkpoint_dir = %checkpoint_dir.display(),
        strategies = run_file.grid.len(),
        "최적화 실행"
    );
    let result = GridOptimizer::new(optimizer_config, store)
        .with_cancellation(shutdown.clone())
        .optimize(feed, &run_file.grid, &run_file.backtest)
        .await;

    // 시그널 대기 태스크 정리
    shutdown.cancel();
    let _ = signal_task.await;

    let report = result.with_context(|| format!("최적화 실패 [{run_id}]"))?;
    println!("\n{}", report.summary());

    if report.interrupted {
        warn!(run_id = %run_id, completed = report.completed(), total = report.total, "최적화 중단됨");
        println!(
            "\n남은 작업이 있습니다. 재개: --run-id {run_id} (체크포인트: {})",
            checkpoint_dir.display()
        );
    }
    if report.checkpoint_degraded {
        println!("\n⚠️ 체크포인트 저장에 실패했습니다. 결과는 이번 출력에만 있습니다.");
    }
    if let Some(path) = &config.output_path {
        save_json(path, &report)?;
        println!("\n결과 저장됨: {}", path.display());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_fixture(dir: &std::path::Path) -> (PathBuf, PathBuf) {
        let csv_path = dir.join("candles.csv");
        let mut csv = std::fs::File::create(&csv_path).unwrap();
        writeln!(csv, "timestamp,open,high,low,close,volume").unwrap();
        for i in 0..150i64 {
            let phase = i % 24;
            let close = 200 + if phase < 12 { phase } else { 24 - phase } * 3;
            writeln!(
                csv,
                "{},{close},{},{},{close},5",
                1_704_067_200_000i64 + i * 3_600_000,
                close + 2,
                close - 2
            )
            .unwrap();
        }

        let run_path = dir.join("run.toml");
        std::fs::write(
            &run_path,
            r#"
            [backtest]
            initial_balance = 10000
            trade_mode = "long_and_short"

            [optimizer]
            concurrency_cap = 2
            flush_every = 2

            [[grid]]
            strategy = "ma_cross"

            [grid.params]
            fast_period = [2, 3, 4]
            slow_period = [8, 12]
            "#,
        )
        .unwrap();
        (csv_path, run_path)
    }

    #[test]
    fn test_resolve_run_id() {
        assert_eq!(resolve_run_id(Some("cli"), Some("file")), "cli");
        assert_eq!(resolve_run_id(None, Some("file")), "file");
        let generated = resolve_run_id(None, None);
        assert!(uuid::Uuid::parse_str(&generated).is_ok());
    }

    #[tokio::test]
    async fn test_optimize_resumes_with_same_run_id() {
        let dir = tempfile::tempdir().unwrap();
        let (data_path, config_path) = write_fixture(dir.path());
        let config = OptimizeCliConfig {
            data_path,
            config_path,
            run_id: Some("cli-test".to_string()),
            checkpoint_dir: Some(dir.path().join("checkpoints")),
            max_jobs: Some(4),
            output_path: None,
        };

        let first = run_optimize(config.clone()).await.unwrap();
        assert!(first.interrupted);
        assert_eq!(first.executed, 4);

        let output = dir.path().join("reports").join("final.json");
        let second = run_optimize(OptimizeCliConfig {
            max_jobs: None,
            output_path: Some(output.clone()),
            ..config
        })
        .await
        .unwrap();
        assert_eq!(second.resumed, 4);
        assert_eq!(second.executed, 2);
        assert_eq!(second.ranked.len(), 6);
        assert!(output.exists());
        assert!(dir.path().join("checkpoints/cli-test/report.json").exists());
    }
}
