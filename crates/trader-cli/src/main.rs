//! 백테스트 / 파라미터 최적화 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 단일 백테스트
//! trader-opt backtest -d data/btc_1h.csv -s ma_cross -p fast_period=10 -p slow_period=30
//!
//! # 그리드 최적화 (중단 후 같은 --run-id로 재개)
//! trader-opt optimize -d data/btc_1h.csv -c runs/btc.toml --run-id btc-ma
//!
//! # 워크포워드 검증
//! trader-opt walk-forward -d data/btc_1d.csv -c runs/btc.toml -o reports/wf.json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trader_core::ParamValue;

mod commands;
mod data;
mod settings;

use commands::{
    backtest::{print_available_strategies, run_backtest, BacktestCliConfig},
    optimize::{run_optimize, OptimizeCliConfig},
    parse_param,
    walk_forward::{run_walk_forward, WalkForwardCliConfig},
};

#[derive(Parser)]
#[command(name = "trader-opt")]
#[command(about = "백테스트, 그리드 최적화, 워크포워드 검증", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 파라미터 조합 하나로 백테스트
    Backtest {
        /// 캔들 CSV 파일 (timestamp,open,high,low,close,volume)
        #[arg(short, long, required_unless_present = "list_strategies")]
        data: Option<PathBuf>,

        /// 전략 이름
        #[arg(short, long, required_unless_present = "list_strategies")]
        strategy: Option<String>,

        /// 전략/엔진 파라미터 (name=value, 반복 가능)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, ParamValue)>,

        /// 실행 파일 (TOML, [backtest] 섹션 사용)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// 시작일 (YYYY-MM-DD)
        #[arg(short = 'f', long)]
        from: Option<String>,

        /// 종료일 (YYYY-MM-DD, 미포함)
        #[arg(short, long)]
        to: Option<String>,

        /// 초기 잔고
        #[arg(long)]
        balance: Option<Decimal>,

        /// 결과 JSON 저장 경로
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 사용 가능한 전략 목록 출력
        #[arg(long)]
        list_strategies: bool,
    },

    /// 실행 파일의 그리드 전체를 최적화 (체크포인트/재개 지원)
    Optimize {
        /// 캔들 CSV 파일
        #[arg(short, long)]
        data: PathBuf,

        /// 실행 파일 (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// 실행 ID (재개 시 같은 값 사용, 생략 시 자동 생성)
        #[arg(long, env = "TRADER_RUN_ID")]
        run_id: Option<String>,

        /// 체크포인트 디렉토리
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,

        /// 이번 실행에서 처리할 최대 작업 수
        #[arg(long)]
        max_jobs: Option<usize>,

        /// 결과 JSON 저장 경로
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 학습 구간 최적화 + 검증 구간 평가를 시간순으로 반복
    WalkForward {
        /// 캔들 CSV 파일
        #[arg(short, long)]
        data: PathBuf,

        /// 실행 파일 (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// 실행 ID (창별 ID의 접두어)
        #[arg(long, env = "TRADER_RUN_ID")]
        run_id: Option<String>,

        /// 체크포인트 디렉토리
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,

        /// 학습 구간 (일)
        #[arg(long)]
        train_days: Option<i64>,

        /// 검증 구간 (일)
        #[arg(long)]
        test_days: Option<i64>,

        /// 이동 간격 (일)
        #[arg(long)]
        step_days: Option<i64>,

        /// 결과 JSON 저장 경로
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (없어도 에러 안남)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "trader_opt={},trader_analytics={},trader_strategy={}",
                    cli.log_level, cli.log_level, cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Backtest {
            data,
            strategy,
            params,
            config,
            from,
            to,
            balance,
            output,
            list_strategies,
        } => {
            if list_strategies {
                print_available_strategies();
                return Ok(());
            }

            let backtest_config = BacktestCliConfig {
                data_path: data.unwrap_or_default(),
                config_path: config,
                strategy: strategy.unwrap_or_default(),
                params,
                from,
                to,
                initial_balance: balance,
                output_path: output,
            };
            if let Err(e) = run_backtest(backtest_config) {
                error!("백테스트 실패: {e:#}");
                return Err(e);
            }
            info!("백테스트 완료");
        }

        Commands::Optimize {
            data,
            config,
            run_id,
            checkpoint_dir,
            max_jobs,
            output,
        } => {
            let optimize_config = OptimizeCliConfig {
                data_path: data,
                config_path: config,
                run_id,
                checkpoint_dir,
                max_jobs,
                output_path: output,
            };
            match run_optimize(optimize_config).await {
                Ok(report) => info!(
                    run_id = %report.run_id,
                    completed = report.completed(),
                    total = report.total,
                    "최적화 완료"
                ),
                Err(e) => {
                    error!("최적화 실패: {e:#}");
                    return Err(e);
                }
            }
        }

        Commands::WalkForward {
            data,
            config,
            run_id,
            checkpoint_dir,
            train_days,
            test_days,
            step_days,
            output,
        } => {
            let wf_config = WalkForwardCliConfig {
                data_path: data,
                config_path: config,
                run_id,
                checkpoint_dir,
                train_days,
                test_days,
                step_days,
                output_path: output,
            };
            match run_walk_forward(wf_config).await {
                Ok(report) => info!(
                    run_id = %report.run_id,
                    windows = report.windows.len(),
                    "워크포워드 검증 완료"
                ),
                Err(e) => {
                    error!("워크포워드 검증 실패: {e:#}");
                    return Err(e);
                }
            }
        }
    }

    Ok(())
}
