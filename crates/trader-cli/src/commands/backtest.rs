//! 백테스트 명령어.
//!
//! CSV 캔들 데이터로 파라미터 조합 하나를 백테스트합니다.
//!
//! # 사용 예시
//!
//! ```bash
//! # 이동평균 교차 전략 백테스트
//! trader-opt backtest -d data/btc_1h.csv -s ma_cross -p fast_period=10 -p slow_period=30
//!
//! # 실행 파일의 [backtest] 설정과 기간 지정
//! trader-opt backtest -d data/btc_1h.csv -c runs/btc.toml -s rsi_reversion -f 2024-01-01 -t 2024-07-01
//!
//! # 사용 가능한 전략 목록
//! trader-opt backtest --list-strategies
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use tracing::info;
use trader_analytics::{backtest_params, BacktestConfig, BacktestReport};
use trader_core::{ParamValue, ParameterSet};
use trader_strategy::StrategyVariant;

use super::save_json;
use crate::{
    data::{date_start, load_candles, parse_date},
    settings::load_run_file,
};

/// 백테스트 CLI 설정
#[derive(Debug, Clone, Default)]
pub struct BacktestCliConfig {
    /// 캔들 CSV 경로
    pub data_path: PathBuf,
    /// 실행 파일 경로 (옵션, [backtest] 섹션만 사용)
    pub config_path: Option<PathBuf>,
    /// 전략 이름
    pub strategy: String,
    /// 전략/엔진 파라미터
    pub params: Vec<(String, ParamValue)>,
    /// 시작일 (YYYY-MM-DD, 포함)
    pub from: Option<String>,
    /// 종료일 (YYYY-MM-DD, 미포함)
    pub to: Option<String>,
    /// 초기 잔고 (실행 파일 값보다 우선)
    pub initial_balance: Option<Decimal>,
    /// 결과 저장 경로
    pub output_path: Option<PathBuf>,
}

impl BacktestCliConfig {
    /// 전략 이름과 파라미터로 ParameterSet 구성
    pub fn parameter_set(&self) -> Result<ParameterSet> {
        if !StrategyVariant::NAMES.contains(&self.strategy.as_str()) {
            bail!(
                "알 수 없는 전략: {} (사용 가능: {})",
                self.strategy,
                StrategyVariant::NAMES.join(", ")
            );
        }
        Ok(self
            .params
            .iter()
            .fold(ParameterSet::for_strategy(self.strategy.as_str()), |set, (name, value)| {
                set.with(name.as_str(), value.clone())
            }))
    }

    fn base_config(&self) -> Result<BacktestConfig> {
        let mut config = match &self.config_path {
            Some(path) => load_run_file(path)?.backtest,
            None => BacktestConfig::default(),
        };
        if let Some(balance) = self.initial_balance {
            config.initial_balance = balance;
        }
        config.validate().context("백테스트 설정 오류")?;
        Ok(config)
    }
}

/// 사용 가능한 전략 목록 출력
pub fn print_available_strategies() {
    println!("\n사용 가능한 전략:");
    println!("{:-<40}", "");
    for name in StrategyVariant::NAMES {
        println!("  {name}");
    }
    println!("{:-<40}", "");
    println!("엔진 파라미터: {}", trader_core::ENGINE_PARAM_KEYS.join(", "));
}

/// 백테스트 실행
pub fn run_backtest(config: BacktestCliConfig) -> Result<BacktestReport> {
    let params = config.parameter_set()?;
    let base_config = config.base_config()?;

    let from = config.from.as_deref().map(parse_date).transpose()?.map(date_start);
    let to = config.to.as_deref().map(parse_date).transpose()?.map(date_start);
    let feed = load_candles(&config.data_path, from, to)?;

    info!(params = %params, candles = feed.len(), "백테스트 시작");
    let report = backtest_params(feed.as_slice(), &params, &base_config)
        .with_context(|| format!("백테스트 실패: {params}"))?;

    println!("\n파라미터: {params}");
    println!("{}", report.summary());

    if let Some(path) = &config.output_path {
        save_json(path, &report)?;
        println!("\n결과 저장됨: {}", path.display());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rust_decimal_macros::dec;

    use super::*;

    fn write_csv(len: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
        for i in 0..len {
            let phase = (i % 20) as i64;
            let close = 100 + if phase < 10 { phase } else { 20 - phase } * 2;
            writeln!(
                file,
                "{},{close},{},{},{close},10",
                1_704_067_200_000i64 + i as i64 * 3_600_000,
                close + 1,
                close - 1
            )
            .unwrap();
        }
        file
    }

    #[test]
    fn test_parameter_set_from_args() {
        let config = BacktestCliConfig {
            strategy: "ma_cross".to_string(),
            params: vec![
                ("fast_period".to_string(), ParamValue::Int(5)),
                ("stop_loss_pct".to_string(), ParamValue::Decimal(dec!(0.02))),
            ],
            ..Default::default()
        };
        let params = config.parameter_set().unwrap();
        assert_eq!(params.strategy(), Some("ma_cross"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let config = BacktestCliConfig {
            strategy: "magic".to_string(),
            ..Default::default()
        };
        assert!(config.parameter_set().is_err());
    }

    #[test]
    fn test_run_backtest_writes_report() {
        let csv = write_csv(120);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out").join("report.json");

        let report = run_backtest(BacktestCliConfig {
            data_path: csv.path().to_path_buf(),
            strategy: "ma_cross".to_string(),
            params: vec![
                ("fast_period".to_string(), ParamValue::Int(3)),
                ("slow_period".to_string(), ParamValue::Int(8)),
            ],
            initial_balance: Some(dec!(1000)),
            output_path: Some(output.clone()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(report.data_points, 120);
        assert_eq!(report.config.initial_balance, dec!(1000));
        assert!(output.exists());
    }
}
