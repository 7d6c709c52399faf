//! CLI 명령어 구현.

pub mod backtest;
pub mod optimize;
pub mod walk_forward;

use std::{path::Path, str::FromStr};

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use trader_core::ParamValue;

/// 결과를 JSON 파일로 저장합니다. 상위 디렉토리가 없으면 생성합니다.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("디렉토리 생성 실패: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("결과 직렬화 실패")?;
    std::fs::write(path, json).with_context(|| format!("결과 저장 실패: {}", path.display()))?;
    info!(path = %path.display(), "결과 저장 완료");
    Ok(())
}

/// `name=value` 형식의 파라미터 인자 파싱.
///
/// 값은 정수 → 소수 → 불리언 → 문자열 순서로 해석합니다.
pub fn parse_param(arg: &str) -> Result<(String, ParamValue), String> {
    let (name, raw) = arg
        .split_once('=')
        .ok_or_else(|| format!("파라미터는 name=value 형식이어야 합니다: {arg}"))?;
    let name = name.trim();
    let raw = raw.trim();
    if name.is_empty() {
        return Err(format!("파라미터 이름이 비어있습니다: {arg}"));
    }

    let value = if let Ok(v) = raw.parse::<i64>() {
        ParamValue::Int(v)
    } else if let Ok(v) = Decimal::from_str(raw) {
        ParamValue::Decimal(v)
    } else if let Ok(v) = raw.parse::<bool>() {
        ParamValue::Bool(v)
    } else {
        ParamValue::Text(raw.to_string())
    };
    Ok((name.to_string(), value))
}

/// Ctrl+C 또는 SIGTERM을 받으면 취소 토큰을 취소합니다.
///
/// 진행 중인 작업은 마무리되고 다음 실행에서 남은 작업부터 재개됩니다.
pub async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C 핸들러 설치 실패");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM 핸들러 설치 실패");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Ctrl+C 수신, 진행 중인 작업을 마무리하고 종료합니다...");
        }
        _ = terminate => {
            warn!("SIGTERM 수신, 진행 중인 작업을 마무리하고 종료합니다...");
        }
        _ = shutdown_token.cancelled() => return,
    }

    shutdown_token.cancel();
}
