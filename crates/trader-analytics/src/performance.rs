//! 성과 평가
//!
//! 거래 목록과 자산 곡선에서 요약 지표를 계산합니다.
//!
//! - 총 수익률: `(마지막 자산 / 첫 자산 - 1) × 100`
//! - 최대 낙폭: 누적 최고점 대비 최대 하락폭 (양수 %, 0~100)
//! - 승률: 손익 > 0 거래 비율
//! - 샤프 비율: 기간 수익률의 평균 / 표본 표준편차 × √연율화 기간 수
//! - 프로핏 팩터: 총 이익 / 총 손실 (손실 없이 이익만 있으면 무한대)

use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};

use crate::backtest::{EquityPoint, Trade};

/// 성과 요약
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    /// 총 수익률 (%)
    pub total_return_pct: f64,
    /// 최대 낙폭 (%, 양수)
    pub max_drawdown_pct: f64,
    /// 승률 (%)
    pub win_rate_pct: f64,
    /// 연율화 샤프 비율
    pub sharpe_ratio: f64,
    /// 프로핏 팩터. 손실 거래 없이 이익 거래만 있으면 `f64::INFINITY` ("inf"로 직렬화)
    #[serde(with = "profit_factor_serde")]
    pub profit_factor: f64,
    /// 청산 거래 수
    pub num_trades: usize,
}

impl Default for PerformanceSummary {
    fn default() -> Self {
        Self {
            total_return_pct: 0.0,
            max_drawdown_pct: 0.0,
            win_rate_pct: 0.0,
            sharpe_ratio: 0.0,
            profit_factor: 0.0,
            num_trades: 0,
        }
    }
}

impl PerformanceSummary {
    /// 프로핏 팩터가 무한대(손실 거래 없음)인지 여부
    pub fn has_infinite_profit_factor(&self) -> bool {
        self.profit_factor.is_infinite()
    }

    /// 요약 문자열 반환
    pub fn summary(&self) -> String {
        let profit_factor = if self.has_infinite_profit_factor() {
            "∞".to_string()
        } else {
            format!("{:.2}", self.profit_factor)
        };

        format!(
            "총 수익률: {:.2}%\n\
             최대 낙폭: {:.2}%\n\
             ───────────────────────────────────────\n\
             총 거래: {}\n\
             승률: {:.1}%\n\
             프로핏 팩터: {}\n\
             샤프 비율: {:.2}\n\
             ═══════════════════════════════════════",
            self.total_return_pct,
            self.max_drawdown_pct,
            self.num_trades,
            self.win_rate_pct,
            profit_factor,
            self.sharpe_ratio,
        )
    }
}

/// 거래 목록과 자산 곡선으로 성과를 평가합니다.
///
/// `periods_per_year`는 자산 곡선 한 점의 간격 기준 연율화 기간 수입니다 (일봉 = 365).
pub fn evaluate(trades: &[Trade], equity: &[EquityPoint], periods_per_year: f64) -> PerformanceSummary {
    let values: Vec<f64> = equity.iter().map(|p| to_f64(p.account_value)).collect();
    let pnls: Vec<Decimal> = trades.iter().map(|t| t.pnl).collect();

    PerformanceSummary {
        total_return_pct: total_return_pct(&values),
        max_drawdown_pct: max_drawdown_pct(&values),
        win_rate_pct: win_rate_pct(&pnls),
        sharpe_ratio: sharpe_ratio(&period_returns(&values), periods_per_year),
        profit_factor: profit_factor(&pnls),
        num_trades: trades.len(),
    }
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn total_return_pct(values: &[f64]) -> f64 {
    match (values.first(), values.last()) {
        (Some(&first), Some(&last)) if first > 0.0 => (last / first - 1.0) * 100.0,
        _ => 0.0,
    }
}

/// 누적 최고점 대비 최대 낙폭 (%)
pub fn max_drawdown_pct(values: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd: f64 = 0.0;

    for &value in values {
        peak = peak.max(value);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
        }
    }

    (max_dd * 100.0).clamp(0.0, 100.0)
}

fn win_rate_pct(pnls: &[Decimal]) -> f64 {
    if pnls.is_empty() {
        return 0.0;
    }
    let wins = pnls.iter().filter(|pnl| **pnl > Decimal::ZERO).count();
    wins as f64 / pnls.len() as f64 * 100.0
}

/// 연속한 자산 값 사이의 기간 수익률. 직전 값이 0(파산)이면 건너뜁니다.
fn period_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

/// 연율화 샤프 비율. 관측치가 2개 미만이거나 표준편차가 0이면 0.
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();

    if !std_dev.is_finite() || std_dev <= f64::EPSILON {
        return 0.0;
    }
    mean / std_dev * periods_per_year.sqrt()
}

fn profit_factor(pnls: &[Decimal]) -> f64 {
    let gross_profit = pnls
        .iter()
        .filter(|p| **p > Decimal::ZERO)
        .fold(Decimal::ZERO, |acc, p| acc.saturating_add(*p));
    let gross_loss = pnls
        .iter()
        .filter(|p| **p < Decimal::ZERO)
        .fold(Decimal::ZERO, |acc, p| acc.saturating_add(-*p));

    if gross_loss.is_zero() {
        if gross_profit.is_zero() {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        // 몫이 Decimal 범위를 넘으면 f64로 나눔
        gross_profit
            .checked_div(gross_loss)
            .map(to_f64)
            .unwrap_or_else(|| to_f64(gross_profit) / to_f64(gross_loss))
    }
}

/// 무한대 프로핏 팩터를 JSON에서 `"inf"`로 표현합니다.
mod profit_factor_serde {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    const INF: &str = "inf";

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_infinite() {
            serializer.serialize_str(INF)
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(text) if text == INF => Ok(f64::INFINITY),
            Repr::Text(text) => Err(D::Error::custom(format!(
                "프로핏 팩터 형식 오류: {text}"
            ))),
        }
    }
}
