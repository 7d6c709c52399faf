//! 최적화 결과 순위.

use std::{cmp::Ordering, collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use trader_core::ParameterSet;

use super::checkpoint::JobRecord;
use crate::performance::PerformanceSummary;

/// 순위 기준
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    /// 총 수익률 (높을수록 좋음)
    #[default]
    TotalReturn,
    /// 샤프 비율
    Sharpe,
    /// 프로핏 팩터
    ProfitFactor,
    /// 수익률 순위 + 낙폭 순위 합 (낮을수록 좋음)
    Composite,
}

impl RankMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankMetric::TotalReturn => "total_return",
            RankMetric::Sharpe => "sharpe",
            RankMetric::ProfitFactor => "profit_factor",
            RankMetric::Composite => "composite",
        }
    }
}

impl fmt::Display for RankMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total_return" => Ok(RankMetric::TotalReturn),
            "sharpe" => Ok(RankMetric::Sharpe),
            "profit_factor" => Ok(RankMetric::ProfitFactor),
            "composite" => Ok(RankMetric::Composite),
            other => Err(format!(
                "알 수 없는 순위 기준: {other} (total_return, sharpe, profit_factor, composite)"
            )),
        }
    }
}

/// 순위가 매겨진 결과 한 줄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    /// 1부터 시작
    pub rank: usize,
    pub key: String,
    pub params: ParameterSet,
    pub summary: PerformanceSummary,
    /// 복합 점수 (composite 기준일 때만)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// 성공한 레코드를 기준에 따라 정렬합니다.
///
/// 실패 레코드와 거래 수가 `min_trades` 미만인 결과는 제외합니다.
/// 동점은 키 오름차순이므로 입력 순서와 무관하게 같은 결과를 냅니다.
pub fn rank_results<'a>(
    records: impl IntoIterator<Item = &'a JobRecord>,
    metric: RankMetric,
    min_trades: usize,
) -> Vec<RankedResult> {
    let mut entries: Vec<(&'a JobRecord, &'a PerformanceSummary)> = records
        .into_iter()
        .filter_map(|record| record.summary().map(|summary| (record, summary)))
        .filter(|(_, summary)| summary.num_trades >= min_trades)
        .collect();

    let scores: Option<HashMap<&str, usize>> = match metric {
        RankMetric::Composite => Some(composite_scores(&entries)),
        _ => None,
    };

    entries.sort_by(|(a_rec, a), (b_rec, b)| {
        let ordering = match (metric, &scores) {
            (RankMetric::Composite, Some(scores)) => {
                scores[a_rec.key.as_str()].cmp(&scores[b_rec.key.as_str()])
            }
            _ => metric_value(metric, b).total_cmp(&metric_value(metric, a)),
        };
        ordering.then_with(|| a_rec.key.cmp(&b_rec.key))
    });

    entries
        .into_iter()
        .enumerate()
        .map(|(i, (record, summary))| RankedResult {
            rank: i + 1,
            key: record.key.clone(),
            params: record.params.clone(),
            summary: summary.clone(),
            score: scores
                .as_ref()
                .map(|scores| scores[record.key.as_str()] as f64),
        })
        .collect()
}

fn metric_value(metric: RankMetric, summary: &PerformanceSummary) -> f64 {
    match metric {
        RankMetric::TotalReturn | RankMetric::Composite => summary.total_return_pct,
        RankMetric::Sharpe => summary.sharpe_ratio,
        RankMetric::ProfitFactor => summary.profit_factor,
    }
}

/// 수익률 내림차순 순위 + 낙폭 오름차순 순위 (각 1부터, 동점은 키 순).
fn composite_scores<'a>(entries: &[(&'a JobRecord, &'a PerformanceSummary)]) -> HashMap<&'a str, usize> {
    let by = |cmp: fn(&PerformanceSummary, &PerformanceSummary) -> Ordering| {
        let mut sorted: Vec<_> = entries.to_vec();
        sorted.sort_by(|(a_rec, a), (b_rec, b)| cmp(a, b).then_with(|| a_rec.key.cmp(&b_rec.key)));
        sorted
            .into_iter()
            .enumerate()
            .map(|(i, (record, _))| (record.key.as_str(), i + 1))
            .collect::<HashMap<_, _>>()
    };

    let return_rank = by(|a, b| b.total_return_pct.total_cmp(&a.total_return_pct));
    let drawdown_rank = by(|a, b| a.max_drawdown_pct.total_cmp(&b.max_drawdown_pct));

    return_rank
        .into_iter()
        .map(|(key, rank)| (key, rank + drawdown_rank.get(key).copied().unwrap_or(0)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fast: i64, ret: f64, dd: f64, trades: usize) -> JobRecord {
        JobRecord::completed(
            ParameterSet::for_strategy("ma_cross").with("fast_period", fast),
            PerformanceSummary {
                total_return_pct: ret,
                max_drawdown_pct: dd,
                sharpe_ratio: ret / 10.0,
                num_trades: trades,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_rank_by_total_return() {
        let records = [record(1, 5.0, 10.0, 3), record(2, 15.0, 30.0, 3), record(3, -2.0, 5.0, 3)];
        let ranked = rank_results(&records, RankMetric::TotalReturn, 0);
        let order: Vec<_> = ranked.iter().map(|r| r.summary.total_return_pct).collect();
        assert_eq!(order, vec![15.0, 5.0, -2.0]);
        assert_eq!(ranked[0].rank, 1);
        assert!(ranked[0].score.is_none());
    }

    #[test]
    fn test_failed_and_low_trade_records_excluded() {
        let failed = JobRecord::failed(ParameterSet::for_strategy("ma_cross"), "오류");
        let records = [record(1, 5.0, 10.0, 1), record(2, 3.0, 10.0, 5), failed];
        let ranked = rank_results(&records, RankMetric::TotalReturn, 2);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].summary.num_trades, 5);
    }

    #[test]
    fn test_ties_broken_by_key() {
        let records = [record(9, 5.0, 10.0, 3), record(1, 5.0, 10.0, 3)];
        let ranked = rank_results(records.iter().rev(), RankMetric::Sharpe, 0);
        assert!(ranked[0].key < ranked[1].key);
    }

    #[test]
    fn test_composite_prefers_balanced_result() {
        // 1: 수익 1위/낙폭 3위 = 4, 2: 수익 2위/낙폭 1위 = 3, 3: 수익 3위/낙폭 2위 = 5
        let records = [record(1, 30.0, 40.0, 3), record(2, 20.0, 5.0, 3), record(3, 10.0, 10.0, 3)];
        let ranked = rank_results(&records, RankMetric::Composite, 0);
        assert_eq!(ranked[0].params.get("fast_period"), Some(&2.into()));
        assert_eq!(ranked[0].score, Some(3.0));
        assert_eq!(ranked[2].score, Some(5.0));
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("composite".parse::<RankMetric>(), Ok(RankMetric::Composite));
        assert!("median".parse::<RankMetric>().is_err());
    }
}
