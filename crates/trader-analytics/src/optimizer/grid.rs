//! 파라미터 그리드 정의와 전개.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use trader_core::{ParamValue, ParameterSet, STRATEGY_PARAM};
use trader_strategy::StrategyVariant;

use super::{OptimizerError, OptimizerResult};

/// 전략 하나의 파라미터 후보값 정의.
///
/// ```toml
/// [[grid]]
/// strategy = "ma_cross"
///
/// [grid.params]
/// fast_period = [5, 10]
/// slow_period = [20, 30, 50]
/// stop_loss_pct = [0.01, 0.02]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// 전략 이름
    pub strategy: String,
    /// 파라미터 이름 → 후보값 목록
    #[serde(default)]
    pub params: BTreeMap<String, Vec<ParamValue>>,
}

/// 전략별 그리드 목록
pub type StrategyGrid = Vec<GridSpec>;

impl GridSpec {
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            params: BTreeMap::new(),
        }
    }

    /// 파라미터 후보값을 추가합니다.
    pub fn with_values<V>(mut self, name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self
    where
        V: Into<ParamValue>,
    {
        self.params
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// 조합 수 (중복 제거 전)
    pub fn combinations(&self) -> usize {
        self.params.values().map(Vec::len).product()
    }

    fn validate(&self) -> OptimizerResult<()> {
        if !StrategyVariant::NAMES.contains(&self.strategy.as_str()) {
            return Err(OptimizerError::InvalidGrid(format!(
                "알 수 없는 전략: {} (사용 가능: {})",
                self.strategy,
                StrategyVariant::NAMES.join(", ")
            )));
        }
        if self.params.contains_key(STRATEGY_PARAM) {
            return Err(OptimizerError::InvalidGrid(format!(
                "[{}] '{STRATEGY_PARAM}'는 파라미터 이름으로 쓸 수 없습니다",
                self.strategy
            )));
        }
        if let Some((name, _)) = self.params.iter().find(|(_, values)| values.is_empty()) {
            return Err(OptimizerError::InvalidGrid(format!(
                "[{}] 파라미터 '{name}'의 후보값이 비어있습니다",
                self.strategy
            )));
        }
        Ok(())
    }

    /// 카테시안 곱으로 전개합니다. 각 조합에는 `strategy=<이름>`이 포함됩니다.
    pub fn expand(&self) -> Vec<ParameterSet> {
        let axes: Vec<(&String, &Vec<ParamValue>)> = self.params.iter().collect();
        generate_combinations(&axes)
            .into_iter()
            .map(|combo| {
                combo.into_iter().fold(
                    ParameterSet::for_strategy(self.strategy.as_str()),
                    |set, (name, value)| set.with(name, value),
                )
            })
            .collect()
    }
}

fn generate_combinations(axes: &[(&String, &Vec<ParamValue>)]) -> Vec<Vec<(String, ParamValue)>> {
    let Some(((name, values), rest)) = axes.split_first() else {
        return vec![vec![]];
    };

    let sub = generate_combinations(rest);
    let mut result = Vec::with_capacity(values.len() * sub.len());
    for value in values.iter() {
        for combo in &sub {
            let mut new_combo = Vec::with_capacity(combo.len() + 1);
            new_combo.push(((*name).clone(), value.clone()));
            new_combo.extend(combo.iter().cloned());
            result.push(new_combo);
        }
    }
    result
}

/// 전체 그리드를 전개하고 키로 중복을 제거합니다.
///
/// 순서는 결정적입니다: 그리드 순서, 그 안에서는 파라미터 이름 순 카테시안 곱.
pub fn expand_grid(grid: &[GridSpec]) -> OptimizerResult<Vec<ParameterSet>> {
    if grid.is_empty() {
        return Err(OptimizerError::InvalidGrid(
            "그리드에 전략이 없습니다".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut sets = Vec::new();
    for spec in grid {
        spec.validate()?;
        for set in spec.expand() {
            if seen.insert(set.key()) {
                sets.push(set);
            }
        }
    }
    Ok(sets)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_cartesian_product() {
        let spec = GridSpec::new("ma_cross")
            .with_values("fast_period", [5, 10])
            .with_values("slow_period", [20, 30, 50])
            .with_values("stop_loss_pct", [dec!(0.01), dec!(0.02)]);
        assert_eq!(spec.combinations(), 12);

        let sets = expand_grid(&[spec]).unwrap();
        assert_eq!(sets.len(), 12);
        assert!(sets.iter().all(|s| s.strategy() == Some("ma_cross")));
        assert_eq!(
            sets[0].key(),
            "fast_period=5|slow_period=20|stop_loss_pct=0.01|strategy=ma_cross"
        );
    }

    #[test]
    fn test_duplicates_removed_by_key() {
        let spec = GridSpec::new("rsi_reversion")
            .with_values("oversold", [dec!(30), dec!(30.0), dec!(25)]);
        let sets = expand_grid(&[spec.clone(), spec]).unwrap();
        assert_eq!(sets.len(), 2);
    }

    #[test]
    fn test_strategy_without_params_yields_one_set() {
        let sets = expand_grid(&[GridSpec::new("macd_cross")]).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].key(), "strategy=macd_cross");
    }

    #[test]
    fn test_invalid_grid() {
        assert!(expand_grid(&[]).is_err());
        assert!(expand_grid(&[GridSpec::new("unknown")]).is_err());
        let empty = GridSpec::new("ma_cross").with_values("fast_period", Vec::<i64>::new());
        assert!(matches!(
            expand_grid(&[empty]),
            Err(OptimizerError::InvalidGrid(_))
        ));
    }

    #[test]
    fn test_grid_from_toml() {
        let spec: GridSpec = toml::from_str(
            r#"
            strategy = "ma_cross"
            [params]
            fast_period = [5, 10]
            ma_type = ["sma", "ema"]
            "#,
        )
        .unwrap();
        assert_eq!(spec.combinations(), 4);
        assert_eq!(spec.params["fast_period"][0], ParamValue::Int(5));
        assert_eq!(spec.params["ma_type"][1], ParamValue::Text("ema".into()));
    }
}
