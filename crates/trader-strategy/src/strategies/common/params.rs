//! ParameterSet 읽기 도우미.

use rust_decimal::Decimal;
use trader_core::{ParameterSet, ENGINE_PARAM_KEYS, STRATEGY_PARAM};

use crate::error::{StrategyError, StrategyResult};

/// 전략 하나가 인식하는 파라미터만 읽는 리더.
///
/// 생성 시 전략 이름, 엔진 덮어쓰기 키, `known` 목록 밖의 파라미터가 있으면
/// 오류를 반환합니다. 오타가 난 파라미터가 조용히 기본값으로 돌아가지 않게 합니다.
pub struct ParamReader<'a> {
    params: &'a ParameterSet,
}

impl<'a> ParamReader<'a> {
    pub fn new(params: &'a ParameterSet, known: &[&str]) -> StrategyResult<Self> {
        for (name, _) in params.iter() {
            if name != STRATEGY_PARAM
                && !ENGINE_PARAM_KEYS.contains(&name)
                && !known.contains(&name)
            {
                return Err(StrategyError::invalid(name, "알 수 없는 파라미터"));
            }
        }
        Ok(Self { params })
    }

    pub fn usize(&self, name: &str, default: usize) -> StrategyResult<usize> {
        Ok(self.params.usize(name)?.unwrap_or(default))
    }

    /// 1 이상이어야 하는 기간 파라미터.
    pub fn period(&self, name: &str, default: usize) -> StrategyResult<usize> {
        let value = self.usize(name, default)?;
        if value == 0 {
            return Err(StrategyError::invalid(name, "기간은 1 이상이어야 합니다"));
        }
        Ok(value)
    }

    pub fn decimal(&self, name: &str, default: Decimal) -> StrategyResult<Decimal> {
        Ok(self.params.decimal(name)?.unwrap_or(default))
    }

    pub fn bool(&self, name: &str, default: bool) -> StrategyResult<bool> {
        Ok(self.params.bool(name)?.unwrap_or(default))
    }

    pub fn text(&self, name: &str, default: &str) -> StrategyResult<String> {
        Ok(self
            .params
            .text(name)?
            .unwrap_or_else(|| default.to_string()))
    }
}
