//! 파라미터 값과 파라미터 조합.
//!
//! [`ParameterSet`]은 이름 순으로 정렬된 불변 매핑이며, 중복 제거와
//! 체크포인트에 쓰이는 안정적인 문자열 키를 제공합니다.

use std::{collections::BTreeMap, fmt};

use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// 전략 이름을 담는 예약 파라미터 키
pub const STRATEGY_PARAM: &str = "strategy";

/// 전략이 아닌 백테스트 엔진 설정을 덮어쓰는 파라미터 키.
pub const ENGINE_PARAM_KEYS: &[&str] = &[
    "fee_rate",
    "leverage",
    "stop_loss_pct",
    "take_profit_pct",
    "trailing_stop_pct",
    "trailing_stop_min",
    "trailing_stop_max",
    "trailing_atr_multiplier",
    "capital",
    "max_slots",
];

/// 단일 파라미터 값.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Text(String),
}

impl ParamValue {
    /// 수치 값 (정수/소수)
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            ParamValue::Int(v) => Some(Decimal::from(*v)),
            ParamValue::Decimal(v) => Some(*v),
            _ => None,
        }
    }

    /// 0 이상의 정수 값. 소수부가 없는 Decimal도 허용합니다.
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ParamValue::Int(v) => usize::try_from(*v).ok(),
            ParamValue::Decimal(v) if v.fract().is_zero() && !v.is_sign_negative() => v.to_usize(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            // 0.010과 0.01이 같은 키를 갖도록 정규화
            ParamValue::Decimal(v) => write!(f, "{}", v.normalize()),
            ParamValue::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<Decimal> for ParamValue {
    fn from(v: Decimal) -> Self {
        ParamValue::Decimal(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

/// 파라미터 이름 → 값 매핑.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 전략 이름이 지정된 빈 조합.
    pub fn for_strategy(strategy: impl Into<String>) -> Self {
        Self::new().with(STRATEGY_PARAM, ParamValue::Text(strategy.into()))
    }

    /// 값을 추가한 새 조합을 반환합니다.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// 안정적인 조합 키.
    ///
    /// 이름 순으로 `name=value`를 `|`로 연결합니다. 같은 값의 조합은
    /// 입력 순서와 무관하게 항상 같은 키를 갖습니다.
    pub fn key(&self) -> String {
        self.values
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("|")
    }

    /// 전략 이름
    pub fn strategy(&self) -> Option<&str> {
        self.values.get(STRATEGY_PARAM).and_then(ParamValue::as_text)
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 수치 파라미터 조회. 없으면 `Ok(None)`, 타입이 다르면 오류.
    pub fn decimal(&self, name: &str) -> CoreResult<Option<Decimal>> {
        self.typed(name, "수치", ParamValue::as_decimal)
    }

    /// 0 이상 정수 파라미터 조회.
    pub fn usize(&self, name: &str) -> CoreResult<Option<usize>> {
        self.typed(name, "0 이상의 정수", ParamValue::as_usize)
    }

    pub fn bool(&self, name: &str) -> CoreResult<Option<bool>> {
        self.typed(name, "불리언", ParamValue::as_bool)
    }

    pub fn text(&self, name: &str) -> CoreResult<Option<String>> {
        self.typed(name, "문자열", |v| v.as_text().map(str::to_string))
    }

    fn typed<T>(
        &self,
        name: &str,
        expected: &str,
        convert: impl Fn(&ParamValue) -> Option<T>,
    ) -> CoreResult<Option<T>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(value) => convert(value).map(Some).ok_or_else(|| CoreError::InvalidParameter {
                name: name.to_string(),
                reason: format!("{expected} 값이 필요합니다 (입력: {value})"),
            }),
        }
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromIterator<(String, ParamValue)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_key_is_order_independent() {
        let a = ParameterSet::for_strategy("ma_cross")
            .with("fast", 10)
            .with("slow", 30);
        let b = ParameterSet::new()
            .with("slow", 30)
            .with("fast", 10)
            .with(STRATEGY_PARAM, "ma_cross");

        assert_eq!(a.key(), b.key());
        assert_eq!(a.key(), "fast=10|slow=30|strategy=ma_cross");
    }

    #[test]
    fn test_key_normalizes_decimals() {
        let a = ParameterSet::new().with("stop_loss_pct", dec!(0.010));
        let b = ParameterSet::new().with("stop_loss_pct", dec!(0.01));
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key(), "stop_loss_pct=0.01");
    }

    #[test]
    fn test_typed_getters() {
        let params = ParameterSet::new()
            .with("period", 14)
            .with("threshold", dec!(30.5))
            .with("use_ema", true)
            .with("whole", dec!(20));

        assert_eq!(params.usize("period").unwrap(), Some(14));
        assert_eq!(params.usize("whole").unwrap(), Some(20));
        assert_eq!(params.decimal("period").unwrap(), Some(dec!(14)));
        assert_eq!(params.bool("use_ema").unwrap(), Some(true));
        assert_eq!(params.usize("missing").unwrap(), None);

        assert!(params.usize("threshold").is_err());
        assert!(params.bool("period").is_err());
    }

    #[test]
    fn test_negative_int_is_not_usize() {
        let params = ParameterSet::new().with("period", -3);
        assert!(matches!(
            params.usize("period"),
            Err(CoreError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_json_roundtrip_keeps_key() {
        let params = ParameterSet::for_strategy("rsi_reversion")
            .with("period", 14)
            .with("oversold", dec!(30))
            .with("stop_loss_pct", dec!(0.02))
            .with("use_stochastic", false);

        let json = serde_json::to_string(&params).unwrap();
        let restored: ParameterSet = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.key(), params.key());
    }
}
