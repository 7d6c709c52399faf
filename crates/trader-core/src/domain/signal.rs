//! 전략 신호와 포지션 방향.
//!
//! - `Signal` - 캔들 하나에 붙는 이산 신호
//! - `Side` - 롱/숏 방향
//! - `TradeMode` - 허용되는 진입 방향

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 캔들 인덱스 하나에 대응하는 전략 신호.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// 아무 것도 하지 않음
    #[default]
    Hold,
    /// 롱 진입
    LongEntry,
    /// 숏 진입
    ShortEntry,
    /// 보유 포지션 청산
    Exit,
}

impl Signal {
    /// 진입 신호라면 진입 방향을 반환합니다.
    pub fn entry_side(self) -> Option<Side> {
        match self {
            Signal::LongEntry => Some(Side::Long),
            Signal::ShortEntry => Some(Side::Short),
            Signal::Exit | Signal::Hold => None,
        }
    }

    /// 방향에 대응하는 진입 신호.
    pub fn entry(side: Side) -> Self {
        match side {
            Side::Long => Signal::LongEntry,
            Side::Short => Signal::ShortEntry,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Hold => write!(f, "HOLD"),
            Signal::LongEntry => write!(f, "LONG_ENTRY"),
            Signal::ShortEntry => write!(f, "SHORT_ENTRY"),
            Signal::Exit => write!(f, "EXIT"),
        }
    }
}

/// 포지션 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// 손익 부호 (롱 +1, 숏 -1)
    pub fn sign(self) -> Decimal {
        match self {
            Side::Long => Decimal::ONE,
            Side::Short => Decimal::NEGATIVE_ONE,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// 허용 진입 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeMode {
    #[default]
    LongOnly,
    ShortOnly,
    LongAndShort,
}

impl TradeMode {
    /// 해당 방향의 진입을 허용하는지 여부.
    pub fn allows(self, side: Side) -> bool {
        matches!(
            (self, side),
            (TradeMode::LongOnly, Side::Long)
                | (TradeMode::ShortOnly, Side::Short)
                | (TradeMode::LongAndShort, _)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_mode_allows() {
        assert!(TradeMode::LongOnly.allows(Side::Long));
        assert!(!TradeMode::LongOnly.allows(Side::Short));
        assert!(TradeMode::ShortOnly.allows(Side::Short));
        assert!(!TradeMode::ShortOnly.allows(Side::Long));
        assert!(TradeMode::LongAndShort.allows(Side::Long));
        assert!(TradeMode::LongAndShort.allows(Side::Short));
    }

    #[test]
    fn test_signal_serde_snake_case() {
        let json = serde_json::to_string(&Signal::LongEntry).unwrap();
        assert_eq!(json, "\"long_entry\"");
        let mode: TradeMode = serde_json::from_str("\"long_and_short\"").unwrap();
        assert_eq!(mode, TradeMode::LongAndShort);
    }

    #[test]
    fn test_entry_side_roundtrip() {
        for side in [Side::Long, Side::Short] {
            assert_eq!(Signal::entry(side).entry_side(), Some(side));
        }
        assert_eq!(Signal::Exit.entry_side(), None);
        assert_eq!(Signal::Hold.entry_side(), None);
    }
}
