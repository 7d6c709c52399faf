//! 신호 결합 규칙과 추세 필터.

use rust_decimal::Decimal;
use trader_core::Signal;

/// 롱/숏 진입 조건과 청산 조건을 하나의 신호로 결합합니다.
///
/// 롱과 숏 조건이 동시에 성립하면 방향이 모호하므로 `Hold`입니다.
/// 진입 조건이 청산 조건보다 우선합니다.
pub fn resolve_signal(long: bool, short: bool, exit: bool) -> Signal {
    match (long, short) {
        (true, true) => Signal::Hold,
        (true, false) => Signal::LongEntry,
        (false, true) => Signal::ShortEntry,
        (false, false) if exit => Signal::Exit,
        (false, false) => Signal::Hold,
    }
}

/// `a`가 직전 캔들에서 `b` 이하였다가 현재 캔들에서 `b`를 상향 돌파했는지.
pub fn crossed_above(prev_a: Decimal, prev_b: Decimal, a: Decimal, b: Decimal) -> bool {
    prev_a <= prev_b && a > b
}

/// `a`가 직전 캔들에서 `b` 이상이었다가 현재 캔들에서 `b`를 하향 돌파했는지.
pub fn crossed_below(prev_a: Decimal, prev_b: Decimal, a: Decimal, b: Decimal) -> bool {
    prev_a >= prev_b && a < b
}

/// 추세 필터.
///
/// 종가가 추세 이동평균 위/아래에 있고 ADX가 임계값 이상일 때만
/// 해당 방향 진입을 허용합니다.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendFilter {
    /// 최소 ADX
    pub adx_threshold: Decimal,
}

impl TrendFilter {
    /// 롱 진입 허용 여부
    pub fn allows_long(&self, close: Decimal, trend_ma: Decimal, adx: Decimal) -> bool {
        close > trend_ma && adx >= self.adx_threshold
    }

    /// 숏 진입 허용 여부
    pub fn allows_short(&self, close: Decimal, trend_ma: Decimal, adx: Decimal) -> bool {
        close < trend_ma && adx >= self.adx_threshold
    }
}
