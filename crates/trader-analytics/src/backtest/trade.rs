//! 시뮬레이션 결과 레코드 (포지션, 거래, 자산 곡선).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trader_core::Side;

/// 청산 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    Signal,
}

/// 보유 중인 포지션 (슬롯 하나).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// 방향
    pub side: Side,
    /// 진입가 (진입 캔들 종가)
    pub entry_price: Decimal,
    /// 진입 시각
    pub entry_time: DateTime<Utc>,
    /// 진입 캔들 인덱스
    pub entry_index: usize,
    /// 수량
    pub size: Decimal,
    /// 명목 금액 (진입가 × 수량, 레버리지 적용 전)
    pub notional: Decimal,
    /// 레버리지 배수
    pub leverage: Decimal,
    /// 진입 수수료
    pub entry_fee: Decimal,
    /// 손절가
    pub stop_loss: Option<Decimal>,
    /// 익절가
    pub take_profit: Option<Decimal>,
    /// 트레일링 기준가 (롱: 최고가, 숏: 최저가)
    pub trailing_anchor: Decimal,
    /// 트레일링 거리 (기준가 대비 비율). `None`이면 트레일링 비활성.
    pub trailing_distance: Option<Decimal>,
    /// 마지막 종가 기준 미실현 손익
    pub unrealized_pnl: Decimal,
}

impl Position {
    /// 가격 기준 레버리지 반영 손익 (수수료 제외). `Decimal` 범위를 넘으면 `None`.
    pub fn gross_pnl_at(&self, price: Decimal) -> Option<Decimal> {
        price
            .checked_sub(self.entry_price)?
            .checked_mul(self.size)?
            .checked_mul(self.leverage)?
            .checked_mul(self.side.sign())
    }

    /// 현재 트레일링 스탑 가격. 계산 범위를 넘으면 트레일링 없음으로 취급.
    pub fn trailing_stop_price(&self) -> Option<Decimal> {
        let distance = self.trailing_distance?;
        match self.side {
            Side::Long => self.trailing_anchor.checked_mul(Decimal::ONE - distance),
            Side::Short => self.trailing_anchor.checked_mul(Decimal::ONE + distance),
        }
    }
}

/// 청산된 거래.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: Side,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    /// 수량
    pub size: Decimal,
    /// 진입 명목 금액
    pub notional: Decimal,
    /// 진입 + 청산 수수료
    pub fee_paid: Decimal,
    /// 수수료 차감 후 실현 손익
    pub pnl: Decimal,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl > Decimal::ZERO
    }
}

/// 자산 곡선의 한 점 (캔들당 하나).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    /// 실현 잔고 + 미실현 평가손익
    pub account_value: Decimal,
}

/// 시뮬레이션 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// 청산된 거래
    pub trades: Vec<Trade>,
    /// 자산 곡선
    pub equity: Vec<EquityPoint>,
    /// 마지막 캔들 이후에도 보유 중인 포지션 (강제 청산하지 않음)
    pub open_positions: Vec<Position>,
    /// 최종 실현 잔고
    pub final_balance: Decimal,
}
