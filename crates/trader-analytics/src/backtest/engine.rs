//! 백테스팅 엔진
//!
//! 캔들 시계열과 신호 시계열, 비용/레버리지 설정으로 거래를 시뮬레이션합니다.
//!
//! # 캔들별 처리 순서
//!
//! 1. 보유 포지션의 청산 조건 확인: 손절 → 익절 → 트레일링 스탑 → 신호 청산
//!    (롱 스탑은 저가, 숏 스탑은 고가로 판정. 갭으로 레벨을 지나치면 시가 체결)
//! 2. 남은 포지션의 트레일링 기준가 갱신 (유리한 방향으로만 이동)
//! 3. 이번 캔들에 청산이 없었다면 진입 신호로 포지션 진입 (종가 체결)
//! 4. 실현 잔고 + 미실현 평가손익으로 자산 곡선 한 점 기록
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! use trader_analytics::backtest::{simulate, BacktestConfig};
//! use rust_decimal_macros::dec;
//!
//! let config = BacktestConfig::new(dec!(10_000))
//!     .with_fee_rate(dec!(0.001))   // 0.1% 수수료
//!     .with_stop_loss(dec!(0.02));  // 2% 손절
//!
//! let result = simulate(&candles, &signals, &config)?;
//! println!("거래 수: {}", result.trades.len());
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use trader_core::{ensure_monotonic, Candle, CoreError, ParameterSet, Side, Signal, TradeMode};
use trader_strategy::{indicators::atr, Strategy, StrategyVariant};

use super::trade::{EquityPoint, ExitReason, Position, SimulationResult, Trade};
use crate::performance::{evaluate, PerformanceSummary};

/// 백테스트 오류
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BacktestError {
    /// 설정 오류
    #[error("백테스트 설정 오류: {0}")]
    ConfigError(String),

    /// 데이터 오류
    #[error("데이터 오류: {0}")]
    DataError(String),

    /// 전략 오류
    #[error("전략 실행 오류: {0}")]
    StrategyError(#[from] trader_strategy::StrategyError),

    /// 금액 계산이 `Decimal` 범위를 넘음 (과도한 레버리지 등)
    #[error("계산 범위 초과: {0}")]
    Overflow(&'static str),
}

/// 백테스트 결과 타입
pub type BacktestResult<T> = Result<T, BacktestError>;

/// 트레일링 스탑 거리 계산 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingStopMode {
    /// `trailing_stop_pct` 고정 비율
    #[default]
    Fixed,
    /// `ATR / 종가 × 배수`, `[trailing_stop_min, trailing_stop_max]`로 제한
    Atr,
}

/// 백테스트 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// 초기 잔고
    #[serde(default = "default_initial_balance")]
    pub initial_balance: Decimal,

    /// 거래 수수료율 (예: 0.001 = 0.1%). 진입/청산 양쪽에 명목 금액 기준으로 부과.
    #[serde(default = "default_fee_rate")]
    pub fee_rate: Decimal,

    /// 레버리지 배수 (1 이상)
    #[serde(default = "default_leverage")]
    pub leverage: Decimal,

    /// 허용 진입 방향
    #[serde(default)]
    pub trade_mode: TradeMode,

    /// 손절 비율 (예: 0.02 = 진입가 대비 2%)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss_pct: Option<Decimal>,

    /// 익절 비율
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit_pct: Option<Decimal>,

    /// 트레일링 스탑 비율 (고정 모드 거리, ATR 모드에서는 ATR 미정의 구간의 대체값)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing_stop_pct: Option<Decimal>,

    /// 트레일링 스탑 방식
    #[serde(default)]
    pub trailing_stop_mode: TrailingStopMode,

    /// ATR 트레일링 배수
    #[serde(default = "default_trailing_atr_multiplier")]
    pub trailing_atr_multiplier: Decimal,

    /// ATR 기간
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,

    /// ATR 트레일링 최소 거리 (비율)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing_stop_min: Option<Decimal>,

    /// ATR 트레일링 최대 거리 (비율)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing_stop_max: Option<Decimal>,

    /// 증거금으로 쓰는 실현 잔고 비율 (0 < capital ≤ 1). 슬롯 수로 나눠 배분.
    #[serde(default = "default_capital")]
    pub capital: Decimal,

    /// 동시 보유 가능한 같은 방향 포지션 수
    #[serde(default = "default_max_slots")]
    pub max_slots: usize,

    /// 반대 방향 진입 신호를 보유 포지션 청산 신호로 취급
    #[serde(default = "default_exit_on_opposite_signal")]
    pub exit_on_opposite_signal: bool,

    /// 연율화 기간 수 (샤프 비율 계산용, 일봉 코인 = 365)
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: f64,
}

// 설정 기본값 함수들 (serde default용)
fn default_initial_balance() -> Decimal {
    Decimal::new(10_000_000, 0)
}
fn default_fee_rate() -> Decimal {
    Decimal::new(1, 3)
} // 0.1%
fn default_leverage() -> Decimal {
    Decimal::ONE
}
fn default_trailing_atr_multiplier() -> Decimal {
    Decimal::TWO
}
fn default_atr_period() -> usize {
    14
}
fn default_capital() -> Decimal {
    Decimal::ONE
}
fn default_max_slots() -> usize {
    1
}
fn default_exit_on_opposite_signal() -> bool {
    true
}
fn default_periods_per_year() -> f64 {
    365.0
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_balance: default_initial_balance(),
            fee_rate: default_fee_rate(),
            leverage: default_leverage(),
            trade_mode: TradeMode::default(),
            stop_loss_pct: None,
            take_profit_pct: None,
            trailing_stop_pct: None,
            trailing_stop_mode: TrailingStopMode::default(),
            trailing_atr_multiplier: default_trailing_atr_multiplier(),
            atr_period: default_atr_period(),
            trailing_stop_min: None,
            trailing_stop_max: None,
            capital: default_capital(),
            max_slots: default_max_slots(),
            exit_on_opposite_signal: default_exit_on_opposite_signal(),
            periods_per_year: default_periods_per_year(),
        }
    }
}

impl BacktestConfig {
    /// 새로운 백테스트 설정을 생성합니다.
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            initial_balance,
            ..Default::default()
        }
    }

    /// 수수료율 설정
    pub fn with_fee_rate(mut self, rate: Decimal) -> Self {
        self.fee_rate = rate;
        self
    }

    /// 레버리지 설정
    pub fn with_leverage(mut self, leverage: Decimal) -> Self {
        self.leverage = leverage;
        self
    }

    /// 진입 방향 설정
    pub fn with_trade_mode(mut self, mode: TradeMode) -> Self {
        self.trade_mode = mode;
        self
    }

    /// 손절 설정
    pub fn with_stop_loss(mut self, pct: Decimal) -> Self {
        self.stop_loss_pct = Some(pct);
        self
    }

    /// 익절 설정
    pub fn with_take_profit(mut self, pct: Decimal) -> Self {
        self.take_profit_pct = Some(pct);
        self
    }

    /// 고정 비율 트레일링 스탑 설정
    pub fn with_trailing_stop(mut self, pct: Decimal) -> Self {
        self.trailing_stop_mode = TrailingStopMode::Fixed;
        self.trailing_stop_pct = Some(pct);
        self
    }

    /// ATR 트레일링 스탑 설정
    pub fn with_atr_trailing_stop(
        mut self,
        multiplier: Decimal,
        min: Option<Decimal>,
        max: Option<Decimal>,
    ) -> Self {
        self.trailing_stop_mode = TrailingStopMode::Atr;
        self.trailing_atr_multiplier = multiplier;
        self.trailing_stop_min = min;
        self.trailing_stop_max = max;
        self
    }

    /// ATR 기간 설정
    pub fn with_atr_period(mut self, period: usize) -> Self {
        self.atr_period = period;
        self
    }

    /// 증거금 비율 설정
    pub fn with_capital(mut self, capital: Decimal) -> Self {
        self.capital = capital;
        self
    }

    /// 슬롯 수 설정
    pub fn with_max_slots(mut self, slots: usize) -> Self {
        self.max_slots = slots;
        self
    }

    /// 반대 신호 청산 여부 설정
    pub fn with_exit_on_opposite_signal(mut self, enabled: bool) -> Self {
        self.exit_on_opposite_signal = enabled;
        self
    }

    /// 연율화 기간 수 설정
    pub fn with_periods_per_year(mut self, periods: f64) -> Self {
        self.periods_per_year = periods;
        self
    }

    /// 트레일링 스탑 사용 여부
    pub fn trailing_enabled(&self) -> bool {
        match self.trailing_stop_mode {
            TrailingStopMode::Fixed => self.trailing_stop_pct.is_some(),
            TrailingStopMode::Atr => true,
        }
    }

    /// ParameterSet의 엔진 파라미터로 덮어쓴 설정을 반환합니다.
    ///
    /// 비율 파라미터(`stop_loss_pct` 등)가 0이면 해당 기능을 끕니다.
    /// 전략 파라미터는 무시합니다. 결과는 검증하지 않으므로 `validate()`를 호출해야 합니다.
    pub fn with_overrides(&self, params: &ParameterSet) -> BacktestResult<Self> {
        let invalid = |e: CoreError| BacktestError::ConfigError(e.to_string());
        let optional = |v: Decimal| if v.is_zero() { None } else { Some(v) };

        let mut config = self.clone();
        if let Some(v) = params.decimal("fee_rate").map_err(invalid)? {
            config.fee_rate = v;
        }
        if let Some(v) = params.decimal("leverage").map_err(invalid)? {
            config.leverage = v;
        }
        if let Some(v) = params.decimal("stop_loss_pct").map_err(invalid)? {
            config.stop_loss_pct = optional(v);
        }
        if let Some(v) = params.decimal("take_profit_pct").map_err(invalid)? {
            config.take_profit_pct = optional(v);
        }
        if let Some(v) = params.decimal("trailing_stop_pct").map_err(invalid)? {
            config.trailing_stop_pct = optional(v);
        }
        if let Some(v) = params.decimal("trailing_stop_min").map_err(invalid)? {
            config.trailing_stop_min = optional(v);
        }
        if let Some(v) = params.decimal("trailing_stop_max").map_err(invalid)? {
            config.trailing_stop_max = optional(v);
        }
        if let Some(v) = params.decimal("trailing_atr_multiplier").map_err(invalid)? {
            config.trailing_atr_multiplier = v;
        }
        if let Some(v) = params.decimal("capital").map_err(invalid)? {
            config.capital = v;
        }
        if let Some(v) = params.usize("max_slots").map_err(invalid)? {
            config.max_slots = v;
        }
        Ok(config)
    }

    /// 설정 검증
    pub fn validate(&self) -> BacktestResult<()> {
        let fail = |msg: &str| Err(BacktestError::ConfigError(msg.to_string()));

        if self.initial_balance <= Decimal::ZERO {
            return fail("초기 잔고는 0보다 커야 합니다");
        }
        if self.fee_rate < Decimal::ZERO || self.fee_rate >= Decimal::ONE {
            return fail("수수료율은 0 이상 1 미만이어야 합니다");
        }
        if self.leverage < Decimal::ONE {
            return fail("레버리지는 1 이상이어야 합니다");
        }
        if self.capital <= Decimal::ZERO || self.capital > Decimal::ONE {
            return fail("증거금 비율(capital)은 0 초과 1 이하여야 합니다");
        }
        if self.max_slots == 0 {
            return fail("슬롯 수는 1 이상이어야 합니다");
        }
        for (name, value) in [
            ("stop_loss_pct", self.stop_loss_pct),
            ("take_profit_pct", self.take_profit_pct),
            ("trailing_stop_pct", self.trailing_stop_pct),
            ("trailing_stop_min", self.trailing_stop_min),
            ("trailing_stop_max", self.trailing_stop_max),
        ] {
            if let Some(v) = value {
                if v <= Decimal::ZERO || v >= Decimal::ONE {
                    return Err(BacktestError::ConfigError(format!(
                        "{name}는 0 초과 1 미만이어야 합니다 (입력: {v})"
                    )));
                }
            }
        }
        if let (Some(min), Some(max)) = (self.trailing_stop_min, self.trailing_stop_max) {
            if min > max {
                return fail("trailing_stop_min은 trailing_stop_max 이하여야 합니다");
            }
        }
        if self.trailing_stop_mode == TrailingStopMode::Atr {
            if self.trailing_atr_multiplier <= Decimal::ZERO {
                return fail("ATR 트레일링 배수는 0보다 커야 합니다");
            }
            if self.atr_period == 0 {
                return fail("ATR 기간은 1 이상이어야 합니다");
            }
        }
        if !(self.periods_per_year.is_finite() && self.periods_per_year > 0.0) {
            return fail("연율화 기간 수는 양수여야 합니다");
        }
        Ok(())
    }
}

// ================================================================================================
// 엔진
// ================================================================================================

/// 백테스팅 엔진
///
/// 캔들 하나씩 [`step`](Self::step)으로 진행하며 잔고, 포지션, 거래, 자산 곡선을 관리합니다.
/// 같은 입력에 대해 항상 같은 결과를 냅니다.
pub struct BacktestEngine<'a> {
    config: &'a BacktestConfig,
    candles: &'a [Candle],
    signals: &'a [Signal],
    /// ATR 트레일링 모드에서만 계산
    atr: Option<Vec<Option<Decimal>>>,
    balance: Decimal,
    positions: Vec<Position>,
    trades: Vec<Trade>,
    equity: Vec<EquityPoint>,
    cursor: usize,
}

impl<'a> BacktestEngine<'a> {
    /// 입력을 검증하고 엔진을 생성합니다.
    ///
    /// 설정 오류, 길이 불일치, 시간순이 아닌 캔들은 시뮬레이션 전에 오류로 반환됩니다.
    pub fn new(
        candles: &'a [Candle],
        signals: &'a [Signal],
        config: &'a BacktestConfig,
    ) -> BacktestResult<Self> {
        config.validate()?;

        if signals.len() != candles.len() {
            return Err(BacktestError::DataError(format!(
                "신호 길이({})가 캔들 길이({})와 다릅니다",
                signals.len(),
                candles.len()
            )));
        }
        ensure_monotonic(candles).map_err(|e| BacktestError::DataError(e.to_string()))?;

        let atr = match config.trailing_stop_mode {
            TrailingStopMode::Atr => Some(
                atr(candles, config.atr_period)
                    .map_err(|e| BacktestError::ConfigError(e.to_string()))?,
            ),
            TrailingStopMode::Fixed => None,
        };

        Ok(Self {
            config,
            candles,
            signals,
            atr,
            balance: config.initial_balance,
            positions: Vec::with_capacity(config.max_slots),
            trades: Vec::new(),
            equity: Vec::with_capacity(candles.len()),
            cursor: 0,
        })
    }

    /// 현재 실현 잔고
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// 보유 포지션
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// 청산된 거래
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// 지금까지의 자산 곡선
    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity
    }

    /// 다음에 처리할 캔들 인덱스
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// 캔들 하나를 처리합니다. 더 처리할 캔들이 없으면 `false`.
    ///
    /// 금액 계산이 `Decimal` 범위를 넘으면 [`BacktestError::Overflow`]를 반환합니다.
    pub fn step(&mut self) -> BacktestResult<bool> {
        let candles = self.candles;
        let Some(candle) = candles.get(self.cursor) else {
            return Ok(false);
        };
        let index = self.cursor;
        let signal = self.signals[index];

        let closed = self.process_exits(candle, signal)?;
        self.ratchet_trailing(index, candle);
        if !closed {
            self.try_open(index, candle, signal)?;
        }
        self.mark_to_market(candle)?;

        self.cursor += 1;
        Ok(true)
    }

    /// 남은 캔들을 모두 처리하고 결과를 반환합니다.
    pub fn run(mut self) -> BacktestResult<SimulationResult> {
        while self.step()? {}
        Ok(self.finish())
    }

    /// 현재까지의 결과. 보유 포지션은 청산하지 않고 그대로 보고합니다.
    pub fn finish(self) -> SimulationResult {
        SimulationResult {
            trades: self.trades,
            equity: self.equity,
            open_positions: self.positions,
            final_balance: self.balance,
        }
    }

    /// 손절/익절/트레일링/신호 청산. 하나라도 청산되면 `true`.
    fn process_exits(&mut self, candle: &Candle, signal: Signal) -> BacktestResult<bool> {
        let mut closed_any = false;

        let mut remaining = Vec::with_capacity(self.positions.len());
        for position in std::mem::take(&mut self.positions) {
            match stop_trigger(&position, candle) {
                Some((reason, price)) => {
                    self.close_position(position, price, reason, candle.timestamp)?;
                    closed_any = true;
                }
                None => remaining.push(position),
            }
        }
        self.positions = remaining;

        let signal_exit = match signal {
            Signal::Exit => true,
            Signal::LongEntry | Signal::ShortEntry => {
                self.config.exit_on_opposite_signal
                    && signal
                        .entry_side()
                        .is_some_and(|side| self.positions.iter().any(|p| p.side != side))
            }
            Signal::Hold => false,
        };
        if signal_exit && !self.positions.is_empty() {
            for position in std::mem::take(&mut self.positions) {
                self.close_position(position, candle.close, ExitReason::Signal, candle.timestamp)?;
            }
            closed_any = true;
        }

        Ok(closed_any)
    }

    fn close_position(
        &mut self,
        position: Position,
        price: Decimal,
        reason: ExitReason,
        time: DateTime<Utc>,
    ) -> BacktestResult<()> {
        let exit_fee = price
            .checked_mul(position.size)
            .and_then(|notional| notional.checked_mul(self.config.fee_rate))
            .ok_or(BacktestError::Overflow("청산 수수료"))?;
        let gross = position
            .gross_pnl_at(price)
            .ok_or(BacktestError::Overflow("실현 손익"))?;
        let pnl = gross
            .checked_sub(position.entry_fee)
            .and_then(|v| v.checked_sub(exit_fee))
            .ok_or(BacktestError::Overflow("실현 손익"))?;
        let fee_paid = position
            .entry_fee
            .checked_add(exit_fee)
            .ok_or(BacktestError::Overflow("수수료 합계"))?;

        // 레버리지 손실이 잔고를 넘으면 0에서 멈춤 (계좌 파산)
        self.balance = self
            .balance
            .checked_add(gross)
            .and_then(|v| v.checked_sub(exit_fee))
            .ok_or(BacktestError::Overflow("잔고"))?
            .max(Decimal::ZERO);

        debug!(
            side = %position.side,
            entry = %position.entry_price,
            exit = %price,
            reason = ?reason,
            pnl = %pnl,
            "포지션 청산"
        );

        self.trades.push(Trade {
            side: position.side,
            entry_price: position.entry_price,
            exit_price: price,
            entry_time: position.entry_time,
            exit_time: time,
            size: position.size,
            notional: position.notional,
            fee_paid,
            pnl,
            exit_reason: reason,
        });
        Ok(())
    }

    /// 트레일링 기준가와 ATR 거리를 이번 캔들 기준으로 갱신합니다.
    ///
    /// 이번 캔들의 청산 판정이 끝난 뒤에 호출되므로 갱신된 값은 다음 캔들부터 적용됩니다.
    fn ratchet_trailing(&mut self, index: usize, candle: &Candle) {
        if !self.config.trailing_enabled() || self.positions.is_empty() {
            return;
        }
        let atr_distance = self.atr_distance(index, candle.close);
        for position in &mut self.positions {
            position.trailing_anchor = match position.side {
                Side::Long => position.trailing_anchor.max(candle.high),
                Side::Short => position.trailing_anchor.min(candle.low),
            };
            if atr_distance.is_some() {
                position.trailing_distance = atr_distance;
            }
        }
    }

    /// ATR 모드 거리: `ATR / 종가 × 배수`, 최소/최대로 제한.
    fn atr_distance(&self, index: usize, close: Decimal) -> Option<Decimal> {
        let value = self.atr.as_ref()?.get(index).copied().flatten()?;
        if close <= Decimal::ZERO {
            return None;
        }
        let mut distance = value
            .checked_div(close)?
            .checked_mul(self.config.trailing_atr_multiplier)?;
        if let Some(min) = self.config.trailing_stop_min {
            distance = distance.max(min);
        }
        if let Some(max) = self.config.trailing_stop_max {
            distance = distance.min(max);
        }
        // 거리가 100% 이상이면 롱 스탑이 0 이하가 되므로 비활성과 같음
        (distance > Decimal::ZERO && distance < Decimal::ONE).then_some(distance)
    }

    fn initial_trailing_distance(&self, index: usize, close: Decimal) -> Option<Decimal> {
        match self.config.trailing_stop_mode {
            TrailingStopMode::Fixed => self.config.trailing_stop_pct,
            TrailingStopMode::Atr => self
                .atr_distance(index, close)
                .or(self.config.trailing_stop_pct),
        }
    }

    fn try_open(&mut self, index: usize, candle: &Candle, signal: Signal) -> BacktestResult<()> {
        let Some(side) = signal.entry_side() else {
            return Ok(());
        };
        if !self.config.trade_mode.allows(side)
            || self.positions.len() >= self.config.max_slots
            || self.positions.iter().any(|p| p.side != side)
            || self.balance <= Decimal::ZERO
            || candle.close <= Decimal::ZERO
        {
            return Ok(());
        }

        let price = candle.close;
        let margin = self
            .balance
            .checked_mul(self.config.capital)
            .and_then(|v| v.checked_div(Decimal::from(self.config.max_slots)))
            .ok_or(BacktestError::Overflow("증거금"))?;
        let size = margin
            .checked_div(price)
            .ok_or(BacktestError::Overflow("수량"))?;
        let notional = price
            .checked_mul(size)
            .ok_or(BacktestError::Overflow("명목 금액"))?;
        let entry_fee = notional
            .checked_mul(self.config.fee_rate)
            .ok_or(BacktestError::Overflow("진입 수수료"))?;
        self.balance = self
            .balance
            .checked_sub(entry_fee)
            .ok_or(BacktestError::Overflow("잔고"))?;

        let stop_loss = self
            .config
            .stop_loss_pct
            .map(|pct| {
                let factor = match side {
                    Side::Long => Decimal::ONE - pct,
                    Side::Short => Decimal::ONE + pct,
                };
                price.checked_mul(factor).ok_or(BacktestError::Overflow("손절가"))
            })
            .transpose()?;
        let take_profit = self
            .config
            .take_profit_pct
            .map(|pct| {
                let factor = match side {
                    Side::Long => Decimal::ONE + pct,
                    Side::Short => Decimal::ONE - pct,
                };
                price.checked_mul(factor).ok_or(BacktestError::Overflow("익절가"))
            })
            .transpose()?;

        debug!(side = %side, price = %price, size = %size, slot = self.positions.len(), "포지션 진입");

        self.positions.push(Position {
            side,
            entry_price: price,
            entry_time: candle.timestamp,
            entry_index: index,
            size,
            notional,
            leverage: self.config.leverage,
            entry_fee,
            stop_loss,
            take_profit,
            trailing_anchor: price,
            trailing_distance: self.initial_trailing_distance(index, price),
            unrealized_pnl: Decimal::ZERO,
        });
        Ok(())
    }

    fn mark_to_market(&mut self, candle: &Candle) -> BacktestResult<()> {
        let mut unrealized = Decimal::ZERO;
        for position in &mut self.positions {
            position.unrealized_pnl = position
                .gross_pnl_at(candle.close)
                .ok_or(BacktestError::Overflow("평가 손익"))?;
            unrealized = unrealized
                .checked_add(position.unrealized_pnl)
                .ok_or(BacktestError::Overflow("평가 손익"))?;
        }
        let account_value = self
            .balance
            .checked_add(unrealized)
            .ok_or(BacktestError::Overflow("평가 자산"))?;
        self.equity.push(EquityPoint {
            timestamp: candle.timestamp,
            account_value: account_value.max(Decimal::ZERO),
        });
        Ok(())
    }
}

/// 고정 순서(손절 → 익절 → 트레일링)로 캔들 내 스탑 도달 여부와 체결가를 판정합니다.
fn stop_trigger(position: &Position, candle: &Candle) -> Option<(ExitReason, Decimal)> {
    match position.side {
        Side::Long => {
            if let Some(sl) = position.stop_loss.filter(|sl| candle.low <= *sl) {
                return Some((ExitReason::StopLoss, sl.min(candle.open)));
            }
            if let Some(tp) = position.take_profit.filter(|tp| candle.high >= *tp) {
                return Some((ExitReason::TakeProfit, tp.max(candle.open)));
            }
            if let Some(ts) = position.trailing_stop_price().filter(|ts| candle.low <= *ts) {
                return Some((ExitReason::TrailingStop, ts.min(candle.open)));
            }
        }
        Side::Short => {
            if let Some(sl) = position.stop_loss.filter(|sl| candle.high >= *sl) {
                return Some((ExitReason::StopLoss, sl.max(candle.open)));
            }
            if let Some(tp) = position.take_profit.filter(|tp| candle.low <= *tp) {
                return Some((ExitReason::TakeProfit, tp.min(candle.open)));
            }
            if let Some(ts) = position.trailing_stop_price().filter(|ts| candle.high >= *ts) {
                return Some((ExitReason::TrailingStop, ts.max(candle.open)));
            }
        }
    }
    None
}

/// 신호 시계열로 거래를 시뮬레이션합니다.
///
/// 캔들과 신호가 모두 비어 있으면 거래와 자산 곡선이 빈 결과를 반환합니다.
pub fn simulate(
    candles: &[Candle],
    signals: &[Signal],
    config: &BacktestConfig,
) -> BacktestResult<SimulationResult> {
    if candles.is_empty() && signals.is_empty() {
        config.validate()?;
        return Ok(SimulationResult {
            trades: Vec::new(),
            equity: Vec::new(),
            open_positions: Vec::new(),
            final_balance: config.initial_balance,
        });
    }
    BacktestEngine::new(candles, signals, config)?.run()
}

// ================================================================================================
// 전략 단위 실행
// ================================================================================================

/// 백테스트 실행 리포트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    /// 전략 이름
    pub strategy: String,
    /// 설정 정보
    pub config: BacktestConfig,
    /// 성과 지표
    pub summary: PerformanceSummary,
    /// 거래/자산 곡선
    pub result: SimulationResult,
    /// 백테스트 기간 시작
    pub start_time: Option<DateTime<Utc>>,
    /// 백테스트 기간 종료
    pub end_time: Option<DateTime<Utc>>,
    /// 데이터 포인트 수
    pub data_points: usize,
}

impl BacktestReport {
    /// 요약 문자열 반환
    pub fn summary(&self) -> String {
        let period = match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => format!(
                "{} → {} ({} 일)",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d"),
                (end - start).num_days()
            ),
            _ => "-".to_string(),
        };
        let total_fees = self
            .result
            .trades
            .iter()
            .fold(Decimal::ZERO, |acc, t| acc.saturating_add(t.fee_paid));

        format!(
            "백테스트 결과 요약 [{}]\n\
             ═══════════════════════════════════════\n\
             기간: {}\n\
             데이터 포인트: {}\n\
             ───────────────────────────────────────\n\
             초기 잔고: {}\n\
             최종 잔고: {:.2}\n\
             미청산 포지션: {}\n\
             총 수수료: {:.2}\n\
             ───────────────────────────────────────\n\
             {}",
            self.strategy,
            period,
            self.data_points,
            self.config.initial_balance,
            self.result.final_balance,
            self.result.open_positions.len(),
            total_fees,
            self.summary.summary(),
        )
    }
}

/// 전략으로 신호를 생성해 시뮬레이션하고 성과를 평가합니다.
pub fn run_backtest<S>(
    strategy: &S,
    candles: &[Candle],
    config: &BacktestConfig,
) -> BacktestResult<BacktestReport>
where
    S: Strategy + ?Sized,
{
    let signals = strategy.generate_signals(candles)?;
    let result = simulate(candles, &signals, config)?;
    let summary = evaluate(&result.trades, &result.equity, config.periods_per_year);

    Ok(BacktestReport {
        strategy: strategy.name().to_string(),
        config: config.clone(),
        summary,
        result,
        start_time: candles.first().map(|c| c.timestamp),
        end_time: candles.last().map(|c| c.timestamp),
        data_points: candles.len(),
    })
}

/// ParameterSet 하나로 전략과 엔진 설정을 만들어 백테스트합니다.
///
/// 그리드 최적화의 작업 단위입니다.
pub fn backtest_params(
    candles: &[Candle],
    params: &ParameterSet,
    base_config: &BacktestConfig,
) -> BacktestResult<BacktestReport> {
    let strategy = StrategyVariant::from_params(params)?;
    let config = base_config.with_overrides(params)?;
    run_backtest(&strategy, candles, &config)
}
