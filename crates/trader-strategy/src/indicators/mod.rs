//! 기술적 지표 계층.
//!
//! 모든 지표는 캔들/가격 배열을 받아 입력과 같은 길이의 `Vec<Option<Decimal>>`을
//! 반환하는 순수 함수입니다. 인덱스 `i`의 값은 `i` 이하의 입력에만 의존하며,
//! 워밍업 구간(데이터 부족)은 `None`으로 채워집니다. 데이터가 부족한 것은
//! 오류가 아니며, 기간이 0인 경우처럼 파라미터가 잘못된 경우에만 오류를 반환합니다.

mod moving_average;
mod oscillator;
mod trend;
mod volatility;

pub use moving_average::{ema, ema_of, sma, sma_of};
pub use oscillator::{
    macd, rsi, stochastic, MacdOutput, MacdParams, StochasticOutput, StochasticParams,
};
pub use trend::adx;
pub use volatility::{atr, donchian, true_range, DonchianOutput};

use crate::error::{IndicatorError, IndicatorResult};

/// 지표 시계열
pub type Series = Vec<Option<rust_decimal::Decimal>>;

pub(crate) fn ensure_period(name: &str, period: usize) -> IndicatorResult<()> {
    if period == 0 {
        return Err(IndicatorError::InvalidParameter(format!(
            "{name} 기간은 1 이상이어야 합니다"
        )));
    }
    Ok(())
}
