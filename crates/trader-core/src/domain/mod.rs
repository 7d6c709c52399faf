//! 도메인 모델.

pub mod candle;
pub mod parameter;
pub mod signal;

pub use candle::{ensure_monotonic, Candle, CandleFeed};
pub use parameter::{ParamValue, ParameterSet, ENGINE_PARAM_KEYS, STRATEGY_PARAM};
pub use signal::{Side, Signal, TradeMode};
