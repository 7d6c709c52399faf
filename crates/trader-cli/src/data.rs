//! CSV 캔들 로더.
//!
//! 컬럼: `timestamp,open,high,low,close,volume`
//!
//! `timestamp`는 RFC 3339(`2024-01-01T00:00:00Z`), epoch 밀리초(`1704067200000`),
//! 또는 날짜(`2024-01-01`, UTC 자정)를 허용합니다.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use trader_core::{Candle, CandleFeed};

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    #[serde(with = "rust_decimal::serde::str")]
    open: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    low: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    close: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    volume: Decimal,
}

/// 날짜 문자열 파싱 (YYYY-MM-DD)
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("잘못된 날짜 형식: {s} (YYYY-MM-DD)"))
}

/// 날짜의 UTC 자정 시각
pub fn date_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// 타임스탬프 문자열 파싱
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        let millis: i64 = s.parse().with_context(|| format!("잘못된 epoch 값: {s}"))?;
        return Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| anyhow!("범위를 벗어난 epoch 값: {s}"));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    parse_date(s)
        .map(date_start)
        .map_err(|_| anyhow!("타임스탬프 형식을 인식할 수 없습니다: {s}"))
}

/// CSV 파일에서 캔들 피드를 읽습니다.
///
/// `from`/`to`가 주어지면 `[from, to)` 구간만 남깁니다.
pub fn load_candles(
    path: &Path,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<CandleFeed> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("CSV 파일 열기 실패: {}", path.display()))?;

    let mut candles = Vec::new();
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        // 헤더가 1행
        let line = i + 2;
        let row = row.with_context(|| format!("{}:{line} 행 파싱 실패", path.display()))?;
        let timestamp = parse_timestamp(&row.timestamp)
            .with_context(|| format!("{}:{line}", path.display()))?;
        if from.is_some_and(|from| timestamp < from) || to.is_some_and(|to| timestamp >= to) {
            continue;
        }
        candles.push(Candle::new(
            timestamp, row.open, row.high, row.low, row.close, row.volume,
        ));
    }

    if candles.is_empty() {
        bail!("{}: 조건에 맞는 캔들이 없습니다", path.display());
    }

    let feed = CandleFeed::new(candles)
        .with_context(|| format!("캔들 데이터 검증 실패: {}", path.display()))?;
    info!(
        path = %path.display(),
        candles = feed.len(),
        first = ?feed.first().map(|c| c.timestamp),
        last = ?feed.last().map(|c| c.timestamp),
        "캔들 로드 완료"
    );
    Ok(feed)
}
