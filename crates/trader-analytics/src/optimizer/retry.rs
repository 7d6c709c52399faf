//! 체크포인트 저장 재시도 유틸리티.
//!
//! 디스크 쓰기 실패 같은 일시적인 오류에 대해 지수 백오프로 재시도합니다.
//!
//! # 예시
//!
//! ```rust,ignore
//! use trader_analytics::optimizer::retry::{with_retry, RetryConfig};
//!
//! let config = RetryConfig::default();
//! with_retry(&config, "체크포인트 저장", || store.flush(run_id, &batch)).await?;
//! ```

use std::{fmt::Display, future::Future, time::Duration};

use tracing::{debug, warn};

/// 재시도 설정.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// 최대 재시도 횟수 (초기 시도 제외).
    pub max_retries: u32,
    /// 기본 대기 시간.
    pub base_delay: Duration,
    /// 최대 대기 시간.
    pub max_delay: Duration,
    /// 지수 백오프 사용 여부.
    pub use_exponential_backoff: bool,
    /// 백오프 배수 (지수 백오프 시 사용).
    pub backoff_multiplier: f64,
    /// 재시도 시 지터(무작위 지연) 추가 여부.
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            use_exponential_backoff: true,
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// 빠른 재시도 설정 (짧은 지연, 적은 재시도).
    pub fn fast() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            ..Default::default()
        }
    }

    /// 재시도 없음 (단일 시도).
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// 대기 시간 계산.
    pub(crate) fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay = if self.use_exponential_backoff && attempt > 0 {
            let multiplier = self.backoff_multiplier.powi(attempt as i32);
            Duration::from_secs_f64(self.base_delay.as_secs_f64() * multiplier)
        } else {
            self.base_delay
        };

        let delay = delay.min(self.max_delay);

        // 지터 추가 (±25%)
        if self.add_jitter {
            let jitter_range = delay.as_millis() as f64 * 0.25;
            let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
            Duration::from_millis((delay.as_millis() as f64 + jitter).max(0.0) as u64)
        } else {
            delay
        }
    }
}

/// 재시도가 포함된 비동기 작업 실행.
///
/// 모든 시도가 실패하면 마지막 오류를 반환합니다.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, operation_name: &str, operation: F) -> Result<T, E>
where
    E: Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    with_retry_if(config, operation_name, operation, |_| true).await
}

/// 특정 조건에서만 재시도하는 래퍼.
///
/// `should_retry`가 `false`인 오류는 대기 없이 바로 반환합니다.
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
    should_retry: P,
) -> Result<T, E>
where
    E: Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    let mut total_delay = Duration::ZERO;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        total_delay_ms = total_delay.as_millis(),
                        "재시도 후 성공"
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                if !should_retry(&e) {
                    debug!(operation = operation_name, error = %e, "재시도 대상 아님");
                    return Err(e);
                }
                if attempt >= config.max_retries {
                    warn!(
                        operation = operation_name,
                        error = %e,
                        attempts = attempt + 1,
                        "최대 재시도 횟수 초과"
                    );
                    return Err(e);
                }

                let delay = config.calculate_delay(attempt);
                warn!(
                    operation = operation_name,
                    error = %e,
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis(),
                    "재시도 대기 중"
                );

                tokio::time::sleep(delay).await;
                total_delay += delay;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn test_calculate_delay_exponential() {
        let config = RetryConfig {
            add_jitter: false,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            ..Default::default()
        };
        assert_eq!(config.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(config.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(config.calculate_delay(2), Duration::from_millis(400));
        // 최대 대기 시간 제한
        assert_eq!(config.calculate_delay(10), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(100),
            ..Default::default()
        };
        for _ in 0..50 {
            let delay = config.calculate_delay(0).as_millis();
            assert!((75..=125).contains(&delay));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_succeeds_after_failures() {
        let calls = &AtomicU32::new(0);
        let result: Result<u32, String> = with_retry(&RetryConfig::default(), "테스트", || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(format!("실패 {n}"))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_gives_up() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), String> = with_retry(&RetryConfig::fast(), "테스트", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("디스크 가득 참".to_string())
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_if_skips_permanent_errors() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), String> = with_retry_if(
            &RetryConfig::default(),
            "테스트",
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("파일 손상".to_string())
            },
            |e: &String| !e.contains("손상"),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
