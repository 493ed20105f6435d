//! 速率限制模块
//!
//! 提供基于固定窗口的尝试次数限制，用于 token 的生成与使用两侧的限流。
//!
//! ## 功能特性
//!
//! - **attempt**: 记录一次尝试，超过上限时返回带解锁时间的 `Lockout` 错误
//! - **limit**: 在限流保护下执行回调，成功后清除计数，失败则保留计数
//! - **可插拔存储**: 计数存储通过 [`RateLimitStore`] 抽象，可扩展为 Redis 等
//!
//! ## 示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use tokenrs::security::rate_limit::RateLimiter;
//! use std::time::Duration;
//!
//! let limiter = RateLimiter::in_memory();
//! let key = "_tok:use:reset.password:10.0.0.1";
//!
//! // 10 分钟内最多 3 次尝试
//! for _ in 0..3 {
//!     limiter.attempt(key, 3, Duration::from_secs(600)).await.unwrap();
//! }
//!
//! // 第 4 次被锁定
//! let err = limiter.attempt(key, 3, Duration::from_secs(600)).await.unwrap_err();
//! assert!(err.is_lockout());
//! # });
//! ```

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// 速率限制信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// 当前窗口内已记录的尝试次数
    pub attempts: u32,
    /// 剩余尝试次数
    pub remaining: u32,
    /// 总限制次数
    pub limit: u32,
    /// 窗口重置时间（距现在的时长）
    pub reset_after: Duration,
}

impl RateLimitInfo {
    /// 是否已被锁定
    pub fn is_locked(&self) -> bool {
        self.remaining == 0
    }
}

/// 固定窗口记录
#[derive(Debug, Clone)]
struct FixedWindowRecord {
    /// 当前窗口的尝试计数
    count: u32,
    /// 窗口结束时间
    expires_at: Instant,
}

impl FixedWindowRecord {
    fn new(window: Duration) -> Self {
        Self {
            count: 0,
            expires_at: Instant::now() + window,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    fn available_in(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// 尝试计数存储 trait
///
/// 每个原语操作（递增、读取、清除）都应在后端层面保持原子性。
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// 获取当前窗口内的尝试次数（窗口已过期时为 0）
    async fn attempts(&self, key: &str) -> Result<u32>;

    /// 记录一次尝试，窗口不存在或已过期时开启长度为 `window` 的新窗口
    ///
    /// 返回记录后的尝试次数。
    async fn hit(&self, key: &str, window: Duration) -> Result<u32>;

    /// 距离当前窗口结束的时长
    async fn available_in(&self, key: &str) -> Result<Duration>;

    /// 清除某个 key 的计数
    async fn clear(&self, key: &str) -> Result<()>;

    /// 清理已过期的窗口
    ///
    /// 不在 `hit` 中自动清理的后端需要由调用方定期执行。
    async fn cleanup(&self) -> Result<usize>;
}

/// 内存尝试计数存储（固定窗口）
///
/// 适用于单实例部署或测试环境。每次 `hit` 都会移除已过期的窗口。
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    records: RwLock<HashMap<String, FixedWindowRecord>>,
}

impl InMemoryRateLimitStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前记录的 key 数量
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// 检查存储是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn attempts(&self, key: &str) -> Result<u32> {
        let records = self
            .records
            .read()
            .map_err(|_| Error::internal("Failed to acquire lock"))?;

        Ok(records
            .get(key)
            .filter(|record| !record.is_expired())
            .map(|record| record.count)
            .unwrap_or(0))
    }

    async fn hit(&self, key: &str, window: Duration) -> Result<u32> {
        let mut records = self
            .records
            .write()
            .map_err(|_| Error::internal("Failed to acquire lock"))?;

        // 顺带移除其他 key 的过期窗口
        records.retain(|k, record| k == key || !record.is_expired());

        let record = records
            .entry(key.to_string())
            .or_insert_with(|| FixedWindowRecord::new(window));

        // 窗口过期后从零开始
        if record.is_expired() {
            *record = FixedWindowRecord::new(window);
        }

        record.count += 1;
        Ok(record.count)
    }

    async fn available_in(&self, key: &str) -> Result<Duration> {
        let records = self
            .records
            .read()
            .map_err(|_| Error::internal("Failed to acquire lock"))?;

        Ok(records
            .get(key)
            .map(FixedWindowRecord::available_in)
            .unwrap_or(Duration::ZERO))
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| Error::internal("Failed to acquire lock"))?;
        records.remove(key);
        Ok(())
    }

    async fn cleanup(&self) -> Result<usize> {
        let mut records = self
            .records
            .write()
            .map_err(|_| Error::internal("Failed to acquire lock"))?;
        let before = records.len();
        records.retain(|_, record| !record.is_expired());
        Ok(before - records.len())
    }
}

/// 速率限制器
///
/// 以 `(key, max_attempts, window)` 为单位限制尝试次数。
/// key 由调用方构造，限制器把它当作不透明字符串处理，不同 key 的计数互不影响。
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl RateLimiter {
    /// 使用内存存储创建限制器
    pub fn in_memory() -> Self {
        Self::with_store(InMemoryRateLimitStore::new())
    }

    /// 使用自定义存储创建限制器
    pub fn with_store<S: RateLimitStore + 'static>(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// 使用共享存储创建限制器
    pub fn with_shared_store(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    /// 记录一次尝试
    ///
    /// 如果窗口内的尝试次数在本次记录之前已达到 `max_attempts`，
    /// 返回带解锁时间的 `Lockout` 错误，且不再递增计数。
    pub async fn attempt(&self, key: &str, max_attempts: u32, window: Duration) -> Result<()> {
        self.guard_too_many_attempts(key, max_attempts).await?;
        let attempts = self.store.hit(key, window).await?;
        debug!(key, attempts, max_attempts, "Rate limit attempt recorded");
        Ok(())
    }

    /// 在限流保护下执行回调
    ///
    /// 回调成功时清除计数；回调失败时保留本次计数并原样返回错误。
    pub async fn limit<T, F, Fut>(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
        callback: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.attempt(key, max_attempts, window).await?;

        let value = callback().await?;

        self.clear(key).await?;
        Ok(value)
    }

    /// 清除某个 key 的计数
    pub async fn clear(&self, key: &str) -> Result<()> {
        self.store.clear(key).await
    }

    /// 当前窗口内是否已达到上限
    pub async fn is_locked(&self, key: &str, max_attempts: u32) -> Result<bool> {
        Ok(self.store.attempts(key).await? >= max_attempts)
    }

    /// 获取当前状态（不记录尝试）
    pub async fn status(&self, key: &str, max_attempts: u32) -> Result<RateLimitInfo> {
        let attempts = self.store.attempts(key).await?;
        let reset_after = if attempts == 0 {
            Duration::ZERO
        } else {
            self.store.available_in(key).await?
        };

        Ok(RateLimitInfo {
            attempts,
            remaining: max_attempts.saturating_sub(attempts),
            limit: max_attempts,
            reset_after,
        })
    }

    /// 清理过期记录
    pub async fn cleanup(&self) -> Result<usize> {
        self.store.cleanup().await
    }

    async fn guard_too_many_attempts(&self, key: &str, max_attempts: u32) -> Result<()> {
        if !self.is_locked(key, max_attempts).await? {
            return Ok(());
        }

        let available_in = self.store.available_in(key).await?;
        let unlock_at = Utc::now()
            + chrono::Duration::from_std(available_in)
                .map_err(|e| Error::internal(format!("invalid lockout window: {}", e)))?;

        warn!(key, max_attempts, %unlock_at, "Too many attempts, key is locked out");
        Err(Error::lockout(unlock_at))
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    const WINDOW: Duration = Duration::from_secs(600);

    #[tokio::test]
    async fn test_attempts_within_limit() {
        let limiter = RateLimiter::in_memory();

        for _ in 0..3 {
            assert!(limiter.attempt("key", 3, WINDOW).await.is_ok());
        }

        let status = limiter.status("key", 3).await.unwrap();
        assert_eq!(status.attempts, 3);
        assert!(status.is_locked());
    }

    #[tokio::test]
    async fn test_lockout_carries_unlock_time() {
        let limiter = RateLimiter::in_memory();

        for _ in 0..3 {
            limiter.attempt("key", 3, WINDOW).await.unwrap();
        }

        let before = Utc::now();
        let err = limiter.attempt("key", 3, WINDOW).await.unwrap_err();
        let unlock_at = err.unlock_at().unwrap();

        let expected = before + chrono::Duration::minutes(10);
        assert!((unlock_at - expected).num_seconds().abs() <= 1);
    }

    #[tokio::test]
    async fn test_lockout_does_not_increment() {
        let limiter = RateLimiter::in_memory();

        limiter.attempt("key", 1, WINDOW).await.unwrap();
        assert!(limiter.attempt("key", 1, WINDOW).await.is_err());
        assert!(limiter.attempt("key", 1, WINDOW).await.is_err());

        assert_eq!(limiter.status("key", 1).await.unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::in_memory();

        limiter.attempt("a", 1, WINDOW).await.unwrap();
        assert!(limiter.attempt("a", 1, WINDOW).await.is_err());
        assert!(limiter.attempt("b", 1, WINDOW).await.is_ok());
    }

    #[tokio::test]
    async fn test_limit_clears_on_success() {
        let limiter = RateLimiter::in_memory();

        limiter.attempt("key", 3, WINDOW).await.unwrap();
        limiter.attempt("key", 3, WINDOW).await.unwrap();

        let value = limiter
            .limit("key", 3, WINDOW, || async { Ok(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(limiter.status("key", 3).await.unwrap().attempts, 0);
    }

    #[tokio::test]
    async fn test_limit_keeps_attempt_on_failure() {
        let limiter = RateLimiter::in_memory();

        let result: Result<()> = limiter
            .limit("key", 3, WINDOW, || async { Err(Error::Other("boom".into())) })
            .await;
        assert!(matches!(result, Err(Error::Other(msg)) if msg == "boom"));
        assert_eq!(limiter.status("key", 3).await.unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn test_window_expiration_resets_attempts() {
        let limiter = RateLimiter::in_memory();
        let window = Duration::from_secs(1);

        limiter.attempt("key", 1, window).await.unwrap();
        assert!(limiter.attempt("key", 1, window).await.is_err());

        sleep(Duration::from_millis(1100)).await;

        assert!(limiter.attempt("key", 1, window).await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_removes_expired_windows() {
        let store = Arc::new(InMemoryRateLimitStore::new());
        let limiter = RateLimiter::with_shared_store(store.clone());

        limiter
            .attempt("short", 1, Duration::from_millis(50))
            .await
            .unwrap();
        limiter.attempt("long", 1, WINDOW).await.unwrap();
        assert_eq!(store.len(), 2);

        sleep(Duration::from_millis(100)).await;

        assert_eq!(limiter.cleanup().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_hit_prunes_expired_windows() {
        let store = Arc::new(InMemoryRateLimitStore::new());
        let limiter = RateLimiter::with_shared_store(store.clone());

        for requester in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            limiter
                .attempt(requester, 1, Duration::from_millis(50))
                .await
                .unwrap();
        }
        assert_eq!(store.len(), 3);

        sleep(Duration::from_millis(100)).await;

        limiter.attempt("10.0.0.4", 1, WINDOW).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(limiter.cleanup().await.unwrap(), 0);
    }
}
