//! Token 生命周期管理器
//!
//! [`TokenManager`] 负责单一用途 token 的完整生命周期：
//!
//! - **generate_for**: 为所有者生成 token（限流、处理上一个 token、保证唯一值）
//! - **use_token / use_for**: 校验并消费 token，在回调中执行业务动作
//! - **reap**: 永久删除所有失效的记录
//!
//! ## 示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use tokenrs::generator::GeneratorRegistry;
//! use tokenrs::manager::TokenManager;
//! use tokenrs::store::InMemoryTokenStore;
//! use tokenrs::token::{OwnerRef, TimeSpec, TokenOptions, TokenRegistry};
//!
//! let mut registry = TokenRegistry::new(GeneratorRegistry::with_defaults("APP_KEY"));
//! registry.define("verify", TokenOptions::new().with_ttl(TimeSpec::minutes(60)));
//!
//! let manager = TokenManager::new(InMemoryTokenStore::new(), registry);
//! let user = OwnerRef::new("user", "42");
//!
//! // 生成 token，通常随后通过邮件发送
//! let token = manager.generate_for(&user, "verify").await.unwrap();
//!
//! // 用户点击链接后消费 token
//! let owner = manager
//!     .use_for(&token.value, "verify", &user, |owner| async move {
//!         println!("verified {}", owner);
//!         Ok(())
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(owner, user);
//!
//! // token 只能使用一次
//! let again = manager
//!     .use_for(&token.value, "verify", &user, |_| async { Ok(()) })
//!     .await;
//! assert!(again.is_err());
//! # });
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result, TokenError};
use crate::events::{NoOpEventSink, TokenEventSink};
use crate::generator::GeneratorRegistry;
use crate::security::rate_limit::RateLimiter;
use crate::store::TokenStore;
use crate::token::{
    DEFAULT_GENERATION_ATTEMPTS, OwnerRef, PreviousStrategy, Token, TokenOptions, TokenRegistry,
    TokenType, TokenTypeRef, Tokenable, TokensConfig,
};

/// 管理器自身方法使用的请求方标识
pub const UNKNOWN_REQUESTER: &str = "unknown";

/// token 值的最大长度（字符数）
pub const MAX_TOKEN_LENGTH: usize = 255;

// ============================================================================
// 回调结果与所有者解析
// ============================================================================

/// 使用回调的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UseOutcome {
    /// 标记 token 为已使用
    #[default]
    Consume,
    /// 保留 token，不标记为已使用
    Keep,
}

impl From<()> for UseOutcome {
    fn from(_: ()) -> Self {
        UseOutcome::Consume
    }
}

impl From<bool> for UseOutcome {
    fn from(consume: bool) -> Self {
        if consume {
            UseOutcome::Consume
        } else {
            UseOutcome::Keep
        }
    }
}

/// 所有者解析器
///
/// 把 token 记录中的 [`OwnerRef`] 解析为应用层实体，再交给使用回调。
#[async_trait]
pub trait OwnerResolver: Send + Sync {
    /// 解析后的所有者类型
    type Owner: Clone + Send + Sync + 'static;

    /// 解析所有者
    async fn resolve(&self, owner: &OwnerRef) -> Result<Self::Owner>;
}

/// 默认的所有者解析器，直接返回 [`OwnerRef`]
#[derive(Debug, Default, Clone, Copy)]
pub struct OwnerRefResolver;

#[async_trait]
impl OwnerResolver for OwnerRefResolver {
    type Owner = OwnerRef;

    async fn resolve(&self, owner: &OwnerRef) -> Result<OwnerRef> {
        Ok(owner.clone())
    }
}

// ============================================================================
// TokenManager
// ============================================================================

/// Token 生命周期管理器
pub struct TokenManager<R: OwnerResolver = OwnerRefResolver> {
    store: Arc<dyn TokenStore>,
    limiter: RateLimiter,
    registry: TokenRegistry,
    events: Arc<dyn TokenEventSink>,
    resolver: R,
    generation_attempts: usize,
}

impl TokenManager<OwnerRefResolver> {
    /// 使用给定的存储和注册表创建管理器
    ///
    /// 默认使用内存限流存储，不发送事件通知。
    pub fn new<S: TokenStore + 'static>(store: S, registry: TokenRegistry) -> Self {
        Self::with_shared_store(Arc::new(store), registry)
    }

    /// 使用共享存储创建管理器
    pub fn with_shared_store(store: Arc<dyn TokenStore>, registry: TokenRegistry) -> Self {
        Self {
            store,
            limiter: RateLimiter::in_memory(),
            registry,
            events: Arc::new(NoOpEventSink),
            resolver: OwnerRefResolver,
            generation_attempts: DEFAULT_GENERATION_ATTEMPTS,
        }
    }

    /// 从配置创建管理器
    pub fn from_config<S: TokenStore + 'static>(
        config: TokensConfig,
        generators: GeneratorRegistry,
        store: S,
    ) -> Result<Self> {
        config.validate()?;
        let generation_attempts = config.generation_attempts;
        let registry = config.into_registry(generators);

        Ok(Self::new(store, registry).with_generation_attempts(generation_attempts))
    }
}

impl<R: OwnerResolver> TokenManager<R> {
    /// 设置速率限制器
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// 设置事件接收方
    pub fn with_event_sink<E: TokenEventSink + 'static>(mut self, events: E) -> Self {
        self.events = Arc::new(events);
        self
    }

    /// 设置共享的事件接收方
    pub fn with_shared_event_sink(mut self, events: Arc<dyn TokenEventSink>) -> Self {
        self.events = events;
        self
    }

    /// 设置生成唯一值时的最大尝试次数（至少为 1）
    pub fn with_generation_attempts(mut self, attempts: usize) -> Self {
        self.generation_attempts = attempts.max(1);
        self
    }

    /// 设置所有者解析器
    pub fn with_owner_resolver<R2: OwnerResolver>(self, resolver: R2) -> TokenManager<R2> {
        TokenManager {
            store: self.store,
            limiter: self.limiter,
            registry: self.registry,
            events: self.events,
            resolver,
            generation_attempts: self.generation_attempts,
        }
    }

    /// 定义 token 类型
    pub fn define(&mut self, name: impl Into<String>, options: TokenOptions) {
        self.registry.define(name, options);
    }

    /// 解析 token 类型
    pub fn resolve_token_type(&self, token_type: impl Into<TokenTypeRef>) -> Result<Arc<dyn TokenType>> {
        self.registry.resolve(&token_type.into())
    }

    /// 获取注册表
    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    /// 获取存储
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// 获取速率限制器
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// 以给定的请求方标识（例如客户端 IP）执行操作
    ///
    /// 请求方标识只影响限流 key，不同请求方的尝试次数互不影响。
    pub fn requester(&self, requester: impl Into<String>) -> RequestScope<'_, R> {
        RequestScope {
            manager: self,
            requester: requester.into(),
        }
    }

    /// 为所有者生成 token
    ///
    /// # Arguments
    ///
    /// * `owner` - token 的所有者
    /// * `token_type` - 已定义的类型名称或自定义类型
    ///
    /// # Errors
    ///
    /// - 类型未定义或选项无效时返回配置错误
    /// - 生成限流触发时返回 `Lockout`
    /// - 尝试次数用尽仍无法得到唯一值时返回 `GenerationExhausted`
    pub async fn generate_for<O: Tokenable + ?Sized>(
        &self,
        owner: &O,
        token_type: impl Into<TokenTypeRef>,
    ) -> Result<Token> {
        self.generate_as(UNKNOWN_REQUESTER, owner.owner_ref(), token_type.into())
            .await
    }

    /// 使用 token
    ///
    /// 校验通过后以解析出的所有者调用 `callback`。回调返回 `()` 或 `true` 时
    /// token 被标记为已使用；返回 `false` 时 token 保持有效。
    ///
    /// # Arguments
    ///
    /// * `value` - token 值
    /// * `token_type` - 已定义的类型名称或自定义类型
    /// * `callback` - 业务动作
    /// * `expected_owner` - 期望的所有者，提供时 token 必须属于它
    ///
    /// # Errors
    ///
    /// 依次检查：`Lockout`、`Invalid`、`NotFound`、`Expired`、`AlreadyUsed`、`AccessDenied`，
    /// 回调返回的错误原样传递。
    pub async fn use_token<T, F, Fut>(
        &self,
        value: &str,
        token_type: impl Into<TokenTypeRef>,
        callback: F,
        expected_owner: Option<OwnerRef>,
    ) -> Result<R::Owner>
    where
        F: FnOnce(R::Owner) -> Fut,
        Fut: Future<Output = Result<T>>,
        T: Into<UseOutcome>,
    {
        self.use_as(
            UNKNOWN_REQUESTER,
            value,
            token_type.into(),
            expected_owner,
            callback,
        )
        .await
    }

    /// 以指定所有者使用 token
    ///
    /// 等价于提供了 `expected_owner` 的 [`use_token`](Self::use_token)。
    pub async fn use_for<O, T, F, Fut>(
        &self,
        value: &str,
        token_type: impl Into<TokenTypeRef>,
        owner: &O,
        callback: F,
    ) -> Result<R::Owner>
    where
        O: Tokenable + ?Sized,
        F: FnOnce(R::Owner) -> Fut,
        Fut: Future<Output = Result<T>>,
        T: Into<UseOutcome>,
    {
        self.use_as(
            UNKNOWN_REQUESTER,
            value,
            token_type.into(),
            Some(owner.owner_ref()),
            callback,
        )
        .await
    }

    /// 永久删除所有失效的记录（已使用、已过期或已软删除）
    pub async fn reap(&self) -> Result<usize> {
        let removed = self.store.purge_dead().await?;
        debug!(removed, "Dead tokens purged");
        Ok(removed)
    }

    // ========================================================================
    // 生成
    // ========================================================================

    async fn generate_as(
        &self,
        requester: &str,
        owner: OwnerRef,
        token_type: TokenTypeRef,
    ) -> Result<Token> {
        let token_type = self.registry.resolve(&token_type)?;
        let name = token_type.name();

        if let Some(throttle) = token_type.generation_throttle() {
            let max_attempts = throttle.max_attempts(name, "generation_attempts")?;
            let window = throttle.window(name, "generation_attempts_interval")?;
            self.limiter
                .attempt(
                    &token_type.generation_limiter_key(requester),
                    max_attempts,
                    window,
                )
                .await?;
        }

        let expires_at = expiration(token_type.as_ref())?;
        let strategy = token_type.previous_strategy()?;
        debug!(token_type = name, owner = %owner, strategy = %strategy, "Generating token");

        let token = match strategy {
            PreviousStrategy::Remove => {
                let previous = self.store.find_active_for_owner(&owner, name).await?;
                // 即将被删除的上一个 token 不算冲突，但删除要等唯一值确定之后
                let value = self
                    .unique_value(token_type.as_ref(), previous.as_ref())
                    .await?;
                if let Some(previous) = previous {
                    debug!(token_type = name, token_id = previous.id, "Removing previous token");
                    self.store.soft_delete(&previous).await?;
                }
                self.store.create(&owner, name, &value, expires_at).await?
            }
            PreviousStrategy::Reuse => {
                match self.store.find_active_for_owner(&owner, name).await? {
                    Some(previous) => {
                        debug!(token_type = name, token_id = previous.id, "Reusing previous token");
                        self.store.extend_expiration(&previous, expires_at).await?
                    }
                    None => {
                        let value = self.unique_value(token_type.as_ref(), None).await?;
                        self.store.create(&owner, name, &value, expires_at).await?
                    }
                }
            }
            PreviousStrategy::Keep => {
                let value = self.unique_value(token_type.as_ref(), None).await?;
                self.store.create(&owner, name, &value, expires_at).await?
            }
        };

        info!(
            token_type = name,
            token_id = token.id,
            owner = %token.owner,
            expires_at = %token.expires_at,
            "Token generated"
        );
        self.events.notify_created(&token, name);

        Ok(token)
    }

    /// 生成在同类型存活记录中不存在的 token 值
    ///
    /// 只与 `replacing` 冲突的候选值视为唯一。
    async fn unique_value(
        &self,
        token_type: &dyn TokenType,
        replacing: Option<&Token>,
    ) -> Result<String> {
        let name = token_type.name();
        let mut attempts = 0;

        loop {
            if attempts >= self.generation_attempts {
                warn!(token_type = name, attempts, "Unable to generate a unique token");
                return Err(TokenError::GenerationExhausted {
                    name: name.to_string(),
                }
                .into());
            }
            attempts += 1;

            let candidate = token_type.generate()?;
            let unique = match self.store.find_by_value_and_name(&candidate, name).await? {
                None => true,
                Some(existing) => replacing.is_some_and(|previous| previous.id == existing.id),
            };
            if unique {
                return Ok(candidate);
            }
            debug!(token_type = name, attempt = attempts, "Token value collision");
        }
    }

    // ========================================================================
    // 使用
    // ========================================================================

    async fn use_as<T, F, Fut>(
        &self,
        requester: &str,
        value: &str,
        token_type: TokenTypeRef,
        expected_owner: Option<OwnerRef>,
        callback: F,
    ) -> Result<R::Owner>
    where
        F: FnOnce(R::Owner) -> Fut,
        Fut: Future<Output = Result<T>>,
        T: Into<UseOutcome>,
    {
        let token_type = self.registry.resolve(&token_type)?;
        let name = token_type.name();

        match token_type.usage_throttle() {
            Some(throttle) => {
                let max_attempts = throttle.max_attempts(name, "usage_attempts")?;
                let window = throttle.window(name, "usage_attempts_interval")?;
                let key = token_type.usage_limiter_key(requester);

                self.limiter
                    .limit(&key, max_attempts, window, || {
                        self.consume(token_type.as_ref(), value, expected_owner.as_ref(), callback)
                    })
                    .await
            }
            None => {
                self.consume(token_type.as_ref(), value, expected_owner.as_ref(), callback)
                    .await
            }
        }
    }

    async fn consume<T, F, Fut>(
        &self,
        token_type: &dyn TokenType,
        value: &str,
        expected_owner: Option<&OwnerRef>,
        callback: F,
    ) -> Result<R::Owner>
    where
        F: FnOnce(R::Owner) -> Fut,
        Fut: Future<Output = Result<T>>,
        T: Into<UseOutcome>,
    {
        let name = token_type.name();
        validate_value(value)?;

        let token = self
            .store
            .find_by_value_and_name(value, name)
            .await?
            .ok_or_else(|| TokenError::NotFound {
                name: name.to_string(),
            })?;

        if token.is_expired() {
            return Err(TokenError::Expired(Box::new(token)).into());
        }
        if token.is_used() {
            return Err(TokenError::AlreadyUsed(Box::new(token)).into());
        }
        if let Some(expected) = expected_owner
            && !token.belongs_to(expected)
        {
            return Err(TokenError::AccessDenied {
                expected: expected.clone(),
            }
            .into());
        }

        let owner = self.resolver.resolve(&token.owner).await?;

        let outcome: UseOutcome = callback(owner.clone()).await?.into();
        if outcome == UseOutcome::Keep {
            debug!(token_type = name, token_id = token.id, "Token kept by callback");
            return Ok(owner);
        }

        let used = self.store.mark_used(&token, Utc::now()).await?;
        info!(
            token_type = name,
            token_id = used.id,
            owner = %used.owner,
            "Token used"
        );
        self.events.notify_used(&used, name);

        Ok(owner)
    }
}

impl<R: OwnerResolver> std::fmt::Debug for TokenManager<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("registry", &self.registry)
            .field("generation_attempts", &self.generation_attempts)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RequestScope
// ============================================================================

/// 绑定了请求方标识的操作入口
///
/// ```rust
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// use tokenrs::generator::GeneratorRegistry;
/// use tokenrs::manager::TokenManager;
/// use tokenrs::store::InMemoryTokenStore;
/// use tokenrs::token::{OwnerRef, TokenOptions, TokenRegistry};
///
/// let mut registry = TokenRegistry::new(GeneratorRegistry::with_defaults("APP_KEY"));
/// registry.define("verify", TokenOptions::new().with_generation_attempts(1));
/// let manager = TokenManager::new(InMemoryTokenStore::new(), registry);
/// let user = OwnerRef::new("user", "1");
///
/// manager.requester("10.0.0.1").generate_for(&user, "verify").await.unwrap();
/// assert!(manager.requester("10.0.0.1").generate_for(&user, "verify").await.is_err());
///
/// // 其他请求方不受影响
/// assert!(manager.requester("10.0.0.2").generate_for(&user, "verify").await.is_ok());
/// # });
/// ```
pub struct RequestScope<'a, R: OwnerResolver> {
    manager: &'a TokenManager<R>,
    requester: String,
}

impl<R: OwnerResolver> RequestScope<'_, R> {
    /// 请求方标识
    pub fn requester(&self) -> &str {
        &self.requester
    }

    /// 为所有者生成 token，参见 [`TokenManager::generate_for`]
    pub async fn generate_for<O: Tokenable + ?Sized>(
        &self,
        owner: &O,
        token_type: impl Into<TokenTypeRef>,
    ) -> Result<Token> {
        self.manager
            .generate_as(&self.requester, owner.owner_ref(), token_type.into())
            .await
    }

    /// 使用 token，参见 [`TokenManager::use_token`]
    pub async fn use_token<T, F, Fut>(
        &self,
        value: &str,
        token_type: impl Into<TokenTypeRef>,
        callback: F,
        expected_owner: Option<OwnerRef>,
    ) -> Result<R::Owner>
    where
        F: FnOnce(R::Owner) -> Fut,
        Fut: Future<Output = Result<T>>,
        T: Into<UseOutcome>,
    {
        self.manager
            .use_as(
                &self.requester,
                value,
                token_type.into(),
                expected_owner,
                callback,
            )
            .await
    }

    /// 以指定所有者使用 token，参见 [`TokenManager::use_for`]
    pub async fn use_for<O, T, F, Fut>(
        &self,
        value: &str,
        token_type: impl Into<TokenTypeRef>,
        owner: &O,
        callback: F,
    ) -> Result<R::Owner>
    where
        O: Tokenable + ?Sized,
        F: FnOnce(R::Owner) -> Fut,
        Fut: Future<Output = Result<T>>,
        T: Into<UseOutcome>,
    {
        self.manager
            .use_as(
                &self.requester,
                value,
                token_type.into(),
                Some(owner.owner_ref()),
                callback,
            )
            .await
    }
}

// ============================================================================
// 辅助函数
// ============================================================================

/// 计算过期时间
fn expiration(token_type: &dyn TokenType) -> Result<DateTime<Utc>> {
    let ttl = token_type.ttl()?;
    ttl.resolve_from(Utc::now()).ok_or_else(|| {
        Error::invalid_option(
            token_type.name(),
            "ttl",
            format!(
                "provide a positive number of minutes, a positive duration or a future timestamp, got {}",
                ttl
            ),
        )
    })
}

/// 校验 token 值
fn validate_value(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(TokenError::Invalid("token value must not be empty".to_string()).into());
    }
    if value.chars().count() > MAX_TOKEN_LENGTH {
        return Err(TokenError::Invalid(format!(
            "token value must not exceed {} characters",
            MAX_TOKEN_LENGTH
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{InMemoryEventSink, TokenEventKind};
    use crate::store::InMemoryTokenStore;
    use crate::token::TimeSpec;

    fn manager() -> (TokenManager, InMemoryTokenStore) {
        let store = InMemoryTokenStore::new();
        let mut registry = TokenRegistry::new(GeneratorRegistry::with_defaults("APP_KEY"));
        registry.define("verify", TokenOptions::new());
        (TokenManager::new(store.clone(), registry), store)
    }

    fn user() -> OwnerRef {
        OwnerRef::new("user", "1")
    }

    #[test]
    fn test_use_outcome_conversions() {
        assert_eq!(UseOutcome::from(()), UseOutcome::Consume);
        assert_eq!(UseOutcome::from(true), UseOutcome::Consume);
        assert_eq!(UseOutcome::from(false), UseOutcome::Keep);
    }

    #[test]
    fn test_validate_value() {
        assert!(validate_value("abc").is_ok());
        assert!(validate_value(&"a".repeat(255)).is_ok());
        assert!(validate_value("").is_err());
        assert!(validate_value(&"a".repeat(256)).is_err());
    }

    #[tokio::test]
    async fn test_generate_and_use() {
        let (manager, store) = manager();

        let token = manager.generate_for(&user(), "verify").await.unwrap();
        assert_eq!(token.value.len(), 64);
        assert_eq!(token.name, "verify");
        assert!(token.is_active());

        let owner = manager
            .use_token(&token.value, "verify", |_| async { Ok(()) }, None)
            .await
            .unwrap();
        assert_eq!(owner, user());

        let stored = store.snapshot().pop().unwrap();
        assert!(stored.is_used());
    }

    #[tokio::test]
    async fn test_undefined_type() {
        let (manager, _) = manager();
        let err = manager.generate_for(&user(), "missing").await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_invalid_ttl_persists_nothing() {
        let (mut manager, store) = manager();
        manager.define("broken", TokenOptions::new().with_ttl(TimeSpec::minutes(0)));

        let err = manager.generate_for(&user(), "broken").await.unwrap_err();
        assert!(err.to_string().contains("'ttl' option for 'broken' token"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_events_are_emitted() {
        let (manager, _) = manager();
        let events = InMemoryEventSink::new();
        let manager = manager.with_event_sink(events.clone());

        let token = manager.generate_for(&user(), "verify").await.unwrap();
        manager
            .use_for(&token.value, "verify", &user(), |_| async { Ok(true) })
            .await
            .unwrap();

        assert_eq!(events.get_events_by_kind(TokenEventKind::Created).len(), 1);
        assert_eq!(events.get_events_by_kind(TokenEventKind::Used).len(), 1);
    }

    #[tokio::test]
    async fn test_reap() {
        let (manager, store) = manager();
        let token = manager.generate_for(&user(), "verify").await.unwrap();
        manager
            .use_token(&token.value, "verify", |_| async { Ok(()) }, None)
            .await
            .unwrap();
        manager.generate_for(&user(), "verify").await.unwrap();

        assert_eq!(manager.reap().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }
}
