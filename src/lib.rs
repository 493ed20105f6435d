//! # TokenRS
//!
//! 单一用途操作 token 的生命周期引擎。
//!
//! 典型场景：邮箱验证、密码重置、邀请确认等"生成一次、通过邮件发送、使用一次"的 token。
//!
//! ## 功能特性
//!
//! - **Token 类型**: 按名称定义有效期、生成器和限流设置，或直接实现 `TokenType`
//! - **生成器**: 随机哈希、排除易混淆字符的短码、由 ID 确定性编码的 hash id
//! - **上一个 token 的处理策略**: remove / reuse / keep
//! - **速率限制**: 生成与使用两侧独立的固定窗口限流
//! - **可插拔存储**: `TokenStore` 与 `RateLimitStore` trait，附带内存实现
//! - **事件通知**: token 创建和使用后通知 `TokenEventSink`
//! - **维护**: 永久删除已过期、已使用和已软删除的记录
//!
//! ## 快速开始
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use tokenrs::{
//!     GeneratorRegistry, InMemoryTokenStore, OwnerRef, TimeSpec, TokenManager, TokenOptions,
//!     TokenRegistry,
//! };
//!
//! let mut registry = TokenRegistry::new(GeneratorRegistry::with_defaults("APP_KEY"));
//! registry.define(
//!     "reset.password",
//!     TokenOptions::new()
//!         .with_ttl(TimeSpec::minutes(60))
//!         .with_generator("short_code"),
//! );
//!
//! let manager = TokenManager::new(InMemoryTokenStore::new(), registry);
//! let user = OwnerRef::new("user", "42");
//!
//! let token = manager.generate_for(&user, "reset.password").await.unwrap();
//! assert_eq!(token.value.len(), 8);
//!
//! manager
//!     .use_for(&token.value, "reset.password", &user, |owner| async move {
//!         // 在这里修改 owner 的密码
//!         let _ = owner;
//!         Ok(())
//!     })
//!     .await
//!     .unwrap();
//! # });
//! ```
//!
//! ## 从配置加载
//!
//! ```rust
//! use tokenrs::{GeneratorRegistry, InMemoryTokenStore, TokenManager, TokensConfig};
//!
//! let config = TokensConfig::from_json(r#"{
//!     "defaults": { "previous": "reuse" },
//!     "define": { "verify": { "ttl": 1440, "usage_attempts": 3 } }
//! }"#).unwrap();
//!
//! let manager = TokenManager::from_config(
//!     config,
//!     GeneratorRegistry::with_defaults("APP_KEY"),
//!     InMemoryTokenStore::new(),
//! )
//! .unwrap();
//! assert!(manager.registry().is_defined("verify"));
//! ```
//!
//! ## 日志
//!
//! 库通过 `tracing` 输出日志，不安装任何 subscriber。

pub mod error;
pub mod events;
pub mod generator;
pub mod maintenance;
pub mod manager;
pub mod random;
pub mod security;
pub mod store;
pub mod token;

pub use error::{ConfigError, CryptoError, Error, Result, StorageError, TokenError};

// ============================================================================
// Token 相关导出
// ============================================================================

pub use token::{
    OptionsToken, OwnerRef, PreviousStrategy, Throttle, TimeSpec, Token, TokenOptions,
    TokenRegistry, TokenType, TokenTypeRef, Tokenable, TokensConfig,
};

// ============================================================================
// 生成器导出
// ============================================================================

pub use generator::{
    GeneratorRef, GeneratorRegistry, HashIdGenerator, RandomHashGenerator, ShortCodeGenerator,
    TokenGenerator,
};

// ============================================================================
// 管理器与存储导出
// ============================================================================

pub use events::{
    InMemoryEventSink, NoOpEventSink, TokenEvent, TokenEventKind, TokenEventSink,
    TracingEventSink,
};
pub use maintenance::{ClearDeadTokens, ReapReport};
pub use manager::{OwnerRefResolver, OwnerResolver, RequestScope, TokenManager, UseOutcome};
pub use security::rate_limit::{InMemoryRateLimitStore, RateLimitInfo, RateLimitStore, RateLimiter};
pub use store::{InMemoryTokenStore, QueryScope, TokenStore};

// ============================================================================
// 随机数生成函数导出
// ============================================================================

pub use random::{generate_from_pool, generate_random_alphanumeric};
