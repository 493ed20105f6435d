//! Token 模块
//!
//! 提供单一用途 token 的数据模型与类型定义。
//!
//! ## 子模块
//!
//! - **entity**: `Token` 记录、`OwnerRef` 所有者引用与 `Tokenable` trait
//! - **options**: 有效期、处理策略与限流等选项
//! - **types**: `TokenType` trait 与基于选项的实现
//! - **registry**: 按名称定义 token 类型的注册表与 JSON 配置
//!
//! ## 示例
//!
//! ```rust
//! use tokenrs::generator::GeneratorRegistry;
//! use tokenrs::token::{PreviousStrategy, TimeSpec, TokenOptions, TokenRegistry};
//!
//! let mut registry = TokenRegistry::new(GeneratorRegistry::with_defaults("APP_KEY"));
//! registry.define(
//!     "reset.password",
//!     TokenOptions::new()
//!         .with_ttl(TimeSpec::minutes(60))
//!         .with_previous(PreviousStrategy::Remove),
//! );
//!
//! let token_type = registry.resolve(&"reset.password".into()).unwrap();
//! assert_eq!(token_type.name(), "reset.password");
//! ```

pub mod entity;
pub mod options;
pub mod registry;
pub mod types;

pub use entity::{OwnerRef, Token, Tokenable};
pub use options::{PreviousStrategy, Throttle, TimeSpec, TokenOptions};
pub use registry::{DEFAULT_GENERATION_ATTEMPTS, TokenRegistry, TokensConfig};
pub use types::{OptionsToken, TokenType, TokenTypeRef};
