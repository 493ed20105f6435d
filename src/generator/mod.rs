//! Token 生成器模块
//!
//! 生成器只负责产出候选 token 字符串，不保证唯一性；
//! 唯一性由 [`TokenManager`](crate::manager::TokenManager) 通过有限次重试保证。
//!
//! ## 内置生成器
//!
//! - **RandomHashGenerator**: 以应用密钥做 HMAC-SHA256 的随机哈希（64 个十六进制字符）
//! - **ShortCodeGenerator**: 从排除易混淆字符的字符池中生成短码
//! - **HashIdGenerator**: 由整数 ID 确定性编码（相同输入得到相同输出）
//!
//! ## 示例
//!
//! ```rust
//! use tokenrs::generator::{GeneratorRegistry, ShortCodeGenerator, TokenGenerator};
//!
//! let generator = ShortCodeGenerator::new(6).unwrap();
//! let code = generator.generate().unwrap();
//! assert_eq!(code.len(), 6);
//!
//! // 通过名称解析
//! let registry = GeneratorRegistry::with_defaults("app-key");
//! assert!(registry.get("random_hash").is_some());
//! assert!(registry.get("short_code").is_some());
//! ```

pub mod hash_id;
pub mod random_hash;
pub mod short_code;

use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

pub use hash_id::HashIdGenerator;
pub use random_hash::RandomHashGenerator;
pub use short_code::ShortCodeGenerator;

/// Token 生成器 trait
pub trait TokenGenerator: Send + Sync {
    /// 生成一个候选 token 字符串
    fn generate(&self) -> Result<String>;
}

impl<G: TokenGenerator + ?Sized> TokenGenerator for Arc<G> {
    fn generate(&self) -> Result<String> {
        (**self).generate()
    }
}

/// 生成器引用
///
/// 既可以直接持有生成器实例，也可以是在 [`GeneratorRegistry`] 中注册的名称。
/// 配置文件中只能使用名称形式。
#[derive(Clone)]
pub enum GeneratorRef {
    /// 注册名称
    Named(String),
    /// 生成器实例
    Instance(Arc<dyn TokenGenerator>),
}

impl GeneratorRef {
    /// 以注册名称引用
    pub fn named(name: impl Into<String>) -> Self {
        GeneratorRef::Named(name.into())
    }

    /// 以实例引用
    pub fn instance<G: TokenGenerator + 'static>(generator: G) -> Self {
        GeneratorRef::Instance(Arc::new(generator))
    }

    /// 解析为生成器实例
    ///
    /// 名称在注册表中不存在时返回 `None`。
    pub fn resolve(&self, registry: &GeneratorRegistry) -> Option<Arc<dyn TokenGenerator>> {
        match self {
            GeneratorRef::Named(name) => registry.get(name),
            GeneratorRef::Instance(generator) => Some(Arc::clone(generator)),
        }
    }
}

impl fmt::Debug for GeneratorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorRef::Named(name) => f.debug_tuple("Named").field(name).finish(),
            GeneratorRef::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

impl From<&str> for GeneratorRef {
    fn from(name: &str) -> Self {
        GeneratorRef::Named(name.to_string())
    }
}

impl From<String> for GeneratorRef {
    fn from(name: String) -> Self {
        GeneratorRef::Named(name)
    }
}

impl From<Arc<dyn TokenGenerator>> for GeneratorRef {
    fn from(generator: Arc<dyn TokenGenerator>) -> Self {
        GeneratorRef::Instance(generator)
    }
}

impl<'de> Deserialize<'de> for GeneratorRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(GeneratorRef::Named)
    }
}

/// 生成器注册表
///
/// 将工厂名称映射到生成器实例。
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    generators: HashMap<String, Arc<dyn TokenGenerator>>,
}

impl GeneratorRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建包含内置生成器的注册表
    ///
    /// - `random_hash`: 以 `app_key` 为密钥的 [`RandomHashGenerator`]
    /// - `short_code`: 默认配置的 [`ShortCodeGenerator`]
    pub fn with_defaults(app_key: impl Into<String>) -> Self {
        let mut registry = Self::new();
        registry.register("random_hash", RandomHashGenerator::new(app_key));
        registry.register("short_code", ShortCodeGenerator::default());
        registry
    }

    /// 注册生成器，同名生成器会被覆盖
    pub fn register<G: TokenGenerator + 'static>(&mut self, name: impl Into<String>, generator: G) {
        self.generators.insert(name.into(), Arc::new(generator));
    }

    /// 按名称获取生成器
    pub fn get(&self, name: &str) -> Option<Arc<dyn TokenGenerator>> {
        self.generators.get(name).cloned()
    }

    /// 按名称获取生成器，不存在时返回配置错误
    pub fn require(&self, token: &str, name: &str) -> Result<Arc<dyn TokenGenerator>> {
        self.get(name).ok_or_else(|| {
            Error::invalid_option(
                token,
                "generator",
                format!("generator '{}' is not registered", name),
            )
        })
    }

    /// 已注册的名称
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.generators.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("names", &self.names())
            .finish()
    }
}
