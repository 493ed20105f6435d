//! Token 类型注册表与配置
//!
//! 注册表保存全局默认选项和按名称定义的 token 类型；
//! 解析名称时，类型选项逐键覆盖在默认选项之上。

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::options::TokenOptions;
use super::types::{OptionsToken, TokenType, TokenTypeRef};
use crate::error::{ConfigError, Error, Result};
use crate::generator::GeneratorRegistry;

/// 默认的唯一值生成尝试次数
pub const DEFAULT_GENERATION_ATTEMPTS: usize = 10;

fn default_generation_attempts() -> usize {
    DEFAULT_GENERATION_ATTEMPTS
}

/// Token 配置
///
/// 从 JSON 加载，所有字段都有默认值：
///
/// ```rust
/// use tokenrs::token::{TimeSpec, TokensConfig};
///
/// let config = TokensConfig::from_json(r#"{
///     "defaults": { "usage_attempts": 3 },
///     "define": {
///         "reset.password": { "ttl": 60, "previous": "reuse" },
///         "verify": { "generator": "short_code" }
///     }
/// }"#).unwrap();
///
/// assert_eq!(config.generation_attempts, 10);
/// assert_eq!(config.define["reset.password"].ttl, Some(TimeSpec::Minutes(60)));
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct TokensConfig {
    /// 全局默认选项（覆盖在内置默认值之上）
    #[serde(default)]
    pub defaults: TokenOptions,

    /// 按名称定义的 token 类型
    #[serde(default)]
    pub define: HashMap<String, TokenOptions>,

    /// 生成唯一 token 值时的最大尝试次数
    #[serde(default = "default_generation_attempts")]
    pub generation_attempts: usize,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            defaults: TokenOptions::default(),
            define: HashMap::new(),
            generation_attempts: DEFAULT_GENERATION_ATTEMPTS,
        }
    }
}

impl TokensConfig {
    /// 从 JSON 字符串加载配置
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TokensConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.generation_attempts == 0 {
            return Err(Error::Config(ConfigError::InvalidValue {
                key: "generation_attempts".to_string(),
                message: "must be at least 1".to_string(),
            }));
        }
        Ok(())
    }

    /// 以给定的生成器注册表构建 token 类型注册表
    pub fn into_registry(self, generators: GeneratorRegistry) -> TokenRegistry {
        let mut registry = TokenRegistry::new(generators).with_defaults(self.defaults);
        for (name, options) in self.define {
            registry.define(name, options);
        }
        registry
    }
}

/// Token 类型注册表
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    defaults: TokenOptions,
    defined: HashMap<String, TokenOptions>,
    generators: Arc<GeneratorRegistry>,
}

impl TokenRegistry {
    /// 使用内置默认选项创建注册表
    pub fn new(generators: GeneratorRegistry) -> Self {
        Self {
            defaults: TokenOptions::defaults(),
            defined: HashMap::new(),
            generators: Arc::new(generators),
        }
    }

    /// 覆盖全局默认选项（未设置的字段仍使用内置默认值）
    pub fn with_defaults(mut self, defaults: TokenOptions) -> Self {
        self.defaults = defaults.merge_over(&TokenOptions::defaults());
        self
    }

    /// 定义 token 类型，同名定义会被覆盖
    pub fn define(&mut self, name: impl Into<String>, options: TokenOptions) {
        let name = name.into();
        debug!(token = %name, "Token type defined");
        self.defined.insert(name, options);
    }

    /// 是否已定义
    pub fn is_defined(&self, name: &str) -> bool {
        self.defined.contains_key(name)
    }

    /// 已定义的类型名称
    pub fn defined(&self) -> Vec<String> {
        let mut names: Vec<String> = self.defined.keys().cloned().collect();
        names.sort();
        names
    }

    /// 全局默认选项
    pub fn defaults(&self) -> &TokenOptions {
        &self.defaults
    }

    /// 生成器注册表
    pub fn generators(&self) -> &GeneratorRegistry {
        &self.generators
    }

    /// 解析 token 类型
    ///
    /// 自定义类型原样返回；名称未定义时返回配置错误。
    pub fn resolve(&self, token_type: &TokenTypeRef) -> Result<Arc<dyn TokenType>> {
        match token_type {
            TokenTypeRef::Custom(custom) => Ok(Arc::clone(custom)),
            TokenTypeRef::Named(name) => {
                let options = self
                    .defined
                    .get(name)
                    .ok_or_else(|| Error::Config(ConfigError::UndefinedToken(name.clone())))?;

                Ok(Arc::new(OptionsToken::new(
                    name.clone(),
                    options.merge_over(&self.defaults),
                    Arc::clone(&self.generators),
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{PreviousStrategy, TimeSpec};

    fn registry() -> TokenRegistry {
        TokenRegistry::new(GeneratorRegistry::with_defaults("APP_KEY"))
    }

    #[test]
    fn test_undefined_token() {
        let err = registry().resolve(&"missing".into()).err().unwrap();
        assert_eq!(err.to_string(), "Config error: token 'missing' is not defined");
    }

    #[test]
    fn test_resolve_merges_defaults() {
        let mut registry = registry();
        registry.define(
            "verify",
            TokenOptions::new()
                .with_ttl(TimeSpec::minutes(15))
                .with_previous(PreviousStrategy::Reuse),
        );

        let token_type = registry.resolve(&"verify".into()).unwrap();
        assert_eq!(token_type.name(), "verify");
        assert_eq!(token_type.ttl().unwrap(), TimeSpec::Minutes(15));
        assert_eq!(
            token_type.previous_strategy().unwrap(),
            PreviousStrategy::Reuse
        );
        assert_eq!(token_type.generate().unwrap().len(), 64);
    }

    #[test]
    fn test_custom_defaults() {
        let mut registry =
            registry().with_defaults(TokenOptions::new().with_generator("short_code"));
        registry.define("verify", TokenOptions::new());

        let token_type = registry.resolve(&"verify".into()).unwrap();
        assert_eq!(token_type.generate().unwrap().len(), 8);
        assert_eq!(token_type.ttl().unwrap(), TimeSpec::Minutes(43200));
    }

    #[test]
    fn test_config_from_json() {
        let config = TokensConfig::from_json(
            r#"{
                "generation_attempts": 4,
                "define": {
                    "verify": { "usage_throttling": false, "generation_attempts_interval": { "seconds": 30 } }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.generation_attempts, 4);

        let registry = config.into_registry(GeneratorRegistry::with_defaults("APP_KEY"));
        assert_eq!(registry.defined(), vec!["verify"]);

        let token_type = registry.resolve(&"verify".into()).unwrap();
        assert!(token_type.usage_throttle().is_none());
        assert_eq!(
            token_type.generation_throttle().unwrap().interval,
            TimeSpec::Duration(chrono::Duration::seconds(30))
        );
    }

    #[test]
    fn test_config_rejects_zero_attempts() {
        assert!(TokensConfig::from_json(r#"{ "generation_attempts": 0 }"#).is_err());
        assert!(TokensConfig::from_json("not json").is_err());
    }
}
