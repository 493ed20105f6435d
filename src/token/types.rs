//! Token 类型定义
//!
//! [`TokenType`] 描述一种 token 的全部行为：名称、生成方式、有效期、
//! 上一个 token 的处理策略和两侧的限流设置。
//!
//! 大多数场景下，token 类型通过 [`TokenRegistry`](super::TokenRegistry) 以名称定义，
//! 由 [`OptionsToken`] 根据合并后的选项实现；也可以直接实现 trait 临时传入。

use std::fmt;
use std::sync::Arc;

use super::options::{PreviousStrategy, Throttle, TimeSpec, TokenOptions};
use crate::error::{ConfigError, Error, Result};
use crate::generator::{GeneratorRef, GeneratorRegistry};

/// Token 类型 trait
///
/// 只有 `name` 和 `generate` 是必须实现的，其余方法的默认值与内置全局默认值一致。
///
/// ```rust
/// use tokenrs::token::{PreviousStrategy, TimeSpec, TokenType};
/// use tokenrs::Result;
///
/// struct InviteToken;
///
/// impl TokenType for InviteToken {
///     fn name(&self) -> &str {
///         "invite"
///     }
///
///     fn generate(&self) -> Result<String> {
///         Ok("INVITE-0001".to_string())
///     }
///
///     fn ttl(&self) -> Result<TimeSpec> {
///         Ok(TimeSpec::minutes(60 * 24 * 7))
///     }
///
///     fn previous_strategy(&self) -> Result<PreviousStrategy> {
///         Ok(PreviousStrategy::Keep)
///     }
/// }
///
/// let invite = InviteToken;
/// assert_eq!(invite.usage_limiter_key("10.0.0.1"), "_tok:use:invite:10.0.0.1");
/// ```
pub trait TokenType: Send + Sync {
    /// 类型名称
    fn name(&self) -> &str;

    /// 生成一个候选 token 值
    fn generate(&self) -> Result<String>;

    /// 有效期
    fn ttl(&self) -> Result<TimeSpec> {
        Ok(TimeSpec::Minutes(43200))
    }

    /// 上一个 token 的处理策略
    fn previous_strategy(&self) -> Result<PreviousStrategy> {
        Ok(PreviousStrategy::Remove)
    }

    /// 生成限流设置，`None` 表示不限流
    fn generation_throttle(&self) -> Option<Throttle> {
        Some(Throttle::new(3, TimeSpec::Minutes(10)))
    }

    /// 使用限流设置，`None` 表示不限流
    fn usage_throttle(&self) -> Option<Throttle> {
        Some(Throttle::new(5, TimeSpec::Minutes(10)))
    }

    /// 生成限流的 key
    fn generation_limiter_key(&self, requester: &str) -> String {
        format!("_tok:gen:{}:{}", self.name(), requester)
    }

    /// 使用限流的 key
    fn usage_limiter_key(&self, requester: &str) -> String {
        format!("_tok:use:{}:{}", self.name(), requester)
    }
}

/// 由选项驱动的 token 类型
///
/// 选项应当已经合并过全局默认值。
#[derive(Clone)]
pub struct OptionsToken {
    name: String,
    options: TokenOptions,
    generators: Arc<GeneratorRegistry>,
}

impl OptionsToken {
    /// 创建选项驱动的 token 类型
    pub fn new(
        name: impl Into<String>,
        options: TokenOptions,
        generators: Arc<GeneratorRegistry>,
    ) -> Self {
        Self {
            name: name.into(),
            options,
            generators,
        }
    }

    /// 合并后的选项
    pub fn options(&self) -> &TokenOptions {
        &self.options
    }

    fn missing(&self, option: &str) -> Error {
        Error::Config(ConfigError::MissingRequired(format!(
            "'{}' option for '{}' token",
            option, self.name
        )))
    }
}

impl TokenType for OptionsToken {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self) -> Result<String> {
        let generator = match &self.options.generator {
            Some(GeneratorRef::Named(factory)) => self.generators.require(&self.name, factory)?,
            Some(GeneratorRef::Instance(generator)) => Arc::clone(generator),
            None => return Err(self.missing("generator")),
        };
        generator.generate()
    }

    fn ttl(&self) -> Result<TimeSpec> {
        self.options.ttl.ok_or_else(|| self.missing("ttl"))
    }

    fn previous_strategy(&self) -> Result<PreviousStrategy> {
        let previous = self
            .options
            .previous
            .as_deref()
            .ok_or_else(|| self.missing("previous"))?;

        previous
            .parse()
            .map_err(|message: String| Error::invalid_option(&self.name, "previous", message))
    }

    fn generation_throttle(&self) -> Option<Throttle> {
        if !self.options.generation_throttling.unwrap_or(true) {
            return None;
        }
        Some(Throttle::new(
            self.options.generation_attempts.unwrap_or(3),
            self.options
                .generation_attempts_interval
                .unwrap_or(TimeSpec::Minutes(10)),
        ))
    }

    fn usage_throttle(&self) -> Option<Throttle> {
        if !self.options.usage_throttling.unwrap_or(true) {
            return None;
        }
        Some(Throttle::new(
            self.options.usage_attempts.unwrap_or(5),
            self.options
                .usage_attempts_interval
                .unwrap_or(TimeSpec::Minutes(10)),
        ))
    }
}

impl fmt::Debug for OptionsToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionsToken")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish()
    }
}

/// Token 类型引用
///
/// 既可以是已定义的类型名称，也可以是临时传入的自定义类型。
#[derive(Clone)]
pub enum TokenTypeRef {
    /// 在注册表中定义的名称
    Named(String),
    /// 自定义类型实例
    Custom(Arc<dyn TokenType>),
}

impl TokenTypeRef {
    /// 以自定义类型创建引用
    pub fn custom<T: TokenType + 'static>(token_type: T) -> Self {
        TokenTypeRef::Custom(Arc::new(token_type))
    }
}

impl fmt::Debug for TokenTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenTypeRef::Named(name) => f.debug_tuple("Named").field(name).finish(),
            TokenTypeRef::Custom(token_type) => {
                f.debug_tuple("Custom").field(&token_type.name()).finish()
            }
        }
    }
}

impl From<&str> for TokenTypeRef {
    fn from(name: &str) -> Self {
        TokenTypeRef::Named(name.to_string())
    }
}

impl From<String> for TokenTypeRef {
    fn from(name: String) -> Self {
        TokenTypeRef::Named(name)
    }
}

impl From<&String> for TokenTypeRef {
    fn from(name: &String) -> Self {
        TokenTypeRef::Named(name.clone())
    }
}

impl From<Arc<dyn TokenType>> for TokenTypeRef {
    fn from(token_type: Arc<dyn TokenType>) -> Self {
        TokenTypeRef::Custom(token_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::TokenGenerator;

    struct Fixed;

    impl TokenGenerator for Fixed {
        fn generate(&self) -> Result<String> {
            Ok("FIXED".to_string())
        }
    }

    fn options_token(options: TokenOptions) -> OptionsToken {
        let mut generators = GeneratorRegistry::new();
        generators.register("fixed", Fixed);
        OptionsToken::new(
            "verify",
            options.merge_over(&TokenOptions::defaults().with_generator("fixed")),
            Arc::new(generators),
        )
    }

    #[test]
    fn test_defaults() {
        let token_type = options_token(TokenOptions::new());

        assert_eq!(token_type.name(), "verify");
        assert_eq!(token_type.generate().unwrap(), "FIXED");
        assert_eq!(token_type.ttl().unwrap(), TimeSpec::Minutes(43200));
        assert_eq!(
            token_type.previous_strategy().unwrap(),
            PreviousStrategy::Remove
        );
        assert_eq!(
            token_type.generation_throttle(),
            Some(Throttle::new(3, TimeSpec::Minutes(10)))
        );
        assert_eq!(
            token_type.usage_throttle(),
            Some(Throttle::new(5, TimeSpec::Minutes(10)))
        );
    }

    #[test]
    fn test_disabled_throttling() {
        let token_type = options_token(
            TokenOptions::new()
                .with_generation_throttling(false)
                .with_usage_throttling(false),
        );
        assert!(token_type.generation_throttle().is_none());
        assert!(token_type.usage_throttle().is_none());
    }

    #[test]
    fn test_invalid_previous_names_token() {
        let token_type = options_token(TokenOptions::new().with_previous_str("replace"));
        let err = token_type.previous_strategy().unwrap_err();
        assert!(err.to_string().contains("'previous' option for 'verify' token"));
    }

    #[test]
    fn test_unregistered_generator() {
        let token_type = options_token(TokenOptions::new().with_generator("missing"));
        assert!(matches!(token_type.generate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_generator_instance() {
        let token_type =
            options_token(TokenOptions::new().with_generator(GeneratorRef::instance(Fixed)));
        assert_eq!(token_type.generate().unwrap(), "FIXED");
    }

    #[test]
    fn test_limiter_keys() {
        let token_type = options_token(TokenOptions::new());
        assert_eq!(
            token_type.generation_limiter_key("unknown"),
            "_tok:gen:verify:unknown"
        );
        assert_eq!(
            token_type.usage_limiter_key("127.0.0.1"),
            "_tok:use:verify:127.0.0.1"
        );
    }

    #[test]
    fn test_type_ref_from_name() {
        let reference: TokenTypeRef = "verify".into();
        assert!(matches!(reference, TokenTypeRef::Named(name) if name == "verify"));
    }
}
