//! 统一错误类型模块
//!
//! 提供 tokenrs 库中所有操作的错误类型定义。
//!
//! Token 生命周期中的每一种失败都是独立、可匹配的变体：
//! 配置错误、锁定（限流）、未找到、已过期、已使用、归属不符、
//! 无效 Token 值以及唯一值生成失败。

use chrono::{DateTime, Utc};
use std::fmt;

use crate::token::{OwnerRef, Token};

/// tokenrs 库的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// tokenrs 库的错误类型
#[derive(Debug)]
pub enum Error {
    /// Token 生命周期错误
    Token(TokenError),

    /// 配置错误
    Config(ConfigError),

    /// 存储错误
    Storage(StorageError),

    /// 加密错误
    Crypto(CryptoError),

    /// 尝试次数超出，在 `unlock_at` 之前拒绝新的尝试
    Lockout {
        /// 解锁时间
        unlock_at: DateTime<Utc>,
    },

    /// 内部错误
    Internal(String),

    /// 其他错误（例如回调返回的业务错误）
    Other(String),
}

impl Error {
    /// 创建一个内部错误
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// 创建一个锁定错误
    pub fn lockout(unlock_at: DateTime<Utc>) -> Self {
        Error::Lockout { unlock_at }
    }

    /// 创建一个 token 选项配置错误
    pub fn invalid_option(
        token: impl Into<String>,
        option: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Config(ConfigError::InvalidOption {
            token: token.into(),
            option: option.into(),
            message: message.into(),
        })
    }

    /// 是否为锁定错误
    pub fn is_lockout(&self) -> bool {
        matches!(self, Error::Lockout { .. })
    }

    /// 锁定错误的解锁时间
    pub fn unlock_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Error::Lockout { unlock_at } => Some(*unlock_at),
            _ => None,
        }
    }

    /// 内部的 token 错误（如果有）
    pub fn token_error(&self) -> Option<&TokenError> {
        match self {
            Error::Token(e) => Some(e),
            _ => None,
        }
    }
}

/// Token 生命周期相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token 值为空或过长
    Invalid(String),
    /// 没有匹配的存活记录
    NotFound {
        /// token 类型名称
        name: String,
    },
    /// Token 已过期
    Expired(Box<Token>),
    /// Token 已被使用
    AlreadyUsed(Box<Token>),
    /// Token 属于另一个所有者，携带调用方期望的所有者
    AccessDenied {
        /// 期望的所有者
        expected: OwnerRef,
    },
    /// 尝试次数用尽仍无法生成唯一的 token 值
    GenerationExhausted {
        /// token 类型名称
        name: String,
    },
}

impl TokenError {
    /// 错误关联的 token 记录（仅 Expired / AlreadyUsed）
    pub fn token(&self) -> Option<&Token> {
        match self {
            TokenError::Expired(token) | TokenError::AlreadyUsed(token) => Some(token),
            _ => None,
        }
    }
}

/// 配置相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 未定义的 token 类型
    UndefinedToken(String),
    /// token 类型的某个选项无效
    InvalidOption {
        token: String,
        option: String,
        message: String,
    },
    /// 缺少必需的配置
    MissingRequired(String),
    /// 无效的配置值
    InvalidValue { key: String, message: String },
}

/// 存储相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// 记录未找到
    NotFound(String),
    /// 操作失败
    OperationFailed(String),
}

/// 加密相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// 密钥无效
    InvalidKey(String),
}

// ============================================================================
// Display 实现
// ============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Token(e) => write!(f, "Token error: {}", e),
            Error::Config(e) => write!(f, "Config error: {}", e),
            Error::Storage(e) => write!(f, "Storage error: {}", e),
            Error::Crypto(e) => write!(f, "Crypto error: {}", e),
            Error::Lockout { unlock_at } => write!(
                f,
                "Too many attempts, please wait until {} before retrying",
                unlock_at.to_rfc3339()
            ),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Invalid(msg) => write!(f, "invalid token: {}", msg),
            TokenError::NotFound { name } => write!(f, "token of type '{}' is not found", name),
            TokenError::Expired(token) => write!(
                f,
                "token #{} has expired at {}",
                token.id,
                token.expires_at.to_rfc3339()
            ),
            TokenError::AlreadyUsed(token) => write!(f, "token #{} is already used", token.id),
            TokenError::AccessDenied { .. } => write!(f, "the token belongs to another owner"),
            TokenError::GenerationExhausted { name } => {
                write!(f, "cannot generate a unique token for '{}' type", name)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UndefinedToken(name) => write!(f, "token '{}' is not defined", name),
            ConfigError::InvalidOption {
                token,
                option,
                message,
            } => write!(
                f,
                "invalid '{}' option for '{}' token: {}",
                option, token, message
            ),
            ConfigError::MissingRequired(key) => {
                write!(f, "missing required configuration: {}", key)
            }
            ConfigError::InvalidValue { key, message } => {
                write!(f, "invalid configuration value for '{}': {}", key, message)
            }
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(item) => write!(f, "not found: {}", item),
            StorageError::OperationFailed(msg) => write!(f, "storage operation failed: {}", msg),
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidKey(msg) => write!(f, "invalid key: {}", msg),
        }
    }
}

// ============================================================================
// std::error::Error 实现
// ============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Token(e) => Some(e),
            Error::Config(e) => Some(e),
            Error::Storage(e) => Some(e),
            Error::Crypto(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for TokenError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}
impl std::error::Error for CryptoError {}

// ============================================================================
// From 实现 - 方便错误转换
// ============================================================================

impl From<TokenError> for Error {
    fn from(err: TokenError) -> Self {
        Error::Token(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        Error::Crypto(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(ConfigError::InvalidValue {
            key: "tokens".to_string(),
            message: err.to_string(),
        })
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = Error::Config(ConfigError::UndefinedToken("reset.password".to_string()));
        assert_eq!(
            err.to_string(),
            "Config error: token 'reset.password' is not defined"
        );
    }

    #[test]
    fn test_invalid_option_names_token() {
        let err = Error::invalid_option("verify", "previous", "unknown strategy 'replace'");
        assert_eq!(
            err.to_string(),
            "Config error: invalid 'previous' option for 'verify' token: unknown strategy 'replace'"
        );
    }

    #[test]
    fn test_lockout_accessors() {
        let unlock_at = Utc::now();
        let err = Error::lockout(unlock_at);
        assert!(err.is_lockout());
        assert_eq!(err.unlock_at(), Some(unlock_at));

        let other: Error = "callback failed".into();
        assert!(!other.is_lockout());
        assert_eq!(other.unlock_at(), None);
    }

    #[test]
    fn test_token_error_display() {
        let err = TokenError::GenerationExhausted {
            name: "verify".to_string(),
        };
        assert_eq!(err.to_string(), "cannot generate a unique token for 'verify' type");

        let err: Error = TokenError::NotFound {
            name: "verify".to_string(),
        }
        .into();
        assert!(matches!(
            err.token_error(),
            Some(TokenError::NotFound { .. })
        ));
    }
}
