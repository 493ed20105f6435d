//! 短码生成器
//!
//! 从固定字符池中随机选取字符，默认字符池排除了容易混淆的 0, O, 1, I。

use super::TokenGenerator;
use crate::error::{ConfigError, Error, Result};
use crate::random::generate_from_pool;

/// 默认字符池
pub const DEFAULT_POOL: &str = "23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// 默认长度
pub const DEFAULT_LENGTH: usize = 8;

/// 短码生成器
#[derive(Debug, Clone)]
pub struct ShortCodeGenerator {
    length: usize,
    pool: Vec<char>,
}

impl Default for ShortCodeGenerator {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
            pool: DEFAULT_POOL.chars().collect(),
        }
    }
}

impl ShortCodeGenerator {
    /// 使用默认字符池创建指定长度的生成器
    pub fn new(length: usize) -> Result<Self> {
        Self::with_pool(length, DEFAULT_POOL)
    }

    /// 使用自定义字符池创建生成器
    pub fn with_pool(length: usize, pool: &str) -> Result<Self> {
        if length == 0 {
            return Err(Error::Config(ConfigError::InvalidValue {
                key: "length".to_string(),
                message: "short code length must be positive".to_string(),
            }));
        }
        if pool.is_empty() {
            return Err(Error::Config(ConfigError::InvalidValue {
                key: "pool".to_string(),
                message: "short code pool must not be empty".to_string(),
            }));
        }

        Ok(Self {
            length,
            pool: pool.chars().collect(),
        })
    }

    /// 短码长度
    pub fn length(&self) -> usize {
        self.length
    }
}

impl TokenGenerator for ShortCodeGenerator {
    fn generate(&self) -> Result<String> {
        Ok(generate_from_pool(&self.pool, self.length))
    }
}
