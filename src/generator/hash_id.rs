//! 基于 ID 的确定性生成器
//!
//! 使用 Hashids 算法（`harsh`）对整数 ID 编码，并填充到最小长度。
//! 相同的 `(id, salt, min_length)` 总是得到相同的输出，
//! 适用于幂等的单一用途链接（例如为某条记录固定生成的确认链接）。

use harsh::Harsh;

use super::TokenGenerator;
use crate::error::{ConfigError, Result};

/// 基于 ID 的确定性生成器
///
/// ```rust
/// use tokenrs::generator::{HashIdGenerator, TokenGenerator};
///
/// let generator = HashIdGenerator::new(42, "user", 6);
/// let first = generator.generate().unwrap();
/// let second = generator.generate().unwrap();
/// assert_eq!(first, second);
/// assert_eq!(first.len(), 6);
/// ```
#[derive(Debug, Clone)]
pub struct HashIdGenerator {
    id: u64,
    salt: String,
    min_length: usize,
}

impl HashIdGenerator {
    /// 创建生成器
    pub fn new(id: u64, salt: impl Into<String>, min_length: usize) -> Self {
        Self {
            id,
            salt: salt.into(),
            min_length,
        }
    }

    /// 使用默认最小长度 6 创建生成器
    pub fn with_default_length(id: u64, salt: impl Into<String>) -> Self {
        Self::new(id, salt, 6)
    }
}

impl TokenGenerator for HashIdGenerator {
    fn generate(&self) -> Result<String> {
        let hashids = Harsh::builder()
            .salt(self.salt.as_str())
            .length(self.min_length)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "hash_id".to_string(),
                message: e.to_string(),
            })?;

        Ok(hashids.encode(&[self.id]))
    }
}
