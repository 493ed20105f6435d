//! 随机哈希生成器
//!
//! 以应用密钥对 40 个随机字母数字字符做 HMAC-SHA256，
//! 输出 64 个十六进制字符，适合作为密码重置、邮箱验证等链接中的 token。

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::TokenGenerator;
use crate::error::{CryptoError, Error, Result};
use crate::random::{generate_random_alphanumeric, hex_encode};

/// 参与哈希的随机字符数
const RANDOM_LENGTH: usize = 40;

/// 随机哈希生成器
///
/// ```rust
/// use tokenrs::generator::{RandomHashGenerator, TokenGenerator};
///
/// let generator = RandomHashGenerator::new("APP_KEY");
/// let token = generator.generate().unwrap();
/// assert_eq!(token.len(), 64);
/// ```
#[derive(Clone)]
pub struct RandomHashGenerator {
    key: Vec<u8>,
}

impl RandomHashGenerator {
    /// 使用应用密钥创建生成器
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into().into_bytes(),
        }
    }
}

impl std::fmt::Debug for RandomHashGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomHashGenerator")
            .field("key", &"<redacted>")
            .finish()
    }
}

impl TokenGenerator for RandomHashGenerator {
    fn generate(&self) -> Result<String> {
        if self.key.is_empty() {
            return Err(Error::Crypto(CryptoError::InvalidKey(
                "application key must not be empty".to_string(),
            )));
        }

        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key)
            .map_err(|_| Error::Crypto(CryptoError::InvalidKey("invalid hmac key".to_string())))?;
        mac.update(generate_random_alphanumeric(RANDOM_LENGTH).as_bytes());

        Ok(hex_encode(&mac.finalize().into_bytes()))
    }
}
