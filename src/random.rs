//! 安全随机数生成模块
//!
//! 为 token 生成器提供字母数字串、固定字符池采样以及十六进制编码等基础能力。

use rand::{Rng, distr::Alphanumeric};

/// 生成指定长度的字母数字随机字符串
///
/// 只包含 a-z, A-Z, 0-9 字符
///
/// # Example
///
/// ```rust
/// use tokenrs::random::generate_random_alphanumeric;
///
/// let token = generate_random_alphanumeric(40);
/// assert_eq!(token.len(), 40);
/// assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
pub fn generate_random_alphanumeric(length: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// 从给定字符池中随机采样指定数量的字符
///
/// 字符池为空时返回空字符串。
pub fn generate_from_pool(pool: &[char], length: usize) -> String {
    if pool.is_empty() {
        return String::new();
    }

    let mut rng = rand::rng();
    (0..length)
        .map(|_| pool[rng.random_range(0..pool.len())])
        .collect()
}

/// 将字节数组编码为十六进制字符串
pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_random_alphanumeric() {
        let token = generate_random_alphanumeric(24);
        assert_eq!(token.len(), 24);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_from_pool() {
        let pool: Vec<char> = "AB".chars().collect();
        let code = generate_from_pool(&pool, 16);
        assert_eq!(code.len(), 16);
        assert!(code.chars().all(|c| c == 'A' || c == 'B'));

        assert_eq!(generate_from_pool(&[], 8), "");
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0x00, 0xff, 0x10]), "00ff10");
        assert_eq!(hex_encode(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
    }
}
