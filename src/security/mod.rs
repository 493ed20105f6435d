//! 安全防护模块
//!
//! ## 子模块
//!
//! - **rate_limit**: 尝试次数限制，防止 token 被批量生成或暴力猜测
//!
//! ## 速率限制示例
//!
//! ```rust
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! use tokenrs::security::rate_limit::RateLimiter;
//! use std::time::Duration;
//!
//! let limiter = RateLimiter::in_memory();
//! let key = "_tok:gen:verify:127.0.0.1";
//!
//! match limiter.attempt(key, 3, Duration::from_secs(600)).await {
//!     Ok(()) => println!("允许请求"),
//!     Err(e) => println!("请求被限制: {}", e),
//! }
//! # });
//! ```

pub mod rate_limit;

pub use rate_limit::{InMemoryRateLimitStore, RateLimitInfo, RateLimitStore, RateLimiter};
