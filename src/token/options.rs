//! Token 类型选项
//!
//! 包含时间规格 `TimeSpec`、上一个 token 的处理策略 `PreviousStrategy`、
//! 限流设置 `Throttle` 以及可被合并的 `TokenOptions`。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::generator::GeneratorRef;

// ============================================================================
// 时间规格
// ============================================================================

/// 时间规格
///
/// 用于 `ttl` 和限流窗口，支持三种形式：
///
/// - 时长：在当前时间上累加
/// - 分钟数：正整数，在当前时间上累加
/// - 绝对时间：必须严格晚于当前时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSpec {
    /// 时长
    Duration(Duration),
    /// 分钟数
    Minutes(i64),
    /// 绝对时间
    At(DateTime<Utc>),
}

impl TimeSpec {
    /// 以时长创建
    pub fn duration(duration: Duration) -> Self {
        TimeSpec::Duration(duration)
    }

    /// 以分钟数创建
    pub fn minutes(minutes: i64) -> Self {
        TimeSpec::Minutes(minutes)
    }

    /// 以绝对时间创建
    pub fn at(at: DateTime<Utc>) -> Self {
        TimeSpec::At(at)
    }

    /// 以 `now` 为起点解析为绝对时间
    ///
    /// 时长与分钟数必须为正，绝对时间必须晚于 `now`，否则返回 `None`。
    pub fn resolve_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            TimeSpec::Duration(duration) if duration > Duration::zero() => {
                now.checked_add_signed(duration)
            }
            TimeSpec::Minutes(minutes) if minutes > 0 => {
                now.checked_add_signed(Duration::try_minutes(minutes)?)
            }
            TimeSpec::At(at) if at > now => Some(at),
            _ => None,
        }
    }

    /// 以 `now` 为起点解析为时间窗口长度
    pub fn window_from(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        let until = self.resolve_from(now)?;
        (until - now).to_std().ok()
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeSpec::Duration(d) => write!(f, "{}s", d.num_seconds()),
            TimeSpec::Minutes(m) => write!(f, "{}min", m),
            TimeSpec::At(at) => write!(f, "{}", at.to_rfc3339()),
        }
    }
}

/// `TimeSpec` 在配置文件中的表示
///
/// 整数表示分钟，RFC 3339 字符串表示绝对时间，`{ "seconds": n }` 表示时长。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum TimeSpecRepr {
    Minutes(i64),
    At(DateTime<Utc>),
    Duration { seconds: i64 },
}

impl Serialize for TimeSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let repr = match *self {
            TimeSpec::Minutes(m) => TimeSpecRepr::Minutes(m),
            TimeSpec::At(at) => TimeSpecRepr::At(at),
            TimeSpec::Duration(d) => TimeSpecRepr::Duration {
                seconds: d.num_seconds(),
            },
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TimeSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match TimeSpecRepr::deserialize(deserializer)? {
            TimeSpecRepr::Minutes(m) => Ok(TimeSpec::Minutes(m)),
            TimeSpecRepr::At(at) => Ok(TimeSpec::At(at)),
            TimeSpecRepr::Duration { seconds } => Duration::try_seconds(seconds)
                .map(TimeSpec::Duration)
                .ok_or_else(|| serde::de::Error::custom("duration out of range")),
        }
    }
}

// ============================================================================
// 上一个 token 的处理策略
// ============================================================================

/// 为同一所有者再次生成同类型 token 时，对已有活跃 token 的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviousStrategy {
    /// 软删除已有活跃 token，并创建新 token
    Remove,
    /// 延长已有活跃 token 的有效期并返回它
    Reuse,
    /// 不处理已有 token，总是创建新 token
    Keep,
}

impl PreviousStrategy {
    /// 配置中的名称
    pub fn as_str(&self) -> &'static str {
        match self {
            PreviousStrategy::Remove => "remove",
            PreviousStrategy::Reuse => "reuse",
            PreviousStrategy::Keep => "keep",
        }
    }
}

impl fmt::Display for PreviousStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreviousStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "remove" => Ok(PreviousStrategy::Remove),
            "reuse" => Ok(PreviousStrategy::Reuse),
            "keep" => Ok(PreviousStrategy::Keep),
            other => Err(format!(
                "unknown strategy '{}', expected one of remove, reuse, keep",
                other
            )),
        }
    }
}

// ============================================================================
// 限流设置
// ============================================================================

/// 一侧（生成或使用）的限流设置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    /// 窗口内允许的最大尝试次数（必须 >= 1，在限流操作发生时校验）
    pub attempts: i64,
    /// 限流窗口
    pub interval: TimeSpec,
}

impl Throttle {
    /// 创建限流设置
    pub fn new(attempts: i64, interval: TimeSpec) -> Self {
        Self { attempts, interval }
    }

    /// 校验并返回最大尝试次数
    pub fn max_attempts(&self, token: &str, option: &str) -> Result<u32> {
        if self.attempts < 1 {
            return Err(Error::invalid_option(
                token,
                option,
                "throttle attempts option should be equal to at least 1",
            ));
        }
        u32::try_from(self.attempts)
            .map_err(|_| Error::invalid_option(token, option, "throttle attempts is too large"))
    }

    /// 以当前时间解析限流窗口
    pub fn window(&self, token: &str, option: &str) -> Result<std::time::Duration> {
        self.interval.window_from(Utc::now()).ok_or_else(|| {
            Error::invalid_option(
                token,
                option,
                format!("provide a correct date interval, got {}", self.interval),
            )
        })
    }
}

// ============================================================================
// Token 选项
// ============================================================================

/// Token 类型选项
///
/// 所有字段都是可选的，未设置的字段在解析时由全局默认值补齐。
/// 合并是逐键覆盖，不做深度合并。
///
/// ## 示例
///
/// ```rust
/// use tokenrs::token::{PreviousStrategy, TimeSpec, TokenOptions};
///
/// let options = TokenOptions::new()
///     .with_ttl(TimeSpec::minutes(60))
///     .with_previous(PreviousStrategy::Remove)
///     .with_usage_attempts(3);
///
/// let merged = options.merge_over(&TokenOptions::defaults());
/// assert_eq!(merged.usage_attempts, Some(3));
/// assert_eq!(merged.generation_attempts, Some(3));
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenOptions {
    /// Token 有效期
    #[serde(default)]
    pub ttl: Option<TimeSpec>,

    /// 上一个 token 的处理策略（remove / reuse / keep）
    #[serde(default)]
    pub previous: Option<String>,

    /// 是否启用生成限流
    #[serde(default)]
    pub generation_throttling: Option<bool>,

    /// 生成限流的最大尝试次数
    #[serde(default)]
    pub generation_attempts: Option<i64>,

    /// 生成限流的窗口
    #[serde(default)]
    pub generation_attempts_interval: Option<TimeSpec>,

    /// 是否启用使用限流
    #[serde(default)]
    pub usage_throttling: Option<bool>,

    /// 使用限流的最大尝试次数
    #[serde(default)]
    pub usage_attempts: Option<i64>,

    /// 使用限流的窗口
    #[serde(default)]
    pub usage_attempts_interval: Option<TimeSpec>,

    /// 生成器（实例或注册名称）
    #[serde(default)]
    pub generator: Option<GeneratorRef>,
}

impl TokenOptions {
    /// 创建空选项
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置的全局默认值
    ///
    /// - ttl: 43200 分钟（30 天）
    /// - previous: remove
    /// - 生成限流：开启，10 分钟内最多 3 次
    /// - 使用限流：开启，10 分钟内最多 5 次
    /// - generator: random_hash
    pub fn defaults() -> Self {
        Self {
            ttl: Some(TimeSpec::Minutes(43200)),
            previous: Some(PreviousStrategy::Remove.as_str().to_string()),
            generation_throttling: Some(true),
            generation_attempts: Some(3),
            generation_attempts_interval: Some(TimeSpec::Minutes(10)),
            usage_throttling: Some(true),
            usage_attempts: Some(5),
            usage_attempts_interval: Some(TimeSpec::Minutes(10)),
            generator: Some(GeneratorRef::named("random_hash")),
        }
    }

    /// 设置有效期
    pub fn with_ttl(mut self, ttl: TimeSpec) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// 设置上一个 token 的处理策略
    pub fn with_previous(mut self, previous: PreviousStrategy) -> Self {
        self.previous = Some(previous.as_str().to_string());
        self
    }

    /// 以原始字符串设置处理策略（未知值在生成时报错）
    pub fn with_previous_str(mut self, previous: impl Into<String>) -> Self {
        self.previous = Some(previous.into());
        self
    }

    /// 设置是否启用生成限流
    pub fn with_generation_throttling(mut self, enabled: bool) -> Self {
        self.generation_throttling = Some(enabled);
        self
    }

    /// 设置生成限流的最大尝试次数
    pub fn with_generation_attempts(mut self, attempts: i64) -> Self {
        self.generation_attempts = Some(attempts);
        self
    }

    /// 设置生成限流的窗口
    pub fn with_generation_attempts_interval(mut self, interval: TimeSpec) -> Self {
        self.generation_attempts_interval = Some(interval);
        self
    }

    /// 设置是否启用使用限流
    pub fn with_usage_throttling(mut self, enabled: bool) -> Self {
        self.usage_throttling = Some(enabled);
        self
    }

    /// 设置使用限流的最大尝试次数
    pub fn with_usage_attempts(mut self, attempts: i64) -> Self {
        self.usage_attempts = Some(attempts);
        self
    }

    /// 设置使用限流的窗口
    pub fn with_usage_attempts_interval(mut self, interval: TimeSpec) -> Self {
        self.usage_attempts_interval = Some(interval);
        self
    }

    /// 设置生成器
    pub fn with_generator(mut self, generator: impl Into<GeneratorRef>) -> Self {
        self.generator = Some(generator.into());
        self
    }

    /// 将自身合并到 `defaults` 之上，自身的值优先
    pub fn merge_over(&self, defaults: &TokenOptions) -> TokenOptions {
        TokenOptions {
            ttl: self.ttl.or(defaults.ttl),
            previous: self.previous.clone().or_else(|| defaults.previous.clone()),
            generation_throttling: self.generation_throttling.or(defaults.generation_throttling),
            generation_attempts: self.generation_attempts.or(defaults.generation_attempts),
            generation_attempts_interval: self
                .generation_attempts_interval
                .or(defaults.generation_attempts_interval),
            usage_throttling: self.usage_throttling.or(defaults.usage_throttling),
            usage_attempts: self.usage_attempts.or(defaults.usage_attempts),
            usage_attempts_interval: self
                .usage_attempts_interval
                .or(defaults.usage_attempts_interval),
            generator: self.generator.clone().or_else(|| defaults.generator.clone()),
        }
    }
}
