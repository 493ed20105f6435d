//! Token 生命周期事件模块
//!
//! token 创建（或复用）和使用成功后，管理器会向 [`TokenEventSink`] 发送通知。
//! 通知是"发出即忘"的：接收方无法让原操作失败。
//!
//! ## 内置实现
//!
//! - **InMemoryEventSink**: 将事件保存在内存中，便于测试和审计
//! - **TracingEventSink**: 把事件写入 `tracing` 日志
//! - **NoOpEventSink**: 丢弃所有事件
//!
//! ## 使用示例
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use tokenrs::events::{InMemoryEventSink, TokenEventKind, TokenEventSink};
//! use tokenrs::token::{OwnerRef, Token};
//!
//! let sink = InMemoryEventSink::new();
//! let now = Utc::now();
//! let token = Token {
//!     id: 1,
//!     value: "AABBCC".to_string(),
//!     name: "verify".to_string(),
//!     owner: OwnerRef::new("user", "1"),
//!     expires_at: now + Duration::hours(1),
//!     used_at: None,
//!     deleted_at: None,
//!     created_at: now,
//!     updated_at: now,
//! };
//!
//! sink.notify_created(&token, "verify");
//! sink.notify_used(&token, "verify");
//!
//! assert_eq!(sink.event_count(), 2);
//! assert_eq!(sink.get_events_by_kind(TokenEventKind::Used).len(), 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::info;

use crate::random::generate_random_alphanumeric;
use crate::token::Token;

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenEventKind {
    /// token 已创建（或被复用）
    Created,
    /// token 已被使用
    Used,
}

impl fmt::Display for TokenEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenEventKind::Created => write!(f, "token_created"),
            TokenEventKind::Used => write!(f, "token_used"),
        }
    }
}

/// Token 生命周期事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEvent {
    /// 事件 ID
    pub id: String,
    /// 事件类型
    pub kind: TokenEventKind,
    /// token 类型名称
    pub token_type: String,
    /// 事件发生时的 token 记录
    pub token: Token,
    /// 事件时间
    pub timestamp: DateTime<Utc>,
}

impl TokenEvent {
    /// 创建新事件
    pub fn new(kind: TokenEventKind, token: &Token, token_type: impl Into<String>) -> Self {
        Self {
            id: format!("evt_{}", generate_random_alphanumeric(16)),
            kind,
            token_type: token_type.into(),
            token: token.clone(),
            timestamp: Utc::now(),
        }
    }

    /// 创建 token 已创建事件
    pub fn created(token: &Token, token_type: impl Into<String>) -> Self {
        Self::new(TokenEventKind::Created, token, token_type)
    }

    /// 创建 token 已使用事件
    pub fn used(token: &Token, token_type: impl Into<String>) -> Self {
        Self::new(TokenEventKind::Used, token, token_type)
    }
}

/// 事件接收方 trait
pub trait TokenEventSink: Send + Sync {
    /// 接收事件
    fn notify(&self, event: TokenEvent);

    /// token 创建（或复用）之后调用
    fn notify_created(&self, token: &Token, token_type: &str) {
        self.notify(TokenEvent::created(token, token_type));
    }

    /// token 使用成功之后调用
    fn notify_used(&self, token: &Token, token_type: &str) {
        self.notify(TokenEvent::used(token, token_type));
    }
}

// ============================================================================
// InMemoryEventSink
// ============================================================================

/// 内存事件接收方
///
/// 克隆后的实例共享同一份事件列表，可以在交给管理器之前保留一个副本用于检查。
#[derive(Debug, Default, Clone)]
pub struct InMemoryEventSink {
    events: Arc<RwLock<Vec<TokenEvent>>>,
}

impl InMemoryEventSink {
    /// 创建新的内存接收方
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取所有事件
    pub fn get_events(&self) -> Vec<TokenEvent> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }

    /// 获取事件数量
    pub fn event_count(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }

    /// 按事件类型获取事件
    pub fn get_events_by_kind(&self, kind: TokenEventKind) -> Vec<TokenEvent> {
        self.filter(|e| e.kind == kind)
    }

    /// 按 token 类型名称获取事件
    pub fn get_events_by_token_type(&self, token_type: &str) -> Vec<TokenEvent> {
        self.filter(|e| e.token_type == token_type)
    }

    /// 清空所有事件
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }

    fn filter<F: Fn(&TokenEvent) -> bool>(&self, predicate: F) -> Vec<TokenEvent> {
        self.events
            .read()
            .map(|events| events.iter().filter(|e| predicate(e)).cloned().collect())
            .unwrap_or_default()
    }
}

impl TokenEventSink for InMemoryEventSink {
    fn notify(&self, event: TokenEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event);
        }
    }
}

// ============================================================================
// TracingEventSink
// ============================================================================

/// 以 `tracing` 日志记录事件的接收方
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl TracingEventSink {
    /// 创建新的 tracing 接收方
    pub fn new() -> Self {
        Self
    }
}

impl TokenEventSink for TracingEventSink {
    fn notify(&self, event: TokenEvent) {
        info!(
            event = %event.kind,
            token_type = %event.token_type,
            token_id = event.token.id,
            owner = %event.token.owner,
            "Token lifecycle event"
        );
    }
}

// ============================================================================
// NoOpEventSink
// ============================================================================

/// 空操作接收方
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpEventSink;

impl NoOpEventSink {
    /// 创建新的空操作接收方
    pub fn new() -> Self {
        Self
    }
}

impl TokenEventSink for NoOpEventSink {
    fn notify(&self, _event: TokenEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::OwnerRef;
    use chrono::Duration;

    fn token(name: &str) -> Token {
        let now = Utc::now();
        Token {
            id: 1,
            value: "AABBCC".to_string(),
            name: name.to_string(),
            owner: OwnerRef::new("user", "1"),
            expires_at: now + Duration::hours(1),
            used_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_event_creation() {
        let event = TokenEvent::created(&token("verify"), "verify");
        assert_eq!(event.kind, TokenEventKind::Created);
        assert_eq!(event.token_type, "verify");
        assert!(event.id.starts_with("evt_"));
        assert_eq!(event.kind.to_string(), "token_created");
    }

    #[test]
    fn test_in_memory_sink_filters() {
        let sink = InMemoryEventSink::new();
        sink.notify_created(&token("verify"), "verify");
        sink.notify_created(&token("reset"), "reset");
        sink.notify_used(&token("verify"), "verify");

        assert_eq!(sink.event_count(), 3);
        assert_eq!(sink.get_events_by_kind(TokenEventKind::Created).len(), 2);
        assert_eq!(sink.get_events_by_token_type("verify").len(), 2);

        sink.clear();
        assert_eq!(sink.event_count(), 0);
    }

    #[test]
    fn test_clones_share_events() {
        let sink = InMemoryEventSink::new();
        let observer = sink.clone();

        sink.notify_used(&token("verify"), "verify");
        assert_eq!(observer.event_count(), 1);
    }

    #[test]
    fn test_noop_and_tracing_sinks() {
        NoOpEventSink::new().notify_created(&token("verify"), "verify");
        TracingEventSink::new().notify_used(&token("verify"), "verify");
    }
}
