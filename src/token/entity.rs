//! Token 记录与所有者引用
//!
//! `Token` 是持久化的基本单元，`OwnerRef` 以 `(kind, id)` 的形式
//! 多态地关联到任意应用实体。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 所有者引用
///
/// 通过实体类型与实体 ID 的组合定位任意拥有 token 的实体。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    /// 实体类型（例如 "user"）
    pub kind: String,
    /// 实体 ID
    pub id: String,
}

impl OwnerRef {
    /// 创建新的所有者引用
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// 可以拥有 token 的实体
///
/// 应用层实体实现此 trait 即可作为 `generate_for` / `use_for` 的所有者。
///
/// ```rust
/// use tokenrs::token::{OwnerRef, Tokenable};
///
/// struct User {
///     id: u64,
/// }
///
/// impl Tokenable for User {
///     fn owner_ref(&self) -> OwnerRef {
///         OwnerRef::new("user", self.id.to_string())
///     }
/// }
///
/// let user = User { id: 7 };
/// assert_eq!(user.owner_ref().to_string(), "user:7");
/// ```
pub trait Tokenable {
    /// 返回实体的所有者引用
    fn owner_ref(&self) -> OwnerRef;
}

impl Tokenable for OwnerRef {
    fn owner_ref(&self) -> OwnerRef {
        self.clone()
    }
}

impl<T: Tokenable + ?Sized> Tokenable for &T {
    fn owner_ref(&self) -> OwnerRef {
        (**self).owner_ref()
    }
}

/// Token 记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// 单调递增的记录 ID
    pub id: u64,

    /// Token 值
    pub value: String,

    /// Token 类型名称
    pub name: String,

    /// 所属实体
    pub owner: OwnerRef,

    /// 过期时间
    pub expires_at: DateTime<Utc>,

    /// 使用时间（只会被设置一次）
    pub used_at: Option<DateTime<Utc>>,

    /// 软删除时间
    pub deleted_at: Option<DateTime<Utc>>,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

impl Token {
    /// 检查 token 是否已过期
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// 检查 token 在给定时刻是否已过期
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// 检查 token 是否已被使用
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// 检查 token 是否已被软删除
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// 未使用、未删除且未过期
    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    /// 给定时刻是否处于活跃状态
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_used() && !self.is_deleted() && !self.is_expired_at(now)
    }

    /// 已使用、已删除或已过期
    pub fn is_dead(&self) -> bool {
        !self.is_active()
    }

    /// 给定时刻是否已失效
    pub fn is_dead_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_active_at(now)
    }

    /// 获取剩余有效时间（秒）
    pub fn remaining_seconds(&self) -> i64 {
        let remaining = self.expires_at - Utc::now();
        remaining.num_seconds().max(0)
    }

    /// 是否属于给定的所有者
    pub fn belongs_to(&self, owner: &OwnerRef) -> bool {
        &self.owner == owner
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
