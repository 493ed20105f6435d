//! Token 存储模块
//!
//! 定义 token 记录的持久化接口 [`TokenStore`]，并提供内存实现
//! [`InMemoryTokenStore`]。
//!
//! 软删除的记录对普通查询不可见（[`QueryScope::LiveOnly`]），
//! 只有维护操作和显式的 [`QueryScope::All`] 查询会看到它们。
//!
//! ## 实现自定义存储
//!
//! ```rust
//! use async_trait::async_trait;
//! use chrono::{DateTime, Utc};
//! use tokenrs::store::{QueryScope, TokenStore};
//! use tokenrs::token::{OwnerRef, Token};
//! use tokenrs::Result;
//!
//! struct DatabaseTokenStore {
//!     // 数据库连接池
//! }
//!
//! #[async_trait]
//! impl TokenStore for DatabaseTokenStore {
//!     async fn create(
//!         &self,
//!         owner: &OwnerRef,
//!         name: &str,
//!         value: &str,
//!         expires_at: DateTime<Utc>,
//!     ) -> Result<Token> {
//!         todo!("INSERT INTO tokens ...")
//!     }
//!
//!     async fn find_by_value_and_name(&self, value: &str, name: &str) -> Result<Option<Token>> {
//!         todo!("SELECT ... ORDER BY id DESC LIMIT 1")
//!     }
//!
//!     async fn find_active_for_owner(&self, owner: &OwnerRef, name: &str) -> Result<Option<Token>> {
//!         todo!()
//!     }
//!
//!     async fn soft_delete(&self, token: &Token) -> Result<Token> {
//!         todo!()
//!     }
//!
//!     async fn mark_used(&self, token: &Token, at: DateTime<Utc>) -> Result<Token> {
//!         todo!()
//!     }
//!
//!     async fn extend_expiration(&self, token: &Token, at: DateTime<Utc>) -> Result<Token> {
//!         todo!()
//!     }
//!
//!     async fn purge_dead(&self) -> Result<usize> {
//!         todo!()
//!     }
//!
//!     async fn get(&self, id: u64, scope: QueryScope) -> Result<Option<Token>> {
//!         todo!()
//!     }
//!
//!     async fn count(&self, scope: QueryScope) -> Result<usize> {
//!         todo!()
//!     }
//! }
//! ```

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::token::{OwnerRef, Token};

pub use memory::InMemoryTokenStore;

/// 查询范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryScope {
    /// 只包含未软删除的记录
    #[default]
    LiveOnly,
    /// 包含软删除的记录
    All,
}

impl QueryScope {
    /// 记录是否在此范围内可见
    pub fn includes(&self, token: &Token) -> bool {
        match self {
            QueryScope::LiveOnly => !token.is_deleted(),
            QueryScope::All => true,
        }
    }
}

/// Token 存储接口
///
/// 实现此 trait 以提供自定义的存储后端（如关系型数据库）。
/// 每个方法本身应当是原子的；管理器不会跨方法加锁。
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// 创建新记录，分配新的 ID，`used_at` 与 `deleted_at` 为空
    async fn create(
        &self,
        owner: &OwnerRef,
        name: &str,
        value: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Token>;

    /// 按值和类型名称查找未软删除的记录，多条时返回 ID 最大的一条
    ///
    /// 不过滤过期或已使用的记录，由调用方判断。
    async fn find_by_value_and_name(&self, value: &str, name: &str) -> Result<Option<Token>>;

    /// 查找所有者在该类型下的活跃记录（未使用、未删除、未过期）
    async fn find_active_for_owner(&self, owner: &OwnerRef, name: &str) -> Result<Option<Token>>;

    /// 软删除记录
    async fn soft_delete(&self, token: &Token) -> Result<Token>;

    /// 标记为已使用
    ///
    /// 记录已被标记时必须返回 `TokenError::AlreadyUsed`。同一 token 的并发使用
    /// 会同时通过管理器的前置检查并各自执行回调，只有先完成标记的一方成功，
    /// 因此检查与标记需要在后端以原子操作完成（例如 `UPDATE ... WHERE used_at IS NULL`）。
    async fn mark_used(&self, token: &Token, at: DateTime<Utc>) -> Result<Token>;

    /// 修改过期时间
    async fn extend_expiration(&self, token: &Token, at: DateTime<Utc>) -> Result<Token>;

    /// 永久删除所有已失效的记录（已使用、已过期或已软删除），返回删除数量
    async fn purge_dead(&self) -> Result<usize>;

    /// 按 ID 获取记录
    async fn get(&self, id: u64, scope: QueryScope) -> Result<Option<Token>>;

    /// 统计记录数量
    async fn count(&self, scope: QueryScope) -> Result<usize>;
}
