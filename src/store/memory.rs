//! 内存 token 存储
//!
//! 适用于单实例部署或测试环境。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{QueryScope, TokenStore};
use crate::error::{Result, StorageError, TokenError};
use crate::token::{OwnerRef, Token};

#[derive(Debug, Default)]
struct Inner {
    /// 最后分配的 ID
    last_id: u64,
    /// id -> 记录
    tokens: BTreeMap<u64, Token>,
}

/// 内存 token 存储
///
/// 克隆后的实例共享同一份数据。
#[derive(Debug, Clone, Default)]
pub struct InMemoryTokenStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryTokenStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录总数（包含软删除的记录）
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.tokens.len()).unwrap_or(0)
    }

    /// 检查存储是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 所有记录的快照，按 ID 升序
    pub fn snapshot(&self) -> Vec<Token> {
        self.inner
            .read()
            .map(|inner| inner.tokens.values().cloned().collect())
            .unwrap_or_default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| StorageError::OperationFailed("token store lock poisoned".to_string()).into())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| StorageError::OperationFailed("token store lock poisoned".to_string()).into())
    }

    /// 对已存在的记录执行修改并返回修改后的副本
    fn update<F>(&self, token: &Token, apply: F) -> Result<Token>
    where
        F: FnOnce(&mut Token) -> Result<()>,
    {
        let mut inner = self.write()?;
        let record = inner
            .tokens
            .get_mut(&token.id)
            .ok_or_else(|| StorageError::NotFound(format!("token #{}", token.id)))?;

        apply(record)?;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn create(
        &self,
        owner: &OwnerRef,
        name: &str,
        value: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Token> {
        let mut inner = self.write()?;
        inner.last_id += 1;

        let now = Utc::now();
        let token = Token {
            id: inner.last_id,
            value: value.to_string(),
            name: name.to_string(),
            owner: owner.clone(),
            expires_at,
            used_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };

        inner.tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn find_by_value_and_name(&self, value: &str, name: &str) -> Result<Option<Token>> {
        let inner = self.read()?;
        Ok(inner
            .tokens
            .values()
            .rev()
            .find(|t| !t.is_deleted() && t.value == value && t.name == name)
            .cloned())
    }

    async fn find_active_for_owner(&self, owner: &OwnerRef, name: &str) -> Result<Option<Token>> {
        let inner = self.read()?;
        let now = Utc::now();
        Ok(inner
            .tokens
            .values()
            .rev()
            .find(|t| t.name == name && t.belongs_to(owner) && t.is_active_at(now))
            .cloned())
    }

    async fn soft_delete(&self, token: &Token) -> Result<Token> {
        self.update(token, |record| {
            if record.deleted_at.is_none() {
                record.deleted_at = Some(Utc::now());
            }
            Ok(())
        })
    }

    async fn mark_used(&self, token: &Token, at: DateTime<Utc>) -> Result<Token> {
        self.update(token, |record| {
            if record.is_used() {
                return Err(TokenError::AlreadyUsed(Box::new(record.clone())).into());
            }
            record.used_at = Some(at);
            Ok(())
        })
    }

    async fn extend_expiration(&self, token: &Token, at: DateTime<Utc>) -> Result<Token> {
        self.update(token, |record| {
            record.expires_at = at;
            Ok(())
        })
    }

    async fn purge_dead(&self) -> Result<usize> {
        let mut inner = self.write()?;
        let now = Utc::now();
        let before = inner.tokens.len();
        inner.tokens.retain(|_, token| token.is_active_at(now));
        Ok(before - inner.tokens.len())
    }

    async fn get(&self, id: u64, scope: QueryScope) -> Result<Option<Token>> {
        let inner = self.read()?;
        Ok(inner
            .tokens
            .get(&id)
            .filter(|token| scope.includes(token))
            .cloned())
    }

    async fn count(&self, scope: QueryScope) -> Result<usize> {
        let inner = self.read()?;
        Ok(inner.tokens.values().filter(|t| scope.includes(t)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn owner() -> OwnerRef {
        OwnerRef::new("user", "1")
    }

    fn in_an_hour() -> DateTime<Utc> {
        Utc::now() + Duration::hours(1)
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let store = InMemoryTokenStore::new();
        let first = store.create(&owner(), "verify", "A", in_an_hour()).await.unwrap();
        let second = store.create(&owner(), "verify", "B", in_an_hour()).await.unwrap();

        assert!(second.id > first.id);
        assert!(first.used_at.is_none());
        assert!(first.deleted_at.is_none());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_find_by_value_prefers_latest_live() {
        let store = InMemoryTokenStore::new();
        let old = store.create(&owner(), "verify", "A", in_an_hour()).await.unwrap();
        let new = store.create(&owner(), "verify", "A", in_an_hour()).await.unwrap();

        let found = store.find_by_value_and_name("A", "verify").await.unwrap().unwrap();
        assert_eq!(found.id, new.id);

        store.soft_delete(&new).await.unwrap();
        let found = store.find_by_value_and_name("A", "verify").await.unwrap().unwrap();
        assert_eq!(found.id, old.id);

        assert!(store.find_by_value_and_name("A", "other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_active_skips_dead_records() {
        let store = InMemoryTokenStore::new();
        let expired = Utc::now() - Duration::minutes(1);
        store.create(&owner(), "verify", "A", expired).await.unwrap();
        let used = store.create(&owner(), "verify", "B", in_an_hour()).await.unwrap();
        store.mark_used(&used, Utc::now()).await.unwrap();

        assert!(store.find_active_for_owner(&owner(), "verify").await.unwrap().is_none());

        let live = store.create(&owner(), "verify", "C", in_an_hour()).await.unwrap();
        let found = store.find_active_for_owner(&owner(), "verify").await.unwrap().unwrap();
        assert_eq!(found.id, live.id);

        let stranger = OwnerRef::new("user", "2");
        assert!(store.find_active_for_owner(&stranger, "verify").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_used_only_once() {
        let store = InMemoryTokenStore::new();
        let token = store.create(&owner(), "verify", "A", in_an_hour()).await.unwrap();

        let used = store.mark_used(&token, Utc::now()).await.unwrap();
        assert!(used.is_used());

        let err = store.mark_used(&token, Utc::now()).await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Token(TokenError::AlreadyUsed(ref record)) if record.used_at == used.used_at
        ));
    }

    #[tokio::test]
    async fn test_soft_delete_visibility() {
        let store = InMemoryTokenStore::new();
        let token = store.create(&owner(), "verify", "A", in_an_hour()).await.unwrap();
        store.soft_delete(&token).await.unwrap();

        assert!(store.get(token.id, QueryScope::LiveOnly).await.unwrap().is_none());
        assert!(store.get(token.id, QueryScope::All).await.unwrap().is_some());
        assert_eq!(store.count(QueryScope::LiveOnly).await.unwrap(), 0);
        assert_eq!(store.count(QueryScope::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_extend_expiration() {
        let store = InMemoryTokenStore::new();
        let token = store.create(&owner(), "verify", "A", in_an_hour()).await.unwrap();
        let later = Utc::now() + Duration::days(2);

        let extended = store.extend_expiration(&token, later).await.unwrap();
        assert_eq!(extended.expires_at, later);
        assert_eq!(extended.id, token.id);
    }

    #[tokio::test]
    async fn test_purge_dead() {
        let store = InMemoryTokenStore::new();
        let expired = Utc::now() - Duration::minutes(1);

        store.create(&owner(), "verify", "A", expired).await.unwrap();
        let used = store.create(&owner(), "verify", "B", in_an_hour()).await.unwrap();
        store.mark_used(&used, Utc::now()).await.unwrap();
        let deleted = store.create(&owner(), "verify", "C", in_an_hour()).await.unwrap();
        store.soft_delete(&deleted).await.unwrap();
        let live = store.create(&owner(), "verify", "D", in_an_hour()).await.unwrap();

        assert_eq!(store.purge_dead().await.unwrap(), 3);
        assert_eq!(store.purge_dead().await.unwrap(), 0);
        assert_eq!(store.snapshot(), vec![live]);
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = InMemoryTokenStore::new();
        let token = store.create(&owner(), "verify", "A", in_an_hour()).await.unwrap();

        let other = InMemoryTokenStore::new();
        assert!(matches!(
            other.soft_delete(&token).await,
            Err(crate::Error::Storage(StorageError::NotFound(_)))
        ));
    }
}
