//! 维护操作
//!
//! [`ClearDeadTokens`] 清除已过期、已使用和已软删除的 token，
//! 适合由定时任务或运维命令触发。

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::info;

use crate::error::Result;
use crate::manager::{OwnerResolver, TokenManager};

/// 清理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReapReport {
    /// 删除的记录数量
    pub removed: usize,
    /// 完成时间
    pub finished_at: DateTime<Utc>,
}

impl fmt::Display for ReapReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "All dead tokens have been removed ({}).", self.removed)
    }
}

/// 清除失效 token 的命令
///
/// ```rust
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// use tokenrs::generator::GeneratorRegistry;
/// use tokenrs::maintenance::ClearDeadTokens;
/// use tokenrs::manager::TokenManager;
/// use tokenrs::store::InMemoryTokenStore;
/// use tokenrs::token::TokenRegistry;
///
/// let registry = TokenRegistry::new(GeneratorRegistry::with_defaults("APP_KEY"));
/// let manager = TokenManager::new(InMemoryTokenStore::new(), registry);
///
/// let report = ClearDeadTokens::new(&manager).run().await.unwrap();
/// assert_eq!(report.to_string(), "All dead tokens have been removed (0).");
/// # });
/// ```
pub struct ClearDeadTokens<'a, R: OwnerResolver> {
    manager: &'a TokenManager<R>,
}

impl<'a, R: OwnerResolver> ClearDeadTokens<'a, R> {
    /// 创建命令
    pub fn new(manager: &'a TokenManager<R>) -> Self {
        Self { manager }
    }

    /// 执行清理
    pub async fn run(&self) -> Result<ReapReport> {
        let removed = self.manager.reap().await?;
        let report = ReapReport {
            removed,
            finished_at: Utc::now(),
        };

        info!(removed, "{}", report);
        Ok(report)
    }
}
