//! 账户写入器
//!
//! 所有账户变更共用的读取-修改-提交流程：
//!
//! 1. 读取账户与最新目录
//! 2. 在账户副本上执行变更闭包（闭包失败则整体放弃，不写入任何数据）
//! 3. 账户无变化且无兑换记录时跳过提交
//! 4. 以读取时的版本号做比较交换提交，兑换记录随同写入
//! 5. 版本冲突时按重试策略从第 1 步重新执行

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use loyalty_shared::observability::metrics::record_tier_change;
use loyalty_shared::retry::{RetryPolicy, retry_with_policy};

use crate::catalog::TierCatalog;
use crate::error::{MembershipError, Result};
use crate::ledger::TierChange;
use crate::models::{MemberAccount, RedemptionRecord};
use crate::repository::{AccountRepositoryTrait, AccountUpdate, TierRepositoryTrait};

/// 变更闭包的返回值
#[derive(Debug)]
pub struct Mutation<T> {
    pub value: T,
    pub redemption: Option<RedemptionRecord>,
}

impl<T> Mutation<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            redemption: None,
        }
    }

    pub fn with_redemption(value: T, record: RedemptionRecord) -> Self {
        Self {
            value,
            redemption: Some(record),
        }
    }
}

/// 一次写入的结果
#[derive(Debug)]
pub struct WriteOutcome<T> {
    /// 变更前的账户
    pub previous: MemberAccount,
    /// 变更后的账户（已提交时为存储返回值）
    pub account: MemberAccount,
    /// 本次计算使用的目录
    pub catalog: TierCatalog,
    pub value: T,
    pub committed: bool,
}

impl<T> WriteOutcome<T> {
    pub fn tier_changed(&self) -> bool {
        self.previous.current_tier_id != self.account.current_tier_id
    }

    pub fn tier_change(&self) -> Option<TierChange> {
        TierChange::between(
            &self.catalog,
            self.previous.current_tier_id,
            self.account.current_tier_id,
        )
    }
}

/// 账户写入器
#[derive(Clone)]
pub struct AccountWriter {
    tiers: Arc<dyn TierRepositoryTrait>,
    accounts: Arc<dyn AccountRepositoryTrait>,
    policy: RetryPolicy,
}

impl AccountWriter {
    pub fn new(
        tiers: Arc<dyn TierRepositoryTrait>,
        accounts: Arc<dyn AccountRepositoryTrait>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            tiers,
            accounts,
            policy,
        }
    }

    /// 冲突重试策略
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 对账户执行变更并提交，版本冲突时自动重试
    pub async fn update<T, F>(
        &self,
        user_id: &str,
        operation: &str,
        mutate: F,
    ) -> Result<WriteOutcome<T>>
    where
        T: Send,
        F: Fn(&mut MemberAccount, &TierCatalog, DateTime<Utc>) -> Result<Mutation<T>> + Send + Sync,
    {
        let mutate = &mutate;
        let outcome = retry_with_policy(&self.policy, operation, MembershipError::is_conflict, || {
            self.attempt(user_id, mutate)
        })
        .await?;

        if outcome.committed {
            if let Some(change) = outcome.tier_change() {
                record_tier_change(change.as_str());
            }
        }
        Ok(outcome)
    }

    async fn attempt<T, F>(&self, user_id: &str, mutate: &F) -> Result<WriteOutcome<T>>
    where
        T: Send,
        F: Fn(&mut MemberAccount, &TierCatalog, DateTime<Utc>) -> Result<Mutation<T>> + Send + Sync,
    {
        let previous = self
            .accounts
            .get_account(user_id)
            .await?
            .ok_or_else(|| MembershipError::AccountNotFound(user_id.to_string()))?;
        let catalog = self.tiers.load_catalog().await?;

        let mut account = previous.clone();
        let Mutation { value, redemption } = mutate(&mut account, &catalog, Utc::now())?;

        if redemption.is_none() && account.same_state(&previous) {
            debug!(user_id, "账户无变化，跳过提交");
            return Ok(WriteOutcome {
                account: previous.clone(),
                previous,
                catalog,
                value,
                committed: false,
            });
        }

        let mut update = AccountUpdate::new(account, previous.version);
        update.redemption = redemption;
        let stored = self.accounts.commit(&update).await?;

        Ok(WriteOutcome {
            previous,
            account: stored,
            catalog,
            value,
            committed: true,
        })
    }
}
