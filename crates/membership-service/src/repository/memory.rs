//! 内存仓储
//!
//! 与 PostgreSQL 仓储语义一致（版本号比较交换、账户与兑换记录原子写入），
//! 适用于测试、嵌入式使用和本地开发。

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;

use super::traits::{AccountRepositoryTrait, AccountUpdate, TierRepositoryTrait};
use crate::catalog::TierCatalog;
use crate::error::{MembershipError, Result};
use crate::models::{MemberAccount, NewTier, RedemptionRecord, TierDefinition};

// ==================== 等级目录 ====================

#[derive(Debug, Default)]
struct CatalogState {
    version: i64,
    last_id: i64,
    /// 按插入顺序
    tiers: Vec<TierDefinition>,
}

/// 内存等级目录仓储
///
/// 整个目录由一把读写锁保护，写操作串行化
#[derive(Debug, Default)]
pub struct MemoryTierRepository {
    state: RwLock<CatalogState>,
}

impl MemoryTierRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前目录版本号
    pub fn version(&self) -> i64 {
        self.state.read().version
    }
}

#[async_trait]
impl TierRepositoryTrait for MemoryTierRepository {
    async fn load_catalog(&self) -> Result<TierCatalog> {
        let state = self.state.read();
        Ok(TierCatalog::new(state.version, state.tiers.clone()))
    }

    async fn get_tier(&self, tier_id: i64) -> Result<Option<TierDefinition>> {
        let state = self.state.read();
        Ok(state.tiers.iter().find(|t| t.id == tier_id).cloned())
    }

    async fn create_tier(&self, tier: &NewTier) -> Result<TierDefinition> {
        let mut state = self.state.write();
        if state.tiers.iter().any(|t| t.name == tier.name) {
            return Err(MembershipError::DuplicateTierName(tier.name.clone()));
        }

        let now = Utc::now();
        state.last_id += 1;
        let created = TierDefinition {
            id: state.last_id,
            name: tier.name.clone(),
            tier_type: tier.tier_type,
            description: tier.description.clone(),
            points_required: tier.points_required,
            benefits: tier.benefits.clone(),
            rewards: tier.rewards.clone(),
            is_active: tier.is_active,
            created_at: now,
            updated_at: now,
        };
        state.tiers.push(created.clone());
        state.version += 1;
        Ok(created)
    }

    async fn update_tier(&self, tier: &TierDefinition) -> Result<TierDefinition> {
        let mut state = self.state.write();
        if state
            .tiers
            .iter()
            .any(|t| t.id != tier.id && t.name == tier.name)
        {
            return Err(MembershipError::DuplicateTierName(tier.name.clone()));
        }

        let slot = state
            .tiers
            .iter_mut()
            .find(|t| t.id == tier.id)
            .ok_or(MembershipError::TierNotFound(tier.id))?;

        if slot.updated_at != tier.updated_at {
            return Err(MembershipError::ConcurrencyConflict);
        }

        // updated_at 作为比较交换的版本，必须严格递增
        let updated_at = Utc::now().max(slot.updated_at + Duration::microseconds(1));
        let created_at = slot.created_at;
        *slot = tier.clone();
        slot.created_at = created_at;
        slot.updated_at = updated_at;
        let updated = slot.clone();
        state.version += 1;
        Ok(updated)
    }

    async fn delete_tier(&self, tier_id: i64) -> Result<bool> {
        let mut state = self.state.write();
        let before = state.tiers.len();
        state.tiers.retain(|t| t.id != tier_id);
        let deleted = state.tiers.len() != before;
        if deleted {
            state.version += 1;
        }
        Ok(deleted)
    }
}

// ==================== 会员账户 ====================

#[derive(Debug, Clone)]
struct AccountEntry {
    account: MemberAccount,
    history: Vec<RedemptionRecord>,
}

/// 内存会员账户仓储
///
/// 每个账户连同其兑换历史存放在同一个 DashMap 条目中，
/// 提交时持有该条目的写锁完成版本比较与写入
#[derive(Debug, Default)]
pub struct MemoryAccountRepository {
    entries: DashMap<String, AccountEntry>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接追加一条历史记录（导入旧数据用，不经过版本校验）
    pub fn import_redemption(&self, record: RedemptionRecord) -> Result<()> {
        let mut entry = self
            .entries
            .get_mut(&record.user_id)
            .ok_or_else(|| MembershipError::AccountNotFound(record.user_id.clone()))?;
        entry.history.push(record);
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait]
impl AccountRepositoryTrait for MemoryAccountRepository {
    async fn get_account(&self, user_id: &str) -> Result<Option<MemberAccount>> {
        Ok(self.entries.get(user_id).map(|e| e.account.clone()))
    }

    async fn create_account(&self, account: &MemberAccount) -> Result<MemberAccount> {
        match self.entries.entry(account.user_id.clone()) {
            Entry::Occupied(_) => {
                Err(MembershipError::AccountAlreadyExists(account.user_id.clone()))
            }
            Entry::Vacant(slot) => {
                let mut stored = account.clone();
                stored.version = 1;
                slot.insert(AccountEntry {
                    account: stored.clone(),
                    history: Vec::new(),
                });
                Ok(stored)
            }
        }
    }

    async fn commit(&self, update: &AccountUpdate) -> Result<MemberAccount> {
        let user_id = &update.account.user_id;
        let mut entry = self
            .entries
            .get_mut(user_id)
            .ok_or_else(|| MembershipError::AccountNotFound(user_id.clone()))?;

        if entry.account.version != update.expected_version {
            return Err(MembershipError::ConcurrencyConflict);
        }

        let mut stored = update.account.clone();
        stored.version = update.expected_version + 1;
        entry.account = stored.clone();
        if let Some(record) = &update.redemption {
            entry.history.push(record.clone());
        }
        Ok(stored)
    }

    async fn list_accounts(&self) -> Result<Vec<MemberAccount>> {
        let mut accounts: Vec<MemberAccount> =
            self.entries.iter().map(|e| e.account.clone()).collect();
        accounts.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(accounts)
    }

    async fn list_accounts_by_tier(&self, tier_id: i64) -> Result<Vec<MemberAccount>> {
        let mut accounts: Vec<MemberAccount> = self
            .entries
            .iter()
            .filter(|e| e.account.current_tier_id == Some(tier_id))
            .map(|e| e.account.clone())
            .collect();
        accounts.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(accounts)
    }

    async fn list_redemptions(&self, user_id: &str) -> Result<Vec<RedemptionRecord>> {
        let mut history = self
            .entries
            .get(user_id)
            .map(|e| e.history.clone())
            .unwrap_or_default();
        history.sort_by_key(|r| r.redeemed_at);
        Ok(history)
    }
}
