//! 等级目录服务
//!
//! 管理等级与奖励定义：
//! - 查询启用等级
//! - 创建、更新、删除等级（删除时重新分配引用该等级的账户）
//! - 奖励的新增、修改与上下架（奖励 id 在等级内单调递增，不会复用）
//! - 按名称同步权威目录文件
//!
//! 等级修改以 `updated_at` 做比较交换，并发修改同一等级时冲突方重新读取后重做

use std::sync::Arc;

use tracing::{info, instrument, warn};
use validator::Validate;

use loyalty_shared::retry::retry_with_policy;

use crate::catalog::{CatalogSeed, TierCatalog, TierSeed};
use crate::error::{MembershipError, Result};
use crate::ledger::reassign_dangling_tier;
use crate::models::{NewTier, RewardDefinition, TierDefinition};
use crate::repository::{AccountRepositoryTrait, TierRepositoryTrait};
use crate::service::account_writer::{AccountWriter, Mutation};
use crate::service::dto::{
    CatalogSyncReport, CreateTierRequest, NewRewardRequest, TierDeletionReport,
    UpdateRewardRequest, UpdateTierRequest,
};

/// 等级目录服务
pub struct CatalogService {
    tiers: Arc<dyn TierRepositoryTrait>,
    accounts: Arc<dyn AccountRepositoryTrait>,
    writer: AccountWriter,
}

impl CatalogService {
    pub fn new(
        tiers: Arc<dyn TierRepositoryTrait>,
        accounts: Arc<dyn AccountRepositoryTrait>,
        writer: AccountWriter,
    ) -> Self {
        Self {
            tiers,
            accounts,
            writer,
        }
    }

    /// 当前目录快照
    pub async fn catalog(&self) -> Result<TierCatalog> {
        self.tiers.load_catalog().await
    }

    /// 启用中的等级（按创建顺序）
    pub async fn list_active_tiers(&self) -> Result<Vec<TierDefinition>> {
        let catalog = self.tiers.load_catalog().await?;
        Ok(catalog.active_tiers().into_iter().cloned().collect())
    }

    /// 获取单个等级（含停用等级）
    pub async fn get_tier(&self, tier_id: i64) -> Result<TierDefinition> {
        self.tiers
            .get_tier(tier_id)
            .await?
            .ok_or(MembershipError::TierNotFound(tier_id))
    }

    /// 创建等级
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_tier(&self, request: CreateTierRequest) -> Result<TierDefinition> {
        request.validate()?;

        let rewards = request
            .rewards
            .into_iter()
            .zip(1..)
            .map(|(reward, id)| RewardDefinition {
                id,
                name: reward.name,
                description: reward.description,
                points_cost: reward.points_cost,
                is_available: reward.is_available,
            })
            .collect();

        let tier = self
            .tiers
            .create_tier(&NewTier {
                name: request.name,
                tier_type: request.tier_type,
                description: request.description,
                points_required: request.points_required,
                benefits: request.benefits,
                rewards,
                is_active: request.is_active,
            })
            .await?;

        info!(
            tier_id = tier.id,
            points_required = tier.points_required,
            "等级已创建"
        );
        Ok(tier)
    }

    /// 更新等级
    ///
    /// 门槛或启用状态的变化不会立即改写账户，active 账户在下次读取或积分变动时重新定级
    #[instrument(skip(self, request))]
    pub async fn update_tier(&self, tier_id: i64, request: UpdateTierRequest) -> Result<TierDefinition> {
        request.validate()?;

        let request = &request;
        let (updated, ()) = self
            .modify_tier(tier_id, "update_tier", |tier| {
                if let Some(name) = &request.name {
                    tier.name = name.clone();
                }
                if let Some(tier_type) = request.tier_type {
                    tier.tier_type = tier_type;
                }
                if let Some(description) = &request.description {
                    tier.description = description.clone();
                }
                if let Some(points_required) = request.points_required {
                    tier.points_required = points_required;
                }
                if let Some(benefits) = &request.benefits {
                    tier.benefits = benefits.clone();
                }
                if let Some(is_active) = request.is_active {
                    tier.is_active = is_active;
                }
                Ok(())
            })
            .await?;
        info!(tier_id, "等级已更新");
        Ok(updated)
    }

    /// 删除等级
    ///
    /// 先从目录移除，再逐个重新分配仍引用该等级的账户：
    /// active 账户按剩余目录重新定级，其余账户移到最低等级（目录为空时置空）。
    /// 每个账户独立提交；中途失败时剩余账户由读取时校正或批量定级补齐。
    #[instrument(skip(self))]
    pub async fn delete_tier(&self, tier_id: i64) -> Result<TierDeletionReport> {
        if !self.tiers.delete_tier(tier_id).await? {
            return Err(MembershipError::TierNotFound(tier_id));
        }

        let affected = self.accounts.list_accounts_by_tier(tier_id).await?;
        let mut reassigned = 0;

        for member in &affected {
            let outcome = self
                .writer
                .update(&member.user_id, "reassign_deleted_tier", |account, catalog, now| {
                    Ok(Mutation::new(reassign_dangling_tier(account, catalog, now)))
                })
                .await;

            match outcome {
                Ok(outcome) if outcome.committed => reassigned += 1,
                Ok(_) => {}
                // 账户在列出后被删除的情况不影响其他账户
                Err(MembershipError::AccountNotFound(user_id)) => {
                    warn!(user_id = %user_id, "重新分配等级时账户已不存在");
                }
                Err(e) => return Err(e),
            }
        }

        info!(tier_id, reassigned, "等级已删除");
        Ok(TierDeletionReport {
            tier_id,
            reassigned_accounts: reassigned,
        })
    }

    /// 为等级新增奖励
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn add_reward(&self, tier_id: i64, request: NewRewardRequest) -> Result<RewardDefinition> {
        request.validate()?;

        let request = &request;
        let (_, reward) = self
            .modify_tier(tier_id, "add_reward", |tier| {
                // 每次重试都基于最新读取的等级分配 id
                let reward = RewardDefinition {
                    id: tier.next_reward_id(),
                    name: request.name.clone(),
                    description: request.description.clone(),
                    points_cost: request.points_cost,
                    is_available: request.is_available,
                };
                tier.rewards.push(reward.clone());
                Ok(reward)
            })
            .await?;

        info!(tier_id, reward_id = reward.id, "奖励已新增");
        Ok(reward)
    }

    /// 修改奖励
    ///
    /// 已有兑换记录保存的是兑换时的快照，不受影响
    #[instrument(skip(self, request))]
    pub async fn update_reward(
        &self,
        tier_id: i64,
        reward_id: i64,
        request: UpdateRewardRequest,
    ) -> Result<RewardDefinition> {
        request.validate()?;

        let request = &request;
        let (_, updated) = self
            .modify_tier(tier_id, "update_reward", |tier| {
                let reward = tier
                    .find_reward_mut(reward_id)
                    .ok_or(MembershipError::RewardNotFound { tier_id, reward_id })?;

                if let Some(name) = &request.name {
                    reward.name = name.clone();
                }
                if let Some(description) = &request.description {
                    reward.description = description.clone();
                }
                if let Some(points_cost) = request.points_cost {
                    reward.points_cost = points_cost;
                }
                if let Some(is_available) = request.is_available {
                    reward.is_available = is_available;
                }
                Ok(reward.clone())
            })
            .await?;

        info!(tier_id, reward_id, "奖励已修改");
        Ok(updated)
    }

    /// 奖励上下架
    pub async fn set_reward_availability(
        &self,
        tier_id: i64,
        reward_id: i64,
        is_available: bool,
    ) -> Result<RewardDefinition> {
        self.update_reward(
            tier_id,
            reward_id,
            UpdateRewardRequest {
                is_available: Some(is_available),
                ..Default::default()
            },
        )
        .await
    }

    /// 从文件加载并同步权威目录
    pub async fn sync_catalog_file(&self, path: &str) -> Result<CatalogSyncReport> {
        let seed = CatalogSeed::load(path)?;
        self.sync_catalog(&seed).await
    }

    /// 同步权威目录
    ///
    /// 按名称匹配：缺失的等级新建，已有等级按文件内容更新；
    /// 奖励按名称匹配，保留原 id，新奖励分配新 id。
    /// 不删除任何等级或奖励，不修改任何账户。
    #[instrument(skip(self, seed), fields(tiers = seed.tiers.len()))]
    pub async fn sync_catalog(&self, seed: &CatalogSeed) -> Result<CatalogSyncReport> {
        seed.check()?;

        let catalog = self.tiers.load_catalog().await?;
        let mut report = CatalogSyncReport::default();

        for tier_seed in &seed.tiers {
            match catalog.find_by_name(&tier_seed.name) {
                None => {
                    self.create_tier(tier_seed.clone().into()).await?;
                    report.created.push(tier_seed.name.clone());
                }
                Some(existing) => {
                    if merge_seed(existing, tier_seed) == *existing {
                        report.unchanged.push(tier_seed.name.clone());
                    } else {
                        self.modify_tier(existing.id, "sync_tier", |tier| {
                            *tier = merge_seed(tier, tier_seed);
                            Ok(())
                        })
                        .await?;
                        report.updated.push(tier_seed.name.clone());
                    }
                }
            }
        }

        report.catalog_version = self.tiers.load_catalog().await?.version();
        info!(
            created = report.created.len(),
            updated = report.updated.len(),
            unchanged = report.unchanged.len(),
            catalog_version = report.catalog_version,
            "等级目录已同步"
        );
        Ok(report)
    }

    /// 读取等级、执行修改并以 `updated_at` 比较交换提交
    ///
    /// 冲突时按重试策略重新读取并重做修改；修改闭包失败则不写入
    async fn modify_tier<T, F>(
        &self,
        tier_id: i64,
        operation: &str,
        edit: F,
    ) -> Result<(TierDefinition, T)>
    where
        T: Send,
        F: Fn(&mut TierDefinition) -> Result<T> + Send + Sync,
    {
        let edit = &edit;
        retry_with_policy(
            self.writer.policy(),
            operation,
            MembershipError::is_conflict,
            || async move {
                let mut tier = self.get_tier(tier_id).await?;
                let value = edit(&mut tier)?;
                let updated = self.tiers.update_tier(&tier).await?;
                Ok((updated, value))
            },
        )
        .await
    }
}

/// 把目录文件中的等级合并到已有等级上
fn merge_seed(existing: &TierDefinition, seed: &TierSeed) -> TierDefinition {
    let mut merged = existing.clone();
    merged.tier_type = seed.tier_type;
    merged.description = seed.description.clone();
    merged.points_required = seed.points_required;
    merged.benefits = seed.benefits.clone();
    merged.is_active = seed.is_active;

    for reward_seed in &seed.rewards {
        match merged.rewards.iter_mut().find(|r| r.name == reward_seed.name) {
            Some(reward) => {
                reward.description = reward_seed.description.clone();
                reward.points_cost = reward_seed.points_cost;
                reward.is_available = reward_seed.is_available;
            }
            None => {
                let id = merged.next_reward_id();
                merged.rewards.push(RewardDefinition {
                    id,
                    name: reward_seed.name.clone(),
                    description: reward_seed.description.clone(),
                    points_cost: reward_seed.points_cost,
                    is_available: reward_seed.is_available,
                });
            }
        }
    }
    merged
}
