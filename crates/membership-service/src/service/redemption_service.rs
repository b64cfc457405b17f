//! 奖励兑换服务
//!
//! 处理积分兑换奖励的核心业务逻辑。
//!
//! ## 兑换流程
//!
//! 1. 账户状态检查 -> 2. 等级存在且启用 -> 3. 奖励存在 -> 4. 奖励可兑换
//!    -> 5. 积分余额 -> 6. 等级资格 -> 7. 扣减积分并重新定级
//!    -> 8. 生成奖励快照 -> 9. 账户与兑换记录原子提交
//!
//! 任一检查失败时账户、等级和兑换历史都不会发生变化。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use loyalty_shared::observability::metrics::record_redemption;

use crate::catalog::TierCatalog;
use crate::error::{MembershipError, Result};
use crate::ledger::{self, PointsAmount};
use crate::models::{HistorySource, MemberAccount, RedemptionRecord};
use crate::repository::{AccountRepositoryTrait, TierRepositoryTrait};
use crate::service::account_writer::{AccountWriter, Mutation};
use crate::service::dto::{
    AvailableRewardDto, RedemptionHistoryEntry, RedemptionOutcome, TierSummaryDto,
};

/// 奖励兑换服务
pub struct RedemptionService {
    tiers: Arc<dyn TierRepositoryTrait>,
    accounts: Arc<dyn AccountRepositoryTrait>,
    writer: AccountWriter,
}

impl RedemptionService {
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

    /// 可兑换奖励
    ///
    /// 当前积分满足的全部等级下、处于可兑换状态的奖励，按等级门槛降序。
    /// 已取消的账户不能兑换，返回空列表。
    #[instrument(skip(self))]
    pub async fn list_available_rewards(&self, user_id: &str) -> Result<Vec<AvailableRewardDto>> {
        let account = self.load_account(user_id).await?;
        if account.is_cancelled() {
            return Ok(Vec::new());
        }

        let catalog = self.tiers.load_catalog().await?;
        let rewards = catalog
            .eligible(account.points_balance)
            .into_iter()
            .flat_map(|tier| {
                tier.available_rewards().map(move |reward| AvailableRewardDto {
                    tier_id: tier.id,
                    tier_name: tier.name.clone(),
                    reward: reward.clone(),
                })
            })
            .collect();
        Ok(rewards)
    }

    /// 兑换奖励
    #[instrument(skip(self))]
    pub async fn redeem_reward(
        &self,
        user_id: &str,
        tier_id: i64,
        reward_id: i64,
    ) -> Result<RedemptionOutcome> {
        let result = self
            .writer
            .update(user_id, "redeem_reward", |account, catalog, now| {
                let record = redeem(account, catalog, tier_id, reward_id, now)?;
                Ok(Mutation::with_redemption(record.clone(), record))
            })
            .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                record_redemption(&e.error_code().to_lowercase());
                if e.is_business_error() {
                    info!(user_id, tier_id, reward_id, reason = %e, "兑换被拒绝");
                } else {
                    warn!(user_id, tier_id, reward_id, error = %e, "兑换失败");
                }
                return Err(e);
            }
        };
        record_redemption("success");

        let record = outcome.value.clone();
        info!(
            user_id,
            tier_id,
            reward_id,
            points_spent = record.points_spent,
            remaining_points = outcome.account.points_balance,
            tier_changed = outcome.tier_changed(),
            "奖励兑换成功"
        );

        Ok(RedemptionOutcome {
            remaining_points: outcome.account.points_balance,
            tier: outcome
                .account
                .current_tier_id
                .and_then(|id| outcome.catalog.get(id))
                .map(TierSummaryDto::from),
            tier_changed: outcome.tier_changed(),
            record,
        })
    }

    /// 兑换历史（按兑换时间升序）
    ///
    /// 有快照的记录直接使用快照；早期无快照的记录回查当前目录，
    /// 奖励已不存在时仍返回该条记录，奖励数据为空
    #[instrument(skip(self))]
    pub async fn list_redemption_history(&self, user_id: &str) -> Result<Vec<RedemptionHistoryEntry>> {
        self.load_account(user_id).await?;

        let records = self.accounts.list_redemptions(user_id).await?;
        let needs_catalog = records.iter().any(|r| r.reward_snapshot.is_none());
        let catalog = if needs_catalog {
            self.tiers.load_catalog().await?
        } else {
            TierCatalog::default()
        };

        Ok(records
            .into_iter()
            .map(|record| history_entry(record, &catalog))
            .collect())
    }

    async fn load_account(&self, user_id: &str) -> Result<MemberAccount> {
        self.accounts
            .get_account(user_id)
            .await?
            .ok_or_else(|| MembershipError::AccountNotFound(user_id.to_string()))
    }
}

/// 在账户副本上执行兑换，返回兑换记录
///
/// 检查顺序固定，第一个失败的检查决定错误类型
fn redeem(
    account: &mut MemberAccount,
    catalog: &TierCatalog,
    tier_id: i64,
    reward_id: i64,
    now: DateTime<Utc>,
) -> Result<RedemptionRecord> {
    if account.is_cancelled() {
        return Err(MembershipError::AccountCancelled(account.user_id.clone()));
    }

    let tier = catalog
        .get_active(tier_id)
        .ok_or(MembershipError::TierNotFound(tier_id))?;

    let reward = tier
        .find_reward(reward_id)
        .ok_or(MembershipError::RewardNotFound { tier_id, reward_id })?;

    if !reward.is_available {
        return Err(MembershipError::RewardUnavailable { tier_id, reward_id });
    }

    let balance = account.points_balance;
    if balance < reward.points_cost {
        return Err(MembershipError::InsufficientPoints {
            required: reward.points_cost,
            available: balance,
        });
    }

    if !tier.qualifies(balance) {
        return Err(MembershipError::TierNotEligible {
            tier_id,
            required: tier.points_required,
            available: balance,
        });
    }

    let record = RedemptionRecord::capture(account.user_id.clone(), tier_id, reward, now);
    ledger::subtract(account, PointsAmount::new(reward.points_cost)?, catalog, now)?;

    if record.points_spent != reward.points_cost
        || !record.is_consistent()
        || account.points_balance != balance - reward.points_cost
    {
        return Err(MembershipError::InvariantViolation(format!(
            "兑换扣减积分与奖励快照不一致: user_id={}, reward_id={}, cost={}, spent={}",
            account.user_id, reward_id, reward.points_cost, record.points_spent
        )));
    }

    Ok(record)
}

fn history_entry(record: RedemptionRecord, catalog: &TierCatalog) -> RedemptionHistoryEntry {
    let (reward, source) = match record.reward_snapshot {
        Some(snapshot) => (Some(snapshot), HistorySource::Snapshot),
        None => match catalog
            .get(record.tier_id)
            .and_then(|t| t.find_reward(record.reward_id))
        {
            Some(live) => (Some(live.snapshot()), HistorySource::LiveCatalog),
            None => (None, HistorySource::Missing),
        },
    };

    RedemptionHistoryEntry {
        id: record.id,
        tier_id: record.tier_id,
        reward_id: record.reward_id,
        reward,
        source,
        redeemed_at: record.redeemed_at,
        points_spent: record.points_spent,
        status: record.status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        MembershipStatus, RedemptionStatus, RewardDefinition, TierDefinition, TierType,
    };
    use crate::repository::{MockAccountRepositoryTrait, MockTierRepositoryTrait};
    use chrono::Duration;
    use loyalty_shared::retry::RetryPolicy;
    use uuid::Uuid;

    fn reward(id: i64, points_cost: i64, is_available: bool) -> RewardDefinition {
        RewardDefinition {
            id,
            name: format!("reward-{}", id),
            description: String::new(),
            points_cost,
            is_available,
        }
    }

    fn catalog() -> TierCatalog {
        let tier = |id: i64, name: &str, points_required: i64, rewards: Vec<RewardDefinition>| {
            TierDefinition {
                id,
                name: name.to_string(),
                tier_type: TierType::Basic,
                description: String::new(),
                points_required,
                benefits: vec![],
                rewards,
                is_active: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }
        };
        TierCatalog::new(
            1,
            vec![
                tier(1, "Basic", 0, vec![reward(1, 10, true)]),
                tier(2, "Gold", 100, vec![reward(1, 120, true), reward(2, 20, false)]),
                tier(3, "Platinum", 200, vec![reward(1, 50, true)]),
            ],
        )
    }

    fn active_account(points: i64, tier_id: i64) -> MemberAccount {
        let mut account = MemberAccount::register("user-1", Some(tier_id), Duration::days(30), Utc::now()).unwrap();
        account.membership_status = MembershipStatus::Active;
        account.points_balance = points;
        account
    }

    #[test]
    fn test_redeem_downgrades_after_spend() {
        let catalog = catalog();
        let mut account = active_account(150, 2);

        let record = redeem(&mut account, &catalog, 2, 1, Utc::now()).unwrap();
        assert_eq!(record.points_spent, 120);
        assert_eq!(account.points_balance, 30);
        assert_eq!(account.current_tier_id, Some(1));
    }

    #[test]
    fn test_redeem_check_order() {
        let catalog = catalog();

        let mut cancelled = active_account(500, 1);
        cancelled.membership_status = MembershipStatus::Cancelled;
        assert!(matches!(
            redeem(&mut cancelled, &catalog, 99, 1, Utc::now()),
            Err(MembershipError::AccountCancelled(_))
        ));

        let mut account = active_account(10, 1);
        assert!(matches!(
            redeem(&mut account, &catalog, 99, 1, Utc::now()),
            Err(MembershipError::TierNotFound(99))
        ));
        assert!(matches!(
            redeem(&mut account, &catalog, 2, 9, Utc::now()),
            Err(MembershipError::RewardNotFound { tier_id: 2, reward_id: 9 })
        ));
        // 奖励下架优先于积分不足
        assert!(matches!(
            redeem(&mut account, &catalog, 2, 2, Utc::now()),
            Err(MembershipError::RewardUnavailable { .. })
        ));
        assert!(matches!(
            redeem(&mut account, &catalog, 2, 1, Utc::now()),
            Err(MembershipError::InsufficientPoints { required: 120, available: 10 })
        ));

        // 积分足够支付但未达到等级门槛
        let mut gold = active_account(150, 2);
        assert!(matches!(
            redeem(&mut gold, &catalog, 3, 1, Utc::now()),
            Err(MembershipError::TierNotEligible { tier_id: 3, required: 200, available: 150 })
        ));
        assert_eq!(gold.points_balance, 150);
    }

    #[test]
    fn test_history_entry_sources() {
        let catalog = catalog();
        let with_snapshot = RedemptionRecord::capture("user-1", 2, &reward(1, 120, true), Utc::now());
        let entry = history_entry(with_snapshot, &catalog);
        assert_eq!(entry.source, HistorySource::Snapshot);
        assert_eq!(entry.reward.unwrap().points_cost, 120);

        let legacy = |tier_id: i64, reward_id: i64| RedemptionRecord {
            id: Uuid::now_v7(),
            user_id: "user-1".to_string(),
            tier_id,
            reward_id,
            reward_snapshot: None,
            redeemed_at: Utc::now(),
            points_spent: 40,
            status: RedemptionStatus::Used,
        };

        let live = history_entry(legacy(3, 1), &catalog);
        assert_eq!(live.source, HistorySource::LiveCatalog);
        assert_eq!(live.reward.unwrap().points_cost, 50);
        assert_eq!(live.points_spent, 40);

        let missing = history_entry(legacy(7, 1), &catalog);
        assert_eq!(missing.source, HistorySource::Missing);
        assert!(missing.reward.is_none());
        assert_eq!(missing.status, RedemptionStatus::Used);
    }

    #[tokio::test]
    async fn test_failed_commit_surfaces_error_without_retry() {
        let mut tiers = MockTierRepositoryTrait::new();
        tiers.expect_load_catalog().returning(|| Ok(catalog()));
        let mut accounts = MockAccountRepositoryTrait::new();
        accounts
            .expect_get_account()
            .returning(|_| Ok(Some(active_account(150, 2))));
        accounts
            .expect_commit()
            .times(1)
            .withf(|update| update.redemption.is_some() && update.account.points_balance == 30)
            .returning(|_| Err(MembershipError::Internal("disk full".to_string())));

        let tiers: Arc<dyn TierRepositoryTrait> = Arc::new(tiers);
        let accounts: Arc<dyn AccountRepositoryTrait> = Arc::new(accounts);
        let writer = AccountWriter::new(tiers.clone(), accounts.clone(), RetryPolicy::immediate(3));
        let svc = RedemptionService::new(tiers, accounts, writer);

        let err = svc.redeem_reward("user-1", 2, 1).await.unwrap_err();
        assert!(matches!(err, MembershipError::Internal(_)));
    }
}
