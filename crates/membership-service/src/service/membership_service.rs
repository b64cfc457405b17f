//! 会员服务
//!
//! 会员账户生命周期与积分变动：
//! - 注册、查询（active 账户读取时自动校正等级）
//! - 状态迁移、主动选择等级
//! - 管理端积分调整、外部积分入账
//! - 全量列表与批量定级

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};

use loyalty_shared::observability::metrics::record_points_adjustment;

use crate::catalog::{TierCatalog, choose_tier};
use crate::error::{MembershipError, Result};
use crate::ledger::{
    self, PointsAmount, TierChange, apply_status, reassign_dangling_tier, reconcile_tier,
    repair_tier,
};
use crate::models::{AdjustOperation, MemberAccount, MembershipStatus};
use crate::repository::{AccountRepositoryTrait, TierRepositoryTrait};
use crate::service::account_writer::{AccountWriter, Mutation, WriteOutcome};
use crate::service::dto::{MembershipSnapshot, PointsAdjustmentDto, ReconcileReport};

/// 会员服务
pub struct MembershipService {
    tiers: Arc<dyn TierRepositoryTrait>,
    accounts: Arc<dyn AccountRepositoryTrait>,
    writer: AccountWriter,
    /// 新会员有效期（天）
    term_days: i64,
}

impl MembershipService {
    pub fn new(
        tiers: Arc<dyn TierRepositoryTrait>,
        accounts: Arc<dyn AccountRepositoryTrait>,
        writer: AccountWriter,
        term_days: i64,
    ) -> Self {
        Self {
            tiers,
            accounts,
            writer,
            term_days,
        }
    }

    /// 注册会员
    ///
    /// 零积分、最低等级、inactive 状态，有效期从当前时刻起算
    #[instrument(skip(self))]
    pub async fn register(&self, user_id: &str) -> Result<MembershipSnapshot> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(MembershipError::Validation("用户ID不能为空".to_string()));
        }

        let term = Duration::try_days(self.term_days).ok_or_else(|| {
            MembershipError::Validation(format!("会员有效期天数超出范围: {}", self.term_days))
        })?;

        let catalog = self.tiers.load_catalog().await?;
        let account = MemberAccount::register(
            user_id,
            catalog.floor().map(|t| t.id),
            term,
            Utc::now(),
        )?;
        let created = self.accounts.create_account(&account).await?;

        info!(user_id, tier_id = ?created.current_tier_id, "会员已注册");
        Ok(MembershipSnapshot::build(&created, &catalog))
    }

    /// 会员快照
    ///
    /// active 账户的当前等级失效时（等级被删除、停用或门槛上调），读取时校正并保存。
    /// 用户主动选择的较低等级保持不变。
    #[instrument(skip(self))]
    pub async fn get_snapshot(&self, user_id: &str) -> Result<MembershipSnapshot> {
        let outcome = self.reconcile_on_read(user_id).await?;
        Ok(MembershipSnapshot::build(&outcome.account, &outcome.catalog))
    }

    /// 修改会员状态
    ///
    /// cancelled 会清空积分并重置为最低等级，不可恢复
    #[instrument(skip(self))]
    pub async fn set_status(&self, user_id: &str, status: MembershipStatus) -> Result<MembershipSnapshot> {
        let outcome = self
            .writer
            .update(user_id, "set_membership_status", |account, catalog, now| {
                let previous = account.membership_status;
                apply_status(account, status, catalog, now);
                Ok(Mutation::new(previous))
            })
            .await?;

        if status == MembershipStatus::Cancelled && outcome.previous.points_balance > 0 {
            warn!(
                user_id,
                discarded_points = outcome.previous.points_balance,
                "会员已取消，积分已清零"
            );
        }
        info!(user_id, from = %outcome.value, to = %status, "会员状态已更新");
        Ok(MembershipSnapshot::build(&outcome.account, &outcome.catalog))
    }

    /// 用户选择等级
    #[instrument(skip(self))]
    pub async fn choose_tier(&self, user_id: &str, tier_id: i64) -> Result<MembershipSnapshot> {
        let outcome = self
            .writer
            .update(user_id, "choose_tier", |account, catalog, now| {
                choose_tier(account, catalog.tiers(), tier_id, now)?;
                Ok(Mutation::new(()))
            })
            .await?;

        info!(user_id, tier_id, "会员已选择等级");
        Ok(MembershipSnapshot::build(&outcome.account, &outcome.catalog))
    }

    /// 管理端积分调整
    ///
    /// `amount` 必须为正整数，`op` 只接受 `add` / `subtract`
    #[instrument(skip(self))]
    pub async fn adjust_points(
        &self,
        user_id: &str,
        amount: PointsAmount,
        op: &str,
    ) -> Result<PointsAdjustmentDto> {
        let operation: AdjustOperation = op.parse()?;
        if amount.is_zero() {
            return Err(MembershipError::Validation(
                "积分数量必须为正整数: 0".to_string(),
            ));
        }
        self.apply_points(user_id, amount, operation).await
    }

    /// 外部积分入账（消费、活动等）
    #[instrument(skip(self))]
    pub async fn credit_points(&self, user_id: &str, amount: PointsAmount) -> Result<PointsAdjustmentDto> {
        self.apply_points(user_id, amount, AdjustOperation::Add).await
    }

    async fn apply_points(
        &self,
        user_id: &str,
        amount: PointsAmount,
        operation: AdjustOperation,
    ) -> Result<PointsAdjustmentDto> {
        let outcome = self
            .writer
            .update(user_id, operation.as_str(), |account, catalog, now| {
                let result = match operation {
                    AdjustOperation::Add => ledger::add(account, amount, catalog, now)?,
                    AdjustOperation::Subtract => ledger::subtract(account, amount, catalog, now)?,
                };
                Ok(Mutation::new(result))
            })
            .await?;

        record_points_adjustment(operation.as_str());
        let tier_change = outcome.tier_change();
        info!(
            user_id,
            op = %operation,
            amount = amount.value(),
            previous_balance = outcome.value.previous_balance,
            new_balance = outcome.account.points_balance,
            tier_changed = outcome.tier_changed(),
            "积分已调整"
        );

        Ok(PointsAdjustmentDto {
            operation,
            amount: amount.value(),
            previous_balance: outcome.value.previous_balance,
            new_balance: outcome.account.points_balance,
            membership_changed: outcome.tier_changed(),
            tier_change,
            membership: MembershipSnapshot::build(&outcome.account, &outcome.catalog),
        })
    }

    /// 全部会员（管理端），active 账户同时校正等级
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<MembershipSnapshot>> {
        let accounts = self.accounts.list_accounts().await?;
        let mut snapshots = Vec::with_capacity(accounts.len());

        for account in &accounts {
            match self.reconcile_on_read(&account.user_id).await {
                Ok(outcome) => {
                    snapshots.push(MembershipSnapshot::build(&outcome.account, &outcome.catalog))
                }
                Err(MembershipError::AccountNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(snapshots)
    }

    /// 批量定级
    ///
    /// 对全部 active 账户按当前积分与目录重新定级，升级与降级都会执行。
    /// 非 active 账户仅在原等级已删除时移到最低等级（补齐中途失败的删除等级操作）。
    #[instrument(skip(self))]
    pub async fn reconcile_all(&self) -> Result<ReconcileReport> {
        let accounts = self.accounts.list_accounts().await?;
        let mut report = ReconcileReport::default();

        for account in &accounts {
            let outcome = match self.reconcile_with(&account.user_id, reconcile_or_reassign).await {
                Ok(outcome) => outcome,
                Err(MembershipError::AccountNotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            if !outcome.account.is_active() {
                if outcome.committed {
                    report.reassigned += 1;
                }
                continue;
            }

            report.checked += 1;
            match outcome.tier_change() {
                Some(TierChange::Upgrade) => report.upgraded += 1,
                Some(TierChange::Downgrade) => report.downgraded += 1,
                Some(TierChange::Lateral) => report.reassigned += 1,
                None => {}
            }
        }

        info!(
            checked = report.checked,
            upgraded = report.upgraded,
            downgraded = report.downgraded,
            reassigned = report.reassigned,
            "批量定级完成"
        );
        Ok(report)
    }

    async fn reconcile_on_read(&self, user_id: &str) -> Result<WriteOutcome<bool>> {
        self.reconcile_with(user_id, repair_tier).await
    }

    async fn reconcile_with(
        &self,
        user_id: &str,
        rule: fn(&mut MemberAccount, &TierCatalog, DateTime<Utc>) -> bool,
    ) -> Result<WriteOutcome<bool>> {
        let outcome = self
            .writer
            .update(user_id, "reconcile_tier", |account, catalog, now| {
                Ok(Mutation::new(rule(account, catalog, now)))
            })
            .await?;

        if outcome.committed {
            warn!(
                user_id,
                from = ?outcome.previous.current_tier_id,
                to = ?outcome.account.current_tier_id,
                "会员等级与目录不一致，已校正"
            );
        }
        Ok(outcome)
    }
}

/// active 账户完整重新定级，其余账户只处理已删除的等级
fn reconcile_or_reassign(account: &mut MemberAccount, catalog: &TierCatalog, now: DateTime<Utc>) -> bool {
    if account.is_active() {
        reconcile_tier(account, catalog, now)
    } else {
        reassign_dangling_tier(account, catalog, now)
    }
}
