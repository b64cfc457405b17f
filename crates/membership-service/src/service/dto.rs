//! 服务层数据传输对象
//!
//! 定义服务层与外部交互使用的请求与响应结构，与内部领域模型解耦

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::catalog::{RewardSeed, TierCatalog, TierSeed};
use crate::ledger::TierChange;
use crate::models::{
    AdjustOperation, Benefit, HistorySource, MemberAccount, MembershipStatus, RedemptionRecord,
    RedemptionStatus, RewardDefinition, RewardSnapshot, TierDefinition, TierType,
};

fn default_true() -> bool {
    true
}

// ==================== 请求 ====================

/// 新增奖励请求
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewRewardRequest {
    #[validate(length(min = 1, max = 100, message = "奖励名称长度必须在1-100个字符之间"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 500, message = "奖励描述不超过500字符"))]
    pub description: String,
    #[validate(range(min = 0, message = "奖励积分不能为负"))]
    pub points_cost: i64,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

/// 修改奖励请求
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRewardRequest {
    #[validate(length(min = 1, max = 100, message = "奖励名称长度必须在1-100个字符之间"))]
    pub name: Option<String>,
    #[validate(length(max = 500, message = "奖励描述不超过500字符"))]
    pub description: Option<String>,
    #[validate(range(min = 0, message = "奖励积分不能为负"))]
    pub points_cost: Option<i64>,
    pub is_available: Option<bool>,
}

/// 创建等级请求
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTierRequest {
    #[validate(length(min = 1, max = 100, message = "等级名称长度必须在1-100个字符之间"))]
    pub name: String,
    #[serde(default)]
    pub tier_type: TierType,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0, message = "等级门槛不能为负"))]
    pub points_required: i64,
    #[serde(default)]
    pub benefits: Vec<Benefit>,
    #[serde(default)]
    #[validate(nested)]
    pub rewards: Vec<NewRewardRequest>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// 更新等级请求
///
/// 奖励通过单独的奖励接口维护
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTierRequest {
    #[validate(length(min = 1, max = 100, message = "等级名称长度必须在1-100个字符之间"))]
    pub name: Option<String>,
    pub tier_type: Option<TierType>,
    pub description: Option<String>,
    #[validate(range(min = 0, message = "等级门槛不能为负"))]
    pub points_required: Option<i64>,
    pub benefits: Option<Vec<Benefit>>,
    pub is_active: Option<bool>,
}

impl From<RewardSeed> for NewRewardRequest {
    fn from(seed: RewardSeed) -> Self {
        Self {
            name: seed.name,
            description: seed.description,
            points_cost: seed.points_cost,
            is_available: seed.is_available,
        }
    }
}

impl From<TierSeed> for CreateTierRequest {
    fn from(seed: TierSeed) -> Self {
        Self {
            name: seed.name,
            tier_type: seed.tier_type,
            description: seed.description,
            points_required: seed.points_required,
            benefits: seed.benefits,
            rewards: seed.rewards.into_iter().map(NewRewardRequest::from).collect(),
            is_active: seed.is_active,
        }
    }
}

// ==================== 响应 ====================

/// 等级摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierSummaryDto {
    pub id: i64,
    pub name: String,
    pub tier_type: TierType,
    pub points_required: i64,
    pub benefits: Vec<Benefit>,
}

impl From<&TierDefinition> for TierSummaryDto {
    fn from(tier: &TierDefinition) -> Self {
        Self {
            id: tier.id,
            name: tier.name.clone(),
            tier_type: tier.tier_type,
            points_required: tier.points_required,
            benefits: tier.benefits.clone(),
        }
    }
}

/// 会员快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipSnapshot {
    pub user_id: String,
    /// 当前等级（等级已删除或目录为空时为 None）
    pub tier: Option<TierSummaryDto>,
    pub status: MembershipStatus,
    pub points: i64,
    /// 按门槛降序
    pub eligible_tiers: Vec<TierSummaryDto>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl MembershipSnapshot {
    pub fn build(account: &MemberAccount, catalog: &TierCatalog) -> Self {
        Self {
            user_id: account.user_id.clone(),
            tier: account
                .current_tier_id
                .and_then(|id| catalog.get(id))
                .map(TierSummaryDto::from),
            status: account.membership_status,
            points: account.points_balance,
            eligible_tiers: catalog
                .eligible(account.points_balance)
                .into_iter()
                .map(TierSummaryDto::from)
                .collect(),
            start_date: account.membership_start_date,
            end_date: account.membership_end_date,
        }
    }
}

/// 积分调整结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsAdjustmentDto {
    pub operation: AdjustOperation,
    pub amount: i64,
    pub previous_balance: i64,
    pub new_balance: i64,
    /// 当前等级是否发生变化
    pub membership_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_change: Option<TierChange>,
    pub membership: MembershipSnapshot,
}

/// 可兑换奖励（附带所属等级）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableRewardDto {
    pub tier_id: i64,
    pub tier_name: String,
    pub reward: RewardDefinition,
}

/// 兑换结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionOutcome {
    pub record: RedemptionRecord,
    pub remaining_points: i64,
    pub tier: Option<TierSummaryDto>,
    pub tier_changed: bool,
}

/// 兑换历史条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionHistoryEntry {
    pub id: Uuid,
    pub tier_id: i64,
    pub reward_id: i64,
    /// 奖励数据，`source` 为 missing 时为空
    pub reward: Option<RewardSnapshot>,
    pub source: HistorySource,
    pub redeemed_at: DateTime<Utc>,
    pub points_spent: i64,
    pub status: RedemptionStatus,
}

/// 删除等级结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierDeletionReport {
    pub tier_id: i64,
    /// 被重新分配等级的账户数
    pub reassigned_accounts: usize,
}

/// 目录同步结果
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSyncReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub catalog_version: i64,
}

/// 批量定级结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// 检查的 active 账户数
    pub checked: usize,
    pub upgraded: usize,
    pub downgraded: usize,
    /// 原等级已删除而重新分配的账户数（含非 active 账户）
    pub reassigned: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tier(id: i64, name: &str, points_required: i64) -> TierDefinition {
        TierDefinition {
            id,
            name: name.to_string(),
            tier_type: TierType::Gold,
            description: String::new(),
            points_required,
            benefits: vec![],
            rewards: vec![],
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_tier_request_validation() {
        let valid: CreateTierRequest = serde_json::from_value(serde_json::json!({
            "name": "Gold",
            "pointsRequired": 100,
            "rewards": [{"name": "Coffee", "pointsCost": 20}]
        }))
        .unwrap();
        assert!(valid.validate().is_ok());
        assert!(valid.is_active);
        assert!(valid.rewards[0].is_available);

        let mut invalid = valid.clone();
        invalid.points_required = -1;
        assert!(invalid.validate().is_err());

        let mut bad_reward = valid.clone();
        bad_reward.rewards[0].points_cost = -10;
        assert!(bad_reward.validate().is_err());

        let mut empty_name = valid;
        empty_name.name = String::new();
        assert!(empty_name.validate().is_err());
    }

    #[test]
    fn test_update_tier_request_validation() {
        let request = UpdateTierRequest {
            points_required: Some(-5),
            ..Default::default()
        };
        assert!(request.validate().is_err());
        assert!(UpdateTierRequest::default().validate().is_ok());
    }

    #[test]
    fn test_snapshot_build() {
        let catalog = TierCatalog::new(
            1,
            vec![tier(1, "Basic", 0), tier(2, "Gold", 100), tier(3, "Platinum", 200)],
        );
        let mut account = MemberAccount::register("user-1", Some(2), Duration::days(30), Utc::now()).unwrap();
        account.points_balance = 150;

        let snapshot = MembershipSnapshot::build(&account, &catalog);
        assert_eq!(snapshot.tier.as_ref().map(|t| t.name.as_str()), Some("Gold"));
        let eligible: Vec<i64> = snapshot.eligible_tiers.iter().map(|t| t.id).collect();
        assert_eq!(eligible, vec![2, 1]);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["points"], 150);
        assert_eq!(json["status"], "inactive");
        assert!(json.get("eligibleTiers").is_some());
    }

    #[test]
    fn test_snapshot_with_deleted_tier() {
        let catalog = TierCatalog::new(1, vec![tier(1, "Basic", 0)]);
        let account = MemberAccount::register("user-1", Some(9), Duration::days(30), Utc::now()).unwrap();
        assert!(MembershipSnapshot::build(&account, &catalog).tier.is_none());
    }
}
