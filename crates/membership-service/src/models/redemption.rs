//! 兑换记录相关实体定义
//!
//! 兑换记录一经创建不再修改。奖励信息以值拷贝的形式保存在记录内，
//! 目录中的奖励后续被修改或删除都不会改写历史。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::RedemptionStatus;
use super::tier::RewardDefinition;

/// 奖励快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardSnapshot {
    pub reward_id: i64,
    pub name: String,
    pub description: String,
    pub points_cost: i64,
    /// 兑换时的可兑换状态
    pub is_available: bool,
}

/// 兑换记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionRecord {
    pub id: Uuid,
    pub user_id: String,
    /// 兑换时奖励所属等级
    pub tier_id: i64,
    /// 奖励引用（仅用于追溯）
    pub reward_id: i64,
    /// 兑换时的奖励快照，早期记录可能为空
    #[serde(default)]
    pub reward_snapshot: Option<RewardSnapshot>,
    pub redeemed_at: DateTime<Utc>,
    pub points_spent: i64,
    pub status: RedemptionStatus,
}

impl RedemptionRecord {
    /// 基于当前奖励定义创建兑换记录
    pub fn capture(
        user_id: impl Into<String>,
        tier_id: i64,
        reward: &RewardDefinition,
        now: DateTime<Utc>,
    ) -> Self {
        let snapshot = reward.snapshot();
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            tier_id,
            reward_id: reward.id,
            points_spent: snapshot.points_cost,
            reward_snapshot: Some(snapshot),
            redeemed_at: now,
            status: RedemptionStatus::Redeemed,
        }
    }

    /// 快照与扣减积分是否一致
    pub fn is_consistent(&self) -> bool {
        match &self.reward_snapshot {
            Some(snapshot) => {
                snapshot.points_cost == self.points_spent && snapshot.reward_id == self.reward_id
            }
            None => true,
        }
    }
}
