//! 会员等级相关实体定义
//!
//! 包含等级定义、等级权益、等级下的可兑换奖励

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::TierType;
use super::redemption::RewardSnapshot;

/// 等级权益
///
/// 纯展示数据，不参与任何计算
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Benefit {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// 奖励定义
///
/// 归属于某个等级，`id` 在所属等级内唯一
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardDefinition {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// 兑换所需积分
    pub points_cost: i64,
    /// 是否可兑换
    pub is_available: bool,
}

impl RewardDefinition {
    /// 生成当前时刻的值拷贝
    pub fn snapshot(&self) -> RewardSnapshot {
        RewardSnapshot {
            reward_id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            points_cost: self.points_cost,
            is_available: self.is_available,
        }
    }
}

/// 会员等级定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierDefinition {
    pub id: i64,
    /// 等级名称（全局唯一）
    pub name: String,
    pub tier_type: TierType,
    pub description: String,
    /// 达到该等级所需积分
    pub points_required: i64,
    pub benefits: Vec<Benefit>,
    pub rewards: Vec<RewardDefinition>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 待创建的等级（id 与时间戳由存储层分配）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTier {
    pub name: String,
    pub tier_type: TierType,
    pub description: String,
    pub points_required: i64,
    pub benefits: Vec<Benefit>,
    pub rewards: Vec<RewardDefinition>,
    pub is_active: bool,
}

impl TierDefinition {
    /// 给定积分是否达到该等级门槛
    pub fn qualifies(&self, points: i64) -> bool {
        self.points_required <= points
    }

    /// 按 id 查找奖励
    pub fn find_reward(&self, reward_id: i64) -> Option<&RewardDefinition> {
        self.rewards.iter().find(|r| r.id == reward_id)
    }

    /// 按 id 查找奖励（可变）
    pub fn find_reward_mut(&mut self, reward_id: i64) -> Option<&mut RewardDefinition> {
        self.rewards.iter_mut().find(|r| r.id == reward_id)
    }

    /// 可兑换的奖励
    pub fn available_rewards(&self) -> impl Iterator<Item = &RewardDefinition> {
        self.rewards.iter().filter(|r| r.is_available)
    }

    /// 下一个奖励 id
    pub fn next_reward_id(&self) -> i64 {
        self.rewards.iter().map(|r| r.id).max().unwrap_or(0) + 1
    }
}
