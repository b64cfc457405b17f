//! 等级判定
//!
//! 纯函数，不访问存储。输入为目录中的全部等级（按插入顺序），
//! 只有 `is_active` 的等级参与判定。

use crate::models::TierDefinition;

/// 按门槛降序排列的启用等级
///
/// 排序稳定，门槛相同时保持目录插入顺序，先插入者在前
pub fn ranked_active(tiers: &[TierDefinition]) -> Vec<&TierDefinition> {
    let mut active: Vec<&TierDefinition> = tiers.iter().filter(|t| t.is_active).collect();
    active.sort_by(|a, b| b.points_required.cmp(&a.points_required));
    active
}

/// 最低等级：门槛最小的启用等级，相同门槛取先插入者
pub fn floor_tier(tiers: &[TierDefinition]) -> Option<&TierDefinition> {
    tiers
        .iter()
        .filter(|t| t.is_active)
        .min_by_key(|t| t.points_required)
}

/// 根据积分判定等级
///
/// 返回门槛不超过 `points` 的最高等级；若都不满足则退回最低等级；
/// 没有任何启用等级时返回 None
pub fn resolve_tier(points: i64, tiers: &[TierDefinition]) -> Option<&TierDefinition> {
    ranked_active(tiers)
        .into_iter()
        .find(|t| t.qualifies(points))
        .or_else(|| floor_tier(tiers))
}
