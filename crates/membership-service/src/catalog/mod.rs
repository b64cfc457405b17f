//! 等级目录
//!
//! 目录是一份带版本号的权威数据，任何等级或奖励的变更都会让版本号加一。
//! 等级判定与资格计算都是基于目录快照的纯函数。

pub mod eligibility;
pub mod resolver;
pub mod seed;

pub use eligibility::{choose_tier, eligible_tiers};
pub use resolver::{floor_tier, ranked_active, resolve_tier};
pub use seed::{CatalogSeed, RewardSeed, TierSeed};

use crate::models::TierDefinition;

/// 等级目录快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierCatalog {
    version: i64,
    /// 按插入顺序（id 升序）
    tiers: Vec<TierDefinition>,
}

impl TierCatalog {
    pub fn new(version: i64, mut tiers: Vec<TierDefinition>) -> Self {
        tiers.sort_by_key(|t| t.id);
        Self { version, tiers }
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn tiers(&self) -> &[TierDefinition] {
        &self.tiers
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn get(&self, tier_id: i64) -> Option<&TierDefinition> {
        self.tiers.iter().find(|t| t.id == tier_id)
    }

    /// 查找启用中的等级
    pub fn get_active(&self, tier_id: i64) -> Option<&TierDefinition> {
        self.get(tier_id).filter(|t| t.is_active)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&TierDefinition> {
        self.tiers.iter().find(|t| t.name == name)
    }

    /// 启用中的等级（插入顺序）
    pub fn active_tiers(&self) -> Vec<&TierDefinition> {
        self.tiers.iter().filter(|t| t.is_active).collect()
    }

    pub fn floor(&self) -> Option<&TierDefinition> {
        floor_tier(&self.tiers)
    }

    pub fn resolve(&self, points: i64) -> Option<&TierDefinition> {
        resolve_tier(points, &self.tiers)
    }

    pub fn eligible(&self, points: i64) -> Vec<&TierDefinition> {
        eligible_tiers(points, &self.tiers)
    }
}
