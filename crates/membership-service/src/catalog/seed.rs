//! 权威等级目录文件
//!
//! 等级阶梯随代码一起版本管理（默认 `config/tier_catalog.toml`），
//! 通过 `config` crate 加载，管理端同步时按等级名称创建或更新。

use std::collections::HashSet;
use std::path::Path;

use config::{Config, File};
use serde::Deserialize;
use validator::Validate;

use crate::error::{MembershipError, Result};
use crate::models::{Benefit, TierType};

/// 目录文件中的奖励
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RewardSeed {
    #[validate(length(min = 1, max = 100, message = "奖励名称长度必须在1-100个字符之间"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0, message = "奖励积分不能为负"))]
    pub points_cost: i64,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

/// 目录文件中的等级
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TierSeed {
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
    pub rewards: Vec<RewardSeed>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// 等级目录文件
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CatalogSeed {
    #[serde(default)]
    #[validate(nested)]
    pub tiers: Vec<TierSeed>,
}

fn default_true() -> bool {
    true
}

impl CatalogSeed {
    /// 从文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let seed: CatalogSeed = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;
        seed.check()?;
        Ok(seed)
    }

    /// 字段校验 + 等级名称唯一
    pub fn check(&self) -> Result<()> {
        self.validate()?;

        let mut names = HashSet::new();
        for tier in &self.tiers {
            if !names.insert(tier.name.as_str()) {
                return Err(MembershipError::DuplicateTierName(tier.name.clone()));
            }
        }
        Ok(())
    }
}
