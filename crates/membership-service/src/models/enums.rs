//! 会员服务枚举类型定义
//!
//! 所有持久化的枚举都支持数据库（sqlx）和 JSON（serde）序列化

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MembershipError;

/// 等级类型标签
///
/// 仅用于展示和分组，等级判定只看 `points_required`
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum TierType {
    None,
    #[default]
    Basic,
    Gold,
    Platinum,
    Diamond,
}

/// 会员状态
///
/// 状态机：inactive -> active（激活或首次选择等级）；active -> cancelled（清零积分）；
/// cancelled -> active（按当前积分重新定级）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum MembershipStatus {
    /// 未激活 - 积分可变动，但不自动定级
    #[default]
    Inactive,
    /// 已激活 - 每次积分变动后同步定级
    Active,
    /// 已取消 - 禁止一切积分变动
    Cancelled,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipStatus {
    type Err = MembershipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(Self::Inactive),
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(MembershipError::Validation(format!(
                "未知的会员状态: {}，可选值 inactive / active / cancelled",
                other
            ))),
        }
    }
}

/// 兑换记录状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum RedemptionStatus {
    /// 已兑换
    #[default]
    Redeemed,
    /// 已使用
    Used,
    /// 已取消
    Cancelled,
}

/// 管理端积分调整操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustOperation {
    Add,
    Subtract,
}

impl AdjustOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
        }
    }
}

impl fmt::Display for AdjustOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdjustOperation {
    type Err = MembershipError;

    /// 只接受字面量 `add` / `subtract`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "subtract" => Ok(Self::Subtract),
            other => Err(MembershipError::Validation(format!(
                "未知的积分操作: {}，可选值 add / subtract",
                other
            ))),
        }
    }
}

/// 兑换历史中奖励数据的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistorySource {
    /// 兑换时保存的快照
    Snapshot,
    /// 旧记录无快照，回查当前目录得到
    LiveCatalog,
    /// 旧记录无快照且奖励已被删除
    Missing,
}
