//! 会员服务领域模型
//!
//! 包含积分会员系统的所有核心实体定义

pub mod account;
pub mod enums;
pub mod redemption;
pub mod tier;

// 重新导出常用类型
pub use account::MemberAccount;
pub use enums::{AdjustOperation, HistorySource, MembershipStatus, RedemptionStatus, TierType};
pub use redemption::{RedemptionRecord, RewardSnapshot};
pub use tier::{Benefit, NewTier, RewardDefinition, TierDefinition};
