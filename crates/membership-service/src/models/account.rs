//! 会员账户实体定义

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::enums::MembershipStatus;
use crate::error::{MembershipError, Result};

/// 会员账户
///
/// 用户聚合中与积分会员相关的部分。兑换历史单独存储，按 `user_id` 关联。
/// `version` 是乐观锁版本号，每次成功写入加一。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MemberAccount {
    pub user_id: String,
    /// 当前等级 ID（目录为空时为 None）
    #[sqlx(default)]
    pub current_tier_id: Option<i64>,
    pub membership_status: MembershipStatus,
    /// 积分余额，永不为负
    pub points_balance: i64,
    pub membership_start_date: DateTime<Utc>,
    pub membership_end_date: DateTime<Utc>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemberAccount {
    /// 注册新会员
    ///
    /// 零积分、最低等级、未激活状态。有效期必须为正且结束日期可表示
    pub fn register(
        user_id: impl Into<String>,
        floor_tier_id: Option<i64>,
        term: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if term <= Duration::zero() {
            return Err(MembershipError::Validation(format!(
                "会员有效期必须为正: {}",
                term
            )));
        }
        let membership_end_date = now
            .checked_add_signed(term)
            .ok_or_else(|| MembershipError::Validation(format!("会员有效期超出范围: {}", term)))?;

        Ok(Self {
            user_id: user_id.into(),
            current_tier_id: floor_tier_id,
            membership_status: MembershipStatus::Inactive,
            points_balance: 0,
            membership_start_date: now,
            membership_end_date,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_active(&self) -> bool {
        self.membership_status == MembershipStatus::Active
    }

    pub fn is_cancelled(&self) -> bool {
        self.membership_status == MembershipStatus::Cancelled
    }

    /// 比较业务字段是否一致（忽略时间戳和版本号）
    pub fn same_state(&self, other: &MemberAccount) -> bool {
        self.current_tier_id == other.current_tier_id
            && self.membership_status == other.membership_status
            && self.points_balance == other.points_balance
            && self.membership_start_date == other.membership_start_date
            && self.membership_end_date == other.membership_end_date
    }
}
