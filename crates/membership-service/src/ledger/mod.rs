//! 积分账本
//!
//! 账户积分余额的全部变动入口。积分变动后如果账户处于 active 状态，
//! 立即按最新积分重新判定等级（可能降级）。
//!
//! 本模块只修改内存中的账户，持久化由服务层通过乐观锁提交。

pub mod lifecycle;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::TierCatalog;
use crate::error::{MembershipError, Result};
use crate::models::MemberAccount;

pub use lifecycle::apply_status;

// ---------------------------------------------------------------------------
// PointsAmount
// ---------------------------------------------------------------------------

/// 积分数量（非负整数）
///
/// 所有外部传入的积分都先转换为该类型，负数和非整数在边界处拒绝
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "i64")]
pub struct PointsAmount(i64);

impl PointsAmount {
    pub const ZERO: PointsAmount = PointsAmount(0);

    pub fn new(value: i64) -> Result<Self> {
        if value < 0 {
            return Err(MembershipError::Validation(format!(
                "积分数量不能为负: {}",
                value
            )));
        }
        Ok(Self(value))
    }

    /// 严格为正的积分数量，管理端调整使用
    pub fn positive(value: i64) -> Result<Self> {
        if value <= 0 {
            return Err(MembershipError::Validation(format!(
                "积分数量必须为正整数: {}",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// 从 JSON 值解析，接受整数或整数字符串
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(v) => Self::new(v),
                None => Err(MembershipError::Validation(format!(
                    "积分数量必须为整数: {}",
                    n
                ))),
            },
            serde_json::Value::String(s) => s.parse(),
            other => Err(MembershipError::Validation(format!(
                "积分数量格式错误: {}",
                other
            ))),
        }
    }
}

impl TryFrom<i64> for PointsAmount {
    type Error = MembershipError;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<serde_json::Value> for PointsAmount {
    type Error = MembershipError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        Self::from_json(&value)
    }
}

impl From<PointsAmount> for i64 {
    fn from(amount: PointsAmount) -> Self {
        amount.0
    }
}

impl FromStr for PointsAmount {
    type Err = MembershipError;

    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim().parse::<i64>().map_err(|_| {
            MembershipError::Validation(format!("积分数量必须为整数: {:?}", s))
        })?;
        Self::new(value)
    }
}

impl fmt::Display for PointsAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// 等级变化
// ---------------------------------------------------------------------------

/// 等级变化方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TierChange {
    Upgrade,
    Downgrade,
    /// 同门槛或无法比较（原等级已删除）
    Lateral,
}

impl TierChange {
    /// 比较两个等级引用，未变化返回 None
    pub fn between(catalog: &TierCatalog, before: Option<i64>, after: Option<i64>) -> Option<Self> {
        if before == after {
            return None;
        }
        let threshold = |id: Option<i64>| id.and_then(|id| catalog.get(id)).map(|t| t.points_required);
        match (threshold(before), threshold(after)) {
            (Some(b), Some(a)) if a > b => Some(Self::Upgrade),
            (Some(b), Some(a)) if a < b => Some(Self::Downgrade),
            (None, Some(_)) if before.is_none() => Some(Self::Upgrade),
            (Some(_), None) if after.is_none() => Some(Self::Downgrade),
            _ => Some(Self::Lateral),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upgrade => "upgrade",
            Self::Downgrade => "downgrade",
            Self::Lateral => "lateral",
        }
    }
}

// ---------------------------------------------------------------------------
// 账本操作
// ---------------------------------------------------------------------------

/// 一次积分变动的前后信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerOutcome {
    pub previous_balance: i64,
    pub previous_tier_id: Option<i64>,
    pub new_balance: i64,
    pub new_tier_id: Option<i64>,
}

impl LedgerOutcome {
    fn capture(account: &MemberAccount, previous_balance: i64, previous_tier_id: Option<i64>) -> Self {
        Self {
            previous_balance,
            previous_tier_id,
            new_balance: account.points_balance,
            new_tier_id: account.current_tier_id,
        }
    }

    pub fn tier_changed(&self) -> bool {
        self.previous_tier_id != self.new_tier_id
    }
}

fn ensure_not_cancelled(account: &MemberAccount) -> Result<()> {
    if account.is_cancelled() {
        return Err(MembershipError::AccountCancelled(account.user_id.clone()));
    }
    Ok(())
}

/// 增加积分
pub fn add(
    account: &mut MemberAccount,
    amount: PointsAmount,
    catalog: &TierCatalog,
    now: DateTime<Utc>,
) -> Result<LedgerOutcome> {
    ensure_not_cancelled(account)?;

    let previous_balance = account.points_balance;
    let previous_tier_id = account.current_tier_id;

    account.points_balance = previous_balance.checked_add(amount.value()).ok_or_else(|| {
        MembershipError::Validation(format!(
            "积分溢出: {} + {}",
            previous_balance,
            amount.value()
        ))
    })?;
    account.updated_at = now;
    reconcile_tier(account, catalog, now);

    Ok(LedgerOutcome::capture(account, previous_balance, previous_tier_id))
}

/// 扣减积分，最低扣到 0
pub fn subtract(
    account: &mut MemberAccount,
    amount: PointsAmount,
    catalog: &TierCatalog,
    now: DateTime<Utc>,
) -> Result<LedgerOutcome> {
    ensure_not_cancelled(account)?;

    let previous_balance = account.points_balance;
    let previous_tier_id = account.current_tier_id;

    account.points_balance = (previous_balance - amount.value()).max(0);
    account.updated_at = now;
    reconcile_tier(account, catalog, now);

    Ok(LedgerOutcome::capture(account, previous_balance, previous_tier_id))
}

/// 积分清零，仅供取消会员使用，不做状态检查
pub fn set_zero(account: &mut MemberAccount, now: DateTime<Utc>) {
    account.points_balance = 0;
    account.updated_at = now;
}

/// active 账户按当前积分重新判定等级，返回等级是否变化
///
/// 非 active 账户保持原等级不变
pub fn reconcile_tier(account: &mut MemberAccount, catalog: &TierCatalog, now: DateTime<Utc>) -> bool {
    if !account.is_active() {
        return false;
    }
    let resolved = catalog.resolve(account.points_balance).map(|t| t.id);
    if resolved == account.current_tier_id {
        return false;
    }
    account.current_tier_id = resolved;
    account.updated_at = now;
    true
}

/// 当前等级已从目录删除时重新分配，返回等级是否变化
///
/// active 账户按积分重新判定，其余账户移到最低等级（目录为空时置空）
pub fn reassign_dangling_tier(
    account: &mut MemberAccount,
    catalog: &TierCatalog,
    now: DateTime<Utc>,
) -> bool {
    let Some(tier_id) = account.current_tier_id else {
        return false;
    };
    if catalog.get(tier_id).is_some() {
        return false;
    }
    account.current_tier_id = if account.is_active() {
        catalog.resolve(account.points_balance).map(|t| t.id)
    } else {
        catalog.floor().map(|t| t.id)
    };
    account.updated_at = now;
    true
}

/// 当前等级失效时才重新判定，返回等级是否变化
///
/// 失效指：等级已删除或停用、门槛高于当前积分、目录非空但账户没有等级。
/// 用户主动选择的较低等级仍然有效，保持不变。
/// 非 active 账户只处理等级已删除的情况。
pub fn repair_tier(account: &mut MemberAccount, catalog: &TierCatalog, now: DateTime<Utc>) -> bool {
    if !account.is_active() {
        return reassign_dangling_tier(account, catalog, now);
    }
    let valid = match account.current_tier_id {
        Some(id) => catalog
            .get_active(id)
            .is_some_and(|t| t.qualifies(account.points_balance)),
        None => catalog.active_tiers().is_empty(),
    };
    if valid {
        return false;
    }
    reconcile_tier(account, catalog, now)
}
