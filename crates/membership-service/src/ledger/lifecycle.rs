//! 会员状态迁移
//!
//! - cancelled：积分清零、等级重置为最低等级（不可恢复）
//! - active：按当前积分重新判定等级
//! - inactive：仅修改状态

use chrono::{DateTime, Utc};

use super::{reconcile_tier, set_zero};
use crate::catalog::TierCatalog;
use crate::models::{MemberAccount, MembershipStatus};

/// 将账户迁移到目标状态
pub fn apply_status(
    account: &mut MemberAccount,
    status: MembershipStatus,
    catalog: &TierCatalog,
    now: DateTime<Utc>,
) {
    account.membership_status = status;
    account.updated_at = now;

    match status {
        MembershipStatus::Cancelled => {
            set_zero(account, now);
            account.current_tier_id = catalog.floor().map(|t| t.id);
        }
        MembershipStatus::Active => {
            reconcile_tier(account, catalog, now);
        }
        MembershipStatus::Inactive => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TierDefinition, TierType};
    use chrono::Duration;

    fn tier(id: i64, points_required: i64) -> TierDefinition {
        TierDefinition {
            id,
            name: format!("tier-{}", id),
            tier_type: TierType::Basic,
            description: String::new(),
            points_required,
            benefits: vec![],
            rewards: vec![],
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn catalog() -> TierCatalog {
        TierCatalog::new(1, vec![tier(1, 0), tier(2, 100), tier(3, 200)])
    }

    fn account(points: i64, tier_id: i64, status: MembershipStatus) -> MemberAccount {
        let mut account = MemberAccount::register("user-1", Some(tier_id), Duration::days(30), Utc::now()).unwrap();
        account.points_balance = points;
        account.membership_status = status;
        account
    }

    #[test]
    fn test_cancel_resets_points_and_tier() {
        let mut acc = account(250, 3, MembershipStatus::Active);
        apply_status(&mut acc, MembershipStatus::Cancelled, &catalog(), Utc::now());

        assert_eq!(acc.membership_status, MembershipStatus::Cancelled);
        assert_eq!(acc.points_balance, 0);
        assert_eq!(acc.current_tier_id, Some(1));
    }

    #[test]
    fn test_cancel_with_empty_catalog_clears_tier() {
        let mut acc = account(250, 3, MembershipStatus::Active);
        apply_status(&mut acc, MembershipStatus::Cancelled, &TierCatalog::default(), Utc::now());
        assert_eq!(acc.current_tier_id, None);
    }

    #[test]
    fn test_activate_resolves_tier() {
        let mut acc = account(150, 1, MembershipStatus::Inactive);
        apply_status(&mut acc, MembershipStatus::Active, &catalog(), Utc::now());

        assert_eq!(acc.membership_status, MembershipStatus::Active);
        assert_eq!(acc.current_tier_id, Some(2));
    }

    #[test]
    fn test_reactivate_cancelled_uses_zero_balance() {
        let mut acc = account(0, 1, MembershipStatus::Cancelled);
        apply_status(&mut acc, MembershipStatus::Active, &catalog(), Utc::now());
        assert_eq!(acc.current_tier_id, Some(1));
        assert_eq!(acc.points_balance, 0);
    }

    #[test]
    fn test_deactivate_keeps_points_and_tier() {
        let mut acc = account(150, 2, MembershipStatus::Active);
        apply_status(&mut acc, MembershipStatus::Inactive, &catalog(), Utc::now());

        assert_eq!(acc.membership_status, MembershipStatus::Inactive);
        assert_eq!(acc.points_balance, 150);
        assert_eq!(acc.current_tier_id, Some(2));
    }
}
