//! 等级资格
//!
//! 计算用户当前积分可享有的全部等级，以及用户主动选择等级

use chrono::{DateTime, Utc};

use super::resolver::ranked_active;
use crate::error::{MembershipError, Result};
use crate::models::{MemberAccount, MembershipStatus, TierDefinition};

/// 积分满足门槛的全部启用等级，按门槛降序
///
/// 非空时首元素与 `resolve_tier` 的结果一致
pub fn eligible_tiers(points: i64, tiers: &[TierDefinition]) -> Vec<&TierDefinition> {
    ranked_active(tiers)
        .into_iter()
        .filter(|t| t.qualifies(points))
        .collect()
}

/// 用户选择等级
///
/// 等级须存在且启用，门槛不超过当前积分。成功后账户变为 active，
/// 当前等级设为所选等级（允许选择比自动判定更低的等级）。
pub fn choose_tier(
    account: &mut MemberAccount,
    tiers: &[TierDefinition],
    tier_id: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let tier = tiers
        .iter()
        .find(|t| t.id == tier_id && t.is_active)
        .ok_or(MembershipError::TierNotFound(tier_id))?;

    if !tier.qualifies(account.points_balance) {
        return Err(MembershipError::InsufficientPoints {
            required: tier.points_required,
            available: account.points_balance,
        });
    }

    account.membership_status = MembershipStatus::Active;
    account.current_tier_id = Some(tier.id);
    account.updated_at = now;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::resolver::resolve_tier;
    use crate::models::TierType;
    use chrono::Duration;

    fn tier(id: i64, name: &str, points_required: i64) -> TierDefinition {
        TierDefinition {
            id,
            name: name.to_string(),
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

    fn ladder() -> Vec<TierDefinition> {
        vec![
            tier(1, "Basic", 0),
            tier(2, "Gold", 100),
            tier(3, "Platinum", 200),
            tier(4, "Diamond", 300),
        ]
    }

    fn account_with(points: i64) -> MemberAccount {
        let mut account = MemberAccount::register("user-1", Some(1), Duration::days(30), Utc::now()).unwrap();
        account.points_balance = points;
        account
    }

    #[test]
    fn test_eligible_tiers_descending() {
        let tiers = ladder();
        let names: Vec<&str> = eligible_tiers(150, &tiers).iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Gold", "Basic"]);
    }

    #[test]
    fn test_eligible_head_matches_resolve() {
        let tiers = ladder();
        for points in [0, 50, 100, 199, 250, 300, 999] {
            let eligible = eligible_tiers(points, &tiers);
            assert_eq!(eligible.first().map(|t| t.id), resolve_tier(points, &tiers).map(|t| t.id));
        }
    }

    #[test]
    fn test_eligible_empty_below_floor() {
        let tiers = vec![tier(1, "Silver", 50)];
        assert!(eligible_tiers(10, &tiers).is_empty());
    }

    #[test]
    fn test_choose_tier_success() {
        let tiers = ladder();
        let mut account = account_with(250);
        choose_tier(&mut account, &tiers, 2, Utc::now()).unwrap();

        assert_eq!(account.current_tier_id, Some(2));
        assert_eq!(account.membership_status, MembershipStatus::Active);
    }

    #[test]
    fn test_choose_tier_insufficient_points() {
        let tiers = ladder();
        let mut account = account_with(150);
        let before = account.clone();

        let err = choose_tier(&mut account, &tiers, 4, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            MembershipError::InsufficientPoints {
                required: 300,
                available: 150
            }
        ));
        assert_eq!(account, before);
    }

    #[test]
    fn test_choose_tier_not_found_or_inactive() {
        let mut tiers = ladder();
        let mut account = account_with(500);

        assert!(matches!(
            choose_tier(&mut account, &tiers, 42, Utc::now()),
            Err(MembershipError::TierNotFound(42))
        ));

        tiers[1].is_active = false;
        assert!(matches!(
            choose_tier(&mut account, &tiers, 2, Utc::now()),
            Err(MembershipError::TierNotFound(2))
        ));
    }

    #[test]
    fn test_choose_tier_reactivates_cancelled() {
        let tiers = ladder();
        let mut account = account_with(0);
        account.membership_status = MembershipStatus::Cancelled;

        choose_tier(&mut account, &tiers, 1, Utc::now()).unwrap();
        assert_eq!(account.membership_status, MembershipStatus::Active);
    }
}
