//! 等级目录管理集成测试
//!
//! 覆盖权威目录文件同步、等级与奖励维护、删除等级后的账户重新分配

use std::sync::Arc;

use loyalty_shared::config::MembershipConfig;
use membership::catalog::{RewardSeed, TierSeed};
use membership::dto::{CreateTierRequest, NewRewardRequest, UpdateTierRequest};
use membership::repository::TierRepositoryTrait;
use membership::{
    Benefit, CatalogSeed, LoyaltyCore, MembershipError, MembershipStatus, MemoryAccountRepository,
    MemoryTierRepository, PointsAmount, TierType,
};

const CATALOG_FILE: &str = "../../config/tier_catalog.toml";

fn core() -> LoyaltyCore {
    LoyaltyCore::in_memory(&MembershipConfig::default())
}

fn tier_request(name: &str, points_required: i64) -> CreateTierRequest {
    CreateTierRequest {
        name: name.to_string(),
        tier_type: TierType::Basic,
        description: String::new(),
        points_required,
        benefits: vec![],
        rewards: vec![],
        is_active: true,
    }
}

fn reward_seed(name: &str, points_cost: i64) -> RewardSeed {
    RewardSeed {
        name: name.to_string(),
        description: String::new(),
        points_cost,
        is_available: true,
    }
}

fn tier_seed(name: &str, points_required: i64, rewards: Vec<RewardSeed>) -> TierSeed {
    TierSeed {
        name: name.to_string(),
        tier_type: TierType::Gold,
        description: String::new(),
        points_required,
        benefits: vec![Benefit {
            description: "生日礼包".to_string(),
            value: None,
        }],
        rewards,
        is_active: true,
    }
}

async fn active_member(core: &LoyaltyCore, user_id: &str, points: i64) {
    core.membership.register(user_id).await.unwrap();
    core.membership
        .set_status(user_id, MembershipStatus::Active)
        .await
        .unwrap();
    if points > 0 {
        core.membership
            .credit_points(user_id, PointsAmount::new(points).unwrap())
            .await
            .unwrap();
    }
}

// ==================== 目录文件同步 ====================

#[tokio::test]
async fn test_sync_catalog_file_creates_canonical_ladder() {
    let core = core();

    let report = core.catalog.sync_catalog_file(CATALOG_FILE).await.unwrap();
    assert_eq!(report.created, vec!["Basic", "Gold", "Platinum", "Diamond"]);
    assert!(report.updated.is_empty());

    let tiers = core.catalog.list_active_tiers().await.unwrap();
    let ladder: Vec<(&str, i64)> = tiers
        .iter()
        .map(|t| (t.name.as_str(), t.points_required))
        .collect();
    assert_eq!(
        ladder,
        vec![("Basic", 0), ("Gold", 100), ("Platinum", 200), ("Diamond", 300)]
    );
    assert!(tiers.iter().all(|t| !t.rewards.is_empty()));

    // 重复同步不产生变更
    let again = core.catalog.sync_catalog_file(CATALOG_FILE).await.unwrap();
    assert!(again.created.is_empty());
    assert!(again.updated.is_empty());
    assert_eq!(again.unchanged.len(), 4);
    assert_eq!(again.catalog_version, report.catalog_version);
}

#[tokio::test]
async fn test_sync_missing_file_is_validation_error() {
    let core = core();
    let err = core
        .catalog
        .sync_catalog_file("does/not/exist.toml")
        .await
        .unwrap_err();
    assert!(matches!(err, MembershipError::Validation(_)));
}

#[tokio::test]
async fn test_sync_updates_by_name_and_keeps_reward_ids() {
    let core = core();
    let seed = CatalogSeed {
        tiers: vec![
            tier_seed("Basic", 0, vec![]),
            tier_seed("Gold", 100, vec![reward_seed("免费咖啡", 120), reward_seed("电影票", 90)]),
        ],
    };
    core.catalog.sync_catalog(&seed).await.unwrap();
    let gold = core
        .catalog
        .catalog()
        .await
        .unwrap()
        .find_by_name("Gold")
        .cloned()
        .unwrap();

    let seed = CatalogSeed {
        tiers: vec![
            tier_seed("Basic", 0, vec![]),
            tier_seed(
                "Gold",
                120,
                vec![reward_seed("电影票", 95), reward_seed("年度礼盒", 200)],
            ),
        ],
    };
    let report = core.catalog.sync_catalog(&seed).await.unwrap();
    assert_eq!(report.updated, vec!["Gold"]);
    assert_eq!(report.unchanged, vec!["Basic"]);

    let updated = core.catalog.get_tier(gold.id).await.unwrap();
    assert_eq!(updated.points_required, 120);
    let rewards: Vec<(i64, &str, i64)> = updated
        .rewards
        .iter()
        .map(|r| (r.id, r.name.as_str(), r.points_cost))
        .collect();
    // 文件中缺失的奖励不删除
    assert_eq!(
        rewards,
        vec![(1, "免费咖啡", 120), (2, "电影票", 95), (3, "年度礼盒", 200)]
    );
}

#[tokio::test]
async fn test_sync_rejects_duplicate_names_without_writing() {
    let core = core();
    let seed = CatalogSeed {
        tiers: vec![tier_seed("Gold", 100, vec![]), tier_seed("Gold", 200, vec![])],
    };

    let err = core.catalog.sync_catalog(&seed).await.unwrap_err();
    assert!(matches!(err, MembershipError::DuplicateTierName(ref name) if name == "Gold"));
    assert!(core.catalog.list_active_tiers().await.unwrap().is_empty());
}

// ==================== 等级维护 ====================

#[tokio::test]
async fn test_create_tier_validation() {
    let core = core();

    assert!(matches!(
        core.catalog.create_tier(tier_request("", 10)).await,
        Err(MembershipError::Validation(_))
    ));
    assert!(matches!(
        core.catalog.create_tier(tier_request("Gold", -1)).await,
        Err(MembershipError::Validation(_))
    ));

    core.catalog.create_tier(tier_request("Gold", 100)).await.unwrap();
    assert!(matches!(
        core.catalog.create_tier(tier_request("Gold", 200)).await,
        Err(MembershipError::DuplicateTierName(_))
    ));
    assert!(matches!(
        core.catalog.get_tier(9999).await,
        Err(MembershipError::TierNotFound(9999))
    ));
}

#[tokio::test]
async fn test_catalog_version_increments_on_every_change() {
    let core = core();
    let v0 = core.catalog.catalog().await.unwrap().version();

    let tier = core.catalog.create_tier(tier_request("Gold", 100)).await.unwrap();
    let v1 = core.catalog.catalog().await.unwrap().version();
    assert!(v1 > v0);

    core.catalog
        .update_tier(
            tier.id,
            UpdateTierRequest {
                description: Some("黄金会员".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let v2 = core.catalog.catalog().await.unwrap().version();
    assert!(v2 > v1);

    core.catalog.delete_tier(tier.id).await.unwrap();
    assert!(core.catalog.catalog().await.unwrap().version() > v2);
}

#[tokio::test]
async fn test_reward_ids_are_never_reused() {
    let core = core();
    let mut request = tier_request("Gold", 100);
    request.rewards = vec![
        NewRewardRequest {
            name: "免费咖啡".to_string(),
            description: String::new(),
            points_cost: 120,
            is_available: true,
        },
        NewRewardRequest {
            name: "电影票".to_string(),
            description: String::new(),
            points_cost: 90,
            is_available: true,
        },
    ];
    let tier = core.catalog.create_tier(request).await.unwrap();
    assert_eq!(tier.rewards.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);

    let retired = core
        .catalog
        .set_reward_availability(tier.id, 2, false)
        .await
        .unwrap();
    assert!(!retired.is_available);

    let added = core
        .catalog
        .add_reward(
            tier.id,
            NewRewardRequest {
                name: "年度礼盒".to_string(),
                description: String::new(),
                points_cost: 200,
                is_available: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(added.id, 3);

    assert!(matches!(
        core.catalog.set_reward_availability(tier.id, 42, true).await,
        Err(MembershipError::RewardNotFound { reward_id: 42, .. })
    ));
}

#[tokio::test]
async fn test_disabled_tier_is_repaired_on_read() {
    let core = core();
    let basic = core.catalog.create_tier(tier_request("Basic", 0)).await.unwrap();
    let gold = core.catalog.create_tier(tier_request("Gold", 100)).await.unwrap();
    active_member(&core, "user-1", 150).await;

    core.catalog
        .update_tier(
            gold.id,
            UpdateTierRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let active: Vec<i64> = core
        .catalog
        .list_active_tiers()
        .await
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(active, vec![basic.id]);

    let snapshot = core.membership.get_snapshot("user-1").await.unwrap();
    assert_eq!(snapshot.tier.map(|t| t.id), Some(basic.id));
    assert_eq!(snapshot.points, 150);
}

// ==================== 删除等级 ====================

#[tokio::test]
async fn test_delete_tier_reassigns_accounts() {
    let core = core();
    let basic = core.catalog.create_tier(tier_request("Basic", 0)).await.unwrap();
    let gold = core.catalog.create_tier(tier_request("Gold", 100)).await.unwrap();
    let platinum = core.catalog.create_tier(tier_request("Platinum", 200)).await.unwrap();

    active_member(&core, "user-a", 150).await;
    active_member(&core, "user-c", 250).await;
    core.membership.register("user-b").await.unwrap();

    // active 账户按剩余目录重新定级
    let report = core.catalog.delete_tier(gold.id).await.unwrap();
    assert_eq!(report.tier_id, gold.id);
    assert_eq!(report.reassigned_accounts, 1);
    let snapshot = core.membership.get_snapshot("user-a").await.unwrap();
    assert_eq!(snapshot.tier.map(|t| t.id), Some(basic.id));

    // 非 active 账户移到新的最低等级
    let report = core.catalog.delete_tier(basic.id).await.unwrap();
    assert_eq!(report.reassigned_accounts, 2);
    let snapshot = core.membership.get_snapshot("user-b").await.unwrap();
    assert_eq!(snapshot.status, MembershipStatus::Inactive);
    assert_eq!(snapshot.tier.map(|t| t.id), Some(platinum.id));

    let snapshot = core.membership.get_snapshot("user-c").await.unwrap();
    assert_eq!(snapshot.tier.map(|t| t.id), Some(platinum.id));

    assert!(matches!(
        core.catalog.delete_tier(gold.id).await,
        Err(MembershipError::TierNotFound(_))
    ));

    // 已删除等级的 id 不会复用
    let again = core.catalog.create_tier(tier_request("Gold", 100)).await.unwrap();
    assert!(again.id > platinum.id);
}

#[tokio::test]
async fn test_deleting_last_tier_leaves_accounts_without_tier() {
    let core = core();
    let only = core.catalog.create_tier(tier_request("Basic", 0)).await.unwrap();
    active_member(&core, "user-1", 10).await;

    let report = core.catalog.delete_tier(only.id).await.unwrap();
    assert_eq!(report.reassigned_accounts, 1);

    let snapshot = core.membership.get_snapshot("user-1").await.unwrap();
    assert!(snapshot.tier.is_none());
    assert_eq!(snapshot.points, 10);
}

#[tokio::test]
async fn test_dangling_tier_references_are_repaired_after_interrupted_delete() {
    let tiers = Arc::new(MemoryTierRepository::new());
    let core = LoyaltyCore::new(
        tiers.clone(),
        Arc::new(MemoryAccountRepository::new()),
        &MembershipConfig::default(),
    );
    let basic = core.catalog.create_tier(tier_request("Basic", 0)).await.unwrap();
    let gold = core.catalog.create_tier(tier_request("Gold", 100)).await.unwrap();

    active_member(&core, "user-a", 150).await;
    core.membership.register("user-b").await.unwrap();
    core.membership.register("user-c").await.unwrap();
    core.membership
        .set_status("user-c", MembershipStatus::Cancelled)
        .await
        .unwrap();

    // 等级已从目录移除，但账户尚未重新分配
    assert!(tiers.delete_tier(basic.id).await.unwrap());

    // 读取时校正非 active 账户的悬空等级
    let snapshot = core.membership.get_snapshot("user-b").await.unwrap();
    assert_eq!(snapshot.status, MembershipStatus::Inactive);
    assert_eq!(snapshot.tier.map(|t| t.id), Some(gold.id));

    // 批量定级补齐其余账户
    let report = core.membership.reconcile_all().await.unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.reassigned, 1);
    let snapshot = core.membership.get_snapshot("user-c").await.unwrap();
    assert_eq!(snapshot.status, MembershipStatus::Cancelled);
    assert_eq!(snapshot.tier.map(|t| t.id), Some(gold.id));

    let report = core.membership.reconcile_all().await.unwrap();
    assert_eq!(report.reassigned, 0);
}
