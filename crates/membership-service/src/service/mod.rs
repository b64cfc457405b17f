//! 服务层
//!
//! 实现会员积分业务逻辑，协调目录与账户仓储。
//!
//! ## 模块结构
//!
//! - `dto`: 数据传输对象定义
//! - `account_writer`: 账户读取-修改-提交流程（乐观锁 + 冲突重试）
//! - `catalog_service`: 等级与奖励管理
//! - `membership_service`: 会员生命周期与积分变动
//! - `redemption_service`: 奖励兑换与兑换历史

pub mod account_writer;
pub mod catalog_service;
pub mod dto;
pub mod membership_service;
pub mod redemption_service;

use std::sync::Arc;

use sqlx::PgPool;

use loyalty_shared::config::MembershipConfig;

use crate::repository::{
    AccountRepository, AccountRepositoryTrait, MemoryAccountRepository, MemoryTierRepository,
    TierRepository, TierRepositoryTrait,
};

pub use account_writer::{AccountWriter, Mutation, WriteOutcome};
pub use catalog_service::CatalogService;
pub use dto::*;
pub use membership_service::MembershipService;
pub use redemption_service::RedemptionService;

/// 会员积分核心
///
/// 共享同一组仓储的三个服务
pub struct LoyaltyCore {
    pub catalog: CatalogService,
    pub membership: MembershipService,
    pub redemption: RedemptionService,
}

impl LoyaltyCore {
    pub fn new(
        tiers: Arc<dyn TierRepositoryTrait>,
        accounts: Arc<dyn AccountRepositoryTrait>,
        config: &MembershipConfig,
    ) -> Self {
        let writer = AccountWriter::new(
            tiers.clone(),
            accounts.clone(),
            config.conflict_retry.policy(),
        );

        Self {
            catalog: CatalogService::new(tiers.clone(), accounts.clone(), writer.clone()),
            membership: MembershipService::new(
                tiers.clone(),
                accounts.clone(),
                writer.clone(),
                config.term_days,
            ),
            redemption: RedemptionService::new(tiers, accounts, writer),
        }
    }

    /// PostgreSQL 存储
    pub fn postgres(pool: PgPool, config: &MembershipConfig) -> Self {
        Self::new(
            Arc::new(TierRepository::new(pool.clone())),
            Arc::new(AccountRepository::new(pool)),
            config,
        )
    }

    /// 内存存储
    pub fn in_memory(config: &MembershipConfig) -> Self {
        Self::new(
            Arc::new(MemoryTierRepository::new()),
            Arc::new(MemoryAccountRepository::new()),
            config,
        )
    }
}
