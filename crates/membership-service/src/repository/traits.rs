//! 仓储 Trait 定义
//!
//! 定义仓储接口，便于服务层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;

use crate::catalog::TierCatalog;
use crate::error::Result;
use crate::models::{MemberAccount, NewTier, RedemptionRecord, TierDefinition};

/// 账户写入请求
///
/// `account` 为修改后的完整账户，`expected_version` 为读取时的版本号。
/// 存储层以版本号做比较交换：版本不一致时整体放弃并返回 `ConcurrencyConflict`。
/// `redemption` 与账户更新在同一事务内写入。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountUpdate {
    pub account: MemberAccount,
    pub expected_version: i64,
    pub redemption: Option<RedemptionRecord>,
}

impl AccountUpdate {
    pub fn new(account: MemberAccount, expected_version: i64) -> Self {
        Self {
            account,
            expected_version,
            redemption: None,
        }
    }

    pub fn with_redemption(mut self, record: RedemptionRecord) -> Self {
        self.redemption = Some(record);
        self
    }
}

/// 等级目录仓储接口
///
/// 每次写操作都使目录版本号加一
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TierRepositoryTrait: Send + Sync {
    /// 读取完整目录（含停用等级）
    async fn load_catalog(&self) -> Result<TierCatalog>;
    async fn get_tier(&self, tier_id: i64) -> Result<Option<TierDefinition>>;
    /// 名称重复返回 `DuplicateTierName`
    async fn create_tier(&self, tier: &NewTier) -> Result<TierDefinition>;
    /// 整体替换，等级不存在返回 `TierNotFound`。
    /// 以 `tier.updated_at` 做比较交换：与存储值不一致时返回 `ConcurrencyConflict`，
    /// 成功后存储的 `updated_at` 严格递增
    async fn update_tier(&self, tier: &TierDefinition) -> Result<TierDefinition>;
    /// 返回是否确实删除
    async fn delete_tier(&self, tier_id: i64) -> Result<bool>;
}

/// 会员账户仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountRepositoryTrait: Send + Sync {
    async fn get_account(&self, user_id: &str) -> Result<Option<MemberAccount>>;
    /// 账户已存在返回 `AccountAlreadyExists`
    async fn create_account(&self, account: &MemberAccount) -> Result<MemberAccount>;
    /// 乐观锁提交，成功后返回版本号加一的账户
    async fn commit(&self, update: &AccountUpdate) -> Result<MemberAccount>;
    async fn list_accounts(&self) -> Result<Vec<MemberAccount>>;
    async fn list_accounts_by_tier(&self, tier_id: i64) -> Result<Vec<MemberAccount>>;
    /// 按兑换时间升序
    async fn list_redemptions(&self, user_id: &str) -> Result<Vec<RedemptionRecord>>;
}
