//! 会员积分服务
//!
//! 把累计积分映射为会员等级，维护等级/权益/奖励目录，处理积分兑换奖励并保留不可篡改的兑换历史。
//!
//! ## 核心功能
//!
//! - **等级判定**：按积分选出门槛不超过余额的最高启用等级，否则退回最低等级
//! - **等级资格**：列出当前积分满足的全部等级，支持用户主动选择
//! - **积分账本**：增加、扣减（最低到 0）、清零，active 账户每次变动后同步定级（可能降级）
//! - **奖励兑换**：校验、扣减、重新定级、写入带奖励快照的兑换记录，整体原子提交
//! - **兑换历史**：只追加，奖励目录后续变化不影响历史记录
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `catalog`: 等级目录、等级判定与资格计算、权威目录文件
//! - `ledger`: 积分账本与会员状态迁移
//! - `repository`: PostgreSQL 与内存仓储
//! - `service`: 业务服务层
//! - `cli`: 管理端命令行

pub mod catalog;
pub mod cli;
pub mod error;
pub mod ledger;
pub mod models;
pub mod repository;
pub mod service;

pub use catalog::{CatalogSeed, TierCatalog, eligible_tiers, resolve_tier};
pub use error::{ErrorKind, MembershipError, Result};
pub use ledger::{LedgerOutcome, PointsAmount, TierChange};
pub use models::*;
pub use repository::{
    AccountRepository, AccountUpdate, MemoryAccountRepository, MemoryTierRepository,
    TierRepository,
};
pub use service::{
    CatalogService, LoyaltyCore, MembershipService, RedemptionService, dto,
};
