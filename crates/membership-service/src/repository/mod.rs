//! 数据仓储层
//!
//! 提供等级目录与会员账户的数据访问接口，封装存储细节。
//!
//! ## 设计原则
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - PostgreSQL 实现使用 SQLx，内存实现使用 DashMap / RwLock，二者语义一致
//! - 账户写入一律通过版本号比较交换提交
//! - 定义 trait 接口以支持 mock 测试

mod account_repo;
mod memory;
mod tier_repo;
mod traits;

pub use account_repo::AccountRepository;
pub use memory::{MemoryAccountRepository, MemoryTierRepository};
pub use tier_repo::TierRepository;
pub use traits::*;
