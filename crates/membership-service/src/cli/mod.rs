//! CLI 模块
//!
//! 管理端命令行接口，结果以 JSON 输出到标准输出：
//!
//! - `catalog` - 同步权威目录文件、查看/删除等级、奖励上下架
//! - `account` - 注册、查看、修改状态、列出全部会员
//! - `points` - 管理端积分调整、外部积分入账
//! - `tier` - 选择等级
//! - `rewards` - 可兑换奖励、兑换、兑换历史
//! - `reconcile` - 批量重新定级
//!
//! # 使用示例
//!
//! ```bash
//! loyalty-admin catalog sync
//! loyalty-admin account register user-001
//! loyalty-admin points adjust user-001 150 add
//! loyalty-admin rewards redeem user-001 2 1
//! ```

pub mod commands;
pub mod runner;

pub use commands::{Cli, Commands};
pub use runner::CommandRunner;
