//! CLI 命令定义
//!
//! 使用 clap derive 宏定义管理端命令行接口结构

use clap::{Parser, Subcommand};

/// 会员积分管理工具
#[derive(Parser, Debug)]
#[command(name = "loyalty-admin")]
#[command(version, about = "会员等级与积分兑换管理工具")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)，覆盖配置文件
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// 使用内存存储，不连接数据库（用于校验目录文件或演示）。
    /// 数据只在本次调用内有效，进程退出即丢失，之后的调用看不到任何账户、等级或兑换记录
    #[arg(long)]
    pub in_memory: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// 子命令
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 等级目录管理
    #[command(subcommand)]
    Catalog(CatalogCommand),

    /// 会员账户管理
    #[command(subcommand)]
    Account(AccountCommand),

    /// 积分变动
    #[command(subcommand)]
    Points(PointsCommand),

    /// 等级选择
    #[command(subcommand)]
    Tier(TierCommand),

    /// 奖励与兑换
    #[command(subcommand)]
    Rewards(RewardsCommand),

    /// 对全部 active 会员按当前积分重新定级
    Reconcile,
}

#[derive(Subcommand, Debug)]
pub enum CatalogCommand {
    /// 同步权威目录文件（按名称新建或更新，不删除）
    Sync {
        /// 目录文件路径，默认使用配置中的 membership.catalog_path
        #[arg(short, long)]
        file: Option<String>,
    },
    /// 列出启用中的等级
    List,
    /// 查看单个等级
    Show { tier_id: i64 },
    /// 删除等级并重新分配引用该等级的会员
    Delete { tier_id: i64 },
    /// 奖励上下架
    RewardAvailability {
        tier_id: i64,
        reward_id: i64,
        /// true 上架 / false 下架
        #[arg(action = clap::ArgAction::Set)]
        available: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum AccountCommand {
    /// 注册会员
    Register { user_id: String },
    /// 查看会员快照
    Show { user_id: String },
    /// 修改会员状态 (inactive / active / cancelled)
    Status { user_id: String, status: String },
    /// 列出全部会员
    List,
}

#[derive(Subcommand, Debug)]
pub enum PointsCommand {
    /// 管理端积分调整
    Adjust {
        user_id: String,
        /// 正整数
        amount: String,
        /// add / subtract
        op: String,
    },
    /// 外部积分入账
    Credit { user_id: String, amount: String },
}

#[derive(Subcommand, Debug)]
pub enum TierCommand {
    /// 选择等级（门槛不超过当前积分）
    Choose { user_id: String, tier_id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum RewardsCommand {
    /// 可兑换奖励
    List { user_id: String },
    /// 兑换奖励
    Redeem {
        user_id: String,
        tier_id: i64,
        reward_id: i64,
    },
    /// 兑换历史
    History { user_id: String },
}
