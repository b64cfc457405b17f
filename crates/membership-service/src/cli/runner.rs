//! 命令执行器
//!
//! 把命令行参数转化为服务调用，结果统一序列化为 JSON

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::commands::{
    AccountCommand, CatalogCommand, Commands, PointsCommand, RewardsCommand, TierCommand,
};
use crate::ledger::PointsAmount;
use crate::models::MembershipStatus;
use crate::service::LoyaltyCore;

/// 命令执行器
pub struct CommandRunner {
    core: LoyaltyCore,
    catalog_path: String,
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).context("序列化命令结果失败")
}

impl CommandRunner {
    pub fn new(core: LoyaltyCore, catalog_path: impl Into<String>) -> Self {
        Self {
            core,
            catalog_path: catalog_path.into(),
        }
    }

    pub fn core(&self) -> &LoyaltyCore {
        &self.core
    }

    /// 执行命令，返回 JSON 结果
    pub async fn execute(&self, command: Commands) -> Result<Value> {
        match command {
            Commands::Catalog(cmd) => self.run_catalog(cmd).await,
            Commands::Account(cmd) => self.run_account(cmd).await,
            Commands::Points(cmd) => self.run_points(cmd).await,
            Commands::Tier(TierCommand::Choose { user_id, tier_id }) => {
                to_json(&self.core.membership.choose_tier(&user_id, tier_id).await?)
            }
            Commands::Rewards(cmd) => self.run_rewards(cmd).await,
            Commands::Reconcile => to_json(&self.core.membership.reconcile_all().await?),
        }
    }

    async fn run_catalog(&self, command: CatalogCommand) -> Result<Value> {
        match command {
            CatalogCommand::Sync { file } => {
                let path = file.unwrap_or_else(|| self.catalog_path.clone());
                info!(path = %path, "同步等级目录");
                let report = self
                    .core
                    .catalog
                    .sync_catalog_file(&path)
                    .await
                    .with_context(|| format!("同步目录文件失败: {}", path))?;
                to_json(&report)
            }
            CatalogCommand::List => to_json(&self.core.catalog.list_active_tiers().await?),
            CatalogCommand::Show { tier_id } => to_json(&self.core.catalog.get_tier(tier_id).await?),
            CatalogCommand::Delete { tier_id } => {
                to_json(&self.core.catalog.delete_tier(tier_id).await?)
            }
            CatalogCommand::RewardAvailability {
                tier_id,
                reward_id,
                available,
            } => to_json(
                &self
                    .core
                    .catalog
                    .set_reward_availability(tier_id, reward_id, available)
                    .await?,
            ),
        }
    }

    async fn run_account(&self, command: AccountCommand) -> Result<Value> {
        match command {
            AccountCommand::Register { user_id } => {
                to_json(&self.core.membership.register(&user_id).await?)
            }
            AccountCommand::Show { user_id } => {
                to_json(&self.core.membership.get_snapshot(&user_id).await?)
            }
            AccountCommand::Status { user_id, status } => {
                let status: MembershipStatus = status.parse()?;
                to_json(&self.core.membership.set_status(&user_id, status).await?)
            }
            AccountCommand::List => to_json(&self.core.membership.list_all().await?),
        }
    }

    async fn run_points(&self, command: PointsCommand) -> Result<Value> {
        match command {
            PointsCommand::Adjust {
                user_id,
                amount,
                op,
            } => {
                let amount: PointsAmount = amount.parse()?;
                to_json(&self.core.membership.adjust_points(&user_id, amount, &op).await?)
            }
            PointsCommand::Credit { user_id, amount } => {
                let amount: PointsAmount = amount.parse()?;
                to_json(&self.core.membership.credit_points(&user_id, amount).await?)
            }
        }
    }

    async fn run_rewards(&self, command: RewardsCommand) -> Result<Value> {
        match command {
            RewardsCommand::List { user_id } => {
                to_json(&self.core.redemption.list_available_rewards(&user_id).await?)
            }
            RewardsCommand::Redeem {
                user_id,
                tier_id,
                reward_id,
            } => to_json(
                &self
                    .core
                    .redemption
                    .redeem_reward(&user_id, tier_id, reward_id)
                    .await?,
            ),
            RewardsCommand::History { user_id } => {
                to_json(&self.core.redemption.list_redemption_history(&user_id).await?)
            }
        }
    }
}
