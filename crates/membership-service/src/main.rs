//! 会员积分管理端入口

use anyhow::Context;
use clap::Parser;
use tracing::warn;

use loyalty_shared::config::AppConfig;
use loyalty_shared::database::Database;
use loyalty_shared::observability;
use membership::LoyaltyCore;
use membership::cli::{Cli, CommandRunner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load("membership-service").context("加载配置失败")?;
    let observability_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name)
        .with_log_level(cli.log_level.as_deref());
    observability::init(&observability_config)?;

    let (core, database) = if cli.in_memory {
        warn!("使用内存存储，本次调用产生的数据在进程退出后丢失");
        (LoyaltyCore::in_memory(&config.membership), None)
    } else {
        let db = Database::open(&config.database)
            .await
            .context("连接数据库或迁移失败")?;
        (
            LoyaltyCore::postgres(db.pool().clone(), &config.membership),
            Some(db),
        )
    };

    let runner = CommandRunner::new(core, config.membership.catalog_path.clone());
    let result = runner.execute(cli.command).await;

    if let Some(db) = database {
        db.close().await;
    }

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
