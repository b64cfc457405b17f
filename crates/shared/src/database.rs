//! 数据库连接
//!
//! PostgreSQL 连接池与 schema 迁移。迁移脚本位于工作区根目录的 migrations/，编译期嵌入二进制。

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};

use crate::config::DatabaseConfig;
use crate::error::Result;

/// 连接池包装
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 建立连接池
    #[instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!("数据库连接池已建立");
        Ok(Self { pool })
    }

    /// 建立连接池并应用迁移
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        let db = Self::connect(config).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 应用全部未执行的迁移
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("数据库迁移已完成");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("数据库连接池已关闭");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // 需要 DATABASE_URL
    async fn test_open_applies_migrations() {
        let url = std::env::var("DATABASE_URL").expect("需要设置 DATABASE_URL");
        let db = Database::open(&DatabaseConfig {
            url,
            ..Default::default()
        })
        .await
        .unwrap();

        let version: i64 = sqlx::query_scalar("SELECT version FROM tier_catalog_state WHERE id = 1")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert!(version >= 0);
        db.close().await;
    }
}
