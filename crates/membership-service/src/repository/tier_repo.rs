//! 等级目录仓储
//!
//! 等级表 `tier_definitions` 中权益与奖励以 JSONB 存储。
//! 目录版本号保存在单行表 `tier_catalog_state`，与等级变更在同一事务内递增。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use super::traits::TierRepositoryTrait;
use crate::catalog::TierCatalog;
use crate::error::{MembershipError, Result};
use crate::models::{Benefit, NewTier, RewardDefinition, TierDefinition, TierType};

/// 等级表行
#[derive(Debug, sqlx::FromRow)]
struct TierRow {
    id: i64,
    name: String,
    tier_type: TierType,
    description: String,
    points_required: i64,
    benefits: Json<Vec<Benefit>>,
    rewards: Json<Vec<RewardDefinition>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TierRow> for TierDefinition {
    fn from(row: TierRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            tier_type: row.tier_type,
            description: row.description,
            points_required: row.points_required,
            benefits: row.benefits.0,
            rewards: row.rewards.0,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// 名称唯一约束冲突转换为业务错误
fn map_unique_violation(err: sqlx::Error, name: &str) -> MembershipError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            MembershipError::DuplicateTierName(name.to_string())
        }
        _ => MembershipError::Database(err),
    }
}

/// 等级目录仓储
pub struct TierRepository {
    pool: PgPool,
}

impl TierRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 读取完整目录
    ///
    /// 版本号与等级列表在同一个 REPEATABLE READ 只读事务中读取，两条查询看到同一快照
    pub async fn load_catalog(&self) -> Result<TierCatalog> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let version: i64 =
            sqlx::query_scalar("SELECT version FROM tier_catalog_state WHERE id = 1")
                .fetch_optional(&mut *tx)
                .await?
                .unwrap_or(0);

        let rows = sqlx::query_as::<_, TierRow>(
            r#"
            SELECT id, name, tier_type, description, points_required,
                   benefits, rewards, is_active, created_at, updated_at
            FROM tier_definitions
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(TierCatalog::new(
            version,
            rows.into_iter().map(TierDefinition::from).collect(),
        ))
    }

    /// 获取单个等级
    pub async fn get_tier(&self, tier_id: i64) -> Result<Option<TierDefinition>> {
        let row = sqlx::query_as::<_, TierRow>(
            r#"
            SELECT id, name, tier_type, description, points_required,
                   benefits, rewards, is_active, created_at, updated_at
            FROM tier_definitions
            WHERE id = $1
            "#,
        )
        .bind(tier_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TierDefinition::from))
    }

    /// 创建等级
    pub async fn create_tier(&self, tier: &NewTier) -> Result<TierDefinition> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TierRow>(
            r#"
            INSERT INTO tier_definitions
                (name, tier_type, description, points_required, benefits, rewards,
                 is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
            RETURNING id, name, tier_type, description, points_required,
                      benefits, rewards, is_active, created_at, updated_at
            "#,
        )
        .bind(&tier.name)
        .bind(tier.tier_type)
        .bind(&tier.description)
        .bind(tier.points_required)
        .bind(Json(&tier.benefits))
        .bind(Json(&tier.rewards))
        .bind(tier.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, &tier.name))?;

        Self::bump_version_in_tx(&mut tx).await?;
        tx.commit().await?;

        Ok(row.into())
    }

    /// 整体更新等级
    ///
    /// `updated_at` 不一致说明等级在读取后已被修改，返回 `ConcurrencyConflict`
    pub async fn update_tier(&self, tier: &TierDefinition) -> Result<TierDefinition> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TierRow>(
            r#"
            UPDATE tier_definitions
            SET name = $2, tier_type = $3, description = $4, points_required = $5,
                benefits = $6, rewards = $7, is_active = $8,
                updated_at = GREATEST(NOW(), updated_at + INTERVAL '1 microsecond')
            WHERE id = $1 AND updated_at = $9
            RETURNING id, name, tier_type, description, points_required,
                      benefits, rewards, is_active, created_at, updated_at
            "#,
        )
        .bind(tier.id)
        .bind(&tier.name)
        .bind(tier.tier_type)
        .bind(&tier.description)
        .bind(tier.points_required)
        .bind(Json(&tier.benefits))
        .bind(Json(&tier.rewards))
        .bind(tier.is_active)
        .bind(tier.updated_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, &tier.name))?;

        let Some(row) = row else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tier_definitions WHERE id = $1)")
                    .bind(tier.id)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(if exists {
                MembershipError::ConcurrencyConflict
            } else {
                MembershipError::TierNotFound(tier.id)
            });
        };

        Self::bump_version_in_tx(&mut tx).await?;
        tx.commit().await?;

        Ok(row.into())
    }

    /// 删除等级
    pub async fn delete_tier(&self, tier_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM tier_definitions WHERE id = $1")
            .bind(tier_id)
            .execute(&mut *tx)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            Self::bump_version_in_tx(&mut tx).await?;
        }
        tx.commit().await?;

        Ok(deleted)
    }

    /// 在事务中递增目录版本号
    async fn bump_version_in_tx(conn: &mut PgConnection) -> Result<i64> {
        let version: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tier_catalog_state (id, version, updated_at)
            VALUES (1, 1, NOW())
            ON CONFLICT (id) DO UPDATE
                SET version = tier_catalog_state.version + 1, updated_at = NOW()
            RETURNING version
            "#,
        )
        .fetch_one(conn)
        .await?;

        Ok(version)
    }
}

#[async_trait]
impl TierRepositoryTrait for TierRepository {
    async fn load_catalog(&self) -> Result<TierCatalog> {
        self.load_catalog().await
    }

    async fn get_tier(&self, tier_id: i64) -> Result<Option<TierDefinition>> {
        self.get_tier(tier_id).await
    }

    async fn create_tier(&self, tier: &NewTier) -> Result<TierDefinition> {
        self.create_tier(tier).await
    }

    async fn update_tier(&self, tier: &TierDefinition) -> Result<TierDefinition> {
        self.update_tier(tier).await
    }

    async fn delete_tier(&self, tier_id: i64) -> Result<bool> {
        self.delete_tier(tier_id).await
    }
}
