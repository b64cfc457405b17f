//! 会员账户仓储
//!
//! 账户写入是基于 `version` 列的比较交换，兑换记录与账户更新在同一事务内提交

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::traits::{AccountRepositoryTrait, AccountUpdate};
use crate::error::{MembershipError, Result};
use crate::models::{MemberAccount, RedemptionRecord, RedemptionStatus, RewardSnapshot};

/// 兑换记录表行
#[derive(Debug, sqlx::FromRow)]
struct RedemptionRow {
    id: Uuid,
    user_id: String,
    tier_id: i64,
    reward_id: i64,
    reward_snapshot: Option<Json<RewardSnapshot>>,
    redeemed_at: DateTime<Utc>,
    points_spent: i64,
    status: RedemptionStatus,
}

impl From<RedemptionRow> for RedemptionRecord {
    fn from(row: RedemptionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            tier_id: row.tier_id,
            reward_id: row.reward_id,
            reward_snapshot: row.reward_snapshot.map(|s| s.0),
            redeemed_at: row.redeemed_at,
            points_spent: row.points_spent,
            status: row.status,
        }
    }
}

/// 会员账户仓储
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 获取账户
    pub async fn get_account(&self, user_id: &str) -> Result<Option<MemberAccount>> {
        let account = sqlx::query_as::<_, MemberAccount>(
            r#"
            SELECT user_id, current_tier_id, membership_status, points_balance,
                   membership_start_date, membership_end_date, version,
                   created_at, updated_at
            FROM member_accounts
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// 创建账户，初始版本号为 1
    pub async fn create_account(&self, account: &MemberAccount) -> Result<MemberAccount> {
        let created = sqlx::query_as::<_, MemberAccount>(
            r#"
            INSERT INTO member_accounts
                (user_id, current_tier_id, membership_status, points_balance,
                 membership_start_date, membership_end_date, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 1, $7, $8)
            ON CONFLICT (user_id) DO NOTHING
            RETURNING user_id, current_tier_id, membership_status, points_balance,
                      membership_start_date, membership_end_date, version,
                      created_at, updated_at
            "#,
        )
        .bind(&account.user_id)
        .bind(account.current_tier_id)
        .bind(account.membership_status)
        .bind(account.points_balance)
        .bind(account.membership_start_date)
        .bind(account.membership_end_date)
        .bind(account.created_at)
        .bind(account.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        created.ok_or_else(|| MembershipError::AccountAlreadyExists(account.user_id.clone()))
    }

    /// 乐观锁提交
    ///
    /// 版本号不一致时事务回滚，返回 `ConcurrencyConflict`
    pub async fn commit(&self, update: &AccountUpdate) -> Result<MemberAccount> {
        let mut tx = self.pool.begin().await?;
        let account = &update.account;

        let stored = sqlx::query_as::<_, MemberAccount>(
            r#"
            UPDATE member_accounts
            SET current_tier_id = $3,
                membership_status = $4,
                points_balance = $5,
                membership_start_date = $6,
                membership_end_date = $7,
                updated_at = $8,
                version = version + 1
            WHERE user_id = $1 AND version = $2
            RETURNING user_id, current_tier_id, membership_status, points_balance,
                      membership_start_date, membership_end_date, version,
                      created_at, updated_at
            "#,
        )
        .bind(&account.user_id)
        .bind(update.expected_version)
        .bind(account.current_tier_id)
        .bind(account.membership_status)
        .bind(account.points_balance)
        .bind(account.membership_start_date)
        .bind(account.membership_end_date)
        .bind(account.updated_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(stored) = stored else {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM member_accounts WHERE user_id = $1)",
            )
            .bind(&account.user_id)
            .fetch_one(&mut *tx)
            .await?;

            return Err(if exists {
                MembershipError::ConcurrencyConflict
            } else {
                MembershipError::AccountNotFound(account.user_id.clone())
            });
        };

        if let Some(record) = &update.redemption {
            Self::insert_redemption_in_tx(&mut tx, record).await?;
        }

        tx.commit().await?;
        Ok(stored)
    }

    /// 在事务中写入兑换记录
    async fn insert_redemption_in_tx(conn: &mut PgConnection, record: &RedemptionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO redemption_records
                (id, user_id, tier_id, reward_id, reward_snapshot, redeemed_at, points_spent, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(&record.user_id)
        .bind(record.tier_id)
        .bind(record.reward_id)
        .bind(record.reward_snapshot.as_ref().map(Json))
        .bind(record.redeemed_at)
        .bind(record.points_spent)
        .bind(record.status)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// 列出全部账户
    pub async fn list_accounts(&self) -> Result<Vec<MemberAccount>> {
        let accounts = sqlx::query_as::<_, MemberAccount>(
            r#"
            SELECT user_id, current_tier_id, membership_status, points_balance,
                   membership_start_date, membership_end_date, version,
                   created_at, updated_at
            FROM member_accounts
            ORDER BY user_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    /// 列出引用某等级的账户
    pub async fn list_accounts_by_tier(&self, tier_id: i64) -> Result<Vec<MemberAccount>> {
        let accounts = sqlx::query_as::<_, MemberAccount>(
            r#"
            SELECT user_id, current_tier_id, membership_status, points_balance,
                   membership_start_date, membership_end_date, version,
                   created_at, updated_at
            FROM member_accounts
            WHERE current_tier_id = $1
            ORDER BY user_id ASC
            "#,
        )
        .bind(tier_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    /// 用户兑换历史（按兑换时间升序）
    pub async fn list_redemptions(&self, user_id: &str) -> Result<Vec<RedemptionRecord>> {
        let rows = sqlx::query_as::<_, RedemptionRow>(
            r#"
            SELECT id, user_id, tier_id, reward_id, reward_snapshot,
                   redeemed_at, points_spent, status
            FROM redemption_records
            WHERE user_id = $1
            ORDER BY redeemed_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RedemptionRecord::from).collect())
    }
}

#[async_trait]
impl AccountRepositoryTrait for AccountRepository {
    async fn get_account(&self, user_id: &str) -> Result<Option<MemberAccount>> {
        self.get_account(user_id).await
    }

    async fn create_account(&self, account: &MemberAccount) -> Result<MemberAccount> {
        self.create_account(account).await
    }

    async fn commit(&self, update: &AccountUpdate) -> Result<MemberAccount> {
        self.commit(update).await
    }

    async fn list_accounts(&self) -> Result<Vec<MemberAccount>> {
        self.list_accounts().await
    }

    async fn list_accounts_by_tier(&self, tier_id: i64) -> Result<Vec<MemberAccount>> {
        self.list_accounts_by_tier(tier_id).await
    }

    async fn list_redemptions(&self, user_id: &str) -> Result<Vec<RedemptionRecord>> {
        self.list_redemptions(user_id).await
    }
}
