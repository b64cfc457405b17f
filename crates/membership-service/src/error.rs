//! 会员服务错误类型
//!
//! 定义服务层的业务错误和系统错误。所有可预期的失败都以 `Err` 返回，
//! 调用方可通过 [`MembershipError::kind`] 在固定的几类结果上分支。

use thiserror::Error;

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 账户、等级或奖励不存在
    NotFound,
    /// 输入格式错误
    Validation,
    /// 业务规则拒绝
    Business,
    /// 存储故障或数据损坏，操作整体中止
    Fatal,
}

/// 会员服务错误类型
#[derive(Debug, Error)]
pub enum MembershipError {
    // === 资源不存在 ===
    #[error("会员账户不存在: {0}")]
    AccountNotFound(String),

    #[error("会员等级不存在: {0}")]
    TierNotFound(i64),

    #[error("奖励不存在: tier_id={tier_id}, reward_id={reward_id}")]
    RewardNotFound { tier_id: i64, reward_id: i64 },

    // === 业务规则 ===
    #[error("积分不足: 需要 {required}, 可用 {available}")]
    InsufficientPoints { required: i64, available: i64 },

    #[error("奖励当前不可兑换: tier_id={tier_id}, reward_id={reward_id}")]
    RewardUnavailable { tier_id: i64, reward_id: i64 },

    #[error("会员已取消，无法变动积分: {0}")]
    AccountCancelled(String),

    #[error("未达到该等级门槛: tier_id={tier_id}, 需要 {required}, 可用 {available}")]
    TierNotEligible {
        tier_id: i64,
        required: i64,
        available: i64,
    },

    // === 参数校验 ===
    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("等级名称已存在: {0}")]
    DuplicateTierName(String),

    #[error("会员账户已存在: {0}")]
    AccountAlreadyExists(String),

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("数据不变量被破坏: {0}")]
    InvariantViolation(String),

    #[error("内部错误: {0}")]
    Internal(String),

    #[error("并发冲突，请重试")]
    ConcurrencyConflict,
}

/// 会员服务 Result 类型别名
pub type Result<T> = std::result::Result<T, MembershipError>;

impl MembershipError {
    /// 错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AccountNotFound(_) | Self::TierNotFound(_) | Self::RewardNotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::Validation(_) | Self::DuplicateTierName(_) | Self::AccountAlreadyExists(_) => {
                ErrorKind::Validation
            }
            Self::InsufficientPoints { .. }
            | Self::RewardUnavailable { .. }
            | Self::AccountCancelled(_)
            | Self::TierNotEligible { .. } => ErrorKind::Business,
            Self::Database(_)
            | Self::Serialization(_)
            | Self::InvariantViolation(_)
            | Self::Internal(_)
            | Self::ConcurrencyConflict => ErrorKind::Fatal,
        }
    }

    /// 检查是否为版本冲突（乐观锁重试的唯一触发条件）
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict)
    }

    /// 检查是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict
                | Self::Database(sqlx::Error::PoolTimedOut)
                | Self::Database(sqlx::Error::Io(_))
        )
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        self.kind() != ErrorKind::Fatal
    }

    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::TierNotFound(_) => "TIER_NOT_FOUND",
            Self::RewardNotFound { .. } => "REWARD_NOT_FOUND",
            Self::InsufficientPoints { .. } => "INSUFFICIENT_POINTS",
            Self::RewardUnavailable { .. } => "REWARD_UNAVAILABLE",
            Self::AccountCancelled(_) => "ACCOUNT_CANCELLED",
            Self::TierNotEligible { .. } => "TIER_NOT_ELIGIBLE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::DuplicateTierName(_) => "DUPLICATE_TIER_NAME",
            Self::AccountAlreadyExists(_) => "ACCOUNT_ALREADY_EXISTS",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::InvariantViolation(_) => "INVARIANT_VIOLATION",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
        }
    }
}

impl From<validator::ValidationErrors> for MembershipError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<config::ConfigError> for MembershipError {
    fn from(err: config::ConfigError) -> Self {
        Self::Validation(format!("等级目录文件无效: {}", err))
    }
}
