//! Access gate: decides whether a Telegram user may use the bot right now.
use crate::db::{self, Pool};
use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Denial text shown to users. It never reveals why access was refused.
pub const DENIED_MESSAGE: &str = "🚫 Access Denied\nContact admin for activation";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted { expires_at: DateTime<Utc> },
    NotRegistered,
    Expired { expired_at: DateTime<Utc> },
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted { .. })
    }
}

/// Look up `user_id` and compare its expiry against `now`.
pub async fn check_access_at(
    pool: &Pool,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<AccessDecision> {
    let decision = match db::get_user(pool, user_id).await? {
        None => AccessDecision::NotRegistered,
        Some(user) if user.is_active_at(now) => AccessDecision::Granted {
            expires_at: user.expires_at,
        },
        Some(user) => AccessDecision::Expired {
            expired_at: user.expires_at,
        },
    };
    match decision {
        AccessDecision::Granted { .. } => debug!(user_id, "access granted"),
        AccessDecision::NotRegistered => info!(user_id, "access denied: not registered"),
        AccessDecision::Expired { expired_at } => {
            info!(user_id, %expired_at, "access denied: window expired")
        }
    }
    Ok(decision)
}

/// [`check_access_at`] against the current time, keeping the denial reason.
pub async fn check_access(pool: &Pool, user_id: i64) -> Result<AccessDecision> {
    check_access_at(pool, user_id, Utc::now()).await
}

/// Gate used by the bot: granted or not, reason already logged.
pub async fn is_authorized(pool: &Pool, user_id: i64) -> Result<bool> {
    Ok(check_access(pool, user_id).await?.is_granted())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn setup_pool() -> Pool {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn unknown_user_is_not_registered() {
        let pool = setup_pool().await;
        let decision = check_access(&pool, 777).await.unwrap();
        assert_eq!(decision, AccessDecision::NotRegistered);
        assert!(!is_authorized(&pool, 777).await.unwrap());
    }

    #[tokio::test]
    async fn past_expiry_denied_future_granted() {
        let pool = setup_pool().await;
        let now = Utc::now();
        db::upsert_user(&pool, 1, now - Duration::hours(1)).await.unwrap();
        db::upsert_user(&pool, 2, now + Duration::hours(1)).await.unwrap();

        let expired = check_access_at(&pool, 1, now).await.unwrap();
        assert!(matches!(expired, AccessDecision::Expired { .. }));
        assert!(check_access_at(&pool, 2, now).await.unwrap().is_granted());
    }

    #[tokio::test]
    async fn expiry_equal_to_now_is_denied() {
        let pool = setup_pool().await;
        let now = Utc::now();
        db::upsert_user(&pool, 5, now).await.unwrap();
        let stored = db::get_user(&pool, 5).await.unwrap().unwrap();
        let decision = check_access_at(&pool, 5, stored.expires_at).await.unwrap();
        assert!(!decision.is_granted());
    }
}
