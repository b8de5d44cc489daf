use crate::model::AuthorizedUser;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/`, ensure the parent
/// directory exists and ask SQLite to create the file. In-memory URLs pass through.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = format!("sqlite://{expanded_path}");
    match query_part {
        Some(q) if q.contains("mode=") => {
            rebuilt.push('?');
            rebuilt.push_str(q);
        }
        Some(q) => {
            rebuilt.push('?');
            rebuilt.push_str(q);
            rebuilt.push_str("&mode=rwc");
        }
        None => rebuilt.push_str("?mode=rwc"),
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Insert the user or move their expiry to `expires_at`.
#[instrument(skip_all)]
pub async fn upsert_user(pool: &Pool, user_id: i64, expires_at: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        "INSERT INTO authorized_users (user_id, expires_at) VALUES (?, ?)
         ON CONFLICT(user_id) DO UPDATE SET expires_at = excluded.expires_at",
    )
    .bind(user_id)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns whether a row was actually removed.
#[instrument(skip_all)]
pub async fn remove_user(pool: &Pool, user_id: i64) -> Result<bool> {
    let res = sqlx::query("DELETE FROM authorized_users WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip_all)]
pub async fn get_user(pool: &Pool, user_id: i64) -> Result<Option<AuthorizedUser>> {
    let user = sqlx::query_as::<_, AuthorizedUser>(
        "SELECT user_id, expires_at FROM authorized_users WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

#[instrument(skip_all)]
pub async fn list_users(pool: &Pool) -> Result<Vec<AuthorizedUser>> {
    let users = sqlx::query_as::<_, AuthorizedUser>(
        "SELECT user_id, expires_at FROM authorized_users ORDER BY user_id",
    )
    .fetch_all(pool)
    .await?;
    Ok(users)
}
