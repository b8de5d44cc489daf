//! Menu flow and admin commands, independent of the Telegram transport.
//!
//! Every operation returns a [`Reply`] describing what the user should see;
//! `crate::handlers` turns it into Bot API calls.
use crate::access;
use crate::catalog::CatalogService;
use crate::db::{self, Pool};
use crate::extract;
use crate::model::{format_expiry, BatchKind};
use crate::session::{ConversationId, SessionStore};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub const SELECT_TYPE_PROMPT: &str = "👋 Select Batch Type:";
pub const SELECT_BATCH_PROMPT: &str = "📚 Select Batch:";
pub const FETCHING_BATCHES: &str = "⏳ Fetching batches...";
pub const EXTRACTING_CONTENT: &str = "⏳ Extracting content...";
pub const NO_BATCHES: &str = "No batches available right now.";
pub const NO_LINKS: &str = "No links found in this batch.";
pub const UNAVAILABLE: &str = "⚠️ Service temporarily unavailable, please try again later.";
pub const SELECTION_EXPIRED: &str = "⌛ Selection expired, please /start again.";
pub const INTERNAL_ERROR: &str = "⚠️ Something went wrong, please try again later.";
pub const ADMIN_ONLY: &str = "❌ Admin only";
pub const ADD_USAGE: &str = "Usage: /add user_id days";
pub const REMOVE_USAGE: &str = "Usage: /remove user_id";

const BATCH_PREFIX: &str = "batch_";

/// Inline keyboard button: label plus callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Access refused; rendered as [`access::DENIED_MESSAGE`].
    Denied,
    Text(String),
    Menu { text: String, buttons: Vec<Button> },
    /// Export file on disk. The transport uploads it under `file_name` and
    /// then deletes `path`.
    Document {
        file_name: String,
        path: PathBuf,
        link_count: usize,
    },
}

impl Reply {
    pub fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }
}

/// Decoded callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    ChooseKind(BatchKind),
    ChooseBatch(String),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(kind) = BatchKind::parse_kind(data) {
            return Some(CallbackAction::ChooseKind(kind));
        }
        data.strip_prefix(BATCH_PREFIX)
            .filter(|token| !token.is_empty())
            .map(|token| CallbackAction::ChooseBatch(token.to_string()))
    }
}

#[derive(Clone)]
pub struct Flow {
    pool: Pool,
    catalog: Arc<dyn CatalogService>,
    sessions: SessionStore,
    admin_id: i64,
    exports_dir: PathBuf,
}

impl Flow {
    pub fn new(
        pool: Pool,
        catalog: Arc<dyn CatalogService>,
        admin_id: i64,
        exports_dir: PathBuf,
    ) -> Self {
        Self {
            pool,
            catalog,
            sessions: SessionStore::new(),
            admin_id,
            exports_dir,
        }
    }

    /// Menu state, exposed for inspection.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn authorize(&self, user_id: i64) -> Result<bool> {
        access::is_authorized(&self.pool, user_id).await
    }

    /// `/start`: gate, reset the conversation's session and offer the two batch types.
    pub async fn start(&self, conv: ConversationId) -> Result<Reply> {
        if !self.authorize(conv.user_id).await? {
            return Ok(Reply::Denied);
        }
        self.sessions.begin(conv).await;
        let buttons = [BatchKind::Live, BatchKind::Recorded]
            .into_iter()
            .map(|kind| Button {
                label: kind.button_label().to_string(),
                data: kind.as_str().to_string(),
            })
            .collect();
        Ok(Reply::Menu {
            text: SELECT_TYPE_PROMPT.to_string(),
            buttons,
        })
    }

    /// Fetch the listing for `kind` and offer one button per batch.
    /// Access must already have been checked by the caller.
    pub async fn choose_kind(&self, conv: ConversationId, kind: BatchKind) -> Reply {
        let listing = match self.catalog.list_batches(kind).await {
            Ok(listing) => listing,
            Err(err) => {
                warn!(?err, ?conv, kind = kind.as_str(), "failed to fetch batch list");
                self.sessions.finish(conv).await;
                return Reply::text(UNAVAILABLE);
            }
        };
        info!(?conv, kind = kind.as_str(), count = listing.len(), "fetched batch list");
        if listing.is_empty() {
            self.sessions.finish(conv).await;
            return Reply::text(NO_BATCHES);
        }

        let buttons = self
            .sessions
            .store_batches(conv, kind, listing)
            .await
            .into_iter()
            .map(|opt| Button {
                label: opt.label,
                data: format!("{BATCH_PREFIX}{}", opt.token),
            })
            .collect();
        Reply::Menu {
            text: SELECT_BATCH_PROMPT.to_string(),
            buttons,
        }
    }

    /// Whether `token` is a live button of this user's current menu.
    pub async fn holds_selection(&self, conv: ConversationId, token: &str) -> bool {
        self.sessions.resolve(conv, token).await.is_ok()
    }

    /// Resolve the selected batch, extract its links and write the export file.
    /// Access must already have been checked by the caller.
    pub async fn choose_batch(&self, conv: ConversationId, token: &str) -> Result<Reply> {
        let started = Instant::now();
        let (kind, batch) = match self.sessions.resolve(conv, token).await {
            Ok(found) => found,
            Err(err) => {
                info!(?conv, %err, "stale batch selection");
                return Ok(Reply::text(SELECTION_EXPIRED));
            }
        };

        let content = match self.catalog.batch_content(&batch.id).await {
            Ok(content) => content,
            Err(err) => {
                warn!(?err, ?conv, batch_id = %batch.id, "failed to fetch batch content");
                self.sessions.finish(conv).await;
                return Ok(Reply::text(UNAVAILABLE));
            }
        };
        self.sessions.finish(conv).await;

        let links = extract::extract_links(&content);
        if links.is_empty() {
            info!(?conv, batch_id = %batch.id, "batch has no playable links");
            return Ok(Reply::text(NO_LINKS));
        }

        let file_name = extract::export_file_name(&batch.title);
        let contents = extract::render_links(&links);
        let path = extract::write_export(&self.exports_dir, &file_name, &contents).await?;
        info!(
            ?conv,
            batch_id = %batch.id,
            kind = kind.as_str(),
            links = links.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            path = %path.display(),
            "extracted batch"
        );
        Ok(Reply::Document {
            file_name,
            path,
            link_count: links.len(),
        })
    }

    fn is_admin(&self, user_id: i64) -> bool {
        user_id == self.admin_id
    }

    /// `/add <user_id> <days>`
    pub async fn add_user(&self, caller: i64, args: &str) -> Result<Reply> {
        self.add_user_at(caller, args, Utc::now()).await
    }

    pub async fn add_user_at(&self, caller: i64, args: &str, now: DateTime<Utc>) -> Result<Reply> {
        if !self.is_admin(caller) {
            return Ok(Reply::text(ADMIN_ONLY));
        }
        let Some((user_id, days)) = parse_add_args(args) else {
            return Ok(Reply::text(ADD_USAGE));
        };
        let Some(expires_at) = Duration::try_days(days).and_then(|d| now.checked_add_signed(d))
        else {
            return Ok(Reply::text(ADD_USAGE));
        };
        db::upsert_user(&self.pool, user_id, expires_at).await?;
        info!(user_id, days, %expires_at, "user access updated");
        Ok(Reply::text(format!(
            "✅ User {user_id} added\nExpires: {}",
            format_expiry(&expires_at)
        )))
    }

    /// `/remove <user_id>`
    pub async fn remove_user(&self, caller: i64, args: &str) -> Result<Reply> {
        if !self.is_admin(caller) {
            return Ok(Reply::text(ADMIN_ONLY));
        }
        let Some(user_id) = parse_user_id(args) else {
            return Ok(Reply::text(REMOVE_USAGE));
        };
        let removed = db::remove_user(&self.pool, user_id).await?;
        info!(user_id, removed, "user removed");
        Ok(Reply::text(format!("🗑️ User {user_id} removed")))
    }

    /// `/users`
    pub async fn list_users(&self, caller: i64) -> Result<Reply> {
        if !self.is_admin(caller) {
            return Ok(Reply::text(ADMIN_ONLY));
        }
        let users = db::list_users(&self.pool).await?;
        if users.is_empty() {
            return Ok(Reply::text("No users"));
        }
        let mut msg = String::from("📋 Users:\n\n");
        for user in &users {
            msg.push_str(&format!(
                "{} → {}\n",
                user.user_id,
                format_expiry(&user.expires_at)
            ));
        }
        Ok(Reply::Text(msg))
    }
}

fn parse_add_args(args: &str) -> Option<(i64, i64)> {
    let mut parts = args.split_whitespace();
    let user_id = parts.next()?.parse().ok()?;
    let days = parts.next()?.parse().ok()?;
    Some((user_id, days))
}

fn parse_user_id(args: &str) -> Option<i64> {
    args.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_parsing() {
        assert_eq!(
            CallbackAction::parse("live"),
            Some(CallbackAction::ChooseKind(BatchKind::Live))
        );
        assert_eq!(
            CallbackAction::parse("recorded"),
            Some(CallbackAction::ChooseKind(BatchKind::Recorded))
        );
        assert_eq!(
            CallbackAction::parse("batch_ab12"),
            Some(CallbackAction::ChooseBatch("ab12".into()))
        );
        assert_eq!(CallbackAction::parse("batch_"), None);
        assert_eq!(CallbackAction::parse("askuser:1:2"), None);
    }

    #[test]
    fn admin_argument_parsing() {
        assert_eq!(parse_add_args("123 5"), Some((123, 5)));
        assert_eq!(parse_add_args("  123   -5 "), Some((123, -5)));
        assert_eq!(parse_add_args("123"), None);
        assert_eq!(parse_add_args("abc 5"), None);
        assert_eq!(parse_add_args(""), None);
        assert_eq!(parse_user_id("77"), Some(77));
        assert_eq!(parse_user_id("x"), None);
    }
}
