use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which half of the catalog a flow is browsing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BatchKind {
    Live,
    Recorded,
}

impl BatchKind {
    /// Callback payload carried by the batch-type buttons.
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchKind::Live => "live",
            BatchKind::Recorded => "recorded",
        }
    }

    pub fn parse_kind(s: &str) -> Option<Self> {
        match s {
            "live" => Some(BatchKind::Live),
            "recorded" => Some(BatchKind::Recorded),
            _ => None,
        }
    }

    /// Path segment the catalog API expects for this kind.
    pub fn api_flag(&self) -> &'static str {
        match self {
            BatchKind::Live => "1",
            BatchKind::Recorded => "0",
        }
    }

    pub fn button_label(&self) -> &'static str {
        match self {
            BatchKind::Live => "📡 Live Batch",
            BatchKind::Recorded => "🎥 Recorded Batch",
        }
    }
}

/// A stored access window for one Telegram user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
pub struct AuthorizedUser {
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

impl AuthorizedUser {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Human form used in admin replies, e.g. `05 Mar 2026`.
pub fn format_expiry(ts: &DateTime<Utc>) -> String {
    ts.format("%d %b %Y").to_string()
}

/// One batch as listed by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchSummary {
    #[serde(deserialize_with = "crate::catalog::model::string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "crate::catalog::model::string_or_empty")]
    pub title: String,
}

impl BatchSummary {
    /// Button text. Telegram rejects empty button labels, so untitled
    /// batches fall back to their id.
    pub fn label(&self) -> String {
        let title = self.title.trim();
        if title.is_empty() {
            format!("Batch {}", self.id)
        } else {
            title.to_string()
        }
    }
}

/// A playable class reduced to what ends up in the export file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    pub title: String,
    pub link: String,
}

impl LinkEntry {
    pub fn to_line(&self) -> String {
        format!("{} : {}", self.title, self.link)
    }
}
