//! Per-user, per-chat menu state.
//!
//! A session is created by `/start`, filled when a batch type is chosen and
//! removed once a batch has been delivered or the flow aborts. Batches are
//! addressed by opaque tokens so a stale keyboard can never select a batch
//! from a different listing.
use crate::model::{BatchKind, BatchSummary};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// One user's menu inside one chat. Group members never share a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationId {
    pub chat_id: i64,
    pub user_id: i64,
}

impl ConversationId {
    pub fn new(chat_id: i64, user_id: i64) -> Self {
        Self { chat_id, user_id }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no active menu for this conversation")]
    NoSession,
    #[error("selection token is not part of the current menu")]
    UnknownToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    AwaitingBatchType,
    AwaitingBatch {
        kind: BatchKind,
        batches: HashMap<String, BatchSummary>,
    },
}

/// A menu button: opaque token plus the label to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOption {
    pub token: String,
    pub label: String,
}

#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<ConversationId, FlowState>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the flow for `conv`, discarding any earlier listing.
    pub async fn begin(&self, conv: ConversationId) {
        self.inner
            .lock()
            .await
            .insert(conv, FlowState::AwaitingBatchType);
    }

    /// Store a fresh listing and hand back the buttons to render, in API order.
    pub async fn store_batches(
        &self,
        conv: ConversationId,
        kind: BatchKind,
        listing: Vec<BatchSummary>,
    ) -> Vec<BatchOption> {
        let mut batches = HashMap::with_capacity(listing.len());
        let mut options = Vec::with_capacity(listing.len());
        for batch in listing {
            let token = Uuid::new_v4().simple().to_string();
            options.push(BatchOption {
                token: token.clone(),
                label: batch.label(),
            });
            batches.insert(token, batch);
        }
        self.inner.lock().await.insert(
            conv,
            FlowState::AwaitingBatch { kind, batches },
        );
        options
    }

    /// Resolve a token from the current listing. The session stays in place
    /// until [`SessionStore::finish`] is called.
    pub async fn resolve(
        &self,
        conv: ConversationId,
        token: &str,
    ) -> Result<(BatchKind, BatchSummary), SessionError> {
        let guard = self.inner.lock().await;
        match guard.get(&conv) {
            Some(FlowState::AwaitingBatch { kind, batches, .. }) => batches
                .get(token)
                .map(|b| (*kind, b.clone()))
                .ok_or(SessionError::UnknownToken),
            Some(FlowState::AwaitingBatchType) => Err(SessionError::UnknownToken),
            None => Err(SessionError::NoSession),
        }
    }

    pub async fn finish(&self, conv: ConversationId) {
        self.inner.lock().await.remove(&conv);
    }

    pub async fn state(&self, conv: ConversationId) -> Option<FlowState> {
        self.inner.lock().await.get(&conv).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(id: &str, title: &str) -> BatchSummary {
        BatchSummary {
            id: id.into(),
            title: title.into(),
        }
    }

    fn conv(chat_id: i64) -> ConversationId {
        ConversationId::new(chat_id, 7)
    }

    #[tokio::test]
    async fn tokens_resolve_to_their_batch() {
        let store = SessionStore::new();
        store.begin(conv(10)).await;
        assert_eq!(
            store.state(conv(10)).await,
            Some(FlowState::AwaitingBatchType)
        );

        let options = store
            .store_batches(
                conv(10),
                BatchKind::Live,
                vec![batch("1", "One"), batch("2", "Two")],
            )
            .await;
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].label, "One");
        assert_ne!(options[0].token, options[1].token);
        assert!(("batch_".len() + options[0].token.len()) <= 64);

        let (kind, b) = store.resolve(conv(10), &options[1].token).await.unwrap();
        assert_eq!(kind, BatchKind::Live);
        assert_eq!(b.id, "2");
    }

    #[tokio::test]
    async fn restart_invalidates_old_tokens() {
        let store = SessionStore::new();
        let old = store
            .store_batches(conv(1), BatchKind::Recorded, vec![batch("9", "Nine")])
            .await;
        store.begin(conv(1)).await;
        assert_eq!(
            store.resolve(conv(1), &old[0].token).await,
            Err(SessionError::UnknownToken)
        );

        store.finish(conv(1)).await;
        assert_eq!(
            store.resolve(conv(1), &old[0].token).await,
            Err(SessionError::NoSession)
        );
    }

    #[tokio::test]
    async fn conversations_are_isolated() {
        let store = SessionStore::new();
        let a = store
            .store_batches(conv(1), BatchKind::Live, vec![batch("1", "A")])
            .await;
        store
            .store_batches(conv(2), BatchKind::Live, vec![batch("2", "B")])
            .await;
        assert_eq!(
            store.resolve(conv(2), &a[0].token).await,
            Err(SessionError::UnknownToken)
        );
    }

    #[tokio::test]
    async fn users_in_one_chat_keep_separate_menus() {
        let store = SessionStore::new();
        let alice = ConversationId::new(-100, 11);
        let bob = ConversationId::new(-100, 22);
        let options = store
            .store_batches(alice, BatchKind::Live, vec![batch("1", "A")])
            .await;
        store.begin(bob).await;

        let (_, b) = store.resolve(alice, &options[0].token).await.unwrap();
        assert_eq!(b.id, "1");
        assert_eq!(
            store.resolve(bob, &options[0].token).await,
            Err(SessionError::UnknownToken)
        );
    }
}
