pub mod proxy;

use crate::config::prompt::PromptConfig;
use crate::history::{ self, DurableStore, StoreError };
use crate::llm::extract_reply_text;
use crate::models::chat::{ Message, Role, StoredMessage };
use proxy::ChatProxy;

use chrono::Utc;
use log::{ info, warn };
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Upper bound on the in-memory working history.
pub const MAX_WORKING_HISTORY: usize = 18;
/// Messages restored into the transcript on load.
pub const RESTORE_LEN: usize = 10;
/// Persisted messages older than this are dropped on load.
pub const HISTORY_TTL_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a message is already being sent")]
    Busy,
    #[error("message is empty")]
    EmptyMessage,
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Result of a send that got as far as calling the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Answered(String),
    /// No usable reply. Carries the fallback text that was displayed instead.
    NoResponse(String),
}

#[derive(Debug, Default)]
struct ConversationState {
    working: Vec<Message>,
    transcript: Vec<Message>,
}

/// Owns one user's conversation: the working history used for prompts, the visible
/// transcript, and the durable record mirrored in `store`.
pub struct ConversationSession {
    store: Arc<dyn DurableStore>,
    proxy: Arc<dyn ChatProxy>,
    prompts: Arc<PromptConfig>,
    state: Mutex<ConversationState>,
    in_flight: AtomicBool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drops messages older than `HISTORY_TTL_MS` relative to `now_ms`.
pub fn prune_expired(messages: Vec<StoredMessage>, now_ms: i64) -> Vec<StoredMessage> {
    let cutoff = now_ms - HISTORY_TTL_MS;
    messages.into_iter().filter(|m| m.timestamp > cutoff).collect()
}

impl ConversationSession {
    pub fn new(
        store: Arc<dyn DurableStore>,
        proxy: Arc<dyn ChatProxy>,
        prompts: Arc<PromptConfig>
    ) -> Self {
        Self {
            store,
            proxy,
            prompts,
            state: Mutex::new(ConversationState::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn transcript(&self) -> Vec<Message> {
        self.state.lock().await.transcript.clone()
    }

    pub async fn working_history(&self) -> Vec<Message> {
        self.state.lock().await.working.clone()
    }

    /// Rewrites the durable record without entries that expired before `now_ms`.
    pub async fn prune(&self, now_ms: i64) -> Result<Vec<StoredMessage>, StoreError> {
        let messages = history::read_record(self.store.as_ref()).await?;
        let before = messages.len();
        let kept = prune_expired(messages, now_ms);
        if kept.len() != before {
            info!("Pruned {} expired message(s) from history", before - kept.len());
        }
        history::write_record(self.store.as_ref(), &kept).await?;
        Ok(kept)
    }

    /// Restores the session from the durable record and returns the restored messages.
    /// An empty record shows the welcome message instead, which is not persisted.
    pub async fn load(&self) -> Result<Vec<Message>, StoreError> {
        self.load_at(Utc::now().timestamp_millis()).await
    }

    pub async fn load_at(&self, now_ms: i64) -> Result<Vec<Message>, StoreError> {
        let kept = self.prune(now_ms).await?;
        let start = kept.len().saturating_sub(RESTORE_LEN);
        let restored: Vec<Message> = kept[start..].iter().cloned().map(Message::from).collect();

        let mut state = self.state.lock().await;
        if restored.is_empty() {
            state.transcript = vec![Message::new(Role::Assistant, self.prompts.welcome_message.as_str())];
        } else {
            state.transcript = restored.clone();
        }
        state.working = restored.clone();
        info!("Restored {} message(s) from history", restored.len());
        Ok(restored)
    }

    /// Records a message in working history and the durable record.
    pub async fn append(&self, message: Message) -> Result<(), StoreError> {
        {
            let mut state = self.state.lock().await;
            state.working.push(message.clone());
            if state.working.len() > MAX_WORKING_HISTORY {
                let excess = state.working.len() - MAX_WORKING_HISTORY;
                state.working.drain(..excess);
            }
        }
        history::append_to_record(self.store.as_ref(), StoredMessage::from(&message)).await
    }

    /// Sends one user message through the proxy. Only a successful exchange is recorded;
    /// on failure the user message stays visible but is not persisted.
    pub async fn send(&self, input: &str) -> Result<SendOutcome, SessionError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        if self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::Busy);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let prompt = {
            let mut state = self.state.lock().await;
            state.transcript.push(Message::new(Role::User, text));
            self.prompts.build_prompt(&state.working, text)
        };

        let reply = match self.proxy.request(&prompt).await {
            Ok(payload) => {
                let reply = extract_reply_text(&payload);
                if reply.is_none() {
                    warn!("Proxy response did not contain reply text");
                }
                reply
            }
            Err(e) => {
                warn!("Proxy call failed: {}", e);
                None
            }
        };

        match reply {
            Some(reply) => {
                let question = Message::new(Role::User, text);
                let answer = Message::new(Role::Assistant, reply.as_str());
                // Shown even if persisting below fails.
                self.state.lock().await.transcript.push(answer.clone());
                self.append(question).await?;
                self.append(answer).await?;
                Ok(SendOutcome::Answered(reply))
            }
            None => {
                let fallback = self.prompts.fallback_message.clone();
                self.state.lock().await.transcript.push(Message::new(Role::Assistant, fallback.as_str()));
                Ok(SendOutcome::NoResponse(fallback))
            }
        }
    }

    /// Wipes the transcript, the durable record and working history. Callers confirm first.
    /// Refused while a send is in flight, so a late reply cannot land in the cleared record.
    pub async fn clear(&self) -> Result<(), SessionError> {
        if self.is_busy() {
            return Err(SessionError::Busy);
        }
        history::clear_record(self.store.as_ref()).await?;
        let mut state = self.state.lock().await;
        state.working.clear();
        state.transcript = vec![
            Message::new(Role::Assistant, self.prompts.returning_welcome_message.as_str())
        ];
        info!("Conversation cleared");
        Ok(())
    }
}
