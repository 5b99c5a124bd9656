//! Conversation manager.
//!
//! Owns the ordered list of turns for one conversation. A submission appends
//! the user turn immediately, asks the backend for a reply, and appends the
//! reply (or a visible error turn). Once the history grows past a threshold a
//! background task asks the backend for a summary and replaces older turns
//! with it.
//!
//! Every mutation bumps a version stamp. The summarization task remembers the
//! version it started from and only applies its result if nothing has changed
//! since, so a summary that lands after a newer submission is dropped instead
//! of erasing that submission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pandaverse_types::ChatTurn;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{ChatBackend, ClientError};
use super::model::ModelSelection;
use crate::store::KeyValueStore;

pub const STORAGE_KEY_MODEL: &str = "pv:model";
pub const STORAGE_KEY_CHAT: &str = "pv:chat";
pub const STORAGE_KEY_SUMMARY: &str = "pv:summary";

pub const GREETING: &str = "Hello 👋 Welcome To Panda Verse";
pub const SUMMARY_PROMPT: &str = "Summarize this conversation in under 200 words:";
pub const SUMMARY_PREFIX: &str = "Summary so far: ";
pub const ERROR_PREFIX: &str = "⚠️ Error: ";
pub const NETWORK_ERROR_PREFIX: &str = "⚠️ Network error: ";
pub const NO_RESPONSE: &str = "⚠️ No response from model.";

/// Tuning knobs for a conversation.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Turn count at which a summarization is started.
    pub summarize_threshold: usize,
    /// Turns kept verbatim next to the summary.
    pub keep_recent: usize,
    /// Model used until the user selects one.
    pub default_model: String,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            summarize_threshold: 20,
            keep_recent: 5,
            default_model: "meta-llama/llama-3.3-70b-instruct:free".to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("a message is already being sent")]
    Busy,
}

/// Result of one submission.
#[derive(Debug)]
pub struct Submission {
    /// The assistant turn that was appended (a reply or an error marker).
    pub reply: ChatTurn,
    /// Whether the backend answered successfully.
    pub succeeded: bool,
    /// Background summarization started by this submission, if any.
    pub summarization: Option<JoinHandle<()>>,
}

struct State {
    turns: Vec<ChatTurn>,
    summary: String,
    version: u64,
}

/// Copy of the state taken under the lock, written to the store outside it.
struct Snapshot {
    turns: Vec<ChatTurn>,
    summary: String,
    version: u64,
}

impl Snapshot {
    fn of(state: &State) -> Self {
        Self {
            turns: state.turns.clone(),
            summary: state.summary.clone(),
            version: state.version,
        }
    }
}

struct Inner {
    state: Mutex<State>,
    /// Version of the last snapshot handed to the store. Also serializes writes.
    written: Mutex<u64>,
    model: Mutex<ModelSelection>,
    busy: AtomicBool,
    store: Arc<dyn KeyValueStore>,
    backend: Arc<dyn ChatBackend>,
    options: ManagerOptions,
}

/// Handle to a conversation; clones share the same state.
#[derive(Clone)]
pub struct ConversationManager {
    inner: Arc<Inner>,
}

/// Clears the busy flag when the submission ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ConversationManager {
    /// Rehydrate a conversation from the store, or start from the greeting.
    pub fn load(
        store: Arc<dyn KeyValueStore>,
        backend: Arc<dyn ChatBackend>,
        options: ManagerOptions,
    ) -> Self {
        let turns = read_key(store.as_ref(), STORAGE_KEY_CHAT)
            .and_then(|raw| match serde_json::from_str::<Vec<ChatTurn>>(&raw) {
                Ok(turns) => Some(turns),
                Err(e) => {
                    warn!(error = %e, "Stored conversation is unreadable; starting over");
                    None
                }
            })
            .unwrap_or_else(initial_turns);
        let summary = read_key(store.as_ref(), STORAGE_KEY_SUMMARY).unwrap_or_default();
        let model = read_key(store.as_ref(), STORAGE_KEY_MODEL)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| options.default_model.clone());

        debug!(turns = turns.len(), %model, "Loaded conversation");

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    turns,
                    summary,
                    version: 0,
                }),
                written: Mutex::new(0),
                model: Mutex::new(ModelSelection::new(model)),
                busy: AtomicBool::new(false),
                store,
                backend,
                options,
            }),
        }
    }

    pub fn turns(&self) -> Vec<ChatTurn> {
        self.state().turns.clone()
    }

    pub fn len(&self) -> usize {
        self.state().turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().turns.is_empty()
    }

    pub fn summary(&self) -> String {
        self.state().summary.clone()
    }

    /// Incremented on every change to the turns or the summary.
    pub fn version(&self) -> u64 {
        self.state().version
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    pub fn model(&self) -> ModelSelection {
        self.inner
            .model
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Select a model and remember it for the next session.
    pub fn set_model(&self, model: impl Into<String>) {
        let model = ModelSelection::new(model);
        if let Err(e) = self.inner.store.set(STORAGE_KEY_MODEL, model.id()) {
            warn!(error = %e, "Failed to persist model selection");
        }
        info!(%model, "Selected model");
        *self
            .inner
            .model
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = model;
    }

    /// Drop the history and summary and start again from the greeting.
    pub fn reset(&self) {
        self.mutate(|state| {
            state.turns = initial_turns();
            state.summary.clear();
        });
    }

    /// Send a user message and append the assistant's answer.
    ///
    /// Only one submission may be outstanding at a time; a second call while
    /// one is in flight fails with [`ConversationError::Busy`] and changes
    /// nothing. Backend failures do not fail the call: they are appended as an
    /// error turn and reported through [`Submission::succeeded`].
    pub async fn submit(&self, input: &str) -> Result<Submission, ConversationError> {
        if input.trim().is_empty() {
            return Err(ConversationError::EmptyMessage);
        }

        if self
            .inner
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ConversationError::Busy);
        }
        let _busy = BusyGuard(&self.inner.busy);

        self.mutate(|state| state.turns.push(ChatTurn::user(input)));

        let model = self.model();
        let result = self.inner.backend.send(input, Some(model.id())).await;

        let (reply, succeeded) = match result {
            Ok(reply) if reply.is_empty() => (ChatTurn::assistant(NO_RESPONSE), true),
            Ok(reply) => (ChatTurn::assistant(reply), true),
            Err(ClientError::Api { status, message }) => {
                warn!(status, %message, "Chat request rejected");
                (ChatTurn::assistant(format!("{ERROR_PREFIX}{message}")), false)
            }
            Err(ClientError::Network(detail)) => {
                warn!(%detail, "Chat request failed");
                (
                    ChatTurn::assistant(format!("{NETWORK_ERROR_PREFIX}{detail}")),
                    false,
                )
            }
        };

        let (history, version) = self.mutate(|state| state.turns.push(reply.clone()));

        let summarization = (succeeded && history.len() >= self.inner.options.summarize_threshold)
            .then(|| self.spawn_summarization(history, version));

        Ok(Submission {
            reply,
            succeeded,
            summarization,
        })
    }

    fn spawn_summarization(&self, history: Vec<ChatTurn>, version: u64) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move { manager.summarize(history, version).await })
    }

    async fn summarize(&self, history: Vec<ChatTurn>, version: u64) {
        let prompt = summarization_prompt(&history);
        let model = self.model();

        let reply = match self.inner.backend.send(&prompt, Some(model.id())).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Summarization failed");
                return;
            }
        };

        let snapshot = {
            let mut state = self.state();
            if state.version != version {
                debug!(
                    started_at = version,
                    current = state.version,
                    "Discarding stale summary"
                );
                return;
            }

            let summary = if reply.is_empty() {
                state.summary.clone()
            } else {
                reply
            };
            let keep_from = history.len().saturating_sub(self.inner.options.keep_recent);

            let mut turns = Vec::with_capacity(history.len() - keep_from + 1);
            turns.push(ChatTurn::system(format!("{SUMMARY_PREFIX}{summary}")));
            turns.extend_from_slice(&history[keep_from..]);

            info!(
                dropped = keep_from,
                kept = turns.len(),
                "Summarized conversation"
            );
            state.turns = turns;
            state.summary = summary;
            state.version += 1;
            Snapshot::of(&state)
        };
        self.persist(&snapshot);
    }

    /// Apply a change, bump the version, persist, and return the new turns.
    fn mutate(&self, change: impl FnOnce(&mut State)) -> (Vec<ChatTurn>, u64) {
        let snapshot = {
            let mut state = self.state();
            change(&mut state);
            state.version += 1;
            Snapshot::of(&state)
        };
        self.persist(&snapshot);
        (snapshot.turns, snapshot.version)
    }

    /// Write turns and summary. Failures are logged; the in-memory state stays
    /// authoritative.
    ///
    /// Runs after the state lock is released, so readers never wait on the
    /// store. The store call itself is synchronous and blocks the calling
    /// thread (`FileStore` fsyncs). A snapshot older than the one already
    /// written is skipped.
    fn persist(&self, snapshot: &Snapshot) {
        let mut written = self
            .inner
            .written
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if snapshot.version <= *written {
            debug!(
                version = snapshot.version,
                written = *written,
                "Skipping outdated snapshot"
            );
            return;
        }

        let store = self.inner.store.as_ref();
        match serde_json::to_string(&snapshot.turns) {
            Ok(json) => {
                if let Err(e) = store.set(STORAGE_KEY_CHAT, &json) {
                    warn!(error = %e, "Failed to persist conversation");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize conversation"),
        }
        if let Err(e) = store.set(STORAGE_KEY_SUMMARY, &snapshot.summary) {
            warn!(error = %e, "Failed to persist summary");
        }
        *written = snapshot.version;
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn initial_turns() -> Vec<ChatTurn> {
    vec![ChatTurn::assistant(GREETING)]
}

fn read_key(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "Failed to read stored value");
            None
        }
    }
}

fn summarization_prompt(history: &[ChatTurn]) -> String {
    let transcript = history
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{SUMMARY_PROMPT}\n\n{transcript}")
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Barrier;

    use async_trait::async_trait;
    use pandaverse_types::Role;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::store::{FileStore, MemoryStore, StoreResult};

    /// Backend double: answers chat messages from a queue (echoing when the
    /// queue is empty) and summarization requests with a fixed reply.
    /// Either kind can be held back behind a semaphore.
    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String, ClientError>>>,
        summary_reply: Option<Result<String, ClientError>>,
        calls: Mutex<Vec<(String, Option<String>)>>,
        chat_gate: Option<Arc<Semaphore>>,
        summary_gate: Option<Arc<Semaphore>>,
    }

    impl ScriptedBackend {
        fn with_replies(replies: Vec<Result<String, ClientError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Self::default()
            }
        }

        fn summary_reply(mut self, reply: Result<String, ClientError>) -> Self {
            self.summary_reply = Some(reply);
            self
        }

        fn calls(&self) -> Vec<(String, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }

        fn chat_calls(&self) -> usize {
            self.calls()
                .iter()
                .filter(|(m, _)| !m.starts_with(SUMMARY_PROMPT))
                .count()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn send(&self, message: &str, model: Option<&str>) -> Result<String, ClientError> {
            self.calls
                .lock()
                .unwrap()
                .push((message.to_string(), model.map(str::to_string)));

            if message.starts_with(SUMMARY_PROMPT) {
                if let Some(gate) = &self.summary_gate {
                    gate.acquire().await.unwrap().forget();
                }
                return self
                    .summary_reply
                    .clone()
                    .unwrap_or_else(|| Ok("a summary".to_string()));
            }

            if let Some(gate) = &self.chat_gate {
                gate.acquire().await.unwrap().forget();
            }
            let next = self.replies.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(format!("reply to {message}")))
        }
    }

    fn manager_with(
        backend: Arc<ScriptedBackend>,
        store: Arc<dyn KeyValueStore>,
    ) -> ConversationManager {
        ConversationManager::load(store, backend, ManagerOptions::default())
    }

    fn stored_turns(store: &dyn KeyValueStore) -> Vec<ChatTurn> {
        serde_json::from_str(&store.get(STORAGE_KEY_CHAT).unwrap().unwrap()).unwrap()
    }

    #[test]
    fn test_fresh_conversation_starts_with_greeting() {
        let manager = manager_with(
            Arc::new(ScriptedBackend::default()),
            Arc::new(MemoryStore::new()),
        );
        assert_eq!(manager.turns(), vec![ChatTurn::assistant(GREETING)]);
        assert_eq!(manager.summary(), "");
        assert_eq!(
            manager.model().id(),
            "meta-llama/llama-3.3-70b-instruct:free"
        );
        assert!(!manager.is_busy());
    }

    #[tokio::test]
    async fn test_submit_appends_user_and_assistant_turns() {
        let backend = Arc::new(ScriptedBackend::with_replies(vec![Ok(
            "hi there".to_string()
        )]));
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(backend.clone(), store.clone());

        let submission = manager.submit("hello").await.unwrap();

        assert!(submission.succeeded);
        assert!(submission.summarization.is_none());
        assert_eq!(submission.reply, ChatTurn::assistant("hi there"));
        assert_eq!(
            manager.turns(),
            vec![
                ChatTurn::assistant(GREETING),
                ChatTurn::user("hello"),
                ChatTurn::assistant("hi there"),
            ]
        );
        assert_eq!(stored_turns(&*store), manager.turns());
        assert_eq!(
            backend.calls(),
            vec![(
                "hello".to_string(),
                Some("meta-llama/llama-3.3-70b-instruct:free".to_string())
            )]
        );
        assert!(!manager.is_busy());
    }

    #[tokio::test]
    async fn test_length_grows_by_two_per_round_below_threshold() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(Arc::new(ScriptedBackend::default()), store.clone());

        for n in 1..=9 {
            let submission = manager.submit(&format!("message {n}")).await.unwrap();
            assert!(submission.summarization.is_none());
            assert_eq!(manager.len(), 1 + 2 * n);
            assert_eq!(stored_turns(&*store).len(), 1 + 2 * n);
        }
    }

    #[tokio::test]
    async fn test_summarization_at_threshold() {
        let backend =
            Arc::new(ScriptedBackend::default().summary_reply(Ok("we chatted".to_string())));
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(backend.clone(), store.clone());

        for n in 1..=9 {
            manager.submit(&format!("message {n}")).await.unwrap();
        }
        let before_last = manager.turns();
        let submission = manager.submit("message 10").await.unwrap();
        let full_history = [
            before_last,
            vec![
                ChatTurn::user("message 10"),
                ChatTurn::assistant("reply to message 10"),
            ],
        ]
        .concat();
        assert_eq!(full_history.len(), 21);

        submission.summarization.expect("summarization started").await.unwrap();

        let turns = manager.turns();
        assert_eq!(turns.len(), 6);
        assert_eq!(turns[0], ChatTurn::system("Summary so far: we chatted"));
        assert_eq!(&turns[1..], &full_history[16..]);
        assert_eq!(manager.summary(), "we chatted");
        assert_eq!(stored_turns(&*store), turns);
        assert_eq!(
            store.get(STORAGE_KEY_SUMMARY).unwrap().as_deref(),
            Some("we chatted")
        );

        let (prompt, _) = backend.calls().pop().unwrap();
        assert!(prompt.starts_with(
            "Summarize this conversation in under 200 words:\n\nassistant: Hello"
        ));
        assert!(prompt.ends_with("user: message 10\nassistant: reply to message 10"));
    }

    #[tokio::test]
    async fn test_server_error_appends_marker() {
        let backend = Arc::new(ScriptedBackend::with_replies(vec![Err(ClientError::Api {
            status: 500,
            message: "No auth credentials found".to_string(),
        })]));
        let manager = manager_with(backend, Arc::new(MemoryStore::new()));

        let submission = manager.submit("hello").await.unwrap();

        assert!(!submission.succeeded);
        assert_eq!(
            submission.reply.content,
            "⚠️ Error: No auth credentials found"
        );
        assert_eq!(manager.len(), 3);
        assert!(!manager.is_busy());
    }

    #[tokio::test]
    async fn test_network_error_appends_marker() {
        let backend = Arc::new(ScriptedBackend::with_replies(vec![Err(
            ClientError::Network("connection refused".to_string()),
        )]));
        let manager = manager_with(backend, Arc::new(MemoryStore::new()));

        let submission = manager.submit("hello").await.unwrap();

        assert!(!submission.succeeded);
        assert_eq!(
            submission.reply.content,
            "⚠️ Network error: connection refused"
        );
        assert!(!manager.is_busy());
    }

    #[tokio::test]
    async fn test_failed_reply_never_summarizes() {
        let mut replies: Vec<Result<String, ClientError>> =
            (0..9).map(|n| Ok(format!("ok {n}"))).collect();
        replies.push(Err(ClientError::Network("reset".to_string())));
        let backend = Arc::new(ScriptedBackend::with_replies(replies));
        let manager = manager_with(backend.clone(), Arc::new(MemoryStore::new()));

        for n in 0..10 {
            let submission = manager.submit(&format!("m{n}")).await.unwrap();
            assert!(submission.summarization.is_none());
        }
        assert_eq!(manager.len(), 21);
        assert_eq!(backend.calls().len(), 10);
    }

    #[tokio::test]
    async fn test_empty_reply_shows_placeholder() {
        let backend = Arc::new(ScriptedBackend::with_replies(vec![Ok(String::new())]));
        let manager = manager_with(backend, Arc::new(MemoryStore::new()));

        let submission = manager.submit("hello").await.unwrap();
        assert!(submission.succeeded);
        assert_eq!(submission.reply.content, NO_RESPONSE);
    }

    #[tokio::test]
    async fn test_blank_input_rejected() {
        let backend = Arc::new(ScriptedBackend::default());
        let manager = manager_with(backend.clone(), Arc::new(MemoryStore::new()));
        let version = manager.version();

        for input in ["", "   ", "\n\t"] {
            assert_eq!(
                manager.submit(input).await.unwrap_err(),
                ConversationError::EmptyMessage
            );
        }
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.version(), version);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_second_submit_while_busy_is_rejected() {
        let gate = Arc::new(Semaphore::new(0));
        let backend = Arc::new(ScriptedBackend {
            chat_gate: Some(gate.clone()),
            ..ScriptedBackend::default()
        });
        let manager = manager_with(backend.clone(), Arc::new(MemoryStore::new()));

        let first = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.submit("first").await })
        };
        while !manager.is_busy() {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            manager.submit("second").await.unwrap_err(),
            ConversationError::Busy
        );
        assert_eq!(
            manager.turns(),
            vec![ChatTurn::assistant(GREETING), ChatTurn::user("first")]
        );

        gate.add_permits(1);
        let submission = first.await.unwrap().unwrap();
        assert_eq!(submission.reply.content, "reply to first");
        assert!(!manager.is_busy());
        assert_eq!(backend.chat_calls(), 1);

        manager.submit("second").await.unwrap();
        assert_eq!(manager.len(), 5);
    }

    #[tokio::test]
    async fn test_stale_summary_is_discarded() {
        let gate = Arc::new(Semaphore::new(0));
        let backend = Arc::new(ScriptedBackend {
            summary_gate: Some(gate.clone()),
            ..ScriptedBackend::default()
        });
        let manager = manager_with(backend, Arc::new(MemoryStore::new()));

        for n in 1..=9 {
            manager.submit(&format!("message {n}")).await.unwrap();
        }
        let first = manager
            .submit("message 10")
            .await
            .unwrap()
            .summarization
            .expect("first summarization");

        // A new submission lands while the first summary is still pending.
        let second = manager
            .submit("message 11")
            .await
            .unwrap()
            .summarization
            .expect("second summarization");
        let history = manager.turns();
        assert_eq!(history.len(), 23);

        gate.add_permits(2);
        first.await.unwrap();
        second.await.unwrap();

        let turns = manager.turns();
        assert_eq!(turns.len(), 6);
        assert_eq!(turns[0].role, Role::System);
        assert_eq!(&turns[1..], &history[18..]);
        assert_eq!(
            turns.last().unwrap(),
            &ChatTurn::assistant("reply to message 11")
        );
    }

    #[tokio::test]
    async fn test_failed_summarization_is_ignored() {
        let backend = Arc::new(
            ScriptedBackend::default().summary_reply(Err(ClientError::Network(
                "timed out".to_string(),
            ))),
        );
        let manager = manager_with(backend, Arc::new(MemoryStore::new()));

        for n in 1..=9 {
            manager.submit(&format!("message {n}")).await.unwrap();
        }
        let submission = manager.submit("message 10").await.unwrap();
        submission.summarization.unwrap().await.unwrap();

        assert_eq!(manager.len(), 21);
        assert_eq!(manager.summary(), "");
    }

    #[tokio::test]
    async fn test_empty_summary_keeps_previous() {
        let store = Arc::new(MemoryStore::new());
        let seeded: Vec<ChatTurn> = (0..19)
            .map(|n| ChatTurn::user(format!("old {n}")))
            .collect();
        store
            .set(STORAGE_KEY_CHAT, &serde_json::to_string(&seeded).unwrap())
            .unwrap();
        store.set(STORAGE_KEY_SUMMARY, "earlier topics").unwrap();

        let backend = Arc::new(ScriptedBackend::default().summary_reply(Ok(String::new())));
        let manager = manager_with(backend, store);
        assert_eq!(manager.summary(), "earlier topics");

        let submission = manager.submit("new").await.unwrap();
        submission.summarization.unwrap().await.unwrap();

        let turns = manager.turns();
        assert_eq!(turns[0].content, "Summary so far: earlier topics");
        assert_eq!(manager.summary(), "earlier topics");
    }

    #[tokio::test]
    async fn test_reload_reproduces_conversation() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = Arc::new(ScriptedBackend::default());

        let first = manager_with(backend.clone(), Arc::new(FileStore::new(tmp.path())));
        first.set_model("Pollination");
        first.submit("**markdown** and `code`").await.unwrap();
        first.submit("second line\nwith newline").await.unwrap();

        let second = manager_with(backend.clone(), Arc::new(FileStore::new(tmp.path())));
        assert_eq!(second.turns(), first.turns());
        assert_eq!(second.summary(), first.summary());
        assert_eq!(second.model().id(), "Pollination");
    }

    #[test]
    fn test_unreadable_history_falls_back_to_greeting() {
        let store = Arc::new(MemoryStore::new());
        store.set(STORAGE_KEY_CHAT, "{not json").unwrap();

        let manager = manager_with(Arc::new(ScriptedBackend::default()), store);
        assert_eq!(manager.turns(), vec![ChatTurn::assistant(GREETING)]);
    }

    #[tokio::test]
    async fn test_selected_model_sent_to_backend() {
        let backend = Arc::new(ScriptedBackend::default());
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(backend.clone(), store.clone());

        manager.set_model("qwen/qwen3-coder:free");
        manager.submit("hello").await.unwrap();

        assert_eq!(
            store.get(STORAGE_KEY_MODEL).unwrap().as_deref(),
            Some("qwen/qwen3-coder:free")
        );
        assert_eq!(
            backend.calls()[0].1.as_deref(),
            Some("qwen/qwen3-coder:free")
        );
    }

    /// Store whose conversation writes wait at a barrier twice: once on entry
    /// and once before completing.
    struct GatedStore {
        inner: MemoryStore,
        gate: Barrier,
    }

    impl KeyValueStore for GatedStore {
        fn get(&self, key: &str) -> StoreResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> StoreResult<()> {
            if key == STORAGE_KEY_CHAT {
                self.gate.wait();
                self.gate.wait();
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> StoreResult<()> {
            self.inner.remove(key)
        }

        fn clear(&self) -> StoreResult<()> {
            self.inner.clear()
        }
    }

    #[test]
    fn test_reads_do_not_wait_for_store_writes() {
        let store = Arc::new(GatedStore {
            inner: MemoryStore::new(),
            gate: Barrier::new(2),
        });
        let manager = manager_with(Arc::new(ScriptedBackend::default()), store.clone());

        let writer = {
            let manager = manager.clone();
            std::thread::spawn(move || manager.reset())
        };

        // The writer is now inside the store call.
        store.gate.wait();
        assert_eq!(manager.turns(), vec![ChatTurn::assistant(GREETING)]);
        assert_eq!(manager.version(), 1);
        assert!(store.inner.get(STORAGE_KEY_CHAT).unwrap().is_none());

        store.gate.wait();
        writer.join().unwrap();
        assert_eq!(stored_turns(&store.inner), manager.turns());
    }

    #[tokio::test]
    async fn test_reset_returns_to_greeting() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(Arc::new(ScriptedBackend::default()), store.clone());
        manager.submit("hello").await.unwrap();

        manager.reset();

        assert_eq!(manager.turns(), vec![ChatTurn::assistant(GREETING)]);
        assert_eq!(stored_turns(&*store), manager.turns());
        assert_eq!(store.get(STORAGE_KEY_SUMMARY).unwrap().as_deref(), Some(""));
    }
}
