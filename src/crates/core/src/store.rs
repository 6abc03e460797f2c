//! Conversation state engine.
//!
//! Owns the transcript and conversation identity, orchestrates
//! send/edit/switch/delete, and reconciles streamed reply data into
//! transcript state. All mutation goes through a single observable cell;
//! callers read snapshots or subscribe, never mutate.
//!
//! At most one send/edit may be in flight per store. The store does not
//! enqueue concurrent sends; callers wait for `loading` to clear before
//! initiating another.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use log::{debug, warn};
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use parlor_backend::ChatBackend;
use parlor_core_types::{
    local_conversation_id, ConversationSummary, FileRef, FileUpload, Message, MessageId,
    ParlorError, ParlorResult, Sender, WireMessage, LOCAL_CONVERSATION_PREFIX,
};

use crate::mock::MockResponder;
use crate::observe::StateCell;

/// Observable session state.
///
/// A value snapshot; cheap to clone and safe to hold across awaits.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Active conversation, `None` until first use.
    pub conversation_id: Option<String>,
    /// The transcript, in insertion order. Never reordered.
    pub messages: Vec<Message>,
    /// True while an assistant turn is in flight.
    pub loading: bool,
    /// True once the user has sent (or loaded) at least one message.
    pub has_sent_message: bool,
    /// Last user-facing failure, if any.
    pub last_error: Option<String>,
    /// Cached conversation summaries for list views.
    pub conversations: Vec<ConversationSummary>,
}

/// Clearly-synthetic summaries shown when the list cannot be fetched.
fn placeholder_conversations() -> Vec<ConversationSummary> {
    let hour = chrono::Duration::hours(1);
    vec![
        ConversationSummary {
            id: format!("{}sample-1", LOCAL_CONVERSATION_PREFIX),
            title: "Sample conversation 1".to_string(),
            last_message: "Hello! How can I help?".to_string(),
            timestamp: (Utc::now() - hour).to_rfc3339(),
        },
        ConversationSummary {
            id: format!("{}sample-2", LOCAL_CONVERSATION_PREFIX),
            title: "Sample conversation 2".to_string(),
            last_message: "Thanks for the interesting question.".to_string(),
            timestamp: (Utc::now() - hour * 2).to_rfc3339(),
        },
    ]
}

/// Client-side conversational state manager.
///
/// Mediates between a view layer and a [`ChatBackend`], keeping the
/// transcript consistent across success, partial failure, and full
/// failure of the remote call.
pub struct ConversationStore<B> {
    backend: B,
    responder: MockResponder,
    state: StateCell<SessionState>,
    next_message_id: AtomicU64,
}

impl<B: ChatBackend> ConversationStore<B> {
    pub fn new(backend: B) -> Self {
        Self::with_responder(backend, MockResponder::default())
    }

    /// Inject a custom fallback responder (tests, demos).
    pub fn with_responder(backend: B, responder: MockResponder) -> Self {
        Self {
            backend,
            responder,
            state: StateCell::default(),
            next_message_id: AtomicU64::new(1),
        }
    }

    /// Clone the current session state.
    pub fn snapshot(&self) -> SessionState {
        self.state.get()
    }

    /// Subscribe to state change notifications.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.watch()
    }

    /// Obtain a usable conversation identifier, online or off.
    ///
    /// Attempts backend creation; on any failure a local fallback
    /// identifier is synthesized so the caller can proceed offline. Never
    /// fails. Sets the current conversation.
    pub async fn initialize_conversation(&self) -> String {
        self.state.update(|state| state.last_error = None);
        let id = match self.backend.create_conversation().await {
            Ok(id) => id,
            Err(err) => {
                warn!(
                    "Backend could not allocate a conversation, continuing offline: {}",
                    err
                );
                local_conversation_id()
            }
        };
        self.state
            .update(|state| state.conversation_id = Some(id.clone()));
        id
    }

    /// Fetch remote history and replace the transcript with a normalized
    /// copy. Absorbs failures: a transcript that cannot be fetched becomes
    /// empty rather than stale.
    pub async fn load_history(&self, id: Option<&str>) {
        if let Err(err) = self.fetch_history_into_transcript(id).await {
            warn!("Failed to load history, resetting transcript: {}", err);
            self.reset_transcript();
        }
    }

    /// Fetch conversation summaries for list views. On failure a fixed,
    /// clearly-synthetic placeholder set is substituted so the caller
    /// always has something renderable.
    pub async fn load_conversations_list(&self) -> Vec<ConversationSummary> {
        self.state.update(|state| state.last_error = None);
        let conversations = match self.backend.list_conversations().await {
            Ok(list) => list,
            Err(err) => {
                warn!("Failed to load conversations, using placeholders: {}", err);
                placeholder_conversations()
            }
        };
        self.state
            .update(|state| state.conversations = conversations.clone());
        conversations
    }

    /// Make `id` the active conversation and load its history.
    ///
    /// Unlike [`load_history`](Self::load_history), a failure here is
    /// surfaced: switching is direct user navigation and must not fail
    /// silently. The transcript is still reset first.
    pub async fn switch_conversation(&self, id: &str) -> ParlorResult<()> {
        self.state
            .update(|state| state.conversation_id = Some(id.to_string()));
        match self.fetch_history_into_transcript(Some(id)).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!("Failed to switch to conversation {}: {}", id, err);
                self.reset_transcript();
                self.state.update(|state| {
                    state.last_error = Some("Failed to switch conversation".to_string());
                });
                Err(err)
            }
        }
    }

    /// Send a user message and stream the assistant reply into the
    /// transcript.
    ///
    /// The user message is appended immediately and never rolled back. A
    /// backend failure before the reply completes degrades to a simulated
    /// reply; only an unexpected failure is returned, after the streaming
    /// placeholder has been removed again.
    pub async fn send_message(
        &self,
        content: impl Into<String>,
        attachments: Vec<FileRef>,
    ) -> ParlorResult<()> {
        let content = content.into();
        self.state.update(|state| {
            state.last_error = None;
            state.has_sent_message = true;
        });

        if self.state.get().conversation_id.is_none() {
            self.initialize_conversation().await;
        }

        self.append_message(Sender::User, content.clone(), attachments.clone(), false);

        self.run_assistant_turn(&content, &attachments)
            .await
            .map_err(|err| {
                self.state.update(|state| {
                    state.last_error = Some("Failed to send message".to_string());
                });
                err
            })
    }

    /// Edit a message in place and truncate everything after it. Editing a
    /// user message re-triggers the assistant reply as if freshly sent.
    ///
    /// The edit is propagated to the backend best-effort afterwards; local
    /// state is already authoritative for this session, so a failed remote
    /// edit is logged and ignored. An unknown id is a silent no-op.
    pub async fn edit_message(
        &self,
        id: MessageId,
        new_content: impl Into<String>,
    ) -> ParlorResult<()> {
        let new_content = new_content.into();
        self.state.update(|state| state.last_error = None);

        let snapshot = self.state.get();
        let Some(index) = snapshot.messages.iter().position(|message| message.id == id) else {
            debug!("Ignoring edit of vanished message {}", id);
            return Ok(());
        };
        let sender = snapshot.messages[index].sender;
        let attachments = snapshot.messages[index].attachments.clone();

        self.state.update(|state| {
            if let Some(index) = state.messages.iter().position(|message| message.id == id) {
                let message = &mut state.messages[index];
                message.content = new_content.clone();
                message.timestamp = Utc::now();
                state.messages.truncate(index + 1);
            }
        });

        if sender == Sender::User {
            self.run_assistant_turn(&new_content, &attachments)
                .await
                .map_err(|err| {
                    self.state.update(|state| {
                        state.last_error = Some("Failed to edit message".to_string());
                    });
                    err
                })?;
        }

        if let Err(err) = self.backend.edit_message(id, &new_content).await {
            warn!("Failed to propagate edit of message {}: {}", id, err);
        }
        Ok(())
    }

    /// Remove a conversation from the summary list. Local removal is
    /// unconditional; a failed backend delete does not roll it back. If
    /// the active conversation was deleted, the store resets to a fresh
    /// one.
    pub async fn delete_conversation(&self, id: &str) {
        self.state.update(|state| state.last_error = None);

        if let Err(err) = self.backend.delete_conversation(id).await {
            warn!(
                "Failed to delete conversation {} on the server, removing locally: {}",
                id, err
            );
        }
        self.state
            .update(|state| state.conversations.retain(|summary| summary.id != id));

        if self.state.get().conversation_id.as_deref() == Some(id) {
            self.clear_messages().await;
        }
    }

    /// Empty the transcript, reset flags, and start a fresh conversation.
    ///
    /// Returns the new identifier; the store is never left without an
    /// active conversation.
    pub async fn clear_messages(&self) -> String {
        self.state.update(|state| {
            state.messages.clear();
            state.has_sent_message = false;
            state.loading = false;
            state.last_error = None;
        });
        self.initialize_conversation().await
    }

    /// Upload a file, falling back to a locally-derived descriptor so the
    /// caller can still display and attach the file without a durable URL.
    pub async fn upload_file(&self, upload: FileUpload) -> FileRef {
        self.state.update(|state| state.last_error = None);
        match self.backend.upload_file(upload.clone()).await {
            Ok(file) => file,
            Err(err) => {
                warn!("File upload failed, keeping a local descriptor: {}", err);
                let size = upload.size();
                FileRef {
                    url: format!("local://{}", Uuid::new_v4()),
                    name: upload.name,
                    size,
                    media_type: upload.media_type,
                }
            }
        }
    }

    // ---- internals -------------------------------------------------------

    /// Append a streaming placeholder and drive one assistant reply into
    /// it. On an unexpected failure the placeholder is removed again, by
    /// id rather than position, so the transcript never retains an
    /// orphaned streaming entry.
    async fn run_assistant_turn(&self, prompt: &str, attachments: &[FileRef]) -> ParlorResult<()> {
        self.state.update(|state| state.loading = true);
        let placeholder = self.append_message(Sender::Assistant, String::new(), Vec::new(), true);

        match self.stream_reply_into(placeholder, prompt, attachments).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.remove_message(placeholder);
                self.state.update(|state| state.loading = false);
                Err(err)
            }
        }
    }

    /// Drive the backend reply stream into the target message; degrade to
    /// the simulated responder on transport failure. Only non-transport
    /// failures escape.
    async fn stream_reply_into(
        &self,
        target: MessageId,
        prompt: &str,
        attachments: &[FileRef],
    ) -> ParlorResult<()> {
        let conversation_id = self.state.get().conversation_id;

        let failure = match self
            .backend
            .send_streaming(prompt, attachments, conversation_id.as_deref())
            .await
        {
            Ok(mut stream) => {
                let mut full = String::new();
                let mut failure = None;
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(fragment) => {
                            full.push_str(&fragment);
                            // Full replace, not append: the backend may
                            // resend cumulative state.
                            self.replace_content(target, &full);
                        }
                        Err(err) => {
                            failure = Some(err);
                            break;
                        }
                    }
                }
                match failure {
                    None => {
                        self.finalize_message(target);
                        return Ok(());
                    }
                    Some(err) => err,
                }
            }
            Err(err) => err,
        };

        match failure {
            ParlorError::Transport(reason) => {
                warn!(
                    "Streaming reply failed, falling back to a simulated response: {}",
                    reason
                );
                self.stream_mock_reply(target).await;
                Ok(())
            }
            other => Err(other),
        }
    }

    /// Reveal a simulated reply into the target message, then finalize it
    /// exactly as a clean completion would.
    async fn stream_mock_reply(&self, target: MessageId) {
        let mut snapshots = self.responder.stream_reply();
        while let Some(snapshot) = snapshots.next().await {
            self.replace_content(target, &snapshot);
        }
        self.finalize_message(target);
    }

    async fn fetch_history_into_transcript(&self, id: Option<&str>) -> ParlorResult<()> {
        self.state.update(|state| {
            state.last_error = None;
            state.loading = true;
        });

        let target = match id {
            Some(id) => id.to_string(),
            None => match self.state.get().conversation_id {
                Some(id) => id,
                None => self.initialize_conversation().await,
            },
        };

        match self.backend.history(&target).await {
            Ok(wire) => {
                let messages: Vec<Message> =
                    wire.into_iter().map(normalize_wire_message).collect();
                // Keep locally assigned ids disjoint from everything the
                // server handed us.
                if let Some(max) = messages.iter().map(|message| message.id.0).max() {
                    self.next_message_id.fetch_max(max + 1, Ordering::Relaxed);
                }
                self.state.update(|state| {
                    state.has_sent_message = !messages.is_empty();
                    state.messages = messages;
                    state.loading = false;
                });
                Ok(())
            }
            Err(err) => {
                self.state.update(|state| state.loading = false);
                Err(err)
            }
        }
    }

    fn reset_transcript(&self) {
        self.state.update(|state| {
            state.messages.clear();
            state.has_sent_message = false;
            state.loading = false;
        });
    }

    fn next_id(&self) -> MessageId {
        MessageId(self.next_message_id.fetch_add(1, Ordering::Relaxed))
    }

    fn append_message(
        &self,
        sender: Sender,
        content: String,
        attachments: Vec<FileRef>,
        streaming: bool,
    ) -> MessageId {
        let id = self.next_id();
        let message = Message {
            id,
            content,
            sender,
            timestamp: Utc::now(),
            attachments,
            streaming,
        };
        self.state.update(|state| state.messages.push(message));
        id
    }

    /// Remove by id; a no-op when the message is already gone.
    fn remove_message(&self, id: MessageId) {
        self.state
            .update(|state| state.messages.retain(|message| message.id != id));
    }

    /// Replace the target's content with the cumulative text so far.
    ///
    /// Re-locates the target by id on every call: the transcript may have
    /// been truncated or cleared since the fragment was scheduled, in
    /// which case this is a no-op.
    fn replace_content(&self, id: MessageId, full_text: &str) {
        self.state.update(|state| {
            if let Some(message) = state.messages.iter_mut().find(|message| message.id == id) {
                message.content = full_text.to_string();
            }
        });
    }

    /// Clean completion: clear the streaming flag, stamp a fresh
    /// timestamp, clear loading. Tolerates a vanished target.
    fn finalize_message(&self, id: MessageId) {
        self.state.update(|state| {
            if let Some(message) = state.messages.iter_mut().find(|message| message.id == id) {
                message.streaming = false;
                message.timestamp = Utc::now();
            }
            state.loading = false;
        });
    }
}

fn normalize_wire_message(wire: WireMessage) -> Message {
    let timestamp = DateTime::parse_from_rfc3339(&wire.timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    Message {
        id: MessageId(wire.id),
        content: wire.content,
        sender: wire.sender,
        timestamp,
        attachments: wire.files.unwrap_or_default(),
        streaming: false,
    }
}
