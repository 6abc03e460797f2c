use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use parlor_backend::{ChatBackend, ReplyStream};
use parlor_core::{ConversationStore, MockResponder};
use parlor_core_types::{
    is_local_conversation_id, ConversationSummary, FileRef, FileUpload, MessageId, ParlorError,
    ParlorResult, Sender, WireMessage,
};

/// Scripted in-memory backend. Shared-state clone so tests can inspect
/// recorded calls after handing a copy to the store.
#[derive(Clone, Default)]
struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    fail_create: bool,
    fail_history: bool,
    fail_send: bool,
    fail_send_midstream: bool,
    reject_send_as_invalid: bool,
    fail_edit: bool,
    fail_delete: bool,
    fail_list: bool,
    fail_upload: bool,
    history: Vec<WireMessage>,
    conversations: Vec<ConversationSummary>,
    reply_chunks: Vec<String>,
    sends: Vec<(String, Option<String>)>,
    edits: Vec<(MessageId, String)>,
    deletes: Vec<String>,
}

impl FakeBackend {
    fn configure(&self, mutate: impl FnOnce(&mut FakeState)) {
        mutate(&mut self.state.lock().unwrap());
    }

    fn sends(&self) -> Vec<(String, Option<String>)> {
        self.state.lock().unwrap().sends.clone()
    }

    fn edits(&self) -> Vec<(MessageId, String)> {
        self.state.lock().unwrap().edits.clone()
    }

    fn deletes(&self) -> Vec<String> {
        self.state.lock().unwrap().deletes.clone()
    }
}

fn transport(reason: &str) -> ParlorError {
    ParlorError::Transport(reason.to_string())
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn create_conversation(&self) -> ParlorResult<String> {
        if self.state.lock().unwrap().fail_create {
            return Err(transport("create refused"));
        }
        Ok("srv-1".to_string())
    }

    async fn history(&self, _conversation_id: &str) -> ParlorResult<Vec<WireMessage>> {
        let state = self.state.lock().unwrap();
        if state.fail_history {
            return Err(transport("history refused"));
        }
        Ok(state.history.clone())
    }

    async fn send_streaming(
        &self,
        message: &str,
        _files: &[FileRef],
        conversation_id: Option<&str>,
    ) -> ParlorResult<ReplyStream> {
        let mut state = self.state.lock().unwrap();
        state
            .sends
            .push((message.to_string(), conversation_id.map(str::to_string)));
        if state.fail_send {
            return Err(transport("chat refused"));
        }
        if state.reject_send_as_invalid {
            return Err(ParlorError::InvalidResponse("not a reply".to_string()));
        }
        let mut items: Vec<ParlorResult<String>> =
            state.reply_chunks.iter().cloned().map(Ok).collect();
        if state.fail_send_midstream {
            items.push(Err(transport("connection reset")));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }

    async fn edit_message(
        &self,
        message_id: MessageId,
        content: &str,
    ) -> ParlorResult<WireMessage> {
        let mut state = self.state.lock().unwrap();
        state.edits.push((message_id, content.to_string()));
        if state.fail_edit {
            return Err(transport("edit refused"));
        }
        Ok(WireMessage {
            id: message_id.0,
            content: content.to_string(),
            sender: Sender::User,
            timestamp: "2026-02-01T10:00:00Z".to_string(),
            files: None,
        })
    }

    async fn list_conversations(&self) -> ParlorResult<Vec<ConversationSummary>> {
        let state = self.state.lock().unwrap();
        if state.fail_list {
            return Err(transport("list refused"));
        }
        Ok(state.conversations.clone())
    }

    async fn delete_conversation(&self, conversation_id: &str) -> ParlorResult<()> {
        let mut state = self.state.lock().unwrap();
        state.deletes.push(conversation_id.to_string());
        if state.fail_delete {
            return Err(transport("delete refused"));
        }
        Ok(())
    }

    async fn upload_file(&self, upload: FileUpload) -> ParlorResult<FileRef> {
        if self.state.lock().unwrap().fail_upload {
            return Err(transport("upload refused"));
        }
        let size = upload.size();
        Ok(FileRef {
            url: format!("https://files/{}", upload.name),
            name: upload.name,
            size,
            media_type: upload.media_type,
        })
    }
}

fn store(fake: &FakeBackend) -> ConversationStore<FakeBackend> {
    ConversationStore::with_responder(
        fake.clone(),
        MockResponder::default().with_token_delay(0..0),
    )
}

fn wire(id: u64, content: &str, sender: &str) -> WireMessage {
    WireMessage {
        id,
        content: content.to_string(),
        sender: match sender {
            "user" => Sender::User,
            _ => Sender::Assistant,
        },
        timestamp: "2026-02-01T10:00:00Z".to_string(),
        files: None,
    }
}

#[tokio::test]
async fn successful_send_appends_user_then_assistant() {
    let fake = FakeBackend::default();
    fake.configure(|state| state.reply_chunks = vec!["Hi ".into(), "there".into()]);
    let store = store(&fake);

    store.send_message("hello", Vec::new()).await.unwrap();

    let state = store.snapshot();
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[0].sender, Sender::User);
    assert_eq!(state.messages[0].content, "hello");
    assert_eq!(state.messages[1].sender, Sender::Assistant);
    assert_eq!(state.messages[1].content, "Hi there");
    assert!(!state.messages[1].streaming);
    assert!(!state.loading);
    assert!(state.has_sent_message);
    assert!(state.last_error.is_none());
}

#[tokio::test]
async fn send_initializes_a_conversation_when_none_is_active() {
    let fake = FakeBackend::default();
    fake.configure(|state| state.reply_chunks = vec!["ok".into()]);
    let store = store(&fake);

    store.send_message("hello", Vec::new()).await.unwrap();

    assert_eq!(store.snapshot().conversation_id.as_deref(), Some("srv-1"));
    assert_eq!(fake.sends(), vec![("hello".to_string(), Some("srv-1".to_string()))]);
}

#[tokio::test]
async fn backend_failure_degrades_to_a_mock_reply() {
    let fake = FakeBackend::default();
    fake.configure(|state| state.fail_send = true);
    let store = store(&fake);

    store.send_message("hello", Vec::new()).await.unwrap();

    let state = store.snapshot();
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[0].content, "hello");
    let reply = &state.messages[1];
    assert_eq!(reply.sender, Sender::Assistant);
    assert!(!reply.content.is_empty());
    assert!(!reply.streaming);
    assert!(
        MockResponder::default()
            .phrases()
            .iter()
            .any(|phrase| phrase == &reply.content),
        "reply should be one of the fixed phrases: {:?}",
        reply.content
    );
    assert!(!state.loading);
    assert!(state.last_error.is_none());
}

#[tokio::test]
async fn midstream_failure_also_degrades_to_a_mock_reply() {
    let fake = FakeBackend::default();
    fake.configure(|state| {
        state.reply_chunks = vec!["Par".into()];
        state.fail_send_midstream = true;
    });
    let store = store(&fake);

    store.send_message("hello", Vec::new()).await.unwrap();

    let state = store.snapshot();
    let reply = &state.messages[1];
    assert!(
        MockResponder::default()
            .phrases()
            .iter()
            .any(|phrase| phrase == &reply.content),
        "partial content must be fully replaced: {:?}",
        reply.content
    );
    assert!(!reply.streaming);
    assert!(!state.loading);
}

#[tokio::test]
async fn unexpected_failure_rolls_the_placeholder_back() {
    let fake = FakeBackend::default();
    fake.configure(|state| state.reject_send_as_invalid = true);
    let store = store(&fake);

    let err = store.send_message("hello", Vec::new()).await.unwrap_err();
    assert!(matches!(err, ParlorError::InvalidResponse(_)));

    let state = store.snapshot();
    // The optimistic user message stays; the placeholder must not.
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].sender, Sender::User);
    assert!(!state.loading);
    assert_eq!(state.last_error.as_deref(), Some("Failed to send message"));
}

#[tokio::test]
async fn editing_a_user_message_truncates_then_regenerates() {
    let fake = FakeBackend::default();
    fake.configure(|state| state.reply_chunks = vec!["Reply".into()]);
    let store = store(&fake);

    store.send_message("first", Vec::new()).await.unwrap();
    store.send_message("second", Vec::new()).await.unwrap();
    let state = store.snapshot();
    assert_eq!(state.messages.len(), 4);
    let first_user = state.messages[0].id;

    store.edit_message(first_user, "first, edited").await.unwrap();

    let state = store.snapshot();
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[0].id, first_user);
    assert_eq!(state.messages[0].content, "first, edited");
    assert_eq!(state.messages[1].sender, Sender::Assistant);
    assert_eq!(state.messages[1].content, "Reply");
    assert!(!state.loading);
    assert_eq!(
        fake.edits(),
        vec![(first_user, "first, edited".to_string())]
    );
}

#[tokio::test]
async fn editing_an_assistant_message_truncates_without_a_new_turn() {
    let fake = FakeBackend::default();
    fake.configure(|state| {
        state.reply_chunks = vec!["Reply".into()];
        state.fail_edit = true;
    });
    let store = store(&fake);

    store.send_message("first", Vec::new()).await.unwrap();
    store.send_message("second", Vec::new()).await.unwrap();
    let sends_before = fake.sends().len();
    let assistant = store.snapshot().messages[1].id;

    store.edit_message(assistant, "revised").await.unwrap();

    let state = store.snapshot();
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[1].content, "revised");
    assert_eq!(fake.sends().len(), sends_before);
    assert!(!state.loading);
    // A failed remote propagation is logged, never surfaced.
    assert!(state.last_error.is_none());
}

#[tokio::test]
async fn editing_a_vanished_message_is_a_silent_noop() {
    let fake = FakeBackend::default();
    fake.configure(|state| state.reply_chunks = vec!["Reply".into()]);
    let store = store(&fake);
    store.send_message("first", Vec::new()).await.unwrap();
    let before = store.snapshot().messages.len();

    store.edit_message(MessageId(999), "ghost").await.unwrap();

    assert_eq!(store.snapshot().messages.len(), before);
    assert!(fake.edits().is_empty());
}

#[tokio::test]
async fn delete_removes_the_summary_even_when_the_backend_fails() {
    let fake = FakeBackend::default();
    fake.configure(|state| {
        state.fail_delete = true;
        state.conversations = vec![
            ConversationSummary {
                id: "srv-1".into(),
                title: "a".into(),
                last_message: String::new(),
                timestamp: String::new(),
            },
            ConversationSummary {
                id: "srv-2".into(),
                title: "b".into(),
                last_message: String::new(),
                timestamp: String::new(),
            },
        ];
    });
    let store = store(&fake);
    store.load_conversations_list().await;

    store.delete_conversation("srv-2").await;

    let state = store.snapshot();
    assert_eq!(state.conversations.len(), 1);
    assert_eq!(state.conversations[0].id, "srv-1");
    assert_eq!(fake.deletes(), vec!["srv-2".to_string()]);
}

#[tokio::test]
async fn deleting_the_active_conversation_resets_to_a_fresh_one() {
    let fake = FakeBackend::default();
    fake.configure(|state| state.reply_chunks = vec!["ok".into()]);
    let store = store(&fake);
    store.send_message("hello", Vec::new()).await.unwrap();
    assert_eq!(store.snapshot().conversation_id.as_deref(), Some("srv-1"));

    // Backend goes dark between the send and the delete.
    fake.configure(|state| {
        state.fail_delete = true;
        state.fail_create = true;
    });
    store.delete_conversation("srv-1").await;

    let state = store.snapshot();
    assert!(state.messages.is_empty());
    assert!(!state.has_sent_message);
    let id = state.conversation_id.expect("a fresh conversation");
    assert!(is_local_conversation_id(&id));
}

#[tokio::test]
async fn initialize_falls_back_to_a_local_identifier() {
    let fake = FakeBackend::default();
    fake.configure(|state| state.fail_create = true);
    let store = store(&fake);

    let id = store.initialize_conversation().await;

    assert!(is_local_conversation_id(&id));
    assert_eq!(store.snapshot().conversation_id.as_deref(), Some(id.as_str()));
}

#[tokio::test]
async fn load_history_normalizes_and_keeps_ids_disjoint() {
    let fake = FakeBackend::default();
    fake.configure(|state| {
        state.history = vec![wire(5, "hello", "user"), wire(9, "hi!", "assistant")];
        state.reply_chunks = vec!["ok".into()];
    });
    let store = store(&fake);

    store.load_history(Some("srv-1")).await;

    let state = store.snapshot();
    assert_eq!(state.messages.len(), 2);
    assert!(state.messages.iter().all(|message| !message.streaming));
    assert!(state.messages[0].attachments.is_empty());
    assert!(state.has_sent_message);
    assert!(!state.loading);

    store.send_message("next", Vec::new()).await.unwrap();
    let state = store.snapshot();
    assert!(state.messages[2].id > MessageId(9));
}

#[tokio::test]
async fn load_history_failure_resets_the_transcript() {
    let fake = FakeBackend::default();
    fake.configure(|state| state.reply_chunks = vec!["ok".into()]);
    let store = store(&fake);
    store.send_message("hello", Vec::new()).await.unwrap();

    fake.configure(|state| state.fail_history = true);
    store.load_history(None).await;

    let state = store.snapshot();
    assert!(state.messages.is_empty());
    assert!(!state.loading);
    assert!(!state.has_sent_message);
}

#[tokio::test]
async fn switch_surfaces_the_failure_but_still_resets() {
    let fake = FakeBackend::default();
    fake.configure(|state| state.fail_history = true);
    let store = store(&fake);

    let err = store.switch_conversation("srv-9").await.unwrap_err();
    assert!(matches!(err, ParlorError::Transport(_)));

    let state = store.snapshot();
    assert_eq!(state.conversation_id.as_deref(), Some("srv-9"));
    assert!(state.messages.is_empty());
    assert_eq!(
        state.last_error.as_deref(),
        Some("Failed to switch conversation")
    );
}

#[tokio::test]
async fn list_failure_substitutes_synthetic_placeholders() {
    let fake = FakeBackend::default();
    fake.configure(|state| state.fail_list = true);
    let store = store(&fake);

    let conversations = store.load_conversations_list().await;

    assert!(!conversations.is_empty());
    assert!(conversations
        .iter()
        .all(|summary| is_local_conversation_id(&summary.id)));
    assert_eq!(store.snapshot().conversations, conversations);
}

#[tokio::test]
async fn upload_failure_yields_a_local_descriptor() {
    let fake = FakeBackend::default();
    fake.configure(|state| state.fail_upload = true);
    let store = store(&fake);

    let file = store
        .upload_file(FileUpload {
            name: "notes.txt".into(),
            media_type: "text/plain".into(),
            bytes: b"hello".to_vec(),
        })
        .await;

    assert!(file.url.starts_with("local://"));
    assert_eq!(file.name, "notes.txt");
    assert_eq!(file.size, 5);
    assert_eq!(file.media_type, "text/plain");
}

#[tokio::test]
async fn clear_messages_always_leaves_an_active_conversation() {
    let fake = FakeBackend::default();
    fake.configure(|state| state.reply_chunks = vec!["ok".into()]);
    let store = store(&fake);
    store.send_message("hello", Vec::new()).await.unwrap();

    let id = store.clear_messages().await;

    let state = store.snapshot();
    assert!(state.messages.is_empty());
    assert!(!state.has_sent_message);
    assert!(!state.loading);
    assert!(state.last_error.is_none());
    assert_eq!(state.conversation_id.as_deref(), Some(id.as_str()));
}

#[tokio::test]
async fn watchers_observe_the_streamed_reply() {
    let fake = FakeBackend::default();
    fake.configure(|state| state.reply_chunks = vec!["Hi ".into(), "there".into()]);
    let store = store(&fake);
    let mut watcher = store.watch();

    store.send_message("hello", Vec::new()).await.unwrap();

    watcher.changed().await.unwrap();
    let state = watcher.borrow_and_update().clone();
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[1].content, "Hi there");
    assert!(!state.loading);
}
