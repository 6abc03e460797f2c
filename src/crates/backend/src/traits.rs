//! Backend capability consumed by the conversation store.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use parlor_core_types::{
    ConversationSummary, FileRef, FileUpload, MessageId, ParlorResult, WireMessage,
};

/// Incremental content fragments of one assistant reply.
///
/// Clean exhaustion is completion, whether or not the wire carried an
/// explicit end marker; an `Err` item is a transport failure mid-reply.
/// The stream is finite and not restartable.
pub type ReplyStream = Pin<Box<dyn Stream<Item = ParlorResult<String>> + Send>>;

/// Remote chat API capability.
///
/// All operations are request/response except `send_streaming`, which
/// pushes deltas over a single request.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Create a conversation and return its server-issued identifier.
    async fn create_conversation(&self) -> ParlorResult<String>;

    /// Fetch the full message history of a conversation.
    async fn history(&self, conversation_id: &str) -> ParlorResult<Vec<WireMessage>>;

    /// Send a message and stream the assistant reply.
    async fn send_streaming(
        &self,
        message: &str,
        files: &[FileRef],
        conversation_id: Option<&str>,
    ) -> ParlorResult<ReplyStream>;

    /// Update a message's content on the server.
    async fn edit_message(&self, message_id: MessageId, content: &str)
        -> ParlorResult<WireMessage>;

    /// List conversation summaries.
    async fn list_conversations(&self) -> ParlorResult<Vec<ConversationSummary>>;

    /// Delete a conversation.
    async fn delete_conversation(&self, conversation_id: &str) -> ParlorResult<()>;

    /// Upload a file and return its durable reference.
    async fn upload_file(&self, upload: FileUpload) -> ParlorResult<FileRef>;
}
