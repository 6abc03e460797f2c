//! reqwest adapter for the remote chat API.

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use parlor_core_types::{
    ConversationSummary, FileRef, FileUpload, MessageId, ParlorError, ParlorResult, WireMessage,
};
use parlor_stream::{SseDecoder, StreamFrame};

use crate::config::HttpBackendConfig;
use crate::traits::{ChatBackend, ReplyStream};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedConversation {
    conversation_id: String,
}

#[derive(Debug, Deserialize)]
struct HistoryBody {
    #[serde(default)]
    messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct ConversationsBody {
    #[serde(default)]
    conversations: Vec<ConversationSummary>,
}

/// HTTP implementation of [`ChatBackend`].
pub struct HttpChatBackend {
    client: Client,
    config: HttpBackendConfig,
}

impl HttpChatBackend {
    /// Build a backend over a fresh client.
    ///
    /// No global client timeout is set; the streaming endpoint must be able
    /// to outlive any single round trip. Request/response endpoints get the
    /// configured timeout per call.
    pub fn new(config: HttpBackendConfig) -> ParlorResult<Self> {
        let client = Client::builder().build().map_err(ParlorError::transport)?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn check(response: Response) -> ParlorResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ParlorError::Transport(format!("HTTP {}: {}", status, body)))
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn create_conversation(&self) -> ParlorResult<String> {
        let response = self
            .client
            .post(self.url("/conversations"))
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(ParlorError::transport)?;
        let body: CreatedConversation = Self::check(response)
            .await?
            .json()
            .await
            .map_err(ParlorError::invalid_response)?;
        Ok(body.conversation_id)
    }

    async fn history(&self, conversation_id: &str) -> ParlorResult<Vec<WireMessage>> {
        let response = self
            .client
            .get(self.url(&format!("/conversations/{}/messages", conversation_id)))
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(ParlorError::transport)?;
        let body: HistoryBody = Self::check(response)
            .await?
            .json()
            .await
            .map_err(ParlorError::invalid_response)?;
        Ok(body.messages)
    }

    async fn send_streaming(
        &self,
        message: &str,
        files: &[FileRef],
        conversation_id: Option<&str>,
    ) -> ParlorResult<ReplyStream> {
        let mut form = Form::new().text("message", message.to_string());
        for file in files {
            let encoded = serde_json::to_string(file).map_err(ParlorError::invalid_response)?;
            form = form.text("files", encoded);
        }
        if let Some(id) = conversation_id {
            form = form.text("conversationId", id.to_string());
        }

        let response = self
            .client
            .post(self.url("/chat"))
            .multipart(form)
            .send()
            .await
            .map_err(ParlorError::transport)?;
        let response = Self::check(response).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(pump_reply(response, tx));
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn edit_message(
        &self,
        message_id: MessageId,
        content: &str,
    ) -> ParlorResult<WireMessage> {
        let response = self
            .client
            .patch(self.url(&format!("/messages/{}", message_id)))
            .timeout(self.config.request_timeout)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .map_err(ParlorError::transport)?;
        Self::check(response)
            .await?
            .json()
            .await
            .map_err(ParlorError::invalid_response)
    }

    async fn list_conversations(&self) -> ParlorResult<Vec<ConversationSummary>> {
        let response = self
            .client
            .get(self.url("/conversations"))
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(ParlorError::transport)?;
        let body: ConversationsBody = Self::check(response)
            .await?
            .json()
            .await
            .map_err(ParlorError::invalid_response)?;
        Ok(body.conversations)
    }

    async fn delete_conversation(&self, conversation_id: &str) -> ParlorResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/conversations/{}", conversation_id)))
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(ParlorError::transport)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn upload_file(&self, upload: FileUpload) -> ParlorResult<FileRef> {
        let part = Part::bytes(upload.bytes)
            .file_name(upload.name)
            .mime_str(&upload.media_type)
            .map_err(ParlorError::transport)?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("/upload"))
            .timeout(self.config.request_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(ParlorError::transport)?;
        Self::check(response)
            .await?
            .json()
            .await
            .map_err(ParlorError::invalid_response)
    }
}

/// Drain the response body through the decoder, forwarding deltas.
///
/// End of body without an explicit `[DONE]` still counts as clean
/// completion; a body error mid-stream is forwarded and ends the reply.
async fn pump_reply(response: Response, tx: mpsc::UnboundedSender<ParlorResult<String>>) {
    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = body.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("Reply stream aborted: {}", err);
                let _ = tx.send(Err(ParlorError::transport(err)));
                return;
            }
        };
        for frame in decoder.feed(&bytes) {
            match frame {
                StreamFrame::Delta(text) => {
                    if tx.send(Ok(text)).is_err() {
                        debug!("Reply receiver dropped, abandoning stream");
                        return;
                    }
                }
                StreamFrame::Done => return,
            }
        }
    }
}
