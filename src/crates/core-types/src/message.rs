//! Message and attachment DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transcript-unique message identifier.
///
/// Assigned monotonically by the store at creation time; history loads
/// advance the counter past the largest identifier they bring in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

// Unknown wire values normalize to `Assistant` instead of failing the
// whole history load.
impl<'de> Deserialize<'de> for Sender {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "user" => Sender::User,
            _ => Sender::Assistant,
        })
    }
}

/// A single transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub sender: Sender,
    /// Assigned at creation, restamped when an assistant reply completes.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<FileRef>,
    /// True while assistant content is still arriving.
    #[serde(default)]
    pub streaming: bool,
}

/// Reference to an uploaded (or locally retained) file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type", default)]
    pub media_type: String,
}

/// Payload handed to `upload_file`.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// History record as the server sends it.
///
/// Timestamps arrive as RFC-3339 strings and are parsed during
/// normalization; a missing `files` list defaults to empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub id: u64,
    pub content: String,
    pub sender: Sender,
    pub timestamp: String,
    #[serde(default)]
    pub files: Option<Vec<FileRef>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_ref_uses_wire_field_names() {
        let json = r#"{"url":"https://x/y.pdf","name":"y.pdf","size":12,"type":"application/pdf"}"#;
        let file: FileRef = serde_json::from_str(json).unwrap();
        assert_eq!(file.media_type, "application/pdf");
        let out = serde_json::to_string(&file).unwrap();
        assert!(out.contains(r#""type":"application/pdf""#));
    }

    #[test]
    fn unknown_sender_normalizes_to_assistant() {
        let msg: WireMessage = serde_json::from_str(
            r#"{"id":1,"content":"hi","sender":"system","timestamp":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(msg.sender, Sender::Assistant);
        assert!(msg.files.is_none());
    }
}
