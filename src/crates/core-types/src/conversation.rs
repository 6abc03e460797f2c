//! Conversation identity and list-view metadata.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix marking a conversation identifier that was synthesized locally
/// because the backend could not allocate one.
pub const LOCAL_CONVERSATION_PREFIX: &str = "local-";

/// Synthesize a fallback conversation identifier for offline use.
pub fn local_conversation_id() -> String {
    format!("{}{}", LOCAL_CONVERSATION_PREFIX, Uuid::new_v4())
}

/// True when the identifier was synthesized locally rather than issued by
/// the backend.
pub fn is_local_conversation_id(id: &str) -> bool {
    id.starts_with(LOCAL_CONVERSATION_PREFIX)
}

/// Summary metadata for a conversation, used only in list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub last_message: String,
    #[serde(default)]
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ids_carry_the_prefix_and_are_unique() {
        let a = local_conversation_id();
        let b = local_conversation_id();
        assert!(is_local_conversation_id(&a));
        assert!(is_local_conversation_id(&b));
        assert_ne!(a, b);
        assert!(!is_local_conversation_id("srv-1234"));
    }
}
