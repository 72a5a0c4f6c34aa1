//! Conversation-history compaction policy.
//!
//! Once a conversation grows past [`MAX_HISTORY`] messages, all of it is
//! folded into one assistant message carrying a model-written summary.
//! Nothing is retained verbatim.

use pdfrag_shared::ChatMessage;

use crate::prompts::SUMMARY_PREFIX;

/// Largest history passed to the answer prompt as-is.
pub const MAX_HISTORY: usize = 10;

/// Whether `history` is long enough to be compacted before answering.
pub fn needs_compaction(history: &[ChatMessage]) -> bool {
    history.len() > MAX_HISTORY
}

/// Render messages as role-labeled lines, one per message.
pub fn transcript(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}", m.role().as_str(), m.content()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The message that stands in for a whole compacted history.
pub fn summary_message(summary: &str) -> ChatMessage {
    ChatMessage::assistant(format!("{SUMMARY_PREFIX}{}", summary.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(n: usize) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("q{i}"))
                } else {
                    ChatMessage::assistant(format!("a{i}"))
                }
            })
            .collect()
    }

    #[test]
    fn threshold_is_strictly_greater_than() {
        assert!(!needs_compaction(&[]));
        assert!(!needs_compaction(&turns(10)));
        assert!(needs_compaction(&turns(11)));
    }

    #[test]
    fn transcript_labels_each_line_with_role() {
        let text = transcript(&turns(3));
        assert_eq!(text, "user: q0\nassistant: a1\nuser: q2");
    }

    #[test]
    fn summary_message_is_prefixed_assistant_turn() {
        let msg = summary_message("  they asked about pricing \n");
        assert_eq!(
            msg,
            ChatMessage::assistant("Conversation summary: they asked about pricing")
        );
    }
}
