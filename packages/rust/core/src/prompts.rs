//! Fixed text sent to the chat model.

/// System instruction for answering a question over retrieved context.
pub const ANSWER_INSTRUCTION: &str = "You are an assistant answering questions about a PDF document.
- Always use the information in the context below.
- Do not make up answers that are not supported by the context.
- If the question is outside the context, politely say that you don't know.
- Keep answers concise and clear.
- Refer to the previous conversation to maintain continuity.";

/// System instruction for the summarization call.
pub const SUMMARY_INSTRUCTION: &str = "Summarize the following conversation briefly:";

/// Marks the synthetic assistant message that replaces a compacted history.
pub const SUMMARY_PREFIX: &str = "Conversation summary: ";
