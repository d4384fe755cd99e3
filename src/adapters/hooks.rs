//! Host event handlers
//!
//! The host's hook surface is asynchronous and UI-flavored; these handlers
//! are the synchronous core it awaits. Each one translates an event into
//! service calls and hands back a plain outcome record for the host to
//! render.

use crate::error::Result;
use crate::service::runtime::Runtime;
use crate::storage::tree::CompactResult;
use crate::tracker::TrackedMessage;
use crate::types::{Memory, MessagePart, MessageRole};

/// What a chat-message event produced
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    /// A trigger phrase was present outside code
    pub keyword_detected: bool,
    /// Memories relevant to a session's first message, best first
    pub injected: Vec<Memory>,
}

/// Handle an incoming chat message
///
/// Every message is tested for trigger phrases; only a session's first
/// message also pulls relevant memories for context injection.
pub fn handle_chat_message(
    runtime: &Runtime,
    text: &str,
    is_first_message: bool,
) -> Result<ChatOutcome> {
    let keyword_detected = runtime.memories.detect_keyword(text);
    let injected = if is_first_message {
        runtime.memories.search_relevant(text)?
    } else {
        Vec::new()
    };
    Ok(ChatOutcome {
        keyword_detected,
        injected,
    })
}

/// Render injected memories as a context block, or nothing when empty
pub fn format_injection(memories: &[Memory]) -> Option<String> {
    if memories.is_empty() {
        return None;
    }
    let mut out = String::from("Relevant project memories:\n");
    for memory in memories {
        out.push_str(&format!("- [{}] {}\n", memory.memory_type, memory.content));
    }
    Some(out)
}

/// Buffer a streamed message event
pub fn handle_message_event(
    runtime: &Runtime,
    session_id: &str,
    message_id: &str,
    role: MessageRole,
) {
    runtime.tracker.ensure_message(session_id, message_id, role);
}

/// Buffer a streamed part event
pub fn handle_part_event(
    runtime: &Runtime,
    session_id: &str,
    message_id: &str,
    part_id: &str,
    part: MessagePart,
) {
    runtime.tracker.add_part(session_id, message_id, part_id, part);
}

/// Replace a whole buffered message
pub fn handle_message_replaced(runtime: &Runtime, session_id: &str, message: TrackedMessage) {
    runtime.tracker.track_message(session_id, message);
}

/// Handle the host compacting a session
///
/// Buffered messages become a final leaf chunk first, then every active
/// chunk of the session is bound under the supplied summary. Returns `None`
/// when the session has neither buffered messages nor active chunks.
pub fn handle_session_compacting(
    runtime: &Runtime,
    session_id: &str,
    summary: &str,
) -> Result<Option<CompactResult>> {
    runtime.chunks.finalize(session_id)?;
    runtime.chunks.compact(session_id, summary)
}
