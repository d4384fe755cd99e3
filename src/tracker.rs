//! In-memory buffer of streaming conversation messages
//!
//! The host re-emits messages and parts as they grow; the tracker absorbs
//! those re-emissions by upserting on the message id and the
//! (message id, part id) pair. Replacement happens in place, so first-insert
//! order survives any number of updates. Nothing here is persisted; the
//! buffer drains into a chunk at finalization.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::types::{ChunkMessage, MessagePart, MessageRole};

/// A part plus the private id used to upsert it while streaming
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedPart {
    pub part_id: String,
    pub part: MessagePart,
}

/// A message under construction
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedMessage {
    pub id: String,
    pub role: MessageRole,
    pub parts: Vec<TrackedPart>,
    pub timestamp: i64,
}

impl TrackedMessage {
    pub fn new(id: impl Into<String>, role: MessageRole) -> Self {
        Self {
            id: id.into(),
            role,
            parts: Vec::new(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Drop the part ids, producing the persisted message shape
    pub fn into_chunk_message(self) -> ChunkMessage {
        ChunkMessage {
            id: self.id,
            role: self.role,
            parts: self.parts.into_iter().map(|p| p.part).collect(),
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    /// session id → messages in first-insert order
    messages: HashMap<String, Vec<TrackedMessage>>,
    /// session id → chunk the session last finalized into
    current_chunks: HashMap<String, String>,
}

/// Per-process message buffer keyed by session id
#[derive(Debug, Default)]
pub struct MessageTracker {
    state: Mutex<TrackerState>,
}

impl MessageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a message, preserving its original position
    pub fn track_message(&self, session_id: &str, message: TrackedMessage) {
        let mut state = self.state.lock();
        let messages = state.messages.entry(session_id.to_string()).or_default();
        match messages.iter_mut().find(|m| m.id == message.id) {
            Some(slot) => *slot = message,
            None => messages.push(message),
        }
    }

    /// Create an empty message shell, or correct the role of an existing one
    ///
    /// Parts can arrive before the message-metadata event; the shell created
    /// for them carries a provisional role that this call fixes up.
    pub fn ensure_message(&self, session_id: &str, message_id: &str, role: MessageRole) {
        let mut state = self.state.lock();
        let messages = state.messages.entry(session_id.to_string()).or_default();
        match messages.iter_mut().find(|m| m.id == message_id) {
            Some(existing) => {
                if existing.role != role {
                    existing.role = role;
                }
            }
            None => messages.push(TrackedMessage::new(message_id, role)),
        }
    }

    /// Insert or replace a part within its message, preserving position
    ///
    /// Creates the owning message with an assistant role when it has not
    /// been seen yet. Part ids are scoped per message, never deduplicated
    /// across messages.
    pub fn add_part(&self, session_id: &str, message_id: &str, part_id: &str, part: MessagePart) {
        let mut state = self.state.lock();
        let messages = state.messages.entry(session_id.to_string()).or_default();
        let index = match messages.iter().position(|m| m.id == message_id) {
            Some(index) => index,
            None => {
                messages.push(TrackedMessage::new(message_id, MessageRole::Assistant));
                messages.len() - 1
            }
        };
        let message = &mut messages[index];

        let tracked = TrackedPart {
            part_id: part_id.to_string(),
            part,
        };
        match message.parts.iter_mut().find(|p| p.part_id == part_id) {
            Some(slot) => *slot = tracked,
            None => message.parts.push(tracked),
        }
    }

    /// Snapshot of a session's messages in first-insert order
    pub fn get_messages(&self, session_id: &str) -> Vec<TrackedMessage> {
        self.state
            .lock()
            .messages
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn message_count(&self, session_id: &str) -> usize {
        self.state
            .lock()
            .messages
            .get(session_id)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    pub fn has_messages(&self, session_id: &str) -> bool {
        self.message_count(session_id) > 0
    }

    /// Drop a session's buffered messages and current-chunk marker
    pub fn clear_session(&self, session_id: &str) {
        let mut state = self.state.lock();
        state.messages.remove(session_id);
        state.current_chunks.remove(session_id);
    }

    /// Drop only the buffered messages, keeping the current-chunk marker
    pub fn clear_messages(&self, session_id: &str) {
        self.state.lock().messages.remove(session_id);
    }

    pub fn get_current_chunk_id(&self, session_id: &str) -> Option<String> {
        self.state.lock().current_chunks.get(session_id).cloned()
    }

    pub fn set_current_chunk_id(&self, session_id: &str, chunk_id: &str) {
        self.state
            .lock()
            .current_chunks
            .insert(session_id.to_string(), chunk_id.to_string());
    }
}
