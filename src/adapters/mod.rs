//! Boundary between the host and the core services
//!
//! Hooks translate host events into service calls; tools wrap the
//! user-facing operations with validation and rendering. Nothing below this
//! layer formats text for the end user.

pub mod hooks;
pub mod tools;

pub use hooks::{handle_chat_message, handle_session_compacting, ChatOutcome};
pub use tools::{ToolResponse, TOOL_DEFINITIONS};
