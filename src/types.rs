//! Core types for Memoir

use serde::{Deserialize, Serialize};

/// A curated project memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Unique identifier (`mem_` + 12 base62 chars)
    pub id: String,
    /// The remembered content
    pub content: String,
    /// Memory classification
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    /// Optional ordered labels
    pub tags: Option<Vec<String>>,
    /// Where the memory came from
    pub source: MemorySource,
    /// Seconds since epoch, set on insert
    pub created_at: i64,
    /// Seconds since epoch, set on any mutation
    pub updated_at: Option<i64>,
    /// Reserved for vector search
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<u8>>,
}

/// Memory classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Preference,
    Pattern,
    Gotcha,
    Fact,
    Learned,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Preference => "preference",
            MemoryType::Pattern => "pattern",
            MemoryType::Gotcha => "gotcha",
            MemoryType::Fact => "fact",
            MemoryType::Learned => "learned",
        }
    }

    /// All valid type names, for validation messages
    pub const ALL: &'static [&'static str] = &["preference", "pattern", "gotcha", "fact", "learned"];
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preference" => Ok(MemoryType::Preference),
            "pattern" => Ok(MemoryType::Pattern),
            "gotcha" => Ok(MemoryType::Gotcha),
            "fact" => Ok(MemoryType::Fact),
            "learned" => Ok(MemoryType::Learned),
            _ => Err(format!("Unknown memory type: {}", s)),
        }
    }
}

/// Origin of a memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorySource {
    #[default]
    User,
    Compaction,
    Auto,
}

impl MemorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemorySource::User => "user",
            MemorySource::Compaction => "compaction",
            MemorySource::Auto => "auto",
        }
    }
}

impl std::fmt::Display for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemorySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MemorySource::User),
            "compaction" => Ok(MemorySource::Compaction),
            "auto" => Ok(MemorySource::Auto),
            _ => Err(format!("Unknown memory source: {}", s)),
        }
    }
}

/// A persisted segment of a session, arranged in a tree via `parent_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier (`ch_` + 12 base62 chars)
    pub id: String,
    /// External identifier grouping chunks of one conversation
    pub session_id: String,
    /// Summary chunk this one was compacted under, if any
    pub parent_id: Option<String>,
    /// Height above leaves; leaves are 0
    pub depth: i64,
    /// Ids this summary aggregates; None for leaves
    pub child_refs: Option<Vec<String>>,
    /// Message envelope
    pub content: ChunkContent,
    /// Set for compaction summaries
    pub summary: Option<String>,
    pub status: ChunkStatus,
    pub created_at: i64,
    pub finalized_at: Option<i64>,
    pub compacted_at: Option<i64>,
    /// Reserved for vector search
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<u8>>,
}

/// Chunk lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    #[default]
    Active,
    Compacted,
    /// Reserved; nothing transitions into this state yet
    Archived,
}

impl ChunkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStatus::Active => "active",
            ChunkStatus::Compacted => "compacted",
            ChunkStatus::Archived => "archived",
        }
    }
}

impl std::fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChunkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ChunkStatus::Active),
            "compacted" => Ok(ChunkStatus::Compacted),
            "archived" => Ok(ChunkStatus::Archived),
            _ => Err(format!("Unknown chunk status: {}", s)),
        }
    }
}

/// The JSON envelope stored in a chunk's `content` column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkContent {
    #[serde(default)]
    pub messages: Vec<ChunkMessage>,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

/// Metadata derived from a chunk's messages at finalization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools_used: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_modified: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

/// A conversation message embedded in chunk content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMessage {
    pub id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
    pub timestamp: i64,
}

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// One piece of a message
///
/// Serialized as `{"type": "...", ...}` so the persisted JSON stays readable
/// and FTS-indexable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessagePart {
    Text {
        text: String,
    },
    Tool {
        tool: String,
        input: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    File {
        text: String,
    },
    Reasoning {
        text: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_type_roundtrip() {
        for name in MemoryType::ALL {
            let parsed: MemoryType = name.parse().unwrap();
            assert_eq!(parsed.as_str(), *name);
        }
        assert!("note".parse::<MemoryType>().is_err());
    }

    #[test]
    fn test_part_json_shape() {
        let part = MessagePart::Tool {
            tool: "bash".to_string(),
            input: serde_json::json!({"command": "ls"}),
            output: None,
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "tool");
        assert_eq!(json["tool"], "bash");
        assert!(json.get("output").is_none());

        let text = MessagePart::Text {
            text: "hello".to_string(),
        };
        let json = serde_json::to_value(&text).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "hello");
    }

    #[test]
    fn test_chunk_content_roundtrip() {
        let content = ChunkContent {
            messages: vec![ChunkMessage {
                id: "m1".to_string(),
                role: MessageRole::User,
                parts: vec![MessagePart::Text {
                    text: "Hello".to_string(),
                }],
                timestamp: 1_700_000_000,
            }],
            metadata: ChunkMetadata {
                tools_used: Some(vec!["bash".to_string()]),
                files_modified: None,
                outcome: None,
            },
        };
        let json = serde_json::to_string(&content).unwrap();
        let back: ChunkContent = serde_json::from_str(&json).unwrap();
        assert_eq!(content, back);
        assert!(!json.contains("files_modified"));
    }

    #[test]
    fn test_empty_metadata_serializes_empty() {
        let metadata = ChunkMetadata::default();
        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(json, "{}");
    }
}
