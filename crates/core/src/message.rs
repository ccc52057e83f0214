use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Who produced a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Human input; also marks a turn boundary for history windowing
    #[default]
    User,
    /// Model text response
    Assistant,
    /// Tool call or tool result record
    Tool,
    /// Model chain-of-thought surfaced as a separate turn
    Reasoning,
    /// Host notices (mode changes, interruptions)
    System,
}

impl Role {
    pub const VALUES: &[Role] = &[Role::User, Role::Assistant, Role::Tool, Role::Reasoning, Role::System];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::Reasoning => "reasoning",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            "reasoning" => Ok(Role::Reasoning),
            "system" => Ok(Role::System),
            _ => Err(crate::Error::Parse(format!("unknown role: {}", s))),
        }
    }
}

/// Execution state of a tool message
///
/// Transitions `InProgress -> {Completed, Failed}` exactly once per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolStatus {
    InProgress,
    Completed,
    Failed,
}

impl ToolStatus {
    /// Whether this status is terminal
    pub fn is_finished(&self) -> bool {
        matches!(self, ToolStatus::Completed | ToolStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::InProgress => "in-progress",
            ToolStatus::Completed => "completed",
            ToolStatus::Failed => "failed",
        }
    }
}

/// A skill activated during a turn, attached to the next assistant message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRef {
    /// Skill name as reported by the agent
    pub name: String,
    /// Where the skill came from (registry path, file, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl SkillRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), source: None }
    }
}

/// A search result attributed to an assistant message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSource {
    pub title: String,
    pub url: String,
}

/// One extracted (path, old, new) triple from a file-edit tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEdit {
    pub path: PathBuf,
    pub old_text: String,
    pub new_text: String,
}

/// One record in the conversation log
///
/// Created when a turn starts; `content` and `tool_status` mutate while the
/// agent streams text or executes the tool. Records are never removed
/// individually; the whole log resets on chat switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Log-unique id, assigned by the producer
    pub id: u64,
    pub role: Role,
    /// Message text; for tool messages this is the serialized argument payload
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_status: Option<ToolStatus>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub active_skills: Vec<SkillRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SearchSource>,
}

impl Message {
    fn base(id: u64, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            author: None,
            tool_name: None,
            tool_call_id: None,
            tool_status: None,
            timestamp: Utc::now(),
            attachments: Vec::new(),
            active_skills: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Create a user message
    pub fn user(id: u64, content: impl Into<String>) -> Self {
        Self::base(id, Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(id: u64, content: impl Into<String>) -> Self {
        Self::base(id, Role::Assistant, content)
    }

    /// Create a reasoning message
    pub fn reasoning(id: u64, content: impl Into<String>) -> Self {
        Self::base(id, Role::Reasoning, content)
    }

    /// Create a tool message carrying the raw argument payload as content
    pub fn tool(id: u64, tool_name: impl Into<String>, arguments: impl Into<String>) -> Self {
        let mut msg = Self::base(id, Role::Tool, arguments);
        msg.tool_name = Some(tool_name.into());
        msg.tool_status = Some(ToolStatus::InProgress);
        msg
    }

    /// Set the tool call id
    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.tool_call_id = Some(call_id.into());
        self
    }

    /// Set the tool status
    pub fn with_status(mut self, status: ToolStatus) -> Self {
        self.tool_status = Some(status);
        self
    }

    /// Set the author label
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set the timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach files persisted with the message
    pub fn with_attachments(mut self, attachments: Vec<PathBuf>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Tool name, if this is a tool message
    pub fn tool_name(&self) -> Option<&str> {
        self.tool_name.as_deref()
    }

    /// Whether the producer is still streaming or executing this message
    pub fn in_progress(&self) -> bool {
        matches!(self.tool_status, Some(ToolStatus::InProgress))
    }
}

/// Ordered, append-only collection of messages for one conversation
///
/// The host owns the log and forwards add/reset/update notifications to the
/// transcript engine; the log itself carries no subscriptions.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self { messages: Vec::new() }
    }

    /// Append one message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Drop every message (chat switch)
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    /// Find a message by producer-assigned id
    pub fn find(&self, id: u64) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Find a message by id, mutably (streaming content/status updates)
    pub fn find_mut(&mut self, id: u64) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }
}

impl From<Vec<Message>> for MessageLog {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}
