use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============ Conversation ============

/// Who authored a conversation turn. The Primary/Meta streams are never
/// standalone turns; they ride along on a Clone turn as `InnerStreams`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Clone,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Clone => "clone",
        }
    }
}

/// The twin's two internal reasoning streams for a single turn.
/// Holding both as plain fields guarantees exactly one of each; a failed
/// parse fills them with placeholder text rather than dropping them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerStreams {
    pub primary: String,
    pub meta: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub timestamp: String,
    pub attachments: Vec<Attachment>,
    pub streams: Option<InnerStreams>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now().to_rfc3339(),
            attachments,
            streams: None,
        }
    }

    /// Build the twin's side of an exchange from a resolved response.
    pub fn clone_reply(response: &CloneResponse) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Clone,
            text: response.final_response.clone(),
            timestamp: Utc::now().to_rfc3339(),
            attachments: response.sketch_image.clone().into_iter().collect(),
            streams: Some(InnerStreams {
                primary: response.primary_thought.clone(),
                meta: response.meta_thought.clone(),
            }),
        }
    }
}

// ============ Attachments ============

/// A binary payload carried by a single turn (image, document, audio clip).
/// Data is stored base64-encoded, ready for the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub mime_type: String,
    pub data: String,
    pub name: Option<String>,
}

impl Attachment {
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8], name: Option<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: BASE64_STANDARD.encode(bytes),
            name,
        }
    }
}

// ============ Persona ============

/// How the persona's grounding text came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersonaOrigin {
    Manual,
    Researched,
}

/// The identity being simulated. Immutable once a session starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaProfile {
    pub name: String,
    pub bio: String,
    pub reference_links: Option<String>,
    pub origin: PersonaOrigin,
    pub avatar: Option<Attachment>,
}

impl PersonaProfile {
    pub fn manual(name: impl Into<String>, bio: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bio: bio.into(),
            reference_links: None,
            origin: PersonaOrigin::Manual,
            avatar: None,
        }
    }
}

// ============ Context Nodes ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Link,
    File,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Idle,
    Fetching,
    Ready,
    Error,
}

/// A discrete piece of injected grounding knowledge. Link nodes resolve
/// asynchronously; file and text nodes are usable immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextNode {
    pub id: String,
    pub kind: NodeKind,
    pub title: String,
    pub content: String,
    pub mime_type: Option<String>,
    pub status: NodeStatus,
    pub created_at: String,
}

impl ContextNode {
    pub fn text(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: NodeKind::Text,
            title: title.into(),
            content: content.into(),
            mime_type: None,
            status: NodeStatus::Ready,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn file(title: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: NodeKind::File,
            title: title.into(),
            content: BASE64_STANDARD.encode(bytes),
            mime_type: Some(mime_type.into()),
            status: NodeStatus::Ready,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// A link node starts in `Fetching`; the ingestion flow later flips it
    /// to `Ready` or `Error` by id.
    pub fn link(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: Uuid::new_v4().to_string(),
            kind: NodeKind::Link,
            title: url.clone(),
            content: url,
            mime_type: None,
            status: NodeStatus::Fetching,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

// ============ Turn Result ============

/// What one resolved turn hands back to the caller. A fresh value object
/// per turn; carries no identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneResponse {
    pub primary_thought: String,
    pub meta_thought: String,
    pub final_response: String,
    pub sketch_image: Option<Attachment>,
}

/// Placeholder triple returned when the completion call fails outright.
/// The wording signals degraded cognition to the user; the conversation
/// itself never hard-fails on a single turn.
pub const DEGRADED_PRIMARY: &str = "Sync Loss.";
pub const DEGRADED_META: &str = "Perception Drift.";
pub const DEGRADED_RESPONSE: &str =
    "I... lost the thread for a moment there. Some dissonance in the link. Could you say that again?";

impl CloneResponse {
    /// Fail-soft result used when the gateway cannot produce a completion.
    pub fn degraded() -> Self {
        Self {
            primary_thought: DEGRADED_PRIMARY.to_string(),
            meta_thought: DEGRADED_META.to_string(),
            final_response: DEGRADED_RESPONSE.to_string(),
            sketch_image: None,
        }
    }
}
