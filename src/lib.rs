//! Duet: the orchestration core of a digital-twin chat application.
//!
//! A [`Session`] owns one persona plus all mutable conversation state and
//! drives the turn pipeline: aggregate context, build the duet-protocol
//! prompt, call the completion gateway, parse the delimited reply, and
//! conditionally render a sketch. Every public entry point resolves to a
//! structurally valid result; failures degrade into fixed fallback values
//! instead of crossing the boundary.

pub mod gemini;
pub mod ingest;
pub mod logging;
pub mod models;
pub mod parser;
pub mod persona;
pub mod prompt;
pub mod sketch;

use uuid::Uuid;

use gemini::{Backend, CompletionRequest, GeminiClient};
use models::{
    Attachment, CloneResponse, ContextNode, ConversationTurn, NodeKind, NodeStatus, PersonaProfile,
};

pub use gemini::{Completion, ContentPart, GroundingSource};
pub use ingest::LinkPreview;
pub use models::{InnerStreams, NodeKind as ContextNodeKind, Role};
pub use persona::PersonaResearch;

pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

/// One-time process setup: create the log directory and prune files older
/// than the retention window.
pub fn init() -> Result<(), String> {
    logging::init_logging().map_err(|e| e.to_string())?;
    let _ = logging::cleanup_old_logs();
    Ok(())
}

// ============ Configuration ============

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub api_key: String,
    pub chat_model: String,
    pub image_model: String,
}

impl SessionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    /// Reads the API key from `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self, String> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| "GEMINI_API_KEY is not set".to_string())?;
        Ok(Self::new(api_key))
    }
}

// ============ Session ============

/// Where the turn pipeline currently is. New submissions are only accepted
/// in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingCompletion,
    AwaitingSketch,
}

/// One live simulation: a persona, its conversation history, and its
/// context nodes, mutated only by this controller. State is
/// process-lifetime; nothing persists.
pub struct Session<B: Backend = GeminiClient> {
    id: String,
    backend: B,
    persona: PersonaProfile,
    history: Vec<ConversationTurn>,
    nodes: Vec<ContextNode>,
    state: TurnState,
}

impl Session<GeminiClient> {
    pub fn new(config: &SessionConfig, persona: PersonaProfile) -> Self {
        Self::with_backend(GeminiClient::new(config), persona)
    }
}

impl<B: Backend> Session<B> {
    pub fn with_backend(backend: B, persona: PersonaProfile) -> Self {
        let id = Uuid::new_v4().to_string();
        logging::log_turn(Some(&id), &format!("Session opened for persona {}", persona.name));
        Self {
            id,
            backend,
            persona,
            history: Vec::new(),
            nodes: Vec::new(),
            state: TurnState::Idle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn persona(&self) -> &PersonaProfile {
        &self.persona
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn nodes(&self) -> &[ContextNode] {
        &self.nodes
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    // ============ Turn Pipeline ============

    /// Runs one full turn. Refused with `Err` only when a prior turn is
    /// still in flight; once dispatched it always resolves `Ok`, with the
    /// degraded fallback response if the completion call fails. History is
    /// appended only after the turn fully resolves.
    pub async fn send_turn(
        &mut self,
        user_text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<CloneResponse, String> {
        if self.state != TurnState::Idle {
            return Err("A turn is already in flight; wait for it to resolve".to_string());
        }

        logging::log_turn(
            Some(&self.id),
            &format!(
                "Dispatching turn ({} chars, {} attachments, {} nodes)",
                user_text.len(),
                attachments.len(),
                self.nodes.len()
            ),
        );
        self.state = TurnState::AwaitingCompletion;

        let payload =
            prompt::aggregate(&self.history, user_text, &self.persona, &attachments, &self.nodes);
        let request = CompletionRequest {
            system_instruction: Some(prompt::build_system_instruction(&payload)),
            parts: prompt::build_user_parts(&payload),
            temperature: gemini::CHAT_TEMPERATURE,
        };

        let response = match self.backend.complete(request).await {
            Ok(completion) => {
                if !completion.sources.is_empty() {
                    logging::log_gateway(
                        Some(&self.id),
                        &format!("Completion grounded by {} sources", completion.sources.len()),
                    );
                }
                let parsed = parser::parse(&completion.text);
                let sketch_image = match parsed.sketch_directive.as_deref() {
                    Some(directive) => {
                        self.state = TurnState::AwaitingSketch;
                        sketch::render_sketch(
                            &self.backend,
                            directive,
                            &self.persona.name,
                            Some(&self.id),
                        )
                        .await
                    }
                    None => None,
                };
                CloneResponse {
                    primary_thought: parsed.primary_thought,
                    meta_thought: parsed.meta_thought,
                    final_response: parsed.final_response,
                    sketch_image,
                }
            }
            Err(e) => {
                logging::log_error(Some(&self.id), &format!("Completion failed, degrading turn: {}", e));
                CloneResponse::degraded()
            }
        };

        self.history.push(ConversationTurn::user(user_text, attachments));
        self.history.push(ConversationTurn::clone_reply(&response));
        self.state = TurnState::Idle;
        logging::log_turn(Some(&self.id), "Turn resolved");

        Ok(response)
    }

    // ============ Context Nodes ============

    /// Adds a raw-text node; usable immediately. Returns its id.
    pub fn add_text_node(&mut self, title: &str, content: &str) -> String {
        let node = ContextNode::text(title, content);
        let id = node.id.clone();
        logging::log_ingest(Some(&self.id), &format!("Text node added: {}", title));
        self.nodes.push(node);
        id
    }

    /// Adds a file node; usable immediately. Returns its id.
    pub fn add_file_node(&mut self, title: &str, mime_type: &str, bytes: &[u8]) -> String {
        let node = ContextNode::file(title, mime_type, bytes);
        let id = node.id.clone();
        logging::log_ingest(Some(&self.id), &format!("File node added: {} ({})", title, mime_type));
        self.nodes.push(node);
        id
    }

    /// Adds a link node in `Fetching` status and returns its id. Call
    /// [`Session::resolve_link`] to complete it.
    pub fn add_link_node(&mut self, url: &str) -> String {
        let node = ContextNode::link(url);
        let id = node.id.clone();
        logging::log_ingest(Some(&self.id), &format!("Link node added: {}", url));
        self.nodes.push(node);
        id
    }

    /// Resolves a fetching link node to `Ready` (content replaced by the
    /// fetched summary) or `Error` (title replaced by the failure marker,
    /// content echoing the URL). Mutates only the node with the given id.
    /// Returns false when no fetching link node matches.
    pub async fn resolve_link(&mut self, node_id: &str) -> bool {
        let url = match self
            .nodes
            .iter()
            .find(|n| n.id == node_id && n.kind == NodeKind::Link && n.status == NodeStatus::Fetching)
        {
            Some(node) => node.content.clone(),
            None => return false,
        };

        let preview = ingest::fetch_context_node(&self.backend, &url).await;

        let Some(node) = self.nodes.iter_mut().find(|n| n.id == node_id) else {
            // Removed while the fetch was in flight.
            return false;
        };
        node.title = preview.title.clone();
        node.content = preview.summary.clone();
        node.status = if preview.is_failure() {
            NodeStatus::Error
        } else {
            NodeStatus::Ready
        };
        true
    }

    /// Adds and resolves a link node in one call. Returns its id.
    pub async fn ingest_link(&mut self, url: &str) -> String {
        let id = self.add_link_node(url);
        self.resolve_link(&id).await;
        id
    }

    /// Removes a node by id. Returns whether anything was removed.
    pub fn remove_node(&mut self, node_id: &str) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.id != node_id);
        let removed = self.nodes.len() < before;
        if removed {
            logging::log_ingest(Some(&self.id), &format!("Node removed: {}", node_id));
        }
        removed
    }
}
