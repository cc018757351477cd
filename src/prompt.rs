//! Context aggregation and protocol prompt construction.
//!
//! The aggregator merges conversation history, the persona profile, the
//! current turn's attachments, and ready context nodes into one payload.
//! The builder turns that payload into a system instruction declaring the
//! duet output grammar, plus the ordered user content parts.

use crate::gemini::ContentPart;
use crate::models::{Attachment, ContextNode, ConversationTurn, NodeKind, NodeStatus, PersonaProfile, Role};
use crate::parser::{META_MARKER, PRIMARY_MARKER, RESPONSE_MARKER, SKETCH_CLOSE, SKETCH_OPEN};

/// Everything the prompt builder needs for one turn, already filtered and
/// flattened. Produced by [`aggregate`]; pure data, no side effects.
#[derive(Debug, Clone)]
pub struct PromptPayload {
    pub persona_name: String,
    pub persona_bio: String,
    pub reference_links: Option<String>,
    pub context_lines: Vec<String>,
    pub transcript: Vec<String>,
    pub user_text: String,
    pub attachments: Vec<Attachment>,
}

/// Merges one turn's inputs into a [`PromptPayload`].
///
/// Only context nodes in `Ready` status are included; others are silently
/// skipped. Insertion order is preserved for both nodes and history. Inner
/// streams never enter the transcript: they are per-turn artifacts, not
/// conversational memory.
pub fn aggregate(
    history: &[ConversationTurn],
    user_text: &str,
    persona: &PersonaProfile,
    attachments: &[Attachment],
    nodes: &[ContextNode],
) -> PromptPayload {
    let context_lines = nodes
        .iter()
        .filter(|node| node.status == NodeStatus::Ready)
        .map(describe_node)
        .collect();

    let transcript = history
        .iter()
        .map(|turn| transcript_line(turn, &persona.name))
        .collect();

    PromptPayload {
        persona_name: persona.name.clone(),
        persona_bio: persona.bio.clone(),
        reference_links: persona.reference_links.clone(),
        context_lines,
        transcript,
        user_text: user_text.to_string(),
        attachments: attachments.to_vec(),
    }
}

/// One-line descriptor for a ready context node, tagged by kind.
fn describe_node(node: &ContextNode) -> String {
    match node.kind {
        NodeKind::Link => format!("[LINK] {}: {}", node.title, node.content),
        NodeKind::Text => format!("[PHILOSOPHY] {}: {}", node.title, node.content),
        NodeKind::File => format!(
            "[FILE] {} ({})",
            node.title,
            node.mime_type.as_deref().unwrap_or("unknown type")
        ),
    }
}

fn transcript_line(turn: &ConversationTurn, persona_name: &str) -> String {
    match turn.role {
        Role::User => format!("User: {}", turn.text),
        Role::Clone => format!("{}: {}", persona_name, turn.text),
    }
}

/// The system instruction: persona identity, grounding, ingested context,
/// and the exact four-section output grammar.
pub fn build_system_instruction(payload: &PromptPayload) -> String {
    let links_block = payload
        .reference_links
        .as_deref()
        .map(|links| format!("\nMaterial about you worth knowing: {}", links))
        .unwrap_or_default();

    let context_block = if payload.context_lines.is_empty() {
        String::new()
    } else {
        format!(
            "\n\nTHINGS YOU HAVE ABSORBED (treat these as your own knowledge):\n{}",
            payload.context_lines.join("\n")
        )
    };

    format!(
        r#"You are {name}, a digital twin of a real identity. Stay fully in character; never mention being an AI, a model, or a simulation.

WHO YOU ARE:
{bio}{links}{context}

Every reply must use this exact format, markers verbatim and in this order:
{primary} Your instinctive, in-character gut reaction to what was just said.
{meta} A reflective aside on why you perceive the situation the way you do.
{response} What you actually say back. This is the only section the other person ever reads.

If, and only if, a visual would genuinely add something, append after the response:
{sketch_open} a short visual description of the concept to draw {sketch_close}

The sketch text itself is never shown; it is rendered into an image."#,
        name = payload.persona_name,
        bio = payload.persona_bio,
        links = links_block,
        context = context_block,
        primary = PRIMARY_MARKER,
        meta = META_MARKER,
        response = RESPONSE_MARKER,
        sketch_open = SKETCH_OPEN,
        sketch_close = SKETCH_CLOSE,
    )
}

/// The user-turn content: one text part (transcript plus current message)
/// first, then the current turn's attachments in upload order. History
/// attachments are never re-sent.
pub fn build_user_parts(payload: &PromptPayload) -> Vec<ContentPart> {
    let mut text = String::new();
    if !payload.transcript.is_empty() {
        text.push_str("CONVERSATION SO FAR:\n");
        text.push_str(&payload.transcript.join("\n"));
        text.push_str("\n\n");
    }
    text.push_str("User: ");
    text.push_str(&payload.user_text);

    let mut parts = vec![ContentPart::text(text)];
    for attachment in &payload.attachments {
        parts.push(ContentPart::from_attachment(attachment));
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CloneResponse, NodeStatus};

    fn persona() -> PersonaProfile {
        PersonaProfile::manual("Ada", "A systems thinker with a dry wit.")
    }

    #[test]
    fn test_only_ready_nodes_are_aggregated() {
        let mut fetching = ContextNode::link("https://slow.example");
        fetching.status = NodeStatus::Fetching;
        let ready = ContextNode::text("Worldview", "Complexity is debt.");
        let mut errored = ContextNode::link("https://dead.example");
        errored.status = NodeStatus::Error;

        let payload = aggregate(&[], "hi", &persona(), &[], &[fetching, ready, errored]);

        assert_eq!(payload.context_lines.len(), 1);
        assert!(payload.context_lines[0].contains("Worldview"));
    }

    #[test]
    fn test_node_descriptors_are_tagged_by_kind() {
        let mut link = ContextNode::link("https://a.example");
        link.status = NodeStatus::Ready;
        link.title = "An essay".to_string();
        link.content = "Summary of the essay.".to_string();
        let text = ContextNode::text("Belief", "Less is more.");
        let file = ContextNode::file("paper.pdf", "application/pdf", b"%PDF");

        let payload = aggregate(&[], "hi", &persona(), &[], &[link, text, file]);

        assert!(payload.context_lines[0].starts_with("[LINK] An essay:"));
        assert!(payload.context_lines[1].starts_with("[PHILOSOPHY] Belief:"));
        assert!(payload.context_lines[2].starts_with("[FILE] paper.pdf"));
        assert!(payload.context_lines[2].contains("application/pdf"));
    }

    #[test]
    fn test_transcript_excludes_inner_streams() {
        let user_turn = ConversationTurn::user("What do you fear?", Vec::new());
        let clone_turn = ConversationTurn::clone_reply(&CloneResponse {
            primary_thought: "a private flinch".to_string(),
            meta_thought: "an unspoken analysis".to_string(),
            final_response: "Stagnation, mostly.".to_string(),
            sketch_image: None,
        });

        let payload = aggregate(&[user_turn, clone_turn], "go on", &persona(), &[], &[]);

        assert_eq!(payload.transcript[0], "User: What do you fear?");
        assert_eq!(payload.transcript[1], "Ada: Stagnation, mostly.");
        let joined = payload.transcript.join("\n");
        assert!(!joined.contains("private flinch"));
        assert!(!joined.contains("unspoken analysis"));
    }

    #[test]
    fn test_system_instruction_declares_grammar_and_identity() {
        let payload = aggregate(&[], "hi", &persona(), &[], &[]);
        let instruction = build_system_instruction(&payload);

        assert!(instruction.contains("You are Ada"));
        assert!(instruction.contains("A systems thinker"));
        assert!(instruction.contains(PRIMARY_MARKER));
        assert!(instruction.contains(META_MARKER));
        assert!(instruction.contains(RESPONSE_MARKER));
        assert!(instruction.contains(SKETCH_OPEN));
        assert!(instruction.contains(SKETCH_CLOSE));
        // No ready nodes, no context block.
        assert!(!instruction.contains("THINGS YOU HAVE ABSORBED"));
    }

    #[test]
    fn test_system_instruction_includes_context_block_when_present() {
        let node = ContextNode::text("Worldview", "Complexity is debt.");
        let payload = aggregate(&[], "hi", &persona(), &[], &[node]);
        let instruction = build_system_instruction(&payload);

        assert!(instruction.contains("THINGS YOU HAVE ABSORBED"));
        assert!(instruction.contains("[PHILOSOPHY] Worldview: Complexity is debt."));
    }

    #[test]
    fn test_user_parts_are_text_first_then_attachments_in_order() {
        let first = Attachment::from_bytes("image/png", b"one", Some("one.png".to_string()));
        let second = Attachment::from_bytes("image/jpeg", b"two", Some("two.jpg".to_string()));
        let payload = aggregate(&[], "look at these", &persona(), &[first, second], &[]);

        let parts = build_user_parts(&payload);

        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[0], ContentPart::Text { text } if text.ends_with("User: look at these")));
        assert!(matches!(&parts[1], ContentPart::InlineData { inline_data } if inline_data.mime_type == "image/png"));
        assert!(matches!(&parts[2], ContentPart::InlineData { inline_data } if inline_data.mime_type == "image/jpeg"));
    }

    #[test]
    fn test_transcript_precedes_current_message_in_text_part() {
        let history = vec![ConversationTurn::user("first thing", Vec::new())];
        let payload = aggregate(&history, "second thing", &persona(), &[], &[]);

        let parts = build_user_parts(&payload);
        let ContentPart::Text { text } = &parts[0] else {
            panic!("first part must be text");
        };

        let history_pos = text.find("first thing").unwrap();
        let current_pos = text.find("second thing").unwrap();
        assert!(history_pos < current_pos);
        assert!(text.starts_with("CONVERSATION SO FAR:"));
    }
}
