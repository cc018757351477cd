//! Persona research and avatar generation.
//!
//! Both run during onboarding, before a session starts. Research uses a
//! search-grounded completion to draft biographical grounding text; the
//! model signals an empty result with a literal sentinel, which degrades to
//! a fallback bio flagged for manual review rather than an error.

use crate::gemini::{Backend, Completion, CompletionRequest, ContentPart, GroundingSource};
use crate::logging;
use crate::models::{Attachment, PersonaOrigin, PersonaProfile};

/// Literal the research prompt instructs the model to emit when it finds
/// nothing substantive about the person.
pub const NO_BIO_SENTINEL: &str = "NO_BIO_FOUND";

/// Grounding text used when research comes back empty or fails outright.
pub const FALLBACK_BIO: &str =
    "A private individual with little public footprint. The simulation leans on \
     ingested context and the conversation itself for grounding.";

const RESEARCH_TEMPERATURE: f32 = 0.3;
const AVATAR_ASPECT_RATIO: &str = "1:1";

/// Outcome of a research pass. `needs_review` is a soft warning asking the
/// caller for manual correction; it is never an error.
#[derive(Debug, Clone)]
pub struct PersonaResearch {
    pub bio: String,
    pub sources: Vec<GroundingSource>,
    pub needs_review: bool,
}

fn build_research_prompt(name: &str) -> String {
    format!(
        r#"Research the person named "{}" using web search. Write a grounded, third-person biographical sketch of them in 4-6 sentences: who they are, what they do, how they think and communicate. Plain prose, no headings or bullet points.

If you cannot find substantive information about this specific person, reply with exactly {} and nothing else."#,
        name, NO_BIO_SENTINEL
    )
}

/// Runs one search-grounded completion to draft the persona's bio. Never
/// fails: transport errors and the empty-result sentinel both degrade to
/// the fallback bio with `needs_review` set.
pub async fn research_persona(backend: &impl Backend, name: &str) -> PersonaResearch {
    let request = CompletionRequest {
        system_instruction: None,
        parts: vec![ContentPart::text(build_research_prompt(name))],
        temperature: RESEARCH_TEMPERATURE,
    };

    match backend.complete(request).await {
        Ok(completion) => research_outcome(completion),
        Err(e) => {
            logging::log_error(None, &format!("Persona research failed for {}: {}", name, e));
            PersonaResearch {
                bio: FALLBACK_BIO.to_string(),
                sources: Vec::new(),
                needs_review: true,
            }
        }
    }
}

fn research_outcome(completion: Completion) -> PersonaResearch {
    let text = completion.text.trim();
    if text.is_empty() || text.contains(NO_BIO_SENTINEL) {
        PersonaResearch {
            bio: FALLBACK_BIO.to_string(),
            sources: completion.sources,
            needs_review: true,
        }
    } else {
        PersonaResearch {
            bio: text.to_string(),
            sources: completion.sources,
            needs_review: false,
        }
    }
}

/// Builds a research-derived profile. The avatar is attached separately if
/// generation succeeds.
pub fn profile_from_research(name: &str, research: &PersonaResearch) -> PersonaProfile {
    PersonaProfile {
        name: name.to_string(),
        bio: research.bio.clone(),
        reference_links: None,
        origin: PersonaOrigin::Researched,
        avatar: None,
    }
}

/// One image-generation attempt for an abstract persona portrait. Failure
/// yields `None`; a profile without an avatar is fully functional.
pub async fn generate_avatar(backend: &impl Backend, name: &str) -> Option<Attachment> {
    let prompt = format!(
        "An abstract portrait evoking the presence of {}: layered translucent \
         geometry suggesting a face, cool luminous tones, no photographic \
         likeness, no text.",
        name
    );

    match backend.render_image(&prompt, AVATAR_ASPECT_RATIO).await {
        Ok(mut image) => {
            image.name = Some("avatar".to_string());
            Some(image)
        }
        Err(e) => {
            logging::log_error(None, &format!("Avatar generation failed for {}: {}", name, e));
            None
        }
    }
}
