//! Sketch sub-pipeline: turns a parsed sketch directive into an image.
//!
//! This augmentation is strictly optional. Any failure is logged and
//! swallowed; the turn that requested the sketch still resolves normally.

use crate::gemini::Backend;
use crate::logging;
use crate::models::Attachment;

pub const SKETCH_ASPECT_RATIO: &str = "1:1";

fn build_sketch_prompt(directive: &str, persona_name: &str) -> String {
    format!(
        "An abstract conceptual sketch in a minimal blueprint style: {}. \
         Loose construction lines over a dark slate background, luminous strokes, \
         the visual handwriting of {}'s inner world. No text or lettering.",
        directive, persona_name
    )
}

/// Renders a sketch directive into an image attachment. Returns `None` on
/// any failure; the caller treats absence as a normal outcome.
pub async fn render_sketch(
    backend: &impl Backend,
    directive: &str,
    persona_name: &str,
    session_id: Option<&str>,
) -> Option<Attachment> {
    logging::log_sketch(
        session_id,
        &format!("Rendering sketch directive ({} chars)", directive.len()),
    );

    let prompt = build_sketch_prompt(directive, persona_name);
    match backend.render_image(&prompt, SKETCH_ASPECT_RATIO).await {
        Ok(mut image) => {
            image.name = Some("sketch".to_string());
            logging::log_sketch(session_id, &format!("Sketch rendered ({})", image.mime_type));
            Some(image)
        }
        Err(e) => {
            logging::log_error(session_id, &format!("Sketch generation failed: {}", e));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{Completion, CompletionRequest};
    use async_trait::async_trait;
    use std::error::Error;

    struct FixedImageBackend {
        fail: bool,
    }

    #[async_trait]
    impl Backend for FixedImageBackend {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<Completion, Box<dyn Error + Send + Sync>> {
            Err("not used".into())
        }

        async fn render_image(
            &self,
            _prompt: &str,
            _aspect_ratio: &str,
        ) -> Result<Attachment, Box<dyn Error + Send + Sync>> {
            if self.fail {
                return Err("image model unavailable".into());
            }
            Ok(Attachment {
                mime_type: "image/png".to_string(),
                data: "aW1n".to_string(),
                name: None,
            })
        }
    }

    #[test]
    fn test_sketch_prompt_embeds_directive_and_persona() {
        let prompt = build_sketch_prompt("a bridge between two minds", "Ada");

        assert!(prompt.contains("a bridge between two minds"));
        assert!(prompt.contains("Ada"));
        assert!(prompt.contains("blueprint"));
    }

    #[tokio::test]
    async fn test_successful_render_names_the_attachment() {
        let backend = FixedImageBackend { fail: false };

        let image = render_sketch(&backend, "a spiral", "Ada", None).await;

        let image = image.expect("sketch should render");
        assert_eq!(image.name.as_deref(), Some("sketch"));
        assert_eq!(image.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_failure_yields_absent_sketch() {
        let backend = FixedImageBackend { fail: true };

        assert!(render_sketch(&backend, "a spiral", "Ada", None).await.is_none());
    }
}
