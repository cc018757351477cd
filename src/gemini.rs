//! Typed client for the Gemini `generateContent` API.
//!
//! Covers the two calls the core makes: search-grounded text completion and
//! image generation. Responses are decoded into explicit structs at this
//! boundary; callers never see raw JSON.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::time::Duration;

use crate::models::Attachment;
use crate::SessionConfig;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Fixed temperature for chat turns, favoring creative variation.
pub const CHAT_TEMPERATURE: f32 = 0.9;

// ============ Gateway Contract ============

/// One completion request: optional system instruction, ordered content
/// parts (text first, then inline attachments), and a temperature.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_instruction: Option<String>,
    pub parts: Vec<ContentPart>,
    pub temperature: f32,
}

/// A web citation attached to a search-grounded completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

/// A decoded completion: the top candidate's text plus its deduplicated
/// grounding citations.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

/// The completion service as the rest of the crate sees it. `GeminiClient`
/// is the real implementation; tests substitute stubs.
#[async_trait]
pub trait Backend: Send + Sync {
    /// One text completion attempt. No retries; the caller decides how to
    /// degrade on failure.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<Completion, Box<dyn Error + Send + Sync>>;

    /// One image-generation attempt, returning the first inline image of
    /// the first candidate.
    async fn render_image(
        &self,
        prompt: &str,
        aspect_ratio: &str,
    ) -> Result<Attachment, Box<dyn Error + Send + Sync>>;
}

// ============ Client ============

pub struct GeminiClient {
    client: Client,
    api_key: String,
    chat_model: String,
    image_model: String,
}

impl GeminiClient {
    pub fn new(config: &SessionConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key: config.api_key.clone(),
            chat_model: config.chat_model.clone(),
            image_model: config.image_model.clone(),
        }
    }

    async fn generate(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, Box<dyn Error + Send + Sync>> {
        let url = format!("{}/{}:generateContent?key={}", GEMINI_API_BASE, model, self.api_key);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(format!("Gemini API error ({}): {}", status, error_text).into());
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Backend for GeminiClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<Completion, Box<dyn Error + Send + Sync>> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: request.parts,
            }],
            system_instruction: request.system_instruction.map(|text| Content {
                role: "user".to_string(),
                parts: vec![ContentPart::text(text)],
            }),
            generation_config: Some(GenerationConfig {
                temperature: Some(request.temperature),
                response_modalities: None,
                image_config: None,
            }),
            tools: Some(vec![Tool::default()]),
        };

        let response = self.generate(&self.chat_model, &body).await?;

        let candidate = response
            .candidates
            .first()
            .ok_or("Gemini returned an empty candidate list")?;
        let text = candidate_text(candidate).ok_or("Gemini candidate contained no text")?;
        let sources = extract_sources(&response);

        Ok(Completion { text, sources })
    }

    async fn render_image(
        &self,
        prompt: &str,
        aspect_ratio: &str,
    ) -> Result<Attachment, Box<dyn Error + Send + Sync>> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![ContentPart::text(prompt)],
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                temperature: None,
                response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
                image_config: Some(ImageConfig {
                    aspect_ratio: aspect_ratio.to_string(),
                }),
            }),
            tools: None,
        };

        let response = self.generate(&self.image_model, &body).await?;

        first_inline_image(&response).ok_or_else(|| "Gemini returned no inline image".into())
    }
}

// ============ Decode Helpers ============

/// Concatenated text of one candidate's parts, or None if it carries no text.
fn candidate_text(candidate: &Candidate) -> Option<String> {
    let content = candidate.content.as_ref()?;
    let mut text = String::new();
    for part in &content.parts {
        if let Some(t) = &part.text {
            text.push_str(t);
        }
    }
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// All web grounding citations across candidates, deduplicated by uri.
/// The first-seen title wins.
fn extract_sources(response: &GenerateContentResponse) -> Vec<GroundingSource> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();

    for candidate in &response.candidates {
        let Some(metadata) = &candidate.grounding_metadata else {
            continue;
        };
        for chunk in &metadata.grounding_chunks {
            let Some(web) = &chunk.web else {
                continue;
            };
            let Some(uri) = &web.uri else {
                continue;
            };
            if !seen.insert(uri.clone()) {
                continue;
            }
            sources.push(GroundingSource {
                title: web.title.clone().unwrap_or_else(|| uri.clone()),
                uri: uri.clone(),
            });
        }
    }

    sources
}

fn first_inline_image(response: &GenerateContentResponse) -> Option<Attachment> {
    let candidate = response.candidates.first()?;
    let content = candidate.content.as_ref()?;
    content.parts.iter().find_map(|part| {
        part.inline_data.as_ref().map(|inline| Attachment {
            mime_type: inline.mime_type.clone(),
            data: inline.data.clone(),
            name: None,
        })
    })
}

// ============ Wire Types ============

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    role: String,
    parts: Vec<ContentPart>,
}

/// An ordered content part of the user turn: plain text or an inline
/// base64 payload.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn from_attachment(attachment: &Attachment) -> Self {
        ContentPart::InlineData {
            inline_data: InlineData {
                mime_type: attachment.mime_type.clone(),
                data: attachment.data.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "responseModalities", skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(rename = "imageConfig", skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
}

#[derive(Debug, Clone, Serialize, Default)]
struct Tool {
    google_search: GoogleSearchConfig,
}

#[derive(Debug, Clone, Serialize, Default)]
struct GoogleSearchConfig {}

#[derive(Debug, Clone, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidatePart {
    text: Option<String>,
    #[serde(rename = "inlineData")]
    inline_data: Option<InlineDataPayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataPayload {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Deserialize)]
struct GroundingChunk {
    web: Option<WebSource>,
}

#[derive(Debug, Clone, Deserialize)]
struct WebSource {
    uri: Option<String>,
    title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_candidate_text_concatenates_parts() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": "Hello "}, {"text": "there."}]
                }
            }]
        });
        let response: GenerateContentResponse = serde_json::from_value(raw).unwrap();

        let text = candidate_text(&response.candidates[0]).unwrap();
        assert_eq!(text, "Hello there.");
    }

    #[test]
    fn test_candidate_without_text_yields_none() {
        let raw = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "   "}]}
            }]
        });
        let response: GenerateContentResponse = serde_json::from_value(raw).unwrap();

        assert!(candidate_text(&response.candidates[0]).is_none());
    }

    #[test]
    fn test_empty_candidate_list_decodes() {
        let response: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.candidates.is_empty());
    }

    #[test]
    fn test_sources_deduplicate_by_uri_keeping_first_title() {
        let raw = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "grounded"}]},
                "groundingMetadata": {
                    "groundingChunks": [
                        {"web": {"uri": "https://a.example", "title": "First Title"}},
                        {"web": {"uri": "https://b.example", "title": "Other"}},
                        {"web": {"uri": "https://a.example", "title": "Second Title"}}
                    ]
                }
            }]
        });
        let response: GenerateContentResponse = serde_json::from_value(raw).unwrap();

        let sources = extract_sources(&response);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].uri, "https://a.example");
        assert_eq!(sources[0].title, "First Title");
        assert_eq!(sources[1].uri, "https://b.example");
    }

    #[test]
    fn test_source_without_title_falls_back_to_uri() {
        let raw = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "grounded"}]},
                "groundingMetadata": {
                    "groundingChunks": [{"web": {"uri": "https://bare.example"}}]
                }
            }]
        });
        let response: GenerateContentResponse = serde_json::from_value(raw).unwrap();

        let sources = extract_sources(&response);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].title, "https://bare.example");
    }

    #[test]
    fn test_first_inline_image_extraction() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Here is your sketch."},
                        {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}}
                    ]
                }
            }]
        });
        let response: GenerateContentResponse = serde_json::from_value(raw).unwrap();

        let image = first_inline_image(&response).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "aGVsbG8=");
    }

    #[test]
    fn test_no_inline_image_yields_none() {
        let raw = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "words only"}]}
            }]
        });
        let response: GenerateContentResponse = serde_json::from_value(raw).unwrap();

        assert!(first_inline_image(&response).is_none());
    }

    #[test]
    fn test_request_serializes_to_gemini_shape() {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    ContentPart::text("hi"),
                    ContentPart::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg".to_string(),
                            data: "YWJj".to_string(),
                        },
                    },
                ],
            }],
            system_instruction: Some(Content {
                role: "user".to_string(),
                parts: vec![ContentPart::text("be yourself")],
            }),
            generation_config: Some(GenerationConfig {
                temperature: Some(CHAT_TEMPERATURE),
                response_modalities: None,
                image_config: None,
            }),
            tools: Some(vec![Tool::default()]),
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(
            value["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/jpeg"
        );
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "be yourself");
        assert_eq!(value["tools"][0]["google_search"], json!({}));
    }

    #[test]
    fn test_image_config_serializes_camel_case() {
        let config = GenerationConfig {
            temperature: None,
            response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
            image_config: Some(ImageConfig {
                aspect_ratio: "1:1".to_string(),
            }),
        };

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["responseModalities"][0], "TEXT");
        assert_eq!(value["imageConfig"]["aspectRatio"], "1:1");
    }
}
