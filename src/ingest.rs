//! Link ingestion for context nodes.
//!
//! A link node's content starts as its URL; this module asks the
//! search-grounded model for a title and short summary to replace it.
//! `fetch_context_node` is non-throwing: failure yields the fixed error
//! title with the original URL echoed as the summary.

use crate::gemini::{Backend, CompletionRequest, ContentPart};
use crate::logging;

/// Title a link node takes when its fetch fails.
pub const LINK_ERROR_TITLE: &str = "Unreachable link";

const FETCH_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPreview {
    pub title: String,
    pub summary: String,
}

impl LinkPreview {
    pub fn failed(url: &str) -> Self {
        Self {
            title: LINK_ERROR_TITLE.to_string(),
            summary: url.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.title == LINK_ERROR_TITLE
    }
}

fn build_fetch_prompt(url: &str) -> String {
    format!(
        "Look up this page with web search: {}\n\nReply with the page title on \
         the first line, prefixed with TITLE:, followed by a 2-3 sentence \
         summary of its content on the lines after.",
        url
    )
}

fn parse_preview(text: &str, url: &str) -> LinkPreview {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return LinkPreview::failed(url);
    }

    let mut lines = trimmed.lines();
    let first = lines.next().unwrap_or_default().trim();

    if let Some(title) = first.strip_prefix("TITLE:") {
        let title = title.trim();
        let summary = lines.collect::<Vec<_>>().join("\n").trim().to_string();
        LinkPreview {
            title: if title.is_empty() { url.to_string() } else { title.to_string() },
            summary: if summary.is_empty() { url.to_string() } else { summary },
        }
    } else {
        // No recognizable title line; keep the whole reply as the summary.
        LinkPreview {
            title: url.to_string(),
            summary: trimmed.to_string(),
        }
    }
}

/// Fetches a title and summary for a URL via one search-grounded
/// completion. Never fails; see [`LinkPreview::failed`].
pub async fn fetch_context_node(backend: &impl Backend, url: &str) -> LinkPreview {
    logging::log_ingest(None, &format!("Fetching link context: {}", url));

    let request = CompletionRequest {
        system_instruction: None,
        parts: vec![ContentPart::text(build_fetch_prompt(url))],
        temperature: FETCH_TEMPERATURE,
    };

    match backend.complete(request).await {
        Ok(completion) => {
            let preview = parse_preview(&completion.text, url);
            logging::log_ingest(None, &format!("Link resolved: {}", preview.title));
            preview
        }
        Err(e) => {
            logging::log_error(None, &format!("Link fetch failed for {}: {}", url, e));
            LinkPreview::failed(url)
        }
    }
}
