//! Web search: provider seam, result formatting and page-text extraction.

pub mod brave;
pub mod ddg;

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Characters of article text included per result.
const ARTICLE_CLAMP: usize = 1000;

const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Extracted page text, when fetching it succeeded.
    pub full_text: Option<String>,
}

/// Ranked web search. Providers fail soft: an unreachable backend yields an
/// empty result list, not an error.
pub trait SearchProvider: Send {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

/// Drop results whose URL was already seen, capping the total.
pub fn dedupe_by_url(results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for result in results {
        if result.url.is_empty() || !seen.insert(result.url.clone()) {
            continue;
        }
        out.push(result);
        if out.len() >= limit {
            break;
        }
    }
    out
}

/// Render results as the plain-text digest handed to the assistant:
/// title and URL, then up to [`ARTICLE_CLAMP`] characters of article text
/// (falling back to the snippet).
pub fn format_results(results: &[SearchResult]) -> String {
    let mut formatted = String::new();
    for result in results {
        let body = result
            .full_text
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&result.snippet);
        let clamped: String = body.chars().take(ARTICLE_CLAMP).collect();
        formatted.push_str(&format!("{} - {}\n", result.title, result.url));
        formatted.push_str(&format!("Article:\n{clamped}\n\n"));
    }
    formatted
}

/// Fetch a result page and extract its readable text. Any failure (network,
/// status, parsing) yields `None`; a missing article never fails a search.
pub fn fetch_full_text(client: &reqwest::blocking::Client, url: &str) -> Option<String> {
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
        .timeout(FETCH_TIMEOUT)
        .send()
        .ok()?;
    if !response.status().is_success() {
        debug!(url, status = %response.status(), "page fetch failed");
        return None;
    }
    let html = response.text().ok()?;
    let text = extract_text(&html);
    (!text.is_empty()).then_some(text)
}

/// Readable text of an HTML page: paragraph contents, joined.
fn extract_text(html: &str) -> String {
    let Ok(selector) = scraper::Selector::parse("p") else {
        return String::new();
    };
    let document = scraper::Html::parse_document(html);

    let mut paragraphs = Vec::new();
    for element in document.select(&selector) {
        let text: String = element.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !text.is_empty() {
            paragraphs.push(text);
        }
    }
    paragraphs.join("\n")
}
