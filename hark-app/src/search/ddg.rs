//! DuckDuckGo web-search provider. No API key: results come from the HTML
//! endpoint and are parsed out of the result list markup.

use std::time::Duration;

use scraper::{Html, Selector};
use tracing::warn;

use super::{dedupe_by_url, fetch_full_text, SearchProvider, SearchResult};
use crate::error::Result;

const HTML_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(6);

pub struct DuckDuckGoSearch {
    client: reqwest::blocking::Client,
    /// Region hint, e.g. `us-en`.
    region: String,
    /// Fetch each result page and attach its extracted text.
    include_full_text: bool,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            region: "us-en".into(),
            include_full_text: true,
            endpoint: HTML_ENDPOINT.into(),
        }
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.into();
        self
    }

    pub fn without_full_text(mut self) -> Self {
        self.include_full_text = false;
        self
    }

    fn fetch_page(&self, query: &str) -> Option<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
            .timeout(SEARCH_TIMEOUT)
            .query(&[("q", query), ("kl", self.region.as_str())])
            .send();

        // Fail soft, like every provider: the session degrades to "no
        // results" rather than aborting the turn.
        match response {
            Ok(r) if r.status().is_success() => r.text().ok(),
            Ok(r) => {
                warn!(status = %r.status(), "duckduckgo search request rejected");
                None
            }
            Err(e) => {
                warn!(error = %e, "duckduckgo search request failed");
                None
            }
        }
    }
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull title/link/snippet triples out of the result-list markup.
fn parse_results(html: &str) -> Vec<SearchResult> {
    let (Ok(result_sel), Ok(title_sel), Ok(snippet_sel)) = (
        Selector::parse("div.result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut results = Vec::new();
    for item in document.select(&result_sel) {
        let Some(anchor) = item.select(&title_sel).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let title: String = anchor.text().collect::<Vec<_>>().join("");
        let snippet = item
            .select(&snippet_sel)
            .next()
            .map(|s| s.text().collect::<Vec<_>>().join(""))
            .unwrap_or_default();

        results.push(SearchResult {
            title: title.trim().to_owned(),
            url: resolve_link(href),
            snippet: snippet.trim().to_owned(),
            full_text: None,
        });
    }
    results
}

/// Result links are redirects (`/l/?uddg=<encoded target>`); unwrap them to
/// the target URL so dedupe and page fetches see the real destination.
fn resolve_link(href: &str) -> String {
    let Ok(base) = reqwest::Url::parse("https://duckduckgo.com/") else {
        return href.to_owned();
    };
    let Ok(url) = base.join(href) else {
        return href.to_owned();
    };
    if url.path() == "/l/" {
        if let Some((_, target)) = url.query_pairs().find(|(key, _)| key == "uddg") {
            return target.into_owned();
        }
    }
    url.to_string()
}

impl SearchProvider for DuckDuckGoSearch {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let Some(html) = self.fetch_page(query) else {
            return Ok(Vec::new());
        };
        let mut deduped = dedupe_by_url(parse_results(&html), max_results);

        if self.include_full_text {
            for result in &mut deduped {
                result.full_text = fetch_full_text(&self.client, &result.url);
            }
        }
        Ok(deduped)
    }
}
