//! Brave web-search provider (web results only, no news vertical).

use std::time::Duration;

use tracing::warn;

use super::{dedupe_by_url, fetch_full_text, SearchProvider, SearchResult};
use crate::error::Result;

const BASE_URL: &str = "https://api.search.brave.com/res/v1";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(6);

pub struct BraveSearch {
    client: reqwest::blocking::Client,
    api_key: String,
    freshness: String,
    country: String,
    lang: String,
    /// Fetch each result page and attach its extracted text.
    include_full_text: bool,
    base_url: String,
}

impl BraveSearch {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_key,
            freshness: "week".into(),
            country: "us".into(),
            lang: "en".into(),
            include_full_text: true,
            base_url: BASE_URL.into(),
        }
    }

    pub fn with_locale(mut self, country: &str, lang: &str) -> Self {
        self.country = country.into();
        self.lang = lang.into();
        self
    }

    pub fn with_freshness(mut self, freshness: &str) -> Self {
        self.freshness = freshness.into();
        self
    }

    pub fn without_full_text(mut self) -> Self {
        self.include_full_text = false;
        self
    }

    fn search_web(&self, query: &str, count: usize) -> Vec<SearchResult> {
        if count == 0 {
            return Vec::new();
        }

        let count_param = count.to_string();
        let response = self
            .client
            .get(format!("{}/web/search", self.base_url))
            .header("X-Subscription-Token", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(SEARCH_TIMEOUT)
            .query(&[
                ("q", query),
                ("count", count_param.as_str()),
                ("freshness", self.freshness.as_str()),
                ("country", self.country.as_str()),
                ("lang", self.lang.as_str()),
                ("spellcheck", "1"),
                ("safesearch", "moderate"),
            ])
            .send();

        // Fail soft: the session degrades to "no results" rather than
        // aborting the turn.
        let body: serde_json::Value = match response {
            Ok(r) if r.status().is_success() => match r.json() {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "brave search returned a malformed body");
                    return Vec::new();
                }
            },
            Ok(r) => {
                warn!(status = %r.status(), "brave search request rejected");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "brave search request failed");
                return Vec::new();
            }
        };

        parse_web_results(&body)
    }
}

fn parse_web_results(body: &serde_json::Value) -> Vec<SearchResult> {
    let Some(items) = body["web"]["results"].as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| SearchResult {
            title: item["title"].as_str().unwrap_or_default().to_owned(),
            url: item["url"].as_str().unwrap_or_default().to_owned(),
            snippet: item["description"].as_str().unwrap_or_default().to_owned(),
            full_text: None,
        })
        .collect()
}

impl SearchProvider for BraveSearch {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        if self.api_key.is_empty() {
            return Err(crate::error::AppError::Search(
                "BRAVE_API_KEY is required".into(),
            ));
        }
        let items = self.search_web(query, max_results);
        let mut deduped = dedupe_by_url(items, max_results);

        if self.include_full_text {
            for result in &mut deduped {
                result.full_text = fetch_full_text(&self.client, &result.url);
            }
        }
        Ok(deduped)
    }
}
