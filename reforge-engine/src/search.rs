//! # Web Search Collaborator
//!
//! Opaque search function: query in, up to three composite text snippets out.
//! Every failure path yields an explanatory placeholder string instead of an
//! error, so the session proceeds with reduced context rather than breaking.

use reqwest::Client;
use scraper::Html;
use serde::Deserialize;
use std::time::Duration;

/// Configuration for the search collaborator
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Search API key
    pub api_key: String,
    /// Custom search engine id
    pub cx: String,
    /// Search endpoint
    pub base_url: String,
    /// Cap on returned result snippets
    pub max_results: usize,
    /// Per-page fetch timeout
    pub page_timeout: Duration,
    /// Cap on fetched page text per result
    pub max_page_chars: usize,
}

impl SearchConfig {
    pub fn new(api_key: impl Into<String>, cx: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            cx: cx.into(),
            base_url: "https://www.googleapis.com/customsearch/v1".to_string(),
            max_results: 3,
            page_timeout: Duration::from_secs(5),
            max_page_chars: 1000,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Web search + page fetch over a custom-search JSON API
pub struct WebSearch {
    client: Client,
    config: SearchConfig,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    title: Option<String>,
    snippet: Option<String>,
    link: Option<String>,
}

impl WebSearch {
    pub fn new(config: SearchConfig) -> reforge_error::Result<Self> {
        let client = Client::builder()
            .timeout(config.page_timeout)
            .build()
            .map_err(|e| {
                reforge_error::Error::search_failed(format!("failed to create HTTP client: {}", e))
                    .with_operation("search::new")
            })?;
        Ok(Self { client, config })
    }

    /// Run a search. Never fails; error paths produce placeholder strings.
    pub async fn search(&self, query: &str) -> Vec<String> {
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("key", self.config.api_key.as_str()),
                ("cx", self.config.cx.as_str()),
                ("q", query),
            ])
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => return vec![format!("An error occurred during web search: {}", e)],
        };

        if !response.status().is_success() {
            return vec!["Failed to retrieve search results.".to_string()];
        }

        let parsed: SearchResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => return vec![format!("An error occurred during web search: {}", e)],
        };

        let mut results = Vec::new();
        for item in parsed.items.into_iter().take(self.config.max_results) {
            let title = item.title.unwrap_or_default();
            let snippet = item.snippet.unwrap_or_default();
            let link = item.link.unwrap_or_default();
            let content = self.fetch_page_content(&link).await;
            results.push(format!(
                "Title: {}\nSnippet: {}\nLink: {}\nContent: {}\n",
                title, snippet, link, content
            ));
        }

        if results.is_empty() {
            results.push("Failed to retrieve search results.".to_string());
        }

        results
    }

    /// Fetch one result page and reduce it to bounded plain text
    async fn fetch_page_content(&self, url: &str) -> String {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return format!("An error occurred while fetching page content: {}", e),
        };

        if !response.status().is_success() {
            return "Failed to retrieve page content.".to_string();
        }

        match response.text().await {
            Ok(body) => clamp_text(&extract_text(&body), self.config.max_page_chars),
            Err(e) => format!("An error occurred while fetching page content: {}", e),
        }
    }
}

/// Strip markup, join text nodes with single spaces
fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut words = Vec::new();
    for text in document.root_element().text() {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            words.push(trimmed.to_string());
        }
    }
    words.join(" ")
}

fn clamp_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{}...", truncated)
    } else {
        text.to_string()
    }
}
