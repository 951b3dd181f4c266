use serde::Deserialize;
use tracing::{debug, warn};

use crate::rchain::chat_runtime::{RequestFailure, send_request};
use crate::rchain::documents::{Document, truncate_chars};
use crate::rchain::loaders::{DocumentLoader, LoaderError};

pub const DEFAULT_LANG: &str = "en";
pub const DEFAULT_LOAD_MAX_DOCS: usize = 2;
pub const DEFAULT_DOC_CONTENT_CHARS_MAX: usize = 4_000;
/// MediaWiki caps `srlimit` for regular clients.
const MAX_SEARCH_LIMIT: usize = 300;

/// Searches Wikipedia and loads the top results as plain-text documents.
#[derive(Debug, Clone)]
pub struct WikipediaLoader {
    query: String,
    lang: String,
    load_max_docs: usize,
    doc_content_chars_max: usize,
    api_url: Option<String>,
    timeout_secs: Option<u64>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    query: Option<PageQuery>,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    title: String,
    #[serde(default)]
    missing: bool,
    extract: Option<String>,
    fullurl: Option<String>,
}

impl WikipediaLoader {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            lang: DEFAULT_LANG.to_string(),
            load_max_docs: DEFAULT_LOAD_MAX_DOCS,
            doc_content_chars_max: DEFAULT_DOC_CONTENT_CHARS_MAX,
            api_url: None,
            timeout_secs: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn with_load_max_docs(mut self, load_max_docs: usize) -> Self {
        self.load_max_docs = load_max_docs.clamp(1, MAX_SEARCH_LIMIT);
        self
    }

    pub fn with_doc_content_chars_max(mut self, chars: usize) -> Self {
        self.doc_content_chars_max = chars;
        self
    }

    /// Points the loader at another MediaWiki `api.php` endpoint.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Search limit after clamping to the API's accepted range.
    pub fn load_max_docs(&self) -> usize {
        self.load_max_docs
    }

    pub fn api_url(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.wikipedia.org/w/api.php", self.lang))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T, LoaderError> {
        let request = self
            .client
            .get(self.api_url())
            .query(&[("format", "json"), ("formatversion", "2")])
            .query(params);
        let response = send_request(request, self.timeout_secs)
            .await
            .map_err(|failure| match failure {
                RequestFailure::Request(source) => LoaderError::Request { source },
                RequestFailure::Api { status, body } => LoaderError::Api { status, body },
            })?;
        let body = response
            .text()
            .await
            .map_err(|source| LoaderError::Request { source })?;
        serde_json::from_str(&body).map_err(|err| LoaderError::Malformed(err.to_string()))
    }

    async fn search_titles(&self, query: &str) -> Result<Vec<String>, LoaderError> {
        let limit = self.load_max_docs.to_string();
        let response: SearchResponse = self
            .get_json(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", &limit),
            ])
            .await?;

        let titles = response
            .query
            .map(|query| query.search)
            .unwrap_or_default()
            .into_iter()
            .map(|hit| hit.title)
            .take(self.load_max_docs)
            .collect();
        Ok(titles)
    }

    async fn fetch_page(&self, title: &str) -> Result<Option<Page>, LoaderError> {
        let response: PageResponse = self
            .get_json(&[
                ("action", "query"),
                ("prop", "extracts|info"),
                ("explaintext", "1"),
                ("inprop", "url"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .await?;

        Ok(response
            .query
            .and_then(|query| query.pages.into_iter().next()))
    }

    fn page_to_document(&self, page: Page) -> Option<Document> {
        if page.missing {
            return None;
        }
        let extract = page.extract.as_deref().map(str::trim).unwrap_or_default();
        if extract.is_empty() {
            return None;
        }

        let source = page
            .fullurl
            .clone()
            .unwrap_or_else(|| article_url(&self.lang, &page.title));
        Some(
            Document::new(truncate_chars(extract, self.doc_content_chars_max))
                .with_metadata("title", page.title)
                .with_metadata("summary", first_paragraph(extract))
                .with_metadata("source", source),
        )
    }
}

impl DocumentLoader for WikipediaLoader {
    async fn load(&self) -> Result<Vec<Document>, LoaderError> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err(LoaderError::EmptyQuery);
        }

        let titles = self.search_titles(query).await?;
        debug!(query, hits = titles.len(), "wikipedia search finished");

        let mut documents = Vec::with_capacity(titles.len());
        for title in titles {
            match self.fetch_page(&title).await? {
                Some(page) => match self.page_to_document(page) {
                    Some(document) => documents.push(document),
                    None => warn!(title = %title, "wikipedia page has no text; skipping"),
                },
                None => warn!(title = %title, "wikipedia page not returned; skipping"),
            }
        }
        Ok(documents)
    }
}

/// Canonical article URL for a title: spaces become underscores.
pub fn article_url(lang: &str, title: &str) -> String {
    format!("https://{lang}.wikipedia.org/wiki/{}", title.replace(' ', "_"))
}

fn first_paragraph(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}
