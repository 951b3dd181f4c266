//! API descriptions handed to [`ApiChain`](crate::rchain::chains::ApiChain).

use std::fs;
use std::path::PathBuf;

use thiserror::Error;

use crate::rchain::chat_runtime::{RequestFailure, send_request};

/// Inline description of the Numbers API.
pub const NUMBERS_API_DOCS: &str = r#"BASE URL: http://numbersapi.com

The Numbers API returns interesting facts about numbers and dates as plain text, or as JSON when the `json` query parameter is present.

API Documentation
GET /{number}/{type}
  number: an integer, the keyword `random`, or a range such as `1..3,10`.
  type: one of `trivia` (default), `math`, `date`, `year`.
GET /{month}/{day}/date
  month and day are integers, for example /2/29/date.

Query parameters:
| Parameter | Format  | Required | Default | Description |
|-----------|---------|----------|---------|-------------|
| json      | flag    | No       | absent  | Return a JSON object with `text`, `number`, `found` and `type` fields. |
| fragment  | flag    | No       | absent  | Return the fact as a sentence fragment. |
| notfound  | string  | No       | default | One of `default`, `floor`, `ceil`: what to do when no fact exists for the number. |
| min, max  | integer | No       |         | Bounds for `random`. |

Example: http://numbersapi.com/42/math?json
Example response: {"text": "42 is the 5th Catalan number.", "number": 42, "found": true, "type": "math"}
"#;

/// Bundled description of the New York Times Article Search and Top Stories APIs.
pub const NYT_API_DOCS: &str = r#"BASE URL: https://api.nytimes.com/svc

The New York Times APIs return JSON. Authentication is added automatically; do not put an api-key parameter in the url.

Article Search
GET /search/v2/articlesearch.json
| Parameter  | Format          | Required | Description |
|------------|-----------------|----------|-------------|
| q          | string          | No       | Search query term, searched in body, headline and byline. |
| fq         | string          | No       | Filter query using Lucene syntax, e.g. section_name:("Sports"). |
| begin_date | string YYYYMMDD | No       | Restrict results to this date or later. |
| end_date   | string YYYYMMDD | No       | Restrict results to this date or earlier. |
| sort       | string          | No       | One of `newest`, `oldest`, `relevance`. |
| page       | integer         | No       | Page number (10 results per page), starting at 0. |
| fl         | string          | No       | Comma-separated list of fields to return, e.g. headline,web_url,pub_date,abstract. |
Response: {"response": {"docs": [{"headline": {"main": "..."}, "abstract": "...", "web_url": "...", "pub_date": "..."}]}}

Top Stories
GET /topstories/v2/{section}.json
  section: one of arts, automobiles, books, business, fashion, food, health, home, insider, magazine, movies, nyregion, obituaries, opinion, politics, realestate, science, sports, sundayreview, technology, theater, t-magazine, travel, upshot, us, world.
Response: {"results": [{"title": "...", "abstract": "...", "url": "...", "published_date": "..."}]}

Most Popular
GET /mostpopular/v2/viewed/{period}.json
  period: number of days, one of 1, 7, 30.
Response: {"results": [{"title": "...", "abstract": "...", "url": "..."}]}
"#;

/// Where API documentation comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiDocsSource {
    Numbers,
    Nyt,
    File(PathBuf),
    Url(String),
}

#[derive(Debug, Error)]
pub enum ApiDocsError {
    #[error("Failed to read API docs file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to fetch API docs from '{url}': {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("API docs request to '{url}' returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("API docs from {0} are empty")]
    Empty(String),
}

impl ApiDocsSource {
    pub fn describe(&self) -> String {
        match self {
            Self::Numbers => "numbers".to_string(),
            Self::Nyt => "nyt".to_string(),
            Self::File(path) => path.display().to_string(),
            Self::Url(url) => url.clone(),
        }
    }
}

/// Resolves the documentation text for a source, fetching it when it is a URL.
pub async fn load_api_docs(
    source: &ApiDocsSource,
    client: &reqwest::Client,
    timeout_secs: Option<u64>,
) -> Result<String, ApiDocsError> {
    let text = match source {
        ApiDocsSource::Numbers => NUMBERS_API_DOCS.to_string(),
        ApiDocsSource::Nyt => NYT_API_DOCS.to_string(),
        ApiDocsSource::File(path) => fs::read_to_string(path).map_err(|source| ApiDocsError::Io {
            path: path.clone(),
            source,
        })?,
        ApiDocsSource::Url(url) => {
            let response = send_request(client.get(url), timeout_secs)
                .await
                .map_err(|failure| match failure {
                    RequestFailure::Request(source) => ApiDocsError::Request {
                        url: url.clone(),
                        source,
                    },
                    RequestFailure::Api { status, .. } => ApiDocsError::Status {
                        url: url.clone(),
                        status,
                    },
                })?;
            let body = response.text().await.map_err(|source| ApiDocsError::Request {
                url: url.clone(),
                source,
            })?;
            normalize_fetched_docs(&body)
        }
    };

    if text.trim().is_empty() {
        return Err(ApiDocsError::Empty(source.describe()));
    }
    Ok(text)
}

/// JSON specs are pretty-printed so the model sees one field per line; other text is kept.
fn normalize_fetched_docs(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string())
        }
        _ => body.to_string(),
    }
}
