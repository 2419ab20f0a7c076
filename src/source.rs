//! Bybit announcement feed client.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tracing::warn;

/// How many recent announcements to ask the feed for.
const PAGE_LIMIT: u32 = 20;
/// Per-request timeout for the feed.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// One announcement record from the feed.
///
/// Only the `id` is ever persisted; the rest is re-fetched every cycle.
#[derive(Debug, Clone, Deserialize)]
pub struct Announcement {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "dateTimestamp", deserialize_with = "string_or_number_opt")]
    pub created_at: String,
    #[serde(default)]
    pub url: String,
}

/// Errors from a single feed fetch. Never retried within a poll cycle;
/// the next scheduled poll is the retry.
#[derive(Debug)]
pub enum SourceError {
    /// Transport-level failure (connect, timeout, non-2xx, bad JSON).
    Http(reqwest::Error),
    /// The API answered but rejected the request.
    Api { code: i64, msg: String },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "feed request failed: {e}"),
            Self::Api { code, msg } => write!(f, "feed API error (retCode {code}): {msg}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Api { .. } => None,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    result: Option<Page>,
}

#[derive(Deserialize)]
struct Page {
    #[serde(default)]
    list: Vec<Announcement>,
}

/// Client for the Bybit announcement index endpoint.
pub struct BybitSource {
    client: reqwest::Client,
    url: String,
    locale: String,
}

impl BybitSource {
    pub fn new(url: String, locale: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, url, locale }
    }

    /// Fetch the most recent announcements, newest first, as the feed
    /// orders them. One attempt, no retry.
    pub async fn fetch(&self) -> Result<Vec<Announcement>, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("locale", self.locale.as_str()),
                ("limit", &PAGE_LIMIT.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let envelope: Envelope = response.json().await?;
        if envelope.ret_code != 0 {
            return Err(SourceError::Api {
                code: envelope.ret_code,
                msg: envelope.ret_msg,
            });
        }

        match envelope.result {
            Some(page) => Ok(page.list),
            None => {
                warn!("Feed returned retCode 0 but no result payload");
                Ok(Vec::new())
            }
        }
    }
}

/// The feed is loose about types: ids and timestamps show up as either
/// JSON strings or numbers. Normalize both to strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Value {
        String(String),
        Number(i64),
    }

    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
    })
}

fn string_or_number_opt<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    string_or_number(deserializer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_envelope_with_string_ids() {
        let body = r#"{
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "list": [
                    {"id": "ann-1", "title": "Token Splash Live", "created_at": "2026-01-01", "url": "https://example.com/1"}
                ]
            }
        }"#;
        let envelope: Envelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.ret_code, 0);
        let list = envelope.result.unwrap().list;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "ann-1");
        assert_eq!(list[0].title, "Token Splash Live");
    }

    #[test]
    fn test_parse_envelope_with_numeric_fields() {
        let body = r#"{
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "list": [
                    {"id": 12345, "title": "New Listing", "created_at": 1767225600, "url": "https://example.com/2"}
                ]
            }
        }"#;
        let envelope: Envelope = serde_json::from_str(body).unwrap();
        let list = envelope.result.unwrap().list;
        assert_eq!(list[0].id, "12345");
        assert_eq!(list[0].created_at, "1767225600");
    }

    #[test]
    fn test_parse_envelope_missing_optional_fields() {
        let body = r#"{
            "retCode": 0,
            "retMsg": "OK",
            "result": {"list": [{"id": "x"}]}
        }"#;
        let envelope: Envelope = serde_json::from_str(body).unwrap();
        let list = envelope.result.unwrap().list;
        assert_eq!(list[0].id, "x");
        assert!(list[0].title.is_empty());
        assert!(list[0].url.is_empty());
    }

    #[test]
    fn test_api_error_display() {
        let err = SourceError::Api {
            code: 10001,
            msg: "params error".into(),
        };
        let text = err.to_string();
        assert!(text.contains("10001"));
        assert!(text.contains("params error"));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_is_http_error() {
        let source = BybitSource::new(
            "http://127.0.0.1:1/v5/announcements/index".into(),
            "en-US".into(),
        );
        match source.fetch().await {
            Err(SourceError::Http(_)) => {}
            other => panic!("expected Http error, got {other:?}"),
        }
    }
}
