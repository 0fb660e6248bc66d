use std::future::Future;
use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, warn};

use crate::bfile::{BFile, parse_bfile};
use crate::config::ClientConfig;
use crate::domain::SequenceId;
use crate::error::OeisError;
use crate::metadata::Metadata;

const BASE_DELAY_MS: u64 = 200;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub count: u64,
    pub start: u64,
    pub results: Vec<Metadata>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

pub trait OeisClient: Send + Sync {
    fn fetch_entry(&self, id: &SequenceId) -> Result<Option<Metadata>, OeisError>;

    fn fetch_bfile(&self, id: &SequenceId) -> Result<Option<BFile>, OeisError>;

    fn search(&self, term: &str) -> Result<SearchResults, OeisError>;

    fn exists(&self, id: &SequenceId) -> Result<bool, OeisError> {
        Ok(self.fetch_entry(id)?.is_some())
    }

    fn bfile_exists(&self, id: &SequenceId) -> Result<bool, OeisError> {
        Ok(self.fetch_bfile(id)?.is_some())
    }
}

/// Future-returning twin of [`OeisClient`]; implementations must produce the
/// same results for the same inputs.
pub trait AsyncOeisClient: Send + Sync {
    fn fetch_entry(
        &self,
        id: &SequenceId,
    ) -> impl Future<Output = Result<Option<Metadata>, OeisError>> + Send;

    fn fetch_bfile(
        &self,
        id: &SequenceId,
    ) -> impl Future<Output = Result<Option<BFile>, OeisError>> + Send;

    fn search(&self, term: &str) -> impl Future<Output = Result<SearchResults, OeisError>> + Send;
}

pub fn join_terms<I, T>(terms: I) -> String
where
    I: IntoIterator<Item = T>,
    T: ToString,
{
    terms
        .into_iter()
        .map(|term| term.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn validate_term(term: &str) -> Result<&str, OeisError> {
    let term = term.trim();
    if term.is_empty() {
        return Err(OeisError::EmptySearchTerm);
    }
    Ok(term)
}

fn entry_query(id: &SequenceId) -> [(&'static str, String); 2] {
    [("q", format!("id:{}", id.name())), ("fmt", "json".to_string())]
}

fn search_query(term: &str) -> [(&'static str, String); 2] {
    [("q", term.to_string()), ("fmt", "json".to_string())]
}

#[derive(Debug, Clone)]
pub struct OeisHttpClient {
    client: Client,
    config: ClientConfig,
}

impl OeisHttpClient {
    pub fn new() -> Result<Self, OeisError> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, OeisError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|err| OeisError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| OeisError::Http(err.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn send_with_retries<F>(&self, make_req: F) -> Result<reqwest::blocking::Response, OeisError>
    where
        F: Fn() -> reqwest::blocking::RequestBuilder,
    {
        let mut attempt = 0usize;
        loop {
            let outcome = make_req().send();
            let retryable = match &outcome {
                Ok(response) => is_retryable_status(response.status().as_u16()),
                Err(err) => is_retryable_error(err),
            };
            match retry_delay(attempt, self.config.max_retries, retryable) {
                Some(delay) => {
                    warn!(attempt, ?delay, "retrying OEIS request");
                    thread::sleep(delay);
                    attempt += 1;
                }
                None => return outcome.map_err(|err| OeisError::Http(err.to_string())),
            }
        }
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, OeisError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "OEIS request failed".to_string());
        Err(OeisError::Status { status, message })
    }

    fn get_json(&self, query: &[(&'static str, String)]) -> Result<Value, OeisError> {
        debug!(url = %self.config.search_url, ?query, "OEIS search request");
        let response =
            self.send_with_retries(|| self.client.get(&self.config.search_url).query(query))?;
        let response = Self::handle_status(response)?;
        response
            .json()
            .map_err(|err| OeisError::Decode(err.to_string()))
    }
}

impl OeisClient for OeisHttpClient {
    fn fetch_entry(&self, id: &SequenceId) -> Result<Option<Metadata>, OeisError> {
        let value = self.get_json(&entry_query(id))?;
        parse_entry_response(value)
    }

    fn fetch_bfile(&self, id: &SequenceId) -> Result<Option<BFile>, OeisError> {
        let url = self.config.bfile_url(id);
        debug!(%url, "OEIS b-file request");
        let response = self.send_with_retries(|| self.client.get(&url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::handle_status(response)?;
        let body = response
            .text()
            .map_err(|err| OeisError::Decode(err.to_string()))?;
        parse_bfile(&body)
    }

    fn search(&self, term: &str) -> Result<SearchResults, OeisError> {
        let term = validate_term(term)?;
        let value = self.get_json(&search_query(term))?;
        parse_search_response(value)
    }
}

#[derive(Clone)]
pub struct AsyncOeisHttpClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl AsyncOeisHttpClient {
    pub fn new() -> Result<Self, OeisError> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, OeisError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| OeisError::Http(err.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn send_with_retries<F>(&self, make_req: F) -> Result<reqwest::Response, OeisError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0usize;
        loop {
            let outcome = make_req().send().await;
            let retryable = match &outcome {
                Ok(response) => is_retryable_status(response.status().as_u16()),
                Err(err) => is_retryable_error(err),
            };
            match retry_delay(attempt, self.config.max_retries, retryable) {
                Some(delay) => {
                    warn!(attempt, ?delay, "retrying OEIS request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => return outcome.map_err(|err| OeisError::Http(err.to_string())),
            }
        }
    }

    async fn handle_status(response: reqwest::Response) -> Result<reqwest::Response, OeisError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "OEIS request failed".to_string());
        Err(OeisError::Status { status, message })
    }

    async fn get_json(&self, query: &[(&'static str, String)]) -> Result<Value, OeisError> {
        debug!(url = %self.config.search_url, ?query, "OEIS search request");
        let response = self
            .send_with_retries(|| self.client.get(&self.config.search_url).query(query))
            .await?;
        let response = Self::handle_status(response).await?;
        response
            .json()
            .await
            .map_err(|err| OeisError::Decode(err.to_string()))
    }
}

impl AsyncOeisClient for AsyncOeisHttpClient {
    async fn fetch_entry(&self, id: &SequenceId) -> Result<Option<Metadata>, OeisError> {
        let value = self.get_json(&entry_query(id)).await?;
        parse_entry_response(value)
    }

    async fn fetch_bfile(&self, id: &SequenceId) -> Result<Option<BFile>, OeisError> {
        let url = self.config.bfile_url(id);
        debug!(%url, "OEIS b-file request");
        let response = self.send_with_retries(|| self.client.get(&url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::handle_status(response).await?;
        let body = response
            .text()
            .await
            .map_err(|err| OeisError::Decode(err.to_string()))?;
        parse_bfile(&body)
    }

    async fn search(&self, term: &str) -> Result<SearchResults, OeisError> {
        let term = validate_term(term)?;
        let value = self.get_json(&search_query(term)).await?;
        parse_search_response(value)
    }
}

pub fn parse_entry_response(value: Value) -> Result<Option<Metadata>, OeisError> {
    let results = parse_search_response(value)?;
    if results.count == 0 {
        return Ok(None);
    }
    match results.results.into_iter().next() {
        Some(entry) => Ok(Some(entry)),
        None => Err(OeisError::Decode(format!(
            "count is {} but no results were returned",
            results.count
        ))),
    }
}

pub fn parse_search_response(value: Value) -> Result<SearchResults, OeisError> {
    match value {
        Value::Null => Ok(SearchResults::default()),
        Value::Array(items) => {
            let results = items
                .into_iter()
                .map(Metadata::from_value)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SearchResults {
                count: results.len() as u64,
                start: 0,
                results,
            })
        }
        Value::Object(mut envelope) => {
            let count = envelope
                .get("count")
                .and_then(|v| v.as_u64())
                .ok_or_else(|| OeisError::Decode("search response has no count".to_string()))?;
            let start = envelope.get("start").and_then(|v| v.as_u64()).unwrap_or(0);
            let results = match envelope.remove("results") {
                Some(Value::Array(items)) => items
                    .into_iter()
                    .map(Metadata::from_value)
                    .collect::<Result<Vec<_>, _>>()?,
                Some(Value::Null) | None => Vec::new(),
                Some(other) => {
                    return Err(OeisError::Decode(format!(
                        "unexpected results field: {other}"
                    )));
                }
            };
            Ok(SearchResults {
                count,
                start,
                results,
            })
        }
        other => Err(OeisError::Decode(format!(
            "unexpected search response: {other}"
        ))),
    }
}

fn retry_delay(attempt: usize, max_retries: usize, retryable: bool) -> Option<Duration> {
    (retryable && attempt < max_retries).then(|| backoff(attempt))
}

fn backoff(attempt: usize) -> Duration {
    Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1))
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn zero_count_is_absent() {
        let value = json!({"greeting": "Greetings from The OEIS", "count": 0, "results": null});
        assert_eq!(parse_entry_response(value).unwrap(), None);
    }

    #[test]
    fn first_result_is_the_entry() {
        let value = json!({"count": 1, "results": [{"number": 45, "data": "0,1,1"}]});
        let meta = parse_entry_response(value).unwrap().unwrap();
        assert_eq!(meta.data(), Some("0,1,1"));
    }

    #[test]
    fn bare_array_responses() {
        assert_eq!(parse_entry_response(json!(null)).unwrap(), None);
        assert_eq!(parse_entry_response(json!([])).unwrap(), None);
        let meta = parse_entry_response(json!([{"number": 27}])).unwrap().unwrap();
        assert_eq!(meta.number(), Some(&json!(27)));
    }

    #[test]
    fn count_without_results_is_an_error() {
        let err = parse_entry_response(json!({"count": 2})).unwrap_err();
        assert_matches!(err, OeisError::Decode(_));
    }

    #[test]
    fn search_envelope_keeps_paging() {
        let value = json!({"count": 120, "start": 10, "results": [{"number": 1}, {"number": 2}]});
        let results = parse_search_response(value).unwrap();
        assert_eq!(results.count, 120);
        assert_eq!(results.start, 10);
        assert_eq!(results.results.len(), 2);
    }

    #[test]
    fn retries_are_bounded_and_linear() {
        assert_eq!(retry_delay(0, 3, true), Some(Duration::from_millis(BASE_DELAY_MS)));
        assert_eq!(retry_delay(2, 3, true), Some(Duration::from_millis(3 * BASE_DELAY_MS)));
        assert_eq!(retry_delay(3, 3, true), None);
        assert_eq!(retry_delay(0, 3, false), None);
        assert_eq!(retry_delay(0, 0, true), None);
    }

    #[test]
    fn transient_statuses_are_retryable() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_retryable_status(status));
        }
        for status in [200, 400, 404] {
            assert!(!is_retryable_status(status));
        }
    }

    #[test]
    fn empty_terms_fail_fast() {
        assert_matches!(validate_term("   "), Err(OeisError::EmptySearchTerm));
        assert_eq!(validate_term(" 1,2,3 ").unwrap(), "1,2,3");
        assert_eq!(join_terms([1, 2, 3, 5, 8]), "1,2,3,5,8");
    }
}
