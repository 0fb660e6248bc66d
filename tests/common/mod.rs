#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::sync::Mutex;

use num_bigint::BigInt;
use serde_json::json;

use oeis_client::bfile::{BFile, parse_bfile};
use oeis_client::client::{AsyncOeisClient, OeisClient, SearchResults, parse_entry_response};
use oeis_client::domain::SequenceId;
use oeis_client::error::OeisError;
use oeis_client::metadata::Metadata;

pub fn fixture(name: &str) -> String {
    fs::read_to_string(format!("tests/fixtures/{name}")).unwrap()
}

pub fn fibonacci_meta() -> Metadata {
    let value: serde_json::Value = serde_json::from_str(&fixture("A000045.json")).unwrap();
    parse_entry_response(value).unwrap().unwrap()
}

pub fn naturals_meta() -> Metadata {
    Metadata::from_value(json!({
        "number": 27,
        "name": "The positive integers.",
        "data": "1,2,3,4,5,6,7,8,9,10",
        "offset": "1,2",
        "keyword": "core,nonn,easy,nice,mult,tabl",
    }))
    .unwrap()
}

pub fn big(values: &[i64]) -> Vec<BigInt> {
    values.iter().copied().map(BigInt::from).collect()
}

/// In-memory OEIS with per-endpoint call counters.
#[derive(Default)]
pub struct MockOeis {
    entries: HashMap<u64, Metadata>,
    bfiles: HashMap<u64, String>,
    entry_calls: Mutex<usize>,
    bfile_calls: Mutex<usize>,
    search_calls: Mutex<usize>,
}

impl MockOeis {
    pub fn fibonacci() -> Self {
        Self::default()
            .with_entry(fibonacci_meta())
            .with_bfile(45, &fixture("b000045.txt"))
    }

    pub fn with_entry(mut self, meta: Metadata) -> Self {
        let number = meta.number().and_then(|n| n.as_u64()).unwrap();
        self.entries.insert(number, meta);
        self
    }

    pub fn with_bfile(mut self, number: u64, body: &str) -> Self {
        self.bfiles.insert(number, body.to_string());
        self
    }

    pub fn entry_calls(&self) -> usize {
        *self.entry_calls.lock().unwrap()
    }

    pub fn bfile_calls(&self) -> usize {
        *self.bfile_calls.lock().unwrap()
    }

    pub fn search_calls(&self) -> usize {
        *self.search_calls.lock().unwrap()
    }
}

impl OeisClient for MockOeis {
    fn fetch_entry(&self, id: &SequenceId) -> Result<Option<Metadata>, OeisError> {
        *self.entry_calls.lock().unwrap() += 1;
        Ok(self.entries.get(&id.number()).cloned())
    }

    fn fetch_bfile(&self, id: &SequenceId) -> Result<Option<BFile>, OeisError> {
        *self.bfile_calls.lock().unwrap() += 1;
        match self.bfiles.get(&id.number()) {
            Some(body) => parse_bfile(body),
            None => parse_bfile(&fixture("missing_bfile.html")),
        }
    }

    fn search(&self, term: &str) -> Result<SearchResults, OeisError> {
        *self.search_calls.lock().unwrap() += 1;
        let results = self
            .entries
            .values()
            .filter(|meta| meta.data().is_some_and(|data| data.contains(term)))
            .cloned()
            .collect::<Vec<_>>();
        Ok(SearchResults {
            count: results.len() as u64,
            start: 0,
            results,
        })
    }
}

impl AsyncOeisClient for MockOeis {
    async fn fetch_entry(&self, id: &SequenceId) -> Result<Option<Metadata>, OeisError> {
        OeisClient::fetch_entry(self, id)
    }

    async fn fetch_bfile(&self, id: &SequenceId) -> Result<Option<BFile>, OeisError> {
        OeisClient::fetch_bfile(self, id)
    }

    async fn search(&self, term: &str) -> Result<SearchResults, OeisError> {
        OeisClient::search(self, term)
    }
}

/// Client whose every request fails at the transport level.
pub struct OfflineOeis;

impl OeisClient for OfflineOeis {
    fn fetch_entry(&self, _id: &SequenceId) -> Result<Option<Metadata>, OeisError> {
        Err(OeisError::Http("offline".to_string()))
    }

    fn fetch_bfile(&self, _id: &SequenceId) -> Result<Option<BFile>, OeisError> {
        Err(OeisError::Http("offline".to_string()))
    }

    fn search(&self, _term: &str) -> Result<SearchResults, OeisError> {
        Err(OeisError::Http("offline".to_string()))
    }
}
