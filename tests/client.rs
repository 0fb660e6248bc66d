mod common;

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use assert_matches::assert_matches;
use num_bigint::BigInt;
use serde_json::Value;

use common::fixture;
use oeis_client::bfile::parse_bfile;
use oeis_client::client::{
    AsyncOeisClient, AsyncOeisHttpClient, OeisClient, OeisHttpClient, parse_entry_response,
    parse_search_response,
};
use oeis_client::config::ClientConfig;
use oeis_client::domain::SequenceId;
use oeis_client::error::OeisError;
use oeis_client::factory::{LoadOptions, SequenceFactory};

fn unreachable_config() -> ClientConfig {
    ClientConfig {
        search_url: "http://127.0.0.1:9/search".to_string(),
        base_url: "http://127.0.0.1:9".to_string(),
        max_retries: 0,
        timeout_secs: 2,
        ..ClientConfig::default()
    }
}

const NATURALS_ENTRY: &str = r#"{"count": 1, "results": [{"number": 27, "data": "1,2,3"}]}"#;

fn http(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

// One connection per canned response, in order.
fn serve(responses: Vec<String>) -> (ClientConfig, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    thread::spawn(move || {
        for (response, stream) in responses.into_iter().zip(listener.incoming()) {
            let mut stream = stream.unwrap();
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request);
            counter.fetch_add(1, Ordering::SeqCst);
            stream.write_all(response.as_bytes()).unwrap();
        }
    });
    let config = ClientConfig {
        search_url: format!("http://{addr}/search"),
        base_url: format!("http://{addr}"),
        max_retries: 1,
        timeout_secs: 5,
        ..ClientConfig::default()
    };
    (config, hits)
}

fn unavailable_then_entry() -> Vec<String> {
    vec![
        http("503 Service Unavailable", ""),
        http("200 OK", NATURALS_ENTRY),
    ]
}

#[test]
fn blocking_client_retries_transient_status() {
    let (config, hits) = serve(unavailable_then_entry());
    let client = OeisHttpClient::with_config(config).unwrap();
    let meta = client.fetch_entry(&SequenceId::new(27)).unwrap().unwrap();
    assert_eq!(meta.data(), Some("1,2,3"));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn async_client_retries_transient_status() {
    let (config, hits) = serve(unavailable_then_entry());
    let client = AsyncOeisHttpClient::with_config(config).unwrap();
    let meta = client
        .fetch_entry(&SequenceId::new(27))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(meta.data(), Some("1,2,3"));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

fn single_attempt(config: ClientConfig) -> ClientConfig {
    ClientConfig {
        max_retries: 0,
        ..config
    }
}

#[test]
fn blocking_client_stops_after_max_retries() {
    let (config, hits) = serve(unavailable_then_entry());
    let client = OeisHttpClient::with_config(single_attempt(config)).unwrap();
    assert_matches!(
        client.fetch_entry(&SequenceId::new(27)),
        Err(OeisError::Status { status: 503, .. })
    );
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn async_client_stops_after_max_retries() {
    let (config, hits) = serve(unavailable_then_entry());
    let client = AsyncOeisHttpClient::with_config(single_attempt(config)).unwrap();
    assert_matches!(
        client.fetch_entry(&SequenceId::new(27)).await,
        Err(OeisError::Status { status: 503, .. })
    );
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn missing_entry_fixture_decodes_to_none() {
    let value: Value = serde_json::from_str(&fixture("missing.json")).unwrap();
    assert_eq!(parse_entry_response(value.clone()).unwrap(), None);
    assert!(parse_search_response(value).unwrap().is_empty());
}

#[test]
fn bfile_fixtures() {
    let bfile = parse_bfile(&fixture("b000045.txt")).unwrap().unwrap();
    assert_eq!(bfile.offset, 0);
    assert_eq!(bfile.len(), 60);
    assert_eq!(bfile.values[10], BigInt::from(55));
    assert_eq!(parse_bfile(&fixture("missing_bfile.html")).unwrap(), None);
}

#[test]
fn blank_search_is_rejected_before_sending() {
    let client = OeisHttpClient::with_config(unreachable_config()).unwrap();
    assert_matches!(client.search(" \t "), Err(OeisError::EmptySearchTerm));
}

#[test]
fn unreachable_host_is_a_transport_error() {
    let client = OeisHttpClient::with_config(unreachable_config()).unwrap();
    assert_matches!(
        client.fetch_entry(&SequenceId::new(45)),
        Err(OeisError::Http(_))
    );
}

#[test]
fn invalid_user_agent_is_rejected() {
    let config = ClientConfig {
        user_agent: "bad\nagent".to_string(),
        ..ClientConfig::default()
    };
    assert_matches!(OeisHttpClient::with_config(config), Err(OeisError::Http(_)));
}

#[test]
#[ignore]
fn fetch_fibonacci_from_oeis() {
    let mut factory = SequenceFactory::new(OeisHttpClient::new().unwrap());
    let sequence = factory
        .load_with("A45", LoadOptions::default().with_bfile(true))
        .unwrap();
    assert_eq!(sequence.get(0).unwrap(), BigInt::from(0));
    assert_eq!(sequence.get(10).unwrap(), BigInt::from(55));
    assert!(sequence.with_bfile());
    assert!(sequence.sample_len().unwrap() > 41);
}

#[test]
#[ignore]
fn unknown_entry_is_absent_on_oeis() {
    let client = OeisHttpClient::new().unwrap();
    assert!(!client.exists(&SequenceId::new(999_999_999)).unwrap());
}

#[test]
#[ignore]
fn search_oeis_by_terms() {
    let client = OeisHttpClient::new().unwrap();
    let results = client.search("1,1,2,3,5,8,13,21,34").unwrap();
    assert!(results.count > 0);
    assert!(
        results
            .results
            .iter()
            .any(|meta| meta.number().and_then(|n| n.as_u64()) == Some(45))
    );
}

#[tokio::test]
#[ignore]
async fn async_fetch_from_oeis() {
    let client = AsyncOeisHttpClient::new().unwrap();
    let meta = client
        .fetch_entry(&SequenceId::new(27))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(meta.number().and_then(|n| n.as_u64()), Some(27));
}
