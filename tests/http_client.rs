//! Integration tests for the EPI HTTP client's retry behavior

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{epi_reply, MockServer};
use epi_downloader::data::{EpiClient, EpiSource, FetchError, Metadata, RetryPolicy};

fn fast_retries(max_retries: u32) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_retries(max_retries)
        .with_backoff(Duration::from_millis(1), Duration::from_millis(5))
}

#[tokio::test]
async fn test_server_error_is_retried_until_success() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let server = MockServer::start(move |target: &str| {
        if counter.fetch_add(1, Ordering::SeqCst) < 2 {
            (503, "busy".to_string())
        } else {
            epi_reply(target)
        }
    })
    .await;

    let client = EpiClient::with_base_url(&server.base_url).with_retry_policy(fast_retries(3));
    let text = client.fetch_metadata().await.expect("Third attempt should succeed");

    assert!(Metadata::from_response(&text).is_ok());
    assert_eq!(server.count("/epi/api/metadata"), 3);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start(|_: &str| (404, "no such model".to_string())).await;

    let client = EpiClient::with_base_url(&server.base_url).with_retry_policy(fast_retries(3));
    let err = client.fetch_model_versions(1).await.unwrap_err();

    match err {
        FetchError::Status { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "no such model");
        }
        other => panic!("Expected status error, got {:?}", other),
    }
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_persistent_server_error_exhausts_retries() {
    let server = MockServer::start(|_: &str| (500, "boom".to_string())).await;

    let client = EpiClient::with_base_url(&server.base_url).with_retry_policy(fast_retries(2));
    let err = client.fetch_metadata().await.unwrap_err();

    match err {
        FetchError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, FetchError::Status { status: 500, .. }));
        }
        other => panic!("Expected exhausted retries, got {:?}", other),
    }
    assert_eq!(server.requests().len(), 3);
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let server = MockServer::start(move |target: &str| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            (429, "slow down".to_string())
        } else {
            epi_reply(target)
        }
    })
    .await;

    let client = EpiClient::with_base_url(&server.base_url).with_retry_policy(fast_retries(1));
    assert!(client.fetch_model_versions(587).await.is_ok());
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Bind and drop a listener to find a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = EpiClient::with_base_url(format!("http://{}/epi", addr))
        .with_retry_policy(fast_retries(1));
    let err = client.fetch_metadata().await.unwrap_err();

    match err {
        FetchError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert!(matches!(*last, FetchError::Network(_)));
        }
        other => panic!("Expected exhausted retries, got {:?}", other),
    }
}

#[tokio::test]
async fn test_requests_carry_expected_query_strings() {
    let server = MockServer::start(epi_reply).await;
    let client = EpiClient::with_base_url(&server.base_url).with_retry_policy(RetryPolicy::none());

    client.fetch_model_versions(587).await.unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(common::query_param(&requests[0], "model"), Some("587"));
    assert_eq!(common::query_param(&requests[0], "step"), Some(""));
}

#[tokio::test]
async fn test_stalled_server_times_out_and_is_retried() {
    // Accept connections but never answer
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(socket);
        }
    });

    let client = EpiClient::with_base_url(format!("http://{}/epi", addr))
        .with_retry_policy(fast_retries(2))
        .with_timeout(Duration::from_millis(200));
    let result = tokio::time::timeout(Duration::from_secs(10), client.fetch_metadata())
        .await
        .expect("Stalled requests should time out instead of hanging");

    match result {
        Err(FetchError::RetriesExhausted { attempts, last }) => {
            assert_eq!(attempts, 3);
            match *last {
                FetchError::Network(msg) => assert!(msg.contains("timed out"), "Unexpected message: {}", msg),
                other => panic!("Expected network error, got {:?}", other),
            }
        }
        other => panic!("Expected exhausted retries, got {:?}", other),
    }
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}
