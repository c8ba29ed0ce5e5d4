//! HTTP Client Tests
//!
//! Covers:
//! - Requests through `new_http_client` against a local hyper server
//! - Connection cap under concurrent requests
//! - Scheme handling of `PoolConnector`

use bytes::Bytes;
use connpool::client::{new_http_client, PoolConnector};
use connpool::{Dialer, NetError};
use http_body_util::{BodyExt, Empty, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_service::Service;

/// Serve "ok" on every request and count accepted connections.
async fn spawn_server() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let service = service_fn(|_req: Request<hyper::body::Incoming>| async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, Infallible>(Response::new(Full::new(Bytes::from_static(b"ok"))))
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    (addr, accepted)
}

#[tokio::test]
async fn test_get_through_pool() {
    let (addr, accepted) = spawn_server().await;
    let client = new_http_client::<Empty<Bytes>>(2, Duration::from_secs(5));

    for _ in 0..3 {
        let uri = format!("http://{}/", addr).parse().unwrap();
        let resp = client.get(uri).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    // Sequential requests ride on a single keep-alive connection.
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_requests_respect_cap() {
    let (addr, accepted) = spawn_server().await;
    let client = new_http_client::<Empty<Bytes>>(1, Duration::from_secs(5));

    let requests: Vec<_> = (0..4)
        .map(|_| {
            let client = client.clone();
            let uri: hyper::Uri = format!("http://{}/", addr).parse().unwrap();
            tokio::spawn(async move {
                let resp = client.get(uri).await.unwrap();
                resp.into_body().collect().await.unwrap().to_bytes()
            })
        })
        .collect();

    for body in futures::future::join_all(requests).await {
        assert_eq!(&body.unwrap()[..], b"ok");
    }
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connector_rejects_https() {
    let mut connector = PoolConnector::new(Dialer::new());
    let err = connector
        .call("https://example.com/".parse().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::DisallowedUrlScheme(_)));
    assert_eq!(connector.dialer().destination_count(), 0);
}

#[tokio::test]
async fn test_connector_dials_http_authority() {
    let (addr, accepted) = spawn_server().await;
    let mut connector = PoolConnector::new(Dialer::builder().max_conns_per_host(1).build());

    let uri = format!("http://{}/", addr).parse().unwrap();
    let _io = connector.call(uri).await.unwrap();

    let address = addr.to_string();
    let stats = connector.dialer().stats("tcp", &address).unwrap();
    assert_eq!(stats.available, 0);
    while accepted.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
}
