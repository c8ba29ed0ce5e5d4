use connpool::{Dialer, NetError, DEFAULT_MAX_CONNS_PER_HOST};
use std::time::Duration;
use tokio::net::TcpListener;

#[tokio::test]
async fn test_pool_limits() {
    // 1. Start a local server to connect to
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    // Accept and hold every connection so the client side stays open
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let dialer = Dialer::builder()
        .timeout(Duration::from_millis(100))
        .build();

    // 2. Consume all default slots
    let mut conns = Vec::new();
    for _ in 0..DEFAULT_MAX_CONNS_PER_HOST {
        let conn = dialer.dial("tcp", &addr).await;
        assert!(conn.is_ok(), "Failed to acquire connection within limit");
        conns.push(conn.unwrap());
    }
    assert_eq!(dialer.stats("tcp", &addr).unwrap().available, 0);

    // 3. One more - Should time out
    let result = dialer.dial("tcp", &addr).await;
    assert!(
        matches!(result, Err(NetError::DialTimeout { .. })),
        "Should time out when limit reached"
    );

    // 4. Release one
    conns.pop().unwrap().close().await.unwrap();
    assert_eq!(dialer.stats("tcp", &addr).unwrap().available, 1);

    // 5. Dial again - Should Succeed
    let result = dialer.dial("tcp", &addr).await;
    assert!(result.is_ok(), "Should succeed after release");
}

#[tokio::test]
async fn test_refused_dial_is_not_retried() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let dialer = Dialer::builder().max_conns_per_host(1).build();
    let err = dialer.dial("tcp", &addr).await.unwrap_err();
    assert!(matches!(err, NetError::ConnectFailed { .. }));
    assert_eq!(dialer.stats("tcp", &addr).unwrap().available, 1);
}

#[tokio::test]
async fn test_reuse_across_tasks_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let accepted = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            held.push(stream);
        }
    });

    let dialer = Dialer::builder()
        .max_conns_per_host(1)
        .timeout(Duration::from_secs(5))
        .build();
    let first = dialer.dial("tcp", &addr).await.unwrap();

    let d = dialer.clone();
    let a = addr.clone();
    let second = tokio::spawn(async move { d.dial("tcp", &a).await });
    while dialer.stats("tcp", &addr).unwrap().waiters == 0 {
        tokio::task::yield_now().await;
    }

    first.close().await.unwrap();
    let second = second.await.unwrap().unwrap();
    assert!(second.is_reused());
    assert_eq!(accepted.load(std::sync::atomic::Ordering::SeqCst), 1);
}
