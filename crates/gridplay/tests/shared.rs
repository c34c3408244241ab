//! The process-wide client. Kept in its own test binary because the
//! shared slot lives for the whole process.

use gridplay::prelude::*;
use tokio::net::TcpListener;

#[tokio::test]
async fn test_shared_with_returns_same_client() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        // Hold the socket open until the test ends.
        std::future::pending::<()>().await;
        drop(ws);
    });

    let builder = GridPlayClient::builder()
        .endpoint(&url)
        .close_on_interrupt(false);
    let first = GridPlayClient::shared_with(builder.clone()).await.unwrap();
    let second = GridPlayClient::shared_with(builder.endpoint("ws://ignored.invalid/ws"))
        .await
        .unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(second.endpoint(), url);
    assert!(second.session_state().is_open());

    server.abort();
}
