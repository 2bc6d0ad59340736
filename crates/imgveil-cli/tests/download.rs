#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::time::Duration;

use imgveil_cli::DeliveryClient;
use imgveil_core::{ChunkRequest, DeliveryService, Error, ImageAsset, SessionStore};
use imgveil_server::{AppState, build_router};

fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 13 % 256) as u8).collect()
}

/// Serve `image` on an ephemeral local port.
async fn spawn_server(image: Vec<u8>, chunk_size: usize, ttl: Duration) -> SocketAddr {
    let app = build_router(AppState {
        service: DeliveryService::new(
            SessionStore::with_limits(ttl, 100, 4),
            ImageAsset::new(image, chunk_size).unwrap(),
        ),
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr) -> DeliveryClient {
    DeliveryClient::new(&format!("http://{addr}"), Duration::from_secs(10)).unwrap()
}

#[tokio::test]
async fn downloads_and_decrypts_the_image() {
    let addr = spawn_server(image(100_000), 32768, Duration::from_secs(60)).await;
    let out = client(addr).download().await.unwrap();
    assert_eq!(out, image(100_000));
}

#[tokio::test]
async fn small_chunks_many_requests() {
    let addr = spawn_server(image(9_000), 512, Duration::from_secs(60)).await;
    let out = client(addr).download().await.unwrap();
    assert_eq!(out, image(9_000));
}

#[tokio::test]
async fn unknown_session_maps_to_invalid_session() {
    let addr = spawn_server(image(1_000), 512, Duration::from_secs(60)).await;
    let result = client(addr)
        .get_chunk(&ChunkRequest {
            session_id: "ffffffffffffffffffffffffffffffff".into(),
            client_public_key: String::new(),
            chunk_index: 0,
        })
        .await;
    assert!(matches!(result, Err(Error::InvalidSession)));
}

#[tokio::test]
async fn expired_session_fails_the_download() {
    let addr = spawn_server(image(1_000), 512, Duration::ZERO).await;
    let result = client(addr).download().await;
    assert!(matches!(result, Err(Error::SessionExpired)));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = client(addr).init_session().await;
    assert!(matches!(result, Err(Error::Transport(_))));
}
