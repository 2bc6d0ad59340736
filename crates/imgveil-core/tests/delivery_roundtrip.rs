#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use imgveil_core::wire;
use imgveil_core::{
    ChunkAssembler, ChunkRequest, ChunkResponse, ChunkSource, DeliveryConfig, DeliveryService,
    Error, ImageAsset, Result, SessionInit, SessionStore,
};

/// Serves chunks straight from a `DeliveryService`, optionally corrupting one.
struct InProcess {
    service: DeliveryService,
    session_id: String,
    client_public_key: String,
    corrupt_chunk: Option<u32>,
    corrupted: AtomicBool,
}

impl ChunkSource for InProcess {
    async fn fetch(&self, index: u32) -> Result<ChunkResponse> {
        let mut response = self
            .service
            .get_chunk(&ChunkRequest {
                session_id: self.session_id.clone(),
                client_public_key: self.client_public_key.clone(),
                chunk_index: i64::from(index),
            })
            .await?;
        if self.corrupt_chunk == Some(index) {
            let mut ciphertext = wire::decode(&response.ciphertext).unwrap();
            let last = ciphertext.len() - 1;
            ciphertext[last] ^= 0x10;
            response.ciphertext = wire::encode(&ciphertext);
            self.corrupted.store(true, Ordering::SeqCst);
        }
        Ok(response)
    }
}

fn sample_image(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x1234_5678;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state.to_le_bytes()[0]
        })
        .collect()
}

fn service(image: Vec<u8>, chunk_size: usize) -> DeliveryService {
    let config = DeliveryConfig {
        chunk_size,
        ..DeliveryConfig::default()
    };
    DeliveryService::new(
        SessionStore::new(&config),
        ImageAsset::new(image, config.chunk_size).unwrap(),
    )
}

async fn start(
    service: &DeliveryService,
    corrupt_chunk: Option<u32>,
) -> (SessionInit, ChunkAssembler, InProcess) {
    let init = service.init_session().await;
    let assembler = ChunkAssembler::from_session_init(&init).unwrap();
    let source = InProcess {
        service: service.clone(),
        session_id: init.session_id.clone(),
        client_public_key: assembler.client_public_key().unwrap().to_string(),
        corrupt_chunk,
        corrupted: AtomicBool::new(false),
    };
    (init, assembler, source)
}

#[tokio::test]
async fn full_asset_survives_the_round_trip() {
    let image = sample_image(100_000);
    let svc = service(image.clone(), 32768);
    let (init, assembler, source) = start(&svc, None).await;

    assert_eq!(init.total_chunks, 4);
    let out = assembler.assemble(&source).await.unwrap();
    assert_eq!(out, image);
}

#[tokio::test]
async fn concurrent_sessions_each_get_the_asset() {
    let image = sample_image(50_000);
    let svc = service(image.clone(), 4096);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let svc = svc.clone();
        tasks.push(tokio::spawn(async move {
            let (_, assembler, source) = start(&svc, None).await;
            assembler.assemble(&source).await
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), image);
    }
    assert_eq!(svc.store().len().await, 8);
}

#[tokio::test]
async fn corrupted_chunk_yields_no_output() {
    let svc = service(sample_image(20_000), 4096);
    let (_, assembler, source) = start(&svc, Some(2)).await;

    let result = assembler.assemble(&source).await;

    assert!(source.corrupted.load(Ordering::SeqCst));
    assert!(matches!(result, Err(Error::AuthenticationFailure)));
}

#[tokio::test]
async fn swept_session_cannot_be_resumed() {
    let image = sample_image(10_000);
    let svc = DeliveryService::new(
        SessionStore::with_limits(Duration::ZERO, 16, 4),
        ImageAsset::new(image, 4096).unwrap(),
    );
    let (_, assembler, source) = start(&svc, None).await;

    assert_eq!(svc.store().sweep_expired().await, 1);
    assert!(matches!(
        assembler.assemble(&source).await,
        Err(Error::InvalidSession)
    ));
}
