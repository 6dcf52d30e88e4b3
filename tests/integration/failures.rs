use std::sync::Arc;

use blur_core::wire::encode_header;
use blur_core::RgbaImage;
use blur_services::{AuditError, AuditLog, AuditSink, JobRecord, JobStage};

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Malformed requests
// ══════════════════════════════════════════════════════════════════════════════

/// After a rejected request the server must still serve a normal client.
async fn assert_still_serving(server: &TestServer) {
    let reply = blur_remote(server.addr, &solid_png(2, 2, [0, 255, 0, 255]))
        .await
        .unwrap();
    assert_eq!(
        RgbaImage::decode_png(&reply).unwrap().pixel(1, 1),
        [0, 255, 0, 255]
    );
}

fn aborts_in(server: &TestServer, stage: JobStage) -> u64 {
    server
        .stats
        .snapshot()
        .aborts_by_stage
        .iter()
        .find(|(s, _)| *s == stage)
        .map(|(_, n)| *n)
        .unwrap_or(0)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_zero_length_frame_rejected() {
    let server = TestServer::start().await.unwrap();

    assert!(send_raw(server.addr, &encode_header(0)).await.is_err());
    assert_still_serving(&server).await;

    assert_eq!(aborts_in(&server, JobStage::Receiving), 1);
    assert_eq!(server.log.count().unwrap(), 1);
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_negative_length_frame_rejected() {
    let server = TestServer::start().await.unwrap();

    assert!(send_raw(server.addr, &(-5i64).to_be_bytes()).await.is_err());
    assert_still_serving(&server).await;

    assert_eq!(aborts_in(&server, JobStage::Receiving), 1);
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_oversized_frame_rejected() {
    let server = TestServer::start().await.unwrap();

    let mut raw = encode_header(TEST_MAX_FRAME + 1).to_vec();
    raw.extend_from_slice(&[0u8; 64]);
    assert!(send_raw(server.addr, &raw).await.is_err());
    assert_still_serving(&server).await;

    assert_eq!(aborts_in(&server, JobStage::Receiving), 1);
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_truncated_payload_rejected() {
    let server = TestServer::start().await.unwrap();

    let png = solid_png(4, 4, [9, 9, 9, 255]);
    let mut raw = encode_header(png.len() as u64).to_vec();
    raw.extend_from_slice(&png[..png.len() / 2]);
    assert!(send_raw(server.addr, &raw).await.is_err());
    assert_still_serving(&server).await;

    assert_eq!(aborts_in(&server, JobStage::Receiving), 1);
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_truncated_header_rejected() {
    let server = TestServer::start().await.unwrap();

    assert!(send_raw(server.addr, &[0, 0, 0]).await.is_err());
    assert_still_serving(&server).await;

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_non_png_payload_rejected() {
    let server = TestServer::start().await.unwrap();

    let payload = b"GIF89a but not really";
    let mut raw = encode_header(payload.len() as u64).to_vec();
    raw.extend_from_slice(payload);
    assert!(send_raw(server.addr, &raw).await.is_err());
    assert_still_serving(&server).await;

    assert_eq!(aborts_in(&server, JobStage::Decoding), 1);
    assert_eq!(server.log.count().unwrap(), 1);
    server.stop().await.unwrap();
}

// ══════════════════════════════════════════════════════════════════════════════
//  Audit sink failures
// ══════════════════════════════════════════════════════════════════════════════

struct BrokenSink;

impl AuditSink for BrokenSink {
    fn append(&self, _record: &JobRecord) -> Result<(), AuditError> {
        Err(AuditError::LockPoisoned)
    }
}

/// The client still gets its image when the audit append fails.
#[tokio::test(flavor = "multi_thread")]
async fn test_audit_failure_still_delivers() {
    let log = Arc::new(AuditLog::open_in_memory().unwrap());
    let server = TestServer::start_with_sink(Arc::new(BrokenSink), log)
        .await
        .unwrap();

    let reply = blur_remote(server.addr, &solid_png(4, 4, [255, 0, 0, 255]))
        .await
        .unwrap();
    assert_eq!(
        RgbaImage::decode_png(&reply).unwrap().pixel(0, 0),
        [255, 0, 0, 255]
    );

    let snap = server.stats.snapshot();
    assert_eq!(snap.completed, 1);
    assert_eq!(snap.audit_failures, 1);
    assert_eq!(server.log.count().unwrap(), 0);

    assert_still_serving(&server).await;
    server.stop().await.unwrap();
}
