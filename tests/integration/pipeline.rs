use std::sync::Arc;

use blur_core::{Radius, RgbaImage};
use blur_services::BoxBlur;

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Happy path
// ══════════════════════════════════════════════════════════════════════════════

/// 4×4 solid red in, 4×4 opaque red out, one audit row with the radius in
/// effect.
#[tokio::test(flavor = "multi_thread")]
async fn test_solid_red_end_to_end() {
    let server = TestServer::start().await.unwrap();

    let reply = blur_remote(server.addr, &solid_png(4, 4, [255, 0, 0, 255]))
        .await
        .unwrap();
    let image = RgbaImage::decode_png(&reply).unwrap();
    assert_eq!((image.width(), image.height()), (4, 4));
    for y in 0..4 {
        for x in 0..4 {
            assert_eq!(image.pixel(x, y), [255, 0, 0, 255], "pixel ({x}, {y})");
        }
    }

    let rows = server.log.recent(10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].radius, 3);
    assert!(rows[0].path.contains("blurred_"));
    assert_eq!(std::fs::read(&rows[0].path).unwrap(), reply);

    server.stop().await.unwrap();
}

/// Translucent input comes back opaque.
#[tokio::test(flavor = "multi_thread")]
async fn test_alpha_forced_opaque() {
    let server = TestServer::start().await.unwrap();

    let reply = blur_remote(server.addr, &solid_png(3, 2, [10, 20, 30, 40]))
        .await
        .unwrap();
    let image = RgbaImage::decode_png(&reply).unwrap();
    assert!(image
        .as_bytes()
        .chunks_exact(4)
        .all(|p| p == [10, 20, 30, 255]));

    server.stop().await.unwrap();
}

/// The network path produces the same pixels as the engine in-process.
#[tokio::test(flavor = "multi_thread")]
async fn test_reply_matches_local_engine() {
    let server = TestServer::start().await.unwrap();
    server.radius.set(5);

    let source = gradient_image(17, 11);
    let reply = blur_remote(server.addr, &source.encode_png().unwrap())
        .await
        .unwrap();

    let expected = BoxBlur::new(1).unwrap().apply(&source, Radius::new(5)).unwrap();
    assert_eq!(RgbaImage::decode_png(&reply).unwrap(), expected);

    server.stop().await.unwrap();
}

// ══════════════════════════════════════════════════════════════════════════════
//  Radius and ordering
// ══════════════════════════════════════════════════════════════════════════════

/// A radius change made between jobs is used by the next job.
#[tokio::test(flavor = "multi_thread")]
async fn test_radius_change_picked_up_by_next_job() {
    let server = TestServer::start().await.unwrap();
    let png = gradient_image(8, 8).encode_png().unwrap();

    let first = blur_remote(server.addr, &png).await.unwrap();
    server.radius.set(4);
    let second = blur_remote(server.addr, &png).await.unwrap();

    assert_ne!(first, second);
    let radii: Vec<u32> = server.log.recent(10).unwrap().iter().map(|r| r.radius).collect();
    assert_eq!(radii, vec![5, 3]);

    server.stop().await.unwrap();
}

/// Sequential clients are recorded in order.
#[tokio::test(flavor = "multi_thread")]
async fn test_sequential_clients_fifo() {
    let server = TestServer::start().await.unwrap();

    for side in 1..=3 {
        let reply = blur_remote(server.addr, &solid_png(side, side, [0, 0, 255, 255]))
            .await
            .unwrap();
        assert_eq!(RgbaImage::decode_png(&reply).unwrap().width(), side);
    }

    let rows = server.log.recent(10).unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.windows(2).all(|w| w[0].id > w[1].id));

    let snap = server.stats.snapshot();
    assert_eq!(snap.accepted, 3);
    assert_eq!(snap.completed, 3);
    assert_eq!(snap.aborted, 0);

    server.stop().await.unwrap();
}

/// Clients that connect at the same time are all served, one after another.
#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_clients_are_serialized() {
    let server = TestServer::start().await.unwrap();
    let addr = server.addr;

    let png = Arc::new(gradient_image(32, 32).encode_png().unwrap());
    let clients: Vec<_> = (0..4)
        .map(|_| {
            let png = png.clone();
            tokio::spawn(async move { blur_remote(addr, &png).await })
        })
        .collect();

    let mut replies = Vec::new();
    for c in clients {
        replies.push(c.await.unwrap().unwrap());
    }
    assert!(replies.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(server.log.count().unwrap(), 4);

    server.stop().await.unwrap();
}

/// Shutdown returns the accept loop cleanly.
#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_between_jobs() {
    let server = TestServer::start().await.unwrap();
    blur_remote(server.addr, &solid_png(2, 2, [1, 2, 3, 255]))
        .await
        .unwrap();
    server.stop().await.unwrap();
}
