// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Scenarios S1-S3 from spec §8, driven against a real `ChannelHub` backed
//! by a `FileSessionStore` over a temp directory.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use chorus_broker::{AdmitOutcome, AdmitRequest, ChannelHub, PublishRequest};
use chorus_config::BrokerConfig;
use chorus_core::{ChannelId, ContentType, ContextId, IdentityKey, ParticipantType};
use chorus_session::FileSessionStore;
use chorus_transport::Frame;

/// Leaks the backing temp dir for the test's lifetime — `FileSessionStore`
/// only needs the path, and leaking keeps every scenario's setup to one
/// line instead of threading a `TempDir` guard through every test.
fn hub() -> ChannelHub {
    let dir = tempfile::tempdir().unwrap().into_path();
    let store = Arc::new(FileSessionStore::new(dir));
    // Debounce window set far beyond any of these tests' runtime so
    // `roster_update` broadcasts never interleave with the event frames
    // under assertion here; the debounce mechanism itself is covered by
    // `chorus-broker`'s unit tests.
    let config = BrokerConfig {
        roster_debounce_ms: 60_000,
        ..BrokerConfig::default()
    };
    ChannelHub::new(config, store)
}

async fn admit(
    hub: &ChannelHub,
    channel_id: &str,
    handle: &str,
    identity_key: &str,
) -> (chorus_core::ClientId, mpsc::Receiver<Frame>) {
    let (tx, rx) = mpsc::channel(64);
    let outcome = hub
        .admit(
            AdmitRequest {
                channel_id: ChannelId::from(channel_id),
                context_id: ContextId::from("ctx"),
                handle: handle.into(),
                metadata: serde_json::Value::Null,
                identity_key: IdentityKey::from(identity_key),
                replay_since_id: None,
                outbound: tx,
            },
            ParticipantType::Panel,
        )
        .await
        .unwrap();
    match outcome {
        AdmitOutcome::Ready { client_id, .. } => (client_id, rx),
        AdmitOutcome::Reject { reason } => panic!("unexpected reject: {reason}"),
    }
}

async fn recv_event(rx: &mut mpsc::Receiver<Frame>) -> Frame {
    timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("no frame received")
        .expect("channel closed")
}

/// Drains the initial `Ready` frame every admission sends.
async fn drain_ready(rx: &mut mpsc::Receiver<Frame>) {
    let f = recv_event(rx).await;
    assert!(matches!(f, Frame::Ready { .. }), "expected Ready, got {f:?}");
}

#[tokio::test]
async fn s1_ordered_fan_out() {
    let hub = hub();
    let (p1, mut p1_rx) = admit(&hub, "c", "p1", "k1").await;
    let (_p2, mut p2_rx) = admit(&hub, "c", "p2", "k2").await;
    drain_ready(&mut p1_rx).await;
    drain_ready(&mut p2_rx).await;

    for content in ["a", "b", "c"] {
        hub.publish(
            &ContextId::from("ctx"),
            &ChannelId::from("c"),
            p1.clone(),
            PublishRequest {
                content: serde_json::json!(content),
                content_type: ContentType::Message,
                reply_to: None,
                persist: true,
                targeted: None,
                attachments: None,
            },
        )
        .await
        .unwrap();
    }

    for rx in [&mut p1_rx, &mut p2_rx] {
        let mut ids = Vec::new();
        let mut contents = Vec::new();
        for _ in 0..3 {
            match recv_event(rx).await {
                Frame::Event {
                    pubsub_id, content, ..
                } => {
                    ids.push(pubsub_id);
                    contents.push(content);
                }
                other => panic!("expected Event, got {other:?}"),
            }
        }
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(
            contents,
            vec![
                serde_json::json!("a"),
                serde_json::json!("b"),
                serde_json::json!("c")
            ]
        );
    }
}

#[tokio::test]
async fn s2_replay_after_reconnect() {
    let hub = hub();
    let (p1, mut p1_rx) = admit(&hub, "c", "p1", "k1").await;
    drain_ready(&mut p1_rx).await;

    for i in 1..=5 {
        hub.publish(
            &ContextId::from("ctx"),
            &ChannelId::from("c"),
            p1.clone(),
            PublishRequest {
                content: serde_json::json!(format!("e{i}")),
                content_type: ContentType::Message,
                reply_to: None,
                persist: true,
                targeted: None,
                attachments: None,
            },
        )
        .await
        .unwrap();
        let _ = recv_event(&mut p1_rx).await;
    }

    hub.disconnect(&ContextId::from("ctx"), &ChannelId::from("c"), &p1);

    for i in 6..=8 {
        hub.publish(
            &ContextId::from("ctx"),
            &ChannelId::from("c"),
            p1.clone(),
            PublishRequest {
                content: serde_json::json!(format!("e{i}")),
                content_type: ContentType::Message,
                reply_to: None,
                persist: true,
                targeted: None,
                attachments: None,
            },
        )
        .await
        .unwrap();
    }

    let (tx, mut rx) = mpsc::channel(64);
    let outcome = hub
        .admit(
            AdmitRequest {
                channel_id: ChannelId::from("c"),
                context_id: ContextId::from("ctx"),
                handle: "p1".into(),
                metadata: serde_json::Value::Null,
                identity_key: IdentityKey::from("k1"),
                replay_since_id: Some(5),
                outbound: tx,
            },
            ParticipantType::Panel,
        )
        .await
        .unwrap();
    assert!(matches!(outcome, AdmitOutcome::Ready { .. }));
    drain_ready(&mut rx).await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        match recv_event(&mut rx).await {
            Frame::Event {
                pubsub_id, kind, ..
            } => {
                assert_eq!(kind, chorus_core::EventKind::Replay);
                ids.push(pubsub_id);
            }
            other => panic!("expected replay Event, got {other:?}"),
        }
    }
    assert_eq!(ids, vec![6, 7, 8]);
}

#[tokio::test]
async fn s3_supersede() {
    let hub = hub();
    let (a1, mut a1_rx) = admit(&hub, "c", "a1", "K").await;
    drain_ready(&mut a1_rx).await;

    let (tx2, mut a2_rx) = mpsc::channel(64);
    let outcome = hub
        .admit(
            AdmitRequest {
                channel_id: ChannelId::from("c"),
                context_id: ContextId::from("ctx"),
                handle: "a1".into(),
                metadata: serde_json::Value::Null,
                identity_key: IdentityKey::from("K"),
                replay_since_id: None,
                outbound: tx2,
            },
            ParticipantType::Panel,
        )
        .await
        .unwrap();
    let a2 = match outcome {
        AdmitOutcome::Ready { client_id, .. } => client_id,
        AdmitOutcome::Reject { reason } => panic!("unexpected reject: {reason}"),
    };
    assert_ne!(a1, a2);

    // A1 sees the superseding close frame ...
    match recv_event(&mut a1_rx).await {
        Frame::Error { code, message } => {
            assert_eq!(code, 409);
            assert_eq!(message, "superseded");
        }
        other => panic!("expected superseded Error, got {other:?}"),
    }

    // ... and A2's Ready comes after that, in program order.
    drain_ready(&mut a2_rx).await;

    let roster = hub.roster(&ContextId::from("ctx"), &ChannelId::from("c"));
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].client_id, a2);
}
