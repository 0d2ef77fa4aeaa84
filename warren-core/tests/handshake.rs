//! Integration tests: connection handshake, tuning, heartbeats and close.

mod common;

use std::time::Duration;

use common::{
    Broker, RecordingConnector, RefusingConnector, WAIT, config, config_for, connected, pair,
};
use warren_core::{
    AmqpError, ClientConfig, Connection, ConnectionPhase, FieldValue, MethodKind, ProtocolVersion,
    Tuning,
};

// ── Handshake ────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_tune_open_reaches_connected() {
    let (mut conn, server) = pair(config());
    let spec = conn.spec();

    let (started, ()) = tokio::join!(conn.start(), async {
        let mut broker = Broker::accept(server, spec).await;
        broker.send(0, MethodKind::ConnectionStart, []).await;

        let (channel, start_ok) = broker.expect(MethodKind::ConnectionStartOk).await;
        assert_eq!(channel, 0);
        assert_eq!(start_ok.short_str("mechanism").unwrap(), "PLAIN");
        assert_eq!(start_ok.long_str("response").unwrap(), b"\0guest\0guest");
        let props = start_ok.table("client_properties").unwrap();
        assert_eq!(
            props.get("product").and_then(FieldValue::as_str),
            Some("warren")
        );

        broker
            .send(
                0,
                MethodKind::ConnectionTune,
                [
                    ("channel_max", FieldValue::from(2047u16)),
                    ("frame_max", FieldValue::from(65_536u32)),
                    ("heartbeat", FieldValue::from(0u16)),
                ],
            )
            .await;
        let (_, tune_ok) = broker.expect(MethodKind::ConnectionTuneOk).await;
        assert_eq!(tune_ok.u16("channel_max").unwrap(), 2047);
        assert_eq!(tune_ok.u32("frame_max").unwrap(), 65_536);

        let (_, open) = broker.expect(MethodKind::ConnectionOpen).await;
        assert_eq!(open.short_str("virtual_host").unwrap(), "/");
        broker.send(0, MethodKind::ConnectionOpenOk, []).await;

        assert_eq!(broker.open_channel_reply().await, 1);
    });

    started.unwrap();
    assert!(conn.is_connected());
    assert_eq!(conn.active_channel(), 1);
    assert_eq!(conn.tuning(), Tuning::new(2047, 65_536, 0));
}

#[tokio::test]
async fn test_close_instead_of_open_ok_is_forced_close() {
    let (mut conn, server) = pair(config());
    let spec = conn.spec();

    let (started, ()) = tokio::join!(conn.start(), async {
        let mut broker = Broker::accept(server, spec).await;
        broker.send(0, MethodKind::ConnectionStart, []).await;
        broker.expect(MethodKind::ConnectionStartOk).await;
        broker.send(0, MethodKind::ConnectionTune, []).await;
        broker.expect(MethodKind::ConnectionTuneOk).await;
        broker.expect(MethodKind::ConnectionOpen).await;
        broker
            .send(
                0,
                MethodKind::ConnectionClose,
                [
                    ("reply_code", FieldValue::from(530u16)),
                    ("reply_text", FieldValue::from("NOT_ALLOWED")),
                ],
            )
            .await;
        let (channel, _) = broker.expect(MethodKind::ConnectionCloseOk).await;
        assert_eq!(channel, 0);
    });

    match started {
        Err(AmqpError::ForcedConnectionClose {
            reply_code,
            reply_text,
        }) => {
            assert_eq!(reply_code, 530);
            assert_eq!(reply_text, "NOT_ALLOWED");
        }
        other => panic!("expected forced close, got {other:?}"),
    }
    assert_eq!(*conn.status(), ConnectionPhase::Disconnected);
}

#[tokio::test]
async fn test_missing_tune_keeps_client_tuning() {
    let (mut conn, server) = pair(config());
    let spec = conn.spec();

    let (started, ()) = tokio::join!(conn.start(), async {
        let mut broker = Broker::accept(server, spec).await;
        broker.send(0, MethodKind::ConnectionStart, []).await;
        broker.expect(MethodKind::ConnectionStartOk).await;
        // straight to Open-Ok; the client still has to send Open
        broker.send(0, MethodKind::ConnectionOpenOk, []).await;
        broker.expect(MethodKind::ConnectionOpen).await;
        broker.send(0, MethodKind::ConnectionOpenOk, []).await;
        assert_eq!(broker.open_channel_reply().await, 1);
    });

    started.unwrap();
    assert!(conn.is_connected());
    assert_eq!(conn.tuning(), config().tuning());
}

#[tokio::test]
async fn test_wrong_first_method_is_protocol_error() {
    let (mut conn, server) = pair(config());
    let spec = conn.spec();

    let (started, ()) = tokio::join!(conn.start(), async {
        let mut broker = Broker::accept(server, spec).await;
        broker.send(0, MethodKind::ConnectionOpenOk, []).await;
    });

    assert!(matches!(started, Err(AmqpError::Protocol(_))));
    assert!(conn.status().is_disconnected());
}

#[tokio::test]
async fn test_broker_hangup_during_handshake() {
    let (mut conn, server) = pair(config());
    let spec = conn.spec();

    let (started, ()) = tokio::join!(conn.start(), async {
        let broker = Broker::accept(server, spec).await;
        drop(broker);
    });

    assert!(matches!(started, Err(AmqpError::ServerDown(_))));
    assert!(conn.status().is_disconnected());
}

// ── Transport ────────────────────────────────────────────────────

#[tokio::test]
async fn test_refused_connect_is_server_down() {
    let mut conn = Connection::with_connector(config(), RefusingConnector);
    let err = conn.start().await.unwrap_err();
    assert!(matches!(err, AmqpError::ServerDown(_)));
    assert!(err.is_connection_fatal());
    assert!(conn.status().is_disconnected());
}

#[tokio::test]
async fn test_ssl_requires_tls_connector() {
    let cfg = ClientConfig {
        ssl: true,
        ..config()
    };
    let mut conn = Connection::with_connector(cfg, RefusingConnector);
    assert!(matches!(conn.start().await, Err(AmqpError::Usage(_))));
}

#[tokio::test]
async fn test_connector_sees_tls_verification_setting() {
    let cfg = ClientConfig {
        ssl: true,
        verify_ssl: false,
        ..config()
    };
    let (connector, seen) = RecordingConnector::new(true);
    let mut conn = Connection::with_connector(cfg, connector);
    assert!(matches!(conn.start().await, Err(AmqpError::ServerDown(_))));

    let endpoint = seen.lock().unwrap().clone().unwrap();
    assert_eq!(endpoint.port, 5671);
    assert!(endpoint.tls);
    assert!(!endpoint.verify_peer);
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let (mut conn, _broker) = connected(config(), (0, 131_072, 0)).await;
    assert!(matches!(conn.start().await, Err(AmqpError::Usage(_))));
    assert!(conn.is_connected());
}

// ── Close ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_close_closes_channels_then_connection() {
    let (mut conn, mut broker) = connected(config(), (0, 131_072, 0)).await;

    let (closed, ()) = tokio::join!(conn.close(), broker.accept_close(&[1]));
    closed.unwrap();
    assert!(conn.status().is_disconnected());
    assert!(matches!(
        conn.send_heartbeat().await,
        Err(AmqpError::NotConnected)
    ));
}

#[tokio::test]
async fn test_forced_close_during_close_counts_as_success() {
    let (mut conn, mut broker) = connected(config(), (0, 131_072, 0)).await;

    let (closed, ()) = tokio::join!(conn.close(), async {
        broker.expect(MethodKind::ChannelClose).await;
        broker.send(1, MethodKind::ChannelCloseOk, []).await;
        broker.expect(MethodKind::ConnectionClose).await;
        broker
            .send(
                0,
                MethodKind::ConnectionClose,
                [("reply_code", FieldValue::from(320u16))],
            )
            .await;
    });
    closed.unwrap();
    assert!(conn.status().is_disconnected());
}

// ── Revisions ────────────────────────────────────────────────────

#[tokio::test]
async fn test_amqp_0_8_handshake_and_close() {
    let (mut conn, mut broker) =
        connected(config_for(ProtocolVersion::V0_8), (0, 131_072, 0)).await;
    assert!(conn.is_connected());

    let (closed, ()) = tokio::join!(conn.close(), async {
        broker.expect(MethodKind::ChannelClose).await;
        broker.send(1, MethodKind::ChannelCloseOk, []).await;
        let (_, close) = broker.expect(MethodKind::ConnectionClose).await;
        assert_eq!((close.class_id(), close.method_id()), (10, 60));
        broker.send(0, MethodKind::ConnectionCloseOk, []).await;
    });
    closed.unwrap();
}

// ── Heartbeat ────────────────────────────────────────────────────

#[tokio::test]
async fn test_idle_connection_sends_heartbeats() {
    let cfg = ClientConfig {
        heartbeat: 1,
        ..config()
    };
    let (conn, mut broker) = connected(cfg, (0, 131_072, 60)).await;
    assert_eq!(conn.tuning().heartbeat, 1);

    let frame = tokio::time::timeout(WAIT, broker.recv_raw()).await.unwrap();
    assert!(frame.is_heartbeat());
    assert_eq!(frame.channel(), 0);
}

#[tokio::test]
async fn test_disabled_heartbeat_ignores_broker_proposal() {
    let (mut conn, server) = pair(config());
    let spec = conn.spec();

    let (started, ()) = tokio::join!(conn.start(), async {
        let mut broker = Broker::accept(server, spec).await;
        broker.send(0, MethodKind::ConnectionStart, []).await;
        broker.expect(MethodKind::ConnectionStartOk).await;
        broker
            .send(
                0,
                MethodKind::ConnectionTune,
                [("heartbeat", FieldValue::from(60u16))],
            )
            .await;
        let (_, tune_ok) = broker.expect(MethodKind::ConnectionTuneOk).await;
        assert_eq!(tune_ok.u16("heartbeat").unwrap(), 0);
        broker.expect(MethodKind::ConnectionOpen).await;
        broker.send(0, MethodKind::ConnectionOpenOk, []).await;
        broker.open_channel_reply().await;
    });

    started.unwrap();
    assert_eq!(conn.tuning().heartbeat, 0);
    assert_eq!(conn.tuning().heartbeat_interval(), None);
}

#[tokio::test]
async fn test_inbound_heartbeats_are_not_surfaced() {
    let (mut conn, mut broker) = connected(config(), (0, 131_072, 0)).await;

    broker.send_frame(warren_core::Frame::heartbeat()).await;
    broker.send(1, MethodKind::BasicQosOk, []).await;

    let method = conn.next_method(Some(Duration::from_secs(1))).await.unwrap();
    assert!(method.is(MethodKind::BasicQosOk));
    assert!(conn.activity().take_inbound());
}
