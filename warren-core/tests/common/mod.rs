//! Scripted broker over an in-memory duplex pipe.
//!
//! The client side gets a `DuplexConnector`; the test drives the other
//! end of the pipe with `Broker`, frame by frame.

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio_util::codec::Framed;

use warren_core::protocol::spec::ProtocolSpec;
use warren_core::{
    AmqpCodec, BasicProperties, ClientConfig, Connection, Connector, ContentHeader, Endpoint,
    FieldTable, FieldValue, Frame, FramePayload, Method, MethodKind, ProtocolVersion,
};

pub const WAIT: Duration = Duration::from_secs(5);

// ── Connector ────────────────────────────────────────────────────

/// Hands out one end of a duplex pipe, once.
pub struct DuplexConnector {
    stream: Mutex<Option<DuplexStream>>,
}

#[async_trait]
impl Connector for DuplexConnector {
    type Stream = DuplexStream;

    async fn connect(&self, _endpoint: &Endpoint) -> io::Result<DuplexStream> {
        self.stream
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "pipe already used"))
    }
}

/// Always refuses.
pub struct RefusingConnector;

#[async_trait]
impl Connector for RefusingConnector {
    type Stream = DuplexStream;

    async fn connect(&self, _endpoint: &Endpoint) -> io::Result<DuplexStream> {
        Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
    }
}

/// Refuses too, after recording the endpoint it was asked for.
pub struct RecordingConnector {
    tls: bool,
    seen: Arc<Mutex<Option<Endpoint>>>,
}

impl RecordingConnector {
    /// The connector plus a handle on the endpoint it will record.
    pub fn new(tls: bool) -> (Self, Arc<Mutex<Option<Endpoint>>>) {
        let seen = Arc::new(Mutex::new(None));
        (
            Self {
                tls,
                seen: seen.clone(),
            },
            seen,
        )
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    type Stream = DuplexStream;

    async fn connect(&self, endpoint: &Endpoint) -> io::Result<DuplexStream> {
        *self.seen.lock().unwrap() = Some(endpoint.clone());
        Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
    }

    fn is_tls(&self) -> bool {
        self.tls
    }
}

/// A client connection and the broker end of its pipe, not yet started.
pub fn pair(config: ClientConfig) -> (Connection<DuplexConnector>, DuplexStream) {
    let (client, server) = tokio::io::duplex(256 * 1024);
    let connector = DuplexConnector {
        stream: Mutex::new(Some(client)),
    };
    (Connection::with_connector(config, connector), server)
}

/// Start the client against a broker that completes the handshake.
pub async fn connected(
    config: ClientConfig,
    tune: (u16, u32, u16),
) -> (Connection<DuplexConnector>, Broker) {
    let spec = config.spec.spec();
    let (mut conn, server) = pair(config);
    let (started, broker) = tokio::join!(conn.start(), async {
        let mut broker = Broker::accept(server, spec).await;
        broker.handshake(tune).await;
        broker
    });
    started.unwrap();
    (conn, broker)
}

// ── Broker ───────────────────────────────────────────────────────

pub struct Broker {
    framed: Framed<DuplexStream, AmqpCodec>,
    spec: &'static ProtocolSpec,
}

impl Broker {
    /// Read and check the protocol header, then switch to frames.
    pub async fn accept(mut stream: DuplexStream, spec: &'static ProtocolSpec) -> Self {
        let mut header = [0u8; 8];
        stream.read_exact(&mut header).await.unwrap();
        assert_eq!(header, spec.header, "protocol header");
        Self {
            framed: Framed::new(stream, AmqpCodec::new(spec)),
            spec,
        }
    }

    pub fn method<'a, I>(&self, kind: MethodKind, args: I) -> Method
    where
        I: IntoIterator<Item = (&'a str, FieldValue)>,
    {
        Method::build(self.spec, kind, args).unwrap()
    }

    pub async fn send_frame(&mut self, frame: Frame) {
        self.framed.send(frame).await.unwrap();
    }

    pub async fn send<'a, I>(&mut self, channel: u16, kind: MethodKind, args: I)
    where
        I: IntoIterator<Item = (&'a str, FieldValue)>,
    {
        let method = self.method(kind, args);
        self.send_frame(method.to_frame(channel)).await;
    }

    /// Header plus body frames no larger than `frame_max`.
    pub async fn send_content(&mut self, channel: u16, body: &[u8], frame_max: u32) {
        let body = Bytes::copy_from_slice(body);
        let header = ContentHeader::new(body.len() as u64, BasicProperties::default());
        self.send_frame(Frame::header(channel, header)).await;
        for frame in Frame::body_frames(channel, &body, frame_max) {
            self.send_frame(frame).await;
        }
    }

    pub async fn deliver(&mut self, channel: u16, consumer_tag: &str, delivery_tag: u64, body: &[u8]) {
        self.send(
            channel,
            MethodKind::BasicDeliver,
            [
                ("consumer_tag", FieldValue::from(consumer_tag)),
                ("delivery_tag", FieldValue::from(delivery_tag)),
                ("exchange", FieldValue::from("")),
                ("routing_key", FieldValue::from("jobs")),
            ],
        )
        .await;
        self.send_content(channel, body, 0).await;
    }

    /// Next non-heartbeat frame from the client.
    pub async fn recv(&mut self) -> Frame {
        loop {
            let frame = tokio::time::timeout(WAIT, self.framed.next())
                .await
                .expect("timed out waiting for client frame")
                .expect("client hung up")
                .unwrap();
            if !frame.is_heartbeat() {
                return frame;
            }
        }
    }

    /// Next raw frame, heartbeats included.
    pub async fn recv_raw(&mut self) -> Frame {
        tokio::time::timeout(WAIT, self.framed.next())
            .await
            .expect("timed out waiting for client frame")
            .expect("client hung up")
            .unwrap()
    }

    /// Next method, which must be `kind`; returns it with its channel.
    pub async fn expect(&mut self, kind: MethodKind) -> (u16, Method) {
        let frame = self.recv().await;
        let channel = frame.channel();
        match frame.into_payload() {
            FramePayload::Method(m) => {
                assert_eq!(m.kind(), kind, "unexpected method {m}");
                (channel, m)
            }
            other => panic!("expected {kind}, got {other:?}"),
        }
    }

    /// Start → Tune → Open-Ok, then open channel 1.
    pub async fn handshake(&mut self, (channel_max, frame_max, heartbeat): (u16, u32, u16)) {
        self.send(
            0,
            MethodKind::ConnectionStart,
            [(
                "server_properties",
                FieldValue::from(FieldTable::new().with("product", FieldValue::long_string("mock"))),
            )],
        )
        .await;
        self.expect(MethodKind::ConnectionStartOk).await;
        self.send(
            0,
            MethodKind::ConnectionTune,
            [
                ("channel_max", FieldValue::from(channel_max)),
                ("frame_max", FieldValue::from(frame_max)),
                ("heartbeat", FieldValue::from(heartbeat)),
            ],
        )
        .await;
        self.expect(MethodKind::ConnectionTuneOk).await;
        self.expect(MethodKind::ConnectionOpen).await;
        self.send(0, MethodKind::ConnectionOpenOk, []).await;
        self.open_channel_reply().await;
    }

    /// Answer one Channel.Open.
    pub async fn open_channel_reply(&mut self) -> u16 {
        let (channel, _) = self.expect(MethodKind::ChannelOpen).await;
        self.send(channel, MethodKind::ChannelOpenOk, []).await;
        channel
    }

    /// Answer Channel.Close for each of `channels`, then Connection.Close.
    pub async fn accept_close(&mut self, channels: &[u16]) {
        for expected in channels {
            let (channel, _) = self.expect(MethodKind::ChannelClose).await;
            assert_eq!(channel, *expected);
            self.send(channel, MethodKind::ChannelCloseOk, []).await;
        }
        let (channel, close) = self.expect(MethodKind::ConnectionClose).await;
        assert_eq!(channel, 0);
        assert_eq!(close.u16("reply_code").unwrap(), 200);
        self.send(0, MethodKind::ConnectionCloseOk, []).await;
    }
}

pub fn config() -> ClientConfig {
    ClientConfig::default()
}

pub fn config_for(spec: ProtocolVersion) -> ClientConfig {
    ClientConfig {
        spec,
        ..ClientConfig::default()
    }
}
