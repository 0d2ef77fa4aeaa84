//! A single broker connection.
//!
//! `Connection` owns the socket and the channel table. Every operation
//! takes `&mut self`, so at most one read is outstanding at a time and the
//! caller decides which channel replies are read for. The write half sits
//! behind an async mutex because the heartbeat task shares it; a message's
//! frames are written under one lock so they reach the wire contiguously.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::channel::ChannelTable;
use crate::codec::AmqpCodec;
use crate::codec::value::FieldValue;
use crate::config::ClientConfig;
use crate::content::ContentHeader;
use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::error::{AmqpError, Result};
use crate::frame::{Frame, FramePayload};
use crate::network::connector::{Connector, TcpConnector};
use crate::protocol::method::{Method, MethodKind};
use crate::protocol::spec::ProtocolSpec;
use crate::state::{Activity, ConnectionPhase, Tuning};

type SharedWriter<S> = Arc<Mutex<FramedWrite<WriteHalf<S>, AmqpCodec>>>;

/// Upper bound on the body buffer reserved from a header's announced
/// size; larger bodies grow as their frames arrive.
const BODY_PREALLOC_MAX: usize = 1 << 20;

/// Open socket halves plus the heartbeat task writing into one of them.
struct Io<S> {
    reader: FramedRead<ReadHalf<S>, AmqpCodec>,
    writer: SharedWriter<S>,
    heartbeat: Option<JoinHandle<()>>,
}

impl<S> Drop for Io<S> {
    fn drop(&mut self) {
        if let Some(task) = self.heartbeat.take() {
            task.abort();
        }
    }
}

/// A connection to one broker.
pub struct Connection<C: Connector = TcpConnector> {
    config: ClientConfig,
    spec: &'static ProtocolSpec,
    connector: C,
    diagnostics: Arc<dyn Diagnostics>,
    phase: ConnectionPhase,
    tuning: Tuning,
    pub(crate) channels: ChannelTable,
    activity: Activity,
    io: Option<Io<C::Stream>>,
}

impl<C: Connector> std::fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.config.host)
            .field("port", &self.config.port())
            .field("spec", &self.spec.version)
            .field("phase", &self.phase)
            .field("tuning", &self.tuning)
            .field("channel", &self.channels.current())
            .finish_non_exhaustive()
    }
}

impl Connection<TcpConnector> {
    /// Plain TCP connection; call [`start`](Self::start) to connect.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: Connector> Connection<C> {
    pub fn with_connector(config: ClientConfig, connector: C) -> Self {
        let spec = config.spec.spec();
        Self {
            config,
            spec,
            connector,
            diagnostics: Arc::new(TracingDiagnostics),
            phase: ConnectionPhase::default(),
            tuning: Tuning::default(),
            channels: ChannelTable::new(),
            activity: Activity::new(),
            io: None,
        }
    }

    /// Replace the frame observer.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn spec(&self) -> &'static ProtocolSpec {
        self.spec
    }

    pub fn status(&self) -> &ConnectionPhase {
        &self.phase
    }

    pub fn is_connected(&self) -> bool {
        self.phase.is_connected()
    }

    /// Parameters agreed during the handshake.
    pub fn tuning(&self) -> Tuning {
        self.tuning
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Connect, run the handshake and open the first channel.
    pub async fn start(&mut self) -> Result<()> {
        if self.config.ssl && !self.connector.is_tls() {
            return Err(AmqpError::Usage(
                "ssl requested but the connector does not provide TLS".into(),
            ));
        }
        self.phase.begin_connect()?;

        let endpoint = self.config.endpoint();
        let limit = self.config.connect_timeout();
        debug!(%endpoint, tls = endpoint.tls, spec = %self.spec.version, "connecting");

        let stream = match tokio::time::timeout(limit, self.connector.connect(&endpoint)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.phase.finish_close()?;
                return Err(AmqpError::ServerDown(format!("{endpoint}: {e}")));
            }
            Err(_) => {
                self.phase.finish_close()?;
                return Err(AmqpError::ConnectTimeout(limit));
            }
        };

        self.phase.begin_handshake()?;
        if let Err(e) = self.handshake(stream).await {
            self.teardown();
            return Err(e);
        }
        info!(%endpoint, vhost = %self.config.vhost, "connected");
        Ok(())
    }

    async fn handshake(&mut self, mut stream: C::Stream) -> Result<()> {
        stream.write_all(&self.spec.header).await?;
        stream.flush().await?;

        let (read, write) = tokio::io::split(stream);
        let codec = AmqpCodec::new(self.spec);
        self.io = Some(Io {
            reader: FramedRead::new(read, codec),
            writer: Arc::new(Mutex::new(FramedWrite::new(write, codec))),
            heartbeat: None,
        });

        self.expect(MethodKind::ConnectionStart, "connection initiation failed")
            .await?;

        let start_ok = self.method(
            MethodKind::ConnectionStartOk,
            [
                (
                    "client_properties",
                    FieldValue::from(self.config.client_properties()),
                ),
                ("mechanism", FieldValue::from("PLAIN")),
                ("response", self.config.plain_response()),
                ("locale", FieldValue::from("en_US")),
            ],
        )?;
        self.send(start_ok).await?;

        let mut reply = self.next_method(None).await?;
        if reply.is(MethodKind::ConnectionSecure) {
            let secure_ok = self.method(
                MethodKind::ConnectionSecureOk,
                [("response", self.config.plain_response())],
            )?;
            self.send(secure_ok).await?;
            reply = self.next_method(None).await?;
        }
        if reply.is(MethodKind::ConnectionTune) {
            self.tune(&reply).await?;
        } else if let Some(forced) = self.forced_close(&reply).await? {
            return Err(forced);
        } else {
            // some brokers skip Tune; keep our own limits and carry on
            warn!(got = %reply, "no Connection.Tune from broker; using client tuning");
            let own = self.config.tuning();
            self.apply_tuning(own).await?;
        }

        let open = self.method(
            MethodKind::ConnectionOpen,
            [("virtual_host", FieldValue::from(self.config.vhost.as_str()))],
        )?;
        self.call(open, MethodKind::ConnectionOpenOk, "cannot open connection")
            .await?;

        // channel 0 is reserved for connection control
        self.open_channel().await?;
        self.phase.complete_handshake()
    }

    async fn tune(&mut self, tune: &Method) -> Result<()> {
        let broker = Tuning::new(
            tune.u16("channel_max")?,
            tune.u32("frame_max")?,
            tune.u16("heartbeat")?,
        );
        let agreed = self.config.tuning().negotiate(&broker);
        debug!(?broker, ?agreed, "tuning negotiated");

        let tune_ok = self.method(
            MethodKind::ConnectionTuneOk,
            [
                ("channel_max", FieldValue::from(agreed.channel_max)),
                ("frame_max", FieldValue::from(agreed.frame_max)),
                ("heartbeat", FieldValue::from(agreed.heartbeat)),
            ],
        )?;
        self.send(tune_ok).await?;
        self.apply_tuning(agreed).await
    }

    /// Adopt `agreed` on both codecs and start heartbeats if enabled.
    async fn apply_tuning(&mut self, agreed: Tuning) -> Result<()> {
        self.tuning = agreed;
        let io = self.io.as_mut().ok_or(AmqpError::NotConnected)?;
        io.reader.decoder_mut().set_frame_max(agreed.frame_max);
        io.writer.lock().await.encoder_mut().set_frame_max(agreed.frame_max);

        if let Some(interval) = agreed.heartbeat_interval() {
            io.heartbeat = Some(spawn_heartbeat(
                io.writer.clone(),
                self.activity.clone(),
                self.diagnostics.clone(),
                interval,
            ));
        }
        Ok(())
    }

    /// Close every open channel, then the connection.
    ///
    /// A broker-initiated close received while closing counts as success.
    pub async fn close(&mut self) -> Result<()> {
        if self.io.is_none() {
            self.phase.force_disconnect();
            return Ok(());
        }

        for number in self.channels.open_channels() {
            match self.close_channel(number).await {
                Ok(()) | Err(AmqpError::ForcedChannelClose { .. }) => {}
                Err(AmqpError::ForcedConnectionClose { .. }) => return Ok(()),
                Err(e) => {
                    self.teardown();
                    return Err(e);
                }
            }
        }

        self.channels.select(0)?;
        self.phase.begin_close()?;
        let close = self.method(
            MethodKind::ConnectionClose,
            [
                ("reply_code", FieldValue::from(200u16)),
                ("reply_text", FieldValue::from("Goodbye")),
                ("class_id", FieldValue::from(0u16)),
                ("method_id", FieldValue::from(0u16)),
            ],
        )?;
        let result = match self
            .call(close, MethodKind::ConnectionCloseOk, "error closing connection")
            .await
        {
            Ok(_) | Err(AmqpError::ForcedConnectionClose { .. }) => Ok(()),
            Err(e) => Err(e),
        };
        self.teardown();
        info!(host = %self.config.host, "connection closed");
        result
    }

    /// Alias for [`close`](Self::close).
    pub async fn stop(&mut self) -> Result<()> {
        self.close().await
    }

    /// Drop the socket and forget all channels.
    pub(crate) fn teardown(&mut self) {
        self.io = None;
        self.channels.reset();
        self.phase.force_disconnect();
    }

    // ── Channels ─────────────────────────────────────────────────

    /// Reserve a channel number without opening it.
    pub fn create_channel(&mut self) -> Result<u16> {
        self.channels.allocate(self.tuning.channel_max)
    }

    /// Allocate, select and open a channel.
    pub async fn open_channel(&mut self) -> Result<u16> {
        let number = self.create_channel()?;
        self.channels.select(number)?;
        let open = self.method(MethodKind::ChannelOpen, [])?;
        self.call(
            open,
            MethodKind::ChannelOpenOk,
            &format!("cannot open channel {number}"),
        )
        .await?;
        self.channels.set_open(number, true)?;
        debug!(channel = number, "channel opened");
        Ok(number)
    }

    /// Select and close a channel; the slot becomes reusable.
    ///
    /// Deliveries and other traffic still arriving on the channel before
    /// Close-Ok are discarded.
    pub async fn close_channel(&mut self, number: u16) -> Result<()> {
        self.channels.select(number)?;
        let close = self.method(
            MethodKind::ChannelClose,
            [
                ("reply_code", FieldValue::from(200u16)),
                ("reply_text", FieldValue::from("bye")),
            ],
        )?;
        self.send(close).await?;

        let context = format!("error closing channel {number}");
        loop {
            let frame = self.next_frame(None).await?;
            match frame.into_payload() {
                FramePayload::Method(method)
                    if method.is(MethodKind::ChannelCloseOk)
                        || method.is(MethodKind::ChannelClose)
                        || method.is(MethodKind::ConnectionClose) =>
                {
                    self.check_response(method, MethodKind::ChannelCloseOk, &context)
                        .await?;
                    break;
                }
                other => {
                    debug!(channel = number, "discarding {} while closing", payload_name(&other))
                }
            }
        }
        self.channels.set_open(number, false)?;
        debug!(channel = number, "channel closed");
        Ok(())
    }

    /// Select the channel subsequent operations use.
    pub fn switch_channel(&mut self, number: u16) -> Result<u16> {
        self.channels.select(number)?;
        Ok(number)
    }

    pub fn active_channel(&self) -> u16 {
        self.channels.current()
    }

    pub fn channel_is_open(&self, number: u16) -> bool {
        self.channels.get(number).is_some_and(|c| c.is_open())
    }

    // ── Writing ──────────────────────────────────────────────────

    pub(crate) fn method<'a, I>(&self, kind: MethodKind, args: I) -> Result<Method>
    where
        I: IntoIterator<Item = (&'a str, FieldValue)>,
    {
        Method::build(self.spec, kind, args)
    }

    /// Send a method on the active channel.
    pub async fn send(&mut self, method: Method) -> Result<()> {
        let channel = self.channels.current();
        self.write_frames(vec![method.to_frame(channel)]).await
    }

    /// Send a heartbeat on channel 0.
    pub async fn send_heartbeat(&mut self) -> Result<()> {
        self.write_frames(vec![Frame::heartbeat()]).await
    }

    /// Write frames back to back under one lock.
    pub(crate) async fn write_frames(&mut self, frames: Vec<Frame>) -> Result<()> {
        let writer = self
            .io
            .as_ref()
            .ok_or(AmqpError::NotConnected)?
            .writer
            .clone();

        let result = async {
            let mut sink = writer.lock().await;
            for frame in frames {
                self.diagnostics.frame_sent(&frame);
                sink.feed(frame).await?;
            }
            sink.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                self.activity.mark_outbound();
                Ok(())
            }
            Err(e) => {
                if e.is_connection_fatal() {
                    warn!(error = %e, "write failed; dropping connection");
                    self.teardown();
                }
                Err(e)
            }
        }
    }

    /// Send a method and wait for its reply on the same channel.
    pub(crate) async fn call(
        &mut self,
        request: Method,
        expected: MethodKind,
        context: &str,
    ) -> Result<Method> {
        self.send(request).await?;
        self.expect(expected, context).await
    }

    // ── Reading ──────────────────────────────────────────────────

    /// Next frame for the active channel (or channel 0).
    ///
    /// Frames parked for the active channel are returned first. Frames
    /// for other open channels are parked; frames for unknown or closed
    /// channels and heartbeats are dropped. With
    /// `timeout`, the whole wait is bounded and ends in `ClientTimeout`.
    pub async fn next_frame(&mut self, timeout: Option<Duration>) -> Result<Frame> {
        if let Some(frame) = self.channels.pop_current() {
            return Ok(frame);
        }
        let deadline = timeout.map(|t| (Instant::now() + t, t));

        loop {
            let io = self.io.as_mut().ok_or(AmqpError::NotConnected)?;
            let read = match deadline {
                Some((at, window)) => tokio::time::timeout_at(at, io.reader.next())
                    .await
                    .map_err(|_| AmqpError::ClientTimeout(window))?,
                None => io.reader.next().await,
            };

            let frame = match read {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    warn!(error = %e, "read failed; dropping connection");
                    self.teardown();
                    return Err(e);
                }
                None => {
                    self.teardown();
                    return Err(AmqpError::ServerDown("connection closed by broker".into()));
                }
            };

            self.activity.mark_inbound();
            self.diagnostics.frame_received(&frame);

            if frame.is_heartbeat() {
                continue;
            }
            let channel = frame.channel();
            if channel == 0 || channel == self.channels.current() {
                return Ok(frame);
            }
            if !self.channels.park(frame) {
                warn!(channel, "dropping frame for unknown or closed channel");
            }
        }
    }

    /// Next frame, which must carry a method.
    pub async fn next_method(&mut self, timeout: Option<Duration>) -> Result<Method> {
        let frame = self.next_frame(timeout).await?;
        match frame.into_payload() {
            FramePayload::Method(method) => Ok(method),
            other => Err(AmqpError::Protocol(format!(
                "expected a method frame, got {}",
                payload_name(&other)
            ))),
        }
    }

    /// Read a content header and the body frames it announces.
    ///
    /// A broker close arriving instead of content is acknowledged and
    /// returned as the matching forced-close error.
    pub(crate) async fn read_content(&mut self) -> Result<(ContentHeader, Bytes)> {
        let header = match self.next_frame(None).await?.into_payload() {
            FramePayload::Header(header) => header,
            other => return Err(self.unexpected_in_content("header", other).await),
        };

        let size = usize::try_from(header.body_size).map_err(|_| {
            AmqpError::Protocol(format!("body of {} bytes cannot be held", header.body_size))
        })?;
        let mut body = BytesMut::with_capacity(size.min(BODY_PREALLOC_MAX));
        while body.len() < size {
            match self.next_frame(None).await?.into_payload() {
                FramePayload::Body(chunk) => body.extend_from_slice(&chunk),
                other => return Err(self.unexpected_in_content("body", other).await),
            }
        }
        if body.len() > size {
            return Err(AmqpError::Protocol(format!(
                "content body is {} bytes, header announced {size}",
                body.len()
            )));
        }
        Ok((header, body.freeze()))
    }

    async fn unexpected_in_content(&mut self, wanted: &str, got: FramePayload) -> AmqpError {
        if let FramePayload::Method(method) = &got {
            match self.forced_close(method).await {
                Ok(Some(forced)) => return forced,
                Ok(None) => {}
                Err(e) => return e,
            }
        }
        AmqpError::Protocol(format!(
            "expected a content {wanted}, got {}",
            payload_name(&got)
        ))
    }

    /// Read the next method and check it is `expected`.
    pub(crate) async fn expect(&mut self, expected: MethodKind, context: &str) -> Result<Method> {
        let method = self.next_method(None).await?;
        self.check_response(method, expected, context).await
    }

    /// Classify a reply.
    ///
    /// A Connection.Close tears the connection down; a Channel.Close
    /// closes only the active channel. Both are acknowledged before the
    /// error is returned.
    pub async fn check_response(
        &mut self,
        method: Method,
        expected: MethodKind,
        context: &str,
    ) -> Result<Method> {
        if method.is(expected) {
            return Ok(method);
        }
        match self.forced_close(&method).await? {
            Some(forced) => Err(forced),
            None => Err(AmqpError::Protocol(format!(
                "{context}: expected {expected}, got {method}"
            ))),
        }
    }

    /// Acknowledge a broker-initiated close.
    ///
    /// Returns the error to surface for Connection.Close or Channel.Close,
    /// and `None` for any other method.
    async fn forced_close(&mut self, method: &Method) -> Result<Option<AmqpError>> {
        match method.kind() {
            MethodKind::ConnectionClose => {
                let (reply_code, reply_text) = method.reply();
                warn!(reply_code, %reply_text, "connection closed by broker");
                if let Ok(close_ok) = self.method(MethodKind::ConnectionCloseOk, []) {
                    let _ = self.write_frames(vec![close_ok.to_frame(0)]).await;
                }
                self.teardown();
                Ok(Some(AmqpError::ForcedConnectionClose {
                    reply_code,
                    reply_text,
                }))
            }
            MethodKind::ChannelClose => {
                let channel = self.channels.current();
                let (reply_code, reply_text) = method.reply();
                warn!(channel, reply_code, %reply_text, "channel closed by broker");
                if let Ok(close_ok) = self.method(MethodKind::ChannelCloseOk, []) {
                    let _ = self.send(close_ok).await;
                }
                if self.io.is_some() {
                    self.channels.set_open(channel, false)?;
                }
                Ok(Some(AmqpError::ForcedChannelClose {
                    channel,
                    reply_code,
                    reply_text,
                }))
            }
            _ => Ok(None),
        }
    }
}

fn payload_name(payload: &FramePayload) -> &'static str {
    match payload {
        FramePayload::Method(_) => "method frame",
        FramePayload::Header(_) => "content header",
        FramePayload::Body(_) => "content body",
        FramePayload::Heartbeat => "heartbeat",
    }
}

/// Send a heartbeat every `interval` in which nothing else was written.
fn spawn_heartbeat<S>(
    writer: SharedWriter<S>,
    activity: Activity,
    diagnostics: Arc<dyn Diagnostics>,
    interval: Duration,
) -> JoinHandle<()>
where
    S: tokio::io::AsyncWrite + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if activity.take_outbound() {
                continue;
            }
            let frame = Frame::heartbeat();
            diagnostics.frame_sent(&frame);
            if let Err(e) = writer.lock().await.send(frame).await {
                debug!(error = %e, "heartbeat stopped");
                break;
            }
        }
    })
}
