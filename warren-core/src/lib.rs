//! # warren-core
//!
//! AMQP 0-8 / 0-9-1 client library.
//!
//! This crate contains:
//! - **Codec**: `Buffer`, `FieldValue`, `FieldTable` and `AmqpCodec` for framed I/O via `tokio_util`
//! - **Frames**: `Frame`, content headers and `BasicProperties`
//! - **Protocol**: `Method` / `MethodKind` built against per-revision method tables
//! - **Network**: `Connection` with handshake, channel multiplexing and heartbeat
//! - **Subscription**: the consumer loop with ack and termination policy
//! - **Error**: `AmqpError`, a typed, `thiserror`-based error hierarchy

pub mod channel;
pub mod codec;
pub mod config;
pub mod content;
pub mod diagnostics;
pub mod error;
pub mod frame;
pub mod message;
pub mod network;
pub mod protocol;
pub mod state;
pub mod subscription;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::AmqpCodec;
pub use codec::value::{FieldTable, FieldValue};
pub use config::ClientConfig;
pub use content::{BasicProperties, ContentHeader};
pub use diagnostics::{Diagnostics, NoDiagnostics, TracingDiagnostics};
pub use error::{AmqpError, Result};
pub use frame::{Frame, FramePayload, FrameType};
pub use message::{Delivery, GetMessage, Returned, ReturnedMessage};
pub use network::{
    Connection, Connector, Endpoint, ExchangeKind, ExchangeOptions, PublishOptions, QueueDeclared,
    QueueOptions, Qos, TcpConnector,
};
pub use protocol::{Method, MethodKind, ProtocolVersion};
pub use state::{ConnectionPhase, Tuning};
pub use subscription::{HandlerError, SubscribeOptions, Subscription, SubscriptionEnd};
