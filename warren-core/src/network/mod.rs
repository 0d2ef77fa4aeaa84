//! Transport, connection state machine and channel-level operations.

pub mod connection;
pub mod connector;
pub mod operations;

pub use connection::Connection;
pub use connector::{Connector, Endpoint, TcpConnector};
pub use operations::{
    ExchangeKind, ExchangeOptions, PublishOptions, QueueDeclared, QueueOptions, Qos,
    RETURN_TIMEOUT,
};
