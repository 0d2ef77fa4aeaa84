//! Client settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::value::{FieldTable, FieldValue};
use crate::network::connector::Endpoint;
use crate::protocol::spec::ProtocolVersion;
use crate::state::Tuning;

/// Everything needed to open and tune one broker connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Broker host name or address.
    pub host: String,
    /// Broker port. Defaults to the revision's port (or SSL port).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Virtual host to open.
    pub vhost: String,
    pub user: String,
    pub pass: String,
    /// Require a TLS-capable connector.
    pub ssl: bool,
    /// Check the broker certificate on TLS connections.
    pub verify_ssl: bool,
    /// Largest frame the client will accept, in bytes (0 = no limit).
    pub frame_max: u32,
    /// Highest channel number the client will use (0 = no limit).
    pub channel_max: u16,
    /// Heartbeat interval in seconds (0 = disabled).
    pub heartbeat: u16,
    pub connect_timeout_ms: u64,
    /// Protocol revision: "0-8" or "0-9-1".
    pub spec: ProtocolVersion,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: None,
            vhost: "/".into(),
            user: "guest".into(),
            pass: "guest".into(),
            ssl: false,
            verify_ssl: true,
            frame_max: 131_072,
            channel_max: 0,
            heartbeat: 0,
            connect_timeout_ms: 5_000,
            spec: ProtocolVersion::default(),
        }
    }
}

impl ClientConfig {
    pub fn port(&self) -> u16 {
        self.port
            .unwrap_or_else(|| self.spec.spec().default_port(self.ssl))
    }

    /// Target handed to the connector.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.host.clone(),
            port: self.port(),
            tls: self.ssl,
            verify_peer: self.verify_ssl,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Tuning the client proposes before hearing from the broker.
    pub fn tuning(&self) -> Tuning {
        Tuning::new(self.channel_max, self.frame_max, self.heartbeat)
    }

    /// SASL PLAIN response: `\0user\0pass`.
    pub fn plain_response(&self) -> FieldValue {
        FieldValue::long_string(format!("\0{}\0{}", self.user, self.pass))
    }

    /// Client identification sent in Start-Ok.
    pub fn client_properties(&self) -> FieldTable {
        FieldTable::new()
            .with("platform", FieldValue::long_string("Rust"))
            .with("product", FieldValue::long_string("warren"))
            .with("version", FieldValue::long_string(env!("CARGO_PKG_VERSION")))
            .with("information", FieldValue::long_string("AMQP client"))
    }
}
