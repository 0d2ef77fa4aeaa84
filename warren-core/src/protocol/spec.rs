//! Static method catalogues for AMQP 0-8 and AMQP 0-9-1.
//!
//! Each revision is one [`ProtocolSpec`]: its protocol header, default
//! ports and the ordered argument schema of every method the client
//! sends or expects. Swapping tables is the only thing that changes
//! between revisions; the codec and transport are shared.
//!
//! Class ids (both revisions):
//!
//! ```text
//! connection 10   channel 20   exchange 40   queue 50   basic 60   tx 90
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::value::{Domain, FieldValue};
use crate::error::AmqpError;
use crate::protocol::method::MethodKind;

// ── Schema types ─────────────────────────────────────────────────

/// Default for an argument the caller omits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgDefault {
    /// The caller must supply the argument.
    Required,
    /// The domain's zero value (0, false, empty string or table).
    Zero,
    /// A specific integer (or bit, when non-zero means true).
    Int(u64),
    /// A specific string.
    Str(&'static str),
}

impl ArgDefault {
    /// Materialize the default for `domain`; `None` when required.
    pub fn value(self, domain: Domain) -> Option<FieldValue> {
        match self {
            ArgDefault::Required => None,
            ArgDefault::Zero => Some(domain.zero()),
            ArgDefault::Int(v) => Some(match domain {
                Domain::Octet => FieldValue::ShortShortUInt(v as u8),
                Domain::Short => FieldValue::ShortUInt(v as u16),
                Domain::Long => FieldValue::LongUInt(v as u32),
                Domain::LongLong => FieldValue::LongLongUInt(v),
                Domain::Timestamp => FieldValue::Timestamp(v),
                Domain::Bit => FieldValue::Boolean(v != 0),
                other => other.zero(),
            }),
            ArgDefault::Str(s) => Some(match domain {
                Domain::ShortStr => FieldValue::ShortString(s.to_string()),
                Domain::LongStr => FieldValue::long_string(s),
                other => other.zero(),
            }),
        }
    }
}

/// One argument of a method schema.
#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    pub domain: Domain,
    pub default: ArgDefault,
}

/// Schema of one class.method.
#[derive(Debug)]
pub struct MethodSpec {
    pub kind: MethodKind,
    pub class_id: u16,
    pub method_id: u16,
    pub name: &'static str,
    pub args: &'static [ArgSpec],
}

/// One protocol revision.
#[derive(Debug)]
pub struct ProtocolSpec {
    pub version: ProtocolVersion,
    /// Sent once when the socket opens.
    pub header: [u8; 8],
    pub port: u16,
    pub ssl_port: u16,
    pub methods: &'static [MethodSpec],
}

impl ProtocolSpec {
    pub fn find(&self, class_id: u16, method_id: u16) -> Option<&MethodSpec> {
        self.methods
            .iter()
            .find(|m| m.class_id == class_id && m.method_id == method_id)
    }

    pub fn find_kind(&self, kind: MethodKind) -> Option<&MethodSpec> {
        self.methods.iter().find(|m| m.kind == kind)
    }

    /// Lookup by dotted name, ignoring case and `_`/`-` differences.
    pub fn find_name(&self, name: &str) -> Option<&MethodSpec> {
        let wanted = name.to_ascii_lowercase().replace('_', "-");
        self.methods.iter().find(|m| m.name == wanted)
    }

    pub fn supports(&self, kind: MethodKind) -> bool {
        self.find_kind(kind).is_some()
    }

    pub fn default_port(&self, ssl: bool) -> u16 {
        if ssl { self.ssl_port } else { self.port }
    }
}

// ── ProtocolVersion ──────────────────────────────────────────────

/// Selects one of the built-in revision tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProtocolVersion {
    #[serde(rename = "0-8")]
    V0_8,
    #[default]
    #[serde(rename = "0-9-1")]
    V0_9_1,
}

impl ProtocolVersion {
    pub fn spec(self) -> &'static ProtocolSpec {
        match self {
            ProtocolVersion::V0_8 => &AMQP_0_8,
            ProtocolVersion::V0_9_1 => &AMQP_0_9_1,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::V0_8 => write!(f, "0-8"),
            ProtocolVersion::V0_9_1 => write!(f, "0-9-1"),
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = AmqpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0-8" | "08" | "0.8" => Ok(ProtocolVersion::V0_8),
            "0-9-1" | "091" | "09" | "0.9.1" => Ok(ProtocolVersion::V0_9_1),
            other => Err(AmqpError::Usage(format!("unknown protocol revision {other:?}"))),
        }
    }
}

// ── Table helpers ────────────────────────────────────────────────

const fn req(name: &'static str, domain: Domain) -> ArgSpec {
    ArgSpec {
        name,
        domain,
        default: ArgDefault::Required,
    }
}

const fn opt(name: &'static str, domain: Domain) -> ArgSpec {
    ArgSpec {
        name,
        domain,
        default: ArgDefault::Zero,
    }
}

const fn int(name: &'static str, domain: Domain, v: u64) -> ArgSpec {
    ArgSpec {
        name,
        domain,
        default: ArgDefault::Int(v),
    }
}

const fn text(name: &'static str, domain: Domain, s: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        domain,
        default: ArgDefault::Str(s),
    }
}

macro_rules! method {
    ($kind:ident, $class:expr, $method:expr, $name:expr, [$($arg:expr),* $(,)?]) => {
        MethodSpec {
            kind: MethodKind::$kind,
            class_id: $class,
            method_id: $method,
            name: $name,
            args: &[$($arg),*],
        }
    };
}

use Domain::{Bit, Long, LongLong, LongStr, Octet, Short, ShortStr, Table};

// Shared by both revisions.
const CLOSE_ARGS: [ArgSpec; 4] = [
    req("reply_code", Short),
    opt("reply_text", ShortStr),
    opt("class_id", Short),
    opt("method_id", Short),
];

// ── AMQP 0-9-1 ───────────────────────────────────────────────────

pub static AMQP_0_9_1: ProtocolSpec = ProtocolSpec {
    version: ProtocolVersion::V0_9_1,
    header: *b"AMQP\x00\x00\x09\x01",
    port: 5672,
    ssl_port: 5671,
    methods: &[
        method!(ConnectionStart, 10, 10, "connection.start", [
            int("version_major", Octet, 0),
            int("version_minor", Octet, 9),
            opt("server_properties", Table),
            text("mechanisms", LongStr, "PLAIN"),
            text("locales", LongStr, "en_US"),
        ]),
        method!(ConnectionStartOk, 10, 11, "connection.start-ok", [
            opt("client_properties", Table),
            text("mechanism", ShortStr, "PLAIN"),
            req("response", LongStr),
            text("locale", ShortStr, "en_US"),
        ]),
        method!(ConnectionSecure, 10, 20, "connection.secure", [req("challenge", LongStr)]),
        method!(ConnectionSecureOk, 10, 21, "connection.secure-ok", [req("response", LongStr)]),
        method!(ConnectionTune, 10, 30, "connection.tune", [
            opt("channel_max", Short),
            opt("frame_max", Long),
            opt("heartbeat", Short),
        ]),
        method!(ConnectionTuneOk, 10, 31, "connection.tune-ok", [
            opt("channel_max", Short),
            opt("frame_max", Long),
            opt("heartbeat", Short),
        ]),
        method!(ConnectionOpen, 10, 40, "connection.open", [
            text("virtual_host", ShortStr, "/"),
            opt("reserved_1", ShortStr),
            opt("reserved_2", Bit),
        ]),
        method!(ConnectionOpenOk, 10, 41, "connection.open-ok", [opt("reserved_1", ShortStr)]),
        MethodSpec {
            kind: MethodKind::ConnectionClose,
            class_id: 10,
            method_id: 50,
            name: "connection.close",
            args: &CLOSE_ARGS,
        },
        method!(ConnectionCloseOk, 10, 51, "connection.close-ok", []),
        method!(ChannelOpen, 20, 10, "channel.open", [opt("reserved_1", ShortStr)]),
        method!(ChannelOpenOk, 20, 11, "channel.open-ok", [opt("reserved_1", LongStr)]),
        method!(ChannelFlow, 20, 20, "channel.flow", [req("active", Bit)]),
        method!(ChannelFlowOk, 20, 21, "channel.flow-ok", [req("active", Bit)]),
        MethodSpec {
            kind: MethodKind::ChannelClose,
            class_id: 20,
            method_id: 40,
            name: "channel.close",
            args: &CLOSE_ARGS,
        },
        method!(ChannelCloseOk, 20, 41, "channel.close-ok", []),
        method!(ExchangeDeclare, 40, 10, "exchange.declare", [
            opt("reserved_1", Short),
            req("exchange", ShortStr),
            text("type", ShortStr, "direct"),
            opt("passive", Bit),
            opt("durable", Bit),
            opt("auto_delete", Bit),
            opt("internal", Bit),
            opt("nowait", Bit),
            opt("arguments", Table),
        ]),
        method!(ExchangeDeclareOk, 40, 11, "exchange.declare-ok", []),
        method!(ExchangeDelete, 40, 20, "exchange.delete", [
            opt("reserved_1", Short),
            req("exchange", ShortStr),
            opt("if_unused", Bit),
            opt("nowait", Bit),
        ]),
        method!(ExchangeDeleteOk, 40, 21, "exchange.delete-ok", []),
        method!(QueueDeclare, 50, 10, "queue.declare", [
            opt("reserved_1", Short),
            opt("queue", ShortStr),
            opt("passive", Bit),
            opt("durable", Bit),
            opt("exclusive", Bit),
            opt("auto_delete", Bit),
            opt("nowait", Bit),
            opt("arguments", Table),
        ]),
        method!(QueueDeclareOk, 50, 11, "queue.declare-ok", [
            req("queue", ShortStr),
            opt("message_count", Long),
            opt("consumer_count", Long),
        ]),
        method!(QueueBind, 50, 20, "queue.bind", [
            opt("reserved_1", Short),
            req("queue", ShortStr),
            req("exchange", ShortStr),
            opt("routing_key", ShortStr),
            opt("nowait", Bit),
            opt("arguments", Table),
        ]),
        method!(QueueBindOk, 50, 21, "queue.bind-ok", []),
        method!(QueuePurge, 50, 30, "queue.purge", [
            opt("reserved_1", Short),
            req("queue", ShortStr),
            opt("nowait", Bit),
        ]),
        method!(QueuePurgeOk, 50, 31, "queue.purge-ok", [opt("message_count", Long)]),
        method!(QueueDelete, 50, 40, "queue.delete", [
            opt("reserved_1", Short),
            req("queue", ShortStr),
            opt("if_unused", Bit),
            opt("if_empty", Bit),
            opt("nowait", Bit),
        ]),
        method!(QueueDeleteOk, 50, 41, "queue.delete-ok", [opt("message_count", Long)]),
        method!(QueueUnbind, 50, 50, "queue.unbind", [
            opt("reserved_1", Short),
            req("queue", ShortStr),
            req("exchange", ShortStr),
            opt("routing_key", ShortStr),
            opt("arguments", Table),
        ]),
        method!(QueueUnbindOk, 50, 51, "queue.unbind-ok", []),
        method!(BasicQos, 60, 10, "basic.qos", [
            opt("prefetch_size", Long),
            int("prefetch_count", Short, 1),
            opt("global", Bit),
        ]),
        method!(BasicQosOk, 60, 11, "basic.qos-ok", []),
        method!(BasicConsume, 60, 20, "basic.consume", [
            opt("reserved_1", Short),
            req("queue", ShortStr),
            opt("consumer_tag", ShortStr),
            opt("no_local", Bit),
            opt("no_ack", Bit),
            opt("exclusive", Bit),
            opt("nowait", Bit),
            opt("arguments", Table),
        ]),
        method!(BasicConsumeOk, 60, 21, "basic.consume-ok", [req("consumer_tag", ShortStr)]),
        method!(BasicCancel, 60, 30, "basic.cancel", [
            req("consumer_tag", ShortStr),
            opt("nowait", Bit),
        ]),
        method!(BasicCancelOk, 60, 31, "basic.cancel-ok", [req("consumer_tag", ShortStr)]),
        method!(BasicPublish, 60, 40, "basic.publish", [
            opt("reserved_1", Short),
            opt("exchange", ShortStr),
            opt("routing_key", ShortStr),
            opt("mandatory", Bit),
            opt("immediate", Bit),
        ]),
        method!(BasicReturn, 60, 50, "basic.return", [
            req("reply_code", Short),
            opt("reply_text", ShortStr),
            opt("exchange", ShortStr),
            opt("routing_key", ShortStr),
        ]),
        method!(BasicDeliver, 60, 60, "basic.deliver", [
            req("consumer_tag", ShortStr),
            req("delivery_tag", LongLong),
            opt("redelivered", Bit),
            opt("exchange", ShortStr),
            opt("routing_key", ShortStr),
        ]),
        method!(BasicGet, 60, 70, "basic.get", [
            opt("reserved_1", Short),
            req("queue", ShortStr),
            opt("no_ack", Bit),
        ]),
        method!(BasicGetOk, 60, 71, "basic.get-ok", [
            req("delivery_tag", LongLong),
            opt("redelivered", Bit),
            opt("exchange", ShortStr),
            opt("routing_key", ShortStr),
            opt("message_count", Long),
        ]),
        method!(BasicGetEmpty, 60, 72, "basic.get-empty", [opt("reserved_1", ShortStr)]),
        method!(BasicAck, 60, 80, "basic.ack", [
            req("delivery_tag", LongLong),
            opt("multiple", Bit),
        ]),
        method!(BasicReject, 60, 90, "basic.reject", [
            req("delivery_tag", LongLong),
            int("requeue", Bit, 1),
        ]),
        method!(BasicRecover, 60, 110, "basic.recover", [opt("requeue", Bit)]),
        method!(BasicRecoverOk, 60, 111, "basic.recover-ok", []),
        method!(TxSelect, 90, 10, "tx.select", []),
        method!(TxSelectOk, 90, 11, "tx.select-ok", []),
        method!(TxCommit, 90, 20, "tx.commit", []),
        method!(TxCommitOk, 90, 21, "tx.commit-ok", []),
        method!(TxRollback, 90, 30, "tx.rollback", []),
        method!(TxRollbackOk, 90, 31, "tx.rollback-ok", []),
    ],
};

// ── AMQP 0-8 ─────────────────────────────────────────────────────

pub static AMQP_0_8: ProtocolSpec = ProtocolSpec {
    version: ProtocolVersion::V0_8,
    header: *b"AMQP\x01\x01\x08\x00",
    port: 5672,
    ssl_port: 5671,
    methods: &[
        method!(ConnectionStart, 10, 10, "connection.start", [
            int("version_major", Octet, 8),
            int("version_minor", Octet, 0),
            opt("server_properties", Table),
            text("mechanisms", LongStr, "PLAIN"),
            text("locales", LongStr, "en_US"),
        ]),
        method!(ConnectionStartOk, 10, 11, "connection.start-ok", [
            opt("client_properties", Table),
            text("mechanism", ShortStr, "PLAIN"),
            req("response", LongStr),
            text("locale", ShortStr, "en_US"),
        ]),
        method!(ConnectionSecure, 10, 20, "connection.secure", [req("challenge", LongStr)]),
        method!(ConnectionSecureOk, 10, 21, "connection.secure-ok", [req("response", LongStr)]),
        method!(ConnectionTune, 10, 30, "connection.tune", [
            opt("channel_max", Short),
            opt("frame_max", Long),
            opt("heartbeat", Short),
        ]),
        method!(ConnectionTuneOk, 10, 31, "connection.tune-ok", [
            opt("channel_max", Short),
            opt("frame_max", Long),
            opt("heartbeat", Short),
        ]),
        method!(ConnectionOpen, 10, 40, "connection.open", [
            text("virtual_host", ShortStr, "/"),
            opt("capabilities", ShortStr),
            opt("insist", Bit),
        ]),
        method!(ConnectionOpenOk, 10, 41, "connection.open-ok", [opt("known_hosts", ShortStr)]),
        method!(ConnectionRedirect, 10, 50, "connection.redirect", [
            req("host", ShortStr),
            opt("known_hosts", ShortStr),
        ]),
        MethodSpec {
            kind: MethodKind::ConnectionClose,
            class_id: 10,
            method_id: 60,
            name: "connection.close",
            args: &CLOSE_ARGS,
        },
        method!(ConnectionCloseOk, 10, 61, "connection.close-ok", []),
        method!(ChannelOpen, 20, 10, "channel.open", [opt("out_of_band", ShortStr)]),
        method!(ChannelOpenOk, 20, 11, "channel.open-ok", []),
        method!(ChannelFlow, 20, 20, "channel.flow", [req("active", Bit)]),
        method!(ChannelFlowOk, 20, 21, "channel.flow-ok", [req("active", Bit)]),
        MethodSpec {
            kind: MethodKind::ChannelClose,
            class_id: 20,
            method_id: 40,
            name: "channel.close",
            args: &CLOSE_ARGS,
        },
        method!(ChannelCloseOk, 20, 41, "channel.close-ok", []),
        method!(ExchangeDeclare, 40, 10, "exchange.declare", [
            int("ticket", Short, 1),
            req("exchange", ShortStr),
            text("type", ShortStr, "direct"),
            opt("passive", Bit),
            opt("durable", Bit),
            opt("auto_delete", Bit),
            opt("internal", Bit),
            opt("nowait", Bit),
            opt("arguments", Table),
        ]),
        method!(ExchangeDeclareOk, 40, 11, "exchange.declare-ok", []),
        method!(ExchangeDelete, 40, 20, "exchange.delete", [
            int("ticket", Short, 1),
            req("exchange", ShortStr),
            opt("if_unused", Bit),
            opt("nowait", Bit),
        ]),
        method!(ExchangeDeleteOk, 40, 21, "exchange.delete-ok", []),
        method!(QueueDeclare, 50, 10, "queue.declare", [
            int("ticket", Short, 1),
            opt("queue", ShortStr),
            opt("passive", Bit),
            opt("durable", Bit),
            opt("exclusive", Bit),
            opt("auto_delete", Bit),
            opt("nowait", Bit),
            opt("arguments", Table),
        ]),
        method!(QueueDeclareOk, 50, 11, "queue.declare-ok", [
            req("queue", ShortStr),
            opt("message_count", Long),
            opt("consumer_count", Long),
        ]),
        method!(QueueBind, 50, 20, "queue.bind", [
            int("ticket", Short, 1),
            req("queue", ShortStr),
            req("exchange", ShortStr),
            opt("routing_key", ShortStr),
            opt("nowait", Bit),
            opt("arguments", Table),
        ]),
        method!(QueueBindOk, 50, 21, "queue.bind-ok", []),
        method!(QueuePurge, 50, 30, "queue.purge", [
            int("ticket", Short, 1),
            req("queue", ShortStr),
            opt("nowait", Bit),
        ]),
        method!(QueuePurgeOk, 50, 31, "queue.purge-ok", [opt("message_count", Long)]),
        method!(QueueDelete, 50, 40, "queue.delete", [
            int("ticket", Short, 1),
            req("queue", ShortStr),
            opt("if_unused", Bit),
            opt("if_empty", Bit),
            opt("nowait", Bit),
        ]),
        method!(QueueDeleteOk, 50, 41, "queue.delete-ok", [opt("message_count", Long)]),
        method!(BasicQos, 60, 10, "basic.qos", [
            opt("prefetch_size", Long),
            int("prefetch_count", Short, 1),
            opt("global", Bit),
        ]),
        method!(BasicQosOk, 60, 11, "basic.qos-ok", []),
        method!(BasicConsume, 60, 20, "basic.consume", [
            int("ticket", Short, 1),
            req("queue", ShortStr),
            opt("consumer_tag", ShortStr),
            opt("no_local", Bit),
            opt("no_ack", Bit),
            opt("exclusive", Bit),
            opt("nowait", Bit),
        ]),
        method!(BasicConsumeOk, 60, 21, "basic.consume-ok", [req("consumer_tag", ShortStr)]),
        method!(BasicCancel, 60, 30, "basic.cancel", [
            req("consumer_tag", ShortStr),
            opt("nowait", Bit),
        ]),
        method!(BasicCancelOk, 60, 31, "basic.cancel-ok", [req("consumer_tag", ShortStr)]),
        method!(BasicPublish, 60, 40, "basic.publish", [
            int("ticket", Short, 1),
            opt("exchange", ShortStr),
            opt("routing_key", ShortStr),
            opt("mandatory", Bit),
            opt("immediate", Bit),
        ]),
        method!(BasicReturn, 60, 50, "basic.return", [
            req("reply_code", Short),
            opt("reply_text", ShortStr),
            opt("exchange", ShortStr),
            opt("routing_key", ShortStr),
        ]),
        method!(BasicDeliver, 60, 60, "basic.deliver", [
            req("consumer_tag", ShortStr),
            req("delivery_tag", LongLong),
            opt("redelivered", Bit),
            opt("exchange", ShortStr),
            opt("routing_key", ShortStr),
        ]),
        method!(BasicGet, 60, 70, "basic.get", [
            int("ticket", Short, 1),
            req("queue", ShortStr),
            opt("no_ack", Bit),
        ]),
        method!(BasicGetOk, 60, 71, "basic.get-ok", [
            req("delivery_tag", LongLong),
            opt("redelivered", Bit),
            opt("exchange", ShortStr),
            opt("routing_key", ShortStr),
            opt("message_count", Long),
        ]),
        method!(BasicGetEmpty, 60, 72, "basic.get-empty", [opt("cluster_id", ShortStr)]),
        method!(BasicAck, 60, 80, "basic.ack", [
            req("delivery_tag", LongLong),
            opt("multiple", Bit),
        ]),
        method!(BasicReject, 60, 90, "basic.reject", [
            req("delivery_tag", LongLong),
            int("requeue", Bit, 1),
        ]),
        method!(BasicRecover, 60, 100, "basic.recover", [opt("requeue", Bit)]),
        method!(TxSelect, 90, 10, "tx.select", []),
        method!(TxSelectOk, 90, 11, "tx.select-ok", []),
        method!(TxCommit, 90, 20, "tx.commit", []),
        method!(TxCommitOk, 90, 21, "tx.commit-ok", []),
        method!(TxRollback, 90, 30, "tx.rollback", []),
        method!(TxRollbackOk, 90, 31, "tx.rollback-ok", []),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_per_revision() {
        for spec in [&AMQP_0_8, &AMQP_0_9_1] {
            for (i, a) in spec.methods.iter().enumerate() {
                for b in &spec.methods[i + 1..] {
                    assert!(
                        (a.class_id, a.method_id) != (b.class_id, b.method_id),
                        "{} and {} share ids in {}",
                        a.name,
                        b.name,
                        spec.version
                    );
                    assert_ne!(a.kind, b.kind);
                }
            }
        }
    }

    #[test]
    fn table_names_match_kinds() {
        for spec in [&AMQP_0_8, &AMQP_0_9_1] {
            for m in spec.methods {
                assert_eq!(m.name, m.kind.name());
            }
        }
    }

    #[test]
    fn lookup_by_name_is_lenient() {
        let spec = ProtocolVersion::V0_9_1.spec();
        let m = spec.find_name("Basic.Consume_Ok").unwrap();
        assert_eq!((m.class_id, m.method_id), (60, 21));
    }

    #[test]
    fn headers_and_ports() {
        assert_eq!(&AMQP_0_9_1.header, b"AMQP\x00\x00\x09\x01");
        assert_eq!(&AMQP_0_8.header[..4], b"AMQP");
        assert_eq!(AMQP_0_8.default_port(false), 5672);
        assert_eq!(AMQP_0_8.default_port(true), 5671);
    }

    #[test]
    fn recover_differs_between_revisions() {
        assert!(AMQP_0_9_1.supports(MethodKind::BasicRecoverOk));
        assert!(!AMQP_0_8.supports(MethodKind::BasicRecoverOk));
        assert_eq!(AMQP_0_8.find_kind(MethodKind::BasicRecover).unwrap().method_id, 100);
        assert_eq!(AMQP_0_9_1.find_kind(MethodKind::BasicRecover).unwrap().method_id, 110);
    }

    #[test]
    fn version_parses_and_serializes() {
        assert_eq!("0-8".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::V0_8);
        assert!("1-0".parse::<ProtocolVersion>().is_err());
        assert_eq!(ProtocolVersion::default().to_string(), "0-9-1");
    }
}
