//! Protocol methods: a closed set of kinds plus typed, ordered arguments.
//!
//! A [`Method`] is built from a [`MethodKind`] and an argument list that
//! is checked against the active revision's schema, or decoded from a
//! method-frame payload by looking up the class/method ids. Ids the
//! revision does not define decode to [`MethodKind::Unknown`] so that the
//! caller fails with a protocol error instead of the codec.

use std::fmt;

use crate::codec::buffer::Buffer;
use crate::codec::value::{Domain, FieldTable, FieldValue};
use crate::error::{AmqpError, Result};
use crate::frame::Frame;
use crate::protocol::spec::{MethodSpec, ProtocolSpec};

// ── MethodKind ───────────────────────────────────────────────────

/// Every method this client knows, across both revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    ConnectionStart,
    ConnectionStartOk,
    ConnectionSecure,
    ConnectionSecureOk,
    ConnectionTune,
    ConnectionTuneOk,
    ConnectionOpen,
    ConnectionOpenOk,
    ConnectionRedirect,
    ConnectionClose,
    ConnectionCloseOk,

    ChannelOpen,
    ChannelOpenOk,
    ChannelFlow,
    ChannelFlowOk,
    ChannelClose,
    ChannelCloseOk,

    ExchangeDeclare,
    ExchangeDeclareOk,
    ExchangeDelete,
    ExchangeDeleteOk,

    QueueDeclare,
    QueueDeclareOk,
    QueueBind,
    QueueBindOk,
    QueuePurge,
    QueuePurgeOk,
    QueueDelete,
    QueueDeleteOk,
    QueueUnbind,
    QueueUnbindOk,

    BasicQos,
    BasicQosOk,
    BasicConsume,
    BasicConsumeOk,
    BasicCancel,
    BasicCancelOk,
    BasicPublish,
    BasicReturn,
    BasicDeliver,
    BasicGet,
    BasicGetOk,
    BasicGetEmpty,
    BasicAck,
    BasicReject,
    BasicRecover,
    BasicRecoverOk,

    TxSelect,
    TxSelectOk,
    TxCommit,
    TxCommitOk,
    TxRollback,
    TxRollbackOk,

    /// Ids not present in the active revision's table.
    Unknown,
}

impl MethodKind {
    /// Dotted lower-case name, e.g. `basic.consume`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectionStart => "connection.start",
            Self::ConnectionStartOk => "connection.start-ok",
            Self::ConnectionSecure => "connection.secure",
            Self::ConnectionSecureOk => "connection.secure-ok",
            Self::ConnectionTune => "connection.tune",
            Self::ConnectionTuneOk => "connection.tune-ok",
            Self::ConnectionOpen => "connection.open",
            Self::ConnectionOpenOk => "connection.open-ok",
            Self::ConnectionRedirect => "connection.redirect",
            Self::ConnectionClose => "connection.close",
            Self::ConnectionCloseOk => "connection.close-ok",
            Self::ChannelOpen => "channel.open",
            Self::ChannelOpenOk => "channel.open-ok",
            Self::ChannelFlow => "channel.flow",
            Self::ChannelFlowOk => "channel.flow-ok",
            Self::ChannelClose => "channel.close",
            Self::ChannelCloseOk => "channel.close-ok",
            Self::ExchangeDeclare => "exchange.declare",
            Self::ExchangeDeclareOk => "exchange.declare-ok",
            Self::ExchangeDelete => "exchange.delete",
            Self::ExchangeDeleteOk => "exchange.delete-ok",
            Self::QueueDeclare => "queue.declare",
            Self::QueueDeclareOk => "queue.declare-ok",
            Self::QueueBind => "queue.bind",
            Self::QueueBindOk => "queue.bind-ok",
            Self::QueuePurge => "queue.purge",
            Self::QueuePurgeOk => "queue.purge-ok",
            Self::QueueDelete => "queue.delete",
            Self::QueueDeleteOk => "queue.delete-ok",
            Self::QueueUnbind => "queue.unbind",
            Self::QueueUnbindOk => "queue.unbind-ok",
            Self::BasicQos => "basic.qos",
            Self::BasicQosOk => "basic.qos-ok",
            Self::BasicConsume => "basic.consume",
            Self::BasicConsumeOk => "basic.consume-ok",
            Self::BasicCancel => "basic.cancel",
            Self::BasicCancelOk => "basic.cancel-ok",
            Self::BasicPublish => "basic.publish",
            Self::BasicReturn => "basic.return",
            Self::BasicDeliver => "basic.deliver",
            Self::BasicGet => "basic.get",
            Self::BasicGetOk => "basic.get-ok",
            Self::BasicGetEmpty => "basic.get-empty",
            Self::BasicAck => "basic.ack",
            Self::BasicReject => "basic.reject",
            Self::BasicRecover => "basic.recover",
            Self::BasicRecoverOk => "basic.recover-ok",
            Self::TxSelect => "tx.select",
            Self::TxSelectOk => "tx.select-ok",
            Self::TxCommit => "tx.commit",
            Self::TxCommitOk => "tx.commit-ok",
            Self::TxRollback => "tx.rollback",
            Self::TxRollbackOk => "tx.rollback-ok",
            Self::Unknown => "unknown",
        }
    }

    /// Methods followed by a content header and body frames.
    pub fn carries_content(&self) -> bool {
        matches!(
            self,
            Self::BasicPublish | Self::BasicReturn | Self::BasicDeliver | Self::BasicGetOk
        )
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Method ───────────────────────────────────────────────────────

/// One named, typed argument in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: &'static str,
    pub domain: Domain,
    pub value: FieldValue,
}

/// A decoded or constructed protocol method.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    kind: MethodKind,
    class_id: u16,
    method_id: u16,
    args: Vec<Argument>,
}

impl Method {
    /// Build `kind` for the given revision.
    ///
    /// Omitted arguments take their schema default; an omitted argument
    /// without a default, a name outside the schema, or a value of the
    /// wrong type is rejected.
    pub fn build<'a, I>(spec: &ProtocolSpec, kind: MethodKind, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, FieldValue)>,
    {
        let schema = spec
            .find_kind(kind)
            .ok_or_else(|| AmqpError::UnsupportedMethod(kind.name().to_string()))?;
        Self::from_schema(schema, args)
    }

    /// Build by dotted name, e.g. `"queue.declare"`.
    pub fn build_named<'a, I>(spec: &ProtocolSpec, name: &str, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, FieldValue)>,
    {
        let schema = spec
            .find_name(name)
            .ok_or_else(|| AmqpError::UnsupportedMethod(name.to_string()))?;
        Self::from_schema(schema, args)
    }

    fn from_schema<'a, I>(schema: &MethodSpec, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, FieldValue)>,
    {
        let mut supplied: Vec<(&str, FieldValue)> = args.into_iter().collect();
        let mut out = Vec::with_capacity(schema.args.len());

        for arg in schema.args {
            let value = match supplied.iter().position(|(name, _)| *name == arg.name) {
                Some(idx) => supplied.swap_remove(idx).1,
                None => arg
                    .default
                    .value(arg.domain)
                    .ok_or_else(|| AmqpError::MissingArgument {
                        method: schema.name,
                        argument: arg.name.to_string(),
                    })?,
            };
            if !arg.domain.accepts(&value) {
                return Err(AmqpError::InvalidType(format!(
                    "{}.{}: expected {}, got {}",
                    schema.name,
                    arg.name,
                    arg.domain,
                    value.kind()
                )));
            }
            out.push(Argument {
                name: arg.name,
                domain: arg.domain,
                value,
            });
        }

        if let Some((name, _)) = supplied.first() {
            return Err(AmqpError::UnexpectedArgument {
                method: schema.name,
                argument: name.to_string(),
            });
        }

        Ok(Self {
            kind: schema.kind,
            class_id: schema.class_id,
            method_id: schema.method_id,
            args: out,
        })
    }

    /// Decode a method-frame payload.
    pub fn decode(spec: &ProtocolSpec, buf: &mut Buffer) -> Result<Self> {
        let class_id = buf.read_short()?;
        let method_id = buf.read_short()?;

        let Some(schema) = spec.find(class_id, method_id) else {
            tracing::debug!(class_id, method_id, "method not in {} table", spec.version);
            buf.read_rest();
            return Ok(Self {
                kind: MethodKind::Unknown,
                class_id,
                method_id,
                args: Vec::new(),
            });
        };

        let mut args = Vec::with_capacity(schema.args.len());
        for arg in schema.args {
            args.push(Argument {
                name: arg.name,
                domain: arg.domain,
                value: buf.read(arg.domain)?,
            });
        }
        Ok(Self {
            kind: schema.kind,
            class_id,
            method_id,
            args,
        })
    }

    /// Encode as a method-frame payload.
    pub fn encode(&self, buf: &mut Buffer) -> Result<()> {
        buf.write_short(self.class_id);
        buf.write_short(self.method_id);
        for arg in &self.args {
            buf.write(&arg.value, arg.domain)?;
        }
        Ok(())
    }

    /// Wrap in a method frame addressed to `channel`.
    pub fn to_frame(self, channel: u16) -> Frame {
        Frame::method(channel, self)
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    pub fn is(&self, kind: MethodKind) -> bool {
        self.kind == kind
    }

    pub fn class_id(&self) -> u16 {
        self.class_id
    }

    pub fn method_id(&self) -> u16 {
        self.method_id
    }

    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.args.iter().find(|a| a.name == name).map(|a| &a.value)
    }

    // ── Typed accessors ──────────────────────────────────────────

    fn missing(&self, name: &str, want: &str) -> AmqpError {
        AmqpError::Protocol(format!("{} has no {want} argument `{name}`", self.kind))
    }

    pub fn short_str(&self, name: &str) -> Result<&str> {
        match self.get(name) {
            Some(FieldValue::ShortString(s)) => Ok(s),
            _ => Err(self.missing(name, "shortstr")),
        }
    }

    pub fn long_str(&self, name: &str) -> Result<&[u8]> {
        match self.get(name) {
            Some(FieldValue::LongString(b)) => Ok(b),
            _ => Err(self.missing(name, "longstr")),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool> {
        self.get(name)
            .and_then(FieldValue::as_bool)
            .ok_or_else(|| self.missing(name, "bit"))
    }

    pub fn u16(&self, name: &str) -> Result<u16> {
        match self.get(name) {
            Some(FieldValue::ShortUInt(v)) => Ok(*v),
            _ => Err(self.missing(name, "short")),
        }
    }

    pub fn u32(&self, name: &str) -> Result<u32> {
        match self.get(name) {
            Some(FieldValue::LongUInt(v)) => Ok(*v),
            _ => Err(self.missing(name, "long")),
        }
    }

    pub fn u64(&self, name: &str) -> Result<u64> {
        match self.get(name) {
            Some(FieldValue::LongLongUInt(v)) => Ok(*v),
            _ => Err(self.missing(name, "longlong")),
        }
    }

    pub fn table(&self, name: &str) -> Result<&FieldTable> {
        self.get(name)
            .and_then(FieldValue::as_table)
            .ok_or_else(|| self.missing(name, "table"))
    }

    /// `reply_code` / `reply_text` of a close or return method.
    pub fn reply(&self) -> (u16, String) {
        let code = self.u16("reply_code").unwrap_or(0);
        let text = self.short_str("reply_text").unwrap_or_default().to_string();
        (code, text)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MethodKind::Unknown => write!(f, "unknown({}/{})", self.class_id, self.method_id),
            kind => write!(f, "{kind}"),
        }
    }
}
