//! Content headers and Basic message properties.
//!
//! A content header follows every content-carrying method (publish,
//! deliver, get-ok, return) and announces the total body size. Present
//! properties are flagged in a 16-bit mask and encoded in flag order.

use bitflags::bitflags;

use crate::codec::buffer::Buffer;
use crate::codec::value::FieldTable;
use crate::error::Result;

/// Class id of the `basic` class, the only content class used here.
pub const BASIC_CLASS_ID: u16 = 60;

bitflags! {
    /// Presence mask for [`BasicProperties`], most significant bit first.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyFlags: u16 {
        const CONTENT_TYPE     = 1 << 15;
        const CONTENT_ENCODING = 1 << 14;
        const HEADERS          = 1 << 13;
        const DELIVERY_MODE    = 1 << 12;
        const PRIORITY         = 1 << 11;
        const CORRELATION_ID   = 1 << 10;
        const REPLY_TO         = 1 << 9;
        const EXPIRATION       = 1 << 8;
        const MESSAGE_ID       = 1 << 7;
        const TIMESTAMP        = 1 << 6;
        const TYPE             = 1 << 5;
        const USER_ID          = 1 << 4;
        const APP_ID           = 1 << 3;
        const CLUSTER_ID       = 1 << 2;
    }
}

// ── BasicProperties ──────────────────────────────────────────────

/// Message properties carried in the content header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicProperties {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub headers: Option<FieldTable>,
    /// 1 = transient, 2 = persistent.
    pub delivery_mode: Option<u8>,
    pub priority: Option<u8>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    pub expiration: Option<String>,
    pub message_id: Option<String>,
    pub timestamp: Option<u64>,
    pub kind: Option<String>,
    pub user_id: Option<String>,
    pub app_id: Option<String>,
    pub cluster_id: Option<String>,
}

impl BasicProperties {
    /// Persistent, as understood by brokers that honour delivery mode.
    pub fn persistent(mut self) -> Self {
        self.delivery_mode = Some(2);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_headers(mut self, headers: FieldTable) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn flags(&self) -> PropertyFlags {
        let mut flags = PropertyFlags::empty();
        flags.set(PropertyFlags::CONTENT_TYPE, self.content_type.is_some());
        flags.set(PropertyFlags::CONTENT_ENCODING, self.content_encoding.is_some());
        flags.set(PropertyFlags::HEADERS, self.headers.is_some());
        flags.set(PropertyFlags::DELIVERY_MODE, self.delivery_mode.is_some());
        flags.set(PropertyFlags::PRIORITY, self.priority.is_some());
        flags.set(PropertyFlags::CORRELATION_ID, self.correlation_id.is_some());
        flags.set(PropertyFlags::REPLY_TO, self.reply_to.is_some());
        flags.set(PropertyFlags::EXPIRATION, self.expiration.is_some());
        flags.set(PropertyFlags::MESSAGE_ID, self.message_id.is_some());
        flags.set(PropertyFlags::TIMESTAMP, self.timestamp.is_some());
        flags.set(PropertyFlags::TYPE, self.kind.is_some());
        flags.set(PropertyFlags::USER_ID, self.user_id.is_some());
        flags.set(PropertyFlags::APP_ID, self.app_id.is_some());
        flags.set(PropertyFlags::CLUSTER_ID, self.cluster_id.is_some());
        flags
    }

    fn encode(&self, buf: &mut Buffer) -> Result<()> {
        buf.write_short(self.flags().bits());
        write_opt_str(buf, &self.content_type)?;
        write_opt_str(buf, &self.content_encoding)?;
        if let Some(headers) = &self.headers {
            buf.write_table(headers)?;
        }
        if let Some(v) = self.delivery_mode {
            buf.write_octet(v);
        }
        if let Some(v) = self.priority {
            buf.write_octet(v);
        }
        write_opt_str(buf, &self.correlation_id)?;
        write_opt_str(buf, &self.reply_to)?;
        write_opt_str(buf, &self.expiration)?;
        write_opt_str(buf, &self.message_id)?;
        if let Some(v) = self.timestamp {
            buf.write_timestamp(v);
        }
        write_opt_str(buf, &self.kind)?;
        write_opt_str(buf, &self.user_id)?;
        write_opt_str(buf, &self.app_id)?;
        write_opt_str(buf, &self.cluster_id)?;
        Ok(())
    }

    fn decode(buf: &mut Buffer) -> Result<Self> {
        // Unknown low bits are ignored; the continuation bit is never set
        // by brokers for the basic class.
        let flags = PropertyFlags::from_bits_truncate(buf.read_short()?);
        let str_if = |buf: &mut Buffer, flag: PropertyFlags| -> Result<Option<String>> {
            if flags.contains(flag) {
                Ok(Some(buf.read_shortstr()?))
            } else {
                Ok(None)
            }
        };

        let content_type = str_if(buf, PropertyFlags::CONTENT_TYPE)?;
        let content_encoding = str_if(buf, PropertyFlags::CONTENT_ENCODING)?;
        let headers = if flags.contains(PropertyFlags::HEADERS) {
            Some(buf.read_table()?)
        } else {
            None
        };
        let delivery_mode = if flags.contains(PropertyFlags::DELIVERY_MODE) {
            Some(buf.read_octet()?)
        } else {
            None
        };
        let priority = if flags.contains(PropertyFlags::PRIORITY) {
            Some(buf.read_octet()?)
        } else {
            None
        };
        let correlation_id = str_if(buf, PropertyFlags::CORRELATION_ID)?;
        let reply_to = str_if(buf, PropertyFlags::REPLY_TO)?;
        let expiration = str_if(buf, PropertyFlags::EXPIRATION)?;
        let message_id = str_if(buf, PropertyFlags::MESSAGE_ID)?;
        let timestamp = if flags.contains(PropertyFlags::TIMESTAMP) {
            Some(buf.read_timestamp()?)
        } else {
            None
        };
        let kind = str_if(buf, PropertyFlags::TYPE)?;
        let user_id = str_if(buf, PropertyFlags::USER_ID)?;
        let app_id = str_if(buf, PropertyFlags::APP_ID)?;
        let cluster_id = str_if(buf, PropertyFlags::CLUSTER_ID)?;

        Ok(Self {
            content_type,
            content_encoding,
            headers,
            delivery_mode,
            priority,
            correlation_id,
            reply_to,
            expiration,
            message_id,
            timestamp,
            kind,
            user_id,
            app_id,
            cluster_id,
        })
    }
}

fn write_opt_str(buf: &mut Buffer, value: &Option<String>) -> Result<()> {
    match value {
        Some(s) => buf.write_shortstr(s),
        None => Ok(()),
    }
}

// ── ContentHeader ────────────────────────────────────────────────

/// Payload of a content-header frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentHeader {
    pub class_id: u16,
    pub weight: u16,
    pub body_size: u64,
    pub properties: BasicProperties,
}

impl ContentHeader {
    pub fn new(body_size: u64, properties: BasicProperties) -> Self {
        Self {
            class_id: BASIC_CLASS_ID,
            weight: 0,
            body_size,
            properties,
        }
    }

    pub fn encode(&self, buf: &mut Buffer) -> Result<()> {
        buf.write_short(self.class_id);
        buf.write_short(self.weight);
        buf.write_longlong(self.body_size);
        self.properties.encode(buf)
    }

    pub fn decode(buf: &mut Buffer) -> Result<Self> {
        let class_id = buf.read_short()?;
        let weight = buf.read_short()?;
        let body_size = buf.read_longlong()?;
        let properties = BasicProperties::decode(buf)?;
        Ok(Self {
            class_id,
            weight,
            body_size,
            properties,
        })
    }
}
