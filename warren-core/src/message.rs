//! Messages handed to the application.
//!
//! Each type pairs the method that announced the message with its
//! reconstructed content.

use bytes::Bytes;

use crate::content::{BasicProperties, ContentHeader};
use crate::error::Result;
use crate::protocol::method::Method;

/// A message pushed to a consumer (Basic.Deliver).
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub consumer_tag: String,
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
    pub properties: BasicProperties,
    pub body: Bytes,
}

impl Delivery {
    pub(crate) fn new(deliver: &Method, header: ContentHeader, body: Bytes) -> Result<Self> {
        Ok(Self {
            consumer_tag: deliver.short_str("consumer_tag")?.to_string(),
            delivery_tag: deliver.u64("delivery_tag")?,
            redelivered: deliver.bool("redelivered")?,
            exchange: deliver.short_str("exchange")?.to_string(),
            routing_key: deliver.short_str("routing_key")?.to_string(),
            properties: header.properties,
            body,
        })
    }

    /// Body as UTF-8, if it is.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// A message fetched with Basic.Get.
#[derive(Debug, Clone, PartialEq)]
pub struct GetMessage {
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
    /// Messages left in the queue after this one.
    pub message_count: u32,
    pub properties: BasicProperties,
    pub body: Bytes,
}

impl GetMessage {
    pub(crate) fn new(get_ok: &Method, header: ContentHeader, body: Bytes) -> Result<Self> {
        Ok(Self {
            delivery_tag: get_ok.u64("delivery_tag")?,
            redelivered: get_ok.bool("redelivered")?,
            exchange: get_ok.short_str("exchange")?.to_string(),
            routing_key: get_ok.short_str("routing_key")?.to_string(),
            message_count: get_ok.u32("message_count")?,
            properties: header.properties,
            body,
        })
    }
}

/// A published message the broker could not route or deliver.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnedMessage {
    pub reply_code: u16,
    pub reply_text: String,
    pub exchange: String,
    pub routing_key: String,
    pub properties: BasicProperties,
    pub body: Bytes,
}

impl ReturnedMessage {
    pub(crate) fn new(ret: &Method, header: ContentHeader, body: Bytes) -> Result<Self> {
        let (reply_code, reply_text) = ret.reply();
        Ok(Self {
            reply_code,
            reply_text,
            exchange: ret.short_str("exchange")?.to_string(),
            routing_key: ret.short_str("routing_key")?.to_string(),
            properties: header.properties,
            body,
        })
    }
}

/// Outcome of waiting for a returned message.
#[derive(Debug, Clone, PartialEq)]
pub enum Returned {
    /// Nothing came back within the window.
    NoReturn,
    Message(ReturnedMessage),
}

impl Returned {
    pub fn is_returned(&self) -> bool {
        matches!(self, Returned::Message(_))
    }
}
