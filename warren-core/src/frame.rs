//! Wire frames.
//!
//! ## Layout
//!
//! ```text
//! ┌──────┬─────────┬──────────┬─────────────────┬──────┐
//! │ type │ channel │ size     │ payload         │ 0xCE │
//! │ u8   │ u16 BE  │ u32 BE   │ `size` bytes    │ u8   │
//! └──────┴─────────┴──────────┴─────────────────┴──────┘
//! ```
//!
//! A message travels as one method frame, one content-header frame and
//! zero or more content-body frames. Splitting a body into frames is done
//! here; joining them back is the reader's job.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::buffer::Buffer;
use crate::content::ContentHeader;
use crate::error::{AmqpError, Result};
use crate::protocol::method::Method;
use crate::protocol::spec::ProtocolSpec;

/// Octet that terminates every frame.
pub const FRAME_END: u8 = 0xCE;

/// Bytes a frame adds around its payload (type, channel, size, end).
pub const FRAME_OVERHEAD: usize = 1 + 2 + 4 + 1;

/// Frame size assumed before tuning: the protocol minimum.
pub const FRAME_MIN_SIZE: u32 = 4096;

const PREFIX_LEN: usize = 1 + 2 + 4;

// ── FrameType ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    Method = 1,
    Header = 2,
    Body = 3,
    Heartbeat = 8,
}

impl TryFrom<u8> for FrameType {
    type Error = AmqpError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(FrameType::Method),
            2 => Ok(FrameType::Header),
            3 => Ok(FrameType::Body),
            8 => Ok(FrameType::Heartbeat),
            other => Err(AmqpError::UnknownFrameType(other)),
        }
    }
}

// ── Frame ────────────────────────────────────────────────────────

/// Decoded frame payload.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    Method(Method),
    Header(ContentHeader),
    Body(Bytes),
    Heartbeat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    channel: u16,
    payload: FramePayload,
}

impl Frame {
    pub fn method(channel: u16, method: Method) -> Self {
        Self {
            channel,
            payload: FramePayload::Method(method),
        }
    }

    pub fn header(channel: u16, header: ContentHeader) -> Self {
        Self {
            channel,
            payload: FramePayload::Header(header),
        }
    }

    pub fn body(channel: u16, body: Bytes) -> Self {
        Self {
            channel,
            payload: FramePayload::Body(body),
        }
    }

    /// Heartbeats always travel on channel 0.
    pub fn heartbeat() -> Self {
        Self {
            channel: 0,
            payload: FramePayload::Heartbeat,
        }
    }

    pub fn channel(&self) -> u16 {
        self.channel
    }

    pub fn frame_type(&self) -> FrameType {
        match self.payload {
            FramePayload::Method(_) => FrameType::Method,
            FramePayload::Header(_) => FrameType::Header,
            FramePayload::Body(_) => FrameType::Body,
            FramePayload::Heartbeat => FrameType::Heartbeat,
        }
    }

    pub fn payload(&self) -> &FramePayload {
        &self.payload
    }

    pub fn into_payload(self) -> FramePayload {
        self.payload
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self.payload, FramePayload::Heartbeat)
    }

    pub fn as_method(&self) -> Option<&Method> {
        match &self.payload {
            FramePayload::Method(m) => Some(m),
            _ => None,
        }
    }

    /// Frames for one message body, each at most `frame_max` bytes on the
    /// wire. `frame_max == 0` means unlimited. An empty body yields no
    /// frames.
    pub fn body_frames(channel: u16, body: &Bytes, frame_max: u32) -> Vec<Frame> {
        let chunk = match frame_max as usize {
            0 => body.len().max(1),
            max => max.saturating_sub(FRAME_OVERHEAD).max(1),
        };
        let mut frames = Vec::with_capacity(body.len().div_ceil(chunk));
        let mut offset = 0;
        while offset < body.len() {
            let end = (offset + chunk).min(body.len());
            frames.push(Frame::body(channel, body.slice(offset..end)));
            offset = end;
        }
        frames
    }

    // ── Wire format ──────────────────────────────────────────────

    fn encode_payload(&self) -> Result<Bytes> {
        match &self.payload {
            FramePayload::Method(m) => {
                let mut buf = Buffer::new();
                m.encode(&mut buf)?;
                Ok(buf.into_bytes())
            }
            FramePayload::Header(h) => {
                let mut buf = Buffer::new();
                h.encode(&mut buf)?;
                Ok(buf.into_bytes())
            }
            FramePayload::Body(b) => Ok(b.clone()),
            FramePayload::Heartbeat => Ok(Bytes::new()),
        }
    }

    /// Append the full wire encoding to `dst`.
    pub fn serialize(&self, dst: &mut BytesMut) -> Result<()> {
        let payload = self.encode_payload()?;
        let size = u32::try_from(payload.len()).map_err(|_| AmqpError::FrameTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        })?;
        dst.reserve(payload.len() + FRAME_OVERHEAD);
        dst.put_u8(self.frame_type() as u8);
        dst.put_u16(self.channel);
        dst.put_u32(size);
        dst.put_slice(&payload);
        dst.put_u8(FRAME_END);
        Ok(())
    }

    /// Parse one frame from the front of `src`.
    ///
    /// Returns `Ok(None)` and leaves `src` untouched while the frame is
    /// incomplete. `frame_max` bounds the whole frame; 0 disables the
    /// check.
    pub fn parse(spec: &ProtocolSpec, src: &mut BytesMut, frame_max: u32) -> Result<Option<Frame>> {
        if src.len() < PREFIX_LEN {
            return Ok(None);
        }
        let kind = FrameType::try_from(src[0])?;
        let channel = u16::from_be_bytes([src[1], src[2]]);
        let size = u32::from_be_bytes([src[3], src[4], src[5], src[6]]) as usize;

        let total = size + FRAME_OVERHEAD;
        if frame_max != 0 && total > frame_max as usize {
            return Err(AmqpError::FrameTooLarge {
                size: total,
                max: frame_max as usize,
            });
        }
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let end = src[total - 1];
        if end != FRAME_END {
            return Err(AmqpError::FrameEndMismatch(end));
        }

        src.advance(PREFIX_LEN);
        let payload = src.split_to(size).freeze();
        src.advance(1);

        let payload = match kind {
            FrameType::Method => {
                let mut buf = Buffer::from(payload);
                FramePayload::Method(Method::decode(spec, &mut buf)?)
            }
            FrameType::Header => {
                let mut buf = Buffer::from(payload);
                FramePayload::Header(ContentHeader::decode(&mut buf)?)
            }
            FrameType::Body => FramePayload::Body(payload),
            FrameType::Heartbeat => FramePayload::Heartbeat,
        };
        Ok(Some(Frame { channel, payload }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::value::FieldValue;
    use crate::content::BasicProperties;
    use crate::protocol::method::MethodKind;
    use crate::protocol::spec::ProtocolVersion;

    fn spec() -> &'static ProtocolSpec {
        ProtocolVersion::V0_9_1.spec()
    }

    fn wire(frame: &Frame) -> BytesMut {
        let mut dst = BytesMut::new();
        frame.serialize(&mut dst).unwrap();
        dst
    }

    #[test]
    fn heartbeat_layout() {
        let bytes = wire(&Frame::heartbeat());
        assert_eq!(&bytes[..], &[8, 0, 0, 0, 0, 0, 0, FRAME_END]);
    }

    #[test]
    fn method_frame_parses_back() {
        let method = Method::build(
            spec(),
            MethodKind::QueueDeclare,
            [("queue", FieldValue::from("jobs")), ("durable", FieldValue::Boolean(true))],
        )
        .unwrap();
        let frame = Frame::method(3, method);
        let mut bytes = wire(&frame);
        let parsed = Frame::parse(spec(), &mut bytes, 0).unwrap().unwrap();
        assert_eq!(parsed, frame);
        assert!(bytes.is_empty());
    }

    #[test]
    fn header_and_empty_body_parse_back() {
        let header = Frame::header(1, ContentHeader::new(0, BasicProperties::default()));
        let body = Frame::body(1, Bytes::new());
        let mut bytes = wire(&header);
        bytes.extend_from_slice(&wire(&body));

        assert_eq!(Frame::parse(spec(), &mut bytes, 0).unwrap().unwrap(), header);
        assert_eq!(Frame::parse(spec(), &mut bytes, 0).unwrap().unwrap(), body);
    }

    #[test]
    fn incomplete_frame_waits() {
        let full = wire(&Frame::body(1, Bytes::from_static(b"hello")));
        let mut partial = BytesMut::from(&full[..full.len() - 1]);
        assert!(Frame::parse(spec(), &mut partial, 0).unwrap().is_none());
        assert_eq!(partial.len(), full.len() - 1);
    }

    #[test]
    fn bad_end_marker_is_rejected() {
        let mut bytes = wire(&Frame::body(1, Bytes::from_static(b"abc")));
        let last = bytes.len() - 1;
        bytes[last] = 0x00;
        let err = Frame::parse(spec(), &mut bytes, 0).unwrap_err();
        assert!(matches!(err, AmqpError::FrameEndMismatch(0)));
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        let mut bytes = BytesMut::from(&[4u8, 0, 0, 0, 0, 0, 0, FRAME_END][..]);
        assert!(matches!(
            Frame::parse(spec(), &mut bytes, 0),
            Err(AmqpError::UnknownFrameType(4))
        ));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut bytes = wire(&Frame::body(1, Bytes::from(vec![0u8; 100])));
        assert!(matches!(
            Frame::parse(spec(), &mut bytes, 64),
            Err(AmqpError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn body_is_split_by_frame_max() {
        let body = Bytes::from(vec![7u8; 25]);
        let frames = Frame::body_frames(1, &body, 18);
        let sizes: Vec<usize> = frames
            .iter()
            .map(|f| match f.payload() {
                FramePayload::Body(b) => b.len(),
                _ => 0,
            })
            .collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        for f in &frames {
            assert!(wire(f).len() <= 18);
        }
    }

    #[test]
    fn body_frames_edge_cases() {
        assert!(Frame::body_frames(1, &Bytes::new(), 4096).is_empty());
        let body = Bytes::from(vec![1u8; 5000]);
        assert_eq!(Frame::body_frames(1, &body, 0).len(), 1);
    }
}
