//! Value codec and the `tokio_util` frame codec.
//!
//! [`buffer`] and [`value`] handle AMQP field encodings; [`AmqpCodec`]
//! turns a byte stream into [`Frame`]s for `FramedRead` / `FramedWrite`.

pub mod buffer;
pub mod value;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::AmqpError;
use crate::frame::Frame;
use crate::protocol::spec::ProtocolSpec;

/// Frame codec bound to one protocol revision.
///
/// `frame_max` starts at 0 (unchecked) and is set once tuning has been
/// negotiated.
#[derive(Debug, Clone, Copy)]
pub struct AmqpCodec {
    spec: &'static ProtocolSpec,
    frame_max: u32,
}

impl AmqpCodec {
    pub fn new(spec: &'static ProtocolSpec) -> Self {
        Self { spec, frame_max: 0 }
    }

    pub fn spec(&self) -> &'static ProtocolSpec {
        self.spec
    }

    pub fn frame_max(&self) -> u32 {
        self.frame_max
    }

    pub fn set_frame_max(&mut self, frame_max: u32) {
        self.frame_max = frame_max;
    }
}

impl Decoder for AmqpCodec {
    type Item = Frame;
    type Error = AmqpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Frame::parse(self.spec, src, self.frame_max)
    }
}

impl Encoder<Frame> for AmqpCodec {
    type Error = AmqpError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let start = dst.len();
        item.serialize(dst)?;
        let size = dst.len() - start;
        if self.frame_max != 0 && size > self.frame_max as usize {
            dst.truncate(start);
            return Err(AmqpError::FrameTooLarge {
                size,
                max: self.frame_max as usize,
            });
        }
        Ok(())
    }
}
