//! Observers for frame traffic.
//!
//! A connection reports every frame it writes or reads to a
//! [`Diagnostics`] sink. Sinks only observe; they cannot fail or alter
//! the frame.

use std::fmt;

use crate::frame::{Frame, FramePayload};

pub trait Diagnostics: Send + Sync + fmt::Debug {
    fn frame_sent(&self, frame: &Frame);
    fn frame_received(&self, frame: &Frame);
}

/// Emits one `trace` event per frame under the `warren::frames` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn frame_sent(&self, frame: &Frame) {
        tracing::trace!(
            target: "warren::frames",
            channel = frame.channel(),
            "send {}",
            Summary(frame)
        );
    }

    fn frame_received(&self, frame: &Frame) {
        tracing::trace!(
            target: "warren::frames",
            channel = frame.channel(),
            "recv {}",
            Summary(frame)
        );
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDiagnostics;

impl Diagnostics for NoDiagnostics {
    fn frame_sent(&self, _frame: &Frame) {}
    fn frame_received(&self, _frame: &Frame) {}
}

struct Summary<'a>(&'a Frame);

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.payload() {
            FramePayload::Method(m) => write!(f, "method {m}"),
            FramePayload::Header(h) => write!(f, "header body_size={}", h.body_size),
            FramePayload::Body(b) => write!(f, "body {} bytes", b.len()),
            FramePayload::Heartbeat => f.write_str("heartbeat"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Diagnostics for Recorder {
        fn frame_sent(&self, frame: &Frame) {
            self.0.lock().unwrap().push(format!("> {}", Summary(frame)));
        }
        fn frame_received(&self, frame: &Frame) {
            self.0.lock().unwrap().push(format!("< {}", Summary(frame)));
        }
    }

    #[test]
    fn summaries_name_the_payload() {
        let rec = Recorder::default();
        rec.frame_sent(&Frame::heartbeat());
        rec.frame_received(&Frame::body(1, Bytes::from_static(b"abc")));
        let log = rec.0.lock().unwrap();
        assert_eq!(*log, vec!["> heartbeat", "< body 3 bytes"]);
    }
}
