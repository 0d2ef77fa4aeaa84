//! Channels and the per-connection channel table.
//!
//! Only one channel is selected at a time for synchronous replies.
//! Frames addressed to any other open channel are parked in that
//! channel's FIFO and handed out, in arrival order, the next time it is
//! selected and read from. Frames for unknown or closed channels are
//! dropped.

use std::collections::VecDeque;

use crate::error::{AmqpError, Result};
use crate::frame::Frame;

/// A multiplexed session over the connection.
#[derive(Debug, Default)]
pub struct Channel {
    number: u16,
    active: bool,
    buffer: VecDeque<Frame>,
}

impl Channel {
    fn new(number: u16) -> Self {
        Self {
            number,
            ..Self::default()
        }
    }

    pub fn number(&self) -> u16 {
        self.number
    }

    /// `true` between Open-Ok and Close / Close-Ok.
    pub fn is_open(&self) -> bool {
        self.active
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

// ── ChannelTable ─────────────────────────────────────────────────

/// Channels indexed by number. Channel 0 always exists and carries
/// connection control.
#[derive(Debug)]
pub struct ChannelTable {
    channels: Vec<Channel>,
    current: u16,
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelTable {
    pub fn new() -> Self {
        Self {
            channels: vec![Channel::new(0)],
            current: 0,
        }
    }

    /// Number of the selected channel.
    pub fn current(&self) -> u16 {
        self.current
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn get(&self, number: u16) -> Option<&Channel> {
        self.channels.get(usize::from(number))
    }

    fn get_mut(&mut self, number: u16) -> Result<&mut Channel> {
        self.channels
            .get_mut(usize::from(number))
            .ok_or(AmqpError::InvalidChannel(number))
    }

    /// Pick a slot for a new channel: the lowest closed non-zero slot,
    /// otherwise a fresh one. `channel_max == 0` means no limit.
    pub fn allocate(&mut self, channel_max: u16) -> Result<u16> {
        if let Some(ch) = self.channels.iter().skip(1).find(|c| !c.active) {
            return Ok(ch.number);
        }
        let next = self.channels.len();
        let number = u16::try_from(next)
            .ok()
            .filter(|n| channel_max == 0 || *n <= channel_max)
            .ok_or_else(|| {
                AmqpError::Usage(format!("channel limit {channel_max} reached"))
            })?;
        self.channels.push(Channel::new(number));
        Ok(number)
    }

    /// Select `number` for subsequent reads and writes.
    pub fn select(&mut self, number: u16) -> Result<()> {
        self.get_mut(number)?;
        self.current = number;
        Ok(())
    }

    pub fn set_open(&mut self, number: u16, open: bool) -> Result<()> {
        let ch = self.get_mut(number)?;
        ch.active = open;
        if !open {
            ch.buffer.clear();
        }
        Ok(())
    }

    /// Open non-zero channels, lowest first.
    pub fn open_channels(&self) -> Vec<u16> {
        self.channels
            .iter()
            .skip(1)
            .filter(|c| c.active)
            .map(|c| c.number)
            .collect()
    }

    /// Next parked frame for the selected channel.
    pub fn pop_current(&mut self) -> Option<Frame> {
        let current = usize::from(self.current);
        self.channels.get_mut(current)?.buffer.pop_front()
    }

    /// Park a frame for an open channel that is not currently selected.
    ///
    /// Returns `false` when the channel is unknown or closed.
    pub fn park(&mut self, frame: Frame) -> bool {
        match self.channels.get_mut(usize::from(frame.channel())) {
            Some(ch) if ch.active => {
                ch.buffer.push_back(frame);
                true
            }
            _ => false,
        }
    }

    /// Forget every channel except 0.
    pub fn reset(&mut self) {
        self.channels.truncate(1);
        self.channels[0].buffer.clear();
        self.current = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn open(table: &mut ChannelTable) -> u16 {
        let n = table.allocate(0).unwrap();
        table.set_open(n, true).unwrap();
        n
    }

    #[test]
    fn channel_zero_always_exists() {
        let table = ChannelTable::new();
        assert_eq!(table.current(), 0);
        assert!(table.get(0).is_some());
        assert!(table.open_channels().is_empty());
    }

    #[test]
    fn lowest_closed_slot_is_reused() {
        let mut table = ChannelTable::new();
        assert_eq!(open(&mut table), 1);
        assert_eq!(open(&mut table), 2);
        assert_eq!(open(&mut table), 3);
        table.set_open(2, false).unwrap();
        assert_eq!(open(&mut table), 2);
        assert_eq!(open(&mut table), 4);
    }

    #[test]
    fn channel_max_bounds_allocation() {
        let mut table = ChannelTable::new();
        let n = table.allocate(1).unwrap();
        table.set_open(n, true).unwrap();
        assert!(matches!(table.allocate(1), Err(AmqpError::Usage(_))));
    }

    #[test]
    fn selecting_unknown_channel_fails() {
        let mut table = ChannelTable::new();
        assert!(matches!(table.select(7), Err(AmqpError::InvalidChannel(7))));
        assert_eq!(table.current(), 0);
    }

    #[test]
    fn parked_frames_come_back_in_order() {
        let mut table = ChannelTable::new();
        let a = open(&mut table);
        let b = open(&mut table);
        table.select(a).unwrap();

        assert!(table.park(Frame::body(b, Bytes::from_static(b"1"))));
        assert!(table.park(Frame::body(b, Bytes::from_static(b"2"))));
        assert!(!table.park(Frame::body(9, Bytes::new())));
        assert!(table.pop_current().is_none());

        table.select(b).unwrap();
        assert_eq!(
            table.pop_current(),
            Some(Frame::body(b, Bytes::from_static(b"1")))
        );
        assert_eq!(
            table.pop_current(),
            Some(Frame::body(b, Bytes::from_static(b"2")))
        );
        assert!(table.pop_current().is_none());
    }

    #[test]
    fn closed_channel_does_not_park() {
        let mut table = ChannelTable::new();
        let a = open(&mut table);
        let b = open(&mut table);
        table.set_open(b, false).unwrap();
        table.select(a).unwrap();

        assert!(!table.park(Frame::body(b, Bytes::from_static(b"stale"))));

        assert_eq!(open(&mut table), b);
        assert_eq!(table.get(b).map(Channel::pending), Some(0));
        table.select(b).unwrap();
        assert!(table.pop_current().is_none());
    }
}
