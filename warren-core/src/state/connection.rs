//! Connection lifecycle state, negotiated tuning and activity tracking.
//!
//! `ConnectionPhase` models the full lifecycle of a broker connection,
//! with validated transitions that return `Result` instead of panicking.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{AmqpError, Result};

// ── ConnectionPhase ──────────────────────────────────────────────

/// The current phase of a broker connection.
///
/// ```text
///  Disconnected ──► Connecting ──► Handshaking ──► Connected
///       ▲                │               │              │
///       │                ▼               ▼              ▼
///       └─────────────── Closing ◄───────┴──────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// No socket. Initial / terminal state.
    #[default]
    Disconnected,

    /// Socket being opened.
    Connecting,

    /// Socket is up; exchanging Start / Tune / Open.
    Handshaking,

    /// Open-Ok received; ready for channel traffic.
    Connected {
        /// When the connection entered the `Connected` state.
        since: Instant,
    },

    /// Connection.Close sent, waiting for Close-Ok.
    Closing,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Handshaking => write!(f, "Handshaking"),
            Self::Connected { .. } => write!(f, "Connected"),
            Self::Closing => write!(f, "Closing"),
        }
    }
}

impl ConnectionPhase {
    /// Returns `true` when the handshake has completed.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// How long the connection has been in the `Connected` state.
    ///
    /// Returns `None` for any other phase.
    pub fn connected_duration(&self) -> Option<Duration> {
        match self {
            Self::Connected { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    fn invalid(&self, action: &str) -> AmqpError {
        AmqpError::Usage(format!("cannot {action} while {self}"))
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Valid from: `Disconnected`.
    pub fn begin_connect(&mut self) -> Result<()> {
        match self {
            Self::Disconnected => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(self.invalid("connect")),
        }
    }

    /// Valid from: `Connecting`.
    pub fn begin_handshake(&mut self) -> Result<()> {
        match self {
            Self::Connecting => {
                *self = Self::Handshaking;
                Ok(())
            }
            _ => Err(self.invalid("start the handshake")),
        }
    }

    /// Valid from: `Handshaking`.
    pub fn complete_handshake(&mut self) -> Result<()> {
        match self {
            Self::Handshaking => {
                *self = Self::Connected {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(self.invalid("complete the handshake")),
        }
    }

    /// Valid from: `Handshaking`, `Connected`.
    pub fn begin_close(&mut self) -> Result<()> {
        match self {
            Self::Handshaking | Self::Connected { .. } => {
                *self = Self::Closing;
                Ok(())
            }
            _ => Err(self.invalid("close")),
        }
    }

    /// Valid from: `Closing`, `Connecting` (failure), `Handshaking` (failure).
    pub fn finish_close(&mut self) -> Result<()> {
        match self {
            Self::Closing | Self::Connecting | Self::Handshaking => {
                *self = Self::Disconnected;
                Ok(())
            }
            _ => Err(self.invalid("finish closing")),
        }
    }

    /// Force-reset to `Disconnected` regardless of current state.
    ///
    /// Used for forced closes and transport failures.
    pub fn force_disconnect(&mut self) {
        *self = Self::Disconnected;
    }
}

// ── Tuning ───────────────────────────────────────────────────────

/// Connection tuning parameters.
///
/// Zero means "no limit" for `channel_max` and `frame_max`, and
/// "disabled" for `heartbeat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tuning {
    pub channel_max: u16,
    pub frame_max: u32,
    /// Heartbeat interval in seconds.
    pub heartbeat: u16,
}

impl Tuning {
    pub fn new(channel_max: u16, frame_max: u32, heartbeat: u16) -> Self {
        Self {
            channel_max,
            frame_max,
            heartbeat,
        }
    }

    /// Per-field lower of the two, where 0 yields to any limit.
    ///
    /// A client heartbeat of 0 stays 0: the broker cannot switch
    /// heartbeats on for a client that disabled them.
    pub fn negotiate(&self, broker: &Self) -> Self {
        let heartbeat = match self.heartbeat {
            0 => 0,
            ours => lower_limit(ours, broker.heartbeat),
        };
        Self {
            channel_max: lower_limit(self.channel_max, broker.channel_max),
            frame_max: lower_limit(self.frame_max, broker.frame_max),
            heartbeat,
        }
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        match self.heartbeat {
            0 => None,
            secs => Some(Duration::from_secs(u64::from(secs))),
        }
    }
}

fn lower_limit<T: Ord + Default + Copy>(a: T, b: T) -> T {
    let zero = T::default();
    if a == zero {
        b
    } else if b == zero {
        a
    } else {
        a.min(b)
    }
}

// ── Activity ─────────────────────────────────────────────────────

/// Inbound/outbound activity flags shared with the heartbeat task.
#[derive(Debug, Clone, Default)]
pub struct Activity {
    inbound: Arc<AtomicBool>,
    outbound: Arc<AtomicBool>,
}

impl Activity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_inbound(&self) {
        self.inbound.store(true, Ordering::Relaxed);
    }

    pub fn mark_outbound(&self) {
        self.outbound.store(true, Ordering::Relaxed);
    }

    /// Read and clear the inbound flag.
    pub fn take_inbound(&self) -> bool {
        self.inbound.swap(false, Ordering::Relaxed)
    }

    /// Read and clear the outbound flag.
    pub fn take_outbound(&self) -> bool {
        self.outbound.swap(false, Ordering::Relaxed)
    }
}

// ── Tests ────────────────────────────────────────────────────────
