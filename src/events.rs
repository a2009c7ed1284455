// Kaeppa Head Unit — State Enums & Event Types

use std::fmt;
use std::sync::mpsc::{SyncSender, TrySendError};

use crate::error::Error;

// ---------------------------------------------------------------------------
// Bluetooth link state
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    /// Reserved: the reconciler only ever enters the other two.
    Connecting,
    Connected,
}

impl LinkState {
    pub fn from_connected(connected: bool) -> Self {
        if connected {
            Self::Connected
        } else {
            Self::Disconnected
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Audio transport (A2DP stream) state
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    RemoteSuspend,
    Stopped,
    Started,
    /// Anything else the stack reports.
    Unknown,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoteSuspend => "Suspended",
            Self::Stopped => "Stopped",
            Self::Started => "Started",
            Self::Unknown => "Unknown",
        }
    }

    /// Label for the play/pause button, or `None` when the state says nothing
    /// about which action makes sense.
    pub fn button_label(&self) -> Option<&'static str> {
        match self {
            Self::RemoteSuspend | Self::Stopped => Some("Play"),
            Self::Started => Some("Pause"),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Peer address (6-byte BD_ADDR)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeerAddress(pub [u8; 6]);

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

// ---------------------------------------------------------------------------
// AVRCP metadata attribute ids
// ---------------------------------------------------------------------------
pub const ATTR_TITLE: u8 = 0x1;
pub const ATTR_ARTIST: u8 = 0x2;

// ---------------------------------------------------------------------------
// Sink Events — pushed by the Bluetooth stack, drained by the main loop
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// The A2DP audio stream changed state.
    AudioStateChanged(PlaybackState),
    /// An AVRCP metadata attribute arrived.
    Metadata { attribute: u8, text: String },
}

/// Producer side of the event queue. Never blocks: a full queue drops the
/// event so the Bluetooth task is not stalled by a slow main loop.
pub fn publish(events: &SyncSender<SinkEvent>, event: SinkEvent) -> Result<(), Error> {
    match events.try_send(event) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(dropped)) => {
            log::warn!("Event queue full, dropping {:?}", dropped);
            Err(Error::QueueFull)
        }
        Err(TrySendError::Disconnected(_)) => Err(Error::QueueClosed),
    }
}

// ---------------------------------------------------------------------------
// Display triggers (numbered touch events)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Previous,
    PlayPause,
    Next,
    LinkToggle,
    BrightnessUp,
    BrightnessDown,
}

impl Trigger {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Previous),
            1 => Some(Self::PlayPause),
            2 => Some(Self::Next),
            3 => Some(Self::LinkToggle),
            4 => Some(Self::BrightnessUp),
            5 => Some(Self::BrightnessDown),
            _ => None,
        }
    }
}
