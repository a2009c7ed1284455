// Kaeppa Head Unit — Test Doubles
//
// Recording doubles for every collaborator, used by the unit tests.

use std::collections::VecDeque;
use std::sync::mpsc::SyncSender;
use std::time::Duration;

use crate::drivers::{AudioSink, Hmi, I2sPins, PersistentStore, SerialPort, System};
use crate::error::Error;
use crate::events::{PeerAddress, PlaybackState, SinkEvent};

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HmiOp {
    Text(String, String),
    Number(String, u32),
    Command(String),
}

#[derive(Debug, Default)]
pub struct MockHmi {
    pub ops: Vec<HmiOp>,
    pub triggers: VecDeque<u8>,
}

impl MockHmi {
    pub fn texts_for(&self, field: &str) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                HmiOp::Text(f, t) if f == field => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn numbers_for(&self, field: &str) -> Vec<u32> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                HmiOp::Number(f, n) if f == field => Some(*n),
                _ => None,
            })
            .collect()
    }

    pub fn commands(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                HmiOp::Command(c) => Some(c.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Hmi for MockHmi {
    fn set_text(&mut self, field: &str, text: &str) -> Result<(), Error> {
        self.ops.push(HmiOp::Text(field.into(), text.into()));
        Ok(())
    }

    fn set_number(&mut self, field: &str, value: u32) -> Result<(), Error> {
        self.ops.push(HmiOp::Number(field.into(), value));
        Ok(())
    }

    fn command(&mut self, command: &str) -> Result<(), Error> {
        self.ops.push(HmiOp::Command(command.into()));
        Ok(())
    }

    fn poll_trigger(&mut self) -> Result<Option<u8>, Error> {
        Ok(self.triggers.pop_front())
    }
}

// ---------------------------------------------------------------------------
// Bluetooth sink
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    PinConfig(I2sPins),
    AutoReconnect(Option<Duration>),
    EventSender,
    MetadataMask(u8),
    Start(String),
    Play,
    Pause,
    Next,
    Previous,
    Disconnect,
}

#[derive(Debug, Default)]
pub struct MockSink {
    pub connected: bool,
    pub audio_state: PlaybackState,
    /// State reported by `audio_state()` once `play()` has been issued.
    pub state_after_play: Option<PlaybackState>,
    pub source_name: String,
    pub current: PeerAddress,
    pub last: PeerAddress,
    pub calls: Vec<SinkCall>,
    pub events: Option<SyncSender<SinkEvent>>,
}

impl MockSink {
    pub fn transport_calls(&self) -> Vec<SinkCall> {
        self.calls
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    SinkCall::Play
                        | SinkCall::Pause
                        | SinkCall::Next
                        | SinkCall::Previous
                        | SinkCall::Disconnect
                )
            })
            .cloned()
            .collect()
    }
}

impl AudioSink for MockSink {
    fn set_pin_config(&mut self, pins: I2sPins) -> Result<(), Error> {
        self.calls.push(SinkCall::PinConfig(pins));
        Ok(())
    }

    fn set_auto_reconnect(&mut self, window: Option<Duration>) -> Result<(), Error> {
        self.calls.push(SinkCall::AutoReconnect(window));
        Ok(())
    }

    fn set_event_sender(&mut self, events: SyncSender<SinkEvent>) -> Result<(), Error> {
        self.calls.push(SinkCall::EventSender);
        self.events = Some(events);
        Ok(())
    }

    fn set_metadata_mask(&mut self, mask: u8) -> Result<(), Error> {
        self.calls.push(SinkCall::MetadataMask(mask));
        Ok(())
    }

    fn start(&mut self, device_name: &str) -> Result<(), Error> {
        self.calls.push(SinkCall::Start(device_name.into()));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn audio_state(&self) -> PlaybackState {
        self.audio_state
    }

    fn connected_source_name(&self) -> String {
        self.source_name.clone()
    }

    fn current_peer(&self) -> PeerAddress {
        self.current
    }

    fn last_peer(&self) -> PeerAddress {
        self.last
    }

    fn play(&mut self) -> Result<(), Error> {
        self.calls.push(SinkCall::Play);
        if let Some(state) = self.state_after_play {
            self.audio_state = state;
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), Error> {
        self.calls.push(SinkCall::Pause);
        Ok(())
    }

    fn next(&mut self) -> Result<(), Error> {
        self.calls.push(SinkCall::Next);
        Ok(())
    }

    fn previous(&mut self) -> Result<(), Error> {
        self.calls.push(SinkCall::Previous);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Error> {
        self.calls.push(SinkCall::Disconnect);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Persistent store
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct MockStore {
    pub committed: [u8; crate::config::EEPROM_SIZE],
    pub buffered: [u8; crate::config::EEPROM_SIZE],
    pub writes: usize,
    pub commits: usize,
}

impl MockStore {
    pub fn with_byte(offset: usize, value: u8) -> Self {
        let mut store = Self::default();
        store.committed[offset] = value;
        store.buffered[offset] = value;
        store
    }
}

impl Default for MockStore {
    fn default() -> Self {
        // Erased flash reads back as 0xFF.
        Self {
            committed: [0xFF; crate::config::EEPROM_SIZE],
            buffered: [0xFF; crate::config::EEPROM_SIZE],
            writes: 0,
            commits: 0,
        }
    }
}

impl PersistentStore for MockStore {
    fn read_byte(&mut self, offset: usize) -> Result<u8, Error> {
        self.buffered
            .get(offset)
            .copied()
            .ok_or_else(|| Error::Storage(format!("offset {} out of range", offset)))
    }

    fn write_byte(&mut self, offset: usize, value: u8) -> Result<(), Error> {
        let slot = self
            .buffered
            .get_mut(offset)
            .ok_or_else(|| Error::Storage(format!("offset {} out of range", offset)))?;
        *slot = value;
        self.writes += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Error> {
        self.committed = self.buffered;
        self.commits += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Status LED, delay, system
// ---------------------------------------------------------------------------
#[derive(Debug, Default)]
pub struct MockLed {
    /// Every level written, `true` = on.
    pub levels: Vec<bool>,
}

impl embedded_hal::digital::ErrorType for MockLed {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for MockLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.push(true);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockDelay {
    pub delays_ms: Vec<u32>,
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, _ns: u32) {}

    fn delay_ms(&mut self, ms: u32) {
        self.delays_ms.push(ms);
    }
}

#[derive(Debug, Default)]
pub struct MockSystem {
    pub restarts: usize,
}

impl System for MockSystem {
    fn restart(&mut self) {
        self.restarts += 1;
    }
}

// ---------------------------------------------------------------------------
// Serial port
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct MockSerial {
    pub written: Vec<u8>,
    pub inbound: VecDeque<u8>,
    /// Upper bound on bytes returned per `read_available` call.
    pub chunk: usize,
}

impl MockSerial {
    pub fn with_chunk(chunk: usize) -> Self {
        Self {
            chunk,
            ..Self::default()
        }
    }
}

impl Default for MockSerial {
    fn default() -> Self {
        Self {
            written: Vec::new(),
            inbound: VecDeque::new(),
            chunk: usize::MAX,
        }
    }
}

impl SerialPort for MockSerial {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.written.extend_from_slice(bytes);
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let n = buf.len().min(self.chunk).min(self.inbound.len());
        for slot in buf.iter_mut().take(n) {
            // n <= inbound.len(), so this always yields
            *slot = self.inbound.pop_front().unwrap_or_default();
        }
        Ok(n)
    }
}
