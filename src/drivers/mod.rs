// Kaeppa Head Unit — Collaborator Interfaces
//
// The reconciliation core only talks to hardware through these traits.
// ESP-IDF implementations live in the `esp` submodules; host tests use
// `crate::mocks`.
//
// The status LED and the blocking delay use the `embedded-hal` 1.0 traits
// (`OutputPin`, `DelayNs`) directly.

#[cfg(feature = "esp")]
pub mod esp_a2dp;
#[cfg(feature = "esp")]
pub mod esp_nvs;
#[cfg(feature = "esp")]
pub mod esp_system;
#[cfg(feature = "esp")]
pub mod esp_uart;
pub mod reconnect;

use std::sync::mpsc::SyncSender;
use std::time::Duration;

use crate::error::Error;
use crate::events::{PeerAddress, PlaybackState, SinkEvent};

/// Numeric I2S pin mapping handed to the audio sink at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2sPins {
    pub bck: i32,
    pub ws: i32,
    pub data_out: i32,
}

/// PCM sample rate selected by the first SBC codec-information byte of an
/// A2DP stream configuration (sampling-frequency bits in the high nibble).
/// `None` when the field does not select exactly one known rate.
pub fn sbc_sample_rate(cie0: u8) -> Option<u32> {
    match cie0 & 0xF0 {
        0x80 => Some(16_000),
        0x40 => Some(32_000),
        0x20 => Some(44_100),
        0x10 => Some(48_000),
        _ => None,
    }
}

/// Bluetooth A2DP sink with AVRCP controller.
pub trait AudioSink {
    // ---- boot-time configuration (called in this order) ----
    fn set_pin_config(&mut self, pins: I2sPins) -> Result<(), Error>;
    /// `None` disables auto-reconnect.
    fn set_auto_reconnect(&mut self, window: Option<Duration>) -> Result<(), Error>;
    /// Register the producer side of the event queue. The stack pushes
    /// audio-state and metadata events through it from its own task.
    fn set_event_sender(&mut self, events: SyncSender<SinkEvent>) -> Result<(), Error>;
    /// Bitmask of AVRCP metadata attributes to request.
    fn set_metadata_mask(&mut self, mask: u8) -> Result<(), Error>;
    /// Start accepting connections under `device_name`.
    fn start(&mut self, device_name: &str) -> Result<(), Error>;

    // ---- status ----
    fn is_connected(&self) -> bool;
    fn audio_state(&self) -> PlaybackState;
    /// Empty until the peer's name has been retrieved.
    fn connected_source_name(&self) -> String;
    fn current_peer(&self) -> PeerAddress;
    fn last_peer(&self) -> PeerAddress;

    // ---- transport controls ----
    fn play(&mut self) -> Result<(), Error>;
    fn pause(&mut self) -> Result<(), Error>;
    fn next(&mut self) -> Result<(), Error>;
    fn previous(&mut self) -> Result<(), Error>;
    fn disconnect(&mut self) -> Result<(), Error>;
}

/// Field-oriented view of the touch display.
pub trait Hmi {
    /// `<field>="<text>"`
    fn set_text(&mut self, field: &str, text: &str) -> Result<(), Error>;
    /// `<field>=<value>`
    fn set_number(&mut self, field: &str, value: u32) -> Result<(), Error>;
    /// Raw command such as `dim=40` or `page page1`.
    fn command(&mut self, command: &str) -> Result<(), Error>;
    /// Next pending trigger number, if one has arrived. Never blocks.
    fn poll_trigger(&mut self) -> Result<Option<u8>, Error>;
}

/// Byte-addressable store with explicit commit (EEPROM semantics).
pub trait PersistentStore {
    fn read_byte(&mut self, offset: usize) -> Result<u8, Error>;
    /// Buffered until `commit`.
    fn write_byte(&mut self, offset: usize, value: u8) -> Result<(), Error>;
    /// Make every buffered write durable before returning.
    fn commit(&mut self) -> Result<(), Error>;
}

/// Raw byte transport (UART). Reads never block.
pub trait SerialPort {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Error>;
    /// Copy whatever is already buffered into `buf`; returns 0 when idle.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Error>;
}

pub trait System {
    /// Full device restart. Does not return on hardware.
    fn restart(&mut self);
}
