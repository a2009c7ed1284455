// Kaeppa Head Unit — Hardware & System Configuration
// Target: ESP32 (Xtensa) with PCM5102-style I2S DAC and Nextion HMI

use std::time::Duration;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const BLUETOOTH_NAME: &str = concat!("Kaeppa Head Unit ", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// GPIO Pin Definitions
// ---------------------------------------------------------------------------
// BCK == BCK, WS == LCK, DATA == DIN on the DAC board.
pub const PIN_I2S_BCK: i32 = 4;
pub const PIN_I2S_DATA: i32 = 2;
pub const PIN_I2S_WS: i32 = 15;
// The UARTs and the status LED take typed pins in main.rs.

// ---------------------------------------------------------------------------
// Serial transports
// ---------------------------------------------------------------------------
pub const MONITOR_BAUD: u32 = 9600;
pub const HMI_BAUD: u32 = 9600;

// ---------------------------------------------------------------------------
// Bluetooth
// ---------------------------------------------------------------------------
pub const AUTO_RECONNECT_WINDOW: Duration = Duration::from_millis(10_000);

/// Depth of the queue between the Bluetooth callbacks and the main loop.
pub const EVENT_QUEUE_DEPTH: usize = 16;

// ---------------------------------------------------------------------------
// Persistent storage (EEPROM emulation)
// ---------------------------------------------------------------------------
pub const EEPROM_SIZE: usize = 12;
pub const BRIGHTNESS_ADDR: usize = 0;

// ---------------------------------------------------------------------------
// Display brightness (percent duty, ascending)
// ---------------------------------------------------------------------------
pub const BRIGHTNESS_LEVELS: [u8; 6] = [1, 5, 10, 40, 60, 100];
pub const BRIGHTNESS_DEFAULT_INDEX: usize = 2;

// ---------------------------------------------------------------------------
// Display fields
// ---------------------------------------------------------------------------
pub const FIELD_SONG: &str = "song_lab.txt";
pub const FIELD_ARTIST: &str = "artist_lab.txt";
pub const FIELD_PLAY_PAUSE: &str = "play_pause_but.txt";
pub const FIELD_BT_STATE_TEXT: &str = "bl_state_lab.txt";
pub const FIELD_BT_STATE_COLOR: &str = "bl_state_lab.bco";
pub const FIELD_BT_PEER_TEXT: &str = "bl_mac_lab.txt";
pub const FIELD_BT_PEER_COLOR: &str = "bl_mac_lab.bco";
pub const FIELD_ACK_COLOR: &str = "sig_ok_lab.bco";
pub const FIELD_BOOT_TEXT: &str = "boot_lab.txt";

pub const MAIN_PAGE_COMMAND: &str = "page page1";

// ---------------------------------------------------------------------------
// Display colors (RGB565)
// ---------------------------------------------------------------------------
pub const COLOR_CONNECTED: u32 = 1032;
pub const COLOR_DISCONNECTED: u32 = 64528;
pub const COLOR_ACK_FLASH: u32 = 2016;
pub const COLOR_ACK_IDLE: u32 = 32335;

// ---------------------------------------------------------------------------
// Timing (milliseconds)
// ---------------------------------------------------------------------------
pub const ACK_PULSE_MS: u32 = 50;
pub const BOOT_INIT_TEXT_MS: u32 = 2000;
pub const BOOT_DONE_TEXT_MS: u32 = 1000;
pub const BOOT_WELCOME_TEXT_MS: u32 = 2000;
/// Main loop yield so the idle task (and its watchdog) gets to run.
pub const LOOP_YIELD_MS: u32 = 1;

