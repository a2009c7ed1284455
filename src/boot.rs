// Kaeppa Head Unit — Boot/Init Sequencer
//
// Normal boot:
//   1. Status LED off.
//   2. Sink configuration: I2S pins, auto-reconnect window, event queue,
//      metadata mask, then start advertising under the device name.
//   3. Restore the persisted display brightness.
//   4. Optional boot screen, optional switch to the main page.
//
// HMI-update boot skips all of that and turns the unit into a transparent
// serial bridge between the diagnostic port and the display, so the display
// firmware can be flashed through the head unit.

use anyhow::Context;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::config::*;
use crate::drivers::{AudioSink, Hmi, I2sPins, PersistentStore, SerialPort, System};
use crate::error::{log_failure, Error};
use crate::headunit::HeadUnit;
use crate::metadata::METADATA_MASK;

const BRIDGE_CHUNK: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMode {
    Normal,
    HmiUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootConfig {
    pub mode: BootMode,
    /// Show the "Initializing..." sequence on `boot_lab` first.
    pub boot_screen: bool,
    /// Send `page page1` once boot is done.
    pub open_main_page: bool,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            mode: BootMode::Normal,
            boot_screen: false,
            open_main_page: false,
        }
    }
}

impl BootConfig {
    /// Mode picked at build time by the `hmi-update` feature.
    pub fn from_features() -> Self {
        let mode = if cfg!(feature = "hmi-update") {
            BootMode::HmiUpdate
        } else {
            BootMode::Normal
        };
        Self {
            mode,
            ..Self::default()
        }
    }
}

pub fn i2s_pins() -> I2sPins {
    I2sPins {
        bck: PIN_I2S_BCK,
        ws: PIN_I2S_WS,
        data_out: PIN_I2S_DATA,
    }
}

/// Normal-mode bring-up. Sink configuration failures abort boot; the display
/// steps after `start` are best-effort.
pub fn start<S, H, P, L, D, Y>(
    unit: &mut HeadUnit<S, H, P, L, D, Y>,
    config: &BootConfig,
) -> anyhow::Result<()>
where
    S: AudioSink,
    H: Hmi,
    P: PersistentStore,
    L: OutputPin,
    D: DelayNs,
    Y: System,
{
    log::info!("Kaeppa head unit v{} starting ({:?})", VERSION, config.mode);

    if unit.led.set_low().is_err() {
        log::warn!("{}", Error::Indicator);
    }

    // ---- Bluetooth sink ---------------------------------------------------
    let events = unit.event_sender();
    unit.sink
        .set_pin_config(i2s_pins())
        .context("I2S pin configuration")?;
    unit.sink
        .set_auto_reconnect(Some(AUTO_RECONNECT_WINDOW))
        .context("auto-reconnect")?;
    unit.sink
        .set_event_sender(events)
        .context("event queue registration")?;
    unit.sink
        .set_metadata_mask(METADATA_MASK)
        .context("metadata mask")?;
    unit.sink
        .start(BLUETOOTH_NAME)
        .with_context(|| format!("starting sink as {:?}", BLUETOOTH_NAME))?;

    log::info!("Last connection: {}", unit.sink.last_peer());
    log::info!("Current connection: {}", unit.sink.current_peer());

    // ---- Display ----------------------------------------------------------
    unit.restore_brightness();

    if config.boot_screen {
        show_boot_screen(&mut unit.hmi, &mut unit.delay);
    }
    if config.boot_screen || config.open_main_page {
        log_failure("Main page", unit.hmi.command(MAIN_PAGE_COMMAND));
    }

    log::info!("Setup done");
    Ok(())
}

pub fn show_boot_screen<H: Hmi, D: DelayNs>(hmi: &mut H, delay: &mut D) {
    for (text, hold_ms) in [
        ("Initializing...", BOOT_INIT_TEXT_MS),
        ("Init done", BOOT_DONE_TEXT_MS),
        ("Welcome!", BOOT_WELCOME_TEXT_MS),
    ] {
        log_failure("Boot text", hmi.set_text(FIELD_BOOT_TEXT, text));
        delay.delay_ms(hold_ms);
    }
}

// ---------------------------------------------------------------------------
// HMI update pass-through
// ---------------------------------------------------------------------------

/// Move whatever is pending in each direction once. Returns the number of
/// bytes forwarded; 0 means both sides were idle.
pub fn bridge_once<A, B>(monitor: &mut A, hmi: &mut B) -> Result<usize, Error>
where
    A: SerialPort,
    B: SerialPort,
{
    let mut buf = [0u8; BRIDGE_CHUNK];
    let mut moved = 0;

    let n = monitor.read_available(&mut buf)?;
    if n > 0 {
        hmi.write_all(&buf[..n])?;
        moved += n;
    }

    let n = hmi.read_available(&mut buf)?;
    if n > 0 {
        monitor.write_all(&buf[..n])?;
        moved += n;
    }

    Ok(moved)
}

pub fn run_hmi_update<A, B, D>(monitor: &mut A, hmi: &mut B, delay: &mut D) -> !
where
    A: SerialPort,
    B: SerialPort,
    D: DelayNs,
{
    log::info!("Kaeppa head unit v{} in HMI update mode", VERSION);

    loop {
        match bridge_once(monitor, hmi) {
            Ok(0) => delay.delay_ms(LOOP_YIELD_MS),
            Ok(_) => {}
            Err(e) => {
                log::warn!("Bridge: {}", e);
                delay.delay_ms(LOOP_YIELD_MS);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::*;
    use std::time::Duration;

    type TestUnit = HeadUnit<MockSink, MockHmi, MockStore, MockLed, MockDelay, MockSystem>;

    fn unit_with_store(store: MockStore) -> TestUnit {
        HeadUnit::new(
            MockSink::default(),
            MockHmi::default(),
            store,
            MockLed::default(),
            MockDelay::default(),
            MockSystem::default(),
        )
    }

    #[test]
    fn sink_is_configured_in_order_before_start() {
        let mut unit = unit_with_store(MockStore::default());

        start(&mut unit, &BootConfig::default()).unwrap();

        assert_eq!(
            unit.sink.calls,
            vec![
                SinkCall::PinConfig(I2sPins {
                    bck: 4,
                    ws: 15,
                    data_out: 2
                }),
                SinkCall::AutoReconnect(Some(Duration::from_millis(10_000))),
                SinkCall::EventSender,
                SinkCall::MetadataMask(0x3),
                SinkCall::Start(BLUETOOTH_NAME.into()),
            ]
        );
        assert!(BLUETOOTH_NAME.starts_with("Kaeppa Head Unit "));
        assert_eq!(unit.led.levels, vec![false]);
    }

    #[test]
    fn registered_sender_feeds_the_main_loop() {
        let mut unit = unit_with_store(MockStore::default());
        start(&mut unit, &BootConfig::default()).unwrap();

        let tx = unit.sink.events.clone().unwrap();
        crate::events::publish(
            &tx,
            crate::events::SinkEvent::Metadata {
                attribute: 0x2,
                text: "Artist".into(),
            },
        )
        .unwrap();
        unit.drain_events();

        assert_eq!(unit.hmi.texts_for("artist_lab.txt"), vec!["Artist"]);
    }

    #[test]
    fn boot_restores_brightness_without_page_switch() {
        let mut unit = unit_with_store(MockStore::with_byte(BRIGHTNESS_ADDR, 3));

        start(&mut unit, &BootConfig::default()).unwrap();

        assert_eq!(unit.state().brightness.get(), 3);
        assert_eq!(unit.hmi.commands(), vec!["dim=40"]);
        assert!(unit.delay.delays_ms.is_empty());
    }

    #[test]
    fn boot_screen_runs_before_main_page() {
        let mut unit = unit_with_store(MockStore::default());
        let config = BootConfig {
            boot_screen: true,
            ..BootConfig::default()
        };

        start(&mut unit, &config).unwrap();

        assert_eq!(
            unit.hmi.texts_for("boot_lab.txt"),
            vec!["Initializing...", "Init done", "Welcome!"]
        );
        assert_eq!(unit.delay.delays_ms, vec![2000, 1000, 2000]);
        assert_eq!(unit.hmi.ops.last(), Some(&HmiOp::Command("page page1".into())));
    }

    #[test]
    fn main_page_alone_skips_boot_text() {
        let mut unit = unit_with_store(MockStore::default());
        let config = BootConfig {
            open_main_page: true,
            ..BootConfig::default()
        };

        start(&mut unit, &config).unwrap();

        assert!(unit.hmi.texts_for("boot_lab.txt").is_empty());
        assert_eq!(unit.hmi.commands(), vec!["page page1"]);
    }

    #[test]
    fn default_mode_follows_features() {
        let config = BootConfig::from_features();
        if cfg!(feature = "hmi-update") {
            assert_eq!(config.mode, BootMode::HmiUpdate);
        } else {
            assert_eq!(config.mode, BootMode::Normal);
        }
        assert!(!config.boot_screen);
    }

    #[test]
    fn bridge_forwards_both_directions() {
        let mut monitor = MockSerial::default();
        let mut hmi = MockSerial::default();
        monitor.inbound.extend(b"whmi-wri 1234,9600,0");
        hmi.inbound.extend([0x05]);

        let moved = bridge_once(&mut monitor, &mut hmi).unwrap();

        assert_eq!(moved, 21);
        assert_eq!(hmi.written, b"whmi-wri 1234,9600,0");
        assert_eq!(monitor.written, vec![0x05]);
    }

    #[test]
    fn bridge_reports_idle() {
        let mut monitor = MockSerial::default();
        let mut hmi = MockSerial::default();
        assert_eq!(bridge_once(&mut monitor, &mut hmi).unwrap(), 0);
        assert!(monitor.written.is_empty());
        assert!(hmi.written.is_empty());
    }

    #[test]
    fn bridge_moves_large_bursts_in_chunks() {
        let mut monitor = MockSerial::default();
        let mut hmi = MockSerial::default();
        let payload: Vec<u8> = (0..=255u8).cycle().take(150).collect();
        monitor.inbound.extend(payload.iter().copied());

        let mut total = 0;
        while let Ok(n) = bridge_once(&mut monitor, &mut hmi) {
            if n == 0 {
                break;
            }
            total += n;
        }

        assert_eq!(total, 150);
        assert_eq!(hmi.written, payload);
    }
}
