// Kaeppa Head Unit — Firmware Entry Point
//
// Boot sequence:
//   1. Logger, peripherals.
//   2. HMI update build: bridge the diagnostic UART to the display UART
//      forever.
//   3. Otherwise: open the settings store, the Nextion link, the status LED
//      and the Bluetooth sink, then run the boot sequencer.
//   4. Main loop: `HeadUnit::service()` (sink events, display triggers,
//      link reconciliation).

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::PinDriver;
use esp_idf_hal::prelude::*;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use headunit::boot::{self, BootConfig, BootMode};
use headunit::config::*;
use headunit::drivers::esp_a2dp::EspA2dpSink;
use headunit::drivers::esp_nvs::NvsStore;
use headunit::drivers::esp_system::EspSystem;
use headunit::drivers::esp_uart::UartPort;
use headunit::nextion::NextionDisplay;
use headunit::HeadUnit;

fn main() -> anyhow::Result<()> {
    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    let config = BootConfig::from_features();

    // ---- Peripherals ------------------------------------------------------
    let peripherals = Peripherals::take()?;

    // Display on UART2: TX gpio17, RX gpio16.
    let hmi_port = UartPort::new(
        peripherals.uart2,
        peripherals.pins.gpio17,
        peripherals.pins.gpio16,
        HMI_BAUD,
    )?;

    if config.mode == BootMode::HmiUpdate {
        // Diagnostic UART0: TX gpio1, RX gpio3.
        let mut monitor = UartPort::new(
            peripherals.uart0,
            peripherals.pins.gpio1,
            peripherals.pins.gpio3,
            MONITOR_BAUD,
        )?;
        let mut hmi_port = hmi_port;
        boot::run_hmi_update(&mut monitor, &mut hmi_port, &mut FreeRtos);
    }

    // ---- Collaborators ----------------------------------------------------
    let nvs = EspDefaultNvsPartition::take()?;
    let store = NvsStore::open(nvs.clone())?;
    let hmi = NextionDisplay::new(hmi_port);
    // Status LED on gpio5: gpio2 is the I2S DATA line.
    let led = PinDriver::output(peripherals.pins.gpio5)?;
    let sink = EspA2dpSink::new(peripherals.modem, peripherals.i2s0, nvs)?;

    let mut unit = HeadUnit::new(sink, hmi, store, led, FreeRtos, EspSystem);
    boot::start(&mut unit, &config)?;

    // ---- Main loop --------------------------------------------------------
    loop {
        unit.service();
        FreeRtos::delay_ms(LOOP_YIELD_MS);
    }
}
