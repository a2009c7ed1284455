// Kaeppa Head Unit — UART Serial Port
//
// Thin `SerialPort` adapter over the esp-idf-hal UART driver. Used for the
// Nextion link and, in HMI update mode, for the diagnostic port.

use esp_idf_hal::delay::NON_BLOCK;
use esp_idf_hal::gpio::{InputPin, OutputPin};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::prelude::*;
use esp_idf_hal::uart::{config::Config, Uart, UartDriver};

use crate::drivers::SerialPort;
use crate::error::Error;

pub struct UartPort {
    uart: UartDriver<'static>,
}

impl UartPort {
    /// 8N1 at `baud`, no flow control.
    pub fn new(
        uart: impl Peripheral<P = impl Uart> + 'static,
        tx: impl Peripheral<P = impl OutputPin> + 'static,
        rx: impl Peripheral<P = impl InputPin> + 'static,
        baud: u32,
    ) -> Result<Self, Error> {
        let config = Config::default().baudrate(Hertz(baud));
        let uart = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<esp_idf_hal::gpio::AnyIOPin>::None,
            Option::<esp_idf_hal::gpio::AnyIOPin>::None,
            &config,
        )
        .map_err(serial)?;
        Ok(Self { uart })
    }
}

fn serial(e: esp_idf_sys::EspError) -> Error {
    Error::Serial(e.to_string())
}

impl SerialPort for UartPort {
    fn write_all(&mut self, mut bytes: &[u8]) -> Result<(), Error> {
        while !bytes.is_empty() {
            let n = self.uart.write(bytes).map_err(serial)?;
            bytes = &bytes[n..];
        }
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        self.uart.read(buf, NON_BLOCK).map_err(serial)
    }
}
