// Kaeppa Head Unit — Device Restart

use crate::drivers::System;

pub struct EspSystem;

impl System for EspSystem {
    fn restart(&mut self) {
        log::warn!("Restarting");
        esp_idf_hal::reset::restart();
    }
}
