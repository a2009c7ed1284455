// Kaeppa Head Unit — NVS-backed EEPROM Emulation
//
// The whole 12-byte region is one NVS blob. Writes land in a RAM copy and
// reach flash on `commit`.

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

use crate::config::EEPROM_SIZE;
use crate::drivers::PersistentStore;
use crate::error::Error;

const NAMESPACE: &str = "headunit";
const BLOB_KEY: &str = "eeprom";

pub struct NvsStore {
    nvs: EspNvs<NvsDefault>,
    buffer: [u8; EEPROM_SIZE],
}

impl NvsStore {
    /// Open the region. A missing blob reads back as erased flash (0xFF).
    pub fn open(partition: EspDefaultNvsPartition) -> Result<Self, Error> {
        let nvs = EspNvs::new(partition, NAMESPACE, true).map_err(storage)?;

        let mut buffer = [0xFF; EEPROM_SIZE];
        let mut raw = [0u8; EEPROM_SIZE];
        if let Some(stored) = nvs.get_blob(BLOB_KEY, &mut raw).map_err(storage)? {
            let n = stored.len().min(EEPROM_SIZE);
            buffer[..n].copy_from_slice(&stored[..n]);
        } else {
            log::info!("No stored settings, starting from erased region");
        }

        Ok(Self { nvs, buffer })
    }
}

fn storage(e: esp_idf_sys::EspError) -> Error {
    Error::Storage(e.to_string())
}

fn out_of_range(offset: usize) -> Error {
    Error::Storage(format!("offset {} outside {}-byte region", offset, EEPROM_SIZE))
}

impl PersistentStore for NvsStore {
    fn read_byte(&mut self, offset: usize) -> Result<u8, Error> {
        self.buffer.get(offset).copied().ok_or_else(|| out_of_range(offset))
    }

    fn write_byte(&mut self, offset: usize, value: u8) -> Result<(), Error> {
        let slot = self.buffer.get_mut(offset).ok_or_else(|| out_of_range(offset))?;
        *slot = value;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Error> {
        // `set_blob` commits the NVS handle before returning.
        self.nvs.set_blob(BLOB_KEY, &self.buffer).map_err(storage)
    }
}
