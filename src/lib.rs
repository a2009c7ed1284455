// Kaeppa Head Unit — Reconciliation Core
//
// Everything here is hardware-agnostic: the ESP32 bindings sit behind the
// traits in `drivers` and are only compiled with the `esp` feature. The
// firmware entry point lives in `main.rs`.

pub mod boot;
pub mod brightness;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod headunit;
pub mod metadata;
pub mod nextion;
pub mod reconciler;
pub mod transport;

#[cfg(test)]
mod mocks;

pub use boot::{BootConfig, BootMode};
pub use error::Error;
pub use headunit::{HeadUnit, HeadUnitState};
