// Kaeppa Head Unit — Collaborator Errors
//
// The reconciliation core never aborts on these: a failed collaborator call
// is logged and the current step carries on. Only boot propagates them (via
// `anyhow`), before the main loop runs.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Writing a frame to the display failed.
    #[error("display write failed: {0}")]
    Display(String),

    /// Persistent store read, write or commit failed.
    #[error("persistent store failure: {0}")]
    Storage(String),

    /// The Bluetooth stack rejected a call.
    #[error("bluetooth stack error: {0}")]
    Bluetooth(String),

    /// The I2S output could not be set up or written.
    #[error("audio output error: {0}")]
    Audio(String),

    /// Raw serial transport failure (pass-through bridge or HMI link).
    #[error("serial transport error: {0}")]
    Serial(String),

    /// The status LED could not be driven.
    #[error("indicator output failed")]
    Indicator,

    /// The sink event queue is full; the event was dropped.
    #[error("event queue full")]
    QueueFull,

    /// The event queue consumer is gone.
    #[error("event queue closed")]
    QueueClosed,
}

/// Log a failed collaborator call and carry on.
pub(crate) fn log_failure(context: &str, result: Result<(), Error>) {
    if let Err(e) = result {
        log::warn!("{}: {}", context, e);
    }
}
