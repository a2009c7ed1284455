// Kaeppa Head Unit — Nextion HMI Driver
//
// Outbound: ASCII instructions terminated by three 0xFF bytes.
// Inbound:  custom trigger frames `# 0x02 T <id>` (sent by `printh 23 02 54 xx`
// in the HMI project). Every other byte the display emits (return codes,
// touch events, ready signals) is skipped.

use crate::drivers::{Hmi, SerialPort};
use crate::error::Error;

pub const TERMINATOR: [u8; 3] = [0xFF, 0xFF, 0xFF];

const FRAME_START: u8 = b'#';
const TRIGGER_LEN: u8 = 0x02;
const TRIGGER_KIND: u8 = b'T';

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Append `command` and the terminator to `out`.
pub fn encode_command(out: &mut Vec<u8>, command: &str) {
    out.extend_from_slice(command.as_bytes());
    out.extend_from_slice(&TERMINATOR);
}

/// `field="text"` with quotes and backslashes escaped. Line breaks (`\n`,
/// `\r` or `\r\n`) become the Nextion `\r` escape.
pub fn encode_text(out: &mut Vec<u8>, field: &str, text: &str) {
    out.extend_from_slice(field.as_bytes());
    out.extend_from_slice(b"=\"");
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\r' | '\n' => {
                if c == '\r' {
                    chars.next_if_eq(&'\n');
                }
                out.extend_from_slice(b"\\r");
            }
            _ => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
    out.extend_from_slice(&TERMINATOR);
}

/// `field=value`
pub fn encode_number(out: &mut Vec<u8>, field: &str, value: u32) {
    out.extend_from_slice(field.as_bytes());
    out.push(b'=');
    out.extend_from_slice(value.to_string().as_bytes());
    out.extend_from_slice(&TERMINATOR);
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Idle,
    Length,
    Kind,
    Id,
}

/// Byte-at-a-time parser for inbound trigger frames.
#[derive(Debug)]
pub struct TriggerParser {
    state: ParseState,
}

impl TriggerParser {
    pub const fn new() -> Self {
        Self {
            state: ParseState::Idle,
        }
    }

    /// Feed one byte; returns the trigger number once a frame completes.
    pub fn push(&mut self, byte: u8) -> Option<u8> {
        self.state = match (self.state, byte) {
            (ParseState::Idle, FRAME_START) => ParseState::Length,
            (ParseState::Idle, _) => ParseState::Idle,
            (ParseState::Length, TRIGGER_LEN) => ParseState::Kind,
            (ParseState::Kind, TRIGGER_KIND) => ParseState::Id,
            (ParseState::Id, id) => {
                self.state = ParseState::Idle;
                return Some(id);
            }
            // Malformed header: resynchronise, but a fresh '#' may start a frame.
            (_, FRAME_START) => ParseState::Length,
            (_, _) => ParseState::Idle,
        };
        None
    }
}

impl Default for TriggerParser {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Display driver
// ---------------------------------------------------------------------------

const RX_CHUNK: usize = 32;

pub struct NextionDisplay<P: SerialPort> {
    port: P,
    parser: TriggerParser,
    pending: std::collections::VecDeque<u8>,
    tx: Vec<u8>,
}

impl<P: SerialPort> NextionDisplay<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            parser: TriggerParser::new(),
            pending: std::collections::VecDeque::new(),
            tx: Vec::with_capacity(64),
        }
    }

    /// Give the serial port back.
    pub fn release(self) -> P {
        self.port
    }

    fn flush_tx(&mut self) -> Result<(), Error> {
        let result = self.port.write_all(&self.tx);
        self.tx.clear();
        result.map_err(|e| Error::Display(e.to_string()))
    }
}

impl<P: SerialPort> Hmi for NextionDisplay<P> {
    fn set_text(&mut self, field: &str, text: &str) -> Result<(), Error> {
        encode_text(&mut self.tx, field, text);
        self.flush_tx()
    }

    fn set_number(&mut self, field: &str, value: u32) -> Result<(), Error> {
        encode_number(&mut self.tx, field, value);
        self.flush_tx()
    }

    fn command(&mut self, command: &str) -> Result<(), Error> {
        encode_command(&mut self.tx, command);
        self.flush_tx()
    }

    fn poll_trigger(&mut self) -> Result<Option<u8>, Error> {
        loop {
            while let Some(byte) = self.pending.pop_front() {
                if let Some(id) = self.parser.push(byte) {
                    return Ok(Some(id));
                }
            }

            let mut buf = [0u8; RX_CHUNK];
            let n = self.port.read_available(&mut buf)?;
            if n == 0 {
                return Ok(None);
            }
            self.pending.extend(&buf[..n]);
        }
    }
}
