// Kaeppa Head Unit — Track Metadata Relay
//
// Forwards AVRCP title/artist attributes to their display labels. One display
// write at most per attribute; unknown ids are dropped.

use crate::config::{FIELD_ARTIST, FIELD_SONG};
use crate::drivers::Hmi;
use crate::error::log_failure;
use crate::events::{ATTR_ARTIST, ATTR_TITLE};

/// AVRCP attribute mask requested at boot.
pub const METADATA_MASK: u8 = ATTR_TITLE | ATTR_ARTIST;

fn field_for(attribute: u8) -> Option<&'static str> {
    match attribute {
        ATTR_TITLE => Some(FIELD_SONG),
        ATTR_ARTIST => Some(FIELD_ARTIST),
        _ => None,
    }
}

pub fn relay<H: Hmi>(attribute: u8, text: &str, hmi: &mut H) {
    let Some(field) = field_for(attribute) else {
        log::debug!("Ignoring metadata attribute 0x{:x}", attribute);
        return;
    };

    log::debug!("{}", text);
    log_failure("Metadata write", hmi.set_text(field, text));
}
