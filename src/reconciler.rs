// Kaeppa Head Unit — Connection/Playback State Reconciler
//
// Runs once per main-loop iteration. Samples the sink's link flag, applies a
// transition when it changed, and keeps refreshing the connection labels
// while the peer's name is still unknown (the name usually arrives a few
// hundred milliseconds after the link comes up).
//
// Label writes always go text fields first, then color fields, with no
// delay in between.

use embedded_hal::digital::{OutputPin, PinState};

use crate::config::*;
use crate::drivers::{AudioSink, Hmi};
use crate::error::log_failure;
use crate::events::{LinkState, PlaybackState};
use crate::headunit::HeadUnitState;

pub fn reconcile<S, H, L>(state: &mut HeadUnitState, sink: &mut S, hmi: &mut H, led: &mut L)
where
    S: AudioSink,
    H: Hmi,
    L: OutputPin,
{
    let observed = LinkState::from_connected(sink.is_connected());

    if observed != state.link {
        if observed == LinkState::Connected {
            // The audio-state event may still be in flight.
            log_failure("Resume playback", sink.play());
            state.playback = sink.audio_state();
            update_play_pause_label(state.playback, hmi);
        }

        state.link = observed;
        refresh_connection_status(state, sink, hmi, led);

        log::info!("Last connection: {}", sink.last_peer());
        log::info!("Current connection: {}", sink.current_peer());
        log::info!("Current Bluetooth state: {}", state.link);
    }

    if state.link == LinkState::Connected && !state.source_name_known {
        refresh_connection_status(state, sink, hmi, led);
    }
}

/// Rewrite every connection-status field for the current link state.
pub fn refresh_connection_status<S, H, L>(
    state: &mut HeadUnitState,
    sink: &S,
    hmi: &mut H,
    led: &mut L,
) where
    S: AudioSink,
    H: Hmi,
    L: OutputPin,
{
    match state.link {
        LinkState::Connected => {
            let name = sink.connected_source_name();
            state.source_name_known = !name.is_empty();
            // A blank label still needs a space or the display keeps the old text.
            let shown = if name.is_empty() { " " } else { name.as_str() };

            log_failure("Status text", hmi.set_text(FIELD_BT_STATE_TEXT, "CONNECTED"));
            log_failure("Peer text", hmi.set_text(FIELD_BT_PEER_TEXT, shown));
            log_failure("Status color", hmi.set_number(FIELD_BT_STATE_COLOR, COLOR_CONNECTED));
            log_failure("Peer color", hmi.set_number(FIELD_BT_PEER_COLOR, COLOR_CONNECTED));

            log::info!("Bluetooth state: CONNECTED, {}", name);
            set_indicator(led, true);
        }
        LinkState::Disconnected => {
            state.source_name_known = false;
            let last = sink.last_peer().to_string();

            log_failure("Status text", hmi.set_text(FIELD_BT_STATE_TEXT, "DISCONNECTED"));
            log_failure("Peer text", hmi.set_text(FIELD_BT_PEER_TEXT, &last));
            log_failure("Artist clear", hmi.set_text(FIELD_ARTIST, ""));
            log_failure("Song clear", hmi.set_text(FIELD_SONG, ""));
            log_failure("Status color", hmi.set_number(FIELD_BT_STATE_COLOR, COLOR_DISCONNECTED));
            log_failure("Peer color", hmi.set_number(FIELD_BT_PEER_COLOR, COLOR_DISCONNECTED));

            log::info!("Bluetooth state: DISCONNECTED");
            set_indicator(led, false);
        }
        LinkState::Connecting => {}
    }
}

/// "Play" while suspended/stopped, "Pause" while streaming; other states
/// leave the button as it is.
pub fn update_play_pause_label<H: Hmi>(playback: PlaybackState, hmi: &mut H) {
    if let Some(label) = playback.button_label() {
        log_failure("Play/pause label", hmi.set_text(FIELD_PLAY_PAUSE, label));
    }
}

fn set_indicator<L: OutputPin>(led: &mut L, on: bool) {
    if let Err(e) = led.set_state(PinState::from(on)) {
        log::warn!("Indicator: {:?}", e);
    }
}
