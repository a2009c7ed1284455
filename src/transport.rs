// Kaeppa Head Unit — Transport Control Relay
//
// Maps display triggers to sink commands. Every handler ends with the
// acknowledgement pulse on `sig_ok_lab`, whether or not the command applied:
// the flash confirms the press was received, not that it succeeded.

use embedded_hal::delay::DelayNs;

use crate::brightness;
use crate::config::*;
use crate::drivers::{AudioSink, Hmi, PersistentStore, System};
use crate::error::log_failure;
use crate::events::{LinkState, PlaybackState, Trigger};
use crate::headunit::HeadUnitState;

pub fn handle<S, H, P, D, Y>(
    trigger: Trigger,
    state: &mut HeadUnitState,
    sink: &mut S,
    hmi: &mut H,
    store: &mut P,
    delay: &mut D,
    system: &mut Y,
) where
    S: AudioSink,
    H: Hmi,
    P: PersistentStore,
    D: DelayNs,
    Y: System,
{
    match trigger {
        Trigger::Previous => {
            log::info!("Previous button triggered");
            log_failure("Previous", sink.previous());
        }
        Trigger::PlayPause => {
            log::info!("Play/Pause button triggered ({})", state.playback);
            match state.playback {
                PlaybackState::RemoteSuspend | PlaybackState::Stopped => {
                    log_failure("Play", sink.play())
                }
                PlaybackState::Started => log_failure("Pause", sink.pause()),
                PlaybackState::Unknown => {}
            }
        }
        Trigger::Next => {
            log::info!("Next button triggered");
            log_failure("Next", sink.next());
        }
        Trigger::LinkToggle => {
            log::info!("Bluetooth button triggered");
            if state.link == LinkState::Connected {
                log::info!("Disconnect bluetooth");
                log_failure("Disconnect", sink.disconnect());
            } else {
                // Restarting is the quickest way back to a connectable state.
                log::info!("No link, restarting");
                system.restart();
            }
        }
        Trigger::BrightnessUp => {
            log::info!("Brightness increase triggered");
            brightness::increase(&mut state.brightness, hmi, store);
        }
        Trigger::BrightnessDown => {
            log::info!("Brightness decrease triggered");
            brightness::decrease(&mut state.brightness, hmi, store);
        }
    }

    acknowledge(hmi, delay);
}

/// Flash the receipt indicator: on, short hold, back to idle.
pub fn acknowledge<H: Hmi, D: DelayNs>(hmi: &mut H, delay: &mut D) {
    log_failure("Ack flash", hmi.set_number(FIELD_ACK_COLOR, COLOR_ACK_FLASH));
    delay.delay_ms(ACK_PULSE_MS);
    log_failure("Ack idle", hmi.set_number(FIELD_ACK_COLOR, COLOR_ACK_IDLE));
}
