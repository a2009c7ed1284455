// Kaeppa Head Unit — Owned State & Main-Loop Step
//
// All mutable state lives in `HeadUnitState`, owned by `HeadUnit` and only
// touched from the main loop. The Bluetooth stack never writes it directly:
// its callbacks push `SinkEvent`s onto a bounded queue that `service()`
// drains at the start of every iteration.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TryRecvError};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::brightness::{self, BrightnessIndex};
use crate::config::EVENT_QUEUE_DEPTH;
use crate::drivers::{AudioSink, Hmi, PersistentStore, System};
use crate::events::{LinkState, PlaybackState, SinkEvent, Trigger};
use crate::{metadata, reconciler, transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadUnitState {
    pub link: LinkState,
    pub playback: PlaybackState,
    pub source_name_known: bool,
    pub brightness: BrightnessIndex,
}

impl Default for HeadUnitState {
    fn default() -> Self {
        Self {
            // Starts "connected" so that the first poll without a link runs
            // the disconnect transition and paints the status labels.
            link: LinkState::Connected,
            playback: PlaybackState::default(),
            source_name_known: false,
            brightness: BrightnessIndex::default(),
        }
    }
}

pub struct HeadUnit<S, H, P, L, D, Y> {
    pub sink: S,
    pub hmi: H,
    pub store: P,
    pub led: L,
    pub delay: D,
    pub system: Y,
    state: HeadUnitState,
    events_tx: SyncSender<SinkEvent>,
    events_rx: Receiver<SinkEvent>,
}

impl<S, H, P, L, D, Y> HeadUnit<S, H, P, L, D, Y>
where
    S: AudioSink,
    H: Hmi,
    P: PersistentStore,
    L: OutputPin,
    D: DelayNs,
    Y: System,
{
    pub fn new(sink: S, hmi: H, store: P, led: L, delay: D, system: Y) -> Self {
        let (events_tx, events_rx) = sync_channel(EVENT_QUEUE_DEPTH);
        Self {
            sink,
            hmi,
            store,
            led,
            delay,
            system,
            state: HeadUnitState::default(),
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> &HeadUnitState {
        &self.state
    }

    /// A producer handle for the Bluetooth callbacks.
    pub fn event_sender(&self) -> SyncSender<SinkEvent> {
        self.events_tx.clone()
    }

    /// One main-loop iteration: queued sink events, then display triggers,
    /// then link reconciliation.
    pub fn service(&mut self) {
        self.drain_events();
        self.service_triggers();
        reconciler::reconcile(&mut self.state, &mut self.sink, &mut self.hmi, &mut self.led);
    }

    pub fn drain_events(&mut self) {
        loop {
            match self.events_rx.try_recv() {
                Ok(event) => self.handle_event(event),
                Err(TryRecvError::Empty) => return,
                // We hold a sender ourselves, so this cannot happen.
                Err(TryRecvError::Disconnected) => return,
            }
        }
    }

    pub fn service_triggers(&mut self) {
        loop {
            let id = match self.hmi.poll_trigger() {
                Ok(Some(id)) => id,
                Ok(None) => return,
                Err(e) => {
                    log::warn!("Display poll: {}", e);
                    return;
                }
            };

            match Trigger::from_id(id) {
                Some(trigger) => self.handle_trigger(trigger),
                None => log::warn!("Unknown trigger {}", id),
            }
        }
    }

    pub fn handle_trigger(&mut self, trigger: Trigger) {
        transport::handle(
            trigger,
            &mut self.state,
            &mut self.sink,
            &mut self.hmi,
            &mut self.store,
            &mut self.delay,
            &mut self.system,
        );
    }

    fn handle_event(&mut self, event: SinkEvent) {
        match event {
            SinkEvent::AudioStateChanged(playback) => {
                log::info!("{}", playback);
                self.state.playback = playback;
                reconciler::update_play_pause_label(playback, &mut self.hmi);
            }
            SinkEvent::Metadata { attribute, text } => {
                metadata::relay(attribute, &text, &mut self.hmi);
            }
        }
    }

    /// Load the persisted brightness index and push it to the display.
    pub fn restore_brightness(&mut self) {
        brightness::restore(&mut self.state.brightness, &mut self.hmi, &mut self.store);
    }
}
