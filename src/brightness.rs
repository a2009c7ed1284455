// Kaeppa Head Unit — Display Brightness Store
//
// Brightness is one of a few fixed duty levels. The selected index is kept in
// byte 0 of the persistent store so it survives power cycles.

use crate::config::*;
use crate::drivers::{Hmi, PersistentStore};
use crate::error::log_failure;

/// Index into [`BRIGHTNESS_LEVELS`]; always in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightnessIndex(usize);

impl BrightnessIndex {
    const MAX: usize = BRIGHTNESS_LEVELS.len() - 1;

    /// Accept a persisted byte only if it names a table entry.
    pub fn from_persisted(byte: u8) -> Option<Self> {
        let index = byte as usize;
        (index <= Self::MAX).then_some(Self(index))
    }

    pub fn get(&self) -> usize {
        self.0
    }

    pub fn percent(&self) -> u8 {
        BRIGHTNESS_LEVELS[self.0]
    }

    pub fn increased(self) -> Self {
        Self((self.0 + 1).min(Self::MAX))
    }

    pub fn decreased(self) -> Self {
        Self(self.0.saturating_sub(1))
    }
}

impl Default for BrightnessIndex {
    fn default() -> Self {
        Self(BRIGHTNESS_DEFAULT_INDEX)
    }
}

/// One step brighter (saturating), then push and persist.
pub fn increase<H: Hmi, P: PersistentStore>(
    index: &mut BrightnessIndex,
    hmi: &mut H,
    store: &mut P,
) {
    *index = index.increased();
    apply(*index, hmi, store);
}

/// One step dimmer (saturating), then push and persist.
pub fn decrease<H: Hmi, P: PersistentStore>(
    index: &mut BrightnessIndex,
    hmi: &mut H,
    store: &mut P,
) {
    *index = index.decreased();
    apply(*index, hmi, store);
}

/// Boot-time load. An unreadable or out-of-range byte leaves `index`
/// untouched and nothing is written back.
pub fn restore<H: Hmi, P: PersistentStore>(
    index: &mut BrightnessIndex,
    hmi: &mut H,
    store: &mut P,
) {
    let byte = match store.read_byte(BRIGHTNESS_ADDR) {
        Ok(b) => b,
        Err(e) => {
            log::warn!("Brightness restore: {}", e);
            return;
        }
    };
    log::info!("Read last brightness index {}", byte);

    if let Some(persisted) = BrightnessIndex::from_persisted(byte) {
        *index = persisted;
        push_to_display(*index, hmi);
    }
}

fn apply<H: Hmi, P: PersistentStore>(index: BrightnessIndex, hmi: &mut H, store: &mut P) {
    push_to_display(index, hmi);

    log_failure(
        "Brightness write",
        store.write_byte(BRIGHTNESS_ADDR, index.get() as u8),
    );
    log_failure("Brightness commit", store.commit());

    log::info!("Screen brightness: {}", index.percent());
}

fn push_to_display<H: Hmi>(index: BrightnessIndex, hmi: &mut H) {
    let command = format!("dim={}", index.percent());
    log_failure("Brightness command", hmi.command(&command));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockHmi, MockStore};

    #[test]
    fn default_index_is_ten_percent() {
        let index = BrightnessIndex::default();
        assert_eq!(index.get(), 2);
        assert_eq!(index.percent(), 10);
    }

    #[test]
    fn increase_saturates_at_top() {
        let mut index = BrightnessIndex::default();
        let mut hmi = MockHmi::default();
        let mut store = MockStore::default();

        for _ in 0..6 {
            increase(&mut index, &mut hmi, &mut store);
        }

        assert_eq!(index.get(), 5);
        assert_eq!(index.percent(), 100);
        assert_eq!(store.committed[BRIGHTNESS_ADDR], 5);
        assert_eq!(store.commits, 6);
        assert_eq!(
            hmi.commands(),
            vec!["dim=40", "dim=60", "dim=100", "dim=100", "dim=100", "dim=100"]
        );
    }

    #[test]
    fn decrease_from_top_reaches_sixty() {
        let mut index = BrightnessIndex::from_persisted(5).unwrap();
        let mut hmi = MockHmi::default();
        let mut store = MockStore::default();

        decrease(&mut index, &mut hmi, &mut store);

        assert_eq!(index.get(), 4);
        assert_eq!(index.percent(), 60);
        assert_eq!(store.committed[BRIGHTNESS_ADDR], 4);
    }

    #[test]
    fn decrease_saturates_at_zero() {
        let mut index = BrightnessIndex::from_persisted(0).unwrap();
        let mut hmi = MockHmi::default();
        let mut store = MockStore::default();

        decrease(&mut index, &mut hmi, &mut store);

        assert_eq!(index.get(), 0);
        assert_eq!(hmi.commands(), vec!["dim=1"]);
        // Still persisted, so the write is durable even when clamped.
        assert_eq!(store.commits, 1);
    }

    #[test]
    fn every_change_is_committed_before_returning() {
        let mut index = BrightnessIndex::default();
        let mut hmi = MockHmi::default();
        let mut store = MockStore::default();

        increase(&mut index, &mut hmi, &mut store);
        assert_eq!(store.committed, store.buffered);
        decrease(&mut index, &mut hmi, &mut store);
        assert_eq!(store.committed, store.buffered);
        assert_eq!(store.committed[BRIGHTNESS_ADDR], 2);
    }

    #[test]
    fn restore_adopts_valid_byte() {
        let mut index = BrightnessIndex::default();
        let mut hmi = MockHmi::default();
        let mut store = MockStore::with_byte(BRIGHTNESS_ADDR, 4);

        restore(&mut index, &mut hmi, &mut store);

        assert_eq!(index.get(), 4);
        assert_eq!(hmi.commands(), vec!["dim=60"]);
        assert_eq!(store.writes, 0);
    }

    #[test]
    fn restore_rejects_out_of_range_without_writing() {
        let mut index = BrightnessIndex::default();
        let mut hmi = MockHmi::default();
        let mut store = MockStore::with_byte(BRIGHTNESS_ADDR, 7);

        restore(&mut index, &mut hmi, &mut store);

        assert_eq!(index, BrightnessIndex::default());
        assert!(hmi.ops.is_empty());
        assert_eq!(store.writes, 0);
        assert_eq!(store.commits, 0);
    }

    #[test]
    fn restore_rejects_erased_flash() {
        let mut index = BrightnessIndex::default();
        let mut hmi = MockHmi::default();
        let mut store = MockStore::default();

        restore(&mut index, &mut hmi, &mut store);

        assert_eq!(index.get(), BRIGHTNESS_DEFAULT_INDEX);
        assert_eq!(store.writes, 0);
    }
}
