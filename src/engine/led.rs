//! Mirroring the FN lock onto a keyboard LED.
//!
//! The indicator is driven by tapping the LED's lock key on the virtual keyboard, so the OS
//! flips its own lock state and relights the LED. The batch also carries the `EV_LED` value
//! that should result.

use super::*;

impl Engine {
    /// Events that bring the configured LED in line with the lock state, or `None` if no LED
    /// is configured or it already matches.
    pub fn led_sync_batch(&self, leds: &LedState) -> Option<Vec<InputEvent>> {
        let led = self.cfg.use_led?;
        if leds.get(led) == self.fn_enabled {
            return None;
        }
        let mut batch = Vec::with_capacity(8);
        if let Some(key) = led.lock_key() {
            batch.extend(synthetic_key(key, KeyValue::Press));
            batch.extend(synthetic_key(key, KeyValue::Release));
        }
        batch.push(InputEvent::led(led, self.fn_enabled));
        batch.push(InputEvent::sync_report());
        Some(batch)
    }
}

/// Read the physical LEDs and write a correcting batch if needed.
///
/// Failures are logged and otherwise ignored; the next sync gets another chance.
pub fn sync_led(engine: &Engine, kbd_in: &mut dyn KbdIn, kbd_out: &mut dyn KbdOut) {
    let Some(led) = engine.config().use_led else {
        return;
    };
    let leds = match kbd_in.led_state() {
        Ok(leds) => leds,
        Err(e) => {
            log::warn!("could not read LED state: {e}");
            return;
        }
    };
    let Some(batch) = engine.led_sync_batch(&leds) else {
        log::trace!("{led} already matches FN lock");
        return;
    };
    log::debug!(
        "setting {led} {}",
        if engine.fn_enabled() { "on" } else { "off" }
    );
    if let Err(e) = kbd_out.write_batch(&batch) {
        log::warn!("could not write LED sync: {e}");
    }
}
