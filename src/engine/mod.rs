//! Rewrites batches of input events according to a [`RemapConfig`].
//!
//! The engine owns the session state: which keys are held, whether FN lock is on, and the last
//! key seen. For each key event in a batch:
//!
//! - the FN key is always emitted as `KEY_FN`. Tapping it alone, with nothing else held and
//!   no other key in between, flips the lock.
//! - any other key is looked up, first match wins:
//!   1. FN and a third-level key held: `shift_key_map`. The held third-level keys are released
//!      before the batch and pressed again after it.
//!   2. FN held: `mod_key_map`.
//!   3. FN held while the lock is off, or FN not held while the lock is on: `key_map`.
//!
//! Other events pass through untouched and in order.

use std::sync::Arc;

use fnkeyd_parser::cfg::RemapConfig;
use fnkeyd_parser::keys::*;

use crate::oskbd::*;

mod led;
pub use led::*;

/// Output of one [`Engine::handle_events`] call.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Processed {
    pub events: Vec<InputEvent>,
    /// FN lock flipped at least once while handling the batch.
    pub fn_toggled: bool,
}

pub struct Engine {
    cfg: Arc<RemapConfig>,
    fn_enabled: bool,
    key_state: KeyState,
    last_key: KeyCode,
}

impl Engine {
    pub fn new(cfg: Arc<RemapConfig>) -> Self {
        Self {
            fn_enabled: cfg.fn_enabled,
            cfg,
            key_state: KeyState::new(),
            last_key: KeyCode::KEY_RESERVED,
        }
    }

    pub fn fn_enabled(&self) -> bool {
        self.fn_enabled
    }

    pub fn key_state(&self) -> &KeyState {
        &self.key_state
    }

    pub fn config(&self) -> &Arc<RemapConfig> {
        &self.cfg
    }

    /// Install a new configuration. The lock state restarts from the new configuration's
    /// `fn_enabled`; held keys are kept.
    pub fn set_config(&mut self, cfg: Arc<RemapConfig>) {
        self.fn_enabled = cfg.fn_enabled;
        self.cfg = cfg;
        log::info!(
            "configuration replaced, FN lock {}",
            on_off(self.fn_enabled)
        );
    }

    pub fn handle_events(&mut self, mut events: Vec<InputEvent>) -> Processed {
        let mut prefix = vec![];
        let mut suffix = vec![];
        let mut fn_toggled = false;

        for ev in events.iter_mut() {
            log::trace!("{ev}");
            let Some(code) = ev.key_code() else {
                continue;
            };
            self.key_state.set(code, ev.value != 0);

            if code == self.cfg.fn_key {
                if ev.value == 0 && self.last_key == self.cfg.fn_key && self.key_state.is_zero() {
                    self.fn_enabled = !self.fn_enabled;
                    fn_toggled = true;
                    log::info!("FN lock {}", on_off(self.fn_enabled));
                }
                ev.code = KeyCode::KEY_FN.code();
            } else if let Some(to) = self.lookup(code, &mut prefix, &mut suffix) {
                log::debug!("map {code} -> {to}");
                ev.code = to.code();
            }

            self.last_key = code;
        }

        if !prefix.is_empty() || !suffix.is_empty() {
            prefix.extend(events);
            prefix.extend(suffix);
            events = prefix;
        }
        Processed { events, fn_toggled }
    }

    /// Find the replacement for `code`, if any. A third-level match appends the shift
    /// release/restore events to `prefix` and `suffix`.
    fn lookup(
        &self,
        code: KeyCode,
        prefix: &mut Vec<InputEvent>,
        suffix: &mut Vec<InputEvent>,
    ) -> Option<KeyCode> {
        let cfg = &*self.cfg;
        let fn_held = self.key_state.get(cfg.fn_key);

        if fn_held {
            if let Some(to) = cfg.shift_key_map.get(code) {
                let held_shifts: Vec<KeyCode> = cfg
                    .third_level_keys
                    .iter()
                    .copied()
                    .filter(|k| self.key_state.get(*k))
                    .collect();
                if !held_shifts.is_empty() {
                    for shift in held_shifts {
                        prefix.extend(synthetic_key(shift, KeyValue::Release));
                        suffix.extend(synthetic_key(shift, KeyValue::Press));
                    }
                    return Some(to);
                }
            }
            if let Some(to) = cfg.mod_key_map.get(code) {
                return Some(to);
            }
        }

        match cfg.key_map.get(code) {
            Some(to) if fn_held != self.fn_enabled => Some(to),
            _ => None,
        }
    }
}

/// A key event the way a keyboard reports it: scan code, key, report.
pub fn synthetic_key(code: KeyCode, value: KeyValue) -> [InputEvent; 3] {
    [
        InputEvent::msc_scan(code),
        InputEvent::key(code, value),
        InputEvent::sync_report(),
    ]
}

fn on_off(b: bool) -> &'static str {
    if b {
        "on"
    } else {
        "off"
    }
}
