//! Linux key codes, keyboard LEDs and the key-state bitsets built on them.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap as HashMap;
use std::fmt;

mod names;
use names::*;

mod bits;
pub use bits::*;

/// Number of key codes in the Linux `EV_KEY` domain.
pub const KEY_CNT: usize = 0x300;

/// Number of LED codes in the Linux `EV_LED` domain.
pub const LED_CNT: usize = 0x10;

/// A Linux `EV_KEY` code.
///
/// The full kernel domain is representable; only codes below [`KEY_CNT`] are valid.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub const fn code(self) -> u16 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        usize::from(self.0) < KEY_CNT
    }

    /// Kernel name of the key, e.g. `KEY_F1`.
    pub fn name(self) -> Option<&'static str> {
        NAMES_BY_CODE.get(usize::from(self.0)).copied().flatten()
    }

    /// Name used when writing configuration files, e.g. `f1`.
    pub fn short_name(self) -> String {
        match self.name() {
            Some(n) => n.trim_start_matches("KEY_").to_ascii_lowercase(),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(n) => f.write_str(n),
            None => write!(f, "KEY_{}", self.0),
        }
    }
}

impl fmt::Debug for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<u16> for KeyCode {
    fn from(item: u16) -> Self {
        Self(item)
    }
}

impl From<KeyCode> for u16 {
    fn from(item: KeyCode) -> Self {
        item.0
    }
}

impl From<KeyCode> for usize {
    fn from(item: KeyCode) -> Self {
        usize::from(item.0)
    }
}

/// A Linux `EV_LED` code.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Led(pub u16);

impl Led {
    pub const fn code(self) -> u16 {
        self.0
    }

    pub fn name(self) -> Option<&'static str> {
        LED_NAMES
            .iter()
            .find(|(led, _)| *led == self)
            .map(|(_, name)| *name)
    }

    pub fn short_name(self) -> String {
        match self.name() {
            Some(n) => n.trim_start_matches("LED_").to_ascii_lowercase(),
            None => self.to_string(),
        }
    }

    /// The lock key whose OS-side state drives this LED, if there is one.
    pub fn lock_key(self) -> Option<KeyCode> {
        Some(match self {
            Led::LED_NUML => KeyCode::KEY_NUMLOCK,
            Led::LED_CAPSL => KeyCode::KEY_CAPSLOCK,
            Led::LED_SCROLLL => KeyCode::KEY_SCROLLLOCK,
            Led::LED_COMPOSE => KeyCode::KEY_COMPOSE,
            Led::LED_KANA => KeyCode::KEY_KATAKANA,
            _ => return None,
        })
    }
}

impl fmt::Display for Led {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(n) => f.write_str(n),
            None => write!(f, "LED_{}", self.0),
        }
    }
}

impl fmt::Debug for Led {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

static NAMES_BY_CODE: Lazy<Vec<Option<&'static str>>> = Lazy::new(|| {
    let mut names = vec![None; KEY_CNT];
    for (code, name) in KEY_NAMES {
        if *code == KeyCode::KEY_MAX {
            continue;
        }
        if let Some(slot) = names.get_mut(usize::from(code.0)) {
            slot.get_or_insert(*name);
        }
    }
    names
});

static STRS_TO_KEYCODES: Lazy<HashMap<String, KeyCode>> = Lazy::new(|| {
    let mut mappings = HashMap::default();
    for (code, name) in KEY_NAMES {
        if *code == KeyCode::KEY_MAX {
            continue;
        }
        mappings.insert(normalize(name, "KEY_"), *code);
    }
    for (alias, code) in KEY_ALIASES {
        mappings.entry(alias.to_string()).or_insert(*code);
    }
    mappings.shrink_to_fit();
    mappings
});

fn normalize(s: &str, prefix: &str) -> String {
    let lower = s.to_ascii_lowercase();
    match lower.strip_prefix(&prefix.to_ascii_lowercase()) {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => lower,
    }
}

/// Convert a `&str` to a `KeyCode`.
///
/// Accepts the kernel name (`KEY_VOLUMEUP`), the name without its prefix in any case
/// (`volumeup`, `VolumeUp`) and a few short aliases such as `lsft` or `bspc`. Codes without
/// a name can be written as `KEY_<n>`, which is also how they are displayed.
pub fn str_to_keycode(s: &str) -> Option<KeyCode> {
    let name = normalize(s, "KEY_");
    if let Some(code) = STRS_TO_KEYCODES.get(&name) {
        return Some(*code);
    }
    if name.len() == s.len() {
        return None;
    }
    name.parse::<u16>()
        .ok()
        .map(KeyCode)
        .filter(|k| k.is_valid())
}

/// Convert a `&str` to a `Led`, with the same naming rules as [`str_to_keycode`].
pub fn str_to_led(s: &str) -> Option<Led> {
    let wanted = normalize(s, "LED_");
    LED_NAMES
        .iter()
        .filter(|(led, _)| *led != Led::LED_MAX)
        .find(|(_, name)| normalize(name, "LED_") == wanted)
        .map(|(led, _)| *led)
}

/// Every named key, in code order.
pub fn all_key_names() -> impl Iterator<Item = (KeyCode, &'static str)> {
    KEY_NAMES
        .iter()
        .filter(|(code, _)| *code != KeyCode::KEY_MAX)
        .map(|(code, name)| (*code, *name))
}

/// Every named LED, in code order.
pub fn all_led_names() -> impl Iterator<Item = (Led, &'static str)> {
    LED_NAMES
        .iter()
        .filter(|(led, _)| *led != Led::LED_MAX)
        .map(|(led, name)| (*led, *name))
}
