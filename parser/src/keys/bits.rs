use super::{KeyCode, Led, KEY_CNT, LED_CNT};

/// Pressed/released state of every key code, one bit per key.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyState {
    bits: [u8; KEY_CNT / 8],
}

impl Default for KeyState {
    fn default() -> Self {
        Self {
            bits: [0; KEY_CNT / 8],
        }
    }
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codes outside the key domain read as released.
    pub fn get(&self, key: KeyCode) -> bool {
        let k = usize::from(key);
        match self.bits.get(k / 8) {
            Some(byte) => byte & (1 << (k % 8)) != 0,
            None => false,
        }
    }

    /// Codes outside the key domain are ignored.
    pub fn set(&mut self, key: KeyCode, pressed: bool) {
        let k = usize::from(key);
        if let Some(byte) = self.bits.get_mut(k / 8) {
            if pressed {
                *byte |= 1 << (k % 8);
            } else {
                *byte &= !(1 << (k % 8));
            }
        }
    }

    /// True if no key is held.
    pub fn is_zero(&self) -> bool {
        self.bits.iter().all(|b| *b == 0)
    }

    /// Keys currently held, in code order.
    pub fn iter(&self) -> impl Iterator<Item = KeyCode> + '_ {
        (0..KEY_CNT as u16)
            .map(KeyCode)
            .filter(move |k| self.get(*k))
    }

    pub fn insert_all(&mut self, keys: impl IntoIterator<Item = KeyCode>) {
        for k in keys {
            self.set(k, true);
        }
    }
}

impl FromIterator<KeyCode> for KeyState {
    fn from_iter<I: IntoIterator<Item = KeyCode>>(iter: I) -> Self {
        let mut s = Self::default();
        s.insert_all(iter);
        s
    }
}

impl std::fmt::Debug for KeyState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// On/off state of every keyboard LED.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct LedState {
    bits: u16,
}

impl LedState {
    pub fn get(&self, led: Led) -> bool {
        usize::from(led.0) < LED_CNT && self.bits & (1 << led.0) != 0
    }

    pub fn set(&mut self, led: Led, on: bool) {
        if usize::from(led.0) >= LED_CNT {
            return;
        }
        if on {
            self.bits |= 1 << led.0;
        } else {
            self.bits &= !(1 << led.0);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Led> + '_ {
        (0..LED_CNT as u16).map(Led).filter(move |l| self.get(*l))
    }
}

impl FromIterator<Led> for LedState {
    fn from_iter<I: IntoIterator<Item = Led>>(iter: I) -> Self {
        let mut s = Self::default();
        for led in iter {
            s.set(led, true);
        }
        s
    }
}

impl std::fmt::Debug for LedState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
