use crate::keys::{KeyCode, KEY_CNT};

/// A key-to-key lookup table indexed directly by source code.
///
/// `KEY_RESERVED` marks an empty slot, which is why it can never be a mapping target.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMap {
    slots: Box<[KeyCode]>,
    len: usize,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self {
            slots: vec![KeyCode::KEY_RESERVED; KEY_CNT].into_boxed_slice(),
            len: 0,
        }
    }
}

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, from: KeyCode) -> Option<KeyCode> {
        self.slots
            .get(usize::from(from))
            .copied()
            .filter(|to| *to != KeyCode::KEY_RESERVED)
    }

    pub fn contains(&self, from: KeyCode) -> bool {
        self.get(from).is_some()
    }

    /// Returns the previous target of `from`. Out-of-range sources and `KEY_RESERVED`
    /// targets are ignored.
    pub fn insert(&mut self, from: KeyCode, to: KeyCode) -> Option<KeyCode> {
        if to == KeyCode::KEY_RESERVED {
            return None;
        }
        let slot = self.slots.get_mut(usize::from(from))?;
        let prev = std::mem::replace(slot, to);
        if prev == KeyCode::KEY_RESERVED {
            self.len += 1;
            None
        } else {
            Some(prev)
        }
    }

    pub fn remove(&mut self, from: KeyCode) -> Option<KeyCode> {
        let slot = self.slots.get_mut(usize::from(from))?;
        let prev = std::mem::replace(slot, KeyCode::KEY_RESERVED);
        if prev == KeyCode::KEY_RESERVED {
            None
        } else {
            self.len -= 1;
            Some(prev)
        }
    }

    /// Mappings in source code order.
    pub fn iter(&self) -> impl Iterator<Item = (KeyCode, KeyCode)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, to)| **to != KeyCode::KEY_RESERVED)
            .map(|(from, to)| (KeyCode(from as u16), *to))
    }

    pub fn targets(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.iter().map(|(_, to)| to)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl FromIterator<(KeyCode, KeyCode)> for KeyMap {
    fn from_iter<I: IntoIterator<Item = (KeyCode, KeyCode)>>(iter: I) -> Self {
        let mut map = Self::default();
        for (from, to) in iter {
            map.insert(from, to);
        }
        map
    }
}

impl std::fmt::Debug for KeyMap {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
