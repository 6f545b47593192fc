//! Platform specific code for low level keyboard read/write.

pub mod codec;
pub use codec::*;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::*;

#[cfg(any(test, feature = "simulated_io"))]
mod simulated;
#[cfg(any(test, feature = "simulated_io"))]
pub use simulated::*;

use fnkeyd_parser::keys::*;
use std::fmt;
use std::io;

pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;
pub const EV_REL: u16 = 0x02;
pub const EV_ABS: u16 = 0x03;
pub const EV_MSC: u16 = 0x04;
pub const EV_LED: u16 = 0x11;
pub const EV_REP: u16 = 0x14;

pub const SYN_REPORT: u16 = 0x00;
pub const SYN_CONFIG: u16 = 0x01;
pub const SYN_MT_REPORT: u16 = 0x02;
pub const SYN_DROPPED: u16 = 0x03;

pub const MSC_SCAN: u16 = 0x04;

/// Keys the virtual keyboard always advertises, on top of what the physical keyboard has.
pub const MEDIA_KEYS: [KeyCode; 11] = [
    KeyCode::KEY_BACK,
    KeyCode::KEY_FORWARD,
    KeyCode::KEY_REFRESH,
    KeyCode::KEY_SEARCH,
    KeyCode::KEY_BRIGHTNESSDOWN,
    KeyCode::KEY_BRIGHTNESSUP,
    KeyCode::KEY_KBDILLUMDOWN,
    KeyCode::KEY_KBDILLUMUP,
    KeyCode::KEY_MUTE,
    KeyCode::KEY_VOLUMEDOWN,
    KeyCode::KEY_VOLUMEUP,
];

/// Misc codes the virtual keyboard advertises. Every key event, passed through or synthesized,
/// travels with its `MSC_SCAN`, and the kernel drops events of codes a device did not declare.
pub const VIRTUAL_MSC_CODES: [u16; 1] = [MSC_SCAN];

/// What the virtual keyboard is created with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualCaps {
    /// Sorted and deduplicated.
    pub keys: Vec<KeyCode>,
    pub msc: Vec<u16>,
}

impl VirtualCaps {
    pub fn new(keys: impl IntoIterator<Item = KeyCode>) -> Self {
        let mut keys: Vec<KeyCode> = keys.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();
        Self {
            keys,
            msc: VIRTUAL_MSC_CODES.to_vec(),
        }
    }

    pub fn has_key(&self, key: KeyCode) -> bool {
        self.keys.binary_search(&key).is_ok()
    }

    /// Whether a device with these capabilities would deliver `ev` instead of dropping it.
    pub fn delivers(&self, ev: &InputEvent) -> bool {
        match ev.kind {
            EV_SYN => true,
            EV_KEY => self.has_key(KeyCode::new(ev.code)),
            EV_MSC => self.msc.contains(&ev.code),
            _ => false,
        }
    }
}

// ------------------ KeyValue --------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyValue {
    Release = 0,
    Press = 1,
    Repeat = 2,
}

impl TryFrom<i32> for KeyValue {
    type Error = ();
    fn try_from(item: i32) -> Result<Self, Self::Error> {
        match item {
            0 => Ok(Self::Release),
            1 => Ok(Self::Press),
            2 => Ok(Self::Repeat),
            _ => Err(()),
        }
    }
}

impl From<KeyValue> for i32 {
    fn from(item: KeyValue) -> Self {
        item as i32
    }
}

// ------------------ InputEvent --------------------

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct EventTime {
    pub sec: i64,
    pub usec: i64,
}

/// One kernel input event, as read from or written to an evdev node.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct InputEvent {
    pub time: EventTime,
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

impl InputEvent {
    pub fn new(kind: u16, code: u16, value: i32) -> Self {
        Self {
            time: EventTime::default(),
            kind,
            code,
            value,
        }
    }

    pub fn key(code: KeyCode, value: KeyValue) -> Self {
        Self::new(EV_KEY, code.code(), value.into())
    }

    pub fn sync_report() -> Self {
        Self::new(EV_SYN, SYN_REPORT, 0)
    }

    /// The scan code event that precedes a key event from real hardware.
    pub fn msc_scan(code: KeyCode) -> Self {
        Self::new(EV_MSC, MSC_SCAN, i32::from(code.code()))
    }

    pub fn led(led: Led, on: bool) -> Self {
        Self::new(EV_LED, led.code(), i32::from(on))
    }

    pub fn with_time(mut self, time: EventTime) -> Self {
        self.time = time;
        self
    }

    pub fn is_key(&self) -> bool {
        self.kind == EV_KEY
    }

    pub fn is_sync_report(&self) -> bool {
        self.kind == EV_SYN && self.code == SYN_REPORT
    }

    pub fn key_code(&self) -> Option<KeyCode> {
        self.is_key().then_some(KeyCode::new(self.code))
    }

    pub fn key_value(&self) -> Option<KeyValue> {
        if self.is_key() {
            KeyValue::try_from(self.value).ok()
        } else {
            None
        }
    }
}

fn type_name(kind: u16) -> &'static str {
    match kind {
        EV_SYN => "EV_SYN",
        EV_KEY => "EV_KEY",
        EV_REL => "EV_REL",
        EV_ABS => "EV_ABS",
        EV_MSC => "EV_MSC",
        EV_LED => "EV_LED",
        EV_REP => "EV_REP",
        _ => "?",
    }
}

fn code_name(kind: u16, code: u16) -> String {
    match (kind, code) {
        (EV_SYN, SYN_REPORT) => "SYN_REPORT".into(),
        (EV_SYN, SYN_CONFIG) => "SYN_CONFIG".into(),
        (EV_SYN, SYN_MT_REPORT) => "SYN_MT_REPORT".into(),
        (EV_SYN, SYN_DROPPED) => "SYN_DROPPED".into(),
        (EV_MSC, MSC_SCAN) => "MSC_SCAN".into(),
        (EV_KEY, c) => KeyCode::new(c).to_string(),
        (EV_LED, c) => Led(c).to_string(),
        _ => "?".into(),
    }
}

/// Formats like `evtest` does.
impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let t = &self.time;
        if self.kind == EV_SYN {
            return write!(
                f,
                "Event: time {}.{:06}, -------------- {} ------------",
                t.sec,
                t.usec,
                code_name(self.kind, self.code)
            );
        }
        let value = match (self.kind, self.code) {
            (EV_MSC, MSC_SCAN) => format!("{:x}", self.value),
            _ => self.value.to_string(),
        };
        write!(
            f,
            "Event: time {}.{:06}, type {} ({}), code {} ({}), value {}",
            t.sec,
            t.usec,
            self.kind,
            type_name(self.kind),
            self.code,
            code_name(self.kind, self.code),
            value
        )
    }
}

// ------------------ Device seams --------------------

/// The physical keyboard.
pub trait KbdIn {
    /// Human readable identification for logs.
    fn name(&self) -> String;

    /// Keys currently held down according to the kernel.
    fn key_state(&mut self) -> io::Result<KeyState>;

    /// LEDs currently lit according to the kernel.
    fn led_state(&mut self) -> io::Result<LedState>;

    /// Keys the device can produce.
    fn supported_keys(&self) -> Vec<KeyCode>;

    fn grab(&mut self) -> io::Result<()>;

    fn ungrab(&mut self) -> io::Result<()>;

    /// A handle for reading events that can be moved to another thread.
    fn reader(&mut self) -> io::Result<Box<dyn EventReader>>;

    fn close(&mut self) -> io::Result<()>;
}

pub trait EventReader: Send {
    /// Returns the events of one read of the device. `Ok(None)` means nothing arrived within
    /// the reader's poll interval, so the caller gets a chance to check for cancellation.
    fn read_batch(&mut self) -> io::Result<Option<Vec<InputEvent>>>;
}

/// The virtual keyboard.
pub trait KbdOut {
    fn write_batch(&mut self, events: &[InputEvent]) -> io::Result<()>;

    fn close(&mut self) -> io::Result<()>;
}
