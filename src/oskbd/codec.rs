//! Binary form of `struct input_event` on 64-bit Linux.
//!
//! ```text
//! struct input_event {
//!     struct timeval time; // i64 sec, i64 usec
//!     __u16 type;
//!     __u16 code;
//!     __s32 value;
//! };
//! ```
//!
//! All fields are native endian.

use super::{EventTime, InputEvent};

pub const RAW_EVENT_SIZE: usize = 24;

pub type RawEvent = [u8; RAW_EVENT_SIZE];

impl InputEvent {
    pub fn to_raw(&self) -> RawEvent {
        let mut raw = [0u8; RAW_EVENT_SIZE];
        raw[0..8].copy_from_slice(&self.time.sec.to_ne_bytes());
        raw[8..16].copy_from_slice(&self.time.usec.to_ne_bytes());
        raw[16..18].copy_from_slice(&self.kind.to_ne_bytes());
        raw[18..20].copy_from_slice(&self.code.to_ne_bytes());
        raw[20..24].copy_from_slice(&self.value.to_ne_bytes());
        raw
    }

    pub fn from_raw(raw: &RawEvent) -> Self {
        Self {
            time: EventTime {
                sec: i64::from_ne_bytes(field(raw, 0)),
                usec: i64::from_ne_bytes(field(raw, 8)),
            },
            kind: u16::from_ne_bytes(field(raw, 16)),
            code: u16::from_ne_bytes(field(raw, 18)),
            value: i32::from_ne_bytes(field(raw, 20)),
        }
    }
}

fn field<const N: usize>(raw: &RawEvent, at: usize) -> [u8; N] {
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&raw[at..at + N]);
    bytes
}

/// Decode every whole record in `buf`. A trailing partial record is ignored.
pub fn decode_events(buf: &[u8]) -> Vec<InputEvent> {
    buf.chunks_exact(RAW_EVENT_SIZE)
        .filter_map(|chunk| <&RawEvent>::try_from(chunk).ok())
        .map(InputEvent::from_raw)
        .collect()
}

pub fn encode_events(events: &[InputEvent]) -> Vec<u8> {
    events.iter().flat_map(|ev| ev.to_raw()).collect()
}
