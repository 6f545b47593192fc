//! In-memory keyboards for exercising the runner without touching real devices.
//!
//! Both ends share their state behind a mutex so a test can script input and inspect output
//! while the runner owns the boxed devices. Events written to a [`SimKbdOut`] are also recorded
//! in a journal shared with the [`SimKbdIn`] it was made from, so tests can check the order of
//! device operations across both ends.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use super::*;

const SIM_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Default)]
pub struct SimInState {
    /// Batches handed out by readers, oldest first.
    pub batches: VecDeque<Vec<InputEvent>>,
    /// Successive answers to `key_state`. The last one is repeated once the rest are used.
    pub key_states: VecDeque<KeyState>,
    pub leds: LedState,
    pub supported: Vec<KeyCode>,
    pub grabbed: bool,
    pub open: bool,
    /// Readers return an error instead of waiting once `batches` is empty.
    pub disconnect_when_drained: bool,
    pub fail_grab: bool,
    pub fail_reader: bool,
    pub fail_led_state: bool,
    pub key_state_calls: usize,
}

pub type Journal = Arc<Mutex<Vec<String>>>;

pub struct SimKbdIn {
    state: Arc<Mutex<SimInState>>,
    journal: Journal,
}

impl Default for SimKbdIn {
    fn default() -> Self {
        Self::new()
    }
}

impl SimKbdIn {
    pub fn new() -> Self {
        let state = SimInState {
            supported: (KeyCode::KEY_ESC.code()..=KeyCode::KEY_MICMUTE.code())
                .map(KeyCode::new)
                .collect(),
            open: true,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            journal: Journal::default(),
        }
    }

    pub fn state(&self) -> Arc<Mutex<SimInState>> {
        self.state.clone()
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn push_batch(&self, batch: Vec<InputEvent>) {
        self.state.lock().batches.push_back(batch);
    }

    fn record(&self, op: &str) {
        self.journal.lock().push(op.to_string());
    }
}

fn sim_error(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("simulated {what} failure"))
}

impl KbdIn for SimKbdIn {
    fn name(&self) -> String {
        "simulated keyboard".into()
    }

    fn key_state(&mut self) -> io::Result<KeyState> {
        let mut s = self.state.lock();
        s.key_state_calls += 1;
        let ks = if s.key_states.len() > 1 {
            s.key_states.pop_front()
        } else {
            s.key_states.front().cloned()
        };
        Ok(ks.unwrap_or_default())
    }

    fn led_state(&mut self) -> io::Result<LedState> {
        let s = self.state.lock();
        if s.fail_led_state {
            return Err(sim_error("LED query"));
        }
        Ok(s.leds)
    }

    fn supported_keys(&self) -> Vec<KeyCode> {
        self.state.lock().supported.clone()
    }

    fn grab(&mut self) -> io::Result<()> {
        let mut s = self.state.lock();
        if s.fail_grab {
            return Err(sim_error("grab"));
        }
        s.grabbed = true;
        drop(s);
        self.record("grab");
        Ok(())
    }

    fn ungrab(&mut self) -> io::Result<()> {
        self.state.lock().grabbed = false;
        self.record("ungrab");
        Ok(())
    }

    fn reader(&mut self) -> io::Result<Box<dyn EventReader>> {
        if self.state.lock().fail_reader {
            return Err(sim_error("reader"));
        }
        Ok(Box::new(SimReader {
            state: self.state.clone(),
        }))
    }

    fn close(&mut self) -> io::Result<()> {
        self.state.lock().open = false;
        self.record("close in");
        Ok(())
    }
}

struct SimReader {
    state: Arc<Mutex<SimInState>>,
}

impl EventReader for SimReader {
    fn read_batch(&mut self) -> io::Result<Option<Vec<InputEvent>>> {
        let mut s = self.state.lock();
        if let Some(batch) = s.batches.pop_front() {
            return Ok(Some(batch));
        }
        if s.disconnect_when_drained || !s.open {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "simulated device unplugged",
            ));
        }
        drop(s);
        std::thread::sleep(SIM_POLL_INTERVAL);
        Ok(None)
    }
}

#[derive(Default)]
pub struct SimOutState {
    pub batches: Vec<Vec<InputEvent>>,
    /// What the device was created with.
    pub caps: VirtualCaps,
    pub open: bool,
    /// Number of upcoming writes that fail.
    pub fail_writes: usize,
}

impl SimOutState {
    /// Every written event, flattened.
    pub fn events(&self) -> Vec<InputEvent> {
        self.batches.iter().flatten().copied().collect()
    }
}

/// A virtual keyboard that records what is written to it.
///
/// `EV_LED` events are applied to the LED state of the input it was created from, standing in
/// for the OS updating the indicator.
#[derive(Clone)]
pub struct SimKbdOut {
    state: Arc<Mutex<SimOutState>>,
    input: Arc<Mutex<SimInState>>,
    journal: Journal,
}

impl SimKbdOut {
    pub fn new(input: &SimKbdIn) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimOutState {
                open: true,
                ..Default::default()
            })),
            input: input.state(),
            journal: input.journal(),
        }
    }

    pub fn state(&self) -> Arc<Mutex<SimOutState>> {
        self.state.clone()
    }

    /// What `LinuxKbdOut::create_matching` would be asked to build.
    pub fn create_matching(&self, caps: &VirtualCaps) -> Box<dyn KbdOut> {
        self.state.lock().caps = caps.clone();
        self.journal.lock().push("create out".into());
        Box::new(self.clone())
    }
}

impl KbdOut for SimKbdOut {
    fn write_batch(&mut self, events: &[InputEvent]) -> io::Result<()> {
        let mut s = self.state.lock();
        if !s.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "device is closed"));
        }
        if s.fail_writes > 0 {
            s.fail_writes -= 1;
            return Err(sim_error("write"));
        }
        s.batches.push(events.to_vec());
        drop(s);
        let mut input = self.input.lock();
        for ev in events.iter().filter(|ev| ev.kind == EV_LED) {
            input.leds.set(Led(ev.code), ev.value != 0);
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.state.lock().open = false;
        self.journal.lock().push("close out".into());
        Ok(())
    }
}
