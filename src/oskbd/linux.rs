//! Contains the input/output code for keyboards on Linux.

use evdev::{uinput, AttributeSet, Device, EventType, Key, MiscType};
use mio::{unix::SourceFd, Events, Interest, Poll, Token};
use nix::fcntl::{fcntl, FcntlArg, OFlag};

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, Read};
use std::os::fd::{AsRawFd, BorrowedFd};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::*;

pub const VIRTUAL_DEVICE_NAME: &str = "fnkeyd virtual keyboard";

/// How long a read waits before giving the read thread a chance to notice cancellation.
pub const READ_POLL_TIMEOUT: Duration = Duration::from_millis(100);

const READ_BUF_EVENTS: usize = 64;

pub struct LinuxKbdIn {
    device: Option<Device>,
    path: PathBuf,
}

impl LinuxKbdIn {
    /// Open the evdev node at `path`. The device must look like a keyboard.
    pub fn open(path: &Path) -> io::Result<Self> {
        let device = Device::open(path).map_err(|e| {
            log::error!(
                "Failed to open {}. Make sure you've added your user to the `input` group. E: {e}",
                path.display()
            );
            e
        })?;
        if !is_keyboard(&device) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} does not look like a keyboard", path.display()),
            ));
        }
        log::info!(
            "opened {} ({})",
            path.display(),
            device.name().unwrap_or("unnamed device")
        );
        Ok(Self {
            device: Some(device),
            path: path.to_owned(),
        })
    }

    /// Open the first keyboard among the `event*` nodes of `dir`.
    pub fn discover(dir: &Path) -> io::Result<Self> {
        for path in event_nodes(dir)? {
            match Device::open(&path) {
                Ok(d) if is_keyboard(&d) => {
                    drop(d);
                    return Self::open(&path);
                }
                Ok(d) => log::debug!(
                    "skipping {} ({}): not a keyboard",
                    path.display(),
                    d.name().unwrap_or("unnamed device")
                ),
                Err(e) => log::debug!("skipping {}: {e}", path.display()),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no keyboard found in {}", dir.display()),
        ))
    }

    fn dev(&mut self) -> io::Result<&mut Device> {
        self.device
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "device is closed"))
    }
}

/// `event*` nodes of `dir` in numeric order.
pub fn event_nodes(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut nodes: Vec<(u32, PathBuf)> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let n = name.to_str()?.strip_prefix("event")?.parse::<u32>().ok()?;
            Some((n, entry.path()))
        })
        .collect();
    nodes.sort();
    Ok(nodes.into_iter().map(|(_, p)| p).collect())
}

/// Every keyboard-like node of `dir` with its device name.
pub fn list_keyboards(dir: &Path) -> io::Result<Vec<(PathBuf, String)>> {
    let mut keyboards = vec![];
    for path in event_nodes(dir)? {
        if let Ok(d) = Device::open(&path) {
            if is_keyboard(&d) {
                keyboards.push((path, d.name().unwrap_or("").to_string()));
            }
        }
    }
    Ok(keyboards)
}

fn is_keyboard(device: &Device) -> bool {
    device.supported_keys().map_or(false, |keys| {
        keys.contains(Key::KEY_A) && keys.contains(Key::KEY_Z) && keys.contains(Key::KEY_ENTER)
    })
}

impl KbdIn for LinuxKbdIn {
    fn name(&self) -> String {
        match self.device.as_ref().and_then(|d| d.name()) {
            Some(name) => format!("{} ({name})", self.path.display()),
            None => self.path.display().to_string(),
        }
    }

    fn key_state(&mut self) -> io::Result<KeyState> {
        let keys = self.dev()?.get_key_state()?;
        Ok(keys.iter().map(|k| KeyCode::new(k.code())).collect())
    }

    fn led_state(&mut self) -> io::Result<LedState> {
        let leds = self.dev()?.get_led_state()?;
        Ok(leds.iter().map(|l| Led(l.0)).collect())
    }

    fn supported_keys(&self) -> Vec<KeyCode> {
        self.device
            .as_ref()
            .and_then(|d| d.supported_keys())
            .map(|keys| keys.iter().map(|k| KeyCode::new(k.code())).collect())
            .unwrap_or_default()
    }

    fn grab(&mut self) -> io::Result<()> {
        self.dev()?.grab()?;
        log::info!("grabbed {}", self.path.display());
        Ok(())
    }

    fn ungrab(&mut self) -> io::Result<()> {
        self.dev()?.ungrab()?;
        log::info!("released {}", self.path.display());
        Ok(())
    }

    fn reader(&mut self) -> io::Result<Box<dyn EventReader>> {
        let fd = self.dev()?.as_raw_fd();
        // SAFETY: the device is open for the duration of this call, the duplicate owns its own
        // descriptor afterwards.
        let dup = unsafe { BorrowedFd::borrow_raw(fd) }.try_clone_to_owned()?;
        let flags = OFlag::from_bits_truncate(fcntl(dup.as_raw_fd(), FcntlArg::F_GETFL)?);
        fcntl(
            dup.as_raw_fd(),
            FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK),
        )?;
        Ok(Box::new(LinuxEventReader::new(File::from(dup))?))
    }

    fn close(&mut self) -> io::Result<()> {
        if self.device.take().is_some() {
            log::debug!("closed {}", self.path.display());
        }
        Ok(())
    }
}

struct LinuxEventReader {
    file: File,
    poll: Poll,
    events: Events,
    buf: Vec<u8>,
    pending: VecDeque<Vec<InputEvent>>,
}

impl LinuxEventReader {
    fn new(file: File) -> io::Result<Self> {
        let poll = Poll::new()?;
        poll.registry().register(
            &mut SourceFd(&file.as_raw_fd()),
            Token(0),
            Interest::READABLE,
        )?;
        Ok(Self {
            file,
            poll,
            events: Events::with_capacity(4),
            buf: vec![0; RAW_EVENT_SIZE * READ_BUF_EVENTS],
            pending: VecDeque::new(),
        })
    }

    /// Readiness is edge triggered, so read until the kernel has nothing left. Each `read`
    /// becomes its own batch.
    fn drain(&mut self) -> io::Result<()> {
        loop {
            match self.file.read(&mut self.buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "input device closed",
                    ))
                }
                Ok(n) => {
                    let batch = decode_events(&self.buf[..n]);
                    if !batch.is_empty() {
                        self.pending.push_back(batch);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl EventReader for LinuxEventReader {
    fn read_batch(&mut self) -> io::Result<Option<Vec<InputEvent>>> {
        if let Some(batch) = self.pending.pop_front() {
            return Ok(Some(batch));
        }
        match self.poll.poll(&mut self.events, Some(READ_POLL_TIMEOUT)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(None),
            Err(e) => return Err(e),
        }
        if self.events.is_empty() {
            return Ok(None);
        }
        self.drain()?;
        Ok(self.pending.pop_front())
    }
}

pub struct LinuxKbdOut {
    device: Option<uinput::VirtualDevice>,
}

impl LinuxKbdOut {
    /// Create a virtual keyboard declaring the keys and misc codes of `caps`.
    pub fn create_matching(caps: &VirtualCaps) -> io::Result<Self> {
        let mut keys = AttributeSet::<Key>::new();
        for k in &caps.keys {
            keys.insert(Key::new(k.code()));
        }
        let mut msc = AttributeSet::<MiscType>::new();
        for code in &caps.msc {
            msc.insert(MiscType(*code));
        }
        let device = uinput::VirtualDeviceBuilder::new()?
            .name(VIRTUAL_DEVICE_NAME)
            .input_id(evdev::InputId::new(evdev::BusType::BUS_USB, 1, 1, 1))
            .with_keys(&keys)?
            .with_msc(&msc)?
            .build()?;
        log::info!("created virtual device {VIRTUAL_DEVICE_NAME:?}");
        Ok(Self {
            device: Some(device),
        })
    }
}

impl KbdOut for LinuxKbdOut {
    fn write_batch(&mut self, events: &[InputEvent]) -> io::Result<()> {
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "device is closed"))?;
        // `emit` terminates what it writes with its own SYN_REPORT.
        let events = match events.split_last() {
            Some((last, rest)) if last.is_sync_report() => rest,
            _ => events,
        };
        let evs: Vec<evdev::InputEvent> = events
            .iter()
            .map(|ev| evdev::InputEvent::new(EventType(ev.kind), ev.code, ev.value))
            .collect();
        device.emit(&evs)
    }

    fn close(&mut self) -> io::Result<()> {
        if self.device.take().is_some() {
            log::debug!("destroyed virtual device");
        }
        Ok(())
    }
}
