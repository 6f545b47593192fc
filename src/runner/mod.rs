//! Ties a physical keyboard, the engine and a virtual keyboard together for one session.
//!
//! A dedicated thread blocks on reads and hands each batch to the main loop over a bounded
//! channel. The main loop is the only owner of the engine and both devices; besides batches it
//! waits on the idle deadline, the LED resync deadlines and lifecycle notifications.

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use fnkeyd_parser::cfg::RemapConfig;

use crate::engine::{sync_led, Engine};
use crate::oskbd::*;

#[cfg(target_os = "linux")]
mod signals;
#[cfg(target_os = "linux")]
pub use signals::*;

const INBOX_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOpts {
    /// Take exclusive access of the physical keyboard.
    pub grab: bool,
    /// End the session after this long without input.
    pub idle_timeout: Option<Duration>,
    /// Delays after startup at which the LED is resynchronized even without a toggle.
    pub led_resync: Vec<Duration>,
    /// Interval for checking whether all keys have been released before grabbing.
    pub key_release_poll: Duration,
}

impl Default for RunnerOpts {
    fn default() -> Self {
        Self {
            grab: true,
            idle_timeout: None,
            led_resync: vec![Duration::from_secs(1), Duration::from_secs(5)],
            key_release_poll: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Interrupt,
    Terminate,
    /// The system is about to suspend.
    Suspend,
    Resume,
    /// Load the configuration again.
    Reload,
}

#[derive(Debug)]
pub enum RunnerMsg {
    Events(Vec<InputEvent>),
    /// The read thread hit an error and exited.
    ReadStopped(io::Error),
    Lifecycle(Lifecycle),
}

pub type Notifier = SyncSender<RunnerMsg>;
pub type Inbox = Receiver<RunnerMsg>;

/// The channel feeding [`Runner::run`]. Keep a clone of the notifier to deliver lifecycle
/// notifications.
pub fn inbox() -> (Notifier, Inbox) {
    sync_channel(INBOX_CAPACITY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Interrupted,
    Terminated,
    IdleTimeout,
    ReadStopped,
    /// Every notifier was dropped.
    Disconnected,
}

pub type Reloader = Box<dyn FnMut() -> Result<RemapConfig>>;

pub struct Runner {
    kbd_in: Box<dyn KbdIn>,
    kbd_out: Box<dyn KbdOut>,
    engine: Engine,
    opts: RunnerOpts,
    grabbed: bool,
    caps: VirtualCaps,
    reloader: Option<Reloader>,
}

impl Runner {
    /// Wait for all keys to be released, grab the keyboard if requested and create the
    /// virtual keyboard with `create_out`.
    ///
    /// On error nothing is left grabbed and `kbd_in` is closed.
    pub fn start<F>(
        mut kbd_in: Box<dyn KbdIn>,
        create_out: F,
        cfg: Arc<RemapConfig>,
        opts: RunnerOpts,
    ) -> Result<Self>
    where
        F: FnOnce(&VirtualCaps) -> io::Result<Box<dyn KbdOut>>,
    {
        log::info!("starting on {}", kbd_in.name());
        let mut grabbed = false;
        let caps = virtual_caps(kbd_in.as_ref(), &cfg);
        match acquire(kbd_in.as_mut(), &mut grabbed, create_out, &caps, &opts) {
            Ok(kbd_out) => Ok(Self {
                kbd_in,
                kbd_out,
                engine: Engine::new(cfg),
                opts,
                grabbed,
                caps,
                reloader: None,
            }),
            Err(e) => {
                if grabbed {
                    if let Err(ue) = kbd_in.ungrab() {
                        log::error!("failed to ungrab after startup error: {ue}");
                    }
                }
                if let Err(ce) = kbd_in.close() {
                    log::error!("failed to close keyboard after startup error: {ce}");
                }
                Err(e)
            }
        }
    }

    /// Used on [`Lifecycle::Reload`] to produce the new configuration.
    pub fn with_reloader(mut self, reloader: Reloader) -> Self {
        self.reloader = Some(reloader);
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Run until one of the [`EndReason`]s. `notifier` is handed to the read thread.
    pub fn run(&mut self, notifier: Notifier, inbox: Inbox) -> Result<EndReason> {
        let reader = self
            .kbd_in
            .reader()
            .context("failed to start reading the keyboard")?;
        let cancel = Arc::new(AtomicBool::new(false));
        let read_thread = spawn_reader(reader, notifier, cancel.clone())
            .context("failed to spawn the read thread")?;

        let reason = self.main_loop(&inbox);
        log::info!("session ending: {reason:?}");

        cancel.store(true, Ordering::SeqCst);
        // Unblocks a read thread stuck on a full channel.
        drop(inbox);
        if read_thread.join().is_err() {
            log::error!("read thread panicked");
        }
        Ok(reason)
    }

    fn main_loop(&mut self, inbox: &Inbox) -> EndReason {
        let start = Instant::now();
        let mut resync: Vec<Instant> = self.opts.led_resync.iter().map(|d| start + *d).collect();
        resync.sort();
        let mut resync: VecDeque<Instant> = resync.into();
        let mut idle_deadline = self.opts.idle_timeout.map(|t| start + t);

        loop {
            let now = Instant::now();
            while resync.front().map_or(false, |t| *t <= now) {
                resync.pop_front();
                log::debug!("periodic LED resync");
                self.sync_led();
            }
            if idle_deadline.map_or(false, |t| t <= now) {
                log::info!("no input for {:?}", self.opts.idle_timeout.unwrap_or_default());
                return EndReason::IdleTimeout;
            }

            let next_deadline = resync.front().copied().into_iter().chain(idle_deadline).min();
            let msg = match next_deadline {
                Some(deadline) => {
                    match inbox.recv_timeout(deadline.saturating_duration_since(now)) {
                        Ok(msg) => msg,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => return EndReason::Disconnected,
                    }
                }
                None => match inbox.recv() {
                    Ok(msg) => msg,
                    Err(_) => return EndReason::Disconnected,
                },
            };

            match msg {
                RunnerMsg::Events(batch) => {
                    if self.process(batch) {
                        idle_deadline = self.opts.idle_timeout.map(|t| Instant::now() + t);
                    }
                }
                RunnerMsg::ReadStopped(e) => {
                    log::warn!("stopped reading the keyboard: {e}");
                    return EndReason::ReadStopped;
                }
                RunnerMsg::Lifecycle(l) => match l {
                    Lifecycle::Interrupt => return EndReason::Interrupted,
                    Lifecycle::Terminate => return EndReason::Terminated,
                    Lifecycle::Suspend => log::info!("system suspend requested"),
                    Lifecycle::Resume => log::debug!("resume notification ignored"),
                    Lifecycle::Reload => self.reload(),
                },
            }
        }
    }

    /// Remap and write one batch. Returns false if the write failed; the batch is dropped.
    fn process(&mut self, batch: Vec<InputEvent>) -> bool {
        let processed = self.engine.handle_events(batch);
        let written = match self.kbd_out.write_batch(&processed.events) {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "dropped a batch of {} events, write failed: {e}",
                    processed.events.len()
                );
                false
            }
        };
        if processed.fn_toggled {
            self.sync_led();
        }
        written
    }

    fn sync_led(&mut self) {
        sync_led(&self.engine, self.kbd_in.as_mut(), self.kbd_out.as_mut());
    }

    fn reload(&mut self) {
        let Some(reloader) = self.reloader.as_mut() else {
            log::info!("reload requested, but there is no configuration file to reload");
            return;
        };
        match reloader() {
            Ok(cfg) => {
                let missing: Vec<String> = cfg
                    .output_keys()
                    .into_iter()
                    .filter(|k| !self.caps.has_key(*k))
                    .map(|k| k.to_string())
                    .collect();
                if !missing.is_empty() {
                    log::warn!(
                        "the virtual keyboard cannot emit {}; restart to pick them up",
                        missing.join(", ")
                    );
                }
                self.engine.set_config(Arc::new(cfg));
                self.sync_led();
            }
            Err(e) => log::error!("reload failed, keeping the current configuration: {e:?}"),
        }
    }

    /// Ungrab and close the keyboard, then close the virtual keyboard. Every step is
    /// attempted; the first failure is returned.
    pub fn shutdown(mut self) -> Result<()> {
        let mut results = vec![];
        if self.grabbed {
            results.push(
                self.kbd_in
                    .ungrab()
                    .context("failed to ungrab the keyboard"),
            );
        }
        results.push(self.kbd_in.close().context("failed to close the keyboard"));
        results.push(
            self.kbd_out
                .close()
                .context("failed to close the virtual keyboard"),
        );
        let mut errors = results.into_iter().filter_map(Result::err);
        let first = errors.next();
        for e in errors {
            log::error!("{e:#}");
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn acquire<F>(
    kbd_in: &mut dyn KbdIn,
    grabbed: &mut bool,
    create_out: F,
    caps: &VirtualCaps,
    opts: &RunnerOpts,
) -> Result<Box<dyn KbdOut>>
where
    F: FnOnce(&VirtualCaps) -> io::Result<Box<dyn KbdOut>>,
{
    wait_for_key_release(kbd_in, opts.key_release_poll)?;
    if opts.grab {
        kbd_in.grab().context("failed to grab the keyboard")?;
        *grabbed = true;
    }
    create_out(caps).context("failed to create the virtual keyboard")
}

/// Grabbing while a key is down leaves that key stuck for everything reading the virtual
/// keyboard, so wait it out.
fn wait_for_key_release(kbd_in: &mut dyn KbdIn, poll: Duration) -> Result<()> {
    let mut logged = false;
    loop {
        let held = kbd_in
            .key_state()
            .context("failed to read the keyboard key state")?;
        if held.is_zero() {
            return Ok(());
        }
        if !logged {
            log::info!("waiting for keys to be released: {held:?}");
            logged = true;
        }
        thread::sleep(poll);
    }
}

/// The physical keyboard's keys plus everything the remap tables can produce.
fn virtual_caps(kbd_in: &dyn KbdIn, cfg: &RemapConfig) -> VirtualCaps {
    VirtualCaps::new(
        kbd_in
            .supported_keys()
            .into_iter()
            .chain(MEDIA_KEYS)
            .chain(cfg.output_keys()),
    )
}

fn spawn_reader(
    mut reader: Box<dyn EventReader>,
    tx: Notifier,
    cancel: Arc<AtomicBool>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("fnkeyd-read".into())
        .spawn(move || {
            log::debug!("read thread started");
            while !cancel.load(Ordering::SeqCst) {
                match reader.read_batch() {
                    Ok(Some(batch)) => {
                        if cancel.load(Ordering::SeqCst) {
                            break;
                        }
                        if tx.send(RunnerMsg::Events(batch)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        let _ = tx.send(RunnerMsg::ReadStopped(e));
                        break;
                    }
                }
            }
            log::debug!("read thread stopped");
        })
}
