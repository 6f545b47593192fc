use super::*;
use crate::runner::*;

use std::io;
use std::thread;
use std::time::{Duration, Instant};

fn quick_opts() -> RunnerOpts {
    RunnerOpts {
        led_resync: vec![],
        key_release_poll: Duration::from_millis(1),
        ..Default::default()
    }
}

fn start(kin: SimKbdIn, cfg: RemapConfig, opts: RunnerOpts) -> (Runner, SimKbdOut) {
    init_log();
    let out = SimKbdOut::new(&kin);
    let sink = out.clone();
    let runner = Runner::start(
        Box::new(kin),
        move |caps| Ok(sink.create_matching(caps)),
        Arc::new(cfg),
        opts,
    )
    .expect("runner starts");
    (runner, out)
}

fn push_sim(kin: &SimKbdIn, sim: &str) {
    for batch in sim_batches(sim) {
        kin.push_batch(batch);
    }
}

/// Run until the scripted input is used up.
fn run_to_end(runner: &mut Runner) -> EndReason {
    let (tx, rx) = inbox();
    runner.run(tx, rx).expect("runner runs")
}

#[test]
fn f1_becomes_back() {
    let kin = SimKbdIn::new();
    push_sim(&kin, "d:f1 u:f1");
    kin.state().lock().disconnect_when_drained = true;
    let (mut runner, out) = start(kin, RemapConfig::default(), quick_opts());

    assert_eq!(EndReason::ReadStopped, run_to_end(&mut runner));
    runner.shutdown().unwrap();

    let out = out.state();
    let out = out.lock();
    assert_eq!("dn:back up:back", to_ascii(&out.events()));
    assert_eq!(
        vec![
            InputEvent::msc_scan(KeyCode::KEY_F1),
            InputEvent::key(KeyCode::KEY_BACK, KeyValue::Press),
            InputEvent::sync_report(),
        ],
        out.batches[0]
    );
}

#[test]
fn startup_waits_for_keys_to_be_released() {
    let kin = SimKbdIn::new();
    let held: KeyState = [KeyCode::KEY_ENTER].into_iter().collect();
    {
        let st = kin.state();
        let mut st = st.lock();
        st.key_states.push_back(held.clone());
        st.key_states.push_back(held);
        st.key_states.push_back(KeyState::new());
    }
    let state = kin.state();
    let journal = kin.journal();
    let (runner, _out) = start(kin, RemapConfig::default(), quick_opts());

    assert!(state.lock().key_state_calls >= 3);
    assert!(state.lock().grabbed);
    assert_eq!(vec!["grab", "create out"], *journal.lock());
    runner.shutdown().unwrap();
}

#[test]
fn virtual_keyboard_covers_every_output() {
    let kin = SimKbdIn::new();
    kin.state().lock().supported = vec![KeyCode::KEY_A, KeyCode::KEY_F1, KeyCode::KEY_F13];
    let cfg = RemapConfig {
        use_led: Some(Led::LED_SCROLLL),
        ..Default::default()
    };
    let (runner, out) = start(kin, cfg, quick_opts());

    let caps = out.state().lock().caps.clone();
    assert_eq!(vec![MSC_SCAN], caps.msc);
    let keys = caps.keys;
    for k in [KeyCode::KEY_A, KeyCode::KEY_F13, KeyCode::KEY_FN, KeyCode::KEY_SCROLLLOCK]
        .into_iter()
        .chain(MEDIA_KEYS)
        .chain(RemapConfig::default().mod_key_map.targets())
    {
        assert!(keys.contains(&k), "missing {k}");
    }
    let mut sorted = keys.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted, keys);
    runner.shutdown().unwrap();
}

#[test]
fn virtual_keyboard_delivers_everything_written() {
    let kin = SimKbdIn::new();
    push_sim(
        &kin,
        "d:a u:a d:f1 u:f1 \
         d:f13 d:rsft d:f6 u:f6 u:rsft d:bspc u:bspc u:f13 \
         d:f13 u:f13 d:f10 u:f10",
    );
    kin.state().lock().disconnect_when_drained = true;
    let (mut runner, out) = start(kin, RemapConfig::default(), quick_opts());
    assert_eq!(EndReason::ReadStopped, run_to_end(&mut runner));
    runner.shutdown().unwrap();

    let out = out.state();
    let out = out.lock();
    let events = out.events();
    assert!(events.iter().any(|ev| ev.kind == EV_MSC));
    for ev in &events {
        assert!(out.caps.delivers(ev), "dropped by the virtual keyboard: {ev}");
    }
}

#[test]
fn grab_failure_leaves_nothing_open() {
    let kin = SimKbdIn::new();
    kin.state().lock().fail_grab = true;
    let state = kin.state();
    let journal = kin.journal();
    let out = SimKbdOut::new(&kin);

    let res = Runner::start(
        Box::new(kin),
        move |caps| Ok(out.create_matching(caps)),
        Arc::new(RemapConfig::default()),
        quick_opts(),
    );
    assert!(res.is_err());
    assert!(!state.lock().grabbed);
    assert!(!state.lock().open);
    assert_eq!(vec!["close in"], *journal.lock());
}

#[test]
fn virtual_keyboard_failure_releases_grab() {
    let kin = SimKbdIn::new();
    let state = kin.state();
    let journal = kin.journal();

    let res = Runner::start(
        Box::new(kin),
        |_keys| -> io::Result<Box<dyn KbdOut>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "no uinput"))
        },
        Arc::new(RemapConfig::default()),
        quick_opts(),
    );
    let e = res.err().expect("startup fails");
    assert!(format!("{e:#}").contains("no uinput"));
    assert!(!state.lock().grabbed);
    assert!(!state.lock().open);
    assert_eq!(vec!["grab", "ungrab", "close in"], *journal.lock());
}

#[test]
fn no_grab() {
    let kin = SimKbdIn::new();
    kin.state().lock().disconnect_when_drained = true;
    let state = kin.state();
    let journal = kin.journal();
    let opts = RunnerOpts {
        grab: false,
        ..quick_opts()
    };
    let (mut runner, _out) = start(kin, RemapConfig::default(), opts);
    assert!(!state.lock().grabbed);
    run_to_end(&mut runner);
    runner.shutdown().unwrap();
    assert_eq!(vec!["create out", "close in", "close out"], *journal.lock());
}

#[test]
fn reader_failure_ends_session() {
    let kin = SimKbdIn::new();
    kin.state().lock().fail_reader = true;
    let (mut runner, _out) = start(kin, RemapConfig::default(), quick_opts());
    let (tx, rx) = inbox();
    assert!(runner.run(tx, rx).is_err());
    runner.shutdown().unwrap();
}

#[test]
fn write_error_drops_only_that_batch() {
    let kin = SimKbdIn::new();
    push_sim(&kin, "d:f1 u:f1 d:f2 u:f2");
    kin.state().lock().disconnect_when_drained = true;
    let (mut runner, out) = start(kin, RemapConfig::default(), quick_opts());
    out.state().lock().fail_writes = 1;

    assert_eq!(EndReason::ReadStopped, run_to_end(&mut runner));
    runner.shutdown().unwrap();
    assert_eq!(
        "up:back dn:forward up:forward",
        to_ascii(&out.state().lock().events())
    );
}

#[test]
fn idle_timeout_ends_session() {
    let kin = SimKbdIn::new();
    let opts = RunnerOpts {
        idle_timeout: Some(Duration::from_millis(30)),
        ..quick_opts()
    };
    let (mut runner, _out) = start(kin, RemapConfig::default(), opts);
    assert_eq!(EndReason::IdleTimeout, run_to_end(&mut runner));
    runner.shutdown().unwrap();
}

#[test]
fn input_keeps_idle_timeout_from_expiring() {
    let kin = SimKbdIn::new();
    let input = kin.state();
    let timeout = Duration::from_millis(200);
    let opts = RunnerOpts {
        idle_timeout: Some(timeout),
        ..quick_opts()
    };
    let (mut runner, out) = start(kin, RemapConfig::default(), opts);

    // Twelve batches 25ms apart span well past the timeout.
    let feeder = thread::spawn(move || {
        let mut last = Instant::now();
        for batch in sim_batches(&"d:f1 u:f1 ".repeat(6)) {
            thread::sleep(Duration::from_millis(25));
            input.lock().batches.push_back(batch);
            last = Instant::now();
        }
        last
    });
    let started = Instant::now();
    assert_eq!(EndReason::IdleTimeout, run_to_end(&mut runner));
    let ended = Instant::now();
    let last_input = feeder.join().unwrap();
    runner.shutdown().unwrap();

    assert!(ended - started >= Duration::from_millis(25 * 12));
    assert!(ended - last_input >= timeout);
    assert_eq!(
        "dn:back up:back ".repeat(6).trim_end(),
        to_ascii(&out.state().lock().events())
    );
}

#[test]
fn interrupt_and_terminate_end_session() {
    for (l, reason) in [
        (Lifecycle::Interrupt, EndReason::Interrupted),
        (Lifecycle::Terminate, EndReason::Terminated),
    ] {
        let (mut runner, _out) = start(SimKbdIn::new(), RemapConfig::default(), quick_opts());
        let (tx, rx) = inbox();
        tx.send(RunnerMsg::Lifecycle(l)).unwrap();
        assert_eq!(reason, runner.run(tx, rx).unwrap());
        runner.shutdown().unwrap();
    }
}

#[test]
fn suspend_and_resume_do_not_end_session() {
    let (mut runner, _out) = start(SimKbdIn::new(), RemapConfig::default(), quick_opts());
    let (tx, rx) = inbox();
    tx.send(RunnerMsg::Lifecycle(Lifecycle::Suspend)).unwrap();
    tx.send(RunnerMsg::Lifecycle(Lifecycle::Resume)).unwrap();
    tx.send(RunnerMsg::Lifecycle(Lifecycle::Terminate)).unwrap();
    assert_eq!(EndReason::Terminated, runner.run(tx, rx).unwrap());
    runner.shutdown().unwrap();
}

#[test]
fn reload_installs_new_config() {
    let kin = SimKbdIn::new();
    push_sim(&kin, "d:a u:a");
    kin.state().lock().disconnect_when_drained = true;
    let (runner, out) = start(kin, RemapConfig::default(), quick_opts());
    let mut runner = runner.with_reloader(Box::new(|| -> anyhow::Result<RemapConfig> {
        Ok(new_from_str("(defkeymap a b)").expect("valid cfg"))
    }));

    let (tx, rx) = inbox();
    // Queued before the read thread starts, so it is handled before any input.
    tx.send(RunnerMsg::Lifecycle(Lifecycle::Reload)).unwrap();
    assert_eq!(EndReason::ReadStopped, runner.run(tx, rx).unwrap());

    assert_eq!(Some(KeyCode::KEY_B), runner.engine().config().key_map.get(KeyCode::KEY_A));
    assert_eq!("dn:b up:b", to_ascii(&out.state().lock().events()));
    runner.shutdown().unwrap();
}

#[test]
fn failed_reload_keeps_config() {
    let kin = SimKbdIn::new();
    push_sim(&kin, "d:f1 u:f1");
    kin.state().lock().disconnect_when_drained = true;
    let (runner, out) = start(kin, RemapConfig::default(), quick_opts());
    let mut runner = runner.with_reloader(Box::new(|| -> anyhow::Result<RemapConfig> {
        Err(anyhow::anyhow!("bad file"))
    }));

    let (tx, rx) = inbox();
    tx.send(RunnerMsg::Lifecycle(Lifecycle::Reload)).unwrap();
    assert_eq!(EndReason::ReadStopped, runner.run(tx, rx).unwrap());

    assert_eq!(RemapConfig::default(), **runner.engine().config());
    assert_eq!("dn:back up:back", to_ascii(&out.state().lock().events()));
    runner.shutdown().unwrap();
}

#[test]
fn reload_without_reloader_is_ignored() {
    let (mut runner, _out) = start(SimKbdIn::new(), RemapConfig::default(), quick_opts());
    let (tx, rx) = inbox();
    tx.send(RunnerMsg::Lifecycle(Lifecycle::Reload)).unwrap();
    tx.send(RunnerMsg::Lifecycle(Lifecycle::Interrupt)).unwrap();
    assert_eq!(EndReason::Interrupted, runner.run(tx, rx).unwrap());
    runner.shutdown().unwrap();
}

#[test]
fn shutdown_order() {
    let kin = SimKbdIn::new();
    kin.state().lock().disconnect_when_drained = true;
    let state = kin.state();
    let journal = kin.journal();
    let (mut runner, out) = start(kin, RemapConfig::default(), quick_opts());
    run_to_end(&mut runner);
    runner.shutdown().unwrap();

    assert_eq!(
        vec!["grab", "create out", "ungrab", "close in", "close out"],
        *journal.lock()
    );
    assert!(!state.lock().grabbed);
    assert!(!state.lock().open);
    assert!(!out.state().lock().open);
}

#[test]
fn led_resync_after_startup() {
    let kin = SimKbdIn::new();
    let leds = kin.state();
    let cfg = RemapConfig {
        use_led: Some(Led::LED_CAPSL),
        ..Default::default()
    };
    let opts = RunnerOpts {
        led_resync: vec![Duration::ZERO],
        ..quick_opts()
    };
    let (mut runner, out) = start(kin, cfg, opts);
    let (tx, rx) = inbox();
    tx.send(RunnerMsg::Lifecycle(Lifecycle::Interrupt)).unwrap();
    runner.run(tx, rx).unwrap();
    runner.shutdown().unwrap();

    assert_eq!(
        Some(runner_led_batch(KeyCode::KEY_CAPSLOCK, Led::LED_CAPSL, true)),
        out.state().lock().batches.first().cloned()
    );
    assert!(leds.lock().leds.get(Led::LED_CAPSL));
}

#[test]
fn fn_toggle_syncs_led() {
    let kin = SimKbdIn::new();
    push_sim(&kin, "d:f13 u:f13");
    {
        let st = kin.state();
        let mut st = st.lock();
        st.leds.set(Led::LED_SCROLLL, true);
        st.disconnect_when_drained = true;
    }
    let leds = kin.state();
    let cfg = RemapConfig {
        use_led: Some(Led::LED_SCROLLL),
        ..Default::default()
    };
    let (mut runner, out) = start(kin, cfg, quick_opts());
    assert_eq!(EndReason::ReadStopped, run_to_end(&mut runner));
    runner.shutdown().unwrap();

    let batches = out.state().lock().batches.clone();
    assert_eq!(3, batches.len());
    assert_eq!(
        runner_led_batch(KeyCode::KEY_SCROLLLOCK, Led::LED_SCROLLL, false),
        batches[2]
    );
    assert!(!leds.lock().leds.get(Led::LED_SCROLLL));
}

fn runner_led_batch(key: KeyCode, led: Led, on: bool) -> Vec<InputEvent> {
    let mut batch = vec![];
    batch.extend(synthetic_key(key, KeyValue::Press));
    batch.extend(synthetic_key(key, KeyValue::Release));
    batch.push(InputEvent::led(led, on));
    batch.push(InputEvent::sync_report());
    batch
}
