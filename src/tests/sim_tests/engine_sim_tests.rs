use super::*;

#[test]
fn media_key_by_default() {
    let result = simulate("", "d:f1 u:f1");
    assert_eq!("dn:back up:back", result);
}

#[test]
fn fn_held_gives_function_key() {
    let result = simulate("", "d:f13 d:f1 u:f1 u:f13");
    assert_eq!("dn:fn dn:f1 up:f1 up:fn", result);
}

#[test]
fn repeat_is_remapped() {
    let result = simulate("", "d:f10 r:f10 r:f10 u:f10");
    assert_eq!("dn:volumeup rp:volumeup rp:volumeup up:volumeup", result);
}

#[test]
fn unmapped_keys_pass_through() {
    let result = simulate("", "d:a u:a d:f11 u:f11");
    assert_eq!("dn:a up:a dn:f11 up:f11", result);
}

#[test]
fn fn_tap_toggles_lock() {
    let result = simulate("", "d:f13 u:f13 d:f1 u:f1");
    assert_eq!("dn:fn up:fn dn:f1 up:f1", result);
}

#[test]
fn fn_tap_alternates() {
    let result = simulate(
        "",
        "
         d:f13 u:f13 d:f2 u:f2
         d:f13 u:f13 d:f2 u:f2
         d:f13 u:f13 d:f2 u:f2
        ",
    );
    assert_eq!(
        "dn:fn up:fn dn:f2 up:f2 \
         dn:fn up:fn dn:forward up:forward \
         dn:fn up:fn dn:f2 up:f2",
        result
    );
}

#[test]
fn fn_hold_with_other_key_does_not_toggle() {
    let result = simulate("", "d:f13 d:f3 u:f3 u:f13 d:f3 u:f3");
    assert_eq!("dn:fn dn:f3 up:f3 up:fn dn:refresh up:refresh", result);
}

#[test]
fn stuck_key_suppresses_toggle() {
    let result = simulate("", "d:a d:f13 u:f13 d:f1 u:f1 u:a");
    assert_eq!("dn:a dn:fn up:fn dn:back up:back up:a", result);
}

#[test]
fn fn_lock_off_at_start() {
    let result = simulate(
        "(defcfg fn-enabled no)",
        "d:f1 u:f1 d:f13 d:f1 u:f1 u:f13",
    );
    assert_eq!("dn:f1 up:f1 dn:fn dn:back up:back up:fn", result);
}

#[test]
fn key_map_polarity() {
    let cfg = "(defkeymap a b)";
    assert_eq!("dn:b up:b", simulate(cfg, "d:a u:a"));

    let cfg = "(defcfg fn-enabled no) (defkeymap a b)";
    assert_eq!("dn:a up:a", simulate(cfg, "d:a u:a"));
    assert_eq!("dn:fn dn:b up:b up:fn", simulate(cfg, "d:f13 d:a u:a u:f13"));
}

#[test]
fn mod_map_beats_key_map() {
    let cfg = "(defmodkeymap a b) (defkeymap a c)";
    assert_eq!("dn:fn dn:b up:b up:fn", simulate(cfg, "d:f13 d:a u:a u:f13"));
    // Lock state does not matter while FN is held.
    let cfg = "(defcfg fn-enabled no) (defmodkeymap a b) (defkeymap a c)";
    assert_eq!("dn:fn dn:b up:b up:fn", simulate(cfg, "d:f13 d:a u:a u:f13"));
}

#[test]
fn mod_map_needs_fn() {
    let result = simulate("", "d:bspc u:bspc d:f13 d:bspc u:bspc u:f13");
    assert_eq!("dn:backspace up:backspace dn:fn dn:delete up:delete up:fn", result);
}

#[test]
fn shift_map_order() {
    let result = simulate("(defshiftkeymap a b)", "d:f13 d:rsft d:a");
    assert_eq!("dn:fn dn:rightshift up:rightshift dn:b dn:rightshift", result);
}

#[test]
fn shift_map_batch_shape() {
    let events = simulate_events("(defshiftkeymap a b)", "d:f13 d:rsft d:a");
    let last: Vec<InputEvent> = events[6..].to_vec();
    let mut expected = vec![];
    expected.extend(synthetic_key(KeyCode::KEY_RIGHTSHIFT, KeyValue::Release));
    expected.push(InputEvent::msc_scan(KeyCode::KEY_A));
    expected.push(InputEvent::key(KeyCode::KEY_B, KeyValue::Press));
    expected.push(InputEvent::sync_report());
    expected.extend(synthetic_key(KeyCode::KEY_RIGHTSHIFT, KeyValue::Press));
    assert_eq!(expected, last);
}

#[test]
fn shift_map_releases_every_held_shift() {
    let result = simulate("", "d:f13 d:lsft d:rsft d:f6 u:f6");
    assert_eq!(
        "dn:fn dn:leftshift dn:rightshift \
         up:leftshift up:rightshift dn:kbdillumdown dn:leftshift dn:rightshift \
         up:leftshift up:rightshift up:kbdillumdown dn:leftshift dn:rightshift",
        result
    );
}

#[test]
fn shift_map_needs_fn() {
    let result = simulate("(defshiftkeymap a b)", "d:lsft d:a u:a u:lsft");
    assert_eq!("dn:leftshift dn:a up:a up:leftshift", result);
}

#[test]
fn shift_map_without_shift_falls_back_to_mod_map() {
    let result = simulate("(defshiftkeymap a b) (defmodkeymap a c)", "d:f13 d:a u:a");
    assert_eq!("dn:fn dn:c up:c", result);
}

#[test]
fn custom_third_level_keys() {
    let cfg = "(defcfg third-level-keys (ralt)) (defshiftkeymap a b)";
    assert_eq!(
        "dn:fn dn:rightalt up:rightalt dn:b dn:rightalt",
        simulate(cfg, "d:f13 d:ralt d:a")
    );
    assert_eq!("dn:fn dn:leftshift dn:a", simulate(cfg, "d:f13 d:lsft d:a"));
}

#[test]
fn custom_fn_key() {
    let result = simulate("(defcfg fn-key ralt)", "d:ralt u:ralt d:f1 u:f1 d:f13 u:f13");
    assert_eq!("dn:fn up:fn dn:f1 up:f1 dn:f13 up:f13", result);
}

#[test]
fn release_follows_state_at_release_time() {
    // F1 went down as BACK but FN is held by the time it is released.
    let result = simulate("", "d:f1 d:f13 u:f1 u:f13");
    assert_eq!("dn:back dn:fn up:f1 up:fn", result);
}

#[test]
fn toggle_is_decided_at_fn_release_within_a_batch() {
    // Another key pressed and released after FN in the same read does not undo the toggle.
    let result = simulate("", "d:f13 u:f13+d:a+u:a d:f1 u:f1");
    assert_eq!("dn:fn up:fn dn:a up:a dn:f1 up:f1", result);

    // A key pressed before the FN release in the same read blocks it.
    let result = simulate("", "d:f13 d:a+u:f13 u:a d:f1 u:f1");
    assert_eq!("dn:fn dn:a up:fn up:a dn:back up:back", result);
}

#[test]
fn batch_reports_toggle() {
    init_log();
    let mut engine = Engine::new(Arc::new(RemapConfig::default()));
    let batches = sim_batches("d:f13 u:f13");
    assert!(!engine.handle_events(batches[0].clone()).fn_toggled);
    assert!(engine.handle_events(batches[1].clone()).fn_toggled);
    assert!(!engine.fn_enabled());
}
