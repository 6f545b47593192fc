use crate::engine::*;
use crate::oskbd::*;
use crate::tests::*;

use crate::cfg::*;
use crate::keys::*;
use std::sync::Arc;

mod engine_sim_tests;
mod runner_sim_tests;

/// What a keyboard reports for one key transition.
fn key_batch(code: KeyCode, value: KeyValue) -> Vec<InputEvent> {
    synthetic_key(code, value).to_vec()
}

fn parse_item(item: &str) -> (KeyCode, KeyValue) {
    let (kind, key) = item
        .split_once(':')
        .unwrap_or_else(|| panic!("invalid item {item}"));
    let code = str_to_keycode(key).unwrap_or_else(|| panic!("invalid key {key}"));
    let value = match kind {
        "d" => KeyValue::Press,
        "u" => KeyValue::Release,
        "r" => KeyValue::Repeat,
        _ => panic!("invalid item {item}"),
    };
    (code, value)
}

/// Batches described by `sim`. Items are `d:key`, `u:key` or `r:key`, separated by whitespace.
/// Each item is read as its own batch; items joined with `+` arrive in one batch.
fn sim_batches(sim: &str) -> Vec<Vec<InputEvent>> {
    sim.split_whitespace()
        .map(|batch| {
            batch
                .split('+')
                .flat_map(|item| {
                    let (code, value) = parse_item(item);
                    key_batch(code, value)
                })
                .collect()
        })
        .collect()
}

/// Key events of `events` as `dn:key up:key rp:key`.
fn to_ascii(events: &[InputEvent]) -> String {
    events
        .iter()
        .filter_map(|ev| {
            let kind = match ev.key_value()? {
                KeyValue::Press => "dn",
                KeyValue::Release => "up",
                KeyValue::Repeat => "rp",
            };
            Some(format!("{kind}:{}", ev.key_code()?.short_name()))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn simulate_events(cfg: &str, sim: &str) -> Vec<InputEvent> {
    init_log();
    let cfg = new_from_str(cfg).expect("failed to parse cfg");
    let mut engine = Engine::new(Arc::new(cfg));
    sim_batches(sim)
        .into_iter()
        .flat_map(|batch| engine.handle_events(batch).events)
        .collect()
}

fn simulate(cfg: &str, sim: &str) -> String {
    to_ascii(&simulate_events(cfg, sim))
}
