//! The remap configuration and its text format.
//!
//! A configuration file is a sequence of optional top-level lists:
//!
//! ```text
//! (defcfg
//!   fn-enabled yes
//!   fn-key f13
//!   use-led scrolll
//!   third-level-keys (lsft rsft)
//! )
//! (defkeymap f1 back f2 forward)
//! (defmodkeymap minus f11)
//! (defshiftkeymap f6 kbdillumdown)
//! ```
//!
//! Items that are left out keep their built-in defaults. A map block that is present replaces
//! the built-in map entirely, so `(defmodkeymap)` disables the hold-FN layer.

pub mod sexpr;

mod defcfg;
pub use defcfg::*;
use defcfg::{parse_defcfg, parse_key};

mod error;
pub use error::*;

mod keymap;
pub use keymap::*;


use crate::keys::*;
use rustc_hash::FxHashSet as HashSet;
use sexpr::*;
use std::fmt::Write;
use std::path::Path;

pub const DEFCFG: &str = "defcfg";
pub const DEFKEYMAP: &str = "defkeymap";
pub const DEFMODKEYMAP: &str = "defmodkeymap";
pub const DEFSHIFTKEYMAP: &str = "defshiftkeymap";

const TOP_LEVEL_ITEMS: [&str; 4] = [DEFCFG, DEFKEYMAP, DEFMODKEYMAP, DEFSHIFTKEYMAP];

/// The active remapping policy.
///
/// Once built it is not mutated; a reload produces a whole new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapConfig {
    /// Lock state at startup. `true` means mapped keys produce their `key_map` output while FN
    /// is not held.
    pub fn_enabled: bool,
    /// Physical key acting as FN. It is always emitted as `KEY_FN`.
    pub fn_key: KeyCode,
    /// Applied when the lock state disagrees with whether FN is held.
    pub key_map: KeyMap,
    /// Applied whenever FN is held, regardless of lock state.
    pub mod_key_map: KeyMap,
    /// Applied when FN and one of `third_level_keys` are held.
    pub shift_key_map: KeyMap,
    /// LED that mirrors the lock state.
    pub use_led: Option<Led>,
    pub third_level_keys: Vec<KeyCode>,
}

impl Default for RemapConfig {
    fn default() -> Self {
        use KeyCode as K;
        Self {
            fn_enabled: true,
            fn_key: K::KEY_F13,
            key_map: [
                (K::KEY_F1, K::KEY_BACK),
                (K::KEY_F2, K::KEY_FORWARD),
                (K::KEY_F3, K::KEY_REFRESH),
                (K::KEY_F4, K::KEY_F11),
                (K::KEY_F5, K::KEY_SEARCH),
                (K::KEY_F6, K::KEY_BRIGHTNESSDOWN),
                (K::KEY_F7, K::KEY_BRIGHTNESSUP),
                (K::KEY_F8, K::KEY_MUTE),
                (K::KEY_F9, K::KEY_VOLUMEDOWN),
                (K::KEY_F10, K::KEY_VOLUMEUP),
            ]
            .into_iter()
            .collect(),
            mod_key_map: [
                (K::KEY_MINUS, K::KEY_F11),
                (K::KEY_EQUAL, K::KEY_F12),
                (K::KEY_BACKSPACE, K::KEY_DELETE),
                (K::KEY_DOT, K::KEY_INSERT),
                (K::KEY_UP, K::KEY_PAGEUP),
                (K::KEY_LEFT, K::KEY_HOME),
                (K::KEY_RIGHT, K::KEY_END),
                (K::KEY_DOWN, K::KEY_PAGEDOWN),
                (K::KEY_LEFTMETA, K::KEY_CAPSLOCK),
                (K::KEY_TAB, K::KEY_NUMLOCK),
            ]
            .into_iter()
            .collect(),
            shift_key_map: [
                (K::KEY_F6, K::KEY_KBDILLUMDOWN),
                (K::KEY_F7, K::KEY_KBDILLUMUP),
            ]
            .into_iter()
            .collect(),
            use_led: None,
            third_level_keys: vec![K::KEY_LEFTSHIFT, K::KEY_RIGHTSHIFT],
        }
    }
}

impl RemapConfig {
    /// Every key this configuration can emit that the physical keyboard might not have.
    ///
    /// Sorted by code with no duplicates.
    pub fn output_keys(&self) -> Vec<KeyCode> {
        let mut keys: Vec<KeyCode> = self
            .key_map
            .targets()
            .chain(self.mod_key_map.targets())
            .chain(self.shift_key_map.targets())
            .chain(self.third_level_keys.iter().copied())
            .chain(std::iter::once(KeyCode::KEY_FN))
            .chain(self.use_led.and_then(Led::lock_key))
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    /// Write this configuration in the text format accepted by [`new_from_str`].
    pub fn to_cfg_string(&self) -> String {
        let mut s = String::new();
        let on_off = if self.fn_enabled { "yes" } else { "no" };
        let _ = writeln!(s, "({DEFCFG}");
        let _ = writeln!(s, "  fn-enabled {on_off}");
        let _ = writeln!(s, "  fn-key {}", self.fn_key.short_name());
        if let Some(led) = self.use_led {
            let _ = writeln!(s, "  use-led {}", led.short_name());
        }
        let third: Vec<String> = self
            .third_level_keys
            .iter()
            .map(|k| k.short_name())
            .collect();
        let _ = writeln!(s, "  third-level-keys ({})", third.join(" "));
        let _ = writeln!(s, ")");
        for (name, map) in [
            (DEFKEYMAP, &self.key_map),
            (DEFMODKEYMAP, &self.mod_key_map),
            (DEFSHIFTKEYMAP, &self.shift_key_map),
        ] {
            let _ = writeln!(s, "\n({name}");
            for (from, to) in map.iter() {
                let _ = writeln!(s, "  {} {}", from.short_name(), to.short_name());
            }
            let _ = writeln!(s, ")");
        }
        s
    }
}

/// Parse a new configuration from a file.
pub fn new_from_file(p: &Path) -> MResult<RemapConfig> {
    let text = std::fs::read_to_string(p)
        .map_err(|e| miette::miette!("Failed to read config file {}: {e}", p.display()))?;
    let file_name = p
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| p.display().to_string());
    parse_cfg_raw_string(&text, &file_name).map_err(CfgError::into_report)
}

pub fn new_from_str(cfg_text: &str) -> MResult<RemapConfig> {
    parse_cfg_raw_string(cfg_text, "configuration").map_err(CfgError::into_report)
}

/// Parse configuration text. `file_name` is only used for error reporting.
pub fn parse_cfg_raw_string(text: &str, file_name: &str) -> Result<RemapConfig> {
    let top_levels = sexpr::parse(text, file_name)?;
    let mut cfg = RemapConfig::default();
    let mut seen = HashSet::default();
    for tl in top_levels.iter() {
        let Some(first) = tl.t.first() else {
            return Err(CfgError::at(
                &tl.span,
                format!(
                    "Empty list found. Expected one of: {}",
                    TOP_LEVEL_ITEMS.join(", ")
                ),
            ));
        };
        let Some(name) = first.atom() else {
            bail_expr!(first, "The first item of a top-level list must be a name, not a list");
        };
        if !TOP_LEVEL_ITEMS.contains(&name) {
            bail_expr!(
                first,
                "Unknown top-level item: {name}. Expected one of: {}",
                TOP_LEVEL_ITEMS.join(", ")
            );
        }
        if !seen.insert(name) {
            bail_expr!(first, "Only one {name} is allowed, found more than one");
        }
        let rest = &tl.t[1..];
        match name {
            DEFCFG => parse_defcfg(rest, &mut cfg)?,
            DEFKEYMAP => cfg.key_map = parse_keymap(name, first, rest)?,
            DEFMODKEYMAP => cfg.mod_key_map = parse_keymap(name, first, rest)?,
            _ => cfg.shift_key_map = parse_keymap(name, first, rest)?,
        }
    }
    log::debug!(
        "parsed {file_name}: {} key, {} mod, {} shift mappings",
        cfg.key_map.len(),
        cfg.mod_key_map.len(),
        cfg.shift_key_map.len()
    );
    Ok(cfg)
}

fn parse_keymap(name: &str, name_expr: &SExpr, pairs: &[SExpr]) -> Result<KeyMap> {
    if pairs.len() % 2 != 0 {
        let last = pairs.last().unwrap_or(name_expr);
        bail_expr!(
            last,
            "{name} must contain pairs of keys, this key has no output"
        );
    }
    let mut map = KeyMap::new();
    for pair in pairs.chunks_exact(2) {
        let (from_expr, to_expr) = (&pair[0], &pair[1]);
        let from = parse_key(from_expr)?;
        let to = parse_key(to_expr)?;
        if to == KeyCode::KEY_RESERVED {
            bail_expr!(to_expr, "Keys cannot be mapped to the reserved key");
        }
        if map.insert(from, to).is_some() {
            bail_expr!(from_expr, "{from} is mapped more than once in {name}");
        }
    }
    Ok(map)
}
