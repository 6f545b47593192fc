use rustc_hash::FxHashSet as HashSet;

use super::error::*;
use super::sexpr::SExpr;
use super::*;
use crate::keys::*;

pub const TRUE_VALUES: [&str; 3] = ["yes", "true", "1"];
pub const FALSE_VALUES: [&str; 3] = ["no", "false", "0"];
pub const BOOLEAN_VALUES: [&str; 6] = ["yes", "true", "1", "no", "false", "0"];

pub const DEFCFG_OPTIONS: [&str; 4] = ["fn-enabled", "fn-key", "use-led", "third-level-keys"];

/// Apply the `defcfg` key-value pairs in `exprs` on top of `cfg`.
pub(super) fn parse_defcfg(exprs: &[SExpr], cfg: &mut RemapConfig) -> Result<()> {
    let mut seen_keys = HashSet::default();
    let mut exprs = exprs.iter();
    while let Some(key) = exprs.next() {
        let Some(val) = exprs.next() else {
            bail_expr!(key, "Found a defcfg option missing a value");
        };
        let Some(k) = key.atom() else {
            bail_expr!(key, "Lists are not allowed as defcfg option names");
        };
        if !seen_keys.insert(k) {
            bail_expr!(key, "Duplicate defcfg option {k}");
        }
        match k {
            "fn-enabled" => cfg.fn_enabled = parse_bool(val, k)?,
            "fn-key" => {
                let fn_key = parse_key(val)?;
                if fn_key == KeyCode::KEY_RESERVED {
                    bail_expr!(val, "fn-key cannot be the reserved key");
                }
                cfg.fn_key = fn_key;
            }
            "use-led" => cfg.use_led = Some(parse_led(val)?),
            "third-level-keys" => {
                let Some(keys) = val.list() else {
                    bail_expr!(val, "third-level-keys must be a list of keys, e.g. (lsft rsft)");
                };
                let mut parsed = vec![];
                for key in keys {
                    let code = parse_key(key)?;
                    if parsed.contains(&code) {
                        bail_expr!(key, "{code} is listed more than once in third-level-keys");
                    }
                    parsed.push(code);
                }
                cfg.third_level_keys = parsed;
            }
            _ => bail_expr!(
                key,
                "Unknown defcfg option {k}. Valid options are: {}",
                DEFCFG_OPTIONS.join(", ")
            ),
        }
    }
    Ok(())
}

fn parse_bool(expr: &SExpr, label: &str) -> Result<bool> {
    let Some(v) = expr.atom() else {
        bail_expr!(
            expr,
            "The value for {label} cannot be a list, it must be one of: {}",
            BOOLEAN_VALUES.join(", "),
        );
    };
    let v = v.to_ascii_lowercase();
    if TRUE_VALUES.contains(&v.as_str()) {
        Ok(true)
    } else if FALSE_VALUES.contains(&v.as_str()) {
        Ok(false)
    } else {
        bail_expr!(
            expr,
            "The value for {label} must be one of: {}",
            BOOLEAN_VALUES.join(", ")
        );
    }
}

pub(super) fn parse_key(expr: &SExpr) -> Result<KeyCode> {
    let Some(name) = expr.atom() else {
        bail_expr!(expr, "Expected a key name, found a list");
    };
    match str_to_keycode(name) {
        Some(k) => Ok(k),
        None => bail_expr!(
            expr,
            "Unknown key name: {name}. Run fnkeyd --list-keys to see the known names"
        ),
    }
}

fn parse_led(expr: &SExpr) -> Result<Led> {
    let Some(name) = expr.atom() else {
        bail_expr!(expr, "Expected an LED name, found a list");
    };
    match str_to_led(name) {
        Some(l) => Ok(l),
        None => bail_expr!(
            expr,
            "Unknown LED name: {name}. Run fnkeyd --list-leds to see the known names"
        ),
    }
}
