pub(crate) mod args;

use anyhow::{anyhow, bail, Result};
use fnkeyd::cfg::{self, RemapConfig};
use fnkeyd::keys::*;
use std::path::{Path, PathBuf};

use args::Args;

/// Key and LED choices given on the command line. They win over the configuration file and
/// are applied again after every reload.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct CfgOverrides {
    pub fn_key: Option<KeyCode>,
    /// `Some(None)` turns the LED off.
    pub use_led: Option<Option<Led>>,
}

impl CfgOverrides {
    pub fn from_args(args: &Args) -> Result<Self> {
        let fn_key = args
            .fn_key
            .as_deref()
            .map(|name| {
                str_to_keycode(name)
                    .filter(|k| *k != KeyCode::KEY_RESERVED)
                    .ok_or_else(|| {
                        anyhow!(
                            "Unknown key name for --fn-key: {name}\n\
                             Run fnkeyd --list-keys to see the valid names."
                        )
                    })
            })
            .transpose()?;
        let use_led = args
            .use_led
            .as_deref()
            .map(|name| {
                if name.eq_ignore_ascii_case("none") {
                    return Ok(None);
                }
                str_to_led(name).map(Some).ok_or_else(|| {
                    anyhow!(
                        "Unknown LED name for --use-led: {name}\n\
                         Run fnkeyd --list-leds to see the valid names."
                    )
                })
            })
            .transpose()?;
        Ok(Self { fn_key, use_led })
    }

    pub fn apply(&self, cfg: &mut RemapConfig) {
        if let Some(k) = self.fn_key {
            cfg.fn_key = k;
        }
        if let Some(led) = self.use_led {
            cfg.use_led = led;
        }
    }
}

/// The configuration file to load, or `None` for the built-in layout.
pub(crate) fn cfg_path(args: &Args) -> Result<Option<PathBuf>> {
    match &args.cfg {
        Some(p) if !p.exists() => bail!(
            "Could not find the config file ({})\nFor more info, pass the `-h` or `--help` flags.",
            p.display()
        ),
        Some(p) => Ok(Some(p.clone())),
        None => match fnkeyd::default_cfg() {
            Some(p) => Ok(Some(p)),
            None if args.no_default => bail!(
                "No config file found and --no-default was given\nFor more info, pass the `-h` or `--help` flags."
            ),
            None => Ok(None),
        },
    }
}

pub(crate) fn load_cfg(path: Option<&Path>, overrides: &CfgOverrides) -> Result<RemapConfig> {
    let mut cfg = match path {
        Some(p) => match cfg::new_from_file(p) {
            Ok(cfg) => {
                log::info!("loaded {}", p.display());
                cfg
            }
            Err(e) => {
                log::error!("{e:?}");
                bail!("failed to parse file {}", p.display());
            }
        },
        None => {
            log::info!("no config file found, using the built-in layout");
            RemapConfig::default()
        }
    };
    overrides.apply(&mut cfg);
    Ok(cfg)
}

pub(crate) fn list_keys() {
    for (code, name) in all_key_names() {
        println!("{:>4}  {name}  ({})", code.code(), code.short_name());
    }
}

pub(crate) fn list_leds() {
    for (led, name) in all_led_names() {
        println!("{}", led_line(led, name));
    }
}

fn led_line(led: Led, name: &str) -> String {
    match led.lock_key() {
        Some(k) => format!(
            "{:>2}  {name}  ({}, tapped with {k})",
            led.code(),
            led.short_name()
        ),
        None => format!("{:>2}  {name}  ({})", led.code(), led.short_name()),
    }
}

#[cfg(target_os = "linux")]
pub(crate) fn list_devices_linux(dir: &Path) -> Result<()> {
    println!("Available keyboard devices:");
    println!("===========================");

    let devices = fnkeyd::oskbd::list_keyboards(dir)?;
    if devices.is_empty() {
        println!("No keyboard devices found.");
        println!("\nTroubleshooting:");
        println!("  1. Check permissions: sudo usermod -a -G input $USER");
        println!("  2. Log out and back in for group changes to take effect");
        println!("  3. Ensure devices are connected and working");
        return Ok(());
    }

    println!("Found {} keyboard device(s):\n", devices.len());
    for (i, (path, name)) in devices.iter().enumerate() {
        println!("  {}. \"{name}\"", i + 1);
        println!("     Path: {}", path.display());
    }
    println!("\nUsage example:");
    println!("  fnkeyd --input-device {}", devices[0].0.display());
    Ok(())
}

/// Print every event of `kbd_in` until reading fails. The device is not grabbed.
pub(crate) fn show_keys(kbd_in: &mut dyn fnkeyd::oskbd::KbdIn) -> Result<()> {
    println!("Printing events of {}. Press Ctrl-C to exit.", kbd_in.name());
    let mut reader = kbd_in.reader()?;
    loop {
        if let Some(batch) = reader.read_batch()? {
            for ev in batch {
                println!("{ev}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("fnkeyd").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn led_listing_names_the_lock_key() {
        assert_eq!(
            " 2  LED_SCROLLL  (scrolll, tapped with KEY_SCROLLLOCK)",
            led_line(Led::LED_SCROLLL, "LED_SCROLLL")
        );
        assert_eq!(" 9  LED_MAIL  (mail)", led_line(Led::LED_MAIL, "LED_MAIL"));
    }

    #[test]
    fn overrides_apply_over_file_values() {
        let o = CfgOverrides::from_args(&args(&["--fn-key", "rightalt", "--use-led", "capsl"]))
            .unwrap();
        let mut cfg = RemapConfig::default();
        o.apply(&mut cfg);
        assert_eq!(cfg.fn_key, KeyCode::KEY_RIGHTALT);
        assert_eq!(cfg.use_led, Some(Led::LED_CAPSL));
    }

    #[test]
    fn use_led_none_clears_led() {
        let o = CfgOverrides::from_args(&args(&["--use-led", "none"])).unwrap();
        let mut cfg = RemapConfig {
            use_led: Some(Led::LED_SCROLLL),
            ..Default::default()
        };
        o.apply(&mut cfg);
        assert_eq!(cfg.use_led, None);
    }

    #[test]
    fn bad_override_names_are_rejected() {
        let e = CfgOverrides::from_args(&args(&["--fn-key", "nope"])).unwrap_err();
        assert!(e.to_string().contains("--fn-key: nope"));
        let e = CfgOverrides::from_args(&args(&["--use-led", "nope"])).unwrap_err();
        assert!(e.to_string().contains("--use-led: nope"));
        assert!(CfgOverrides::from_args(&args(&["--fn-key", "reserved"])).is_err());
    }

    #[test]
    fn missing_cfg_file_is_an_error() {
        let e = cfg_path(&args(&["-c", "/nonexistent/fnkeyd.kbd"])).unwrap_err();
        assert!(e.to_string().contains("Could not find the config file"));
    }

    #[test]
    fn load_cfg_reads_file_and_applies_overrides() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "(defcfg fn-enabled no fn-key f12)").unwrap();
        let o = CfgOverrides {
            use_led: Some(Some(Led::LED_NUML)),
            ..Default::default()
        };
        let cfg = load_cfg(Some(f.path()), &o).unwrap();
        assert!(!cfg.fn_enabled);
        assert_eq!(cfg.fn_key, KeyCode::KEY_F12);
        assert_eq!(cfg.use_led, Some(Led::LED_NUML));
    }

    #[test]
    fn load_cfg_reports_parse_errors() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "(defkeymap f1)").unwrap();
        assert!(load_cfg(Some(f.path()), &CfgOverrides::default()).is_err());
    }

    #[test]
    fn no_path_means_builtin_layout() {
        let cfg = load_cfg(None, &CfgOverrides::default()).unwrap();
        assert_eq!(cfg, RemapConfig::default());
    }
}
