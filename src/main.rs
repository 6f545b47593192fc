use anyhow::{bail, Result};
use clap::Parser;
use simplelog::*;

mod main_lib;

use main_lib::args::Args;
use main_lib::*;

/// Parse CLI arguments and initialize logging.
fn cli_init() -> Result<Args> {
    let args = Args::parse();

    let log_lvl = match (args.quiet, args.debug, args.trace) {
        (true, _, _) => LevelFilter::Error,
        (_, _, true) => LevelFilter::Trace,
        (_, true, false) => LevelFilter::Debug,
        (false, false, false) => LevelFilter::Info,
    };

    let mut log_cfg = ConfigBuilder::new();
    if let Err(e) = log_cfg.set_time_offset_to_local() {
        eprintln!("WARNING: could not set log TZ to local: {e:?}");
    };
    log_cfg.set_time_format_rfc3339();
    if let Err(e) = CombinedLogger::init(vec![TermLogger::new(
        log_lvl,
        log_cfg.build(),
        TerminalMode::Mixed,
        ColorChoice::AlwaysAnsi,
    )]) {
        bail!("could not initialize logging: {e}");
    }
    log::info!("fnkeyd v{} starting", env!("CARGO_PKG_VERSION"));

    Ok(args)
}

fn main_impl() -> Result<()> {
    let args = cli_init()?;

    if args.list_keys {
        list_keys();
        return Ok(());
    }
    if args.list_leds {
        list_leds();
        return Ok(());
    }
    #[cfg(target_os = "linux")]
    if args.list_devices {
        return list_devices_linux(&args.evdev_dir);
    }

    let overrides = CfgOverrides::from_args(&args)?;
    let path = cfg_path(&args)?;

    if args.check {
        log::info!("validating config only and exiting");
        load_cfg(path.as_deref(), &overrides)?;
        log::info!("configuration is valid");
        return Ok(());
    }

    let cfg = load_cfg(path.as_deref(), &overrides)?;
    if args.dump_cfg {
        print!("{}", cfg.to_cfg_string());
        return Ok(());
    }

    #[cfg(target_os = "linux")]
    {
        linux::run(&args, path, overrides, cfg)
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = cfg;
        bail!("fnkeyd can only grab keyboards on Linux")
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use anyhow::{Context, Result};
    use std::io;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use fnkeyd::cfg::RemapConfig;
    use fnkeyd::oskbd::*;
    use fnkeyd::runner::*;

    use super::*;

    pub(super) fn run(
        args: &Args,
        path: Option<PathBuf>,
        overrides: CfgOverrides,
        cfg: RemapConfig,
    ) -> Result<()> {
        let mut kbd_in = match &args.input_device {
            Some(p) => LinuxKbdIn::open(p),
            None => LinuxKbdIn::discover(&args.evdev_dir),
        }
        .context("failed to open the keyboard")?;

        if args.show_keys {
            return show_keys(&mut kbd_in);
        }

        let opts = RunnerOpts {
            grab: !args.no_grab,
            idle_timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
            ..Default::default()
        };
        let mut runner = Runner::start(
            Box::new(kbd_in),
            |caps| -> io::Result<Box<dyn KbdOut>> {
                Ok(Box::new(LinuxKbdOut::create_matching(caps)?))
            },
            Arc::new(cfg),
            opts,
        )?;
        if let Some(path) = path {
            runner = runner.with_reloader(Box::new(move || load_cfg(Some(&path), &overrides)));
        }

        let (notifier, inbox) = inbox();
        let signals = match forward_signals(notifier.clone()) {
            Ok(handle) => handle,
            Err(e) => {
                if let Err(se) = runner.shutdown() {
                    log::error!("{se:#}");
                }
                return Err(e).context("failed to install signal handlers");
            }
        };

        let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]);
        let reason = runner.run(notifier, inbox);
        signals.close();
        let _ = sd_notify::notify(false, &[sd_notify::NotifyState::Stopping]);

        let shutdown = runner.shutdown();
        let reason = reason?;
        shutdown?;
        log::info!("exiting: {reason:?}");
        Ok(())
    }
}

fn main() -> Result<()> {
    let ret = main_impl();
    if let Err(ref e) = ret {
        log::error!("{e}\n");
    }
    ret
}
