use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(author, version, verbatim_doc_comment)]
/// fnkeyd: an FN lock daemon for keyboards without one
///
/// fnkeyd grabs a keyboard and re-emits its events through a virtual keyboard,
/// turning the function row into media keys (or back) depending on the FN lock.
/// Tap the FN key on its own to flip the lock. Hold it to reach the other layer
/// and the navigation keys.
pub struct Args {
    /// Configuration file to use. If not specified, defaults to fnkeyd.kbd in
    /// the current working directory and '$XDG_CONFIG_HOME/fnkeyd/fnkeyd.kbd'.
    /// If neither exists, the built-in Chromebook layout is used.
    #[arg(short, long, verbatim_doc_comment)]
    pub cfg: Option<PathBuf>,

    /// Fail instead of falling back to the built-in layout when no
    /// configuration file is found.
    #[arg(long, verbatim_doc_comment)]
    pub no_default: bool,

    /// Keyboard device to grab, e.g. /dev/input/event3. If not specified, the
    /// first keyboard in --evdev-dir is used.
    #[arg(short, long, verbatim_doc_comment)]
    pub input_device: Option<PathBuf>,

    /// Directory searched for keyboards.
    #[arg(long, value_name = "DIR", default_value = "/dev/input")]
    pub evdev_dir: PathBuf,

    /// Do not take exclusive access of the keyboard. Other programs will see
    /// both the original and the remapped events.
    #[arg(long, verbatim_doc_comment)]
    pub no_grab: bool,

    /// Exit after this many seconds without input. 0 disables the timeout.
    #[arg(short = 'T', long, value_name = "SECONDS", default_value_t = 0)]
    pub timeout: u64,

    /// Key that acts as FN. Overrides the configuration file.
    #[arg(long, value_name = "NAME")]
    pub fn_key: Option<String>,

    /// LED that shows the FN lock, or "none". Overrides the configuration file.
    #[arg(long, value_name = "NAME")]
    pub use_led: Option<String>,

    /// Print the effective configuration and exit.
    #[arg(long)]
    pub dump_cfg: bool,

    /// Validate configuration file and exit
    #[arg(long, verbatim_doc_comment)]
    pub check: bool,

    /// List the key names accepted in configuration files and exit.
    #[arg(long)]
    pub list_keys: bool,

    /// List the LED names accepted in configuration files and exit.
    #[arg(long)]
    pub list_leds: bool,

    /// List the keyboards available for grabbing and exit.
    #[arg(long)]
    pub list_devices: bool,

    /// Print the events of the keyboard without grabbing or remapping it.
    #[arg(long)]
    pub show_keys: bool,

    /// Disable logging, except for errors. Takes precedent over debug and trace.
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    pub debug: bool,

    /// Enable trace logging; implies --debug as well.
    #[arg(short, long)]
    pub trace: bool,
}
