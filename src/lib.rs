use std::path::PathBuf;

pub mod engine;
pub mod oskbd;
pub mod runner;

pub use fnkeyd_parser::cfg;
pub use fnkeyd_parser::keys;


pub const DEFAULT_CFG_NAME: &str = "fnkeyd.kbd";

/// `fnkeyd.kbd` in the current directory, then in the user's config directory.
pub fn default_cfg() -> Option<PathBuf> {
    let default = PathBuf::from(DEFAULT_CFG_NAME);
    if default.is_file() {
        return Some(default);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let fallback = config_dir.join("fnkeyd").join(DEFAULT_CFG_NAME);
        if fallback.is_file() {
            return Some(fallback);
        }
    }

    None
}
