//! Key tables and the configuration language of fnkeyd, an FN-lock key remapping daemon.

pub mod cfg;
pub mod keys;
