//! Configuration file parsing and validation

pub mod veritas_toml;

pub use veritas_toml::{CONFIG_FILE, Config, DEFAULT_CONFIG, OutputConfig, VeritasMeta};
