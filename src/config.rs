//! Global config for tries
//! Includes settings for proof batching.
use std::collections::HashMap;

use camino::Utf8PathBuf;
use config::{Config, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde::Deserialize;

/// Global config variable for `Settings`
pub static TRIE_CONFIG: OnceCell<Settings> = OnceCell::new();

/// Global path variable for configuration file
pub static TRIE_CONFIG_FILE: OnceCell<Utf8PathBuf> = OnceCell::new();

/// Gets the `TRIE_CONFIG` settings. If uninitialized, sets the global variable
/// in the following order (greatest to least precedence):
/// - `settings` map if provided, e.g. with key ("batch_size", "4")
/// - Env var per setting, e.g. `LURK_TRIE_BATCH_SIZE`
/// - Config file, which also has a configurable location (see `trie_config_file()`),
///   and has the following syntax for e.g. TOML:
///   ```toml
///   batch_size = 4
///   ```
/// - Default values, e.g. a batch size of 1
pub fn trie_config(
    file: Option<&Utf8PathBuf>,
    settings: Option<&HashMap<&str, String>>,
) -> &'static Settings {
    TRIE_CONFIG
        .get_or_init(|| Settings::from_config(trie_config_file(file), settings).unwrap_or_default())
}

/// Gets the `TRIE_CONFIG_FILE` path. If uninitialized, sets the global variable
/// in the following order (greatest to least precedence):
/// - `config_file` parameter if provided
/// - `LURK_TRIE_CONFIG_FILE` env var
/// - Default location at `$HOME/.lurk/trie.toml`
pub fn trie_config_file(config_file: Option<&Utf8PathBuf>) -> &'static Utf8PathBuf {
    TRIE_CONFIG_FILE.get_or_init(|| {
        if let Some(file) = config_file {
            file.clone()
        } else if let Ok(file) = std::env::var("LURK_TRIE_CONFIG_FILE") {
            Utf8PathBuf::from(file)
        } else {
            lurk_default_dir().join("trie.toml")
        }
    })
}

/// Contains the trie config settings
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Insertions proved per folding step
    pub batch_size: usize,
}

impl Settings {
    /// Loads config settings from a file or env vars
    pub fn from_config(
        config_file: &Utf8PathBuf,
        settings: Option<&HashMap<&str, String>>,
    ) -> Result<Self, ConfigError> {
        let batch_size = "batch_size";
        // Settings are read first to last, in order of increasing precedence.
        // Hence, default values must come first so they are overriden by all other methods.
        Config::builder()
            .set_default(batch_size, 1_i64)?
            .add_source(File::with_name(config_file.as_str()).required(false))
            // Then override with any `LURK_TRIE` environment variables
            .add_source(Environment::with_prefix("LURK_TRIE").try_parsing(true))
            // Optionally override if settings were specified by the caller
            .set_override_option(
                batch_size,
                settings.and_then(|s| s.get(batch_size).map(|v| v.to_owned())),
            )?
            .build()
            .and_then(|c| c.try_deserialize())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self { batch_size: 1 }
    }
}

/// The directory holding the default config file.
pub fn lurk_default_dir() -> Utf8PathBuf {
    #[cfg(not(target_arch = "wasm32"))]
    let base = home_dir().unwrap_or_else(|| Utf8PathBuf::from("."));
    #[cfg(target_arch = "wasm32")]
    let base = Utf8PathBuf::from(".");
    base.join(".lurk")
}

/// Returns the home directory used by `cargo`` and `rustup`, if it exists and is valid Unicode
#[cfg(not(target_arch = "wasm32"))]
pub fn home_dir() -> Option<Utf8PathBuf> {
    home::home_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}
