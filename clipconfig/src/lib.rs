//! # ClipReel Configuration Module
//!
//! This module provides configuration management for ClipReel, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//! - Thread-safe singleton access pattern
//! - Parsing of the player settings handed over as a query string
//!
//! ## Usage
//!
//! ```no_run
//! use clipconfig::get_config;
//!
//! let config = get_config()?;
//!
//! let days = config.get_player_days()?;
//! config.set_player_views(50)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::info;

pub mod settings;

pub use settings::{PlayerSettings, SettingsError, ShuffleMode};

const DEFAULT_CONFIG: &str = include_str!("clipreel.yaml");

lazy_static! {
    static ref CONFIG: std::result::Result<Arc<Config>, String> =
        Config::load_config("").map(Arc::new).map_err(|e| format!("{:#}", e));
}

const ENV_CONFIG_DIR: &str = "CLIPREEL_CONFIG";
const ENV_PREFIX: &str = "CLIPREEL_CONFIG__";

// Default values for configuration
pub const DEFAULT_PLAYER_DAYS: u64 = 900;
pub const DEFAULT_PLAYER_VIEWS: u64 = 0;
pub const DEFAULT_PLAYER_VOLUME: f64 = 0.5;
pub const DEFAULT_PLAYER_SHUFFLE: ShuffleMode = ShuffleMode::Smart;
const DEFAULT_LOG_MIN_LEVEL: &str = "info";

/// Macro to generate getter/setter for u64 values with default
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<u64> {
            Ok(self.get_u64($path)?.unwrap_or($default))
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Configuration manager for ClipReel
///
/// # Examples
///
/// ```no_run
/// use clipconfig::get_config;
///
/// let config = get_config()?;
/// println!("Minimum views: {}", config.get_player_views()?);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Config {
    path: String,
    data: Mutex<Value>,
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        if Path::new(".clipreel").exists() {
            return ".clipreel".to_string();
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(".clipreel");
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        ".clipreel".to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        fs::read_dir(path)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `CLIPREEL_CONFIG` environment variable
    /// 3. `.clipreel` in the current directory
    /// 4. `.clipreel` in the user's home directory
    ///
    /// The directory is created if it doesn't exist.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&dir_path))?;
        Ok(dir_path)
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    /// 5. Saves the merged configuration
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir = %config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut default_value = Self::lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG)?);

        let yaml_data = if let Ok(data) = fs::read(&path) {
            info!(config_file = %path, "Loaded config file");
            data
        } else {
            info!(config_file = %path, "Config file not found, using default embedded config");
            DEFAULT_CONFIG.as_bytes().to_vec()
        };

        // Keys are lower-cased before merging so `Player.Days` overrides `player.days`
        let external_value = Self::lower_keys_value(serde_yaml::from_slice(&yaml_data)?);
        merge_yaml(&mut default_value, &external_value);
        let mut config_value = default_value;

        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    fn data(&self) -> MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let yaml = serde_yaml::to_string(&*self.data())?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["player", "days"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.data();
            Self::set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        Self::get_value_internal(&self.data(), path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                match map.get(Value::String(key.to_lowercase())) {
                    Some(next) => current = next,
                    None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
                }
            } else {
                return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    /// Reads an unsigned integer, `None` when the path is absent
    ///
    /// Strings holding a number are accepted, as produced by environment overrides
    /// quoted in shell scripts.
    pub fn get_u64(&self, path: &[&str]) -> Result<Option<u64>> {
        match self.get_value(path) {
            Ok(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| anyhow!("{} must be a non-negative integer", path.join("."))),
            Ok(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| anyhow!("{} must be a non-negative integer, got {:?}", path.join("."), s)),
            Ok(Value::Null) | Err(_) => Ok(None),
            Ok(other) => Err(anyhow!("{} has unexpected type: {:?}", path.join("."), other)),
        }
    }

    /// Reads a floating point number, `None` when the path is absent
    pub fn get_f64(&self, path: &[&str]) -> Result<Option<f64>> {
        match self.get_value(path) {
            Ok(Value::Number(n)) => Ok(n.as_f64()),
            Ok(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| anyhow!("{} must be a number, got {:?}", path.join("."), s)),
            Ok(Value::Null) | Err(_) => Ok(None),
            Ok(other) => Err(anyhow!("{} has unexpected type: {:?}", path.join("."), other)),
        }
    }

    /// Reads a string, `None` when the path is absent or empty
    pub fn get_string(&self, path: &[&str]) -> Result<Option<String>> {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s)),
            Ok(Value::String(_)) | Ok(Value::Null) | Err(_) => Ok(None),
            Ok(other) => Err(anyhow!("{} must be a string, got {:?}", path.join("."), other)),
        }
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(e) = Self::set_value_internal(config, &key_path, yaml_value) {
                    tracing::warn!(env_var = %key, "Ignoring environment override: {}", e);
                }
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    let new_key = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    new_map.insert(new_key, Self::lower_keys_value(v));
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    // ========================================================================
    // Player defaults
    // ========================================================================

    impl_u64_config!(
        get_player_days,
        set_player_days,
        &["player", "days"],
        DEFAULT_PLAYER_DAYS
    );

    impl_u64_config!(
        get_player_views,
        set_player_views,
        &["player", "views"],
        DEFAULT_PLAYER_VIEWS
    );

    /// Default playback volume, clamped to `[0, 1]`
    pub fn get_player_volume(&self) -> Result<f64> {
        Ok(self
            .get_f64(&["player", "volume"])?
            .unwrap_or(DEFAULT_PLAYER_VOLUME)
            .clamp(0.0, 1.0))
    }

    /// Default shuffle mode
    pub fn get_player_shuffle(&self) -> Result<ShuffleMode> {
        match self.get_string(&["player", "shuffle"])? {
            Some(name) => name
                .parse()
                .map_err(|e: SettingsError| anyhow!("player.shuffle: {}", e)),
            None => Ok(DEFAULT_PLAYER_SHUFFLE),
        }
    }

    pub fn set_player_shuffle(&self, mode: ShuffleMode) -> Result<()> {
        self.set_value(
            &["player", "shuffle"],
            Value::String(mode.as_str().to_string()),
        )
    }

    // ========================================================================
    // Logging
    // ========================================================================

    /// Minimum log level (a `tracing_subscriber::EnvFilter` directive)
    pub fn get_log_min_level(&self) -> Result<String> {
        Ok(self
            .get_string(&["host", "logger", "min_level"])?
            .unwrap_or_else(|| DEFAULT_LOG_MIN_LEVEL.to_string()))
    }
}

/// Returns the global configuration instance
///
/// Lazily loaded on first access. A load failure is kept and reported to
/// every caller.
pub fn get_config() -> Result<Arc<Config>> {
    CONFIG.clone().map_err(|e| anyhow!("failed to load ClipReel configuration: {}", e))
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default value.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}
