//! # PMOVideos Configuration Module
//!
//! This module provides configuration management for PMOVideos, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Typed getters with defaults, used by the per-crate `*ConfigExt` traits
//! - Thread-safe singleton access pattern
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use std::time::Duration;
//!
//! let config = get_config();
//!
//! let level = config.get_log_min_level()?;
//! let ttl = config.get_duration_secs(&["sources", "gist", "cache_ttl_secs"], Duration::from_secs(300))?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Every component also accepts an explicit `&Config`, so tests can load an
//! isolated configuration from a temporary directory with [`Config::load_config`].

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde_yaml::{Mapping, Number, Value};
use std::{env, fs, path::Path, sync::Arc, time::Duration};
use tracing::{info, warn};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmovideos.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> = Arc::new(match Config::load_config("") {
        Ok(config) => config,
        Err(err) => {
            warn!("Failed to load PMOVideos configuration, using embedded defaults: {}", err);
            Config::embedded()
        }
    });
}

const ENV_CONFIG_DIR: &str = "PMOVIDEOS_CONFIG";
const ENV_PREFIX: &str = "PMOVIDEOS_CONFIG__";
const CONFIG_DIR_NAME: &str = ".pmovideos";

// Default values for configuration
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            self.get_bool($path, $default)
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Configuration manager for PMOVideos
///
/// This structure manages the application configuration, including:
/// - Loading configuration from YAML files
/// - Merging with default configuration
/// - Handling environment variable overrides
/// - Providing typed getters/setters for configuration values
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: Option<String>,
    data: Mutex<Value>,
}

// Implémentation manuelle de Clone
impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.data.lock().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var=ENV_CONFIG_DIR, path=%env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(CONFIG_DIR_NAME).exists() {
            return CONFIG_DIR_NAME.to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        // Default fallback
        CONFIG_DIR_NAME.to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("Le chemin spécifié n'est pas un répertoire"));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `PMOVIDEOS_CONFIG` environment variable
    /// 3. `.pmovideos` in the current directory
    /// 4. `.pmovideos` in the user's home directory
    ///
    /// The directory is created if it doesn't exist, and validated for write permission.
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
        info!(config_dir=%config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        let yaml_data = if let Ok(data) = fs::read(&path) {
            info!(config_file=%path, "Loaded config file");
            data
        } else {
            info!(config_file=%path, "Config file not found, using default embedded config");
            DEFAULT_CONFIG.as_bytes().to_vec()
        };

        // Merger avec la config par défaut
        let external_value: Value = serde_yaml::from_slice(&yaml_data)?;
        merge_yaml(&mut default_value, &external_value);
        let mut config_value = Self::lower_keys_value(default_value);

        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path: Some(path),
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Builds an in-memory configuration from the embedded defaults only
    ///
    /// Nothing is read from or written to disk.
    pub fn embedded() -> Self {
        let value = serde_yaml::from_str::<Value>(DEFAULT_CONFIG)
            .map(Self::lower_keys_value)
            .unwrap_or(Value::Mapping(Mapping::new()));
        Config {
            config_dir: String::new(),
            path: None,
            data: Mutex::new(value),
        }
    }

    /// Returns the directory this configuration was loaded from
    pub fn directory(&self) -> &str {
        &self.config_dir
    }

    /// Saves the current configuration to the config.yaml file
    ///
    /// In-memory configurations (see [`Config::embedded`]) are not persisted.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let yaml = {
            let data = self.data.lock();
            serde_yaml::to_string(&*data)?
        };
        fs::write(path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["sources", "gist", "id"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.data.lock();
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
        let data = self.data.lock();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                let key = key.to_lowercase();

                if let Some(next) = map.get(Value::String(key)) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    /// Reads an unsigned integer, falling back to `default` when absent
    ///
    /// Numeric strings (as produced by environment overrides) are accepted.
    pub fn get_u64(&self, path: &[&str], default: u64) -> Result<u64> {
        match self.get_value(path) {
            Ok(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| anyhow!("{} must be a positive integer", path.join("."))),
            Ok(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| anyhow!("{} is not an integer: {}", path.join("."), s)),
            Ok(Value::Null) | Err(_) => Ok(default),
            Ok(other) => Err(anyhow!("{} has unexpected type: {:?}", path.join("."), other)),
        }
    }

    /// Writes an unsigned integer
    pub fn set_u64(&self, path: &[&str], value: u64) -> Result<()> {
        self.set_value(path, Value::Number(Number::from(value)))
    }

    /// Reads a boolean, falling back to `default` when absent or not a bool
    pub fn get_bool(&self, path: &[&str], default: bool) -> Result<bool> {
        match self.get_value(path) {
            Ok(Value::Bool(b)) => Ok(b),
            _ => Ok(default),
        }
    }

    /// Reads a string; absent, null or blank values are `None`
    pub fn get_string(&self, path: &[&str]) -> Result<Option<String>> {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s)),
            Ok(Value::Number(n)) => Ok(Some(n.to_string())),
            Ok(Value::String(_)) | Ok(Value::Null) | Err(_) => Ok(None),
            Ok(other) => Err(anyhow!("{} is not a string: {:?}", path.join("."), other)),
        }
    }

    /// Writes a string
    pub fn set_string(&self, path: &[&str], value: &str) -> Result<()> {
        self.set_value(path, Value::String(value.to_string()))
    }

    /// Reads a list of strings; a single string is accepted as a one-element list
    pub fn get_string_list(&self, path: &[&str]) -> Result<Vec<String>> {
        match self.get_value(path) {
            Ok(Value::Sequence(seq)) => Ok(seq
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect()),
            Ok(Value::String(s)) if !s.is_empty() => Ok(vec![s]),
            _ => Ok(Vec::new()),
        }
    }

    /// Reads a duration expressed in milliseconds
    pub fn get_duration_ms(&self, path: &[&str], default: Duration) -> Result<Duration> {
        self.get_u64(path, default.as_millis() as u64)
            .map(Duration::from_millis)
    }

    /// Reads a duration expressed in seconds
    pub fn get_duration_secs(&self, path: &[&str], default: Duration) -> Result<Duration> {
        self.get_u64(path, default.as_secs()).map(Duration::from_secs)
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if key.starts_with(ENV_PREFIX) {
                let key_path = key
                    .trim_start_matches(ENV_PREFIX)
                    .split("__")
                    .collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(err) = Self::set_value_internal(config, &key_path, yaml_value) {
                    warn!(env_var=%key, "Ignoring environment override: {}", err);
                }
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    if let Value::String(s) = k {
                        new_map.insert(Value::String(s.to_lowercase()), Self::lower_keys_value(v));
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v));
                    }
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    /// Récupère le niveau de log minimum depuis la configuration
    pub fn get_log_min_level(&self) -> Result<String> {
        Ok(self
            .get_string(&["host", "logger", "min_level"])?
            .unwrap_or_else(|| DEFAULT_LOG_MIN_LEVEL.to_string()))
    }

    /// Définit le niveau de log minimum dans la configuration
    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level))
    }
}

/// Returns the global configuration instance
///
/// This function provides access to the singleton configuration instance,
/// which is lazily loaded on first access. When the configuration directory
/// cannot be prepared, the embedded defaults are used.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Merges external YAML configuration into default configuration
///
/// - For mappings (objects), it merges keys from external into default
/// - For scalars and sequences, external values replace default values
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
        (d, e) => *d = e.clone(), // pour les scalaires ou séquences, on remplace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_with(yaml: &str) -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), yaml).unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_embedded_defaults_are_loaded() {
        let config = Config::embedded();
        assert_eq!(config.get_log_min_level().unwrap(), "INFO");
        assert_eq!(
            config
                .get_u64(&["sources", "youtube", "max_batch_size"], 0)
                .unwrap(),
            50
        );
    }

    #[test]
    fn test_user_file_is_merged_over_defaults() {
        let (_dir, config) = load_with("sources:\n  gist:\n    cache_ttl_secs: 42\n");

        assert_eq!(
            config
                .get_duration_secs(&["sources", "gist", "cache_ttl_secs"], Duration::ZERO)
                .unwrap(),
            Duration::from_secs(42)
        );
        // Les autres valeurs par défaut restent présentes
        assert_eq!(
            config
                .get_u64(&["sources", "youtube", "max_batch_size"], 0)
                .unwrap(),
            50
        );
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let (_dir, config) = load_with("Host:\n  Logger:\n    Min_Level: DEBUG\n");
        assert_eq!(config.get_log_min_level().unwrap(), "DEBUG");
    }

    #[test]
    fn test_blank_strings_are_not_configured() {
        let (_dir, config) = load_with("sources:\n  gist:\n    token: \"  \"\n");
        assert_eq!(config.get_string(&["sources", "gist", "token"]).unwrap(), None);
    }

    #[test]
    fn test_missing_values_use_default() {
        let config = Config::embedded();
        assert_eq!(config.get_u64(&["nope", "nothing"], 7).unwrap(), 7);
        assert!(config.get_string_list(&["nope"]).unwrap().is_empty());
    }

    #[test]
    fn test_set_value_persists() {
        let (dir, config) = load_with("{}\n");
        config.set_u64(&["player", "error_display_ms"], 1234).unwrap();

        let reloaded = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(
            reloaded
                .get_duration_ms(&["player", "error_display_ms"], Duration::ZERO)
                .unwrap(),
            Duration::from_millis(1234)
        );
    }

    #[test]
    fn test_merge_yaml_replaces_sequences() {
        let mut base: Value = serde_yaml::from_str("a: [1, 2]\nb: {c: 1}").unwrap();
        let ext: Value = serde_yaml::from_str("a: [3]\nb: {d: 2}").unwrap();
        merge_yaml(&mut base, &ext);

        let expected: Value = serde_yaml::from_str("a: [3]\nb: {c: 1, d: 2}").unwrap();
        assert_eq!(base, expected);
    }
}
