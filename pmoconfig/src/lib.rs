//! # RadioRec Configuration Module
//!
//! This module provides configuration management for RadioRec, including:
//! - Locating the settings directory (explicit path, environment, platform default)
//! - Loading `settings.yaml` merged over an embedded default template
//! - Environment variable overrides
//! - Path-based getters and setters over the YAML tree
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::Config;
//!
//! // Load from the platform default location
//! let config = Config::load_config(None)?;
//!
//! // Access configuration values
//! let target = config.get_string(&["global", "target_dir"])?;
//! let stations = config.get_string_map(&["stations"])?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use serde_yaml::{Mapping, Value};
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};
use tracing::{debug, info};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("radiorec.yaml");

/// Name of the settings file inside the configuration directory
pub const SETTINGS_FILE: &str = "settings.yaml";

/// Name of the per-user directory holding the settings file
pub const APP_DIR_NAME: &str = "radiorec";

const ENV_CONFIG_DIR: &str = "RADIOREC_CONFIG";
const ENV_PREFIX: &str = "RADIOREC_CONFIG__";

/// Configuration manager for RadioRec
///
/// Holds the merged YAML tree (embedded defaults, user file, environment
/// overrides). Keys are stored lower-cased, so every lookup is
/// case-insensitive.
///
/// # Examples
///
/// ```no_run
/// use pmoconfig::Config;
/// use std::path::Path;
///
/// let config = Config::load_config(Some(Path::new("/etc/radiorec")))?;
/// println!("settings file: {}", config.path().display());
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Config {
    config_dir: PathBuf,
    path: PathBuf,
    data: Mutex<Value>,
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: Option<&Path>) -> PathBuf {
        // 1. Try provided directory
        if let Some(dir) = directory {
            return dir.to_path_buf();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            if !env_path.is_empty() {
                info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
                return PathBuf::from(env_path);
            }
        }

        // 3. Platform default
        Self::platform_config_dir()
    }

    /// Returns the platform-specific settings directory
    ///
    /// - Linux: `$XDG_CONFIG_HOME/radiorec` (usually `~/.config/radiorec`)
    /// - macOS: `~/Library/Application Support/radiorec`
    /// - Windows: `%LOCALAPPDATA%\radiorec`
    ///
    /// Falls back to `./radiorec` when no home directory can be determined.
    pub fn platform_config_dir() -> PathBuf {
        #[cfg(windows)]
        let base = dirs::data_local_dir();
        #[cfg(not(windows))]
        let base = dirs::config_dir();

        base.map(|dir| dir.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(APP_DIR_NAME))
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        // Create if doesn't exist
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        // Verify it's a directory
        if !path.is_dir() {
            return Err(anyhow!(
                "Settings path {} is not a directory",
                path.display()
            ));
        }

        Ok(())
    }

    /// Loads the configuration
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external `settings.yaml` file if present
    /// 4. Applies environment variable overrides
    ///
    /// When `settings.yaml` does not exist yet, the default template is
    /// written there so it can be edited.
    ///
    /// # Arguments
    ///
    /// * `directory` - The directory containing `settings.yaml`, or `None` to search
    pub fn load_config(directory: Option<&Path>) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);
        Self::validate_config_dir(&config_dir)?;
        info!(config_dir = %config_dir.display(), "Using config directory");

        let path = config_dir.join(SETTINGS_FILE);

        // Charger la configuration par défaut
        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path.display(), "Loaded config file");
                let external_value: Value = serde_yaml::from_slice(&data)?;
                merge_yaml(&mut default_value, &external_value);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(config_file = %path.display(), "Config file not found, writing default template");
                fs::write(&path, DEFAULT_CONFIG)?;
            }
            Err(err) => {
                return Err(anyhow!(
                    "Cannot read settings file {}: {}",
                    path.display(),
                    err
                ))
            }
        }

        let mut config_value = Self::lower_keys_value(default_value);

        // Appliquer les overrides depuis les variables d'environnement
        Self::apply_env_overrides(&mut config_value);

        Ok(Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        })
    }

    /// Builds a configuration from a YAML document without touching the disk
    ///
    /// The document is merged over the embedded defaults. `config_dir` is only
    /// used to resolve relative directories.
    pub fn from_yaml_str(config_dir: impl Into<PathBuf>, yaml: &str) -> Result<Self> {
        let config_dir = config_dir.into();
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        let external: Value = serde_yaml::from_str(yaml)?;
        merge_yaml(&mut value, &external);

        Ok(Config {
            path: config_dir.join(SETTINGS_FILE),
            config_dir,
            data: Mutex::new(Self::lower_keys_value(value)),
        })
    }

    /// The directory holding the settings file
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Full path of the settings file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn data(&self) -> Result<MutexGuard<'_, Value>> {
        self.data
            .lock()
            .map_err(|_| anyhow!("Configuration lock poisoned"))
    }

    /// Sets a configuration value at the specified path (in memory only)
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["global", "target_dir"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.data()?;
        Self::set_value_internal(&mut data, path, value)
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if !matches!(data, Value::Mapping(_)) {
            // Intermediate null or scalar left by the user file
            *data = Value::Mapping(Mapping::new());
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
        let data = self.data()?;
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                let key = key.to_lowercase();

                if let Some(next) = map.get(&Value::String(key)) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    /// Gets a scalar value as a string
    ///
    /// Numbers and booleans are rendered with their YAML spelling.
    pub fn get_string(&self, path: &[&str]) -> Result<String> {
        match self.get_value(path)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            _ => Err(anyhow!("Path {} is not a scalar", path.join("."))),
        }
    }

    /// Gets a mapping of scalar values, sorted by key
    ///
    /// A missing or null node yields an empty map. Entries whose value is not
    /// a scalar are skipped.
    pub fn get_string_map(&self, path: &[&str]) -> Result<BTreeMap<String, String>> {
        let value = match self.get_value(path) {
            Ok(value) => value,
            Err(_) => return Ok(BTreeMap::new()),
        };

        let map = match value {
            Value::Mapping(map) => map,
            Value::Null => return Ok(BTreeMap::new()),
            _ => return Err(anyhow!("Path {} is not a mapping", path.join("."))),
        };

        let mut entries = BTreeMap::new();
        for (k, v) in map {
            let key = match k {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                _ => continue,
            };
            let value = match v {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                _ => {
                    debug!(key = %key, "Skipping non-scalar entry");
                    continue;
                }
            };
            entries.insert(key, value);
        }
        Ok(entries)
    }

    /// Récupère un répertoire géré par la configuration
    ///
    /// Les références `$VAR`/`${VAR}` de la valeur configurée sont développées.
    /// Un chemin relatif est résolu par rapport au répertoire de configuration.
    /// Le répertoire est créé s'il n'existe pas.
    ///
    /// # Arguments
    ///
    /// * `path` - Chemin dans l'arbre de configuration (ex: `&["global", "target_dir"]`)
    /// * `default` - Répertoire par défaut si non configuré
    pub fn get_managed_dir(&self, path: &[&str], default: &str) -> Result<PathBuf> {
        let dir_path = match self.get_string(path) {
            Ok(s) if !s.trim().is_empty() => s,
            _ => default.to_string(),
        };
        self.resolve_and_create_dir(&expand_env_vars(&dir_path))
    }

    /// Résout un chemin relatif ou absolu et crée le répertoire si nécessaire
    fn resolve_and_create_dir(&self, dir_path: &str) -> Result<PathBuf> {
        let path = Path::new(dir_path);

        let absolute_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        };

        if !absolute_path.exists() {
            fs::create_dir_all(&absolute_path)?;
            info!(directory = %absolute_path.display(), "Created directory");
        }

        Ok(absolute_path)
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                let _ = Self::set_value_internal(config, &key_path, yaml_value);
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
}

/// Expands `$VAR` and `${VAR}` references from the process environment
///
/// Unknown variables and malformed references are left untouched.
pub fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match (name.is_empty(), env::var(name)) {
            (false, Ok(val)) => out.push_str(&val),
            _ => out.push_str(&rest[pos..pos + 1 + consumed]),
        }
        rest = &rest[pos + 1 + consumed..];
    }

    out.push_str(rest);
    out
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace those in `default`.
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

    #[test]
    fn test_defaults_are_loaded() {
        let config = Config::from_yaml_str("/tmp/radiorec", "{}").unwrap();
        assert_eq!(
            config.get_string(&["global", "target_dir"]).unwrap(),
            "recordings"
        );
        assert!(config.get_string_map(&["stations"]).unwrap().is_empty());
    }

    #[test]
    fn test_user_file_is_merged_and_lowercased() {
        let yaml = r#"
GLOBAL:
  target_dir: /srv/radio
Stations:
  Jazz: http://jazz.example.org/stream
  talk: http://talk.example.org/list.m3u
"#;
        let config = Config::from_yaml_str("/tmp/radiorec", yaml).unwrap();
        assert_eq!(
            config.get_string(&["global", "target_dir"]).unwrap(),
            "/srv/radio"
        );

        let stations = config.get_string_map(&["STATIONS"]).unwrap();
        assert_eq!(
            stations.keys().collect::<Vec<_>>(),
            vec!["jazz", "talk"]
        );
        assert_eq!(stations["jazz"], "http://jazz.example.org/stream");
    }

    #[test]
    fn test_null_stations_node() {
        let config = Config::from_yaml_str("/tmp/radiorec", "stations:\n").unwrap();
        assert!(config.get_string_map(&["stations"]).unwrap().is_empty());
    }

    #[test]
    fn test_missing_path_is_error() {
        let config = Config::from_yaml_str("/tmp/radiorec", "{}").unwrap();
        assert!(config.get_value(&["global", "nope"]).is_err());
    }

    #[test]
    fn test_set_value_creates_intermediate_maps() {
        let config = Config::from_yaml_str("/tmp/radiorec", "{}").unwrap();
        config
            .set_value(&["Stations", "Rock"], Value::String("http://rock".into()))
            .unwrap();
        assert_eq!(config.get_string(&["stations", "rock"]).unwrap(), "http://rock");
    }

    #[test]
    fn test_merge_yaml_replaces_scalars() {
        let mut base: Value = serde_yaml::from_str("a: 1\nb:\n  c: 2\n  d: 3").unwrap();
        let other: Value = serde_yaml::from_str("a: 5\nb:\n  c: 7").unwrap();
        merge_yaml(&mut base, &other);
        assert_eq!(base["a"], Value::from(5));
        assert_eq!(base["b"]["c"], Value::from(7));
        assert_eq!(base["b"]["d"], Value::from(3));
    }

    #[test]
    fn test_expand_env_vars() {
        env::set_var("PMOCONFIG_TEST_EXPAND", "/music");
        assert_eq!(expand_env_vars("$PMOCONFIG_TEST_EXPAND/rec"), "/music/rec");
        assert_eq!(expand_env_vars("${PMOCONFIG_TEST_EXPAND}_x"), "/music_x");
        assert_eq!(
            expand_env_vars("$PMOCONFIG_TEST_UNSET_VAR/rec"),
            "$PMOCONFIG_TEST_UNSET_VAR/rec"
        );
        assert_eq!(expand_env_vars("cost: 5$"), "cost: 5$");
        assert_eq!(expand_env_vars("${broken"), "${broken");
        assert_eq!(expand_env_vars("plain"), "plain");
    }

    #[test]
    fn test_load_config_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(Some(dir.path())).unwrap();
        assert!(config.path().exists());
        assert_eq!(config.config_dir(), dir.path());

        let managed = config.get_managed_dir(&["global", "target_dir"], "recordings").unwrap();
        assert_eq!(managed, dir.path().join("recordings"));
        assert!(managed.is_dir());
    }

    #[test]
    fn test_load_config_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE),
            "stations:\n  fip: http://icecast.example.org/fip.mp3\n",
        )
        .unwrap();

        let config = Config::load_config(Some(dir.path())).unwrap();
        let stations = config.get_string_map(&["stations"]).unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations["fip"], "http://icecast.example.org/fip.mp3");
    }
}
