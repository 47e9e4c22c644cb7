//! Run settings: defaults, then an optional JSON settings file, then
//! `BENCH_*` environment variables. Command-line flags are applied last by
//! the binary.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::metrics::METRICS_FILE;
use crate::repository::StoreKind;

pub const SETTINGS_FILE: &str = "appsettings.json";
pub const SETTINGS_FILE_VAR: &str = "BENCH_SETTINGS_FILE";

const DEFAULT_KEYDB_HOST: &str = "127.0.0.1";
const DEFAULT_KEYDB_PORT: u16 = 6379;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Settings {
    /// Directory holding `events.csv` and `results.csv`.
    pub input_dir: PathBuf,
    /// Directory receiving the metrics CSV.
    pub output_dir: PathBuf,
    pub scale: u32,
    pub repetitions: u32,
    /// Delete the metrics CSV before the run.
    pub reset_metrics: bool,
    /// Drop and recreate tables/collections before the run.
    pub reset_stores: bool,
    pub stores: Vec<StoreKind>,
    pub sqlite: SqliteSettings,
    #[serde(rename = "KeyDb")]
    pub keydb: KeyDbSettings,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("Input"),
            output_dir: PathBuf::from("output"),
            scale: 1,
            repetitions: 1,
            reset_metrics: false,
            reset_stores: true,
            stores: vec![StoreKind::Sqlite, StoreKind::KeyDb],
            sqlite: SqliteSettings::default(),
            keydb: KeyDbSettings::default(),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SqliteSettings {
    /// Database file, or `:memory:`.
    pub path: String,
}

impl Default for SqliteSettings {
    fn default() -> Self {
        Self {
            path: "output/athletics.sqlite".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct KeyDbSettings {
    /// Full connection URL. When set, the individual parts are ignored.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub database: u32,
    /// Prefix of every key the benchmark writes.
    pub namespace: String,
}

impl Default for KeyDbSettings {
    fn default() -> Self {
        Self {
            url: None,
            host: DEFAULT_KEYDB_HOST.to_string(),
            port: DEFAULT_KEYDB_PORT,
            password: None,
            database: 0,
            namespace: "bench".to_string(),
        }
    }
}

impl KeyDbSettings {
    /// Connection URL, assembled from the parts unless given outright.
    pub fn url(&self) -> String {
        if let Some(url) = self.url.as_deref().filter(|u| !u.trim().is_empty()) {
            return url.to_string();
        }
        let auth = match self.password.as_deref() {
            Some(password) if !password.is_empty() => format!(":{password}@"),
            _ => String::new(),
        };
        format!(
            "redis://{auth}{}:{}/{}",
            self.host, self.port, self.database
        )
    }
}

impl Settings {
    /// Load settings from the settings file (if present) and the process
    /// environment, returning them with the path of the file that was read.
    ///
    /// A settings file named by `BENCH_SETTINGS_FILE` must exist; the default
    /// `appsettings.json` is optional.
    pub fn load() -> Result<(Self, Option<PathBuf>), ConfigError> {
        Self::load_with(|key| env::var(key).ok())
    }

    /// [`Settings::load`] with every variable looked up through `lookup`.
    pub fn load_with<F>(lookup: F) -> Result<(Self, Option<PathBuf>), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let named = lookup(SETTINGS_FILE_VAR).filter(|v| !v.trim().is_empty());
        let (path, required) = match named {
            Some(path) => (PathBuf::from(path), true),
            None => (PathBuf::from(SETTINGS_FILE), false),
        };

        let (mut settings, source) = if required || path.exists() {
            (Self::from_file(&path)?, Some(path))
        } else {
            (Self::default(), None)
        };

        settings.apply_env(lookup)?;
        settings.validate()?;
        Ok((settings, source))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override fields from `BENCH_*` variables, looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("BENCH_INPUT_DIR") {
            self.input_dir = PathBuf::from(v);
        }
        if let Some(v) = var("BENCH_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = var("BENCH_SCALE") {
            self.scale = parse_number("BENCH_SCALE", &v)?;
        }
        if let Some(v) = var("BENCH_REPETITIONS") {
            self.repetitions = parse_number("BENCH_REPETITIONS", &v)?;
        }
        if let Some(v) = var("BENCH_RESET_METRICS") {
            self.reset_metrics = parse_flag("BENCH_RESET_METRICS", &v)?;
        }
        if let Some(v) = var("BENCH_RESET_STORES") {
            self.reset_stores = parse_flag("BENCH_RESET_STORES", &v)?;
        }
        if let Some(v) = var("BENCH_STORES") {
            self.stores = StoreKind::parse_list(&v)?;
        }
        if let Some(v) = var("BENCH_SQLITE_PATH") {
            self.sqlite.path = v;
        }
        if let Some(v) = var("BENCH_KEYDB_URL") {
            self.keydb.url = Some(v);
        }
        if let Some(v) = var("BENCH_KEYDB_NAMESPACE") {
            self.keydb.namespace = v;
        }
        if let Some(v) = var("BENCH_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = var("BENCH_LOG_FILE") {
            self.log_file = Some(PathBuf::from(v));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repetitions == 0 {
            return Err(invalid("Repetitions", "0", "at least 1"));
        }
        if self.stores.is_empty() {
            return Err(invalid("Stores", "", "a non-empty list of stores"));
        }
        self.log_level_filter()?;
        Ok(())
    }

    pub fn log_level_filter(&self) -> Result<LevelFilter, ConfigError> {
        let expected = "one of off, error, warn, info, debug, trace";
        self.log_level
            .parse()
            .map_err(|_| invalid("LogLevel", &self.log_level, expected))
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.output_dir.join(METRICS_FILE)
    }
}

fn invalid(key: &str, value: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    }
}

fn parse_number(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(key, value, "a non-negative integer"))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "true or false")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_compare_sqlite_and_keydb() {
        let settings = Settings::default();
        assert_eq!(settings.stores, vec![StoreKind::Sqlite, StoreKind::KeyDb]);
        assert_eq!(settings.scale, 1);
        assert_eq!(settings.metrics_path(), Path::new("output/metrics.csv"));
        assert_eq!(settings.keydb.url(), "redis://127.0.0.1:6379/0");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn partial_settings_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let json = r#"{
            "Scale": 4,
            "Stores": ["memory"],
            "KeyDb": { "Host": "keydb", "Password": "s3cret" }
        }"#;
        fs::write(&path, json).unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.scale, 4);
        assert_eq!(settings.stores, vec![StoreKind::Memory]);
        assert_eq!(settings.repetitions, 1);
        assert_eq!(settings.keydb.url(), "redis://:s3cret@keydb:6379/0");
    }

    #[test]
    fn malformed_settings_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{ not json").unwrap();

        let err = Settings::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(SETTINGS_FILE));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut settings = Settings::default();
        settings
            .apply_env(lookup(&[
                ("BENCH_SCALE", "10"),
                ("BENCH_REPETITIONS", "3"),
                ("BENCH_RESET_METRICS", "yes"),
                ("BENCH_STORES", "memory,sqlite"),
                ("BENCH_KEYDB_URL", "redis://cache:5556/"),
                ("BENCH_OUTPUT_DIR", ""),
            ]))
            .unwrap();

        assert_eq!(settings.scale, 10);
        assert_eq!(settings.repetitions, 3);
        assert!(settings.reset_metrics);
        assert_eq!(settings.stores, vec![StoreKind::Memory, StoreKind::Sqlite]);
        assert_eq!(settings.keydb.url(), "redis://cache:5556/");
        assert_eq!(settings.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn invalid_environment_values_are_rejected() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env(lookup(&[("BENCH_SCALE", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("BENCH_SCALE"));

        let err = settings
            .apply_env(lookup(&[("BENCH_RESET_STORES", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("maybe"));
    }

    #[test]
    fn named_settings_file_is_read_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.json");
        fs::write(&path, r#"{ "Repetitions": 3, "Stores": ["memory"] }"#).unwrap();
        let named = path.to_string_lossy().into_owned();

        let vars = [(SETTINGS_FILE_VAR, named.as_str()), ("BENCH_SCALE", "2")];
        let (settings, source) = Settings::load_with(lookup(&vars)).unwrap();
        assert_eq!(source, Some(path));
        assert_eq!(settings.repetitions, 3);
        assert_eq!(settings.scale, 2);
    }

    #[test]
    fn missing_named_settings_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        let named = missing.to_string_lossy().into_owned();

        let vars = [(SETTINGS_FILE_VAR, named.as_str())];
        let err = Settings::load_with(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn zero_repetitions_and_bad_log_level_fail_validation() {
        let settings = Settings {
            repetitions: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            log_level: "chatty".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }
}
