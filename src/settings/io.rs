// src/settings/io.rs

use directories_next::ProjectDirs;
use std::env;
use std::fs;
use std::io::{self, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::AppSettings;

const QUALIFIER: &str = "com";
const ORGANIZATION: &str = "MealTracker";
const APPLICATION: &str = "MealTracker";
const CONFIG_FILE: &str = "app_settings.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to parse settings file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid {key} value '{value}'")]
    InvalidEnv { key: &'static str, value: String },
}

pub fn get_config_path() -> io::Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION) {
        let config_dir = proj_dirs.config_dir();
        fs::create_dir_all(config_dir)?;
        Ok(config_dir.join(CONFIG_FILE))
    } else {
        Err(io::Error::new(ErrorKind::NotFound, "Could not determine project directories for app settings."))
    }
}

pub fn load_settings_from_path<T: for<'de> serde::de::Deserialize<'de> + Default>(
    config_file: &Path,
) -> Result<T, SettingsError> {
    info!("AppSettings: Attempting to load settings from {:?}", config_file);
    match fs::File::open(config_file) {
        Ok(file) => {
            let reader = BufReader::new(file);
            match serde_json::from_reader(reader) {
                Ok(settings) => {
                    info!("AppSettings: Successfully deserialized settings.");
                    Ok(settings)
                }
                Err(e) => {
                    error!("AppSettings: Failed to parse settings file {:?}: {}", config_file, e);
                    Err(SettingsError::Parse { path: config_file.to_path_buf(), source: e })
                }
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("AppSettings: Settings file not found at {:?}. Returning default.", config_file);
            Ok(Default::default())
        }
        Err(e) => {
            error!("AppSettings: Failed to open settings file {:?}: {}", config_file, e);
            Err(e.into())
        }
    }
}

/// Load settings from `path` (or the platform config file), then apply environment overrides.
/// A `.env` file in the working directory is honoured.
pub fn load_settings(path: Option<&Path>) -> Result<AppSettings, SettingsError> {
    if let Ok(env_file) = dotenvy::dotenv() {
        debug!("Loaded environment from {:?}", env_file);
    }

    let config_file = match path {
        Some(p) => p.to_path_buf(),
        None => get_config_path()?,
    };
    let mut settings: AppSettings = load_settings_from_path(&config_file)?;
    apply_env_overrides(&mut settings, |key| env::var(key).ok())?;
    Ok(settings)
}

/// Environment overrides: MEALTRACKER_DB, MEALTRACKER_BIND, MEALTRACKER_PORT,
/// MEALTRACKER_SERVER_URL, MEALTRACKER_INBOX
pub fn apply_env_overrides<F>(settings: &mut AppSettings, var: F) -> Result<(), SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(db) = var("MEALTRACKER_DB") {
        settings.database_path = Some(PathBuf::from(db));
    }
    if let Some(bind) = var("MEALTRACKER_BIND") {
        settings.server.bind = bind;
    }
    if let Some(port) = parse_var(&var, "MEALTRACKER_PORT")? {
        settings.server.port = port;
    }
    if let Some(url) = var("MEALTRACKER_SERVER_URL") {
        settings.client.server_url = url;
    }
    if let Some(inbox) = var("MEALTRACKER_INBOX") {
        settings.inbox.path = Some(PathBuf::from(inbox));
    }
    Ok(())
}

fn parse_var<T: FromStr, F: Fn(&str) -> Option<String>>(
    var: &F,
    key: &'static str,
) -> Result<Option<T>, SettingsError> {
    match var(key) {
        Some(value) => value.trim().parse().map(Some).map_err(|_| {
            warn!("Invalid {key} value: {value}");
            SettingsError::InvalidEnv { key, value }
        }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings: AppSettings = load_settings_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.client.poll_interval_secs, 60);
        assert_eq!(settings.client.undo_window_secs, 5);
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"server": {"port": 9000}, "household": {"people": ["ana", "ben"]}}"#).unwrap();

        let settings: AppSettings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.bind, "0.0.0.0");
        assert_eq!(settings.household.people, ["ana".to_string(), "ben".to_string()]);
        assert_eq!(settings.client, AppSettings::default().client);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let result: Result<AppSettings, _> = load_settings_from_path(&path);
        assert!(matches!(result, Err(SettingsError::Parse { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("MEALTRACKER_PORT", "9191"),
            ("MEALTRACKER_DB", "/tmp/meals.db"),
            ("MEALTRACKER_SERVER_URL", "http://pi.local:9191/"),
        ]);
        let mut settings = AppSettings::default();
        apply_env_overrides(&mut settings, |k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(settings.server.port, 9191);
        assert_eq!(settings.database_path, Some(PathBuf::from("/tmp/meals.db")));
        assert_eq!(settings.client.server_url, "http://pi.local:9191/");
    }

    #[test]
    fn test_invalid_port_override() {
        let mut settings = AppSettings::default();
        let err = apply_env_overrides(&mut settings, |k| {
            (k == "MEALTRACKER_PORT").then(|| "eighty".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidEnv { key: "MEALTRACKER_PORT", .. }));
    }
}
