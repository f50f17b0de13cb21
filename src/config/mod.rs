use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};

use crate::store::FilterMode;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "OfflineNotes";
const APP_NAME: &str = "offline-notes";

pub const CONFIG_ENV: &str = "OFFLINE_NOTES_CONFIG";
pub const DATA_ENV: &str = "OFFLINE_NOTES_DATA";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn from_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn is_installed(&self) -> bool {
        self.paths.config_file.exists()
    }

    pub fn load_or_default(&self) -> Result<AppConfig> {
        if !self.is_installed() {
            let mut cfg = AppConfig::default();
            cfg.post_load(&self.paths)?;
            return Ok(cfg);
        }
        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths)?;
        Ok(cfg)
    }

    pub fn install(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        let mut cfg = AppConfig::default();
        cfg.post_load(&self.paths)?;
        self.write_config(&cfg)?;
        tracing::info!(path = %self.paths.config_file.display(), "wrote default config");
        Ok(cfg)
    }

    fn write_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let override_data = env::var(DATA_ENV).ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        Ok(Self::rooted(config_dir, config_file, data_root, project_dirs.state_dir()))
    }

    pub fn under(root: &Path) -> Self {
        let config_dir = root.join("config");
        let config_file = config_dir.join("config.toml");
        Self::rooted(config_dir, config_file, root.join("data"), None)
    }

    fn rooted(
        config_dir: PathBuf,
        config_file: PathBuf,
        data_root: PathBuf,
        state_dir: Option<&Path>,
    ) -> Self {
        let database_path = data_root.join("notes.db");
        let state_dir = state_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_root.join("state"));
        let log_dir = state_dir.join("logs");
        Self {
            config_dir,
            config_file,
            data_dir: data_root,
            database_path,
            log_dir,
            state_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub default_filter: FilterMode,
    pub reminder: ReminderConfig,
    pub notifications: NotificationConfig,
    pub network: NetworkConfig,
    pub storage: StorageOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_filter: FilterMode::All,
            reminder: ReminderConfig::default(),
            notifications: NotificationConfig::default(),
            network: NetworkConfig::default(),
            storage: StorageOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.storage
            .resolve(paths)
            .context("resolving storage paths")?;
        if self.reminder.interval.is_zero() {
            tracing::warn!("reminder interval of zero in config, falling back to default");
            self.reminder.interval = ReminderConfig::default().interval;
        }
        if self.network.probe_interval.is_zero() {
            tracing::warn!("network probe interval of zero in config, falling back to default");
            self.network.probe_interval = NetworkConfig::default().probe_interval;
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    pub enabled: bool,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "interval_secs")]
    pub interval: Duration,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(2 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub title: String,
    pub icon: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: "Offline Notes".to_string(),
            icon: "icons/note-192.png".to_string(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub probe_addr: String,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "probe_interval_secs")]
    pub probe_interval: Duration,
    pub timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_addr: "1.1.1.1:53".to_string(),
            probe_interval: Duration::from_secs(30),
            timeout_ms: 800,
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub database_path: PathBuf,
    pub wal_autocheckpoint: u32,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
            wal_autocheckpoint: 1000,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            self.database_path = paths.database_path.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_yields_defaults_without_writing() -> Result<()> {
        let temp = TempDir::new()?;
        let loader = ConfigLoader::from_paths(ConfigPaths::under(temp.path()));

        let cfg = loader.load_or_default()?;

        assert!(!loader.is_installed());
        assert_eq!(cfg.reminder.interval, Duration::from_secs(7200));
        assert_eq!(cfg.storage.database_path, loader.paths().database_path);
        Ok(())
    }

    #[test]
    fn install_writes_config_that_loads_back() -> Result<()> {
        let temp = TempDir::new()?;
        let loader = ConfigLoader::from_paths(ConfigPaths::under(temp.path()));

        loader.install()?;
        assert!(loader.is_installed());
        assert!(loader.paths().log_dir.is_dir());

        let raw = fs::read_to_string(&loader.paths().config_file)?;
        assert!(raw.contains("interval_secs = 7200"));
        assert!(raw.contains("default_filter = \"all\""));

        let cfg = loader.load()?;
        assert_eq!(cfg.network.probe_addr, "1.1.1.1:53");
        Ok(())
    }

    #[test]
    fn partial_config_keeps_defaults_and_rejects_zero_interval() -> Result<()> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::under(temp.path());
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "default_filter = \"active\"\n[reminder]\ninterval_secs = 0\n",
        )?;
        let loader = ConfigLoader::from_paths(paths);

        let cfg = loader.load()?;

        assert_eq!(cfg.default_filter, FilterMode::Active);
        assert_eq!(cfg.reminder.interval, Duration::from_secs(7200));
        assert!(cfg.reminder.enabled);
        assert_eq!(cfg.notifications.title, "Offline Notes");
        Ok(())
    }
}
