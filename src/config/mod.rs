use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::api::EndpointSpec;

pub mod endpoints;

pub use endpoints::ResourceRegistry;

const APP_DOMAIN: &str = "vn";
const APP_ORG: &str = "Newsdesk";
const APP_NAME: &str = "newsdesk";
const DEFAULT_PAGE_SIZE: u32 = 10;
const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_SCHEDULE_TTL_MINUTES: u64 = 60;
/// Largest TTL whose length in seconds still fits an `i64`.
const MAX_SCHEDULE_TTL_MINUTES: u64 = (i64::MAX / 60) as u64;

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

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(&self.paths)?;
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
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

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        let mut file = fs::File::create(&self.paths.config_file).with_context(|| {
            format!(
                "creating default config {}",
                self.paths.config_file.display()
            )
        })?;
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
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("NEWSDESK_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("NEWSDESK_DATA").ok().map(PathBuf::from);

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

        let data_dir = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let database_path = data_dir.join("cache.db");

        Ok(Self {
            config_dir,
            config_file,
            data_dir,
            database_path,
        })
    }

    /// Paths rooted in one directory.
    pub fn rooted(root: &Path) -> Self {
        let config_dir = root.join("config");
        let data_dir = root.join("data");
        Self {
            config_file: config_dir.join("config.toml"),
            config_dir,
            database_path: data_dir.join("cache.db"),
            data_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub page_size: u32,
    pub api: ApiOptions,
    pub status: StatusOptions,
    pub cache: CacheOptions,
    pub storage: StorageOptions,
    /// Per-resource overrides merged over the built-in registry.
    pub endpoints: IndexMap<String, EndpointSpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            api: ApiOptions::default(),
            status: StatusOptions::default(),
            cache: CacheOptions::default(),
            storage: StorageOptions::default(),
            endpoints: IndexMap::new(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.storage
            .resolve(paths)
            .context("resolving storage paths")?;
        if self.page_size == 0 {
            tracing::warn!(
                fallback = DEFAULT_PAGE_SIZE,
                "page_size of 0 in config, using default"
            );
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        if self.api.base_url.trim().is_empty() {
            tracing::warn!(fallback = DEFAULT_BASE_URL, "empty api.base_url in config");
            self.api.base_url = DEFAULT_BASE_URL.to_string();
        }
        if self.cache.schedule_ttl_minutes > MAX_SCHEDULE_TTL_MINUTES {
            tracing::warn!(
                value = self.cache.schedule_ttl_minutes,
                fallback = DEFAULT_SCHEDULE_TTL_MINUTES,
                "cache.schedule_ttl_minutes out of range, using default"
            );
            self.cache.schedule_ttl_minutes = DEFAULT_SCHEDULE_TTL_MINUTES;
        }
        for (name, spec) in &self.endpoints {
            if spec.path.trim().is_empty() {
                tracing::warn!(resource = %name, "endpoint override has no path, ignoring");
            }
        }
        self.endpoints.retain(|_, spec| !spec.path.trim().is_empty());
        Ok(())
    }

    pub fn registry(&self) -> ResourceRegistry {
        ResourceRegistry::default().with_overrides(&self.endpoints)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiOptions {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 15,
            user_agent: format!("newsdesk/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusOptions {
    /// Error and success banners clear after this many seconds.
    pub dismiss_secs: u64,
}

impl Default for StatusOptions {
    fn default() -> Self {
        Self { dismiss_secs: 5 }
    }
}

impl StatusOptions {
    pub fn dismiss_after(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.dismiss_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    pub schedule_ttl_minutes: u64,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            schedule_ttl_minutes: DEFAULT_SCHEDULE_TTL_MINUTES,
        }
    }
}

impl CacheOptions {
    /// Saturates instead of overflowing for values `post_load` has not seen.
    pub fn schedule_ttl(&self) -> Duration {
        let seconds = i64::try_from(self.schedule_ttl_minutes)
            .ok()
            .and_then(|minutes| minutes.checked_mul(60))
            .unwrap_or(i64::MAX);
        Duration::seconds(seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub database_path: PathBuf,
    pub wal_autocheckpoint: u32,
    pub busy_timeout_ms: u64,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
            wal_autocheckpoint: 1000,
            busy_timeout_ms: 2000,
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
