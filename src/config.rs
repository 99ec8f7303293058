use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::entity::Entity;
use crate::graph::{Filters, GraphConfig};

pub use crate::graph::filter::MAX_SCOPE_SIZE;

const CONFIG_ENV: &str = "DEPGRAPH_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub depgraph: DepgraphConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub filters: FilterDefaults,
}

/// Storage and logging
#[derive(Debug, Clone, Deserialize)]
pub struct DepgraphConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
}

impl Default for DepgraphConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            migrations_dir: default_migrations_dir(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("depgraph.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

/// Defaults of the `graph` command flags
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterDefaults {
    #[serde(default)]
    pub with_closed: bool,
    #[serde(default)]
    pub without_isolated: bool,
    #[serde(default)]
    pub without_prs: bool,
    #[serde(default)]
    pub without_external_deps: bool,
    #[serde(default)]
    pub scope_size: usize,
}

impl FilterDefaults {
    /// Filters for `targets` starting from these defaults.
    pub fn filters(&self, targets: Vec<Entity>, the_world: bool) -> Filters {
        Filters {
            targets,
            the_world,
            with_closed: self.with_closed,
            without_isolated: self.without_isolated,
            without_prs: self.without_prs,
            without_external_deps: self.without_external_deps,
            scope_size: self.scope_size,
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in DEPGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    ///
    /// Without either, built-in defaults are used.
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let (config_path, explicit) = match std::env::var(CONFIG_ENV) {
            Ok(path) => (PathBuf::from(path), true),
            Err(_) => (PathBuf::from("config.toml"), false),
        };
        if !explicit && !config_path.exists() {
            let config = Config::default();
            config.validate()?;
            return Ok(config);
        }

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
        Self::parse(&config_str)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))
    }

    /// Parse and validate a TOML document
    pub fn parse(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.graph.max_epic_depth == 0 {
            anyhow::bail!("graph.max_epic_depth must be greater than 0");
        }
        if self.graph.epic_labels.is_empty() {
            anyhow::bail!("graph.epic_labels must name at least one label");
        }
        if self.graph.epic_labels.iter().any(|l| l.trim().is_empty()) {
            anyhow::bail!("graph.epic_labels must not contain empty names");
        }
        if self.filters.scope_size > MAX_SCOPE_SIZE {
            anyhow::bail!(
                "filters.scope_size must be at most {} (got {})",
                MAX_SCOPE_SIZE,
                self.filters.scope_size
            );
        }
        if !matches!(
            self.depgraph.log_level.to_lowercase().as_str(),
            "off" | "error" | "warn" | "info" | "debug" | "trace"
        ) {
            anyhow::bail!("depgraph.log_level {:?} is not a log level", self.depgraph.log_level);
        }
        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.depgraph.db_path
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.depgraph.migrations_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide cwd and env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const TEST_CONFIG: &str = r#"
[depgraph]
db_path = "./graph.db"
log_level = "debug"

[graph]
epic_labels = ["epic", "kind/epic"]
max_epic_depth = 50

[filters]
with_closed = true
scope_size = 2
"#;

    /// Restores cwd when dropped (e.g. on panic).
    struct CwdGuard(std::path::PathBuf);
    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }

    fn with_config_env(config_path: Option<&Path>, f: impl FnOnce()) {
        let original = std::env::var(CONFIG_ENV).ok();
        match config_path {
            Some(path) => std::env::set_var(CONFIG_ENV, path),
            None => std::env::remove_var(CONFIG_ENV),
        }
        f();
        std::env::remove_var(CONFIG_ENV);
        if let Some(val) = original {
            std::env::set_var(CONFIG_ENV, val);
        }
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("depgraph.toml");
        fs::write(&config_path, TEST_CONFIG).unwrap();
        let _cwd = CwdGuard(std::env::current_dir().unwrap());
        std::env::set_current_dir(temp_dir.path()).unwrap();
        with_config_env(Some(&config_path), || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.depgraph.log_level, "debug");
            assert_eq!(config.db_path(), Path::new("./graph.db"));
            assert_eq!(config.migrations_dir(), Path::new("migrations"));
            assert_eq!(config.graph.max_epic_depth, 50);
            assert!(config.filters.with_closed);
            assert_eq!(config.filters.scope_size, 2);
        });
    }

    #[test]
    fn test_config_defaults_without_file() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let _cwd = CwdGuard(std::env::current_dir().unwrap());
        std::env::set_current_dir(temp_dir.path()).unwrap();
        with_config_env(None, || {
            let config = Config::load().unwrap();
            assert_eq!(config.db_path(), Path::new("depgraph.db"));
            assert_eq!(config.graph, GraphConfig::default());
            assert_eq!(config.filters.scope_size, 0);
        });
    }

    #[test]
    fn test_config_reads_local_config_toml() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("config.toml"), "[graph]\nmax_epic_depth = 7\n").unwrap();
        let _cwd = CwdGuard(std::env::current_dir().unwrap());
        std::env::set_current_dir(temp_dir.path()).unwrap();
        with_config_env(None, || {
            let config = Config::load().unwrap();
            assert_eq!(config.graph.max_epic_depth, 7);
            assert_eq!(config.graph.epic_labels, vec!["epic".to_string(), "t/epic".to_string()]);
        });
    }

    #[test]
    fn test_config_path_from_env_file() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("from-dotenv.toml");
        fs::write(&config_path, TEST_CONFIG).unwrap();
        fs::write(
            temp_dir.path().join(".env"),
            format!("{}={}\n", CONFIG_ENV, config_path.display()),
        )
        .unwrap();
        let _cwd = CwdGuard(std::env::current_dir().unwrap());
        std::env::set_current_dir(temp_dir.path()).unwrap();
        with_config_env(None, || {
            let config = Config::load();
            assert!(config.is_ok(), "Config should load through .env: {:?}", config.err());
            assert_eq!(config.unwrap().graph.max_epic_depth, 50);
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        with_config_env(Some(Path::new("nonexistent.toml")), || {
            let err = Config::load().unwrap_err();
            assert!(format!("{:#}", err).contains("nonexistent.toml"));
        });
    }

    #[test]
    fn test_config_validation() {
        let err = Config::parse("[graph]\nmax_epic_depth = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_epic_depth"));

        let err = Config::parse("[graph]\nepic_labels = []\n").unwrap_err();
        assert!(err.to_string().contains("epic_labels"));

        let err = Config::parse("[filters]\nscope_size = 11\n").unwrap_err();
        assert!(err.to_string().contains("scope_size"));

        let err = Config::parse("[depgraph]\nlog_level = \"loud\"\n").unwrap_err();
        assert!(err.to_string().contains("log_level"));

        assert!(Config::parse("[graph\n").is_err());
        assert!(Config::parse("").is_ok());
    }

    #[test]
    fn test_filter_defaults() {
        let config = Config::parse(TEST_CONFIG).unwrap();
        let filters = config.filters.filters(Vec::new(), true);
        assert!(filters.the_world);
        assert!(filters.with_closed);
        assert!(!filters.without_prs);
        assert_eq!(filters.scope_size, 2);
    }
}
