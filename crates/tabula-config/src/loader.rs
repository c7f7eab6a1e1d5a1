//! Configuration loader with layered sources.

use crate::AppConfig;
use config::{Config, ConfigError, Environment, File};
use std::path::Path;
use std::sync::Arc;
use tabula_core::DaoError;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Configuration loader with runtime reload support.
#[derive(Clone)]
pub struct ConfigLoader {
    config: Arc<RwLock<AppConfig>>,
    config_dir: String,
    environment: String,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from multiple sources in order:
    /// 1. `{config_dir}/default.toml` - Default values
    /// 2. `{config_dir}/{environment}.toml` - Environment-specific overrides
    /// 3. `{config_dir}/local.toml` - Uncommitted local overrides
    /// 4. Environment variables with `TABULA__` prefix
    ///
    /// The environment name comes from `TABULA_ENVIRONMENT` and defaults to
    /// `development`. A `.env` file in the working directory is read first.
    pub fn new(config_dir: impl Into<String>) -> Result<Self, DaoError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }
        let environment =
            std::env::var("TABULA_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        Self::with_environment(config_dir, environment)
    }

    /// Creates a loader for an explicit environment name.
    pub fn with_environment(
        config_dir: impl Into<String>,
        environment: impl Into<String>,
    ) -> Result<Self, DaoError> {
        let config_dir = config_dir.into();
        let environment = environment.into();
        let config = Self::load_config(&config_dir, &environment)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_dir,
            environment,
        })
    }

    /// Loads configuration from the default location (`./config`).
    pub fn from_default_location() -> Result<Self, DaoError> {
        Self::new("./config")
    }

    /// Returns the current configuration.
    pub async fn get(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    /// Reloads the configuration from disk.
    pub async fn reload(&self) -> Result<(), DaoError> {
        let new_config = Self::load_config(&self.config_dir, &self.environment)?;
        let mut config = self.config.write().await;
        *config = new_config;
        info!("Configuration reloaded successfully");
        Ok(())
    }

    fn load_config(config_dir: &str, environment: &str) -> Result<AppConfig, DaoError> {
        info!("Loading configuration for environment: {}", environment);

        let mut builder = Config::builder();

        for name in ["default", environment, "local"] {
            let path = format!("{}/{}.toml", config_dir, name);
            if Path::new(&path).exists() {
                debug!("Loading config from: {}", path);
                builder = builder.add_source(File::with_name(&path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("TABULA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut app_config: AppConfig = builder
            .build()
            .and_then(Config::try_deserialize::<AppConfig>)
            .map_err(config_error_to_dao_error)?;
        app_config.app.environment = environment.to_string();

        Self::validate_config(&app_config)?;

        Ok(app_config)
    }

    /// Validates the configuration.
    fn validate_config(config: &AppConfig) -> Result<(), DaoError> {
        let database = &config.database;

        if database.url.trim().is_empty() {
            return Err(DaoError::Configuration("Database URL is required".to_string()));
        }

        if database.max_connections == 0 {
            return Err(DaoError::Configuration(
                "database.max_connections must be greater than zero".to_string(),
            ));
        }

        if database.min_connections > database.max_connections {
            return Err(DaoError::Configuration(format!(
                "database.min_connections ({}) exceeds database.max_connections ({})",
                database.min_connections, database.max_connections
            )));
        }

        Ok(())
    }

    /// Gets a specific configuration value by dotted key path.
    pub async fn get_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let config = self.config.read().await;
        let json = serde_json::to_value(&*config).ok()?;

        let mut current = &json;
        for part in key.split('.') {
            current = current.get(part)?;
        }

        serde_json::from_value(current.clone()).ok()
    }
}

fn config_error_to_dao_error(err: ConfigError) -> DaoError {
    DaoError::Configuration(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_dir(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, contents) in files {
            fs::write(dir.path().join(name), contents).unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn test_defaults_without_files() {
        let dir = config_dir(&[]);
        let loader = ConfigLoader::with_environment(dir.path().to_str().unwrap(), "test").unwrap();
        let config = loader.get().await;
        assert_eq!(config.app.environment, "test");
        assert_eq!(config.database.max_connections, 10);
    }

    #[tokio::test]
    async fn test_environment_file_overrides_default() {
        let dir = config_dir(&[
            ("default.toml", "[database]\nurl = \"sqlite://default.db\"\nmax_connections = 4\n"),
            ("test.toml", "[database]\nurl = \"sqlite::memory:\"\n"),
        ]);
        let loader = ConfigLoader::with_environment(dir.path().to_str().unwrap(), "test").unwrap();
        let config = loader.get().await;
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.max_connections, 4);
    }

    #[tokio::test]
    async fn test_rejects_inverted_pool_bounds() {
        let dir = config_dir(&[(
            "default.toml",
            "[database]\nmin_connections = 8\nmax_connections = 2\n",
        )]);
        let err = ConfigLoader::with_environment(dir.path().to_str().unwrap(), "test")
            .err()
            .unwrap();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[tokio::test]
    async fn test_reload_picks_up_changes() {
        let dir = config_dir(&[("default.toml", "[database]\nlog_queries = false\n")]);
        let loader = ConfigLoader::with_environment(dir.path().to_str().unwrap(), "test").unwrap();
        assert!(!loader.get().await.database.log_queries);

        fs::write(dir.path().join("default.toml"), "[database]\nlog_queries = true\n").unwrap();
        loader.reload().await.unwrap();
        assert!(loader.get().await.database.log_queries);
    }

    #[tokio::test]
    async fn test_get_value_by_path() {
        let dir = config_dir(&[("default.toml", "[telemetry]\njson = true\n")]);
        let loader = ConfigLoader::with_environment(dir.path().to_str().unwrap(), "test").unwrap();
        assert_eq!(loader.get_value::<bool>("telemetry.json").await, Some(true));
        assert_eq!(loader.get_value::<String>("database.missing").await, None);
    }
}
