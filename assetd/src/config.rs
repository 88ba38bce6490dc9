//! Application configuration management.
//!
//! Configuration is loaded from an optional YAML file with environment variable overrides. The
//! configuration file path defaults to `config.yaml` but can be specified via `-f` flag or
//! `ASSETD_CONFIG` environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **Defaults** - See the `Default` implementations below
//! 2. **YAML config file** - Optional (default: `config.yaml`)
//! 3. **Environment variables** - Variables prefixed with `ASSETD_` override YAML values
//! 4. **PORT** - Special case: overrides `port` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `ASSETD_ASSETS__DIR=/var/lib/assetd` sets the `assets.dir` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use assetd::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! PORT=8080
//!
//! # Store uploads somewhere else
//! ASSETD_ASSETS__DIR=/var/lib/assetd/assets
//!
//! # Allow larger uploads (bytes)
//! ASSETD_ASSETS__MAX_UPLOAD_SIZE=52428800
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::Error;

/// Default upload size bound: 10 MiB aggregate per request
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 10 << 20;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "ASSETD_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
    /// Asset storage and serving configuration
    pub assets: AssetsConfig,
}

/// Where uploads are stored and how they are addressed.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    /// Flat directory holding every stored upload
    pub dir: PathBuf,
    /// Public route prefix of stored assets, e.g. `/assets/`
    pub public_prefix: String,
    /// Directory that request paths under `public_prefix` are resolved against
    pub web_root: PathBuf,
    /// Aggregate upper bound on a multipart upload body, in bytes
    pub max_upload_size: u64,
    /// Create `dir` at startup if it is missing
    pub create_dir: bool,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./assets/"),
            public_prefix: "/assets/".to_string(),
            web_root: PathBuf::from("."),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            create_dir: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9898,
            enable_otel_export: false,
            assets: AssetsConfig::default(),
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;

        Ok(config)
    }

    /// Validate configuration values that serde can't check on its own.
    pub fn validate(&self) -> Result<(), Error> {
        if self.assets.dir.as_os_str().is_empty() {
            return Err(Error::Configuration {
                message: "assets.dir can't be empty".to_string(),
            });
        }

        let prefix = &self.assets.public_prefix;
        if prefix.len() < 2 || !prefix.starts_with('/') || !prefix.ends_with('/') {
            return Err(Error::Configuration {
                message: format!("assets.public_prefix ({prefix}) must start and end with '/' and name a path"),
            });
        }

        if self.assets.max_upload_size == 0 {
            return Err(Error::Configuration {
                message: "assets.max_upload_size must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file, if present
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values. ASSETD_CONFIG names the
            // file itself and is consumed by clap.
            .merge(Env::prefixed("ASSETD_").split("__").ignore(&["config"]))
            // Conventional PORT variable used by most hosting platforms
            .merge(Env::raw().only(&["PORT"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args(config: &str) -> Args {
        Args {
            config: config.to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_defaults_without_config_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&args("missing.yaml"))?;

            assert_eq!(config.port, 9898);
            assert_eq!(config.assets.dir, PathBuf::from("./assets/"));
            assert_eq!(config.assets.public_prefix, "/assets/");
            assert_eq!(config.assets.max_upload_size, 10 * 1024 * 1024);
            assert!(config.assets.create_dir);
            assert_eq!(config.bind_address(), "0.0.0.0:9898");

            Ok(())
        });
    }

    #[test]
    fn test_yaml_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
host: 127.0.0.1
port: 3000
assets:
  dir: /var/lib/assetd
  max_upload_size: 1024
"#,
            )?;

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 3000);
            assert_eq!(config.assets.dir, PathBuf::from("/var/lib/assetd"));
            assert_eq!(config.assets.max_upload_size, 1024);
            // Untouched nested fields keep their defaults
            assert_eq!(config.assets.public_prefix, "/assets/");

            Ok(())
        });
    }

    #[test]
    fn test_port_env_var_overrides_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "port: 3000\n")?;
            jail.set_env("PORT", "8080");

            let config = Config::load(&args("test.yaml"))?;
            assert_eq!(config.port, 8080);

            Ok(())
        });
    }

    #[test]
    fn test_prefixed_env_vars_override_nested_values() {
        Jail::expect_with(|jail| {
            jail.set_env("ASSETD_ASSETS__DIR", "/tmp/uploads");
            jail.set_env("ASSETD_ASSETS__CREATE_DIR", "false");

            let config = Config::load(&args("config.yaml"))?;
            assert_eq!(config.assets.dir, PathBuf::from("/tmp/uploads"));
            assert!(!config.assets.create_dir);

            Ok(())
        });
    }

    #[test]
    fn test_config_path_env_var_is_not_a_field() {
        Jail::expect_with(|jail| {
            jail.set_env("ASSETD_CONFIG", "elsewhere.yaml");

            assert!(Config::load(&args("config.yaml")).is_ok());

            Ok(())
        });
    }

    #[test]
    fn test_empty_asset_dir_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "assets:\n  dir: \"\"\n")?;

            let result = Config::load(&args("test.yaml"));
            assert!(result.is_err());
            assert!(result.unwrap_err().to_string().contains("assets.dir"));

            Ok(())
        });
    }

    #[test]
    fn test_prefix_must_be_slash_delimited() {
        let mut config = Config::default();
        config.assets.public_prefix = "assets".to_string();
        assert!(matches!(config.validate(), Err(Error::Configuration { .. })));

        // The root can't be the prefix: `/` redirects to it
        config.assets.public_prefix = "/".to_string();
        assert!(matches!(config.validate(), Err(Error::Configuration { .. })));

        config.assets.public_prefix = "/static/media/".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "database_url: postgres://nope\n")?;

            assert!(Config::load(&args("test.yaml")).is_err());

            Ok(())
        });
    }
}
