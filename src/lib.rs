pub mod capture;
pub mod error;
pub mod pipeline;
pub mod stream;
pub mod utils;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use ::config::builder::DefaultState;
use ::config::{ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

pub use error::ConfigError;

/// Prefix for environment overrides, e.g. `SNAPSTREAM_PIPELINE__SERVE_FPS=15`
pub const ENV_PREFIX: &str = "SNAPSTREAM";

const MAX_FPS: u32 = 1000;

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub client: ClientConfig,
    pub auth: AuthConfig,
    /// Camera name (also its URL path) to snapshot URL
    pub cameras: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub serve_fps: u32,
    pub fetch_fps: u32,
    pub use_cache: bool,
    pub ring_buffer_size: usize,
    pub no_frame_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Per attempt, covering the whole request
    pub timeout_ms: u64,
    /// TCP connect and TLS handshake
    pub connect_timeout_ms: u64,
    pub retry_count: u32,
    pub retry_wait_ms: u64,
    pub user_agent: String,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Sent verbatim as the `Authorization` header when non-empty
    pub token: String,
    /// Either `name=value` or a bare value sent under `cookie_name`
    pub cookie: String,
    pub cookie_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: 8081,
            log_level: "info".into(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            serve_fps: 10,
            fetch_fps: 30,
            use_cache: true,
            ring_buffer_size: 10,
            no_frame_backoff_ms: 50,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            connect_timeout_ms: 3000,
            retry_count: 2,
            retry_wait_ms: 50,
            user_agent: concat!("snapstream/", env!("CARGO_PKG_VERSION")).into(),
            pool_max_idle_per_host: 20,
            pool_idle_timeout_ms: 30_000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            cookie: String::new(),
            cookie_name: "SessaoId".into(),
        }
    }
}

impl Config {
    /// Load from an optional TOML file, then apply `SNAPSTREAM_*` environment overrides.
    /// A missing file is not an error; every key has a default except the cameras.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let source = match path {
            Some(path) => read_optional(path)?,
            None => None,
        };

        let mut builder = ::config::Config::builder();
        if let Some(source) = &source {
            builder = builder.add_source(File::from_str(source, FileFormat::Toml));
        }
        let builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Self::finish(builder, source.as_deref())
    }

    /// Parse a TOML document without consulting the environment
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let builder = ::config::Config::builder().add_source(File::from_str(source, FileFormat::Toml));
        Self::finish(builder, Some(source))
    }

    fn finish(builder: ConfigBuilder<DefaultState>, source: Option<&str>) -> Result<Self, ConfigError> {
        let mut config: Config = builder.build()?.try_deserialize()?;
        if let Some(source) = source {
            config.restore_camera_names(source)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// `config` folds map keys to lowercase. Camera names are route paths, so
    /// put back the spelling from the file, keeping any overridden URL.
    fn restore_camera_names(&mut self, source: &str) -> Result<(), ConfigError> {
        #[derive(Deserialize)]
        struct Cameras {
            #[serde(default)]
            cameras: BTreeMap<String, ::toml::Value>,
        }

        let file: Cameras = ::toml::from_str(source)?;
        let mut folded = BTreeSet::new();
        for name in file.cameras.keys() {
            if !folded.insert(name.to_lowercase()) {
                return Err(ConfigError::DuplicateCamera(name.clone()));
            }
        }

        for name in file.cameras.into_keys() {
            let lower = name.to_lowercase();
            if lower == name {
                continue;
            }
            if let Some(url) = self.cameras.remove(&lower) {
                self.cameras.insert(name, url);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_fps("pipeline.serve_fps", self.pipeline.serve_fps)?;
        check_fps("pipeline.fetch_fps", self.pipeline.fetch_fps)?;

        if self.pipeline.ring_buffer_size == 0 {
            return Err(ConfigError::EmptyRingBuffer);
        }
        if self.cameras.is_empty() {
            return Err(ConfigError::NoCameras);
        }

        for (name, url) in &self.cameras {
            if !utils::is_valid_camera_name(name) {
                return Err(ConfigError::InvalidCameraName(name.clone()));
            }
            if url.trim().is_empty() {
                return Err(ConfigError::MissingUrl(name.clone()));
            }
        }

        Ok(())
    }
}

/// Read `KEY=value` lines from an env file into the process environment.
/// Variables that are already set keep their value. Returns whether the file existed.
pub fn load_env_file(path: &Path) -> Result<bool, ConfigError> {
    match dotenv::from_path(path) {
        Ok(()) => Ok(true),
        Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ConfigError::EnvFile(e)),
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(source) => Ok(Some(source)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Read {
            path: path.display().to_string(),
            source,
        }),
    }
}

fn check_fps(field: &'static str, value: u32) -> Result<(), ConfigError> {
    if value == 0 || value > MAX_FPS {
        return Err(ConfigError::InvalidFps { field, value });
    }
    Ok(())
}
