//! Configuration management for the CLI.
//!
//! This module handles loading configuration from `modelgen.toml` files
//! and merging with command-line arguments.

use crate::error::{CliResult, ConfigError};
use modelgen::{GenerationMode, GeneratorSettings, RustcCompiler};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default configuration filename.
pub const CONFIG_FILENAME: &str = "modelgen.toml";

/// Status file location when none is configured, relative to the models directory.
pub const DEFAULT_STATUS_FILE: &str = ".modelgen/status.json";

/// Main configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where and how models are generated.
    pub models: ModelsConfig,

    /// Compiled artifact settings.
    pub artifact: ArtifactConfig,

    /// Schema snapshot source.
    pub schema: SchemaConfig,

    /// Persisted run status.
    pub status: StatusConfig,
}

/// Models configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory holding hand-authored and generated models.
    pub dir: PathBuf,

    /// Namespace of the generated models.
    pub namespace: String,

    /// What a run produces.
    pub mode: GenerationMode,
}

/// Artifact configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Output directory for the compiled artifact.
    pub dir: Option<PathBuf>,

    /// Compiler binary; falls back to `$RUSTC`, then `rustc`.
    pub rustc: Option<PathBuf>,

    /// Edition the models are compiled with.
    pub edition: Option<String>,
}

/// Schema configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Path to the JSON schema snapshot.
    pub path: PathBuf,
}

/// Status configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Status file path.
    pub file: Option<PathBuf>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./models"),
            namespace: "models".to_string(),
            mode: GenerationMode::default(),
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./schema.json"),
        }
    }
}

impl Config {
    /// Generator settings for this configuration.
    pub fn settings(&self) -> GeneratorSettings {
        let settings = GeneratorSettings::new(&self.models.dir, &self.models.namespace)
            .with_mode(self.models.mode);
        match &self.artifact.dir {
            Some(dir) => settings.with_artifact_dir(dir),
            None => settings,
        }
    }

    /// Compiler used in artifact mode.
    pub fn compiler(&self) -> RustcCompiler {
        let mut compiler = RustcCompiler::new();
        if let Some(rustc) = &self.artifact.rustc {
            compiler = compiler.with_rustc(rustc);
        }
        if let Some(edition) = &self.artifact.edition {
            compiler = compiler.with_edition(edition);
        }
        compiler
    }

    /// Status file path.
    pub fn status_file(&self) -> PathBuf {
        self.status
            .file
            .clone()
            .unwrap_or_else(|| self.models.dir.join(DEFAULT_STATUS_FILE))
    }

    /// Check values serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid_value("models.dir", "must not be empty"));
        }
        if self.schema.path.as_os_str().is_empty() {
            return Err(ConfigError::invalid_value("schema.path", "must not be empty"));
        }
        if let Some(edition) = &self.artifact.edition {
            if !matches!(edition.as_str(), "2015" | "2018" | "2021" | "2024") {
                return Err(ConfigError::invalid_value(
                    "artifact.edition",
                    format!("unknown edition '{}'", edition),
                ));
            }
        }
        Ok(())
    }
}

/// Configuration manager for loading and merging configs.
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from a file path.
    ///
    /// If the path is None, attempts to load from the default location.
    /// If no config file exists, returns default configuration.
    pub fn load(path: Option<&Path>) -> CliResult<Config> {
        let config_path = path
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));

        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "no configuration file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::invalid_toml(config_path, e.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    /// Merge CLI arguments into configuration.
    ///
    /// CLI arguments take precedence over config file values.
    pub fn merge_cli_args(mut config: Config, args: &CliArgs) -> Config {
        if let Some(ref dir) = args.models_dir {
            config.models.dir = dir.clone();
        }

        if let Some(ref namespace) = args.namespace {
            config.models.namespace = namespace.clone();
        }

        if let Some(mode) = args.mode {
            config.models.mode = mode;
        }

        if let Some(ref schema) = args.schema {
            config.schema.path = schema.clone();
        }

        if let Some(ref dir) = args.artifact_dir {
            config.artifact.dir = Some(dir.clone());
        }

        config
    }

    /// Generate default configuration file content with comments.
    pub fn default_config_content() -> &'static str {
        r#"# modelgen configuration file

[models]
# Directory holding hand-authored models; generated files are written next to them
dir = "./models"

# Namespace of the generated models (also the artifact crate name)
namespace = "models"

# What a run produces: "nothing", "source-only" or "artifact"
mode = "source-only"

[artifact]
# Output directory for the compiled artifact (defaults to <models.dir>/.modelgen)
# dir = "./target/models"

# Compiler binary (defaults to $RUSTC, then rustc)
# rustc = "rustc"

# edition = "2021"

[schema]
# JSON snapshot of the content types
path = "./schema.json"

[status]
# Where the outcome of the last run is recorded (defaults to <models.dir>/.modelgen/status.json)
# file = "./models/.modelgen/status.json"
"#
    }
}

/// CLI arguments that can override configuration.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Models directory override.
    pub models_dir: Option<PathBuf>,

    /// Namespace override.
    pub namespace: Option<String>,

    /// Generation mode override.
    pub mode: Option<GenerationMode>,

    /// Schema snapshot override.
    pub schema: Option<PathBuf>,

    /// Artifact directory override.
    pub artifact_dir: Option<PathBuf>,
}
