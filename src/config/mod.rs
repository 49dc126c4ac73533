//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{num::NonZeroU32, path::PathBuf, str::FromStr};

use clap::{Parser, ValueEnum};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{
    BackendKind, CliArgs, Command, GroupsArgs, Overrides, PostArgs, PostsArgs, UploadArgs,
    ViewerArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "folio";
const DEFAULT_CONTENT_DIR: &str = "content";
const DEFAULT_FILES_SUBDIR: &str = "files";
const DEFAULT_FILES_URL_PREFIX: &str = "/posts/files";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 4;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub storage: StorageSettings,
    pub files: FileSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    File,
    Postgres { url: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub content_dir: PathBuf,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct FileSettings {
    pub directory: PathBuf,
    pub url_prefix: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FOLIO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    storage: RawStorageSettings,
    files: RawFileSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    backend: Option<String>,
    content_dir: Option<PathBuf>,
    database_url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFileSettings {
    directory: Option<PathBuf>,
    url_prefix: Option<String>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(kind) = overrides.storage_backend {
            self.storage.backend = Some(kind.as_str().to_string());
        }
        if let Some(dir) = overrides.content_dir.as_ref() {
            self.storage.content_dir = Some(dir.clone());
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.storage.database_url = Some(url.clone());
        }
        if let Some(dir) = overrides.files_directory.as_ref() {
            self.files.directory = Some(dir.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            storage,
            files,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let storage = build_storage_settings(storage)?;
        let files = build_file_settings(files, &storage)?;

        Ok(Self {
            logging,
            storage,
            files,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let url = storage.database_url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let kind = match storage.backend.as_deref().map(str::trim) {
        None | Some("") => {
            if url.is_some() {
                BackendKind::Postgres
            } else {
                BackendKind::File
            }
        }
        Some(value) => BackendKind::from_str(value, true).map_err(|_| {
            LoadError::invalid(
                "storage.backend",
                format!("unknown backend `{value}` (expected file, postgres or memory)"),
            )
        })?,
    };

    let backend = match kind {
        BackendKind::File => StorageBackend::File,
        BackendKind::Memory => StorageBackend::Memory,
        BackendKind::Postgres => StorageBackend::Postgres {
            url: url.ok_or_else(|| {
                LoadError::invalid(
                    "storage.database_url",
                    "required when storage.backend is postgres",
                )
            })?,
        },
    };

    let content_dir = storage
        .content_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTENT_DIR));
    if content_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.content_dir",
            "path must not be empty",
        ));
    }

    let max_connections = NonZeroU32::new(
        storage
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
    )
    .ok_or_else(|| LoadError::invalid("storage.max_connections", "must be greater than zero"))?;

    Ok(StorageSettings {
        backend,
        content_dir,
        max_connections,
    })
}

fn build_file_settings(
    files: RawFileSettings,
    storage: &StorageSettings,
) -> Result<FileSettings, LoadError> {
    let directory = files
        .directory
        .unwrap_or_else(|| storage.content_dir.join(DEFAULT_FILES_SUBDIR));

    let url_prefix = files
        .url_prefix
        .unwrap_or_else(|| DEFAULT_FILES_URL_PREFIX.to_string());
    let url_prefix = url_prefix.trim().trim_end_matches('/').to_string();
    if !url_prefix.starts_with('/') && !url_prefix.contains("://") {
        return Err(LoadError::invalid(
            "files.url_prefix",
            "must be an absolute path or URL",
        ));
    }

    Ok(FileSettings {
        directory,
        url_prefix,
    })
}
