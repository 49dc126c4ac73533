use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the Folio binary.
#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Folio content repository")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print post counts by state (the default).
    Summary,
    /// List visible posts, newest first.
    Posts(PostsArgs),
    /// Show a single post by slug.
    Post(PostArgs),
    /// List category names.
    Categories(ViewerArgs),
    /// Show posts grouped by category.
    Groups(GroupsArgs),
    /// Store an attachment through the configured backend.
    Upload(UploadArgs),
}

#[derive(Debug, Args, Default, Clone, Copy)]
pub struct ViewerArgs {
    /// Query as an administrator (includes unpublished posts).
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub admin: bool,
}

#[derive(Debug, Args, Clone)]
pub struct PostsArgs {
    #[command(flatten)]
    pub viewer: ViewerArgs,

    /// Maximum number of posts to return.
    #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
    pub count: i64,

    /// Number of visible posts to skip.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub skip: i64,

    /// Only posts carrying this category (case-insensitive).
    #[arg(long, value_name = "NAME")]
    pub category: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct PostArgs {
    #[command(flatten)]
    pub viewer: ViewerArgs,

    /// Slug of the post (case-insensitive).
    #[arg(value_name = "SLUG")]
    pub slug: String,
}

#[derive(Debug, Args, Clone)]
pub struct GroupsArgs {
    #[command(flatten)]
    pub viewer: ViewerArgs,

    /// Restrict output to one category.
    #[arg(long, value_name = "NAME")]
    pub category: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct UploadArgs {
    /// File to store.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,

    /// Name suffix used to keep stored names unique.
    #[arg(long, value_name = "SUFFIX")]
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    File,
    Postgres,
    Memory,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::File => "file",
            BackendKind::Postgres => "postgres",
            BackendKind::Memory => "memory",
        }
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the storage backend.
    #[arg(long = "storage-backend", value_name = "KIND", value_enum)]
    pub storage_backend: Option<BackendKind>,

    /// Override the content directory used by the file backend.
    #[arg(long = "content-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub content_dir: Option<PathBuf>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the attachment directory.
    #[arg(long = "files-directory", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub files_directory: Option<PathBuf>,
}
