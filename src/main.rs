use std::{path::Path, process, sync::Arc};

use bytes::Bytes;
use folio::{
    application::{blog::BlogRepository, error::AppError, pagination::PageWindow},
    config::{self, Command, GroupsArgs, PostArgs, PostsArgs, UploadArgs, ViewerArgs},
    domain::visibility::{SystemClock, Viewer},
    infra::{self, error::InfraError, telemetry},
};
use serde::Serialize;
use serde_json::json;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let chain = error.chain();
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?chain, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?chain, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(InfraError::from)?;
    let command = cli_args.command.unwrap_or(Command::Summary);

    telemetry::init(&settings.logging)?;

    let backend = infra::open_backend(&settings.storage, &settings.files).await?;
    let repository = BlogRepository::load(backend, Arc::new(SystemClock)).await?;
    info!(
        backend = repository.backend_name(),
        posts = repository.cache().len(),
        "repository ready"
    );

    match command {
        Command::Summary => run_summary(&repository),
        Command::Posts(args) => run_posts(&repository, args),
        Command::Post(args) => run_post(&repository, args),
        Command::Categories(args) => run_categories(&repository, args),
        Command::Groups(args) => run_groups(&repository, args),
        Command::Upload(args) => run_upload(&repository, args).await,
    }
}

fn run_summary(repository: &BlogRepository) -> Result<(), AppError> {
    print_json(&json!({
        "backend": repository.backend_name(),
        "counts": repository.counts(),
    }))
}

fn run_posts(repository: &BlogRepository, args: PostsArgs) -> Result<(), AppError> {
    let viewer = viewer(args.viewer);
    let window = PageWindow::new(args.count, args.skip)?;
    let posts = match args.category.as_deref() {
        Some(category) => window
            .apply(repository.list_by_category(viewer, category))
            .collect(),
        None => repository.list_posts(viewer, window),
    };
    print_json(&posts)
}

fn run_post(repository: &BlogRepository, args: PostArgs) -> Result<(), AppError> {
    let post = repository
        .get_by_slug(viewer(args.viewer), &args.slug)
        .ok_or(AppError::NotFound)?;
    print_json(&post)
}

fn run_categories(repository: &BlogRepository, args: ViewerArgs) -> Result<(), AppError> {
    print_json(&repository.list_categories(viewer(args)))
}

fn run_groups(repository: &BlogRepository, args: GroupsArgs) -> Result<(), AppError> {
    let groups = repository.grouped_by_category(viewer(args.viewer), args.category.as_deref());
    print_json(&groups)
}

async fn run_upload(repository: &BlogRepository, args: UploadArgs) -> Result<(), AppError> {
    let file_name = file_name(&args.file)?;
    let data = tokio::fs::read(&args.file).await.map_err(InfraError::from)?;
    let reference = repository
        .save_file(Bytes::from(data), &file_name, args.suffix.as_deref())
        .await?;
    print_json(&json!({ "reference": reference }))
}

fn viewer(args: ViewerArgs) -> Viewer {
    Viewer::from_admin_flag(args.admin)
}

fn file_name(path: &Path) -> Result<String, AppError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| AppError::unexpected(format!("`{}` has no file name", path.display())))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
